mod bls_config;
mod bls_models;
mod bls_views;
mod bls_controllers;

use bls_config::BLSConfig;
use bls_controllers::BLSControllers;
use bls_views::BLSViews;
use clap::Parser;

fn main() {
    // A missing .env file is fine
    dotenvy::dotenv().ok();
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    // Set up panic hook for better error messages
    std::panic::set_hook(Box::new(|panic_info| {
        eprintln!("\n{}", "═".repeat(70));
        eprintln!("❌ SIMULATOR PANIC");
        eprintln!("{}", "═".repeat(70));
        eprintln!("\n{}", panic_info);
        eprintln!("\n{}", "═".repeat(70));
    }));

    let config = BLSConfig::parse();

    if let Err(e) = BLSControllers::run(config) {
        log::error!("{:#}", e);
        BLSViews::startup_error(&format!("{:#}", e));
        std::process::exit(1);
    }
}
