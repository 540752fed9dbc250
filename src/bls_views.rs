// Views for the Bus Location Simulator: JSON bodies and terminal output
use crate::bls_config::{BLSConfig, SimulationMode};
use crate::bls_models::{Route, Snapshot};
use chrono::SecondsFormat;
use serde::Serialize;

// ============================================================================
// JSON Responses
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocationResponse {
    pub route: u32,
    pub current_stop_index: usize,
    pub next_stop_index: usize,
    pub progress: f64,
    pub speed: u32,
    /// ISO-8601 UTC with a trailing `Z`
    pub timestamp: String,
}

impl LocationResponse {
    pub fn from_snapshot(route: u32, snapshot: &Snapshot) -> Self {
        LocationResponse {
            route,
            current_stop_index: snapshot.current_stop_index,
            next_stop_index: snapshot.next_stop_index,
            progress: snapshot.progress,
            speed: snapshot.speed_kmph,
            timestamp: snapshot
                .timestamp
                .to_rfc3339_opts(SecondsFormat::Micros, true),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct StopView {
    pub index: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lng: Option<f64>,
}

#[derive(Debug, Clone, Serialize)]
pub struct StopsResponse {
    pub route: u32,
    pub stops: Vec<StopView>,
}

impl StopsResponse {
    pub fn from_route(route_id: u32, route: &Route) -> Self {
        let stops = (0..route.stop_count())
            .map(|index| {
                let stop = route.stop_at(index);
                StopView {
                    index,
                    lat: stop.map(|s| s.latitude()),
                    lng: stop.map(|s| s.longitude()),
                }
            })
            .collect();

        StopsResponse {
            route: route_id,
            stops,
        }
    }
}

// ============================================================================
// Terminal Output
// ============================================================================

pub struct BLSViews;

impl BLSViews {
    /// Startup banner with the active settings
    pub fn show_welcome_screen(config: &BLSConfig, route: &Route) {
        println!("\n{}", "═".repeat(70));
        println!("  🚌 BUS LOCATION SIMULATOR - ROUTE {}", config.route_id);
        println!("{}", "═".repeat(70));
        println!("\n  ⚙️  Settings:");
        println!("     • Mode: {:?}", config.mode);
        println!("     • Stops: {}", route.stop_count());
        println!("     • Speed: {} km/h", config.speed_kmph);
        if config.mode == SimulationMode::ConstantRate {
            println!("     • Rate: {}/s", config.rate);
        }
        println!("     • Wrap policy: {:?}", config.wrap);
        println!("     • Progress precision: {} decimals", config.precision);
        println!("\n{}", "═".repeat(70));
    }

    pub fn show_listening(address: &str, route_id: u32) {
        println!("\n🌐 Listening on http://{}", address);
        println!("   • GET /api/bus/{}/location", route_id);
        println!("   • GET /api/bus/{}/stops", route_id);
        println!("\n   Press Ctrl-C to stop");
    }

    pub fn startup_error(error: &str) {
        eprintln!("\n{}", "═".repeat(70));
        eprintln!("❌ STARTUP FAILED");
        eprintln!("{}", "═".repeat(70));
        eprintln!("\n{}", error);
        eprintln!("\n💡 Check the route file and the BLS_* settings (see --help)");
    }

    pub fn goodbye_message() {
        println!("\n👋 Simulator stopped");
    }
}
