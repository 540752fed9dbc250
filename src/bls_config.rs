// Command line and environment settings for the Bus Location Simulator
use crate::bls_models::{BLSError, PositionSimulator, ProgressMode, Result, Route, WrapPolicy};
use clap::{Parser, ValueEnum};
use std::path::PathBuf;

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum SimulationMode {
    /// Advance by haversine distance at the configured speed
    Geographic,
    /// Advance by a fixed fraction of a segment per second
    ConstantRate,
}

/// Every flag can also be set through its BLS_* variable or a `.env` file.
#[derive(Debug, Clone, Parser)]
#[command(name = "bls", version, about = "Simulated live location of a bus on a fixed loop")]
pub struct BLSConfig {
    #[arg(long, env = "BLS_HOST", default_value = "127.0.0.1")]
    pub host: String,

    #[arg(long, env = "BLS_PORT", default_value_t = 5000)]
    pub port: u16,

    #[arg(long, env = "BLS_MODE", value_enum, default_value_t = SimulationMode::Geographic)]
    pub mode: SimulationMode,

    #[arg(long = "speed", env = "BLS_SPEED_KMPH", default_value_t = 30)]
    pub speed_kmph: u32,

    /// Segment fraction per second in constant-rate mode
    #[arg(long, env = "BLS_RATE", default_value_t = 0.05)]
    pub rate: f64,

    /// Decimal places of the reported progress
    #[arg(long, env = "BLS_PRECISION", default_value_t = PositionSimulator::DEFAULT_PRECISION)]
    pub precision: u32,

    #[arg(long, env = "BLS_WRAP", value_enum, default_value_t = WrapPolicy::SingleStep)]
    pub wrap: WrapPolicy,

    #[arg(long, env = "BLS_ROUTE_ID", default_value_t = 1)]
    pub route_id: u32,

    /// Route as .json, .geojson or .csv; the built-in Route 1 loop is used otherwise
    #[arg(long, env = "BLS_ROUTE_FILE")]
    pub route_file: Option<PathBuf>,

    /// Index-only route of this many stops (constant-rate mode without a route file)
    #[arg(long, env = "BLS_STOP_COUNT")]
    pub stop_count: Option<usize>,
}

impl BLSConfig {
    const MIN_PRECISION: u32 = 1;
    const MAX_PRECISION: u32 = 12;

    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn progress_mode(&self) -> ProgressMode {
        match self.mode {
            SimulationMode::Geographic => ProgressMode::Geographic,
            SimulationMode::ConstantRate => ProgressMode::ConstantRate {
                rate_per_sec: self.rate,
            },
        }
    }

    /// Settings checks that do not depend on the route
    pub fn validate(&self) -> Result<()> {
        if !(Self::MIN_PRECISION..=Self::MAX_PRECISION).contains(&self.precision) {
            return Err(BLSError::ConfigError(format!(
                "Precision must be between {} and {}, got {}",
                Self::MIN_PRECISION,
                Self::MAX_PRECISION,
                self.precision
            )));
        }
        if self.stop_count.is_some() && self.mode == SimulationMode::Geographic {
            return Err(BLSError::ConfigError(
                "--stop-count only applies to constant-rate mode".to_string(),
            ));
        }
        if self.stop_count.is_some() && self.route_file.is_some() {
            return Err(BLSError::ConfigError(
                "--stop-count and --route-file cannot be combined".to_string(),
            ));
        }
        Ok(())
    }

    pub fn load_route(&self) -> Result<Route> {
        if let Some(path) = &self.route_file {
            return Route::from_file(path);
        }
        if let Some(stop_count) = self.stop_count {
            log::info!("Using index-only route of {} stops", stop_count);
            return Ok(Route::indexed(stop_count));
        }
        log::info!("Using built-in Route 1 stops");
        Ok(Route::route_one())
    }
}
