// Route and position models for the Bus Location Simulator
//
// A single bus drives a closed loop of stops. Every poll advances its fractional
// position along the current segment, either from real geography (haversine
// segment length and a constant speed) or from a constant per-second rate.

use chrono::{DateTime, Utc};
use clap::ValueEnum;
use geo::Point;
use geojson::GeoJson;
use serde::Deserialize;
use std::fs;
use std::path::Path;

// ============================================================================
// Constants
// ============================================================================

/// Mean Earth radius used for great-circle distances
pub const EARTH_RADIUS_KM: f64 = 6371.0;

/// Pickups of Route 1 as (latitude, longitude)
const ROUTE_ONE_STOPS: [(f64, f64); 4] = [
    (13.0827, 80.2707),
    (13.0658, 80.27897),
    (13.0475, 80.2824),
    (13.0350, 80.5000),
];

// ============================================================================
// Error Handling
// ============================================================================

#[derive(Debug)]
pub enum BLSError {
    ConfigError(String),
    FileError(String),
    ParseError(String),
}

impl std::fmt::Display for BLSError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            BLSError::ConfigError(e) => write!(f, "Configuration error: {}", e),
            BLSError::FileError(e) => write!(f, "File error: {}", e),
            BLSError::ParseError(e) => write!(f, "Parse error: {}", e),
        }
    }
}

impl std::error::Error for BLSError {}

pub type Result<T> = std::result::Result<T, BLSError>;

// ============================================================================
// Route Model
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Stop {
    /// x = longitude, y = latitude
    pub position: Point<f64>,
}

impl Stop {
    pub fn new(latitude: f64, longitude: f64) -> Self {
        Stop {
            position: Point::new(longitude, latitude),
        }
    }

    pub fn latitude(&self) -> f64 {
        self.position.y()
    }

    pub fn longitude(&self) -> f64 {
        self.position.x()
    }
}

/// Stop row as stored in JSON and CSV route files
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct StopRecord {
    pub lat: f64,
    pub lng: f64,
}

impl From<StopRecord> for Stop {
    fn from(record: StopRecord) -> Self {
        Stop::new(record.lat, record.lng)
    }
}

/// Closed loop of stops. After the last stop the bus starts over at index 0.
#[derive(Debug, Clone, PartialEq)]
pub enum Route {
    Geographic(Vec<Stop>),
    Indexed { stop_count: usize },
}

impl Route {
    /// The built-in four pickup loop
    pub fn route_one() -> Self {
        Route::Geographic(
            ROUTE_ONE_STOPS
                .iter()
                .map(|&(lat, lng)| Stop::new(lat, lng))
                .collect(),
        )
    }

    pub fn indexed(stop_count: usize) -> Self {
        Route::Indexed { stop_count }
    }

    pub fn stop_count(&self) -> usize {
        match self {
            Route::Geographic(stops) => stops.len(),
            Route::Indexed { stop_count } => *stop_count,
        }
    }

    pub fn stop_at(&self, index: usize) -> Option<&Stop> {
        match self {
            Route::Geographic(stops) => stops.get(index),
            Route::Indexed { .. } => None,
        }
    }

    pub fn has_coordinates(&self) -> bool {
        matches!(self, Route::Geographic(_))
    }

    /// Length of the segment leaving stop `index`, if both ends have coordinates
    pub fn segment_distance_km(&self, index: usize) -> Option<f64> {
        let from = self.stop_at(index)?;
        let to = self.stop_at(index + 1)?;
        Some(haversine_km(from, to))
    }

    /// Reject routes the simulator cannot drive. Called once at startup.
    pub fn validate(&self, mode: &ProgressMode) -> Result<()> {
        let count = self.stop_count();
        if count < 2 {
            return Err(BLSError::ConfigError(format!(
                "Route needs at least 2 stops, got {}",
                count
            )));
        }

        if let Route::Geographic(stops) = self {
            for (index, stop) in stops.iter().enumerate() {
                let (lat, lng) = (stop.latitude(), stop.longitude());
                if !lat.is_finite() || !(-90.0..=90.0).contains(&lat) {
                    return Err(BLSError::ConfigError(format!(
                        "Stop {} has invalid latitude {}",
                        index, lat
                    )));
                }
                if !lng.is_finite() || !(-180.0..=180.0).contains(&lng) {
                    return Err(BLSError::ConfigError(format!(
                        "Stop {} has invalid longitude {}",
                        index, lng
                    )));
                }
            }
        }

        match mode {
            ProgressMode::Geographic => {
                if !self.has_coordinates() {
                    return Err(BLSError::ConfigError(
                        "Geographic mode needs a route with stop coordinates".to_string(),
                    ));
                }
                // The driven segments are 0->1 .. (n-2)->(n-1); the wrap jumps back to 0.
                for index in 0..count - 1 {
                    let distance = self.segment_distance_km(index).unwrap_or(0.0);
                    if distance.is_nan() || distance <= 0.0 {
                        return Err(BLSError::ConfigError(format!(
                            "Stops {} and {} are at the same position (zero-length segment)",
                            index,
                            index + 1
                        )));
                    }
                }
            }
            ProgressMode::ConstantRate { rate_per_sec } => {
                if !rate_per_sec.is_finite() || *rate_per_sec <= 0.0 {
                    return Err(BLSError::ConfigError(format!(
                        "Progress rate must be a positive number, got {}",
                        rate_per_sec
                    )));
                }
            }
        }

        Ok(())
    }

    // ========================================================================
    // Route files
    // ========================================================================

    /// Load a route from `.json`, `.geojson` or `.csv`
    pub fn from_file(path: &Path) -> Result<Self> {
        let contents = fs::read_to_string(path).map_err(|e| {
            BLSError::FileError(format!("Failed to read route file {:?}: {}", path, e))
        })?;

        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_default();

        let stops = match extension.as_str() {
            "json" => Self::parse_json_stops(&contents)?,
            "geojson" => Self::parse_geojson_stops(&contents)?,
            "csv" => Self::parse_csv_stops(&contents)?,
            other => {
                return Err(BLSError::FileError(format!(
                    "Unsupported route file extension '{}' (expected json, geojson or csv)",
                    other
                )));
            }
        };

        log::info!("Loaded {} stops from {:?}", stops.len(), path);
        Ok(Route::Geographic(stops))
    }

    pub fn parse_json_stops(contents: &str) -> Result<Vec<Stop>> {
        let records: Vec<StopRecord> = serde_json::from_str(contents)
            .map_err(|e| BLSError::ParseError(format!("Invalid JSON route: {}", e)))?;
        Ok(records.into_iter().map(Stop::from).collect())
    }

    /// Points become single stops; LineString and MultiPoint vertices become
    /// stops in document order. GeoJSON positions are `[lng, lat]`.
    pub fn parse_geojson_stops(contents: &str) -> Result<Vec<Stop>> {
        let geojson: GeoJson = contents
            .parse()
            .map_err(|e| BLSError::ParseError(format!("Invalid GeoJSON route: {}", e)))?;

        let mut stops = Vec::new();
        match geojson {
            GeoJson::FeatureCollection(collection) => {
                for feature in collection.features {
                    if let Some(geometry) = feature.geometry {
                        collect_geojson_stops(&geometry.value, &mut stops)?;
                    }
                }
            }
            GeoJson::Feature(feature) => {
                if let Some(geometry) = feature.geometry {
                    collect_geojson_stops(&geometry.value, &mut stops)?;
                }
            }
            GeoJson::Geometry(geometry) => collect_geojson_stops(&geometry.value, &mut stops)?,
        }
        Ok(stops)
    }

    pub fn parse_csv_stops(contents: &str) -> Result<Vec<Stop>> {
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_reader(contents.as_bytes());

        let mut stops = Vec::new();
        for (row, record) in reader.deserialize::<StopRecord>().enumerate() {
            let record = record.map_err(|e| {
                BLSError::ParseError(format!("Invalid CSV route at row {}: {}", row + 1, e))
            })?;
            stops.push(Stop::from(record));
        }
        Ok(stops)
    }
}

fn collect_geojson_stops(value: &geojson::Value, stops: &mut Vec<Stop>) -> Result<()> {
    match value {
        geojson::Value::Point(position) => stops.push(stop_from_position(position)?),
        geojson::Value::MultiPoint(positions) | geojson::Value::LineString(positions) => {
            for position in positions {
                stops.push(stop_from_position(position)?);
            }
        }
        _ => {
            return Err(BLSError::ParseError(
                "Unsupported geometry in route (expected Point, MultiPoint or LineString)"
                    .to_string(),
            ));
        }
    }
    Ok(())
}

fn stop_from_position(position: &[f64]) -> Result<Stop> {
    match position {
        [lng, lat, ..] => Ok(Stop::new(*lat, *lng)),
        _ => Err(BLSError::ParseError(format!(
            "GeoJSON position needs at least 2 values, got {}",
            position.len()
        ))),
    }
}

/// Great-circle distance between two stops on a sphere of radius 6371 km
pub fn haversine_km(a: &Stop, b: &Stop) -> f64 {
    let lat1 = a.latitude().to_radians();
    let lat2 = b.latitude().to_radians();
    let delta_lat = (b.latitude() - a.latitude()).to_radians();
    let delta_lng = (b.longitude() - a.longitude()).to_radians();

    let h = (delta_lat / 2.0).sin().powi(2)
        + lat1.cos() * lat2.cos() * (delta_lng / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_KM * h.sqrt().atan2((1.0 - h).sqrt())
}

// ============================================================================
// Clock
// ============================================================================

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// Clock that only moves when told to
#[cfg(test)]
pub struct ManualClock {
    now: std::sync::Mutex<DateTime<Utc>>,
}

#[cfg(test)]
impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        ManualClock {
            now: std::sync::Mutex::new(start),
        }
    }

    pub fn advance_secs(&self, seconds: f64) {
        let mut now = self.now.lock().unwrap();
        *now += chrono::Duration::milliseconds((seconds * 1000.0).round() as i64);
    }
}

#[cfg(test)]
impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock().unwrap()
    }
}

// ============================================================================
// Position Simulator
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum ProgressMode {
    /// Haversine segment length crossed at the configured speed
    Geographic,
    /// Fixed fraction of a segment per second, whatever its length
    ConstantRate { rate_per_sec: f64 },
}

impl ProgressMode {
    /// Fraction of segment `index` covered per second
    fn rate_per_sec(&self, route: &Route, index: usize, speed_kmph: u32) -> f64 {
        match self {
            ProgressMode::Geographic => match route.segment_distance_km(index) {
                Some(distance) if distance > 0.0 => (speed_kmph as f64 / 3600.0) / distance,
                _ => 0.0,
            },
            ProgressMode::ConstantRate { rate_per_sec } => *rate_per_sec,
        }
    }

    /// Progress gained on segment `index` after `delta_secs`
    fn increment(&self, route: &Route, index: usize, speed_kmph: u32, delta_secs: f64) -> f64 {
        match self {
            ProgressMode::Geographic => match route.segment_distance_km(index) {
                Some(distance) if distance > 0.0 => {
                    let distance_covered_km = (speed_kmph as f64 / 3600.0) * delta_secs;
                    distance_covered_km / distance
                }
                _ => 0.0,
            },
            ProgressMode::ConstantRate { rate_per_sec } => delta_secs * rate_per_sec,
        }
    }
}

/// What happens when one poll covers more than the rest of the current segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum WrapPolicy {
    /// Advance at most one stop per poll and drop the surplus
    SingleStep,
    /// Spend the whole elapsed time, crossing as many stops as it covers
    CatchUp,
}

#[derive(Debug, Clone, PartialEq)]
pub struct SimulationState {
    pub current_stop_index: usize,
    pub progress: f64,
    pub speed_kmph: u32,
    pub last_update: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    pub current_stop_index: usize,
    pub next_stop_index: usize,
    pub progress: f64,
    pub speed_kmph: u32,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct PositionSimulator {
    route: Route,
    mode: ProgressMode,
    wrap_policy: WrapPolicy,
    precision: u32,
    state: SimulationState,
}

impl PositionSimulator {
    pub const DEFAULT_PRECISION: u32 = 4;

    /// Validates the route against the mode and starts at stop 0 with no progress
    pub fn new(
        route: Route,
        mode: ProgressMode,
        wrap_policy: WrapPolicy,
        speed_kmph: u32,
        now: DateTime<Utc>,
    ) -> Result<Self> {
        route.validate(&mode)?;

        Ok(PositionSimulator {
            route,
            mode,
            wrap_policy,
            precision: Self::DEFAULT_PRECISION,
            state: SimulationState {
                current_stop_index: 0,
                progress: 0.0,
                speed_kmph,
                last_update: now,
            },
        })
    }

    pub fn with_precision(mut self, precision: u32) -> Self {
        self.precision = precision;
        self
    }

    pub fn route(&self) -> &Route {
        &self.route
    }

    pub fn state(&self) -> &SimulationState {
        &self.state
    }

    pub fn advance_and_snapshot(&mut self, now: DateTime<Utc>) -> Snapshot {
        let delta_secs = self.take_elapsed_secs(now);

        match self.wrap_policy {
            WrapPolicy::SingleStep => self.advance_single_step(delta_secs),
            WrapPolicy::CatchUp => self.advance_catch_up(delta_secs),
        }

        Snapshot {
            current_stop_index: self.state.current_stop_index,
            next_stop_index: self.state.current_stop_index + 1,
            progress: round_progress(self.state.progress, self.precision),
            speed_kmph: self.state.speed_kmph,
            timestamp: now,
        }
    }

    /// Seconds since the last update; a clock that went backwards counts as zero
    fn take_elapsed_secs(&mut self, now: DateTime<Utc>) -> f64 {
        let elapsed = (now - self.state.last_update)
            .to_std()
            .map(|d| d.as_secs_f64())
            .unwrap_or(0.0);
        self.state.last_update = now;
        elapsed
    }

    fn advance_single_step(&mut self, delta_secs: f64) {
        self.state.progress += self.mode.increment(
            &self.route,
            self.state.current_stop_index,
            self.state.speed_kmph,
            delta_secs,
        );

        if self.state.progress >= 1.0 {
            self.move_to_next_stop();
        }
    }

    fn advance_catch_up(&mut self, delta_secs: f64) {
        let Some(lap_secs) = self.lap_secs() else {
            return;
        };

        // A full lap brings the bus back to the same index and progress
        let mut remaining = if delta_secs > lap_secs {
            delta_secs % lap_secs
        } else {
            delta_secs
        };

        while remaining > 0.0 {
            let rate = self.current_rate();
            let to_finish = (1.0 - self.state.progress) / rate;
            if remaining >= to_finish {
                remaining -= to_finish;
                self.move_to_next_stop();
            } else {
                self.state.progress += remaining * rate;
                remaining = 0.0;
            }
        }

        if self.state.progress >= 1.0 {
            self.move_to_next_stop();
        }
    }

    fn current_rate(&self) -> f64 {
        self.mode.rate_per_sec(
            &self.route,
            self.state.current_stop_index,
            self.state.speed_kmph,
        )
    }

    /// Time to drive every segment once, or None if the bus cannot move
    fn lap_secs(&self) -> Option<f64> {
        let mut total = 0.0;
        for index in 0..self.route.stop_count() - 1 {
            let rate = self
                .mode
                .rate_per_sec(&self.route, index, self.state.speed_kmph);
            if !rate.is_finite() || rate <= 0.0 {
                return None;
            }
            total += 1.0 / rate;
        }
        Some(total)
    }

    fn move_to_next_stop(&mut self) {
        self.state.progress = 0.0;
        self.state.current_stop_index += 1;

        if self.state.current_stop_index >= self.route.stop_count() - 1 {
            self.state.current_stop_index = 0;
        }
    }
}

/// Round half away from zero, keeping the result below 1
pub fn round_progress(progress: f64, precision: u32) -> f64 {
    let scale = 10f64.powi(precision as i32);
    let rounded = (progress * scale).round() / scale;
    if rounded >= 1.0 {
        (scale - 1.0) / scale
    } else {
        rounded
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use std::io::Write;

    fn start_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap()
    }

    fn at(seconds: f64) -> DateTime<Utc> {
        start_time() + chrono::Duration::milliseconds((seconds * 1000.0).round() as i64)
    }

    fn constant_rate_simulator(stop_count: usize, policy: WrapPolicy) -> PositionSimulator {
        PositionSimulator::new(
            Route::indexed(stop_count),
            ProgressMode::ConstantRate { rate_per_sec: 0.05 },
            policy,
            30,
            start_time(),
        )
        .unwrap()
    }

    fn geographic_simulator(policy: WrapPolicy) -> PositionSimulator {
        PositionSimulator::new(
            Route::route_one(),
            ProgressMode::Geographic,
            policy,
            30,
            start_time(),
        )
        .unwrap()
    }

    #[test]
    fn test_route_one() {
        let route = Route::route_one();
        assert_eq!(route.stop_count(), 4);
        let first = route.stop_at(0).unwrap();
        assert_eq!(first.latitude(), 13.0827);
        assert_eq!(first.longitude(), 80.2707);
        assert!(route.stop_at(4).is_none());
    }

    #[test]
    fn test_haversine_first_segment() {
        let route = Route::route_one();
        let distance = route.segment_distance_km(0).unwrap();
        assert!((distance - 2.05).abs() < 0.1, "distance was {}", distance);
    }

    #[test]
    fn test_haversine_same_point_is_zero() {
        let stop = Stop::new(13.0827, 80.2707);
        assert_eq!(haversine_km(&stop, &stop), 0.0);
    }

    #[test]
    fn test_initial_state() {
        let simulator = geographic_simulator(WrapPolicy::SingleStep);
        let state = simulator.state();
        assert_eq!(state.current_stop_index, 0);
        assert_eq!(state.progress, 0.0);
        assert_eq!(state.speed_kmph, 30);
        assert_eq!(state.last_update, start_time());
    }

    #[test]
    fn test_geographic_sixty_seconds() {
        let mut simulator = geographic_simulator(WrapPolicy::SingleStep);
        let segment = simulator.route().segment_distance_km(0).unwrap();

        let snapshot = simulator.advance_and_snapshot(at(60.0));

        let expected = 0.5 / segment;
        assert!((snapshot.progress - expected).abs() < 1e-4);
        assert!((snapshot.progress - 0.25).abs() < 0.02);
        assert_eq!(snapshot.current_stop_index, 0);
        assert_eq!(snapshot.next_stop_index, 1);
        assert_eq!(snapshot.speed_kmph, 30);
        assert_eq!(snapshot.timestamp, at(60.0));
        assert_eq!(simulator.state().last_update, at(60.0));
    }

    #[test]
    fn test_constant_rate_twenty_seconds_wraps_to_next_stop() {
        let mut simulator = constant_rate_simulator(4, WrapPolicy::SingleStep);
        let snapshot = simulator.advance_and_snapshot(at(20.0));
        assert_eq!(snapshot.current_stop_index, 1);
        assert_eq!(snapshot.next_stop_index, 2);
        assert_eq!(snapshot.progress, 0.0);
    }

    #[test]
    fn test_wrap_from_second_to_last_segment_loops_to_start() {
        let mut simulator = constant_rate_simulator(4, WrapPolicy::SingleStep);
        simulator.advance_and_snapshot(at(20.0));
        simulator.advance_and_snapshot(at(40.0));
        assert_eq!(simulator.state().current_stop_index, 2);

        let snapshot = simulator.advance_and_snapshot(at(60.0));
        assert_eq!(snapshot.current_stop_index, 0);
        assert_eq!(snapshot.next_stop_index, 1);
        assert_eq!(snapshot.progress, 0.0);
    }

    #[test]
    fn test_single_step_drops_surplus_on_large_delta() {
        let mut simulator = constant_rate_simulator(4, WrapPolicy::SingleStep);
        let snapshot = simulator.advance_and_snapshot(at(3600.0));
        assert_eq!(snapshot.current_stop_index, 1);
        assert_eq!(snapshot.progress, 0.0);
    }

    #[test]
    fn test_catch_up_crosses_several_stops() {
        let mut simulator = constant_rate_simulator(5, WrapPolicy::CatchUp);
        // 50s at 0.05/s = 2.5 segments
        let snapshot = simulator.advance_and_snapshot(at(50.0));
        assert_eq!(snapshot.current_stop_index, 2);
        assert!((snapshot.progress - 0.5).abs() < 1e-9);
    }

    #[test]
    fn test_catch_up_skips_whole_laps() {
        let mut simulator = constant_rate_simulator(4, WrapPolicy::CatchUp);
        // One lap is 3 segments * 20s; 10 laps plus 30s
        let snapshot = simulator.advance_and_snapshot(at(630.0));
        assert_eq!(snapshot.current_stop_index, 1);
        assert!((snapshot.progress - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_catch_up_geographic_carries_leftover_into_next_segment() {
        let mut simulator = geographic_simulator(WrapPolicy::CatchUp);
        let route = simulator.route().clone();
        let first = route.segment_distance_km(0).unwrap();
        let second = route.segment_distance_km(1).unwrap();

        // Enough time for the first segment plus 0.3 km of the second
        let seconds = (first + 0.3) / (30.0 / 3600.0);
        let snapshot = simulator.advance_and_snapshot(at(seconds));

        assert_eq!(snapshot.current_stop_index, 1);
        assert!((snapshot.progress - 0.3 / second).abs() < 1e-3);
    }

    #[test]
    fn test_progress_and_index_stay_in_range() {
        for policy in [WrapPolicy::SingleStep, WrapPolicy::CatchUp] {
            let mut simulator = constant_rate_simulator(4, policy);
            let mut t = 0.0;
            for step in 0..500 {
                t += (step % 37) as f64 * 0.7;
                let snapshot = simulator.advance_and_snapshot(at(t));
                assert!(snapshot.progress >= 0.0 && snapshot.progress < 1.0);
                assert!(snapshot.current_stop_index <= 2);
                assert_eq!(snapshot.next_stop_index, snapshot.current_stop_index + 1);
            }
        }
    }

    #[test]
    fn test_progress_is_monotonic_until_wrap() {
        let mut simulator = geographic_simulator(WrapPolicy::SingleStep);
        let mut previous = simulator.advance_and_snapshot(at(0.0));
        for step in 1..200 {
            let snapshot = simulator.advance_and_snapshot(at(step as f64 * 5.0));
            if snapshot.current_stop_index == previous.current_stop_index {
                assert!(snapshot.progress >= previous.progress);
            } else {
                assert_eq!(snapshot.progress, 0.0);
            }
            previous = snapshot;
        }
    }

    #[test]
    fn test_same_state_and_time_is_deterministic() {
        let mut first = geographic_simulator(WrapPolicy::SingleStep);
        first.advance_and_snapshot(at(45.0));
        let mut second = first.clone();

        let a = first.advance_and_snapshot(at(120.0));
        let b = second.advance_and_snapshot(at(120.0));
        assert_eq!(a, b);
        assert_eq!(first.state(), second.state());
    }

    #[test]
    fn test_clock_going_backwards_counts_as_zero() {
        let mut simulator = constant_rate_simulator(4, WrapPolicy::SingleStep);
        simulator.advance_and_snapshot(at(10.0));
        let snapshot = simulator.advance_and_snapshot(at(5.0));
        assert!((snapshot.progress - 0.5).abs() < 1e-9);
        assert_eq!(simulator.state().last_update, at(5.0));
    }

    #[test]
    fn test_zero_speed_never_moves() {
        let mut simulator = PositionSimulator::new(
            Route::route_one(),
            ProgressMode::Geographic,
            WrapPolicy::CatchUp,
            0,
            start_time(),
        )
        .unwrap();
        let snapshot = simulator.advance_and_snapshot(at(10_000.0));
        assert_eq!(snapshot.current_stop_index, 0);
        assert_eq!(snapshot.progress, 0.0);
    }

    #[test]
    fn test_round_progress() {
        assert_eq!(round_progress(0.123456, 4), 0.1235);
        assert_eq!(round_progress(0.123456, 3), 0.123);
        assert_eq!(round_progress(0.99996, 4), 0.9999);
        assert_eq!(round_progress(0.0, 4), 0.0);
    }

    #[test]
    fn test_precision_is_applied_to_snapshot() {
        let mut simulator =
            constant_rate_simulator(4, WrapPolicy::SingleStep).with_precision(2);
        let snapshot = simulator.advance_and_snapshot(at(1.234));
        assert_eq!(snapshot.progress, 0.06);
    }

    #[test]
    fn test_lowest_precision_keeps_partial_progress() {
        let mut simulator =
            constant_rate_simulator(4, WrapPolicy::SingleStep).with_precision(1);
        let snapshot = simulator.advance_and_snapshot(at(14.0));
        assert_eq!(snapshot.current_stop_index, 0);
        assert_eq!(snapshot.progress, 0.7);
    }

    #[test]
    fn test_manual_clock_advances() {
        let clock = ManualClock::new(start_time());
        clock.advance_secs(1.5);
        assert_eq!(clock.now(), at(1.5));
    }

    #[test]
    fn test_route_with_one_stop_is_rejected() {
        let route = Route::Geographic(vec![Stop::new(13.0, 80.0)]);
        assert!(route.validate(&ProgressMode::Geographic).is_err());
        let route = Route::indexed(1);
        let mode = ProgressMode::ConstantRate { rate_per_sec: 0.05 };
        assert!(route.validate(&mode).is_err());
    }

    #[test]
    fn test_zero_length_segment_is_rejected() {
        let route = Route::Geographic(vec![
            Stop::new(13.0, 80.0),
            Stop::new(13.0, 80.0),
            Stop::new(13.1, 80.1),
        ]);
        let result = route.validate(&ProgressMode::Geographic);
        assert!(matches!(result, Err(BLSError::ConfigError(_))));
    }

    #[test]
    fn test_out_of_range_coordinates_are_rejected() {
        let route = Route::Geographic(vec![Stop::new(91.0, 80.0), Stop::new(13.0, 80.0)]);
        assert!(route.validate(&ProgressMode::Geographic).is_err());
        let route = Route::Geographic(vec![Stop::new(13.0, f64::NAN), Stop::new(13.0, 80.0)]);
        assert!(route.validate(&ProgressMode::Geographic).is_err());
    }

    #[test]
    fn test_geographic_mode_needs_coordinates() {
        let result = PositionSimulator::new(
            Route::indexed(4),
            ProgressMode::Geographic,
            WrapPolicy::SingleStep,
            30,
            start_time(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn test_non_positive_rate_is_rejected() {
        let route = Route::indexed(4);
        assert!(route.validate(&ProgressMode::ConstantRate { rate_per_sec: 0.0 }).is_err());
        assert!(route.validate(&ProgressMode::ConstantRate { rate_per_sec: -1.0 }).is_err());
    }

    #[test]
    fn test_parse_json_stops() {
        let stops =
            Route::parse_json_stops(r#"[{"lat": 13.0827, "lng": 80.2707}, {"lat": 13.0658, "lng": 80.27897}]"#)
                .unwrap();
        assert_eq!(stops.len(), 2);
        assert_eq!(stops[1], Stop::new(13.0658, 80.27897));
        assert!(Route::parse_json_stops("{not json").is_err());
    }

    #[test]
    fn test_parse_geojson_stops() {
        let contents = r#"{
            "type": "FeatureCollection",
            "features": [
                {"type": "Feature", "properties": {}, "geometry": {"type": "Point", "coordinates": [80.2707, 13.0827]}},
                {"type": "Feature", "properties": {}, "geometry": {"type": "LineString", "coordinates": [[80.27897, 13.0658], [80.2824, 13.0475]]}}
            ]
        }"#;
        let stops = Route::parse_geojson_stops(contents).unwrap();
        assert_eq!(stops.len(), 3);
        assert_eq!(stops[0], Stop::new(13.0827, 80.2707));
        assert_eq!(stops[2], Stop::new(13.0475, 80.2824));
    }

    #[test]
    fn test_parse_geojson_rejects_polygons() {
        let contents = r#"{"type": "Polygon", "coordinates": [[[0.0, 0.0], [1.0, 0.0], [1.0, 1.0], [0.0, 0.0]]]}"#;
        assert!(Route::parse_geojson_stops(contents).is_err());
    }

    #[test]
    fn test_parse_csv_stops() {
        let stops = Route::parse_csv_stops("lat, lng\n13.0827, 80.2707\n13.0658, 80.27897\n").unwrap();
        assert_eq!(stops.len(), 2);
        assert_eq!(stops[0], Stop::new(13.0827, 80.2707));
        assert!(Route::parse_csv_stops("lat,lng\nabc,80.0\n").is_err());
    }

    #[test]
    fn test_route_from_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(file, r#"[{{"lat": 13.0, "lng": 80.0}}, {{"lat": 13.1, "lng": 80.1}}]"#).unwrap();

        let route = Route::from_file(file.path()).unwrap();
        assert_eq!(route.stop_count(), 2);
        assert!(route.has_coordinates());
    }

    #[test]
    fn test_route_from_file_errors() {
        let missing = Route::from_file(Path::new("/nonexistent/route.json"));
        assert!(matches!(missing, Err(BLSError::FileError(_))));

        let file = tempfile::Builder::new().suffix(".txt").tempfile().unwrap();
        let unsupported = Route::from_file(file.path());
        assert!(matches!(unsupported, Err(BLSError::FileError(_))));
    }
}
