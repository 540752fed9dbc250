// Controllers for the Bus Location Simulator: HTTP routes and server lifecycle
use crate::bls_config::BLSConfig;
use crate::bls_models::{Clock, PositionSimulator, Route, SystemClock};
use crate::bls_views::{BLSViews, LocationResponse, StopsResponse};
use anyhow::Context;
use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use std::sync::{Arc, Mutex, MutexGuard};
use tower_http::cors::{Any, CorsLayer};

/// Shared by every request handler
#[derive(Clone)]
pub struct AppState {
    simulator: Arc<Mutex<PositionSimulator>>,
    /// Fixed at startup; read without touching the simulator lock
    route: Arc<Route>,
    clock: Arc<dyn Clock>,
    route_id: u32,
}

impl AppState {
    pub fn new(simulator: PositionSimulator, clock: Arc<dyn Clock>, route_id: u32) -> Self {
        AppState {
            route: Arc::new(simulator.route().clone()),
            simulator: Arc::new(Mutex::new(simulator)),
            clock,
            route_id,
        }
    }

    /// The simulator holds plain numbers, so a poisoned lock still guards valid state
    fn lock_simulator(&self) -> MutexGuard<'_, PositionSimulator> {
        self.simulator
            .lock()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

pub struct BLSControllers;

impl BLSControllers {
    /// Main application entry: validate settings, then serve until Ctrl-C
    pub fn run(config: BLSConfig) -> anyhow::Result<()> {
        config.validate().context("Invalid settings")?;

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let simulator = Self::build_simulator(&config, clock.as_ref())?;
        BLSViews::show_welcome_screen(&config, simulator.route());

        let state = AppState::new(simulator, clock, config.route_id);

        let runtime = tokio::runtime::Builder::new_multi_thread()
            .enable_all()
            .build()
            .context("Failed to start async runtime")?;

        runtime.block_on(Self::serve(config.address(), state))?;
        BLSViews::goodbye_message();
        Ok(())
    }

    /// Load and validate the route; the simulator starts at the clock's current time
    pub fn build_simulator(config: &BLSConfig, clock: &dyn Clock) -> anyhow::Result<PositionSimulator> {
        let route = config.load_route().context("Failed to load route")?;

        let simulator = PositionSimulator::new(
            route,
            config.progress_mode(),
            config.wrap,
            config.speed_kmph,
            clock.now(),
        )
        .context("Route rejected")?
        .with_precision(config.precision);

        log::info!(
            "Simulator ready: {} stops, {:?}, {} km/h, {:?}, started at {}",
            simulator.route().stop_count(),
            config.mode,
            config.speed_kmph,
            config.wrap,
            simulator.state().last_update
        );
        Ok(simulator)
    }

    pub fn router(state: AppState) -> Router {
        let cors = CorsLayer::new()
            .allow_origin(Any)
            .allow_methods(Any)
            .allow_headers(Any);

        Router::new()
            .route(
                &format!("/api/bus/{}/location", state.route_id),
                get(Self::get_bus_location),
            )
            .route(
                &format!("/api/bus/{}/stops", state.route_id),
                get(Self::get_route_stops),
            )
            .layer(cors)
            .with_state(state)
    }

    async fn serve(address: String, state: AppState) -> anyhow::Result<()> {
        let route_id = state.route_id;
        let listener = tokio::net::TcpListener::bind(&address)
            .await
            .with_context(|| format!("Failed to bind {}", address))?;

        log::info!("Listening on {}", address);
        BLSViews::show_listening(&address, route_id);

        axum::serve(listener, Self::router(state))
            .with_graceful_shutdown(Self::shutdown_signal())
            .await
            .context("Server error")?;

        log::info!("Server shut down");
        Ok(())
    }

    async fn shutdown_signal() {
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::warn!("Could not listen for Ctrl-C ({}), shutting down", e);
        }
    }

    // ========================================================================
    // Handlers
    // ========================================================================

    /// Clock read, advance and snapshot happen under one lock so polls never overlap
    async fn get_bus_location(State(state): State<AppState>) -> Json<LocationResponse> {
        let snapshot = {
            let mut simulator = state.lock_simulator();
            let now = state.clock.now();
            simulator.advance_and_snapshot(now)
        };

        log::debug!(
            "Bus at stop {} -> {} ({:.4})",
            snapshot.current_stop_index,
            snapshot.next_stop_index,
            snapshot.progress
        );
        Json(LocationResponse::from_snapshot(state.route_id, &snapshot))
    }

    async fn get_route_stops(State(state): State<AppState>) -> Json<StopsResponse> {
        Json(StopsResponse::from_route(state.route_id, &state.route))
    }
}
