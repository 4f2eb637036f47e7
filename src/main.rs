// =============================================================================
// metal-pulse: Main Entry Point
// =============================================================================
//
// Loads the engine config, optionally preloads observations from a seed file,
// runs the scheduled evaluation loop and serves the REST API until Ctrl+C.
// =============================================================================

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use metal_pulse::api;
use metal_pulse::app_state::{AppState, ObservationInput};
use metal_pulse::observation::ObservationStore;
use metal_pulse::runtime_config::EngineConfig;

const DEFAULT_CONFIG_PATH: &str = "engine_config.json";
const DEFAULT_BIND_ADDR: &str = "0.0.0.0:3002";
const DEFAULT_EVAL_INTERVAL_SECS: u64 = 3_600;

fn load_seed(path: &str) -> anyhow::Result<Vec<ObservationInput>> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read seed observations from {path}"))?;
    serde_json::from_str(&content)
        .with_context(|| format!("failed to parse seed observations from {path}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // ── 1. Environment & config ──────────────────────────────────────────
    let _ = dotenv::dotenv();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    info!("metal-pulse starting up");

    let config_path =
        std::env::var("METAL_PULSE_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.into());
    let config = EngineConfig::load(&config_path).unwrap_or_else(|e| {
        warn!(error = %e, path = %config_path, "failed to load engine config, using defaults");
        EngineConfig::default()
    });

    let admin_token = std::env::var("METAL_PULSE_ADMIN_TOKEN").ok();
    if admin_token.as_deref().map_or(true, str::is_empty) {
        warn!("METAL_PULSE_ADMIN_TOKEN is not set, write endpoints are disabled");
    }

    // ── 2. Store & state ─────────────────────────────────────────────────
    let store = Arc::new(ObservationStore::new());
    let state = Arc::new(AppState::new(config, store, admin_token));

    if let Ok(seed_path) = std::env::var("METAL_PULSE_SEED") {
        let seed = load_seed(&seed_path)?;
        let ids = state
            .ingest(seed)
            .with_context(|| format!("rejected seed observations from {seed_path}"))?;
        info!(path = %seed_path, count = ids.len(), "seed observations loaded");
    }

    // ── 3. Scheduled evaluation ──────────────────────────────────────────
    let interval_secs = std::env::var("METAL_PULSE_EVAL_INTERVAL_SECS")
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .filter(|v| *v > 0)
        .unwrap_or(DEFAULT_EVAL_INTERVAL_SECS);

    let eval_state = state.clone();
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(Duration::from_secs(interval_secs));
        loop {
            ticker.tick().await;
            let reports = eval_state.evaluate_all(chrono::Utc::now());
            info!(metals = reports.len(), "scheduled evaluation complete");
        }
    });

    // ── 4. API server ────────────────────────────────────────────────────
    let bind_addr =
        std::env::var("METAL_PULSE_BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.into());
    let listener = tokio::net::TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("failed to bind API server to {bind_addr}"))?;
    info!(addr = %bind_addr, interval_secs, "API server listening");

    let app = api::rest::router(state.clone());
    axum::serve(listener, app)
        .with_graceful_shutdown(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "failed to listen for shutdown signal");
            }
            warn!("shutdown signal received, stopping gracefully");
        })
        .await
        .context("API server failed")?;

    if let Err(e) = state.config.read().save(&config_path) {
        error!(error = %e, "failed to save engine config on shutdown");
    }

    info!("metal-pulse shut down complete");
    Ok(())
}
