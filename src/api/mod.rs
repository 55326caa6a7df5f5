//! Status API
//!
//! The narrow surface the external dashboard consumes:
//! - `GET /status` -> `{bot_status, total_balance, active_trades}`
//! - `GET /wallets` -> `[{id, name, balance, value}]`
//! - `POST /settings` -> full tunable set, validated and swapped atomically
//! - `GET /ws` -> push channel for typed events

pub mod ws;

use anyhow::Result;
use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use rust_decimal::prelude::ToPrimitive;
use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast;
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{info, warn};

use crate::capital::CapitalManager;
use crate::config::{AppConfig, SharedConfig};
use crate::network::event_bus::ColonyEvent;
use crate::state::SharedState;
use crate::utils::types::WalletSummary;

/// Shared state for API handlers
pub struct ApiState {
    pub config: SharedConfig,
    pub state: Arc<SharedState>,
    pub capital: Arc<CapitalManager>,
    pub event_tx: broadcast::Sender<ColonyEvent>,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub bot_status: String,
    pub total_balance: f64,
    pub active_trades: usize,
}

async fn get_status(State(state): State<Arc<ApiState>>) -> Json<StatusResponse> {
    let ledger = state.capital.snapshot();
    Json(StatusResponse {
        bot_status: state.state.bot_status(),
        total_balance: ledger.total.to_f64().unwrap_or(0.0),
        active_trades: state.state.active_trades(),
    })
}

async fn get_wallets(State(state): State<Arc<ApiState>>) -> Json<Vec<WalletSummary>> {
    let mut wallets: Vec<WalletSummary> =
        state.state.wallets.iter().map(|w| w.clone()).collect();
    wallets.sort_by(|a, b| a.id.cmp(&b.id));
    Json(wallets)
}

/// Apply a full configuration. The snapshot is validated before it becomes
/// visible; a rejected config leaves the previous one active.
async fn post_settings(
    State(state): State<Arc<ApiState>>,
    Json(new_config): Json<AppConfig>,
) -> Response {
    if let Err(e) = new_config.validate() {
        warn!("Rejected settings update: {:#}", e);
        return (StatusCode::BAD_REQUEST, format!("{:#}", e)).into_response();
    }

    state.config.store(Arc::new(new_config));
    let _ = state.event_tx.send(ColonyEvent::ConfigReloaded);
    info!("Settings updated via API");
    StatusCode::NO_CONTENT.into_response()
}

pub fn router(state: Arc<ApiState>, enable_cors: bool) -> Router {
    let mut router = Router::new()
        .route("/status", get(get_status))
        .route("/wallets", get(get_wallets))
        .route("/settings", post(post_settings))
        .route("/ws", get(ws::ws_handler))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    if enable_cors {
        router = router.layer(CorsLayer::permissive());
    }
    router
}

/// Bind and serve until the process exits.
pub async fn serve(state: Arc<ApiState>) -> Result<()> {
    let snapshot = state.config.load_full();
    let addr = snapshot.api.listen_addr.clone();
    let enable_cors = snapshot.api.enable_cors;

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Status API listening on {}", addr);
    axum::serve(listener, router(state, enable_cors)).await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::AppConfig;
    use arc_swap::ArcSwap;

    fn api_state() -> Arc<ApiState> {
        let config: SharedConfig = Arc::new(ArcSwap::from_pointee(AppConfig::default()));
        let (tx, _rx) = broadcast::channel(64);
        let capital = Arc::new(CapitalManager::new(
            AppConfig::default().capital_manager,
            tx.clone(),
        ));
        Arc::new(ApiState {
            config,
            state: Arc::new(SharedState::new()),
            capital,
            event_tx: tx,
        })
    }

    #[tokio::test]
    async fn test_status_reports_ledger_total() {
        let state = api_state();
        let Json(status) = get_status(State(state)).await;
        assert_eq!(status.bot_status, "initializing");
        assert!((status.total_balance - 100.0).abs() < 1e-9);
        assert_eq!(status.active_trades, 0);
    }

    #[tokio::test]
    async fn test_wallets_sorted_and_complete() {
        let state = api_state();
        state.state.wallets.insert(
            "b".to_string(),
            WalletSummary {
                id: "b".to_string(),
                name: "worker b".to_string(),
                balance: 1.0,
                value: 1.0,
            },
        );
        state.state.wallets.insert(
            "a".to_string(),
            WalletSummary {
                id: "a".to_string(),
                name: "worker a".to_string(),
                balance: 2.0,
                value: 2.0,
            },
        );

        let Json(wallets) = get_wallets(State(state)).await;
        assert_eq!(wallets.len(), 2);
        assert_eq!(wallets[0].id, "a");
    }

    #[tokio::test]
    async fn test_settings_rejects_invalid_config() {
        let state = api_state();
        let mut bad = AppConfig::default();
        bad.performance_monitor.scale_down_factor = 1.5;

        let response = post_settings(State(state.clone()), Json(bad)).await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        // Previous snapshot still active
        assert!(state.config.load().validate().is_ok());
    }

    #[tokio::test]
    async fn test_settings_swaps_valid_config() {
        let state = api_state();
        let mut updated = AppConfig::default();
        updated.colony.risk_threshold = 0.5;

        let response = post_settings(State(state.clone()), Json(updated)).await;
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert!((state.config.load().colony.risk_threshold - 0.5).abs() < 1e-9);
    }
}
