use axum::{
    routing::{get, post},
    Router,
};
use metrics_exporter_prometheus::PrometheusHandle;
use sqlx::PgPool;
use std::sync::Arc;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};
use tower_http::trace::TraceLayer;

use super::handlers;
use crate::services::{SettlementCoordinator, WalletLedger};

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    pub ledger: Arc<WalletLedger>,
    pub settlement: Arc<SettlementCoordinator>,
    /// Present when backed by PostgreSQL; used by health checks.
    pub pool: Option<PgPool>,
    pub metrics_handle: Option<PrometheusHandle>,
}

impl AppState {
    pub fn new(ledger: Arc<WalletLedger>, settlement: Arc<SettlementCoordinator>) -> Self {
        Self {
            ledger,
            settlement,
            pool: None,
            metrics_handle: None,
        }
    }

    /// Adds the database pool to the state.
    pub fn with_pool(mut self, pool: PgPool) -> Self {
        self.pool = Some(pool);
        self
    }

    /// Adds metrics handle to the state.
    pub fn with_metrics(mut self, handle: PrometheusHandle) -> Self {
        self.metrics_handle = Some(handle);
        self
    }
}

/// Creates the main API router with all routes.
pub fn create_router(state: AppState) -> Router {
    Router::new()
        // Health endpoints
        .route("/health", get(handlers::health_check))
        .route("/ready", get(handlers::readiness_check))
        .route("/live", get(handlers::liveness_check))
        // Metrics endpoint
        .route("/metrics", get(handlers::metrics_endpoint))
        // Wallet endpoints
        .route("/wallets/:owner_id", get(handlers::get_wallet))
        .route("/wallets/:owner_id/ledger", get(handlers::get_wallet_ledger))
        .route("/wallets/:owner_id/items", get(handlers::get_owned_items))
        .route("/wallets/:owner_id/recharge", post(handlers::recharge_wallet))
        .route("/wallets/:owner_id/deduct", post(handlers::deduct_wallet))
        .route("/wallets/:owner_id/purchases", post(handlers::purchase_item))
        .route("/wallets/:owner_id/reconcile", get(handlers::reconcile_wallet))
        .route("/wallets/:owner_id/unfreeze", post(handlers::unfreeze_wallet))
        // Gateway webhook
        .route("/payments/notify", post(handlers::payment_notify))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(TraceLayer::new_for_http())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
        .with_state(state)
}
