// Thin namespace wrapper for API-layer components plus the route table
use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

pub mod handlers {
    pub use crate::handlers::*;
}

use handlers::AppState;

/// Payer-facing endpoints. Rate limiting is layered on by the binary.
pub fn api_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/api/v1/consulta", get(handlers::lookup_payer))
        .route("/api/v1/pagamento", get(handlers::create_payment))
        .route(
            "/api/v1/pagamento/:id/status",
            get(handlers::payment_status),
        )
}

/// Full application without rate limiting.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(handlers::health))
        .merge(api_routes())
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
