pub mod api;
pub mod config;
pub mod db;
pub mod directory;
pub mod error;
pub mod handover;
pub mod middleware;
pub mod shift;

use axum::{
    middleware as axum_middleware,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use handover::HandoverService;
use middleware::RateLimitLayer;

#[derive(Clone)]
pub struct AppState {
    pub handover_service: Arc<HandoverService>,
}

pub fn build_router(state: Arc<AppState>) -> Router {
    let rate_limit_read = Arc::new(RateLimitLayer::read_heavy());
    let rate_limit_write = Arc::new(RateLimitLayer::write_heavy());

    // separate routers per rate limit tier so no route is counted twice
    let writes = Router::new()
        .route("/handovers", post(api::handover::open_handover))
        .route("/handovers/:id/confirm", post(api::handover::confirm_handover))
        .route("/handovers/bank-deposit", post(api::handover::record_bank_deposit))
        .route_layer({
            let limiter = rate_limit_write.clone();
            axum_middleware::from_fn(move |headers, req, next| {
                let limiter = limiter.clone();
                async move { limiter.middleware(headers, req, next).await }
            })
        });

    let reads = Router::new()
        .route("/handovers/pending", get(api::handover::list_pending))
        .route("/handovers/:id", get(api::handover::get_handover))
        .route("/stations/:station_id/chain", get(api::handover::get_station_chain))
        .route_layer({
            let limiter = rate_limit_read.clone();
            axum_middleware::from_fn(move |headers, req, next| {
                let limiter = limiter.clone();
                async move { limiter.middleware(headers, req, next).await }
            })
        });

    Router::new()
        .route("/health", get(api::health::health_check))
        .route("/config/public", get(api::health::public_config))
        .merge(writes)
        .merge(reads)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
