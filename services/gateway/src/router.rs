use crate::handlers::{health, market_change, proxy};
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, post},
};
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

pub fn create_router(state: AppState) -> Router {
    let api_routes = Router::new()
        .route(
            "/market-change",
            post(market_change::add_market)
                .put(market_change::update_market)
                .delete(market_change::delete_market)
                .fallback(market_change::unsupported),
        )
        .route("/events", get(proxy::list_events))
        .route("/requests/{id}", get(proxy::request_status));

    Router::new()
        .nest("/api/v1", api_routes)
        .route("/health", get(health::health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
