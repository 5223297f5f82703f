pub mod handlers;

use axum::http::{Method, Request};
use axum::routing::get;
use axum::Router;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::info_span;

use crate::AppState;

pub fn router(state: AppState) -> Router<()> {
    let cors = CorsLayer::new().allow_methods([Method::GET]).allow_origin(tower_http::cors::Any);

    Router::new()
        .route("/api/search", get(handlers::search))
        .route("/api/autocomplete", get(handlers::autocomplete))
        .route("/api/availability", get(handlers::availability))
        .route("/api/test", get(handlers::test))
        .route("/health", get(handlers::health))
        .layer(
            TraceLayer::new_for_http().make_span_with(|req: &Request<_>| {
                info_span!("http_request", method = %req.method(), uri = %req.uri())
            }),
        )
        .layer(cors)
        .with_state(state)
}
