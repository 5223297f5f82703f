//! `GET /api/*` handlers. Every handler delegates straight to `QueryService`
//! and returns whatever [`ResponseEnvelope`](crate::envelope::ResponseEnvelope)
//! it produces — validation and degraded-path handling live in the service,
//! not here.

use axum::extract::{Query, State};

use crate::domain::query_spec::{RawAutocompleteParams, RawSearchParams};
use crate::AppState;

pub async fn search(State(state): State<AppState>, Query(params): Query<RawSearchParams>) -> impl axum::response::IntoResponse {
    state.query_service.search(params).await
}

pub async fn autocomplete(
    State(state): State<AppState>,
    Query(params): Query<RawAutocompleteParams>,
) -> impl axum::response::IntoResponse {
    state.query_service.autocomplete(params).await
}

#[derive(Debug, serde::Deserialize)]
pub struct AvailabilityParams {
    pub city_id: Option<String>,
    pub product_ids: Option<String>,
}

pub async fn availability(
    State(state): State<AppState>,
    Query(params): Query<AvailabilityParams>,
) -> impl axum::response::IntoResponse {
    state
        .query_service
        .availability(params.city_id.as_deref(), params.product_ids.as_deref().unwrap_or(""))
        .await
}

pub async fn test(State(state): State<AppState>) -> impl axum::response::IntoResponse {
    state.query_service.test().await
}

pub async fn health() -> &'static str {
    "ok"
}
