//! The uniform response envelope served by every `/api/*` endpoint.

use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;

use crate::error::{AppError, ErrorCode};

#[derive(Debug, Serialize)]
pub struct ResponseEnvelope<T> {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", rename = "errorCode")]
    pub error_code: Option<ErrorCode>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub debug: Option<serde_json::Value>,
}

impl<T> ResponseEnvelope<T> {
    pub fn ok(data: T) -> Self {
        Self {
            success: true,
            data: Some(data),
            error: None,
            error_code: None,
            debug: None,
        }
    }
}

impl<T: Default> ResponseEnvelope<T> {
    /// A well-formed but empty payload, used so degraded responses still
    /// satisfy callers expecting the success shape.
    pub fn degraded_empty(err: &AppError) -> Self {
        let (_, code) = err.status_and_code();
        Self {
            success: false,
            data: Some(T::default()),
            error: Some(err.to_string()),
            error_code: Some(code),
            debug: None,
        }
    }
}

pub fn error_response(err: AppError) -> (StatusCode, Json<ResponseEnvelope<()>>) {
    let (status, code) = err.status_and_code();
    (
        status,
        Json(ResponseEnvelope {
            success: false,
            data: None,
            error: Some(err.to_string()),
            error_code: Some(code),
            debug: None,
        }),
    )
}

impl<T: Serialize> IntoResponse for ResponseEnvelope<T> {
    fn into_response(self) -> axum::response::Response {
        let status = if self.success {
            StatusCode::OK
        } else {
            match self.error_code {
                Some(ErrorCode::InvalidArgument) => StatusCode::BAD_REQUEST,
                Some(ErrorCode::ServiceUnavailable) => StatusCode::SERVICE_UNAVAILABLE,
                _ => StatusCode::INTERNAL_SERVER_ERROR,
            }
        };
        (status, Json(self)).into_response()
    }
}
