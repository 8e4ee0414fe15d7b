use crate::envelope::{self, HandlerResponse};
use http::StatusCode;
use serde_json::json;

/// Liveness probe; no authentication, no upstream call.
pub fn health() -> HandlerResponse {
    envelope::success(StatusCode::OK, json!({"status": "ok"}))
}
