//! The uniform response envelope every gateway outcome is rendered as:
//! `{success, data?, message?, details?}`.

use crate::errors::GatewayError;
use bytes::Bytes;
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::header::{CONTENT_TYPE, HeaderValue};
use hyper::{Response, StatusCode};
use serde::Serialize;
use serde_json::Value;

pub type HandlerBody = BoxBody<Bytes, GatewayError>;
pub type HandlerResponse = Response<HandlerBody>;

#[derive(Serialize, Debug)]
pub struct Envelope {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

/// Successful outcome: the upstream's (or handler's) status with its body
/// wrapped under `data`.
pub fn success(status: StatusCode, data: Value) -> HandlerResponse {
    json_response(
        status,
        &Envelope {
            success: true,
            data: Some(data),
            message: None,
            details: None,
        },
    )
}

/// Failure envelope for `error`, with the status the error maps to.
///
/// For propagated upstream failures the upstream body's `message` field is
/// surfaced when present; internal failures get a generic message only,
/// never the underlying error text.
pub fn failure(error: &GatewayError) -> HandlerResponse {
    json_response(
        error.status(),
        &Envelope {
            success: false,
            data: None,
            message: Some(failure_message(error)),
            details: error.details(),
        },
    )
}

fn failure_message(error: &GatewayError) -> String {
    match error {
        GatewayError::UpstreamResponse { body, .. } => body
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string()),
        _ => error.to_string(),
    }
}

fn json_response(status: StatusCode, envelope: &Envelope) -> HandlerResponse {
    // Envelope serialization cannot fail; the fallback keeps the status
    // even if it somehow does.
    let bytes = serde_json::to_vec(envelope)
        .unwrap_or_else(|_| br#"{"success":false,"message":"Internal server error"}"#.to_vec());

    let mut response = Response::new(Full::new(Bytes::from(bytes)).map_err(|e| match e {}).boxed());
    *response.status_mut() = status;
    response
        .headers_mut()
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}
