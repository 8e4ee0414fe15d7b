//! Generic passthrough endpoints under `/api/telephony/`.

use crate::envelope::{self, HandlerResponse};
use crate::errors::{GatewayError, Result};
use crate::principal::Materialized;
use crate::service::AppState;
use http::{Method, StatusCode};
use serde_json::{Map, Value, json};

/// Forward one passthrough call and wrap the upstream's answer.
pub async fn forward(
    state: &AppState,
    materialized: &Materialized,
    method: Method,
    path: &str,
    query: &[(String, String)],
    body: Option<&Value>,
) -> Result<HandlerResponse> {
    let response = state
        .forwarder
        .forward(&materialized.principal, method, path, query, body)
        .await?;
    Ok(envelope::success(response.status, response.body))
}

/// `ANY /api/telephony/request`: the target method, endpoint, payload and
/// query parameters all come from the JSON body.
pub async fn request(
    state: &AppState,
    materialized: &Materialized,
    body: Option<&Value>,
) -> Result<HandlerResponse> {
    let body = body.ok_or(GatewayError::FieldRequired("method and endpoint"))?;

    let method_name = body
        .get("method")
        .and_then(Value::as_str)
        .ok_or(GatewayError::FieldRequired("method"))?;
    let endpoint = body
        .get("endpoint")
        .and_then(Value::as_str)
        .ok_or(GatewayError::FieldRequired("endpoint"))?;
    let method = parse_target_method(method_name)?;

    let query = body
        .get("params")
        .and_then(Value::as_object)
        .map(query_from_params)
        .unwrap_or_default();
    let payload = body.get("data").cloned().unwrap_or_else(|| json!({}));

    let response = state
        .forwarder
        .forward(
            &materialized.principal,
            method,
            endpoint,
            &query,
            Some(&payload),
        )
        .await?;
    Ok(envelope::success(response.status, response.body))
}

/// `GET /api/telephony/status`: report this request's principal without
/// touching the upstream.
pub fn status(materialized: &Materialized) -> HandlerResponse {
    let principal = &materialized.principal;
    envelope::success(
        StatusCode::OK,
        json!({
            "connected": !principal.access_token.is_empty(),
            "username": principal.username,
            "baseUrl": principal.base_url.as_str(),
            "tokenExpiresIn": materialized.token.as_ref().map(|token| token.expires_in),
        }),
    )
}

fn parse_target_method(name: &str) -> Result<Method> {
    match name.to_ascii_lowercase().as_str() {
        "get" => Ok(Method::GET),
        "post" => Ok(Method::POST),
        "put" => Ok(Method::PUT),
        "delete" => Ok(Method::DELETE),
        _ => Err(GatewayError::UnsupportedMethod(name.to_string())),
    }
}

fn query_from_params(params: &Map<String, Value>) -> Vec<(String, String)> {
    params
        .iter()
        .map(|(key, value)| {
            let rendered = match value {
                Value::String(text) => text.clone(),
                other => other.to_string(),
            };
            (key.clone(), rendered)
        })
        .collect()
}
