//! Lead upsert endpoints.
//!
//! The authenticated routes forward into a specific outbound list behind
//! the full resolver middleware. The public variant authenticates per call
//! from Basic credentials or body fields and never touches the stored
//! credential path.

use crate::envelope::{self, HandlerResponse};
use crate::errors::{GatewayError, Result};
use crate::principal::{Materialized, Principal};
use crate::resolver::{parse_basic, split_scheme};
use crate::service::AppState;
use http::Method;
use hyper::header::{AUTHORIZATION, HeaderMap};
use serde_json::{Map, Value, json};

/// Fields that belong to this gateway's own request shape, never to the
/// upstream lead record.
const FRAMEWORK_FIELDS: &[&str] = &[
    "lead",
    "outboundListId",
    "outbound_list_id",
    "username",
    "password",
];

/// `POST /data/api/types/outboundlist/{list_id}/lead`
pub async fn upsert_lead(
    state: &AppState,
    materialized: &Materialized,
    list_id: &str,
    body: Option<&Value>,
) -> Result<HandlerResponse> {
    let payload = extract_lead_payload(body);
    forward_upsert(state, &materialized.principal, list_id, &payload).await
}

/// `POST /data/api/types/campaignoutboundlist`: body forwarded verbatim.
pub async fn campaign_outbound_list(
    state: &AppState,
    materialized: &Materialized,
    body: Option<&Value>,
) -> Result<HandlerResponse> {
    let payload = body.cloned().unwrap_or_else(|| json!({}));
    let response = state
        .forwarder
        .forward(
            &materialized.principal,
            Method::POST,
            "data/api/types/campaignoutboundlist",
            &[],
            Some(&payload),
        )
        .await?;
    Ok(envelope::success(response.status, response.body))
}

/// `POST /public/outboundlist[/{list_id}]/leadsupsert`
///
/// Credentials come from Basic auth or the body's `username`/`password`
/// fields; the list id from the path or the body. Authentication happens
/// on every call; there is no session or stored-credential path here.
pub async fn public_upsert(
    state: &AppState,
    headers: &HeaderMap,
    list_id: Option<String>,
    body: Option<&Value>,
) -> Result<HandlerResponse> {
    let (username, password) = public_credentials(headers, body)?;
    let list_id = list_id
        .or_else(|| body_list_id(body))
        .ok_or(GatewayError::FieldRequired("outboundListId"))?;

    let token = state.authenticator.authenticate(&username, &password).await?;
    let principal = Principal {
        username,
        access_token: token.access_token.clone(),
        base_url: token
            .base_url
            .clone()
            .unwrap_or_else(|| state.default_base_url.clone()),
        location_id: None,
        api_key: None,
    };

    let payload = extract_lead_payload(body);
    forward_upsert(state, &principal, &list_id, &payload).await
}

async fn forward_upsert(
    state: &AppState,
    principal: &Principal,
    list_id: &str,
    payload: &Value,
) -> Result<HandlerResponse> {
    let path = format!("data/api/types/outboundlist/{list_id}/leadsupsert");
    let response = state
        .forwarder
        .forward(principal, Method::POST, &path, &[], Some(payload))
        .await?;
    Ok(envelope::success(response.status, response.body))
}

/// Basic credentials win; a malformed Basic header falls back to the body
/// fields here (the public endpoint is tolerant where the middleware is
/// not).
fn public_credentials(headers: &HeaderMap, body: Option<&Value>) -> Result<(String, String)> {
    if let Some(value) = headers.get(AUTHORIZATION).and_then(|v| v.to_str().ok())
        && let ("Basic", Some(payload)) = split_scheme(value)
        && let Ok(credentials) = parse_basic(payload)
    {
        return Ok(credentials);
    }

    let field = |name: &str| {
        body.and_then(|b| b.get(name))
            .and_then(Value::as_str)
            .filter(|text| !text.is_empty())
            .map(str::to_string)
    };
    match (field("username"), field("password")) {
        (Some(username), Some(password)) => Ok((username, password)),
        _ => Err(GatewayError::CredentialsRequired),
    }
}

fn body_list_id(body: Option<&Value>) -> Option<String> {
    let body = body?;
    ["outboundListId", "outbound_list_id"]
        .iter()
        .find_map(|key| body.get(key))
        .and_then(Value::as_str)
        .map(str::to_string)
}

/// The upstream payload is the nested `lead` object when present, else the
/// top-level fields minus this gateway's own.
fn extract_lead_payload(body: Option<&Value>) -> Value {
    match body {
        Some(Value::Object(map)) => {
            if let Some(lead @ Value::Object(_)) = map.get("lead") {
                return lead.clone();
            }
            let remaining: Map<String, Value> = map
                .iter()
                .filter(|(key, _)| !FRAMEWORK_FIELDS.contains(&key.as_str()))
                .map(|(key, value)| (key.clone(), value.clone()))
                .collect();
            Value::Object(remaining)
        }
        _ => json!({}),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::Engine as _;
    use base64::engine::general_purpose::STANDARD;
    use hyper::header::HeaderValue;

    #[test]
    fn test_extract_nested_lead_object() {
        let body = json!({"lead": {"name": "Bob"}, "outboundListId": "L1"});
        assert_eq!(extract_lead_payload(Some(&body)), json!({"name": "Bob"}));
    }

    #[test]
    fn test_extract_top_level_fields_strips_framework_keys() {
        let body = json!({
            "outboundListId": "L1",
            "outbound_list_id": "L1",
            "username": "alice",
            "password": "pw",
            "name": "Bob",
            "phone": "+15550100",
        });
        assert_eq!(
            extract_lead_payload(Some(&body)),
            json!({"name": "Bob", "phone": "+15550100"})
        );
    }

    #[test]
    fn test_extract_from_missing_or_non_object_body() {
        assert_eq!(extract_lead_payload(None), json!({}));
        assert_eq!(extract_lead_payload(Some(&json!("text"))), json!({}));
        // A non-object `lead` field is treated as a framework key, not a payload.
        assert_eq!(extract_lead_payload(Some(&json!({"lead": 3}))), json!({}));
    }

    #[test]
    fn test_public_credentials_prefers_basic() {
        let mut headers = HeaderMap::new();
        let encoded = STANDARD.encode("alice:pw");
        headers.insert(
            AUTHORIZATION,
            HeaderValue::from_str(&format!("Basic {encoded}")).unwrap(),
        );
        let body = json!({"username": "other", "password": "other-pw"});

        let (username, password) = public_credentials(&headers, Some(&body)).unwrap();
        assert_eq!(username, "alice");
        assert_eq!(password, "pw");
    }

    #[test]
    fn test_public_credentials_falls_back_to_body() {
        let body = json!({"username": "alice", "password": "pw"});
        let (username, _) = public_credentials(&HeaderMap::new(), Some(&body)).unwrap();
        assert_eq!(username, "alice");

        // Malformed Basic header is tolerated when the body has credentials.
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_static("Basic !!!"));
        assert!(public_credentials(&headers, Some(&body)).is_ok());
    }

    #[test]
    fn test_public_credentials_missing() {
        assert!(matches!(
            public_credentials(&HeaderMap::new(), None),
            Err(GatewayError::CredentialsRequired)
        ));
    }

    #[test]
    fn test_body_list_id_synonyms() {
        assert_eq!(
            body_list_id(Some(&json!({"outboundListId": "L1"}))),
            Some("L1".to_string())
        );
        assert_eq!(
            body_list_id(Some(&json!({"outbound_list_id": "L2"}))),
            Some("L2".to_string())
        );
        assert_eq!(body_list_id(Some(&json!({}))), None);
    }
}
