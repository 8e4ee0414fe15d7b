//! Session token issuance.

use crate::envelope::{self, HandlerResponse};
use crate::errors::{GatewayError, Result};
use crate::principal::Materialized;
use crate::service::AppState;
use crate::session::{SessionClaims, unix_now};
use http::StatusCode;
use serde_json::json;

/// `POST /api/auth/login`
///
/// Runs the full resolve-then-exchange pipeline (the caller has already
/// done that) and answers with a signed session token carrying the
/// resolved principal. The token expires together with the upstream token
/// embedded in it.
pub async fn login(state: &AppState, materialized: &Materialized) -> Result<HandlerResponse> {
    let principal = &materialized.principal;

    let Some(token) = &materialized.token else {
        // A still-valid session token was presented; there is nothing to
        // exchange and no fresh expiry to promise.
        return Ok(envelope::success(
            StatusCode::OK,
            json!({
                "sessionActive": true,
                "username": principal.username,
                "baseUrl": principal.base_url.as_str(),
            }),
        ));
    };

    let now = unix_now().map_err(|error| GatewayError::Internal(error.to_string()))?;
    let claims = SessionClaims {
        sub: principal.username.clone(),
        iat: now,
        exp: now + token.expires_in,
        access_token: principal.access_token.clone(),
        location_id: principal.location_id.clone(),
        api_key: principal.api_key.clone(),
        base_url: token.base_url.as_ref().map(|url| url.to_string()),
    };
    let session_token = state
        .sessions
        .issue(&claims)
        .map_err(|error| GatewayError::Internal(error.to_string()))?;

    tracing::info!(username = %principal.username, "issued session token");

    Ok(envelope::success(
        StatusCode::OK,
        json!({
            "token": session_token,
            "expiresIn": token.expires_in,
            "username": principal.username,
            "baseUrl": principal.base_url.as_str(),
        }),
    ))
}
