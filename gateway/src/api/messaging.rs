//! SMS and webform passthrough under fixed upstream prefixes.

use crate::envelope::{self, HandlerResponse};
use crate::errors::Result;
use crate::principal::Materialized;
use crate::service::AppState;
use http::Method;
use serde_json::Value;

const SMS_PREFIX: &str = "users/api/sms";
const WEBFORM_PREFIX: &str = "workflows/api/webform";

/// `ANY /users/api/sms[/{tail}]`
pub async fn sms(
    state: &AppState,
    materialized: &Materialized,
    method: Method,
    tail: &str,
    query: &[(String, String)],
    body: Option<&Value>,
) -> Result<HandlerResponse> {
    passthrough(state, materialized, method, SMS_PREFIX, tail, query, body).await
}

/// `ANY /workflows/api/webform[/{tail}]`
pub async fn webform(
    state: &AppState,
    materialized: &Materialized,
    method: Method,
    tail: &str,
    query: &[(String, String)],
    body: Option<&Value>,
) -> Result<HandlerResponse> {
    passthrough(
        state,
        materialized,
        method,
        WEBFORM_PREFIX,
        tail,
        query,
        body,
    )
    .await
}

async fn passthrough(
    state: &AppState,
    materialized: &Materialized,
    method: Method,
    prefix: &str,
    tail: &str,
    query: &[(String, String)],
    body: Option<&Value>,
) -> Result<HandlerResponse> {
    let path = join_prefix(prefix, tail);
    let response = state
        .forwarder
        .forward(&materialized.principal, method, &path, query, body)
        .await?;
    Ok(envelope::success(response.status, response.body))
}

fn join_prefix(prefix: &str, tail: &str) -> String {
    let tail = tail.trim_start_matches('/');
    if tail.is_empty() {
        prefix.to_string()
    } else {
        format!("{prefix}/{tail}")
    }
}
