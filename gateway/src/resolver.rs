//! Credential resolution.
//!
//! A request may carry credentials in four forms: a signed session token,
//! HTTP Basic credentials, header-supplied plaintext, or a stored-credential
//! lookup keyed by the calling CRM's location id and api key. Resolution
//! picks exactly one source by a fixed precedence and normalizes it to
//! either an already-verified principal or one `(username, password)` pair;
//! everything downstream sees a single shape.

use crate::errors::{GatewayError, Result};
use crate::principal::Principal;
use crate::session::SessionKeys;
use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use credstore::{CredentialStore, StoredCredentials};
use hyper::header::{AUTHORIZATION, HeaderMap};
use shared::http::first_header;
use url::Url;

// Ordered synonym lists per logical header field, resolved once here at
// the boundary.
pub const API_KEY_HEADERS: &[&str] = &["x-crm-api-key"];
pub const LOCATION_ID_HEADERS: &[&str] = &["x-crm-location-id", "x-location-id"];
pub const USERNAME_HEADERS: &[&str] = &["x-telephony-username", "x-dialer-username"];
pub const PASSWORD_HEADERS: &[&str] = &["x-telephony-password", "x-dialer-password"];

/// What resolution produced: a principal verified from a session token, or
/// a credential pair that still has to be exchanged with the upstream.
#[derive(Debug, Clone)]
pub enum Resolution {
    Session(Principal),
    Credentials {
        username: String,
        password: String,
        location_id: String,
        api_key: String,
    },
}

pub struct Resolver {
    sessions: SessionKeys,
    store: CredentialStore,
    default_base_url: Url,
}

impl Resolver {
    pub fn new(sessions: SessionKeys, store: CredentialStore, default_base_url: Url) -> Self {
        Self {
            sessions,
            store,
            default_base_url,
        }
    }

    /// Resolve exactly one credential source from the request headers.
    ///
    /// Precedence, first match wins:
    /// 1. `Bearer` token verifying as a signed session token. Verification
    ///    failure falls through silently; this is the only tolerant
    ///    fallback in the pipeline.
    /// 2. `Basic` credentials.
    /// 3. `Bearer` (opaque) plus plaintext username/password headers.
    /// 4. `Bearer` (opaque) plus location id + api key: stored lookup.
    /// 5. No `Authorization` at all, location id + api key: stored lookup.
    ///
    /// A credential pair without both tenant identifiers is a failure in
    /// its own right, reported after resolution and before any exchange.
    pub async fn resolve(&self, headers: &HeaderMap) -> Result<Resolution> {
        let auth_header = headers
            .get(AUTHORIZATION)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty());
        let location_id = first_header(headers, LOCATION_ID_HEADERS);
        let api_key = first_header(headers, API_KEY_HEADERS);
        let header_username = first_header(headers, USERNAME_HEADERS);
        let header_password = first_header(headers, PASSWORD_HEADERS);

        let (username, password) = match auth_header {
            Some(value) => match split_scheme(value) {
                ("Bearer", Some(token)) => {
                    match self.sessions.verify(token) {
                        Ok(claims) => {
                            return Ok(Resolution::Session(Principal::from_claims(
                                claims,
                                &self.default_base_url,
                            )));
                        }
                        Err(error) => {
                            tracing::debug!(
                                error = %error,
                                "bearer token is not a valid session token"
                            );
                        }
                    }

                    if let (Some(username), Some(password)) = (header_username, header_password) {
                        (username.to_string(), password.to_string())
                    } else if let (Some(location_id), Some(api_key)) = (location_id, api_key) {
                        let stored = self.lookup_stored(location_id, api_key).await?;
                        (stored.username, stored.password)
                    } else {
                        return Err(GatewayError::InvalidAuthorizationFormat);
                    }
                }
                ("Basic", Some(payload)) => parse_basic(payload)?,
                _ => return Err(GatewayError::InvalidAuthorizationFormat),
            },
            None => {
                if let (Some(location_id), Some(api_key)) = (location_id, api_key) {
                    let stored = self.lookup_stored(location_id, api_key).await?;
                    (stored.username, stored.password)
                } else {
                    return Err(GatewayError::AuthorizationRequired);
                }
            }
        };

        if username.is_empty() || password.is_empty() {
            return Err(GatewayError::CredentialsRequired);
        }

        let (Some(location_id), Some(api_key)) = (location_id, api_key) else {
            return Err(GatewayError::TenantHeadersRequired);
        };

        Ok(Resolution::Credentials {
            username,
            password,
            location_id: location_id.to_string(),
            api_key: api_key.to_string(),
        })
    }

    async fn lookup_stored(
        &self,
        location_id: &str,
        api_key: &str,
    ) -> Result<StoredCredentials> {
        self.store
            .lookup(location_id, api_key)
            .await
            .map_err(|error| {
                tracing::warn!(location_id, error = %error, "stored credential lookup failed");
                GatewayError::StoredCredentialsNotFound {
                    details: error.to_string(),
                }
            })
    }
}

pub(crate) fn split_scheme(value: &str) -> (&str, Option<&str>) {
    match value.split_once(' ') {
        Some((scheme, rest)) => {
            let rest = rest.trim();
            (scheme, (!rest.is_empty()).then_some(rest))
        }
        None => (value, None),
    }
}

pub(crate) fn parse_basic(payload: &str) -> Result<(String, String)> {
    let decoded = STANDARD
        .decode(payload)
        .map_err(|_| GatewayError::InvalidBasicEncoding)?;
    let decoded = String::from_utf8(decoded).map_err(|_| GatewayError::InvalidBasicEncoding)?;

    // Split at the first separator only; the password may itself contain ':'.
    let Some((username, password)) = decoded.split_once(':') else {
        return Err(GatewayError::InvalidBasicFormat);
    };
    Ok((username.to_string(), password.to_string()))
}
