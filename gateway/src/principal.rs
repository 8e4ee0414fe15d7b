//! Per-request identity.
//!
//! The principal exists only for its request: it is built by the session
//! materializer, carried through the handler, and dropped with the
//! response. There is no process-wide credential or token state.

use crate::authenticator::{Authenticator, UpstreamToken};
use crate::errors::{GatewayError, Result};
use crate::resolver::Resolution;
use crate::session::SessionClaims;
use url::Url;

#[derive(Debug, Clone)]
pub struct Principal {
    /// Resolved upstream identity
    pub username: String,
    /// Upstream bearer token; required for any proxied call
    pub access_token: String,
    /// Tenant base URL every forward is addressed against
    pub base_url: Url,
    /// Calling CRM's tenant identifiers. Only used for stored-credential
    /// lookup; never forwarded upstream. Absent only when a session token
    /// was issued without them.
    pub location_id: Option<String>,
    pub api_key: Option<String>,
}

impl Principal {
    /// Rebuild a principal from verified session claims, defaulting a
    /// missing or unparseable base URL to the configured one.
    pub fn from_claims(claims: SessionClaims, default_base_url: &Url) -> Self {
        let base_url = claims
            .base_url
            .as_deref()
            .and_then(|raw| Url::parse(raw).ok())
            .unwrap_or_else(|| default_base_url.clone());

        Principal {
            username: claims.sub,
            access_token: claims.access_token,
            base_url,
            location_id: claims.location_id,
            api_key: claims.api_key,
        }
    }
}

/// A materialized request identity: the principal, plus the freshly
/// exchanged upstream token when authentication happened on this request
/// (None when a session token was passed through).
pub struct Materialized {
    pub principal: Principal,
    pub token: Option<UpstreamToken>,
}

/// Combine the resolver's output with, if needed, an upstream credential
/// exchange into one principal. Every failure here is terminal for the
/// request.
pub async fn materialize(
    authenticator: &Authenticator,
    default_base_url: &Url,
    resolution: Resolution,
) -> Result<Materialized> {
    match resolution {
        Resolution::Session(principal) => Ok(Materialized {
            principal,
            token: None,
        }),
        Resolution::Credentials {
            username,
            password,
            location_id,
            api_key,
        } => {
            let token = authenticator.authenticate(&username, &password).await?;
            if token.access_token.is_empty() {
                return Err(GatewayError::AuthenticationFailed {
                    details: Some("exchange returned an empty access token".to_string()),
                });
            }

            let base_url = token
                .base_url
                .clone()
                .unwrap_or_else(|| default_base_url.clone());

            Ok(Materialized {
                principal: Principal {
                    username,
                    access_token: token.access_token.clone(),
                    base_url,
                    location_id: Some(location_id),
                    api_key: Some(api_key),
                },
                token: Some(token),
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::unix_now;

    fn default_base() -> Url {
        Url::parse("https://api.telephony.example.com").unwrap()
    }

    fn claims(base_url: Option<&str>) -> SessionClaims {
        let now = unix_now().unwrap();
        SessionClaims {
            sub: "alice".to_string(),
            iat: now,
            exp: now + 3600,
            access_token: "tok".to_string(),
            location_id: None,
            api_key: None,
            base_url: base_url.map(str::to_string),
        }
    }

    #[test]
    fn test_from_claims_uses_tenant_base_url() {
        let principal =
            Principal::from_claims(claims(Some("https://tenant.example.com")), &default_base());
        assert_eq!(principal.base_url.as_str(), "https://tenant.example.com/");
    }

    #[test]
    fn test_from_claims_defaults_base_url() {
        let principal = Principal::from_claims(claims(None), &default_base());
        assert_eq!(principal.base_url, default_base());

        // Unparseable claim falls back rather than failing the request.
        let principal = Principal::from_claims(claims(Some("::notaurl::")), &default_base());
        assert_eq!(principal.base_url, default_base());
    }
}
