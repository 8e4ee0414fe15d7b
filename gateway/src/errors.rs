use http::StatusCode;
use thiserror::Error;

/// Result type alias for gateway operations
pub type Result<T, E = GatewayError> = std::result::Result<T, E>;

/// Pipeline stage a request was in when it failed.
///
/// A request moves resolving -> authenticating -> forwarding -> responded;
/// every failure is terminal for its request and is labeled with the stage
/// it happened in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Resolving,
    Authenticating,
    Forwarding,
    Responding,
}

impl Stage {
    pub const fn as_str(&self) -> &'static str {
        match self {
            Stage::Resolving => "resolving",
            Stage::Authenticating => "authenticating",
            Stage::Forwarding => "forwarding",
            Stage::Responding => "responding",
        }
    }
}

/// Errors that can occur while handling a gateway request
#[derive(Error, Debug)]
pub enum GatewayError {
    #[error("Authorization is required")]
    AuthorizationRequired,

    #[error("Invalid Basic credentials encoding")]
    InvalidBasicEncoding,

    #[error("Invalid Basic credentials format")]
    InvalidBasicFormat,

    #[error(
        "Invalid authorization format. Use Bearer <session token>, Basic <base64(username:password)>, or send the CRM api key and location id headers"
    )]
    InvalidAuthorizationFormat,

    #[error("Username and password are required")]
    CredentialsRequired,

    #[error("The CRM api key and location id headers are required")]
    TenantHeadersRequired,

    #[error("Stored credentials not found for location")]
    StoredCredentialsNotFound { details: String },

    #[error("Invalid credentials")]
    AuthenticationFailed { details: Option<String> },

    /// The materializer guarantees a token before any forward; this guard
    /// exists so a bug there can never turn into an unauthenticated
    /// upstream call.
    #[error("Missing upstream access token")]
    MissingAccessToken,

    /// The upstream answered with a non-success status; its status and
    /// decoded body are propagated to the caller.
    #[error("Upstream API request failed")]
    UpstreamResponse {
        status: StatusCode,
        body: serde_json::Value,
    },

    #[error("Upstream request failed: {0}")]
    UpstreamTransport(String),

    #[error("{0} is required")]
    FieldRequired(&'static str),

    #[error("Unsupported HTTP method: {0}")]
    UnsupportedMethod(String),

    #[error("Failed to read request body: {0}")]
    RequestBody(String),

    #[error("Not found")]
    RouteNotFound,

    #[error("Internal server error")]
    Internal(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl GatewayError {
    /// HTTP status the envelope for this error is sent with.
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::AuthorizationRequired
            | GatewayError::InvalidBasicEncoding
            | GatewayError::InvalidBasicFormat
            | GatewayError::InvalidAuthorizationFormat
            | GatewayError::CredentialsRequired
            | GatewayError::TenantHeadersRequired
            | GatewayError::StoredCredentialsNotFound { .. }
            | GatewayError::AuthenticationFailed { .. }
            | GatewayError::MissingAccessToken => StatusCode::UNAUTHORIZED,
            GatewayError::UpstreamResponse { status, .. } => *status,
            GatewayError::FieldRequired(_)
            | GatewayError::UnsupportedMethod(_)
            | GatewayError::RequestBody(_) => StatusCode::BAD_REQUEST,
            GatewayError::RouteNotFound => StatusCode::NOT_FOUND,
            GatewayError::UpstreamTransport(_)
            | GatewayError::Internal(_)
            | GatewayError::Io(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            GatewayError::AuthorizationRequired
            | GatewayError::InvalidBasicEncoding
            | GatewayError::InvalidBasicFormat
            | GatewayError::InvalidAuthorizationFormat
            | GatewayError::CredentialsRequired
            | GatewayError::TenantHeadersRequired
            | GatewayError::StoredCredentialsNotFound { .. }
            | GatewayError::FieldRequired(_)
            | GatewayError::UnsupportedMethod(_)
            | GatewayError::RequestBody(_)
            | GatewayError::RouteNotFound => Stage::Resolving,
            GatewayError::AuthenticationFailed { .. } => Stage::Authenticating,
            GatewayError::MissingAccessToken
            | GatewayError::UpstreamResponse { .. }
            | GatewayError::UpstreamTransport(_) => Stage::Forwarding,
            GatewayError::Internal(_) | GatewayError::Io(_) => Stage::Responding,
        }
    }

    /// Extra failure detail carried into the envelope's `details` field.
    pub fn details(&self) -> Option<serde_json::Value> {
        match self {
            GatewayError::StoredCredentialsNotFound { details } => {
                Some(serde_json::Value::String(details.clone()))
            }
            GatewayError::AuthenticationFailed { details } => details
                .as_ref()
                .map(|detail| serde_json::Value::String(detail.clone())),
            GatewayError::UpstreamResponse { body, .. } if !body.is_null() => Some(body.clone()),
            _ => None,
        }
    }

    /// True for failures that indicate a bug or infrastructure problem
    /// rather than a caller mistake; these are logged at error level with
    /// full context and answered with a generic message.
    pub fn is_internal(&self) -> bool {
        matches!(
            self,
            GatewayError::Internal(_) | GatewayError::Io(_) | GatewayError::UpstreamTransport(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            GatewayError::AuthorizationRequired.status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            GatewayError::FieldRequired("outboundListId").status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(GatewayError::RouteNotFound.status(), StatusCode::NOT_FOUND);
        assert_eq!(
            GatewayError::UpstreamTransport("timed out".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        // Upstream statuses pass through untouched.
        assert_eq!(
            GatewayError::UpstreamResponse {
                status: StatusCode::CONFLICT,
                body: serde_json::Value::Null,
            }
            .status(),
            StatusCode::CONFLICT
        );
    }

    #[test]
    fn test_stage_labels() {
        assert_eq!(
            GatewayError::InvalidBasicFormat.stage(),
            Stage::Resolving
        );
        assert_eq!(
            GatewayError::AuthenticationFailed { details: None }.stage(),
            Stage::Authenticating
        );
        assert_eq!(
            GatewayError::MissingAccessToken.stage(),
            Stage::Forwarding
        );
        assert_eq!(Stage::Forwarding.as_str(), "forwarding");
    }

    #[test]
    fn test_details() {
        let err = GatewayError::StoredCredentialsNotFound {
            details: "no stored credentials for this location".to_string(),
        };
        assert_eq!(
            err.details(),
            Some(serde_json::Value::String(
                "no stored credentials for this location".to_string()
            ))
        );
        assert_eq!(GatewayError::AuthorizationRequired.details(), None);
    }
}
