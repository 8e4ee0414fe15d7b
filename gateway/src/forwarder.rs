//! Proxy forwarder.
//!
//! Given a materialized principal and a target upstream path, performs the
//! upstream call with the principal's bearer token attached and maps the
//! result back: a success passes the upstream status and body through
//! verbatim; a non-success upstream response propagates its status and
//! body; a transport failure (timeout included) becomes a 500.

use crate::errors::{GatewayError, Result};
use crate::principal::Principal;
use http::Method;
use http::StatusCode;
use http::header::ACCEPT;
use serde_json::Value;
use std::time::Duration;
use url::Url;

/// A successful (2xx) upstream response.
#[derive(Debug, Clone)]
pub struct UpstreamResponse {
    pub status: StatusCode,
    pub body: Value,
}

pub struct Forwarder {
    client: reqwest::Client,
}

impl Forwarder {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| GatewayError::Internal(error.to_string()))?;
        Ok(Self { client })
    }

    pub async fn forward(
        &self,
        principal: &Principal,
        method: Method,
        path: &str,
        query: &[(String, String)],
        body: Option<&Value>,
    ) -> Result<UpstreamResponse> {
        // Refuse before any I/O; an unauthenticated upstream call must be
        // impossible even if the materializer has a bug.
        if principal.access_token.is_empty() {
            return Err(GatewayError::MissingAccessToken);
        }

        let url = join_upstream_url(&principal.base_url, path)?;
        tracing::debug!(%method, url = %url, "forwarding to upstream");

        let mut request = self
            .client
            .request(method.clone(), url)
            .bearer_auth(&principal.access_token)
            .header(ACCEPT, "application/json");

        if !query.is_empty() {
            request = request.query(query);
        }

        if method != Method::GET && method != Method::HEAD {
            let payload = body
                .cloned()
                .unwrap_or_else(|| Value::Object(serde_json::Map::new()));
            request = request.json(&payload);
        }

        let response = request
            .send()
            .await
            .map_err(|error| GatewayError::UpstreamTransport(error.to_string()))?;

        let status = response.status();
        let bytes = response
            .bytes()
            .await
            .map_err(|error| GatewayError::UpstreamTransport(error.to_string()))?;
        let body = decode_body(&bytes);

        if status.is_success() {
            Ok(UpstreamResponse { status, body })
        } else {
            tracing::warn!(%status, path, "upstream answered with an error status");
            Err(GatewayError::UpstreamResponse { status, body })
        }
    }
}

/// The upstream returns JSON; anything else is preserved as a string so
/// the caller still sees what came back.
fn decode_body(bytes: &[u8]) -> Value {
    if bytes.is_empty() {
        return Value::Null;
    }
    serde_json::from_slice(bytes)
        .unwrap_or_else(|_| Value::String(String::from_utf8_lossy(bytes).into_owned()))
}

/// Join the tenant base URL and an upstream path, collapsing duplicate
/// leading slashes in the path.
fn join_upstream_url(base: &Url, path: &str) -> Result<Url> {
    let joined = format!(
        "{}/{}",
        base.as_str().trim_end_matches('/'),
        path.trim_start_matches('/')
    );
    Url::parse(&joined)
        .map_err(|error| GatewayError::UpstreamTransport(format!("invalid upstream url: {error}")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::{BodyExt, Full};
    use hyper::body::Bytes;
    use hyper::service::service_fn;
    use hyper::{Request, Response};
    use serde_json::json;
    use std::convert::Infallible;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use tokio::net::TcpListener;

    // Reflects the request back as JSON so tests can assert exactly what
    // the forwarder sent. Requests to /missing answer 404.
    async fn reflect_handler(
        req: Request<hyper::body::Incoming>,
        hits: Arc<AtomicUsize>,
    ) -> Result<Response<Full<Bytes>>, Infallible> {
        hits.fetch_add(1, Ordering::SeqCst);

        let (parts, body) = req.into_parts();
        if parts.uri.path() == "/missing" {
            return Ok(Response::builder()
                .status(404)
                .header("content-type", "application/json")
                .body(Full::new(Bytes::from(r#"{"message":"no such record"}"#)))
                .unwrap());
        }

        let body_bytes = body.collect().await.unwrap().to_bytes();
        let reflected = json!({
            "method": parts.method.as_str(),
            "path": parts.uri.path(),
            "query": parts.uri.query(),
            "authorization": parts.headers.get("authorization")
                .and_then(|v| v.to_str().ok()),
            "contentType": parts.headers.get("content-type")
                .and_then(|v| v.to_str().ok()),
            "body": String::from_utf8_lossy(&body_bytes),
        });

        Ok(Response::builder()
            .header("content-type", "application/json")
            .body(Full::new(Bytes::from(reflected.to_string())))
            .unwrap())
    }

    async fn start_upstream() -> (u16, Arc<AtomicUsize>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let hits = Arc::new(AtomicUsize::new(0));
        let server_hits = hits.clone();

        tokio::spawn(async move {
            loop {
                let (stream, _) = listener.accept().await.unwrap();
                let io = hyper_util::rt::TokioIo::new(stream);
                let hits = server_hits.clone();
                tokio::spawn(async move {
                    let _ = hyper_util::server::conn::auto::Builder::new(
                        hyper_util::rt::TokioExecutor::new(),
                    )
                    .serve_connection(
                        io,
                        service_fn(move |req| reflect_handler(req, hits.clone())),
                    )
                    .await;
                });
            }
        });

        (port, hits)
    }

    fn principal(port: u16, token: &str) -> Principal {
        Principal {
            username: "alice".to_string(),
            access_token: token.to_string(),
            base_url: Url::parse(&format!("http://127.0.0.1:{port}")).unwrap(),
            location_id: Some("loc1".to_string()),
            api_key: Some("k1".to_string()),
        }
    }

    fn forwarder() -> Forwarder {
        Forwarder::new(Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn test_forward_get_attaches_token_and_query() {
        let (port, _) = start_upstream().await;
        let query = vec![("page".to_string(), "2".to_string())];

        let response = forwarder()
            .forward(
                &principal(port, "tok-123"),
                Method::GET,
                "users/api/agents",
                &query,
                None,
            )
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body["method"], "GET");
        assert_eq!(response.body["path"], "/users/api/agents");
        assert_eq!(response.body["query"], "page=2");
        assert_eq!(response.body["authorization"], "Bearer tok-123");
        // GET carries no body and no content type.
        assert_eq!(response.body["contentType"], Value::Null);
        assert_eq!(response.body["body"], "");
    }

    #[tokio::test]
    async fn test_forward_post_sends_json_body() {
        let (port, _) = start_upstream().await;
        let body = json!({"name": "Bob"});

        let response = forwarder()
            .forward(
                &principal(port, "tok-123"),
                Method::POST,
                "/data/api/types/outboundlist/L1/leadsupsert",
                &[],
                Some(&body),
            )
            .await
            .unwrap();

        assert_eq!(
            response.body["path"],
            "/data/api/types/outboundlist/L1/leadsupsert"
        );
        assert_eq!(response.body["contentType"], "application/json");
        assert_eq!(response.body["body"], r#"{"name":"Bob"}"#);
    }

    #[tokio::test]
    async fn test_forward_strips_duplicate_leading_slashes() {
        let (port, _) = start_upstream().await;

        let response = forwarder()
            .forward(
                &principal(port, "tok-123"),
                Method::GET,
                "///users/api/sms",
                &[],
                None,
            )
            .await
            .unwrap();

        assert_eq!(response.body["path"], "/users/api/sms");
    }

    #[tokio::test]
    async fn test_missing_token_rejected_without_network_io() {
        let (port, hits) = start_upstream().await;

        let result = forwarder()
            .forward(&principal(port, ""), Method::GET, "anything", &[], None)
            .await;

        assert!(matches!(result, Err(GatewayError::MissingAccessToken)));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_upstream_error_status_propagates() {
        let (port, _) = start_upstream().await;

        match forwarder()
            .forward(&principal(port, "tok"), Method::GET, "missing", &[], None)
            .await
        {
            Err(GatewayError::UpstreamResponse { status, body }) => {
                assert_eq!(status, StatusCode::NOT_FOUND);
                assert_eq!(body["message"], "no such record");
            }
            other => panic!("expected upstream response error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_transport_failure_maps_to_transport_error() {
        // Nothing listens on this port.
        let result = forwarder()
            .forward(&principal(1, "tok"), Method::GET, "x", &[], None)
            .await;
        assert!(matches!(result, Err(GatewayError::UpstreamTransport(_))));
    }

    #[test]
    fn test_join_upstream_url() {
        let base = Url::parse("https://tenant.example.com/api/").unwrap();
        assert_eq!(
            join_upstream_url(&base, "//users/api/sms").unwrap().as_str(),
            "https://tenant.example.com/api/users/api/sms"
        );
        assert_eq!(
            join_upstream_url(&base, "users/api/sms").unwrap().as_str(),
            "https://tenant.example.com/api/users/api/sms"
        );
    }

    #[test]
    fn test_decode_body() {
        assert_eq!(decode_body(b""), Value::Null);
        assert_eq!(decode_body(br#"{"a":1}"#), json!({"a": 1}));
        assert_eq!(decode_body(b"plain text"), json!("plain text"));
    }
}
