//! Read-only client for the stored-credential service.
//!
//! The calling CRM keeps upstream platform credentials keyed by
//! `(location_id, api_key)`. This crate looks those records up on behalf of
//! the gateway; it never writes them. Lookups go either to a static table
//! loaded from configuration or to a remote credential service over HTTP,
//! behind one client facade.

pub mod config;

use crate::config::StoreConfig;
use http::StatusCode;
use serde::Deserialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

/// Upstream platform credentials for one CRM location.
#[derive(Clone, Debug, Deserialize, PartialEq)]
pub struct StoredCredentials {
    pub username: String,
    pub password: String,
}

#[derive(thiserror::Error, Debug)]
pub enum StoreError {
    #[error("no stored credentials for this location")]
    NotFound,
    #[error("credential store is unavailable")]
    Unavailable,
    #[error("credential store request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("credential store returned unexpected status {0}")]
    UnexpectedStatus(StatusCode),
}

/// A credential lookup client backed by either an in-process static table
/// or a remote credential service.
#[derive(Clone)]
pub struct CredentialStore(StoreInner);

impl CredentialStore {
    pub fn from_config(config: &StoreConfig, timeout: Duration) -> Result<Self, StoreError> {
        match config {
            StoreConfig::Static { records } => {
                let table = records
                    .iter()
                    .map(|record| {
                        (
                            (record.location_id.clone(), record.api_key.clone()),
                            StoredCredentials {
                                username: record.username.clone(),
                                password: record.password.clone(),
                            },
                        )
                    })
                    .collect();
                Ok(CredentialStore(StoreInner::Static(Arc::new(table))))
            }
            StoreConfig::Http { url } => {
                let client = reqwest::Client::builder().timeout(timeout).build()?;
                Ok(CredentialStore(StoreInner::Http(HttpStore {
                    client,
                    url: url.clone(),
                })))
            }
        }
    }

    /// Build a store from an in-memory table. Useful when the caller has
    /// already resolved records some other way, and in tests.
    pub fn from_table(table: HashMap<(String, String), StoredCredentials>) -> Self {
        CredentialStore(StoreInner::Static(Arc::new(table)))
    }

    /// Fetch the credential record for `(location_id, api_key)`.
    pub async fn lookup(
        &self,
        location_id: &str,
        api_key: &str,
    ) -> Result<StoredCredentials, StoreError> {
        match &self.0 {
            StoreInner::Static(table) => table
                .get(&(location_id.to_string(), api_key.to_string()))
                .cloned()
                .ok_or(StoreError::NotFound),
            StoreInner::Http(store) => store.lookup(location_id, api_key).await,
        }
    }
}

#[derive(Clone)]
enum StoreInner {
    Static(Arc<HashMap<(String, String), StoredCredentials>>),
    Http(HttpStore),
}

#[derive(Clone)]
struct HttpStore {
    client: reqwest::Client,
    url: String,
}

impl HttpStore {
    async fn lookup(
        &self,
        location_id: &str,
        api_key: &str,
    ) -> Result<StoredCredentials, StoreError> {
        tracing::debug!(location_id, "looking up stored credentials");
        let response = self
            .client
            .get(&self.url)
            .query(&[("location_id", location_id)])
            .bearer_auth(api_key)
            .send()
            .await?;

        match response.status() {
            StatusCode::OK => Ok(response.json::<StoredCredentials>().await?),
            StatusCode::NOT_FOUND => Err(StoreError::NotFound),
            // The store answers 401/403 for an api key that does not match
            // the location; callers treat that the same as a missing record.
            StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN => Err(StoreError::NotFound),
            StatusCode::SERVICE_UNAVAILABLE => Err(StoreError::Unavailable),
            status => Err(StoreError::UnexpectedStatus(status)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::Full;
    use hyper::body::Bytes;
    use hyper::service::service_fn;
    use hyper::{Request, Response};
    use std::convert::Infallible;
    use tokio::net::TcpListener;

    fn test_table() -> HashMap<(String, String), StoredCredentials> {
        HashMap::from([(
            ("loc1".to_string(), "k1".to_string()),
            StoredCredentials {
                username: "alice".to_string(),
                password: "pw".to_string(),
            },
        )])
    }

    #[tokio::test]
    async fn test_static_lookup_hit() {
        let store = CredentialStore::from_table(test_table());
        let creds = store.lookup("loc1", "k1").await.unwrap();
        assert_eq!(creds.username, "alice");
        assert_eq!(creds.password, "pw");
    }

    #[tokio::test]
    async fn test_static_lookup_miss() {
        let store = CredentialStore::from_table(test_table());
        assert!(matches!(
            store.lookup("loc1", "wrong-key").await,
            Err(StoreError::NotFound)
        ));
        assert!(matches!(
            store.lookup("other", "k1").await,
            Err(StoreError::NotFound)
        ));
    }

    async fn credential_handler(
        req: Request<hyper::body::Incoming>,
    ) -> Result<Response<Full<Bytes>>, Infallible> {
        let authorized = req
            .headers()
            .get("authorization")
            .and_then(|v| v.to_str().ok())
            == Some("Bearer k1");
        let known_location = req.uri().query().unwrap_or("").contains("location_id=loc1");

        let response = if !authorized {
            Response::builder()
                .status(401)
                .body(Full::new(Bytes::new()))
                .unwrap()
        } else if !known_location {
            Response::builder()
                .status(404)
                .body(Full::new(Bytes::new()))
                .unwrap()
        } else {
            Response::builder()
                .header("content-type", "application/json")
                .body(Full::new(Bytes::from(
                    r#"{"username":"alice","password":"pw"}"#,
                )))
                .unwrap()
        };
        Ok(response)
    }

    async fn start_test_store() -> u16 {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        tokio::spawn(async move {
            loop {
                let (stream, _) = listener.accept().await.unwrap();
                let io = hyper_util::rt::TokioIo::new(stream);
                tokio::spawn(async move {
                    let _ = hyper_util::server::conn::auto::Builder::new(
                        hyper_util::rt::TokioExecutor::new(),
                    )
                    .serve_connection(io, service_fn(credential_handler))
                    .await;
                });
            }
        });

        port
    }

    fn http_store(port: u16) -> CredentialStore {
        CredentialStore::from_config(
            &StoreConfig::Http {
                url: format!("http://127.0.0.1:{port}/lookup"),
            },
            Duration::from_secs(2),
        )
        .unwrap()
    }

    #[tokio::test]
    async fn test_http_lookup_hit() {
        let port = start_test_store().await;
        let store = http_store(port);

        let creds = store.lookup("loc1", "k1").await.unwrap();
        assert_eq!(
            creds,
            StoredCredentials {
                username: "alice".to_string(),
                password: "pw".to_string(),
            }
        );
    }

    #[tokio::test]
    async fn test_http_lookup_not_found_and_bad_key() {
        let port = start_test_store().await;
        let store = http_store(port);

        assert!(matches!(
            store.lookup("unknown", "k1").await,
            Err(StoreError::NotFound)
        ));
        assert!(matches!(
            store.lookup("loc1", "bad").await,
            Err(StoreError::NotFound)
        ));
    }

    #[tokio::test]
    async fn test_http_lookup_transport_error() {
        // Nothing listens on this port.
        let store = http_store(1);
        assert!(matches!(
            store.lookup("loc1", "k1").await,
            Err(StoreError::Request(_))
        ));
    }
}
