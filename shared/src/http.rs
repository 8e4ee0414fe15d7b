use http_body_util::combinators::BoxBody;
use hyper::body::{Bytes, Incoming};
use hyper::header::HeaderMap;
use hyper::service::Service;
use hyper::{Request, Response};
use hyper_util::rt::TokioExecutor;
use hyper_util::rt::TokioIo;
use hyper_util::server::conn::auto::Builder;
use std::sync::Arc;
use tokio::net::TcpListener;

/// Bind `host:port` and serve `service` on every accepted connection.
///
/// Each connection is handed to hyper with h1/h2 auto-detection on the
/// socket. Runs until the listener itself fails; per-connection errors are
/// logged and dropped so a misbehaving client cannot take the loop down.
pub async fn run_http_service<S, E>(host: &str, port: u16, service: S) -> Result<(), E>
where
    S: Service<Request<Incoming>, Response = Response<BoxBody<Bytes, E>>, Error = E>
        + Send
        + Sync
        + 'static,
    S::Future: Send + 'static,
    E: From<std::io::Error> + std::error::Error + Send + Sync + 'static,
{
    let listener = TcpListener::bind(format!("{host}:{port}")).await?;
    tracing::info!(host, port, "listening");

    let service_arc = Arc::new(service);

    loop {
        let (stream, peer_addr) = listener.accept().await?;
        let _ = stream.set_nodelay(true);
        let io = TokioIo::new(stream);
        let svc = service_arc.clone();

        tokio::spawn(async move {
            if let Err(err) = Builder::new(TokioExecutor::new())
                .serve_connection(io, svc)
                .await
            {
                tracing::debug!(%peer_addr, error = %err, "connection ended with error");
            }
        });
    }
}

/// First header among `names` (in order) whose value is readable as UTF-8.
///
/// Header-name synonyms are resolved once at the boundary; callers pass the
/// full ordered list rather than probing headers ad hoc.
pub fn first_header<'a>(headers: &'a HeaderMap, names: &[&str]) -> Option<&'a str> {
    names.iter().find_map(|name| {
        headers
            .get(*name)
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::header::HeaderValue;

    #[test]
    fn test_first_header_order() {
        let mut headers = HeaderMap::new();
        headers.insert("x-location-id", HeaderValue::from_static("fallback"));
        headers.insert("x-crm-location-id", HeaderValue::from_static("primary"));

        let value = first_header(&headers, &["x-crm-location-id", "x-location-id"]);
        assert_eq!(value, Some("primary"));

        headers.remove("x-crm-location-id");
        let value = first_header(&headers, &["x-crm-location-id", "x-location-id"]);
        assert_eq!(value, Some("fallback"));
    }

    #[test]
    fn test_first_header_skips_empty_and_missing() {
        let mut headers = HeaderMap::new();
        headers.insert("x-crm-api-key", HeaderValue::from_static("   "));
        assert_eq!(first_header(&headers, &["x-crm-api-key"]), None);
        assert_eq!(first_header(&headers, &["x-absent"]), None);
    }
}
