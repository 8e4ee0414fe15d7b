//! The hyper service driving every request through the pipeline:
//! route match, credential resolution, session materialization, handler
//! dispatch, envelope rendering.

use crate::api;
use crate::authenticator::Authenticator;
use crate::config::Config;
use crate::envelope::{self, HandlerBody, HandlerResponse};
use crate::errors::{GatewayError, Result};
use crate::forwarder::Forwarder;
use crate::metrics_defs::{REQUEST_DURATION, REQUEST_FAILURES};
use crate::principal::{Materialized, materialize};
use crate::resolver::Resolver;
use crate::router::{self, Route};
use crate::session::SessionKeys;
use credstore::CredentialStore;
use http::Method;
use http_body_util::BodyExt;
use hyper::body::Incoming;
use hyper::header::HeaderMap;
use hyper::service::Service;
use hyper::{Request, Response};
use serde_json::Value;
use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::time::{Duration, Instant};
use url::Url;

/// Process-wide immutable state shared by all requests.
pub struct AppState {
    pub resolver: Resolver,
    pub authenticator: Authenticator,
    pub forwarder: Forwarder,
    pub sessions: SessionKeys,
    pub default_base_url: Url,
}

impl AppState {
    pub fn from_config(config: &Config) -> Result<Self> {
        let timeout = Duration::from_secs(config.upstream.timeout_secs);
        let sessions = SessionKeys::new(&config.session.signing_secret);
        let store = CredentialStore::from_config(&config.credential_store, timeout)
            .map_err(|error| GatewayError::Internal(error.to_string()))?;

        Ok(Self {
            resolver: Resolver::new(
                sessions.clone(),
                store,
                config.upstream.base_url.clone(),
            ),
            authenticator: Authenticator::new(config.upstream.login_url.clone(), timeout)?,
            forwarder: Forwarder::new(timeout)?,
            sessions,
            default_base_url: config.upstream.base_url.clone(),
        })
    }
}

pub struct GatewayService {
    state: Arc<AppState>,
}

impl GatewayService {
    pub fn new(state: Arc<AppState>) -> Self {
        Self { state }
    }
}

impl Service<Request<Incoming>> for GatewayService {
    type Response = Response<HandlerBody>;
    type Error = GatewayError;
    type Future =
        Pin<Box<dyn Future<Output = Result<Self::Response, Self::Error>> + Send + 'static>>;

    fn call(&self, req: Request<Incoming>) -> Self::Future {
        let state = self.state.clone();

        Box::pin(async move {
            let method = req.method().clone();
            let path = req.uri().path().to_string();
            let started = Instant::now();

            let response = match handle(&state, req).await {
                Ok(response) => response,
                Err(error) => {
                    if error.is_internal() {
                        // Full error detail goes to the log; the caller only
                        // ever sees the safe envelope message.
                        tracing::error!(
                            %method,
                            path,
                            stage = error.stage().as_str(),
                            error = ?error,
                            "request failed"
                        );
                    } else {
                        tracing::debug!(
                            %method,
                            path,
                            stage = error.stage().as_str(),
                            error = %error,
                            "request rejected"
                        );
                    }
                    shared::counter!(REQUEST_FAILURES, "stage" => error.stage().as_str())
                        .increment(1);
                    envelope::failure(&error)
                }
            };

            shared::histogram!(REQUEST_DURATION).record(started.elapsed().as_secs_f64());
            Ok(response)
        })
    }
}

/// Drive one request through the pipeline. Generic over the body type so
/// tests can feed fixed bodies instead of hyper's `Incoming`.
async fn handle<B>(state: &AppState, req: Request<B>) -> Result<HandlerResponse>
where
    B: hyper::body::Body + Send,
    B::Data: Send,
    B::Error: std::error::Error + Send + Sync + 'static,
{
    let (parts, body) = req.into_parts();
    let route =
        router::match_route(&parts.method, parts.uri.path()).ok_or(GatewayError::RouteNotFound)?;

    let bytes = body
        .collect()
        .await
        .map_err(|error| GatewayError::RequestBody(error.to_string()))?
        .to_bytes();
    let body = parse_body(&bytes)?;
    let query = parse_query(parts.uri.query());

    // Each arm that talks to the upstream first runs the resolver
    // middleware; `health` and the public upsert do not.
    match route {
        Route::Health => Ok(api::health::health()),
        Route::PublicLeadsUpsert { list_id } => {
            api::leads::public_upsert(state, &parts.headers, list_id, body.as_ref()).await
        }
        Route::Login => {
            let materialized = authenticate(state, &parts.headers).await?;
            api::login::login(state, &materialized).await
        }
        Route::TelephonyGet { path } => {
            let materialized = authenticate(state, &parts.headers).await?;
            api::telephony::forward(state, &materialized, Method::GET, &path, &query, None).await
        }
        Route::TelephonyPost { path } => {
            let materialized = authenticate(state, &parts.headers).await?;
            api::telephony::forward(
                state,
                &materialized,
                Method::POST,
                &path,
                &query,
                body.as_ref(),
            )
            .await
        }
        Route::TelephonyPut { path } => {
            let materialized = authenticate(state, &parts.headers).await?;
            api::telephony::forward(
                state,
                &materialized,
                Method::PUT,
                &path,
                &query,
                body.as_ref(),
            )
            .await
        }
        Route::TelephonyDelete { path } => {
            let materialized = authenticate(state, &parts.headers).await?;
            api::telephony::forward(
                state,
                &materialized,
                Method::DELETE,
                &path,
                &query,
                body.as_ref(),
            )
            .await
        }
        Route::TelephonyRequest => {
            let materialized = authenticate(state, &parts.headers).await?;
            api::telephony::request(state, &materialized, body.as_ref()).await
        }
        Route::TelephonyStatus => {
            let materialized = authenticate(state, &parts.headers).await?;
            Ok(api::telephony::status(&materialized))
        }
        Route::OutboundListLead { list_id } => {
            let materialized = authenticate(state, &parts.headers).await?;
            api::leads::upsert_lead(state, &materialized, &list_id, body.as_ref()).await
        }
        Route::CampaignOutboundList => {
            let materialized = authenticate(state, &parts.headers).await?;
            api::leads::campaign_outbound_list(state, &materialized, body.as_ref()).await
        }
        Route::UsersSms { tail } => {
            let materialized = authenticate(state, &parts.headers).await?;
            api::messaging::sms(
                state,
                &materialized,
                parts.method,
                &tail,
                &query,
                body.as_ref(),
            )
            .await
        }
        Route::WorkflowsWebform { tail } => {
            let materialized = authenticate(state, &parts.headers).await?;
            api::messaging::webform(
                state,
                &materialized,
                parts.method,
                &tail,
                &query,
                body.as_ref(),
            )
            .await
        }
    }
}

/// The resolver middleware: resolve one credential source and materialize
/// the request's principal, exchanging credentials upstream when needed.
async fn authenticate(state: &AppState, headers: &HeaderMap) -> Result<Materialized> {
    let resolution = state.resolver.resolve(headers).await?;
    materialize(&state.authenticator, &state.default_base_url, resolution).await
}

fn parse_body(bytes: &[u8]) -> Result<Option<Value>> {
    if bytes.is_empty() {
        return Ok(None);
    }
    serde_json::from_slice(bytes)
        .map(Some)
        .map_err(|error| GatewayError::RequestBody(error.to_string()))
}

fn parse_query(query: Option<&str>) -> Vec<(String, String)> {
    match query {
        Some(raw) => url::form_urlencoded::parse(raw.as_bytes())
            .into_owned()
            .collect(),
        None => Vec::new(),
    }
}
