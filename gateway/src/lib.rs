//! Authenticated proxy gateway for a CRM telephony platform.
//!
//! Every inbound request resolves exactly one upstream identity (signed
//! session token, Basic credentials, plaintext headers, or a
//! stored-credential lookup), exchanges it for an upstream bearer token
//! when needed, and forwards the call with that token attached. Failures
//! at each stage map to a uniform response envelope.

pub mod api;
pub mod authenticator;
pub mod config;
pub mod envelope;
pub mod errors;
pub mod forwarder;
pub mod metrics_defs;
pub mod principal;
pub mod resolver;
pub mod router;
pub mod service;
pub mod session;

use crate::errors::GatewayError;
use crate::service::{AppState, GatewayService};
use shared::http::run_http_service;
use std::sync::Arc;

pub async fn run(config: config::Config) -> Result<(), GatewayError> {
    let state = AppState::from_config(&config)?;
    let service = GatewayService::new(Arc::new(state));

    run_http_service(&config.listener.host, config.listener.port, service).await
}
