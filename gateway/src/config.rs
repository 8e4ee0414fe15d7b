use credstore::config::StoreConfig;
use serde::Deserialize;
use std::fs::File;
use std::path::Path;
use thiserror::Error;
use url::Url;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("could not load config from file: {0}")]
    LoadError(#[from] std::io::Error),
    #[error("could not parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),
}

#[derive(Error, Debug)]
pub enum ValidationError {
    #[error("Port cannot be 0")]
    InvalidPort,

    #[error("Session signing secret cannot be empty")]
    EmptySigningSecret,

    #[error("Upstream timeout cannot be 0")]
    ZeroTimeout,
}

/// Gateway configuration
#[derive(Clone, Debug, Deserialize)]
pub struct Config {
    /// Main listener for incoming requests
    pub listener: Listener,
    /// The CRM telephony platform this gateway fronts
    pub upstream: UpstreamConfig,
    /// Signed session token settings
    pub session: SessionConfig,
    /// Where stored credential records are looked up
    pub credential_store: StoreConfig,
    pub metrics: Option<MetricsConfig>,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let file = File::open(path)?;
        let data = serde_yaml::from_reader(file)?;

        Ok(data)
    }

    /// Validates the gateway configuration
    pub fn validate(&self) -> Result<(), ValidationError> {
        self.listener.validate()?;

        if self.session.signing_secret.is_empty() {
            return Err(ValidationError::EmptySigningSecret);
        }

        if self.upstream.timeout_secs == 0 {
            return Err(ValidationError::ZeroTimeout);
        }

        Ok(())
    }
}

/// Network listener configuration
#[derive(Clone, Debug, Deserialize)]
pub struct Listener {
    /// Host address to bind to (e.g., "0.0.0.0" or "127.0.0.1")
    pub host: String,
    /// Port number to listen on
    pub port: u16,
}

impl Listener {
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.port == 0 {
            return Err(ValidationError::InvalidPort);
        }
        Ok(())
    }
}

/// Upstream platform configuration
#[derive(Clone, Debug, Deserialize)]
pub struct UpstreamConfig {
    /// Default tenant base URL; the credential exchange may answer with a
    /// tenant-specific one that takes precedence per request.
    ///
    /// Note: Uses the `url::Url` type for compile-time URL validation.
    /// Invalid URLs will be rejected during config deserialization.
    pub base_url: Url,
    /// Credential exchange endpoint
    pub login_url: Url,
    /// Timeout applied to every outbound call, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

fn default_timeout_secs() -> u64 {
    30
}

/// Signed session token configuration
#[derive(Clone, Debug, Deserialize)]
pub struct SessionConfig {
    /// Process-wide HS256 signing secret
    pub signing_secret: String,
}

/// StatsD metrics exporter configuration
#[derive(Clone, Debug, Deserialize)]
pub struct MetricsConfig {
    pub statsd_host: String,
    pub statsd_port: u16,
}
