//! Configuration loading.
//!
//! YAML with `${VAR}` / `${VAR:-default}` environment interpolation. Every
//! value has a default, so an empty document is a valid configuration.
//!
//! ```yaml
//! sources:
//!   rest_base_url: ${BRIDGE_URL:-http://localhost:8000}
//!   ws_base_url: ws://localhost:8000
//!   request_timeout_ms: 30000
//! stream:
//!   max_retries: 5
//!   reconnect_delay_ms: 5000
//!   window_capacity: 50
//!   accounts: [manager-1]
//! view:
//!   page_size: 100
//! reconciliation:
//!   manager_volume_divisor: "10000"
//! observability:
//!   tracing:
//!     enabled: false
//!   metrics:
//!     enabled: true
//!     listen_address: 0.0.0.0:9090
//! ```

use std::net::SocketAddr;
use std::sync::OnceLock;
use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::application::services::{DEFAULT_EVENT_CAPACITY, RetryConfig, StreamClientConfig};
use crate::domain::deal::{DealSource, MANAGER_VOLUME_DIVISOR, STREAM_WINDOW_CAPACITY};
use crate::domain::view::DEAL_PAGE_SIZE;
use crate::infrastructure::telemetry::TelemetryConfig;

/// Default configuration path.
pub const DEFAULT_CONFIG_PATH: &str = "config.yaml";

/// Configuration errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("Failed to read config file '{path}': {source}")]
    ReadError {
        /// Path to the config file.
        path: String,
        /// The underlying IO error.
        source: std::io::Error,
    },

    /// Failed to parse YAML configuration.
    #[error("Failed to parse config YAML: {0}")]
    ParseError(#[from] serde_yaml_bw::Error),

    /// Configuration validation failed.
    #[error("Config validation failed: {0}")]
    ValidationError(String),
}

/// Root configuration structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    /// Remote endpoints.
    #[serde(default)]
    pub sources: SourcesConfig,
    /// Live stream settings.
    #[serde(default)]
    pub stream: StreamConfig,
    /// Table view settings.
    #[serde(default)]
    pub view: ViewConfig,
    /// Reconciliation settings.
    #[serde(default)]
    pub reconciliation: ReconciliationConfig,
    /// Logging, tracing and metrics.
    #[serde(default)]
    pub observability: ObservabilityConfig,
}

// =============================================================================
// Sections
// =============================================================================

/// Remote endpoints of the platform bridge.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourcesConfig {
    /// Base URL for REST calls.
    #[serde(default = "default_rest_base_url")]
    pub rest_base_url: String,
    /// Base URL for the live deal WebSocket.
    #[serde(default = "default_ws_base_url")]
    pub ws_base_url: String,
    /// Per-request timeout in milliseconds.
    #[serde(default = "default_request_timeout")]
    pub request_timeout_ms: u64,
}

impl SourcesConfig {
    /// Request timeout as a [`Duration`].
    #[must_use]
    pub const fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

impl Default for SourcesConfig {
    fn default() -> Self {
        Self {
            rest_base_url: default_rest_base_url(),
            ws_base_url: default_ws_base_url(),
            request_timeout_ms: default_request_timeout(),
        }
    }
}

fn default_rest_base_url() -> String {
    "http://localhost:8000".to_string()
}
fn default_ws_base_url() -> String {
    "ws://localhost:8000".to_string()
}
const fn default_request_timeout() -> u64 {
    30_000
}

/// Live stream settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamConfig {
    /// Consecutive automatic reconnects before giving up.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Wait before each reconnect, in milliseconds.
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_ms: u64,
    /// Deals kept per live window.
    #[serde(default = "default_window_capacity")]
    pub window_capacity: usize,
    /// Buffered events per subscriber.
    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
    /// Manager accounts to stream. Empty means every connected account.
    #[serde(default)]
    pub accounts: Vec<String>,
}

impl StreamConfig {
    /// Reconnect policy settings.
    #[must_use]
    pub const fn retry(&self) -> RetryConfig {
        RetryConfig::new(self.max_retries, Duration::from_millis(self.reconnect_delay_ms))
    }

    /// Client settings for a manager-feed stream.
    #[must_use]
    pub fn client_config(&self, volume_divisor: Decimal) -> StreamClientConfig {
        StreamClientConfig {
            retry: self.retry(),
            window_capacity: self.window_capacity,
            event_capacity: self.event_capacity,
            volume_divisor: Some(volume_divisor),
            ..StreamClientConfig::for_source(DealSource::Manager)
        }
    }
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            reconnect_delay_ms: default_reconnect_delay(),
            window_capacity: default_window_capacity(),
            event_capacity: default_event_capacity(),
            accounts: Vec::new(),
        }
    }
}

const fn default_max_retries() -> u32 {
    5
}
const fn default_reconnect_delay() -> u64 {
    5000
}
const fn default_window_capacity() -> usize {
    STREAM_WINDOW_CAPACITY
}
const fn default_event_capacity() -> usize {
    DEFAULT_EVENT_CAPACITY
}

/// Table view settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ViewConfig {
    /// Rows per page.
    #[serde(default = "default_page_size")]
    pub page_size: usize,
}

impl Default for ViewConfig {
    fn default() -> Self {
        Self {
            page_size: default_page_size(),
        }
    }
}

const fn default_page_size() -> usize {
    DEAL_PAGE_SIZE
}

/// Reconciliation settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReconciliationConfig {
    /// Manager volumes are divided by this to get lots.
    #[serde(default = "default_volume_divisor")]
    pub manager_volume_divisor: Decimal,
}

impl Default for ReconciliationConfig {
    fn default() -> Self {
        Self {
            manager_volume_divisor: default_volume_divisor(),
        }
    }
}

const fn default_volume_divisor() -> Decimal {
    MANAGER_VOLUME_DIVISOR
}

/// Observability configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// Log level and span export.
    #[serde(default)]
    pub tracing: TelemetryConfig,
    /// Prometheus metrics.
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Prometheus metrics configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    /// Enable metrics collection.
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Scrape endpoint; unset keeps metrics in-process only.
    #[serde(default)]
    pub listen_address: Option<SocketAddr>,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            listen_address: None,
        }
    }
}

const fn default_true() -> bool {
    true
}

// =============================================================================
// Loading
// =============================================================================

/// Load configuration from a YAML file (default `config.yaml`).
pub fn load_config(path: Option<&str>) -> Result<Config, ConfigError> {
    let path = path.unwrap_or(DEFAULT_CONFIG_PATH);

    let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadError {
        path: path.to_string(),
        source: e,
    })?;

    load_config_from_string(&contents)
}

/// Load configuration from a YAML string.
pub fn load_config_from_string(yaml: &str) -> Result<Config, ConfigError> {
    let interpolated = interpolate_env_vars(yaml);
    let config: Config = if interpolated.trim().is_empty() {
        Config::default()
    } else {
        serde_yaml_bw::from_str(&interpolated)?
    };
    validate_config(&config)?;
    Ok(config)
}

/// Replace `${VAR}` and `${VAR:-default}` with environment values. Unset or
/// empty variables without a default become empty strings.
#[allow(clippy::expect_used)]
fn interpolate_env_vars(input: &str) -> String {
    static ENV_VAR_REGEX: OnceLock<regex::Regex> = OnceLock::new();

    let re = ENV_VAR_REGEX.get_or_init(|| {
        regex::Regex::new(r"\$\{([A-Za-z_][A-Za-z0-9_]*)(?::-([^}]*))?\}")
            .expect("env var regex is valid")
    });

    re.replace_all(input, |cap: &regex::Captures<'_>| {
        let default_value = cap.get(2).map_or("", |m| m.as_str());
        match std::env::var(&cap[1]) {
            Ok(v) if !v.is_empty() => v,
            _ => default_value.to_string(),
        }
    })
    .into_owned()
}

fn validate_config(config: &Config) -> Result<(), ConfigError> {
    let invalid = |msg: &str| Err(ConfigError::ValidationError(msg.to_string()));

    for (name, url, schemes) in [
        ("sources.rest_base_url", &config.sources.rest_base_url, ["http://", "https://"]),
        ("sources.ws_base_url", &config.sources.ws_base_url, ["ws://", "wss://"]),
    ] {
        if !schemes.iter().any(|s| url.starts_with(s)) {
            return Err(ConfigError::ValidationError(format!(
                "{name} must start with {} or {}, got '{url}'",
                schemes[0], schemes[1]
            )));
        }
    }

    if config.sources.request_timeout_ms == 0 {
        return invalid("sources.request_timeout_ms must be positive");
    }
    if config.stream.window_capacity == 0 {
        return invalid("stream.window_capacity must be positive");
    }
    if config.stream.event_capacity == 0 {
        return invalid("stream.event_capacity must be positive");
    }
    if config.view.page_size == 0 {
        return invalid("view.page_size must be positive");
    }
    if config.reconciliation.manager_volume_divisor <= Decimal::ZERO {
        return invalid("reconciliation.manager_volume_divisor must be positive");
    }
    if config.stream.accounts.iter().any(|a| a.trim().is_empty()) {
        return invalid("stream.accounts must not contain blank identifiers");
    }

    Ok(())
}
