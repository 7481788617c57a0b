//! Sync client configuration
//!
//! Endpoint addresses and timing knobs. Every field has a serde default so a
//! partial document (or none at all) yields a working configuration.

use crate::error::SyncError;
use serde::{Deserialize, Deserializer, Serialize};
use std::time::Duration;

// ============================================================================
// Constants
// ============================================================================

/// Default gateway host
pub const DEFAULT_GATEWAY_HOST: &str = "127.0.0.1";
/// Default gateway port
pub const DEFAULT_GATEWAY_PORT: u16 = 8000;
/// Default roster endpoint path
pub const DEFAULT_SNAPSHOT_PATH: &str = "/students";
/// Default attendance stream path
pub const DEFAULT_STREAM_PATH: &str = "/ws/attendance";
/// Fixed delay between a close and the next connection attempt (ms)
pub const DEFAULT_RECONNECT_DELAY_MS: u64 = 2000;
/// How long a "recently touched" marker stays up (ms)
pub const DEFAULT_MARKER_WINDOW_MS: u64 = 2000;
/// Roster request timeout (ms)
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 10_000;

// ============================================================================
// Endpoint
// ============================================================================

/// A host/port/path triple for one of the two gateway endpoints
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    #[serde(default = "EndpointConfig::default_host")]
    pub host: String,
    #[serde(default = "EndpointConfig::default_port")]
    pub port: u16,
    pub path: String,
}

impl EndpointConfig {
    fn default_host() -> String {
        DEFAULT_GATEWAY_HOST.to_string()
    }
    fn default_port() -> u16 {
        DEFAULT_GATEWAY_PORT
    }

    pub fn new(host: impl Into<String>, port: u16, path: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port,
            path: path.into(),
        }
    }

    /// Build `<scheme>://host:port/path`
    pub fn url(&self, scheme: &str) -> String {
        format!("{}://{}:{}{}", scheme, self.host, self.port, self.path)
    }

    fn validate(&self, field: &str) -> Result<(), String> {
        if self.host.trim().is_empty() {
            return Err(format!("{}.host cannot be empty", field));
        }
        if self.port == 0 {
            return Err(format!("{}.port cannot be 0", field));
        }
        if !self.path.starts_with('/') {
            return Err(format!("{}.path must start with '/' (got '{}')", field, self.path));
        }
        Ok(())
    }
}

// Endpoint as written in a config document; missing fields come from the
// endpoint's own defaults, which differ only in `path`.
#[derive(Deserialize)]
struct EndpointFields {
    host: Option<String>,
    port: Option<u16>,
    path: Option<String>,
}

impl EndpointFields {
    fn over(self, base: EndpointConfig) -> EndpointConfig {
        EndpointConfig {
            host: self.host.unwrap_or(base.host),
            port: self.port.unwrap_or(base.port),
            path: self.path.unwrap_or(base.path),
        }
    }
}

// ============================================================================
// Sync Config
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Roster (snapshot) endpoint, fetched over HTTP
    #[serde(
        default = "SyncConfig::default_snapshot",
        deserialize_with = "SyncConfig::snapshot_endpoint"
    )]
    pub snapshot: EndpointConfig,
    /// Attendance event stream, consumed over WebSocket
    #[serde(
        default = "SyncConfig::default_stream",
        deserialize_with = "SyncConfig::stream_endpoint"
    )]
    pub stream: EndpointConfig,
    #[serde(default = "SyncConfig::default_reconnect_delay_ms")]
    pub reconnect_delay_ms: u64,
    #[serde(default = "SyncConfig::default_marker_window_ms")]
    pub marker_window_ms: u64,
    #[serde(default = "SyncConfig::default_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl SyncConfig {
    fn default_snapshot() -> EndpointConfig {
        EndpointConfig::new(DEFAULT_GATEWAY_HOST, DEFAULT_GATEWAY_PORT, DEFAULT_SNAPSHOT_PATH)
    }
    fn default_stream() -> EndpointConfig {
        EndpointConfig::new(DEFAULT_GATEWAY_HOST, DEFAULT_GATEWAY_PORT, DEFAULT_STREAM_PATH)
    }
    fn default_reconnect_delay_ms() -> u64 {
        DEFAULT_RECONNECT_DELAY_MS
    }
    fn default_marker_window_ms() -> u64 {
        DEFAULT_MARKER_WINDOW_MS
    }
    fn default_request_timeout_ms() -> u64 {
        DEFAULT_REQUEST_TIMEOUT_MS
    }

    fn snapshot_endpoint<'de, D: Deserializer<'de>>(d: D) -> Result<EndpointConfig, D::Error> {
        Ok(EndpointFields::deserialize(d)?.over(Self::default_snapshot()))
    }
    fn stream_endpoint<'de, D: Deserializer<'de>>(d: D) -> Result<EndpointConfig, D::Error> {
        Ok(EndpointFields::deserialize(d)?.over(Self::default_stream()))
    }

    /// Move both endpoints to another gateway host and/or port, keeping their paths.
    pub fn override_gateway(&mut self, host: Option<String>, port: Option<u16>) {
        if let Some(host) = host {
            self.snapshot.host = host.clone();
            self.stream.host = host;
        }
        if let Some(port) = port {
            self.snapshot.port = port;
            self.stream.port = port;
        }
    }

    pub fn snapshot_url(&self) -> String {
        self.snapshot.url("http")
    }

    pub fn stream_url(&self) -> String {
        self.stream.url("ws")
    }

    pub fn reconnect_delay(&self) -> Duration {
        Duration::from_millis(self.reconnect_delay_ms)
    }

    pub fn marker_window(&self) -> Duration {
        Duration::from_millis(self.marker_window_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn validate(&self) -> Result<(), SyncError> {
        let invalid = SyncError::Config;

        self.snapshot.validate("snapshot").map_err(invalid)?;
        self.stream.validate("stream").map_err(invalid)?;
        if self.reconnect_delay_ms == 0 {
            return Err(invalid("reconnect_delay_ms must be positive".to_string()));
        }
        if self.marker_window_ms == 0 {
            return Err(invalid("marker_window_ms must be positive".to_string()));
        }
        if self.request_timeout_ms == 0 {
            return Err(invalid("request_timeout_ms must be positive".to_string()));
        }
        Ok(())
    }
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            snapshot: Self::default_snapshot(),
            stream: Self::default_stream(),
            reconnect_delay_ms: DEFAULT_RECONNECT_DELAY_MS,
            marker_window_ms: DEFAULT_MARKER_WINDOW_MS,
            request_timeout_ms: DEFAULT_REQUEST_TIMEOUT_MS,
        }
    }
}
