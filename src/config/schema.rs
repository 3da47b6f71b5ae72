//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the router.
//! All types derive Serde traits for deserialization from config files.

use serde::{Deserialize, Serialize};

/// Root configuration for the server.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Listen port (overridable at `listen` time).
    pub port: u16,

    /// Install the built-in permissive CORS responder.
    pub cors: bool,

    /// Precompute the flat route table instead of walking the tree per request.
    pub static_mapping: bool,

    /// Request body handling.
    pub body: BodyConfig,

    /// Optional TLS configuration.
    pub tls: Option<TlsConfig>,

    /// Transport settings.
    pub transport: TransportConfig,

    /// WebSocket gateway limits.
    pub websocket: WebSocketConfig,

    /// Log output settings.
    pub logging: LoggingConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: 5000,
            cors: false,
            static_mapping: false,
            body: BodyConfig::default(),
            tls: None,
            transport: TransportConfig::default(),
            websocket: WebSocketConfig::default(),
            logging: LoggingConfig::default(),
            observability: ObservabilityConfig::default(),
        }
    }
}

/// When the JSON body is parsed relative to the body stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum BodyPolicy {
    /// Buffer the whole body, parse once at stream end.
    #[default]
    Deferred,
    /// Probe after every chunk and dispatch on the first successful parse.
    Eager,
}

/// Request body configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct BodyConfig {
    pub policy: BodyPolicy,

    /// Maximum bytes buffered before dispatch.
    pub max_bytes: usize,
}

impl Default for BodyConfig {
    fn default() -> Self {
        Self {
            policy: BodyPolicy::Deferred,
            max_bytes: 2 * 1024 * 1024, // 2MB
        }
    }
}

/// TLS configuration for the listener.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TlsConfig {
    /// Path to certificate file (PEM).
    pub cert_path: String,

    /// Path to private key file (PEM).
    pub key_path: String,
}

/// Transport configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct TransportConfig {
    /// Interface to bind when listening by port.
    pub host: String,

    /// HTTP/1.1 keep-alive.
    pub keep_alive: bool,

    /// Seconds in-flight requests get to finish after shutdown is triggered.
    pub graceful_shutdown_secs: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            keep_alive: true,
            graceful_shutdown_secs: 10,
        }
    }
}

/// WebSocket configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct WebSocketConfig {
    pub max_message_size: usize,
    pub max_frame_size: usize,
}

impl Default for WebSocketConfig {
    fn default() -> Self {
        Self {
            max_message_size: 64 << 20,
            max_frame_size: 16 << 20,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive.
    pub level: String,

    /// ANSI colors in log output.
    pub color: bool,

    /// Prefix lines with a timestamp.
    pub timestamp: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            color: true,
            timestamp: true,
        }
    }
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: false,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
