//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the router.
//! All types derive Serde traits for deserialization from config files.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// Root configuration for the endpoint router.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct RouterConfig {
    /// Listener configuration (bind address).
    pub listener: ListenerConfig,

    /// Endpoint table, in registration order.
    pub endpoints: Vec<EndpointConfig>,

    /// `[token]` values shared by every endpoint pattern.
    pub tokens: HashMap<String, String>,

    /// Observability settings.
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub admin: AdminConfig,
}

/// Listener configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ListenerConfig {
    /// Bind address (e.g., "0.0.0.0:8080").
    pub bind_address: String,
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            bind_address: "0.0.0.0:8080".to_string(),
        }
    }
}

/// One routable endpoint.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct EndpointConfig {
    /// Display name; must be unique.
    pub name: String,

    /// Route template, e.g. `api/[area]/{id:int}`.
    pub pattern: String,

    /// Lower wins over precedence when both match.
    #[serde(default)]
    pub order: i32,

    /// Allowed HTTP methods. Empty means any.
    #[serde(default)]
    pub methods: Vec<String>,

    /// Host patterns (`example.com`, `*.example.com:8080`, `*`).
    #[serde(default)]
    pub hosts: Vec<String>,

    /// Accepted request content types.
    #[serde(default)]
    pub consumes: Vec<String>,

    /// Token values for this endpoint only; override the shared ones.
    #[serde(default)]
    pub tokens: HashMap<String, String>,

    /// Defaults kept outside the pattern. Names that are not parameters
    /// are still added to the route values.
    #[serde(default)]
    pub defaults: HashMap<String, String>,

    /// Constraints kept outside the pattern, in inline syntax
    /// (`id = "int:min(1)"`).
    #[serde(default)]
    pub constraints: HashMap<String, String>,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error), used when `RUST_LOG`
    /// is unset.
    pub log_level: String,

    /// Emit JSON log lines instead of the human-readable format.
    pub json_logs: bool,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "debug".to_string(),
            json_logs: false,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}

/// Admin API configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct AdminConfig {
    /// Enable the admin API.
    pub enabled: bool,

    /// API key for authentication (Bearer token).
    pub api_key: String,

    /// Admin API bind address.
    pub bind_address: String,
}

impl Default for AdminConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            // WARNING: This is a placeholder! Change this in production.
            api_key: "CHANGE_ME_IN_PRODUCTION".to_string(),
            bind_address: "127.0.0.1:8081".to_string(),
        }
    }
}
