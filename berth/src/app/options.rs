//! Application configuration options

use std::time::Duration;

use crate::config::{Settings, StorageSettings, SubstrateSettings};
use crate::workers::ingest;

/// Main options for the API service
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// Server bind configuration
    pub server: ServerOptions,

    /// Domain suffix for preview URLs
    pub preview_domain: String,

    /// Ingest worker options
    pub ingest: ingest::Options,

    /// Object storage backend
    pub storage: StorageSettings,

    /// Execution substrate backend
    pub substrate: SubstrateSettings,
}

impl AppOptions {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            lifecycle: LifecycleOptions::default(),
            server: ServerOptions {
                host: settings.api_host.clone(),
                api_port: settings.api_port,
                stream_port: settings.stream_port,
            },
            preview_domain: settings.preview_domain.clone(),
            ingest: ingest::Options {
                bus_address: settings.bus.clone(),
                ..Default::default()
            },
            storage: settings.storage.clone(),
            substrate: settings.substrate.clone(),
        }
    }
}

/// Lifecycle options
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(30),
        }
    }
}

/// HTTP server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,

    /// Orchestrator API port
    pub api_port: u16,

    /// Log stream socket port
    pub stream_port: u16,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            api_port: 9000,
            stream_port: 9002,
        }
    }
}
