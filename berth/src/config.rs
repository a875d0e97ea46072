//! Environment-driven configuration for the three berth services

use std::env;
use std::path::PathBuf;
use std::sync::Arc;

use crate::errors::BerthError;
use crate::logs::LogLevel;
use crate::mqtt::client::BusAddress;
use crate::object::{FsObjectStore, HttpObjectStore, ObjectStore};
use crate::runner::{HttpRunner, ProcessRunner, TaskRunner};

/// Platform settings, assembled from `BERTH_*` environment variables
#[derive(Debug, Clone)]
pub struct Settings {
    /// Log level
    pub log_level: LogLevel,

    /// API server bind host
    pub api_host: String,

    /// API server port
    pub api_port: u16,

    /// Log stream socket server port
    pub stream_port: u16,

    /// Edge router port
    pub proxy_port: u16,

    /// Base URL the edge router resolves subdomains against,
    /// e.g. `https://bucket.example.com/outputs/`
    pub content_base_url: String,

    /// Domain suffix used to render preview URLs, e.g. `localhost:8000`
    pub preview_domain: String,

    /// Message bus (MQTT broker) address
    pub bus: BusAddress,

    /// Object storage backend
    pub storage: StorageSettings,

    /// Execution substrate backend
    pub substrate: SubstrateSettings,
}

/// Where build artifacts are written
#[derive(Debug, Clone)]
pub enum StorageSettings {
    /// Local directory acting as the bucket root
    Fs { root: PathBuf },

    /// HTTP blob gateway (filer-style PUT/DELETE endpoints)
    Http {
        endpoint: String,
        bucket: String,
        region: Option<String>,
    },
}

/// How build tasks are submitted
#[derive(Debug, Clone)]
pub enum SubstrateSettings {
    /// Spawn the builder binary locally (development substrate)
    Process { builder_bin: PathBuf },

    /// Submit the task to a remote substrate API
    Http {
        endpoint: String,
        cluster: String,
        task_definition: String,
    },
}

impl Settings {
    /// Read settings from the environment
    pub fn from_env() -> Result<Self, BerthError> {
        let log_level = match env::var("BERTH_LOG_LEVEL") {
            Ok(v) => v.parse().map_err(BerthError::ConfigError)?,
            Err(_) => LogLevel::default(),
        };

        let bus = BusAddress {
            host: env_or("BERTH_MQTT_HOST", ""),
            port: env_port("BERTH_MQTT_PORT", 1883)?,
            use_tls: env_flag("BERTH_MQTT_TLS"),
            ca_cert_path: env::var("BERTH_MQTT_CA_CERT").ok(),
        };

        Ok(Self {
            log_level,
            api_host: env_or("BERTH_API_HOST", "0.0.0.0"),
            api_port: env_port("BERTH_API_PORT", 9000)?,
            stream_port: env_port("BERTH_STREAM_PORT", 9002)?,
            proxy_port: env_port("BERTH_PROXY_PORT", 8000)?,
            content_base_url: env_or("BERTH_CONTENT_BASE_URL", "http://localhost:8888/berth/outputs/"),
            preview_domain: env_or("BERTH_PREVIEW_DOMAIN", "localhost:8000"),
            bus,
            storage: StorageSettings::from_env()?,
            substrate: SubstrateSettings::from_env(),
        })
    }
}

impl StorageSettings {
    fn from_env() -> Result<Self, BerthError> {
        if let Ok(endpoint) = env::var("BERTH_STORAGE_URL") {
            let bucket = env::var("BERTH_STORAGE_BUCKET")
                .map_err(|_| BerthError::ConfigError("BERTH_STORAGE_BUCKET is required with BERTH_STORAGE_URL".to_string()))?;
            return Ok(Self::Http {
                endpoint,
                bucket,
                region: env::var("BERTH_STORAGE_REGION").ok(),
            });
        }

        Ok(Self::Fs {
            root: PathBuf::from(env_or("BERTH_STORAGE_DIR", "/var/lib/berth/objects")),
        })
    }

    /// Instantiate the configured object store adapter
    pub fn build(&self) -> Result<Arc<dyn ObjectStore>, BerthError> {
        match self {
            StorageSettings::Fs { root } => Ok(Arc::new(FsObjectStore::new(root.clone()))),
            StorageSettings::Http {
                endpoint,
                bucket,
                region,
            } => Ok(Arc::new(HttpObjectStore::new(endpoint, bucket, region.clone())?)),
        }
    }

    /// Environment forwarded to spawned builders so they reach the same store
    pub fn task_environment(&self) -> Vec<(String, String)> {
        match self {
            StorageSettings::Fs { root } => vec![(
                "BERTH_STORAGE_DIR".to_string(),
                root.display().to_string(),
            )],
            StorageSettings::Http {
                endpoint,
                bucket,
                region,
            } => {
                let mut env = vec![
                    ("BERTH_STORAGE_URL".to_string(), endpoint.clone()),
                    ("BERTH_STORAGE_BUCKET".to_string(), bucket.clone()),
                ];
                if let Some(region) = region {
                    env.push(("BERTH_STORAGE_REGION".to_string(), region.clone()));
                }
                env
            }
        }
    }
}

impl SubstrateSettings {
    fn from_env() -> Self {
        if let Ok(endpoint) = env::var("BERTH_SUBSTRATE_URL") {
            return Self::Http {
                endpoint,
                cluster: env_or("BERTH_SUBSTRATE_CLUSTER", "default"),
                task_definition: env_or("BERTH_SUBSTRATE_TASK", "berth-builder"),
            };
        }

        Self::Process {
            builder_bin: PathBuf::from(env_or("BERTH_BUILDER_BIN", "berth-builder")),
        }
    }

    /// Instantiate the configured substrate adapter. `pass_env` is handed to
    /// every spawned build task (bus and storage wiring).
    pub fn build(&self, pass_env: Vec<(String, String)>) -> Result<Arc<dyn TaskRunner>, BerthError> {
        match self {
            SubstrateSettings::Process { builder_bin } => {
                Ok(Arc::new(ProcessRunner::new(builder_bin.clone(), pass_env)))
            }
            SubstrateSettings::Http {
                endpoint,
                cluster,
                task_definition,
            } => Ok(Arc::new(HttpRunner::new(
                endpoint,
                cluster.clone(),
                task_definition.clone(),
            )?)),
        }
    }
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_flag(key: &str) -> bool {
    matches!(
        env::var(key).unwrap_or_default().to_lowercase().as_str(),
        "1" | "true" | "yes"
    )
}

fn env_port(key: &str, default: u16) -> Result<u16, BerthError> {
    match env::var(key) {
        Ok(v) => v
            .parse::<u16>()
            .map_err(|_| BerthError::ConfigError(format!("{} is not a valid port: {}", key, v))),
        Err(_) => Ok(default),
    }
}
