//! Lifecycle controller configuration
//!
//! Loaded from the YAML file mounted from the controller ConfigMap. Every
//! section has defaults so a missing file still yields a usable config.

use crate::api::CleanPodPolicy;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Environment variable holding the path of the mounted config file.
pub const CONFIG_PATH_ENV: &str = "JOB_LIFECYCLE_CONFIG";

/// Main controller configuration structure
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ControllerConfig {
    /// Lifecycle policy defaults
    #[serde(default)]
    pub lifecycle: LifecycleConfig,

    /// Logging configuration
    #[serde(default)]
    pub telemetry: TelemetryConfig,
}

/// Lifecycle policy defaults applied across job kinds
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LifecycleConfig {
    /// Policy used when a job leaves `runPolicy.cleanPodPolicy` unset
    #[serde(
        rename = "defaultCleanPodPolicy",
        default = "default_clean_pod_policy"
    )]
    pub default_clean_pod_policy: CleanPodPolicy,

    /// Whether finished jobs are deleted once their TTL elapses
    #[serde(rename = "ttlCleanupEnabled", default = "default_ttl_cleanup_enabled")]
    pub ttl_cleanup_enabled: bool,

    /// Upper bound on requeue delays in seconds (0 = no cap)
    #[serde(rename = "maxRequeueSeconds", default)]
    pub max_requeue_seconds: u64,
}

fn default_clean_pod_policy() -> CleanPodPolicy {
    CleanPodPolicy::Running
}

fn default_ttl_cleanup_enabled() -> bool {
    true
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            default_clean_pod_policy: default_clean_pod_policy(),
            ttl_cleanup_enabled: default_ttl_cleanup_enabled(),
            max_requeue_seconds: 0,
        }
    }
}

impl LifecycleConfig {
    /// Applies `maxRequeueSeconds` to a requeue delay.
    #[must_use]
    pub fn cap_requeue(&self, delay: Duration) -> Duration {
        if self.max_requeue_seconds == 0 {
            delay
        } else {
            delay.min(Duration::from_secs(self.max_requeue_seconds))
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Json,
    Pretty,
}

/// Logging configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct TelemetryConfig {
    /// Fallback filter directive when `RUST_LOG` is unset
    #[serde(rename = "logLevel", default = "default_log_level")]
    pub log_level: String,

    #[serde(rename = "logFormat", default)]
    pub log_format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: LogFormat::default(),
        }
    }
}

impl ControllerConfig {
    /// Validate that configuration values are usable
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        EnvFilter::try_new(&self.telemetry.log_level).map_err(|e| {
            anyhow::anyhow!(
                "Invalid telemetry.logLevel '{}': {e}",
                self.telemetry.log_level
            )
        })?;
        Ok(())
    }

    /// Parse configuration from a YAML document
    pub fn from_yaml_str(yaml: &str) -> Result<Self, anyhow::Error> {
        let config: ControllerConfig = serde_yaml::from_str(yaml)
            .map_err(|e| anyhow::anyhow!("Failed to parse config YAML: {e}"))?;
        config.validate()?;
        Ok(config)
    }

    /// Load configuration from mounted ConfigMap file
    pub fn from_mounted_file(config_path: &str) -> Result<Self, anyhow::Error> {
        let config_str = std::fs::read_to_string(config_path)
            .map_err(|e| anyhow::anyhow!("Failed to read config file {config_path}: {e}"))?;
        Self::from_yaml_str(&config_str)
    }

    /// Load from the file named by `JOB_LIFECYCLE_CONFIG`, or fall back to defaults
    pub fn from_env_or_default() -> Result<Self, anyhow::Error> {
        match std::env::var(CONFIG_PATH_ENV) {
            Ok(path) => Self::from_mounted_file(&path),
            Err(_) => {
                warn!(
                    "{} is not set, using default lifecycle configuration",
                    CONFIG_PATH_ENV
                );
                Ok(Self::default())
            }
        }
    }
}
