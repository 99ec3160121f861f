//! Configuration types shared across crates.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Server configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address (e.g., "0.0.0.0:5000").
    #[serde(default = "default_bind")]
    pub bind: String,
    /// Enable the /metrics endpoint for Prometheus scraping (default: true).
    #[serde(default = "default_metrics_enabled")]
    pub metrics_enabled: bool,
}

fn default_bind() -> String {
    "127.0.0.1:5000".to_string()
}

fn default_metrics_enabled() -> bool {
    true
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            metrics_enabled: default_metrics_enabled(),
        }
    }
}

/// Storage backend configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StorageConfig {
    /// Local filesystem storage.
    Local {
        /// Root directory for storage.
        #[serde(default = "default_local_root")]
        root_path: PathBuf,
    },
    /// S3-compatible storage.
    S3 {
        /// Bucket name.
        bucket: String,
        /// AWS region.
        region: Option<String>,
        /// Optional endpoint URL (for MinIO, etc.).
        endpoint: Option<String>,
        /// Key prefix inside the bucket. A leading `/` is ignored.
        root_path: Option<String>,
        /// Local directory used to stage uploads before they are sent.
        buffer_dir: PathBuf,
        /// Static access key. When both keys are absent the default AWS
        /// credential chain is used.
        access_key: Option<String>,
        /// Static secret key.
        /// WARNING: Prefer env vars or instance roles over storing secrets in config files.
        secret_key: Option<String>,
        /// Force path-style URLs. Required for MinIO.
        #[serde(default)]
        force_path_style: bool,
    },
}

fn default_local_root() -> PathBuf {
    PathBuf::from("./data")
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self::Local {
            root_path: default_local_root(),
        }
    }
}

impl StorageConfig {
    /// Validate storage configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            StorageConfig::Local { .. } => Ok(()),
            StorageConfig::S3 {
                bucket,
                buffer_dir,
                access_key,
                secret_key,
                ..
            } => {
                if bucket.trim().is_empty() {
                    return Err("s3 config requires a bucket".to_string());
                }
                if buffer_dir.as_os_str().is_empty() {
                    return Err("s3 config requires a buffer_dir".to_string());
                }
                match (access_key.as_ref(), secret_key.as_ref()) {
                    (Some(_), Some(_)) | (None, None) => Ok(()),
                    _ => Err(
                        "s3 config requires both access_key and secret_key when either is set"
                            .to_string(),
                    ),
                }
            }
        }
    }
}

/// Full application configuration.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Storage backend configuration.
    #[serde(default)]
    pub storage: StorageConfig,
}

impl AppConfig {
    /// Create a test configuration rooted at the given directory.
    ///
    /// **For testing only.**
    pub fn for_testing(root: impl Into<PathBuf>) -> Self {
        Self {
            server: ServerConfig::default(),
            storage: StorageConfig::Local {
                root_path: root.into(),
            },
        }
    }

    /// Validate every section.
    pub fn validate(&self) -> Result<(), String> {
        self.storage.validate()
    }
}
