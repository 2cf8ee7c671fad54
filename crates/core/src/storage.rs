//! Storage endpoint settings
//!
//! Connection details, credentials and retry/timeout tuning for the
//! S3-compatible service that objects are read from.

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Retry configuration for storage requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of attempts per request, including the first one
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial backoff duration in milliseconds
    #[serde(default = "default_initial_backoff")]
    pub initial_backoff_ms: u64,

    /// Maximum backoff duration in milliseconds
    #[serde(default = "default_max_backoff")]
    pub max_backoff_ms: u64,
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_backoff() -> u64 {
    100
}

fn default_max_backoff() -> u64 {
    10000
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_backoff_ms: default_initial_backoff(),
            max_backoff_ms: default_max_backoff(),
        }
    }
}

/// Timeout configuration for storage requests
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeoutConfig {
    /// Connection timeout in milliseconds
    #[serde(default = "default_connect_timeout")]
    pub connect_ms: u64,

    /// Longest silence while reading a response, in milliseconds
    #[serde(default = "default_read_timeout")]
    pub read_ms: u64,

    /// Deadline for one list, head or range-open attempt, in milliseconds
    #[serde(default = "default_operation_timeout")]
    pub operation_ms: u64,

    /// Slowest acceptable transfer rate for a buffered range read
    ///
    /// A part of `n` bytes gets `operation_ms` plus `n` divided by this
    /// rate before the attempt is abandoned.
    #[serde(default = "default_min_throughput")]
    pub min_throughput_bytes_per_sec: u64,
}

fn default_connect_timeout() -> u64 {
    5000
}

fn default_read_timeout() -> u64 {
    30000
}

fn default_operation_timeout() -> u64 {
    30000
}

fn default_min_throughput() -> u64 {
    64 * 1024
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            connect_ms: default_connect_timeout(),
            read_ms: default_read_timeout(),
            operation_ms: default_operation_timeout(),
            min_throughput_bytes_per_sec: default_min_throughput(),
        }
    }
}

/// Settings for the storage service
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageConfig {
    /// Endpoint URL; `None` uses the SDK's regional AWS endpoint
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub endpoint: Option<String>,

    /// AWS region
    #[serde(default = "default_region")]
    pub region: String,

    /// Access key ID; `None` defers to the default credential chain
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub access_key: Option<String>,

    /// Secret access key
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secret_key: Option<String>,

    /// Bucket lookup style: "auto", "path", or "dns"
    #[serde(default = "default_bucket_lookup")]
    pub bucket_lookup: String,

    /// Retry configuration
    #[serde(default)]
    pub retry: RetryConfig,

    /// Timeout configuration
    #[serde(default)]
    pub timeout: TimeoutConfig,
}

fn default_region() -> String {
    "us-east-1".to_string()
}

fn default_bucket_lookup() -> String {
    "auto".to_string()
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            endpoint: None,
            region: default_region(),
            access_key: None,
            secret_key: None,
            bucket_lookup: default_bucket_lookup(),
            retry: RetryConfig::default(),
            timeout: TimeoutConfig::default(),
        }
    }
}

impl StorageConfig {
    /// Override the endpoint, validating it as a URL
    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Result<Self> {
        let endpoint = endpoint.into();
        url::Url::parse(&endpoint)?;
        self.endpoint = Some(endpoint);
        Ok(self)
    }

    /// Static credentials, when both halves are configured
    pub fn static_credentials(&self) -> Option<(&str, &str)> {
        match (&self.access_key, &self.secret_key) {
            (Some(access), Some(secret)) => Some((access, secret)),
            _ => None,
        }
    }

    /// Whether requests should use path-style addressing
    pub fn force_path_style(&self) -> bool {
        self.bucket_lookup == "path" || self.bucket_lookup == "auto"
    }
}
