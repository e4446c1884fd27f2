//! Configuration types for novel-dl

use crate::error::{Error, Result};
use crate::types::SourceTag;
use serde::{Deserialize, Serialize};
use std::{collections::HashMap, net::SocketAddr, path::PathBuf, time::Duration};

/// Background orchestrator settings (batching, pacing, pause polling)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Chapters fetched concurrently per batch (default: 3)
    #[serde(default = "default_batch_size")]
    pub batch_size: usize,

    /// Delay between batches in milliseconds (default: 1000)
    #[serde(default = "default_batch_delay", with = "duration_millis_serde")]
    pub batch_delay: Duration,

    /// Upper bound on how long a paused loop sleeps before re-checking its
    /// flags, in milliseconds (default: 500)
    #[serde(
        default = "default_pause_poll_interval",
        with = "duration_millis_serde"
    )]
    pub pause_poll_interval: Duration,

    /// Per-chapter deadline in milliseconds (default: none)
    ///
    /// With no deadline a hung fetch stalls its batch indefinitely.
    #[serde(default, with = "optional_duration_millis_serde")]
    pub chapter_timeout: Option<Duration>,

    /// Which chapters of a batch are reported as cached (default: batch)
    #[serde(default)]
    pub cache_marking: CacheMarking,

    /// Event broadcast buffer size (default: 1000)
    #[serde(default = "default_event_buffer")]
    pub event_buffer: usize,

    /// How long shutdown waits for loops and pending remote writes, in seconds (default: 30)
    #[serde(default = "default_shutdown_timeout", with = "duration_serde")]
    pub shutdown_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            batch_size: default_batch_size(),
            batch_delay: default_batch_delay(),
            pause_poll_interval: default_pause_poll_interval(),
            chapter_timeout: None,
            cache_marking: CacheMarking::default(),
            event_buffer: default_event_buffer(),
            shutdown_timeout: default_shutdown_timeout(),
        }
    }
}

/// Which chapter ids a settled batch reports as cached
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheMarking {
    /// Every chapter of the batch, including chapters whose fetch failed
    #[default]
    Batch,
    /// Only chapters that are actually in the local store
    Confirmed,
}

/// Foreground bulk downloader settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BulkConfig {
    /// Chapters fetched concurrently per chunk (default: 5)
    #[serde(default = "default_bulk_batch_size")]
    pub batch_size: usize,
}

impl Default for BulkConfig {
    fn default() -> Self {
        Self {
            batch_size: default_bulk_batch_size(),
        }
    }
}

/// Local chapter store settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StoreConfig {
    /// SQLite database path (default: "novel-dl.db")
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: default_database_path(),
        }
    }
}

/// Remote mirror settings
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct RemoteConfig {
    /// Enable the remote mirror (default: false)
    #[serde(default)]
    pub enabled: bool,

    /// Base URL of the mirror service
    #[serde(default)]
    pub base_url: Option<String>,

    /// Bearer token; without one the mirror counts as unauthenticated
    #[serde(default)]
    pub access_token: Option<String>,

    /// Request timeout in seconds (default: 30)
    #[serde(default, with = "optional_duration_serde")]
    pub timeout: Option<Duration>,
}

/// Chapter fetcher settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FetcherConfig {
    /// User-Agent header sent to content sources
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Request timeout in seconds (default: 30)
    #[serde(default = "default_request_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// Base URL per source tag, used when chapter ids are relative paths
    #[serde(default)]
    pub sources: HashMap<SourceTag, String>,

    /// Retry behavior for transient HTTP failures
    #[serde(default)]
    pub retry: RetryConfig,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            user_agent: default_user_agent(),
            timeout: default_request_timeout(),
            sources: HashMap::new(),
            retry: RetryConfig::default(),
        }
    }
}

/// Retry configuration for transient failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (default: 3)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Initial delay before first retry (default: 1 second)
    #[serde(default = "default_initial_delay", with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 30 seconds)
    #[serde(default = "default_max_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: default_initial_delay(),
            max_delay: default_max_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// REST API configuration
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Address to bind to (default: 127.0.0.1:6790)
    #[serde(default = "default_bind_address")]
    pub bind_address: SocketAddr,

    /// Enable CORS for browser access (default: true)
    #[serde(default = "default_true")]
    pub cors_enabled: bool,

    /// Allowed CORS origins (default: ["*"])
    #[serde(default = "default_cors_origins")]
    pub cors_origins: Vec<String>,
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            bind_address: default_bind_address(),
            cors_enabled: true,
            cors_origins: default_cors_origins(),
        }
    }
}

/// Main configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Background orchestrator settings
    #[serde(default)]
    pub orchestrator: OrchestratorConfig,

    /// Foreground bulk downloader settings
    #[serde(default)]
    pub bulk: BulkConfig,

    /// Local chapter store
    #[serde(default)]
    pub store: StoreConfig,

    /// Remote mirror
    #[serde(default)]
    pub remote: RemoteConfig,

    /// Chapter fetcher
    #[serde(default)]
    pub fetcher: FetcherConfig,

    /// REST API
    #[serde(default)]
    pub api: ApiConfig,
}

impl Config {
    /// Check settings that would make the orchestrator misbehave
    pub fn validate(&self) -> Result<()> {
        if self.orchestrator.batch_size == 0 {
            return Err(Error::Config {
                message: "batch size must be at least 1".into(),
                key: Some("orchestrator.batch_size".into()),
            });
        }
        if self.bulk.batch_size == 0 {
            return Err(Error::Config {
                message: "batch size must be at least 1".into(),
                key: Some("bulk.batch_size".into()),
            });
        }
        if self.orchestrator.event_buffer == 0 {
            return Err(Error::Config {
                message: "event buffer must be at least 1".into(),
                key: Some("orchestrator.event_buffer".into()),
            });
        }
        if self.remote.enabled && self.remote.base_url.is_none() {
            return Err(Error::Config {
                message: "remote sync is enabled but no base_url is set".into(),
                key: Some("remote.base_url".into()),
            });
        }
        Ok(())
    }
}

// Default value functions
fn default_batch_size() -> usize {
    3
}

fn default_batch_delay() -> Duration {
    Duration::from_millis(1000)
}

fn default_pause_poll_interval() -> Duration {
    Duration::from_millis(500)
}

fn default_event_buffer() -> usize {
    1000
}

fn default_shutdown_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_bulk_batch_size() -> usize {
    5
}

fn default_database_path() -> PathBuf {
    PathBuf::from("novel-dl.db")
}

fn default_user_agent() -> String {
    format!("novel-dl/{}", env!("CARGO_PKG_VERSION"))
}

fn default_request_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    3
}

fn default_initial_delay() -> Duration {
    Duration::from_secs(1)
}

fn default_max_delay() -> Duration {
    Duration::from_secs(30)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_bind_address() -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], 6790))
}

fn default_cors_origins() -> Vec<String> {
    vec!["*".into()]
}

// Duration serialization helper (whole seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_secs())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = u64::deserialize(deserializer)?;
        Ok(Duration::from_secs(secs))
    }
}

// Optional Duration serialization helper (whole seconds)
mod optional_duration_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&d.as_secs()),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = Option::<u64>::deserialize(deserializer)?;
        Ok(secs.map(Duration::from_secs))
    }
}

// Duration serialization helper (milliseconds)
mod duration_millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_u64(duration.as_millis() as u64)
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = u64::deserialize(deserializer)?;
        Ok(Duration::from_millis(millis))
    }
}

// Optional Duration serialization helper (milliseconds)
mod optional_duration_millis_serde {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        match duration {
            Some(d) => serializer.serialize_some(&(d.as_millis() as u64)),
            None => serializer.serialize_none(),
        }
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Option<Duration>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let millis = Option::<u64>::deserialize(deserializer)?;
        Ok(millis.map(Duration::from_millis))
    }
}
