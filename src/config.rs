//! Configuration types for playlist-sync

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::error::{Error, Result};
use crate::types::{StreamSelection, SyncMode};

/// Main configuration for a sync run
///
/// Every section has sensible defaults, so an empty JSON object is a valid config.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Config {
    /// Target directory, run policy and variant selection
    #[serde(default)]
    pub download: DownloadConfig,

    /// Retry behavior for transient failures
    #[serde(default)]
    pub retry: RetryConfig,

    /// Politeness delay between successive fetches
    #[serde(default)]
    pub backoff: BackoffConfig,

    /// HTTP transfer settings
    #[serde(default)]
    pub transfer: TransferConfig,

    /// External tool paths
    #[serde(default)]
    pub tools: ToolsConfig,
}

impl Config {
    /// Load configuration from a JSON file
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    /// Check values that serde cannot express as types
    pub fn validate(&self) -> Result<()> {
        if self.download.output_dir.as_os_str().is_empty() {
            return Err(Error::Config {
                message: "output directory must not be empty".into(),
                key: Some("download.output_dir".into()),
            });
        }
        if self.retry.max_attempts == 0 {
            return Err(Error::Config {
                message: "max_attempts must be at least 1".into(),
                key: Some("retry.max_attempts".into()),
            });
        }
        if self.retry.backoff_multiplier < 1.0 {
            return Err(Error::Config {
                message: "backoff_multiplier must be >= 1.0".into(),
                key: Some("retry.backoff_multiplier".into()),
            });
        }
        if self.backoff.min_delay > self.backoff.max_delay {
            return Err(Error::Config {
                message: format!(
                    "min_delay ({:?}) exceeds max_delay ({:?})",
                    self.backoff.min_delay, self.backoff.max_delay
                ),
                key: Some("backoff.min_delay".into()),
            });
        }
        Ok(())
    }

    /// Target directory
    pub fn output_dir(&self) -> &PathBuf {
        &self.download.output_dir
    }
}

/// Where and how items are stored
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// Target directory (default: "./downloads")
    #[serde(default = "default_output_dir")]
    pub output_dir: PathBuf,

    /// Run policy (default: resume)
    #[serde(default)]
    pub mode: SyncMode,

    /// Which variant to fetch per item (default: first)
    #[serde(default)]
    pub stream_selection: StreamSelection,
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            mode: SyncMode::default(),
            stream_selection: StreamSelection::default(),
        }
    }
}

/// Retry configuration for transient failures
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total attempts per item, including the first (default: 2)
    #[serde(default = "default_max_attempts")]
    pub max_attempts: u32,

    /// Delay before the first retry (default: 0, retry immediately)
    #[serde(default, with = "duration_serde")]
    pub initial_delay: Duration,

    /// Maximum delay between retries (default: 60 seconds)
    #[serde(default = "default_max_retry_delay", with = "duration_serde")]
    pub max_delay: Duration,

    /// Multiplier for exponential backoff (default: 2.0)
    #[serde(default = "default_backoff_multiplier")]
    pub backoff_multiplier: f64,

    /// Add random jitter to retry delays (default: true)
    #[serde(default = "default_true")]
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: default_max_attempts(),
            initial_delay: Duration::ZERO,
            max_delay: default_max_retry_delay(),
            backoff_multiplier: default_backoff_multiplier(),
            jitter: true,
        }
    }
}

/// Inter-fetch politeness delay
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BackoffConfig {
    /// Lower bound of the random delay (default: 1.0 seconds)
    #[serde(default = "default_min_backoff", with = "duration_serde")]
    pub min_delay: Duration,

    /// Upper bound (exclusive) of the random delay (default: 3.0 seconds)
    #[serde(default = "default_max_backoff", with = "duration_serde")]
    pub max_delay: Duration,

    /// Also pause before retries of the same item (default: false)
    ///
    /// Retries are immediate otherwise, so enabling this lengthens runs with many
    /// transient failures.
    #[serde(default)]
    pub between_retries: bool,
}

impl Default for BackoffConfig {
    fn default() -> Self {
        Self {
            min_delay: default_min_backoff(),
            max_delay: default_max_backoff(),
            between_retries: false,
        }
    }
}

/// HTTP transfer settings
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransferConfig {
    /// Whole-request timeout (default: 300 seconds)
    #[serde(default = "default_transfer_timeout", with = "duration_serde")]
    pub timeout: Duration,

    /// Connection timeout (default: 30 seconds)
    #[serde(default = "default_connect_timeout", with = "duration_serde")]
    pub connect_timeout: Duration,

    /// User-Agent header sent with every request
    #[serde(default = "default_user_agent")]
    pub user_agent: String,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            timeout: default_transfer_timeout(),
            connect_timeout: default_connect_timeout(),
            user_agent: default_user_agent(),
        }
    }
}

/// External tool paths (yt-dlp, ffmpeg)
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ToolsConfig {
    /// Path to yt-dlp executable (auto-detected if None)
    #[serde(default)]
    pub yt_dlp_path: Option<PathBuf>,

    /// Path to ffmpeg executable (auto-detected if None)
    #[serde(default)]
    pub ffmpeg_path: Option<PathBuf>,

    /// Whether to search PATH for external binaries if explicit paths not set (default: true)
    #[serde(default = "default_true")]
    pub search_path: bool,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            yt_dlp_path: None,
            ffmpeg_path: None,
            search_path: true,
        }
    }
}

impl ToolsConfig {
    /// Resolve a tool binary from the explicit path or PATH
    pub fn resolve(&self, explicit: Option<&PathBuf>, name: &str) -> Result<PathBuf> {
        if let Some(path) = explicit {
            return Ok(path.clone());
        }
        if self.search_path
            && let Ok(path) = which::which(name)
        {
            return Ok(path);
        }
        Err(Error::NotSupported(format!(
            "{name} binary not found. Configure its path or ensure {name} is in PATH."
        )))
    }
}

// Default value functions
fn default_output_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_true() -> bool {
    true
}

fn default_max_attempts() -> u32 {
    2
}

fn default_max_retry_delay() -> Duration {
    Duration::from_secs(60)
}

fn default_backoff_multiplier() -> f64 {
    2.0
}

fn default_min_backoff() -> Duration {
    Duration::from_secs(1)
}

fn default_max_backoff() -> Duration {
    Duration::from_secs(3)
}

fn default_transfer_timeout() -> Duration {
    Duration::from_secs(300)
}

fn default_connect_timeout() -> Duration {
    Duration::from_secs(30)
}

fn default_user_agent() -> String {
    format!("playlist-sync/{}", env!("CARGO_PKG_VERSION"))
}

// Duration serialization helper (fractional seconds)
mod duration_serde {
    use serde::{Deserialize, Deserializer, Serializer, de::Error};
    use std::time::Duration;

    pub fn serialize<S>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_f64(duration.as_secs_f64())
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Duration, D::Error>
    where
        D: Deserializer<'de>,
    {
        let secs = f64::deserialize(deserializer)?;
        Duration::try_from_secs_f64(secs).map_err(D::Error::custom)
    }
}
