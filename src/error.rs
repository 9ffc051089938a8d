//! Error types for playlist-sync
//!
//! Two layers of errors exist:
//! - [`Error`] covers run-level failures. Only pre-flight problems (an invalid mode,
//!   a collection that cannot be listed, bad configuration) ever surface to the caller.
//! - [`FetchError`] covers everything that can go wrong for a single item. These are
//!   contained at the item boundary and turned into outcomes via [`classify`].

use regex::RegexSet;
use std::path::PathBuf;
use std::sync::LazyLock;
use thiserror::Error;

use crate::types::PermanentKind;

/// Result type alias for playlist-sync operations
pub type Result<T> = std::result::Result<T, Error>;

/// Main error type for playlist-sync
#[derive(Debug, Error)]
pub enum Error {
    /// Unrecognized run policy name
    #[error("invalid mode '{0}': expected 'resume' or 'overwrite'")]
    InvalidMode(String),

    /// Target directory could not be listed
    #[error("directory {path} is unreadable: {source}")]
    DirectoryUnreadable {
        /// The directory that was inspected
        path: PathBuf,
        /// Underlying I/O failure
        #[source]
        source: std::io::Error,
    },

    /// The remote collection could not be listed at all
    #[error("failed to list collection: {0}")]
    Listing(String),

    /// Configuration error with context about which setting is invalid
    #[error("configuration error: {message}")]
    Config {
        /// Human-readable error message describing the configuration issue
        message: String,
        /// The configuration key that caused the error (e.g., "retry.max_attempts")
        key: Option<String>,
    },

    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Network error
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Serialization error
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// External tool execution failed (yt-dlp, ffmpeg)
    #[error("external tool error: {0}")]
    ExternalTool(String),

    /// Operation not supported (missing binary, etc.)
    #[error("not supported: {0}")]
    NotSupported(String),

    /// A second shutdown signal abandoned the item in flight
    #[error("interrupted before the current item finished")]
    Interrupted,
}

/// Failure of a single item, either while resolving it or while transferring it
#[derive(Debug, Error)]
pub enum FetchError {
    /// Provider reported the item cannot be resolved to any stream
    #[error("item unavailable: {0}")]
    ItemUnavailable(String),

    /// Free-form failure message reported by the provider
    #[error("provider error: {0}")]
    Provider(String),

    /// Provider's internal metadata lookup failed for this item
    #[error("provider metadata error: {0}")]
    ProviderMetadata(String),

    /// Non-success HTTP status from the stream host
    #[error("HTTP {status} fetching {url}")]
    Http {
        /// Response status code
        status: u16,
        /// Requested URL
        url: String,
    },

    /// Transfer timed out
    #[error("transfer timed out: {0}")]
    Timeout(String),

    /// Network-level failure
    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    /// Response that does not follow the expected protocol
    #[error("malformed response: {0}")]
    MalformedResponse(String),

    /// Local I/O failure while writing the item
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// How a per-item failure should be handled
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureKind {
    /// May succeed on retry
    Transient,
    /// Retrying cannot change the outcome
    Permanent(PermanentKind),
    /// Known provider-side defect; skip without touching the retry budget
    ProviderMetadata,
}

const PERMANENT_PATTERNS: &[(&str, PermanentKind)] = &[
    (
        r"sign in to confirm your age|age[- ]restricted|inappropriate for some users",
        PermanentKind::AgeRestricted,
    ),
    (
        r"not available in your country|blocked it in your country|geo[- ]?restrict",
        PermanentKind::RegionBlocked,
    ),
    (
        r"members[- ]only|join this channel|available to this channel's members",
        PermanentKind::MembersOnly,
    ),
    (r"private video|video is private", PermanentKind::Private),
    (
        r"live event will begin|premieres in|this (video|stream) is live|live stream (is )?in progress|this live event",
        PermanentKind::LiveInProgress,
    ),
    (
        r"recording is not available|video (has been|was) removed|video unavailable|no longer available|account .* terminated",
        PermanentKind::RecordingUnavailable,
    ),
];

#[allow(clippy::expect_used)]
static PERMANENT_SET: LazyLock<RegexSet> = LazyLock::new(|| {
    RegexSet::new(
        PERMANENT_PATTERNS
            .iter()
            .map(|(pattern, _)| format!("(?i){pattern}")),
    )
    .expect("permanent failure patterns are valid")
});

/// Match a provider-reported message against the known permanent failure phrases
pub fn permanent_kind_from_message(message: &str) -> Option<PermanentKind> {
    PERMANENT_SET
        .matches(message)
        .iter()
        .next()
        .map(|idx| PERMANENT_PATTERNS[idx].1)
}

/// Classify a per-item failure
///
/// This is the only place that decides whether an error is retried, skipped or
/// treated as a provider defect.
pub fn classify(error: &FetchError) -> FailureKind {
    match error {
        FetchError::ProviderMetadata(_) => FailureKind::ProviderMetadata,
        FetchError::ItemUnavailable(msg) => FailureKind::Permanent(
            permanent_kind_from_message(msg).unwrap_or(PermanentKind::Unresolvable),
        ),
        FetchError::Provider(msg) => match permanent_kind_from_message(msg) {
            Some(kind) => FailureKind::Permanent(kind),
            None => FailureKind::Transient,
        },
        FetchError::Http { status, .. } => match status {
            404 | 410 => FailureKind::Permanent(PermanentKind::RecordingUnavailable),
            451 => FailureKind::Permanent(PermanentKind::RegionBlocked),
            _ => FailureKind::Transient,
        },
        FetchError::Timeout(_)
        | FetchError::Network(_)
        | FetchError::MalformedResponse(_)
        | FetchError::Io(_) => FailureKind::Transient,
    }
}

impl FetchError {
    /// Shorthand for `classify(self)`
    pub fn kind(&self) -> FailureKind {
        classify(self)
    }
}
