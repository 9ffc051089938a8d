//! Core types for playlist-sync

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::PathBuf;

use crate::error::Error;

/// One addressable item of a remote collection
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CollectionItem {
    /// Provider-specific item identifier (e.g. a video id)
    pub id: String,
    /// Canonical URL of the item
    pub url: String,
}

impl CollectionItem {
    /// Create a new collection item
    pub fn new(id: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            url: url.into(),
        }
    }
}

/// Opaque handle the transfer mechanism uses to fetch a variant's bytes
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSource {
    /// Direct media URL
    pub url: String,
    /// Extra request headers the provider requires for this URL
    #[serde(default)]
    pub http_headers: BTreeMap<String, String>,
}

/// One downloadable variant of an item, as advertised by the provider
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamVariant {
    /// Provider format identifier
    pub format_id: String,
    /// Container extension without the dot (e.g. "mp4")
    pub extension: String,
    /// Vertical resolution, when the provider reports one
    pub height: Option<u32>,
    /// Filename the variant would be stored as
    pub filename: String,
    /// Where the bytes come from
    pub source: StreamSource,
}

/// The variant chosen for an item, including its expected output filename
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamDescriptor {
    /// Filename the fetched bytes are written to inside the target directory
    pub expected_filename: String,
    /// Where the bytes come from
    pub source: StreamSource,
}

impl From<StreamVariant> for StreamDescriptor {
    fn from(variant: StreamVariant) -> Self {
        Self {
            expected_filename: variant.filename,
            source: variant.source,
        }
    }
}

/// Policy for choosing one variant among those an item advertises
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "snake_case")]
pub enum StreamSelection {
    /// First variant in provider order
    #[default]
    First,
    /// Variant with the largest vertical resolution
    HighestResolution,
}

/// Snapshot of the filenames present in the target directory at run start
///
/// Captured once and never mutated during the run, so files written by the
/// run itself never influence later reconciliation decisions.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct LocalFileSet {
    names: HashSet<String>,
}

impl LocalFileSet {
    /// An empty set (used for full resync)
    pub fn empty() -> Self {
        Self::default()
    }

    /// Whether a filename is present
    pub fn contains(&self, filename: &str) -> bool {
        self.names.contains(filename)
    }

    /// Number of files in the snapshot
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Whether the snapshot is empty
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl<S: Into<String>> FromIterator<S> for LocalFileSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        Self {
            names: iter.into_iter().map(Into::into).collect(),
        }
    }
}

/// Unit of work handed from reconciliation to the fetch executor
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FetchTask {
    /// The item being fetched
    pub item: CollectionItem,
    /// The chosen variant
    pub stream: StreamDescriptor,
}

/// Why an item was skipped without retrying
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermanentKind {
    /// The provider could not resolve the item to any stream
    Unresolvable,
    /// Age-restricted content
    AgeRestricted,
    /// Blocked in the current region
    RegionBlocked,
    /// Channel members only
    MembersOnly,
    /// Private item
    Private,
    /// Live stream still in progress
    LiveInProgress,
    /// Recording removed or not available
    RecordingUnavailable,
    /// The provider's own metadata lookup failed for this item
    ProviderMetadata,
    /// Another item already wrote the same filename during this run
    DuplicateFilename,
}

impl std::fmt::Display for PermanentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            PermanentKind::Unresolvable => "unresolvable",
            PermanentKind::AgeRestricted => "age restricted",
            PermanentKind::RegionBlocked => "region blocked",
            PermanentKind::MembersOnly => "members only",
            PermanentKind::Private => "private",
            PermanentKind::LiveInProgress => "live stream in progress",
            PermanentKind::RecordingUnavailable => "recording unavailable",
            PermanentKind::ProviderMetadata => "provider metadata error",
            PermanentKind::DuplicateFilename => "filename already taken in this run",
        };
        f.write_str(s)
    }
}

/// Final status of one item in a run
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", content = "kind", rename_all = "snake_case")]
pub enum OutcomeStatus {
    /// Fetched and written to disk
    Success,
    /// Already present locally, no fetch issued
    SkippedExisting,
    /// Failed in a way retrying cannot fix
    SkippedPermanentError(PermanentKind),
    /// Transient failures on every allowed attempt
    SkippedAfterRetriesExhausted,
}

impl OutcomeStatus {
    /// Whether this status counts as a failure in the report
    pub fn is_failure(&self) -> bool {
        matches!(
            self,
            OutcomeStatus::SkippedPermanentError(_) | OutcomeStatus::SkippedAfterRetriesExhausted
        )
    }
}

impl std::fmt::Display for OutcomeStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            OutcomeStatus::Success => f.write_str("downloaded"),
            OutcomeStatus::SkippedExisting => f.write_str("already present"),
            OutcomeStatus::SkippedPermanentError(kind) => write!(f, "skipped ({kind})"),
            OutcomeStatus::SkippedAfterRetriesExhausted => {
                f.write_str("skipped (retries exhausted)")
            }
        }
    }
}

/// Result of considering one item during a run
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FetchOutcome {
    /// Item identifier
    pub item_id: String,
    /// What happened
    pub status: OutcomeStatus,
    /// Number of attempts made (0 only for `SkippedExisting`)
    pub attempts: u32,
    /// Last error message, for failed items
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl FetchOutcome {
    /// Outcome for an item already satisfied locally
    pub fn skipped_existing(item_id: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            status: OutcomeStatus::SkippedExisting,
            attempts: 0,
            error: None,
        }
    }

    /// Outcome for a successful fetch
    pub fn success(item_id: impl Into<String>, attempts: u32) -> Self {
        Self {
            item_id: item_id.into(),
            status: OutcomeStatus::Success,
            attempts,
            error: None,
        }
    }

    /// Outcome for a permanent failure
    pub fn permanent(
        item_id: impl Into<String>,
        kind: PermanentKind,
        attempts: u32,
        error: impl Into<String>,
    ) -> Self {
        Self {
            item_id: item_id.into(),
            status: OutcomeStatus::SkippedPermanentError(kind),
            attempts,
            error: Some(error.into()),
        }
    }

    /// Outcome for an item that kept failing transiently
    pub fn exhausted(item_id: impl Into<String>, attempts: u32, error: impl Into<String>) -> Self {
        Self {
            item_id: item_id.into(),
            status: OutcomeStatus::SkippedAfterRetriesExhausted,
            attempts,
            error: Some(error.into()),
        }
    }
}

/// Top-level run policy
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncMode {
    /// Fetch only what is missing locally
    #[default]
    Resume,
    /// Wipe the directory and fetch everything
    Overwrite,
}

impl std::str::FromStr for SyncMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "resume" => Ok(SyncMode::Resume),
            "overwrite" | "full-resync" | "full_resync" => Ok(SyncMode::Overwrite),
            _ => Err(Error::InvalidMode(s.to_string())),
        }
    }
}

impl std::fmt::Display for SyncMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncMode::Resume => f.write_str("resume"),
            SyncMode::Overwrite => f.write_str("overwrite"),
        }
    }
}

/// A failed item as listed in the final report
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedItem {
    /// Item identifier
    pub item_id: String,
    /// Status the item ended with
    pub status: OutcomeStatus,
    /// Last error message
    pub error: Option<String>,
}

/// Aggregated result of a run
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RunReport {
    /// Policy the run actually executed (resume may fall back to overwrite)
    pub mode: SyncMode,
    /// Items for which a transfer was attempted
    pub attempted: usize,
    /// Items fetched successfully
    pub succeeded: usize,
    /// Items already present locally
    pub skipped_existing: usize,
    /// Items that ended in any failure status
    pub failed: usize,
    /// Failed items in listing order
    pub failed_items: Vec<FailedItem>,
    /// Every outcome in listing order
    pub outcomes: Vec<FetchOutcome>,
    /// Listing stopped early because the provider errored mid-sequence
    pub listing_incomplete: bool,
    /// Run stopped early at an item boundary
    pub cancelled: bool,
    /// When the run started
    pub started_at: DateTime<Utc>,
    /// When the run finished
    pub finished_at: DateTime<Utc>,
}

impl RunReport {
    /// Start an empty report
    pub fn new(mode: SyncMode) -> Self {
        let now = Utc::now();
        Self {
            mode,
            attempted: 0,
            succeeded: 0,
            skipped_existing: 0,
            failed: 0,
            failed_items: Vec::new(),
            outcomes: Vec::new(),
            listing_incomplete: false,
            cancelled: false,
            started_at: now,
            finished_at: now,
        }
    }

    /// Fold one outcome into the counters
    ///
    /// `attempted` counts items that reached the transfer stage, which the caller
    /// signals through `fetched`.
    pub fn record(&mut self, outcome: FetchOutcome, fetched: bool) {
        if fetched {
            self.attempted += 1;
        }
        match outcome.status {
            OutcomeStatus::Success => self.succeeded += 1,
            OutcomeStatus::SkippedExisting => self.skipped_existing += 1,
            status => {
                self.failed += 1;
                self.failed_items.push(FailedItem {
                    item_id: outcome.item_id.clone(),
                    status,
                    error: outcome.error.clone(),
                });
            }
        }
        self.outcomes.push(outcome);
    }

    /// Number of items considered (equals the number of items listed)
    pub fn total(&self) -> usize {
        self.succeeded + self.skipped_existing + self.failed
    }

    /// Failed item identifiers in listing order
    pub fn failed_ids(&self) -> Vec<&str> {
        self.failed_items.iter().map(|f| f.item_id.as_str()).collect()
    }
}

/// Progress events emitted by the run controller
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Event {
    /// Run started
    RunStarted {
        /// Collection being synced
        collection: String,
        /// Effective policy
        mode: SyncMode,
        /// Target directory
        directory: PathBuf,
    },

    /// Target directory was wiped and recreated
    DirectoryReset {
        /// Target directory
        directory: PathBuf,
    },

    /// Item already present locally
    ItemSkippedExisting {
        /// Item identifier
        item_id: String,
    },

    /// Transfer starting for an item
    ItemFetching {
        /// Item identifier
        item_id: String,
        /// Destination filename
        filename: String,
    },

    /// Transient failure, retrying
    ItemRetrying {
        /// Item identifier
        item_id: String,
        /// Attempt that just failed
        attempt: u32,
        /// Error message
        error: String,
    },

    /// Item fetched
    ItemCompleted {
        /// Item identifier
        item_id: String,
        /// Written file
        path: PathBuf,
        /// Attempts it took
        attempts: u32,
    },

    /// Item skipped after a failure
    ItemFailed {
        /// Item identifier
        item_id: String,
        /// Final status
        status: OutcomeStatus,
        /// Error message
        error: String,
    },

    /// Run finished
    RunFinished {
        /// Items fetched successfully
        succeeded: usize,
        /// Items that failed
        failed: usize,
        /// Items already present
        skipped_existing: usize,
    },
}
