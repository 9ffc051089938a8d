//! Run orchestration
//!
//! [`RunController`] owns one sync run end to end: it picks the effective
//! policy, prepares the target directory, walks the listing in order, hands
//! each item to the reconciler and the executor, and folds every outcome into
//! a [`RunReport`]. Items are processed strictly one at a time.
//!
//! Progress is published on a broadcast channel; see [`RunController::subscribe`].

use futures::StreamExt;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::backoff::{Backoff, RandomBackoff};
use crate::config::Config;
use crate::error::{Error, Result};
use crate::executor::FetchExecutor;
use crate::local;
use crate::provider::{CollectionProvider, YtDlpProvider};
use crate::reconcile::{Decision, Reconciler};
use crate::transfer::{HttpTransfer, Transfer};
use crate::types::{
    CollectionItem, Event, FetchOutcome, FetchTask, LocalFileSet, OutcomeStatus, PermanentKind,
    RunReport, StreamSelection, SyncMode,
};

/// Drives sync runs against one provider and one transfer mechanism
#[derive(Clone)]
pub struct RunController {
    provider: Arc<dyn CollectionProvider>,
    executor: FetchExecutor,
    backoff: Arc<dyn Backoff>,
    selection: StreamSelection,
    /// Event broadcast channel sender (multiple subscribers supported)
    event_tx: broadcast::Sender<Event>,
    cancel: CancellationToken,
}

impl RunController {
    /// Assemble a controller from its collaborators
    ///
    /// Retry and selection settings come from `config`. When
    /// `config.backoff.between_retries` is set, `backoff` also paces retries of
    /// the same item.
    pub fn new(
        config: &Config,
        provider: Arc<dyn CollectionProvider>,
        transfer: Arc<dyn Transfer>,
        backoff: Arc<dyn Backoff>,
    ) -> Self {
        let (event_tx, _rx) = broadcast::channel(1000);

        let mut executor =
            FetchExecutor::new(transfer, config.retry.clone()).with_events(event_tx.clone());
        if config.backoff.between_retries {
            executor = executor.with_retry_pause(backoff.clone());
        }

        Self {
            provider,
            executor,
            backoff,
            selection: config.download.stream_selection,
            event_tx,
            cancel: CancellationToken::new(),
        }
    }

    /// Build the production stack: yt-dlp listing, HTTP transfer, random backoff
    ///
    /// # Errors
    ///
    /// Fails when yt-dlp cannot be located or the HTTP client cannot be built.
    pub fn from_config(config: &Config) -> Result<Self> {
        let yt_dlp = config
            .tools
            .resolve(config.tools.yt_dlp_path.as_ref(), "yt-dlp")?;
        tracing::debug!(path = %yt_dlp.display(), "Using yt-dlp");

        let provider = Arc::new(YtDlpProvider::new(yt_dlp));
        let transfer = Arc::new(HttpTransfer::new(&config.transfer)?);
        let backoff = Arc::new(RandomBackoff::from(&config.backoff));
        Ok(Self::new(config, provider, transfer, backoff))
    }

    /// Subscribe to run events
    ///
    /// Each subscriber receives every event sent after it subscribed. A
    /// subscriber that falls more than 1000 events behind gets
    /// `RecvError::Lagged`.
    pub fn subscribe(&self) -> broadcast::Receiver<Event> {
        self.event_tx.subscribe()
    }

    /// Token that stops the run at the next item boundary when cancelled
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run with a policy given by name
    ///
    /// The name is parsed before anything touches the filesystem or the provider.
    ///
    /// # Errors
    ///
    /// [`Error::InvalidMode`] for an unknown policy name, otherwise as
    /// [`run_mode`](Self::run_mode).
    pub async fn run(&self, collection: &str, directory: &Path, mode: &str) -> Result<RunReport> {
        let mode: SyncMode = mode.parse()?;
        self.run_mode(collection, directory, mode).await
    }

    /// Run one sync of `collection` into `directory`
    ///
    /// Per-item failures never surface here; they end up in the report.
    ///
    /// # Errors
    ///
    /// - [`Error::Listing`] when the collection cannot be listed at all
    /// - [`Error::Io`] when the target directory cannot be reset
    pub async fn run_mode(
        &self,
        collection: &str,
        directory: &Path,
        mode: SyncMode,
    ) -> Result<RunReport> {
        tracing::info!(collection, directory = %directory.display(), %mode, "Starting sync run");
        if self.cancel.is_cancelled() {
            tracing::info!("Run cancelled before listing");
            let mut report = RunReport::new(mode);
            report.cancelled = true;
            return Ok(report);
        }

        let mut items = self.provider.list_items(collection).await?;
        let first = match items.next().await {
            Some(Ok(item)) => Some(item),
            Some(Err(e)) => {
                tracing::error!(collection, error = %e, "Collection cannot be listed");
                return Err(match e {
                    Error::Listing(_) => e,
                    other => Error::Listing(other.to_string()),
                });
            }
            None => None,
        };

        let (mode, local) = self.prepare_directory(directory, mode).await?;
        let mut run = RunState::new(mode);
        self.emit(Event::RunStarted {
            collection: collection.to_string(),
            mode,
            directory: directory.to_path_buf(),
        });

        let reconciler = Reconciler::new(self.provider.as_ref(), &local, mode, self.selection);
        let mut next = first.map(Ok);

        // Every item pulled from the listing is settled before cancellation is honoured
        while let Some(result) = next.take() {
            let item = match result {
                Ok(item) => item,
                Err(e) => {
                    tracing::error!(collection, error = %e, "Listing broke off, stopping run");
                    run.report.listing_incomplete = true;
                    break;
                }
            };

            self.process_item(item, &reconciler, directory, &mut run).await;

            if self.cancel.is_cancelled() {
                tracing::info!("Run cancelled, stopping at item boundary");
                run.report.cancelled = true;
                break;
            }
            next = items.next().await;
        }

        let mut report = run.report;
        report.finished_at = chrono::Utc::now();
        self.emit(Event::RunFinished {
            succeeded: report.succeeded,
            failed: report.failed,
            skipped_existing: report.skipped_existing,
        });
        tracing::info!(
            attempted = report.attempted,
            succeeded = report.succeeded,
            skipped_existing = report.skipped_existing,
            failed = report.failed,
            listing_incomplete = report.listing_incomplete,
            cancelled = report.cancelled,
            "Sync run finished"
        );

        Ok(report)
    }

    /// Settle the effective policy and capture the local snapshot
    ///
    /// Resume falls back to a full resync when the directory is missing or
    /// cannot be read.
    async fn prepare_directory(
        &self,
        directory: &Path,
        mode: SyncMode,
    ) -> Result<(SyncMode, LocalFileSet)> {
        if mode == SyncMode::Resume {
            match local::snapshot(directory).await {
                Ok(local) => {
                    tracing::info!(files = local.len(), "Resuming against existing files");
                    return Ok((SyncMode::Resume, local));
                }
                Err(e) => {
                    tracing::warn!(
                        directory = %directory.display(),
                        error = %e,
                        "Target directory not usable for resume, falling back to full resync"
                    );
                }
            }
        }

        reset_directory(directory).await?;
        self.emit(Event::DirectoryReset {
            directory: directory.to_path_buf(),
        });
        Ok((SyncMode::Overwrite, LocalFileSet::empty()))
    }

    /// Reconcile and, if needed, fetch one item
    ///
    /// Cancellation during the backoff wait cuts the wait short; the item is
    /// still fetched so that it ends with an outcome.
    async fn process_item(
        &self,
        item: CollectionItem,
        reconciler: &Reconciler<'_>,
        directory: &Path,
        run: &mut RunState,
    ) {
        let task = match reconciler.decide(item).await {
            Decision::Settled(outcome) => {
                self.emit_settled(&outcome);
                run.report.record(outcome, false);
                return;
            }
            Decision::Fetch(task) => task,
        };

        let filename = &task.stream.expected_filename;
        if run.written.contains(filename) {
            tracing::warn!(
                item_id = %task.item.id,
                filename = %filename,
                "Another item already wrote this filename, not overwriting it"
            );
            let outcome = FetchOutcome::permanent(
                task.item.id.clone(),
                PermanentKind::DuplicateFilename,
                1,
                format!("'{filename}' was already written by an earlier item"),
            );
            self.emit_settled(&outcome);
            run.report.record(outcome, false);
            return;
        }

        if run.fetched_any {
            tokio::select! {
                _ = self.backoff.delay() => {}
                _ = self.cancel.cancelled() => {
                    tracing::info!(item_id = %task.item.id, "Run cancelled during backoff, fetching this item last");
                }
            }
        }
        run.fetched_any = true;

        let (outcome, path) = self.fetch(&task, directory).await;
        match (&outcome.status, path) {
            (OutcomeStatus::Success, Some(path)) => {
                tracing::info!(item_id = %outcome.item_id, attempts = outcome.attempts, "Downloaded");
                run.written.insert(task.stream.expected_filename.clone());
                self.emit(Event::ItemCompleted {
                    item_id: outcome.item_id.clone(),
                    path,
                    attempts: outcome.attempts,
                });
            }
            _ => self.emit_settled(&outcome),
        }
        run.report.record(outcome, true);
    }

    async fn fetch(&self, task: &FetchTask, directory: &Path) -> (FetchOutcome, Option<PathBuf>) {
        self.emit(Event::ItemFetching {
            item_id: task.item.id.clone(),
            filename: task.stream.expected_filename.clone(),
        });
        self.executor.execute_with_path(task, directory).await
    }

    fn emit_settled(&self, outcome: &FetchOutcome) {
        let event = match outcome.status {
            OutcomeStatus::SkippedExisting => Event::ItemSkippedExisting {
                item_id: outcome.item_id.clone(),
            },
            status => Event::ItemFailed {
                item_id: outcome.item_id.clone(),
                status,
                error: outcome.error.clone().unwrap_or_default(),
            },
        };
        self.emit(event);
    }

    fn emit(&self, event: Event) {
        // No receivers is fine
        self.event_tx.send(event).ok();
    }
}

/// Mutable bookkeeping for one run
struct RunState {
    report: RunReport,
    /// Filenames written by this run, separate from the frozen start snapshot
    written: HashSet<String>,
    fetched_any: bool,
}

impl RunState {
    fn new(mode: SyncMode) -> Self {
        Self {
            report: RunReport::new(mode),
            written: HashSet::new(),
            fetched_any: false,
        }
    }
}

/// Delete `directory` if present and recreate it empty
async fn reset_directory(directory: &Path) -> Result<()> {
    match tokio::fs::remove_dir_all(directory).await {
        Ok(()) => {
            tracing::info!(directory = %directory.display(), "Removed existing directory");
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
        Err(e) => {
            return Err(Error::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to remove directory '{}': {}", directory.display(), e),
            )));
        }
    }

    tokio::fs::create_dir_all(directory).await.map_err(|e| {
        Error::Io(std::io::Error::new(
            e.kind(),
            format!("Failed to create directory '{}': {}", directory.display(), e),
        ))
    })
}
