//! Per-item fetch with bounded retry
//!
//! The executor never fails: every task ends in exactly one [`FetchOutcome`].
//! Transient errors are retried up to the configured attempt budget, permanent
//! errors end the item after one attempt, and provider metadata defects are
//! logged and skipped without retrying.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use tokio::sync::broadcast;

use crate::backoff::Backoff;
use crate::config::RetryConfig;
use crate::error::{FailureKind, FetchError, classify};
use crate::retry::retry_classified;
use crate::transfer::Transfer;
use crate::types::{Event, FetchOutcome, FetchTask, PermanentKind};

/// Error classifier signature
pub type Classifier = fn(&FetchError) -> FailureKind;

/// Executes fetch tasks against a [`Transfer`]
#[derive(Clone)]
pub struct FetchExecutor {
    transfer: Arc<dyn Transfer>,
    retry: RetryConfig,
    classifier: Classifier,
    retry_pause: Option<Arc<dyn Backoff>>,
    events: Option<broadcast::Sender<Event>>,
}

impl FetchExecutor {
    /// Create an executor using the standard classifier
    pub fn new(transfer: Arc<dyn Transfer>, retry: RetryConfig) -> Self {
        Self {
            transfer,
            retry,
            classifier: classify,
            retry_pause: None,
            events: None,
        }
    }

    /// Replace the error classifier
    pub fn with_classifier(mut self, classifier: Classifier) -> Self {
        self.classifier = classifier;
        self
    }

    /// Wait on `backoff` before each retry of the same item
    pub fn with_retry_pause(mut self, backoff: Arc<dyn Backoff>) -> Self {
        self.retry_pause = Some(backoff);
        self
    }

    /// Publish retry events on `tx`
    pub fn with_events(mut self, tx: broadcast::Sender<Event>) -> Self {
        self.events = Some(tx);
        self
    }

    /// Configured attempt budget
    pub fn max_attempts(&self) -> u32 {
        self.retry.max_attempts.max(1)
    }

    /// Fetch one item into `destination_dir`
    pub async fn execute(&self, task: &FetchTask, destination_dir: &Path) -> FetchOutcome {
        self.execute_with_path(task, destination_dir).await.0
    }

    /// Like [`execute`](Self::execute), also returning the written path on success
    pub async fn execute_with_path(
        &self,
        task: &FetchTask,
        destination_dir: &Path,
    ) -> (FetchOutcome, Option<PathBuf>) {
        let item_id = task.item.id.as_str();
        let events = self.events.clone();

        let attempted = retry_classified(
            &self.retry,
            self.classifier,
            self.retry_pause.as_deref(),
            |attempt, e: &FetchError| {
                if let Some(tx) = &events {
                    tx.send(Event::ItemRetrying {
                        item_id: item_id.to_string(),
                        attempt,
                        error: e.to_string(),
                    })
                    .ok();
                }
            },
            |attempt| {
                tracing::debug!(item_id, attempt, filename = %task.stream.expected_filename, "Transfer attempt");
                self.transfer.fetch(&task.stream, destination_dir)
            },
        )
        .await;

        let attempts = attempted.attempts;
        match attempted.result {
            Ok(path) => (FetchOutcome::success(item_id, attempts), Some(path)),
            Err(e) => {
                let outcome = match attempted.failure.unwrap_or(FailureKind::Transient) {
                    FailureKind::Transient => {
                        tracing::warn!(item_id, attempts, error = %e, "Giving up on item after retries");
                        FetchOutcome::exhausted(item_id, attempts, e.to_string())
                    }
                    FailureKind::Permanent(kind) => {
                        tracing::info!(item_id, %kind, error = %e, "Item cannot be fetched, skipping");
                        FetchOutcome::permanent(item_id, kind, attempts, e.to_string())
                    }
                    FailureKind::ProviderMetadata => {
                        tracing::warn!(
                            item_id,
                            url = %task.item.url,
                            error = %e,
                            "Provider metadata lookup failed for item, skipping"
                        );
                        FetchOutcome::permanent(
                            item_id,
                            PermanentKind::ProviderMetadata,
                            attempts,
                            e.to_string(),
                        )
                    }
                };
                (outcome, None)
            }
        }
    }
}
