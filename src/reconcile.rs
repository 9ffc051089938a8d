//! Reconciliation of remote items against the local snapshot
//!
//! For each item the reconciler resolves the stream variant, and either settles
//! the item on the spot (unresolvable, or already present locally in resume mode)
//! or turns it into a [`FetchTask`] for the executor. Decisions come out in the
//! order items went in.

use crate::error::{FailureKind, classify};
use crate::provider::{CollectionProvider, select_stream_variant};
use crate::types::{
    CollectionItem, FetchOutcome, FetchTask, LocalFileSet, PermanentKind, StreamSelection,
    SyncMode,
};

/// What to do with one item
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Decision {
    /// Needs a transfer
    Fetch(FetchTask),
    /// Already has its final outcome, no transfer will be issued
    Settled(FetchOutcome),
}

/// Decides, per item, whether a fetch is needed
pub struct Reconciler<'a> {
    provider: &'a dyn CollectionProvider,
    local: &'a LocalFileSet,
    mode: SyncMode,
    selection: StreamSelection,
}

impl<'a> Reconciler<'a> {
    /// Create a reconciler over a fixed snapshot
    ///
    /// In [`SyncMode::Overwrite`] the snapshot is ignored and every resolvable
    /// item becomes a fetch task.
    pub fn new(
        provider: &'a dyn CollectionProvider,
        local: &'a LocalFileSet,
        mode: SyncMode,
        selection: StreamSelection,
    ) -> Self {
        Self {
            provider,
            local,
            mode,
            selection,
        }
    }

    /// Decide a single item
    pub async fn decide(&self, item: CollectionItem) -> Decision {
        let variants = match self.provider.resolve_stream(&item).await {
            Ok(variants) => variants,
            Err(e) => {
                let kind = match classify(&e) {
                    FailureKind::Permanent(kind) => kind,
                    FailureKind::ProviderMetadata => {
                        tracing::warn!(
                            item_id = %item.id,
                            url = %item.url,
                            error = %e,
                            "Provider metadata lookup failed for item, skipping"
                        );
                        PermanentKind::ProviderMetadata
                    }
                    FailureKind::Transient => PermanentKind::Unresolvable,
                };
                tracing::info!(item_id = %item.id, error = %e, %kind, "Item could not be resolved");
                return Decision::Settled(FetchOutcome::permanent(item.id, kind, 1, e.to_string()));
            }
        };

        let Some(stream) = select_stream_variant(variants, self.selection) else {
            return Decision::Settled(FetchOutcome::permanent(
                item.id,
                PermanentKind::Unresolvable,
                1,
                "provider returned no stream variants",
            ));
        };

        if self.mode == SyncMode::Resume && self.local.contains(&stream.expected_filename) {
            tracing::debug!(
                item_id = %item.id,
                filename = %stream.expected_filename,
                "Already present locally"
            );
            return Decision::Settled(FetchOutcome::skipped_existing(item.id));
        }

        Decision::Fetch(FetchTask { item, stream })
    }

    /// Decide a batch of items, preserving order
    pub async fn plan(&self, items: impl IntoIterator<Item = CollectionItem>) -> Vec<Decision> {
        let mut decisions = Vec::new();
        for item in items {
            decisions.push(self.decide(item).await);
        }
        decisions
    }
}
