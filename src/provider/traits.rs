//! Trait for remote collection providers

use async_trait::async_trait;
use futures::stream::BoxStream;

use crate::error::FetchError;
use crate::types::{CollectionItem, StreamVariant};

/// Lazy, finite sequence of collection items in the collection's natural order
///
/// An `Err` element means listing broke off; no further items follow it.
pub type ItemStream = BoxStream<'static, crate::Result<CollectionItem>>;

/// Source of collection listings and per-item stream variants
///
/// Implementations may perform network I/O on every call but never mutate local
/// state. Listing is not restartable mid-sequence; calling
/// [`list_items`](CollectionProvider::list_items) again starts a fresh listing.
#[async_trait]
pub trait CollectionProvider: Send + Sync {
    /// Start listing the items of a collection
    ///
    /// # Errors
    ///
    /// Returns [`crate::Error::Listing`] when the collection cannot be listed at all.
    async fn list_items(&self, collection_id: &str) -> crate::Result<ItemStream>;

    /// Resolve an item to the variants it can be downloaded as
    ///
    /// # Errors
    ///
    /// Returns [`FetchError::ItemUnavailable`] when the provider reports the item
    /// cannot be resolved, [`FetchError::ProviderMetadata`] when the provider's own
    /// lookup breaks, and other variants for transport problems.
    async fn resolve_stream(
        &self,
        item: &CollectionItem,
    ) -> std::result::Result<Vec<StreamVariant>, FetchError>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
