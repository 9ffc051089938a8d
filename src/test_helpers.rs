//! Deterministic in-memory implementations of the provider, transfer and backoff seams.

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use std::collections::{HashMap, VecDeque};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use crate::backoff::Backoff;
use crate::error::{Error, FetchError};
use crate::provider::{CollectionProvider, ItemStream};
use crate::transfer::Transfer;
use crate::types::{CollectionItem, StreamDescriptor, StreamSource, StreamVariant};

enum Resolution {
    Variants(Vec<(String, Option<u32>)>),
    Unavailable(String),
    Metadata(String),
}

/// Provider serving a fixed list of items
pub(crate) struct FakeProvider {
    items: Vec<CollectionItem>,
    resolutions: HashMap<String, Resolution>,
    list_error: Option<String>,
    fail_after: Option<usize>,
    pub(crate) list_calls: AtomicU32,
    pub(crate) resolve_calls: AtomicU32,
}

impl FakeProvider {
    /// Items whose single variant is `<id>.mp4`
    pub(crate) fn with_items(ids: &[&str]) -> Self {
        Self {
            items: ids
                .iter()
                .map(|id| CollectionItem::new(*id, format!("https://v.example/{id}")))
                .collect(),
            resolutions: HashMap::new(),
            list_error: None,
            fail_after: None,
            list_calls: AtomicU32::new(0),
            resolve_calls: AtomicU32::new(0),
        }
    }

    pub(crate) fn unavailable(mut self, id: &str, message: &str) -> Self {
        self.resolutions
            .insert(id.to_string(), Resolution::Unavailable(message.to_string()));
        self
    }

    pub(crate) fn metadata_error(mut self, id: &str, message: &str) -> Self {
        self.resolutions
            .insert(id.to_string(), Resolution::Metadata(message.to_string()));
        self
    }

    pub(crate) fn variants(mut self, id: &str, variants: &[(&str, Option<u32>)]) -> Self {
        self.resolutions.insert(
            id.to_string(),
            Resolution::Variants(
                variants
                    .iter()
                    .map(|(name, height)| (name.to_string(), *height))
                    .collect(),
            ),
        );
        self
    }

    /// Listing fails before yielding anything
    pub(crate) fn failing_listing(mut self, message: &str) -> Self {
        self.list_error = Some(message.to_string());
        self
    }

    /// Listing breaks off after `count` items
    pub(crate) fn fail_after(mut self, count: usize) -> Self {
        self.fail_after = Some(count);
        self
    }
}

#[async_trait]
impl CollectionProvider for FakeProvider {
    async fn list_items(&self, _collection_id: &str) -> crate::Result<ItemStream> {
        self.list_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(message) = &self.list_error {
            return Err(Error::Listing(message.clone()));
        }
        let mut results: Vec<crate::Result<CollectionItem>> = Vec::new();
        for (idx, item) in self.items.iter().enumerate() {
            if self.fail_after == Some(idx) {
                results.push(Err(Error::Listing("listing interrupted".into())));
                break;
            }
            results.push(Ok(item.clone()));
        }
        Ok(stream::iter(results).boxed())
    }

    async fn resolve_stream(
        &self,
        item: &CollectionItem,
    ) -> Result<Vec<StreamVariant>, FetchError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        let variant = |filename: &str, height: Option<u32>| StreamVariant {
            format_id: "18".into(),
            extension: "mp4".into(),
            height,
            filename: filename.to_string(),
            source: StreamSource {
                url: format!("fake://{}", filename),
                http_headers: Default::default(),
            },
        };
        match self.resolutions.get(&item.id) {
            None => Ok(vec![variant(&format!("{}.mp4", item.id), Some(360))]),
            Some(Resolution::Variants(list)) => {
                Ok(list.iter().map(|(name, h)| variant(name, *h)).collect())
            }
            Some(Resolution::Unavailable(msg)) => Err(FetchError::ItemUnavailable(msg.clone())),
            Some(Resolution::Metadata(msg)) => Err(FetchError::ProviderMetadata(msg.clone())),
        }
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// Scripted transfer result
#[derive(Clone, Copy, Debug)]
pub(crate) enum Step {
    Ok,
    Transient,
    Gone,
    Metadata,
}

/// Transfer that writes a small file, or fails according to a per-file script
#[derive(Default)]
pub(crate) struct FakeTransfer {
    scripts: Mutex<HashMap<String, VecDeque<Step>>>,
    calls: Mutex<Vec<String>>,
}

impl FakeTransfer {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Results for successive fetches of `filename`; `Ok` once the script runs out
    pub(crate) fn script(self, filename: &str, steps: &[Step]) -> Self {
        self.scripts
            .lock()
            .unwrap()
            .insert(filename.to_string(), steps.iter().copied().collect());
        self
    }

    /// Filenames requested, in call order
    pub(crate) fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl Transfer for FakeTransfer {
    async fn fetch(
        &self,
        stream: &StreamDescriptor,
        destination_dir: &Path,
    ) -> Result<PathBuf, FetchError> {
        let name = stream.expected_filename.clone();
        self.calls.lock().unwrap().push(name.clone());
        let step = self
            .scripts
            .lock()
            .unwrap()
            .get_mut(&name)
            .and_then(VecDeque::pop_front)
            .unwrap_or(Step::Ok);

        match step {
            Step::Ok => {
                let path = destination_dir.join(&name);
                tokio::fs::write(&path, stream.source.url.as_bytes()).await?;
                Ok(path)
            }
            Step::Transient => Err(FetchError::Io(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "connection reset by peer",
            ))),
            Step::Gone => Err(FetchError::Http {
                status: 410,
                url: stream.source.url.clone(),
            }),
            Step::Metadata => Err(FetchError::ProviderMetadata("KeyError: 'url'".into())),
        }
    }

    fn name(&self) -> &'static str {
        "fake"
    }
}

/// Backoff that only counts how often it was asked to wait
#[derive(Default)]
pub(crate) struct CountingBackoff {
    pub(crate) count: AtomicU32,
}

#[async_trait]
impl Backoff for CountingBackoff {
    async fn delay(&self) {
        self.count.fetch_add(1, Ordering::SeqCst);
    }

    fn name(&self) -> &'static str {
        "counting"
    }
}
