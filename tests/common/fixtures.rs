//! Playlist fixtures backed by a mock HTTP server

use async_trait::async_trait;
use futures::StreamExt;
use futures::stream;
use playlist_sync::{
    CollectionItem, CollectionProvider, Config, FetchError, HttpTransfer, ItemStream, NoBackoff,
    Result, RunController, StreamSource, StreamVariant, TransferConfig,
};
use std::collections::HashMap;
use std::path::Path;
use std::sync::Arc;

/// Provider serving a fixed playlist whose media lives under `base_url`
///
/// Item `X` resolves to a single variant `X.mp4` at `<base_url>/X.mp4`.
pub struct PlaylistFixture {
    base_url: String,
    ids: Vec<String>,
    unavailable: HashMap<String, String>,
}

impl PlaylistFixture {
    /// Playlist of `ids` served from `base_url`
    pub fn new(base_url: &str, ids: &[&str]) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            ids: ids.iter().map(|id| id.to_string()).collect(),
            unavailable: HashMap::new(),
        }
    }

    /// Make `id` fail resolution with a provider message
    pub fn unavailable(mut self, id: &str, message: &str) -> Self {
        self.unavailable.insert(id.to_string(), message.to_string());
        self
    }
}

#[async_trait]
impl CollectionProvider for PlaylistFixture {
    async fn list_items(&self, _collection_id: &str) -> Result<ItemStream> {
        let items: Vec<Result<CollectionItem>> = self
            .ids
            .iter()
            .map(|id| {
                Ok(CollectionItem::new(
                    id.clone(),
                    format!("https://www.youtube.com/watch?v={id}"),
                ))
            })
            .collect();
        Ok(stream::iter(items).boxed())
    }

    async fn resolve_stream(
        &self,
        item: &CollectionItem,
    ) -> std::result::Result<Vec<StreamVariant>, FetchError> {
        if let Some(message) = self.unavailable.get(&item.id) {
            return Err(FetchError::ItemUnavailable(message.clone()));
        }
        let filename = format!("{}.mp4", item.id);
        Ok(vec![StreamVariant {
            format_id: "18".into(),
            extension: "mp4".into(),
            height: Some(360),
            source: StreamSource {
                url: format!("{}/{}", self.base_url, filename),
                http_headers: Default::default(),
            },
            filename,
        }])
    }

    fn name(&self) -> &'static str {
        "fixture"
    }
}

/// Controller wired to the fixture, a real HTTP transfer and no pacing
pub fn http_controller(provider: PlaylistFixture, config: &Config) -> RunController {
    let transfer = HttpTransfer::new(&TransferConfig::default()).expect("http client");
    RunController::new(
        config,
        Arc::new(provider),
        Arc::new(transfer),
        Arc::new(NoBackoff),
    )
}

/// Sorted file names in `dir`
pub fn file_names(dir: &Path) -> Vec<String> {
    let mut names: Vec<String> = std::fs::read_dir(dir)
        .expect("read dir")
        .map(|e| e.expect("entry").file_name().to_string_lossy().into_owned())
        .collect();
    names.sort();
    names
}
