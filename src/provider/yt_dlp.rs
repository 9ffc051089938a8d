//! Collection provider backed by the external yt-dlp binary

use async_trait::async_trait;
use futures::stream::{self, StreamExt};
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, BufReader, Lines};
use tokio::process::{Child, ChildStdout, Command};
use tokio::task::JoinHandle;

use super::traits::{CollectionProvider, ItemStream};
use crate::error::{Error, FetchError, permanent_kind_from_message};
use crate::types::{CollectionItem, StreamSource, StreamVariant};
use crate::utils::{filename_with_extension, sanitize_filename};

/// Provider that lists and resolves items by running `yt-dlp`
///
/// # Examples
///
/// ```no_run
/// use playlist_sync::provider::YtDlpProvider;
/// use std::path::PathBuf;
///
/// // Create with explicit path
/// let provider = YtDlpProvider::new(PathBuf::from("/usr/local/bin/yt-dlp"));
///
/// // Or auto-discover from PATH
/// let provider = YtDlpProvider::from_path().expect("yt-dlp not found in PATH");
/// ```
#[derive(Debug, Clone)]
pub struct YtDlpProvider {
    binary_path: PathBuf,
}

impl YtDlpProvider {
    /// Create a provider with an explicit binary path
    pub fn new(binary_path: PathBuf) -> Self {
        Self { binary_path }
    }

    /// Attempt to find yt-dlp in PATH
    pub fn from_path() -> Option<Self> {
        which::which("yt-dlp").ok().map(Self::new)
    }

    /// Path of the binary this provider runs
    pub fn binary_path(&self) -> &PathBuf {
        &self.binary_path
    }
}

/// One line of `--flat-playlist --dump-json` output
#[derive(Debug, Deserialize)]
struct FlatEntry {
    id: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    webpage_url: Option<String>,
}

/// `--dump-single-json` output for one item
#[derive(Debug, Deserialize)]
struct ItemInfo {
    id: String,
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    formats: Vec<FormatInfo>,
}

#[derive(Debug, Deserialize)]
struct FormatInfo {
    format_id: String,
    #[serde(default)]
    ext: Option<String>,
    #[serde(default)]
    height: Option<u32>,
    #[serde(default)]
    vcodec: Option<String>,
    #[serde(default)]
    acodec: Option<String>,
    #[serde(default)]
    protocol: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    http_headers: BTreeMap<String, String>,
}

impl FormatInfo {
    /// Single-file format carrying both audio and video over plain HTTP
    fn is_progressive(&self) -> bool {
        let has = |codec: &Option<String>| codec.as_deref().is_some_and(|c| c != "none");
        let http = self
            .protocol
            .as_deref()
            .is_none_or(|p| p == "http" || p == "https");
        has(&self.vcodec) && has(&self.acodec) && http && self.url.is_some()
    }
}

fn parse_flat_entry(line: &str) -> crate::Result<CollectionItem> {
    let entry: FlatEntry = serde_json::from_str(line)?;
    let url = entry
        .webpage_url
        .or(entry.url)
        .filter(|u| url::Url::parse(u).is_ok())
        .unwrap_or_else(|| entry.id.clone());
    Ok(CollectionItem::new(entry.id, url))
}

fn parse_item_info(json: &[u8]) -> Result<Vec<StreamVariant>, FetchError> {
    let info: ItemInfo = serde_json::from_slice(json)
        .map_err(|e| FetchError::MalformedResponse(format!("yt-dlp output: {e}")))?;
    let stem = sanitize_filename(info.title.as_deref().unwrap_or_default(), &info.id);

    let variants: Vec<StreamVariant> = info
        .formats
        .into_iter()
        .filter(FormatInfo::is_progressive)
        .filter_map(|f| {
            let extension = f.ext.unwrap_or_else(|| "mp4".to_string());
            Some(StreamVariant {
                filename: filename_with_extension(&stem, &extension),
                format_id: f.format_id,
                extension,
                height: f.height,
                source: StreamSource {
                    url: f.url?,
                    http_headers: f.http_headers,
                },
            })
        })
        .collect();

    if variants.is_empty() {
        return Err(FetchError::ItemUnavailable(format!(
            "{} has no downloadable single-file formats",
            info.id
        )));
    }
    Ok(variants)
}

/// Turn yt-dlp's stderr into the matching per-item error
fn error_from_stderr(stderr: &str) -> FetchError {
    let message = stderr
        .lines()
        .rev()
        .find(|l| l.starts_with("ERROR:"))
        .or_else(|| stderr.lines().rev().find(|l| !l.trim().is_empty()))
        .unwrap_or("yt-dlp exited with an error")
        .trim()
        .to_string();

    let lower = message.to_ascii_lowercase();
    if lower.contains("keyerror") || lower.contains("unable to extract") {
        FetchError::ProviderMetadata(message)
    } else if permanent_kind_from_message(&message).is_some() {
        FetchError::ItemUnavailable(message)
    } else {
        FetchError::Provider(message)
    }
}

fn collect_stderr<R>(stderr: Option<R>) -> JoinHandle<String>
where
    R: AsyncRead + Unpin + Send + 'static,
{
    tokio::spawn(async move {
        let mut buf = String::new();
        if let Some(mut stderr) = stderr {
            if let Err(e) = stderr.read_to_string(&mut buf).await {
                tracing::debug!(error = %e, "Could not read yt-dlp stderr");
            }
        }
        buf
    })
}

/// Live listing process whose stdout is consumed line by line
struct Listing {
    child: Child,
    lines: Lines<BufReader<ChildStdout>>,
    stderr: Option<JoinHandle<String>>,
}

impl Listing {
    async fn next_line(&mut self) -> crate::Result<Option<String>> {
        loop {
            match self.lines.next_line().await? {
                Some(line) if line.trim().is_empty() => continue,
                Some(line) => return Ok(Some(line)),
                None => return Ok(None),
            }
        }
    }

    /// Wait for the process after stdout closed and surface a failed exit
    async fn finish(&mut self) -> crate::Result<()> {
        let status = self.child.wait().await?;
        let stderr = match self.stderr.take() {
            Some(handle) => handle.await.unwrap_or_default(),
            None => String::new(),
        };
        if status.success() {
            Ok(())
        } else {
            Err(Error::Listing(error_from_stderr(&stderr).to_string()))
        }
    }
}

#[async_trait]
impl CollectionProvider for YtDlpProvider {
    async fn list_items(&self, collection_id: &str) -> crate::Result<ItemStream> {
        let mut child = Command::new(&self.binary_path)
            .arg("--flat-playlist")
            .arg("--dump-json")
            .arg("--no-warnings")
            .arg(collection_id)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| Error::ExternalTool(format!("Failed to execute yt-dlp: {}", e)))?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| Error::ExternalTool("yt-dlp stdout not captured".into()))?;
        let stderr = collect_stderr(child.stderr.take());

        let mut listing = Listing {
            child,
            lines: BufReader::new(stdout).lines(),
            stderr: Some(stderr),
        };

        // A collection that cannot be listed at all fails here, before any item is yielded
        let first = match listing.next_line().await? {
            Some(line) => parse_flat_entry(&line)
                .map_err(|e| Error::Listing(format!("unreadable listing output: {e}")))?,
            None => {
                listing.finish().await?;
                return Ok(stream::empty().boxed());
            }
        };

        let rest = stream::unfold(Some(listing), |state| async move {
            let Some(mut listing) = state else {
                return None;
            };
            match listing.next_line().await {
                Ok(Some(line)) => Some((parse_flat_entry(&line), Some(listing))),
                Ok(None) => match listing.finish().await {
                    Ok(()) => None,
                    Err(e) => Some((Err(e), None)),
                },
                Err(e) => Some((Err(e), None)),
            }
        });

        Ok(stream::once(async move { Ok(first) }).chain(rest).boxed())
    }

    async fn resolve_stream(
        &self,
        item: &CollectionItem,
    ) -> Result<Vec<StreamVariant>, FetchError> {
        let output = Command::new(&self.binary_path)
            .arg("--dump-single-json")
            .arg("--no-playlist")
            .arg("--no-warnings")
            .arg(&item.url)
            .stdin(Stdio::null())
            .output()
            .await?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(error_from_stderr(&stderr));
        }
        parse_item_info(&output.stdout)
    }

    fn name(&self) -> &'static str {
        "yt-dlp"
    }
}
