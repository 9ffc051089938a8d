//! Byte transfer for a chosen stream variant
//!
//! Items are all-or-nothing: bytes are streamed into `<name>.part` and renamed
//! into place only after the body has been fully written. Any failure removes the
//! partial file, so the target directory only ever holds complete items.

use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;

use crate::config::TransferConfig;
use crate::error::{Error, FetchError, Result};
use crate::types::StreamDescriptor;
use crate::utils::partial_path;

/// Fetches a stream variant into a destination directory
#[async_trait]
pub trait Transfer: Send + Sync {
    /// Write the stream to `destination_dir/stream.expected_filename`
    ///
    /// Returns the path of the written file.
    async fn fetch(
        &self,
        stream: &StreamDescriptor,
        destination_dir: &Path,
    ) -> std::result::Result<PathBuf, FetchError>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}

/// HTTP(S) transfer using reqwest
#[derive(Debug, Clone)]
pub struct HttpTransfer {
    client: reqwest::Client,
}

impl HttpTransfer {
    /// Build a transfer with timeouts and User-Agent from config
    pub fn new(config: &TransferConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .connect_timeout(config.connect_timeout)
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(Error::Network)?;
        Ok(Self { client })
    }

    /// Use an existing client
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }

    async fn stream_to_file(
        &self,
        stream: &StreamDescriptor,
        partial: &Path,
    ) -> std::result::Result<u64, FetchError> {
        let url = &stream.source.url;
        let mut request = self.client.get(url);
        for (name, value) in &stream.source.http_headers {
            request = request.header(name.as_str(), value.as_str());
        }

        let mut response = request.send().await.map_err(map_reqwest_error)?;
        let status = response.status();
        if !status.is_success() {
            return Err(FetchError::Http {
                status: status.as_u16(),
                url: url.clone(),
            });
        }
        let expected_len = response.content_length();

        let mut file = tokio::fs::File::create(partial).await?;
        let mut written: u64 = 0;
        while let Some(chunk) = response.chunk().await.map_err(map_reqwest_error)? {
            file.write_all(&chunk).await?;
            written += chunk.len() as u64;
        }
        file.flush().await?;
        file.sync_all().await?;

        if let Some(expected) = expected_len
            && expected != written
        {
            return Err(FetchError::MalformedResponse(format!(
                "body ended after {written} of {expected} bytes"
            )));
        }
        Ok(written)
    }
}

fn map_reqwest_error(e: reqwest::Error) -> FetchError {
    if e.is_timeout() {
        FetchError::Timeout(e.to_string())
    } else if e.is_decode() || e.is_body() {
        FetchError::MalformedResponse(e.to_string())
    } else {
        FetchError::Network(e)
    }
}

#[async_trait]
impl Transfer for HttpTransfer {
    async fn fetch(
        &self,
        stream: &StreamDescriptor,
        destination_dir: &Path,
    ) -> std::result::Result<PathBuf, FetchError> {
        let destination = destination_dir.join(&stream.expected_filename);
        let partial = partial_path(&destination);

        match self.stream_to_file(stream, &partial).await {
            Ok(bytes) => {
                tokio::fs::rename(&partial, &destination).await?;
                tracing::debug!(
                    path = %destination.display(),
                    bytes,
                    "Transfer complete"
                );
                Ok(destination)
            }
            Err(e) => {
                if let Err(cleanup) = tokio::fs::remove_file(&partial).await
                    && cleanup.kind() != std::io::ErrorKind::NotFound
                {
                    tracing::warn!(
                        path = %partial.display(),
                        error = %cleanup,
                        "Failed to remove partial file"
                    );
                }
                Err(e)
            }
        }
    }

    fn name(&self) -> &'static str {
        "http"
    }
}
