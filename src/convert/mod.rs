//! Audio extraction for a synced directory
//!
//! Independent of the sync engine: it only looks at files on disk. Every
//! `*.mp4` without an `.mp3` sibling is transcoded next to the original, which
//! is kept. Existing `.mp3` files are never touched, so the pass is safe to
//! repeat after every sync.
//!
//! ```no_run
//! use playlist_sync::convert::{FfmpegTranscoder, convert_directory};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let ffmpeg = FfmpegTranscoder::from_path().expect("ffmpeg binary not found");
//!     let report = convert_directory(Path::new("downloads"), "mp4", "mp3", &ffmpeg).await?;
//!     println!("Converted {} of {}", report.converted, report.total);
//!     Ok(())
//! }
//! ```

mod ffmpeg;
mod traits;

pub use ffmpeg::FfmpegTranscoder;
pub use traits::Transcoder;

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{Error, Result};
use crate::utils::{has_extension, sibling_with_extension};

/// Summary of one conversion pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConvertReport {
    /// Source files found
    pub total: usize,
    /// Files transcoded in this pass
    pub converted: usize,
    /// Files whose target already existed
    pub skipped_existing: usize,
    /// Source files that could not be transcoded
    pub failed: Vec<PathBuf>,
}

/// Transcode every `source_ext` file in `directory` lacking a `target_ext` sibling
///
/// Files are handled in name order. A failing file is recorded and the pass
/// moves on; a partially written target is removed so the next pass retries it.
///
/// # Errors
///
/// Returns [`Error::DirectoryUnreadable`] if `directory` cannot be listed.
/// Per-file failures end up in [`ConvertReport::failed`] instead.
pub async fn convert_directory(
    directory: &Path,
    source_ext: &str,
    target_ext: &str,
    transcoder: &dyn Transcoder,
) -> Result<ConvertReport> {
    let sources = list_sources(directory, source_ext).await?;
    let mut report = ConvertReport {
        total: sources.len(),
        ..Default::default()
    };

    for source in sources {
        let target = sibling_with_extension(&source, target_ext);
        if tokio::fs::try_exists(&target).await.unwrap_or(false) {
            tracing::debug!(file = %source.display(), "Target exists, skipping");
            report.skipped_existing += 1;
            continue;
        }

        match transcoder.transcode(&source, &target).await {
            Ok(()) => {
                tracing::info!(
                    from = %source.display(),
                    to = %target.display(),
                    transcoder = transcoder.name(),
                    "Converted file"
                );
                report.converted += 1;
            }
            Err(e) => {
                tracing::warn!(file = %source.display(), error = %e, "Could not convert file");
                if let Err(rm) = tokio::fs::remove_file(&target).await
                    && rm.kind() != std::io::ErrorKind::NotFound
                {
                    tracing::warn!(file = %target.display(), error = %rm, "Failed to remove partial output");
                }
                report.failed.push(source);
            }
        }
    }

    Ok(report)
}

async fn list_sources(directory: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let unreadable = |source: std::io::Error| Error::DirectoryUnreadable {
        path: directory.to_path_buf(),
        source,
    };

    let mut entries = tokio::fs::read_dir(directory).await.map_err(unreadable)?;
    let mut sources = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(unreadable)? {
        let path = entry.path();
        let is_file = entry.file_type().await.is_ok_and(|ft| ft.is_file());
        if is_file && has_extension(&path, extension) {
            sources.push(path);
        }
    }
    sources.sort();
    Ok(sources)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::Mutex;
    use tempfile::TempDir;

    /// Copies input to output, failing for names containing "broken"
    #[derive(Default)]
    struct CopyTranscoder {
        calls: Mutex<Vec<PathBuf>>,
    }

    #[async_trait]
    impl Transcoder for CopyTranscoder {
        async fn transcode(&self, input: &Path, output: &Path) -> crate::Result<()> {
            self.calls.lock().unwrap().push(input.to_path_buf());
            tokio::fs::write(output, b"partial").await?;
            if input.to_string_lossy().contains("broken") {
                return Err(Error::ExternalTool("Invalid data found".into()));
            }
            tokio::fs::copy(input, output).await?;
            Ok(())
        }

        fn name(&self) -> &'static str {
            "copy"
        }
    }

    #[tokio::test]
    async fn converts_missing_and_skips_existing() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.mp4"), b"a").unwrap();
        std::fs::write(dir.path().join("b.mp4"), b"b").unwrap();
        std::fs::write(dir.path().join("b.mp3"), b"done").unwrap();
        std::fs::write(dir.path().join("notes.txt"), b"n").unwrap();

        let transcoder = CopyTranscoder::default();
        let report = convert_directory(dir.path(), "mp4", "mp3", &transcoder)
            .await
            .unwrap();

        assert_eq!(report.total, 2);
        assert_eq!(report.converted, 1);
        assert_eq!(report.skipped_existing, 1);
        assert!(report.failed.is_empty());
        assert_eq!(std::fs::read(dir.path().join("a.mp3")).unwrap(), b"a");
        assert_eq!(std::fs::read(dir.path().join("b.mp3")).unwrap(), b"done");
        assert_eq!(
            *transcoder.calls.lock().unwrap(),
            vec![dir.path().join("a.mp4")]
        );
    }

    #[tokio::test]
    async fn failure_is_recorded_and_partial_output_removed() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("broken.mp4"), b"?").unwrap();
        std::fs::write(dir.path().join("good.mp4"), b"g").unwrap();

        let report = convert_directory(dir.path(), "mp4", "mp3", &CopyTranscoder::default())
            .await
            .unwrap();

        assert_eq!(report.total, 2);
        assert_eq!(report.converted, 1);
        assert_eq!(report.failed, vec![dir.path().join("broken.mp4")]);
        assert!(!dir.path().join("broken.mp3").exists());
        assert!(dir.path().join("good.mp3").exists());
    }

    #[tokio::test]
    async fn second_pass_converts_nothing() {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("a.mp4"), b"a").unwrap();
        let transcoder = CopyTranscoder::default();

        convert_directory(dir.path(), "mp4", "mp3", &transcoder)
            .await
            .unwrap();
        let again = convert_directory(dir.path(), "mp4", "mp3", &transcoder)
            .await
            .unwrap();

        assert_eq!(again.converted, 0);
        assert_eq!(again.skipped_existing, 1);
    }

    #[tokio::test]
    async fn unreadable_directory_is_an_error() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("missing");
        let result = convert_directory(&missing, "mp4", "mp3", &CopyTranscoder::default()).await;
        assert!(matches!(result, Err(Error::DirectoryUnreadable { .. })));
    }
}
