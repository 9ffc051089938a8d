//! Local directory inspection

use std::path::Path;

use crate::error::{Error, Result};
use crate::types::LocalFileSet;
use crate::utils::PARTIAL_SUFFIX;

/// Capture the filenames currently present in `directory`
///
/// Only regular files count. Leftover `.part` files from an interrupted run are
/// ignored so they never satisfy an item.
///
/// # Errors
///
/// Returns [`Error::DirectoryUnreadable`] when the directory does not exist or
/// cannot be listed.
pub async fn snapshot(directory: &Path) -> Result<LocalFileSet> {
    let unreadable = |source: std::io::Error| Error::DirectoryUnreadable {
        path: directory.to_path_buf(),
        source,
    };

    let mut entries = tokio::fs::read_dir(directory).await.map_err(unreadable)?;
    let mut names = Vec::new();
    while let Some(entry) = entries.next_entry().await.map_err(unreadable)? {
        let is_file = match entry.file_type().await {
            Ok(ft) => ft.is_file() || ft.is_symlink(),
            Err(e) => {
                tracing::debug!(path = %entry.path().display(), error = %e, "Skipping unreadable entry");
                false
            }
        };
        if !is_file {
            continue;
        }
        match entry.file_name().into_string() {
            Ok(name) if name.ends_with(PARTIAL_SUFFIX) => {}
            Ok(name) => names.push(name),
            Err(raw) => {
                tracing::debug!(name = ?raw, "Skipping non UTF-8 filename");
            }
        }
    }

    tracing::debug!(
        directory = %directory.display(),
        files = names.len(),
        "Captured local snapshot"
    );
    Ok(names.into_iter().collect())
}
