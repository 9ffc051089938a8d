//! Filename helpers shared by the provider, transfer and converter

use std::path::{Path, PathBuf};

/// Maximum length of a sanitized filename stem, in characters
const MAX_STEM_CHARS: usize = 200;

/// Suffix appended to files while they are being written
pub const PARTIAL_SUFFIX: &str = ".part";

// Invalid on at least one major platform, plus punctuation titles commonly carry
const UNSAFE_CHARS: &[char] = &[
    '"', '#', '$', '%', '\'', '*', ',', '.', '/', ':', ';', '<', '>', '?', '\\', '^', '|', '~',
];

/// Turn a media title into a filesystem-safe filename stem
///
/// Removes unsafe characters, collapses whitespace and truncates to a bounded
/// length. Falls back to `fallback` when nothing usable remains.
///
/// # Examples
///
/// ```
/// use playlist_sync::utils::sanitize_filename;
///
/// assert_eq!(sanitize_filename("AC/DC: Back in Black", "x"), "ACDC Back in Black");
/// assert_eq!(sanitize_filename("???", "abc123"), "abc123");
/// ```
pub fn sanitize_filename(title: &str, fallback: &str) -> String {
    let stripped: String = title
        .chars()
        .filter(|c| !c.is_control() && !UNSAFE_CHARS.contains(c))
        .collect();
    let collapsed = stripped.split_whitespace().collect::<Vec<_>>().join(" ");
    let truncated: String = collapsed.chars().take(MAX_STEM_CHARS).collect();
    let trimmed = truncated.trim();
    if trimmed.is_empty() {
        fallback.to_string()
    } else {
        trimmed.to_string()
    }
}

/// Build `<stem>.<extension>`
pub fn filename_with_extension(stem: &str, extension: &str) -> String {
    if extension.is_empty() {
        stem.to_string()
    } else {
        format!("{stem}.{extension}")
    }
}

/// Path used while a file is still being written
pub fn partial_path(destination: &Path) -> PathBuf {
    let mut name = destination
        .file_name()
        .map(|n| n.to_os_string())
        .unwrap_or_default();
    name.push(PARTIAL_SUFFIX);
    destination.with_file_name(name)
}

/// Same path with a different extension (e.g. `song.mp4` -> `song.mp3`)
pub fn sibling_with_extension(path: &Path, extension: &str) -> PathBuf {
    path.with_extension(extension)
}

/// Whether `path` has the given extension, compared case-insensitively
pub fn has_extension(path: &Path, extension: &str) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case(extension))
}
