//! Transcoder seam

use async_trait::async_trait;
use std::path::Path;

/// Extracts the audio track of one media file into another file
///
/// Implementations may shell out to an external binary or do the work
/// in-process. The output path's extension selects the target format.
#[async_trait]
pub trait Transcoder: Send + Sync {
    /// Write the audio of `input` to `output`, replacing `output` if present
    ///
    /// # Errors
    ///
    /// Returns an error when the input cannot be decoded or the output cannot
    /// be written. A failed call may leave a partial `output` behind; callers
    /// clean up.
    async fn transcode(&self, input: &Path, output: &Path) -> crate::Result<()>;

    /// Human-readable name for logging
    fn name(&self) -> &'static str;
}
