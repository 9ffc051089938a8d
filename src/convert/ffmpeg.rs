//! ffmpeg-based transcoder

use super::traits::Transcoder;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tokio::process::Command;

/// Transcoder running the external `ffmpeg` binary
///
/// Runs `ffmpeg -y -i <input> -vn <output>`: the video stream is dropped and
/// the audio is encoded in the format implied by the output extension.
///
/// # Examples
///
/// ```no_run
/// use playlist_sync::convert::{FfmpegTranscoder, Transcoder};
/// use std::path::Path;
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let ffmpeg = FfmpegTranscoder::from_path().expect("ffmpeg not found in PATH");
/// ffmpeg.transcode(Path::new("song.mp4"), Path::new("song.mp3")).await?;
/// # Ok(())
/// # }
/// ```
pub struct FfmpegTranscoder {
    binary_path: PathBuf,
}

impl FfmpegTranscoder {
    /// Create a transcoder with an explicit binary path
    pub fn new(binary_path: PathBuf) -> Self {
        Self { binary_path }
    }

    /// Attempt to find ffmpeg in PATH
    pub fn from_path() -> Option<Self> {
        which::which("ffmpeg").ok().map(Self::new)
    }

    /// Path of the binary this transcoder runs
    pub fn binary_path(&self) -> &Path {
        &self.binary_path
    }
}

#[async_trait]
impl Transcoder for FfmpegTranscoder {
    async fn transcode(&self, input: &Path, output: &Path) -> crate::Result<()> {
        let result = Command::new(&self.binary_path)
            .arg("-y")
            .arg("-hide_banner")
            .args(["-loglevel", "error"])
            .arg("-i")
            .arg(input)
            .arg("-vn")
            .arg(output)
            .kill_on_drop(true)
            .output()
            .await
            .map_err(|e| crate::Error::ExternalTool(format!("Failed to execute ffmpeg: {}", e)))?;

        if result.status.success() {
            return Ok(());
        }

        let stderr = String::from_utf8_lossy(&result.stderr);
        let message = stderr
            .lines()
            .rev()
            .find(|line| !line.trim().is_empty())
            .unwrap_or("no diagnostic output");
        Err(crate::Error::ExternalTool(format!(
            "ffmpeg exited with {} for '{}': {}",
            result.status,
            input.display(),
            message.trim()
        )))
    }

    fn name(&self) -> &'static str {
        "ffmpeg"
    }
}
