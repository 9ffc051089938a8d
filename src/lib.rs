//! # playlist-sync
//!
//! Keeps a local directory in step with a remote media playlist.
//!
//! ## Design Philosophy
//!
//! playlist-sync is designed to be:
//! - **Resumable** - Re-running a sync only fetches what is missing locally
//! - **Fault tolerant** - One broken item never aborts the run; every item ends
//!   with exactly one recorded outcome
//! - **Polite** - Successive fetches are spaced by a random delay
//! - **Pluggable** - Listing, transfer and pacing sit behind traits
//!
//! ## Quick Start
//!
//! ```no_run
//! use playlist_sync::{Config, RunController, SyncMode};
//! use std::path::Path;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = Config::default();
//!     let controller = RunController::from_config(&config)?;
//!
//!     // Subscribe to events
//!     let mut events = controller.subscribe();
//!     tokio::spawn(async move {
//!         while let Ok(event) = events.recv().await {
//!             println!("Event: {:?}", event);
//!         }
//!     });
//!
//!     let report = controller
//!         .run_mode("PLxxxxxxxx", Path::new("downloads"), SyncMode::Resume)
//!         .await?;
//!     println!("{} downloaded, {} failed", report.succeeded, report.failed);
//!
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::unwrap_used)]
#![warn(clippy::expect_used)]

/// Politeness delay between fetches
pub mod backoff;
/// Configuration types
pub mod config;
/// Run orchestration
pub mod controller;
/// Audio extraction utility
pub mod convert;
/// Error types and failure classification
pub mod error;
/// Per-item fetch with bounded retry
pub mod executor;
/// Local directory snapshot
pub mod local;
/// Remote collection providers
pub mod provider;
/// Remote/local reconciliation
pub mod reconcile;
/// Retry logic with exponential backoff
pub mod retry;
/// Byte transfer
pub mod transfer;
/// Core types and events
pub mod types;
/// Utility functions
pub mod utils;

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
pub(crate) mod test_helpers;

// Re-export commonly used types
pub use backoff::{Backoff, NoBackoff, RandomBackoff};
pub use config::{BackoffConfig, Config, DownloadConfig, RetryConfig, ToolsConfig, TransferConfig};
pub use controller::RunController;
pub use convert::{ConvertReport, FfmpegTranscoder, Transcoder, convert_directory};
pub use error::{Error, FailureKind, FetchError, Result, classify};
pub use executor::FetchExecutor;
pub use provider::{CollectionProvider, ItemStream, YtDlpProvider, select_stream_variant};
pub use reconcile::{Decision, Reconciler};
pub use transfer::{HttpTransfer, Transfer};
pub use types::{
    CollectionItem, Event, FailedItem, FetchOutcome, FetchTask, LocalFileSet, OutcomeStatus,
    PermanentKind, RunReport, StreamDescriptor, StreamSelection, StreamSource, StreamVariant,
    SyncMode,
};

/// Run a sync with graceful signal handling.
///
/// The first termination signal triggers the controller's cancellation token:
/// the item in flight finishes and the partial report is returned with
/// `cancelled` set. A second signal abandons the item in flight and returns
/// [`Error::Interrupted`]; its `.part` file is left behind and ignored by the
/// next resume.
///
/// - **Unix:** listens for SIGTERM and SIGINT, falling back to whichever one can be registered.
/// - **Windows/other:** listens for Ctrl+C via `tokio::signal::ctrl_c()`.
///
/// # Example
///
/// ```no_run
/// use playlist_sync::{Config, RunController, SyncMode, run_with_shutdown};
/// use std::path::Path;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let controller = RunController::from_config(&Config::default())?;
///
///     // Run with automatic signal handling
///     let report =
///         run_with_shutdown(&controller, "PLxxxxxxxx", Path::new("downloads"), SyncMode::Resume)
///             .await?;
///     println!("cancelled: {}", report.cancelled);
///
///     Ok(())
/// }
/// ```
pub async fn run_with_shutdown(
    controller: &RunController,
    collection: &str,
    directory: &std::path::Path,
    mode: SyncMode,
) -> Result<RunReport> {
    let mut signals = ShutdownSignals::install();
    let token = controller.cancellation_token();
    let run = controller.run_mode(collection, directory, mode);
    tokio::pin!(run);

    tokio::select! {
        report = &mut run => return report,
        _ = signals.recv() => {
            tracing::info!("Finishing current item before stopping, signal again to abort it");
            token.cancel();
        }
    }

    tokio::select! {
        report = &mut run => report,
        _ = signals.recv() => {
            tracing::warn!("Second signal received, abandoning the item in flight");
            Err(Error::Interrupted)
        }
    }
}

/// Termination signal listeners, registered once for the whole run
#[cfg(unix)]
struct ShutdownSignals {
    sigterm: Option<tokio::signal::unix::Signal>,
    sigint: Option<tokio::signal::unix::Signal>,
}

#[cfg(unix)]
impl ShutdownSignals {
    fn install() -> Self {
        use tokio::signal::unix::{SignalKind, signal};

        // Registration may fail in restricted environments (containers, tests)
        let sigterm = signal(SignalKind::terminate())
            .inspect_err(|e| tracing::warn!(error = %e, "Could not register SIGTERM handler"))
            .ok();
        let sigint = signal(SignalKind::interrupt())
            .inspect_err(|e| tracing::warn!(error = %e, "Could not register SIGINT handler"))
            .ok();
        Self { sigterm, sigint }
    }

    /// Resolve on the next SIGTERM or SIGINT
    async fn recv(&mut self) {
        match (self.sigterm.as_mut(), self.sigint.as_mut()) {
            (Some(sigterm), Some(sigint)) => {
                tokio::select! {
                    _ = sigterm.recv() => tracing::info!("Received SIGTERM signal"),
                    _ = sigint.recv() => tracing::info!("Received SIGINT signal (Ctrl+C)"),
                }
            }
            (Some(sigterm), None) => {
                sigterm.recv().await;
                tracing::info!("Received SIGTERM signal");
            }
            (None, Some(sigint)) => {
                sigint.recv().await;
                tracing::info!("Received SIGINT signal (Ctrl+C)");
            }
            (None, None) => ctrl_c_or_never().await,
        }
    }
}

#[cfg(not(unix))]
struct ShutdownSignals;

#[cfg(not(unix))]
impl ShutdownSignals {
    fn install() -> Self {
        Self
    }

    async fn recv(&mut self) {
        ctrl_c_or_never().await;
    }
}

/// Without any signal source the run is never interrupted
async fn ctrl_c_or_never() {
    match tokio::signal::ctrl_c().await {
        Ok(()) => tracing::info!("Received Ctrl+C signal"),
        Err(e) => {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C signal");
            std::future::pending::<()>().await;
        }
    }
}
