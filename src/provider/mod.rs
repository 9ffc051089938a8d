//! Remote collection access
//!
//! The engine never talks to a media site directly. It consumes a
//! [`CollectionProvider`], which lists the items of a collection and resolves
//! each item to the downloadable variants it advertises. Variant choice is a
//! separate, configurable policy ([`select_stream_variant`]).
//!
//! Implementations provided:
//!
//! - [`YtDlpProvider`]: shells out to the external `yt-dlp` binary
//!
//! ## Usage
//!
//! ```no_run
//! use futures::StreamExt;
//! use playlist_sync::provider::{CollectionProvider, YtDlpProvider, select_stream_variant};
//! use playlist_sync::StreamSelection;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let provider = YtDlpProvider::from_path().expect("yt-dlp not found in PATH");
//!
//!     let mut items = provider.list_items("https://www.youtube.com/playlist?list=PL123").await?;
//!     while let Some(item) = items.next().await {
//!         let item = item?;
//!         let variants = provider.resolve_stream(&item).await?;
//!         if let Some(stream) = select_stream_variant(variants, StreamSelection::First) {
//!             println!("{} -> {}", item.id, stream.expected_filename);
//!         }
//!     }
//!     Ok(())
//! }
//! ```

mod select;
mod traits;
mod yt_dlp;

pub use select::select_stream_variant;
pub use traits::{CollectionProvider, ItemStream};
pub use yt_dlp::YtDlpProvider;
