//! Sandboxed asset storage for uploads, results, and scratch files.
//!
//! Every asset lives under one of three configured bucket roots. All
//! path handling goes through containment checks before any I/O, so a
//! hostile subfolder or filename can never name a file outside its
//! bucket.

mod preview;
mod store;

pub use preview::{extract_channel, render_preview, Channel, PreviewFormat};
pub use store::{content_type, AssetStore, StoreRoots};
