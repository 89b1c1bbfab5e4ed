//! # cairn-store
//!
//! Document backends and the update-release-index pipeline.
//!
//! Open a backend with [`open`], then call [`update_release_index`] to merge a
//! build into its stream's index, or [`load_manifest`] / [`load_index`] to
//! read documents for other commands.

pub mod backend;
pub mod diff;
pub mod error;
pub mod local;
pub mod mirror;
pub mod pipeline;

pub use backend::{open, DocumentStore};
pub use error::StoreError;
pub use local::LocalStore;
pub use mirror::MirrorStore;
pub use pipeline::{
    fetch_manifest, load_index, load_manifest, update_release_index, UpdateAction, UpdateReport,
};
