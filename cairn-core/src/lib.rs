//! cairn core library — release domain types, reconciliation, configuration.
//!
//! Public API surface:
//! - [`types`] — manifest and index documents
//! - [`commits`] — commit-set comparison
//! - [`reconcile`] — merging a candidate release into an index
//! - [`request`] — validated invocation inputs and storage keys
//! - [`stream`] — stream metadata generation
//! - [`config`] — `~/.cairn/config.yaml`
//! - [`error`] — [`ReleaseError`]

pub mod commits;
pub mod config;
pub mod error;
pub mod reconcile;
pub mod request;
pub mod stream;
pub mod types;

pub use commits::{compare, CommitSetRelation};
pub use config::{AwsConfig, BackendConfig, CairnConfig, PublishConfig, ScpTarget};
pub use error::ReleaseError;
pub use reconcile::{reconcile, Reconciliation};
pub use request::ReleaseRequest;
pub use types::{
    ArchRelease, CommitRef, IndexRelease, ReleaseIndex, ReleaseManifest, StaticReleaseInfo,
};
