//! Persistence adapter interface and backend selection.

use cairn_core::BackendConfig;

use crate::error::StoreError;
use crate::local::LocalStore;
use crate::mirror::MirrorStore;

/// Whole-document storage addressed by keys relative to a backend root
/// (`stable/releases.json`, `stable/builds/39.0/release.json`, ...).
pub trait DocumentStore {
    /// Read a document. `Ok(None)` means it does not exist, which callers
    /// treat as a normal outcome.
    fn load(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;

    /// Overwrite a document as a whole.
    fn store(&self, key: &str, bytes: &[u8]) -> Result<(), StoreError>;

    /// Human-readable location of `key`, for logs and error messages.
    fn locate(&self, key: &str) -> String;
}

/// Build the adapter named by `config`.
pub fn open(config: &BackendConfig) -> Box<dyn DocumentStore> {
    match config {
        BackendConfig::Local { root } => Box::new(LocalStore::new(root.clone())),
        BackendConfig::Mirror { base_url, scp } => {
            Box::new(MirrorStore::new(base_url.clone(), scp.clone()))
        }
    }
}
