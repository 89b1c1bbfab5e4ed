//! Update-release-index pipeline shared by the CLI commands.
//!
//! 1. Load and validate the build's manifest (must exist).
//! 2. Load the stream's index (missing → empty index).
//! 3. Reconcile the candidate entry into the index.
//! 4. On append/replace: refresh index metadata, serialize, store whole.
//!
//! A conflict returns before anything is stored.

use chrono::{DateTime, Utc};

use cairn_core::{
    reconcile, request, IndexRelease, Reconciliation, ReleaseIndex, ReleaseManifest,
    ReleaseRequest,
};

use crate::backend::DocumentStore;
use crate::diff::index_diff;
use crate::error::StoreError;

/// What the pipeline did to the index.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateAction {
    /// The build is already the latest release.
    Unchanged,
    Appended,
    Replaced,
    /// `--dry-run`: the index *would* have been appended to / replaced.
    WouldAppend,
    WouldReplace,
}

/// Outcome of [`update_release_index`].
#[derive(Debug)]
pub struct UpdateReport {
    pub action: UpdateAction,
    pub location: String,
    /// The index as it is (or would be) after the update.
    pub index: ReleaseIndex,
    /// Unified diff of the index document; empty when unchanged.
    pub diff: String,
}

/// Load the manifest of `request`'s build for merging into the index: every
/// architecture must carry a commit.
pub fn load_manifest(
    store: &dyn DocumentStore,
    request: &ReleaseRequest,
) -> Result<ReleaseManifest, StoreError> {
    let manifest = fetch_manifest(store, &request.stream, &request.version)?;
    manifest.validate_commits()?;
    Ok(manifest)
}

/// Load the manifest of build `version` of `stream` and check its stream.
pub fn fetch_manifest(
    store: &dyn DocumentStore,
    stream: &str,
    version: &str,
) -> Result<ReleaseManifest, StoreError> {
    let key = request::manifest_key(stream, version);
    let bytes = store
        .load(&key)?
        .ok_or_else(|| StoreError::ManifestNotFound {
            location: store.locate(&key),
        })?;
    let manifest = ReleaseManifest::from_slice(&bytes)?;
    request::check_manifest_stream(stream, &manifest)?;
    tracing::debug!(location = %store.locate(&key), architectures = manifest.architectures.len(), "loaded release manifest");
    Ok(manifest)
}

/// Load the index of `stream`. A missing document is an empty index.
pub fn load_index(store: &dyn DocumentStore, stream: &str) -> Result<ReleaseIndex, StoreError> {
    let key = request::index_key(stream);
    match store.load(&key)? {
        Some(bytes) => Ok(ReleaseIndex::from_slice(&bytes)?),
        None => {
            tracing::info!(location = %store.locate(&key), "no release index yet; starting empty");
            Ok(ReleaseIndex::default())
        }
    }
}

/// Merge the build named by `request` into its stream's index.
pub fn update_release_index(
    store: &dyn DocumentStore,
    request: &ReleaseRequest,
    now: DateTime<Utc>,
    dry_run: bool,
) -> Result<UpdateReport, StoreError> {
    let manifest = load_manifest(store, request)?;
    let current = load_index(store, &request.stream)?;
    let candidate = IndexRelease::from_manifest(&manifest, request.static_info());
    let location = store.locate(&request.index_key());

    let outcome = reconcile(&current, &candidate)?;
    let replaced = matches!(outcome, Reconciliation::Replace(_));
    tracing::info!(
        stream = %request.stream,
        version = %request.version,
        action = outcome.label(),
        "reconciled release index"
    );

    let Some(mut next) = outcome.into_index() else {
        return Ok(UpdateReport {
            action: UpdateAction::Unchanged,
            location,
            index: current,
            diff: String::new(),
        });
    };
    next.refresh(&request.stream, now);
    let diff = index_diff(&current, &next, &location)?;

    let action = match (dry_run, replaced) {
        (true, true) => UpdateAction::WouldReplace,
        (true, false) => UpdateAction::WouldAppend,
        (false, true) => UpdateAction::Replaced,
        (false, false) => UpdateAction::Appended,
    };
    if dry_run {
        tracing::info!(%location, "[dry-run] would store release index");
    } else {
        store.store(&request.index_key(), &next.to_json()?)?;
    }

    Ok(UpdateReport {
        action,
        location,
        index: next,
        diff,
    })
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;
    use tempfile::TempDir;

    use cairn_core::ReleaseError;

    use super::*;
    use crate::local::LocalStore;

    fn write_manifest(store: &LocalStore, version: &str, archs: serde_json::Value) {
        let doc = json!({"stream": "stable", "release": version, "architectures": archs});
        store
            .store(
                &request::manifest_key("stable", version),
                &serde_json::to_vec(&doc).unwrap(),
            )
            .unwrap();
    }

    fn req(version: &str) -> ReleaseRequest {
        ReleaseRequest::new("stable", version, "https://example.org/streams").unwrap()
    }

    #[test]
    fn missing_manifest_is_reported_with_location() {
        let root = TempDir::new().unwrap();
        let store = LocalStore::new(root.path());
        let err = update_release_index(&store, &req("39.0"), Utc::now(), false).unwrap_err();
        assert!(matches!(err, StoreError::ManifestNotFound { .. }), "got: {err}");
        assert!(err.to_string().contains("builds/39.0/release.json"));
    }

    #[test]
    fn first_update_creates_index_with_metadata() {
        let root = TempDir::new().unwrap();
        let store = LocalStore::new(root.path());
        write_manifest(&store, "39.0", json!({"x86_64": {"commit": "aaa"}}));
        let now = Utc.with_ymd_and_hms(2024, 5, 6, 7, 8, 9).unwrap();

        let report = update_release_index(&store, &req("39.0"), now, false).unwrap();
        assert_eq!(report.action, UpdateAction::Appended);
        assert!(report.diff.contains("+"));

        let stored = load_index(&store, "stable").unwrap();
        assert_eq!(stored, report.index);
        assert_eq!(stored.metadata.last_modified, "2024-05-06T07:08:09Z");
        assert_eq!(stored.stream, "stable");
        assert_eq!(stored.releases.len(), 1);
    }

    #[test]
    fn dry_run_stores_nothing() {
        let root = TempDir::new().unwrap();
        let store = LocalStore::new(root.path());
        write_manifest(&store, "39.0", json!({"x86_64": {"commit": "aaa"}}));

        let report = update_release_index(&store, &req("39.0"), Utc::now(), true).unwrap();
        assert_eq!(report.action, UpdateAction::WouldAppend);
        assert!(store.load("stable/releases.json").unwrap().is_none());
    }

    #[test]
    fn stream_mismatch_is_rejected_before_reconcile() {
        let root = TempDir::new().unwrap();
        let store = LocalStore::new(root.path());
        let doc = json!({"stream": "testing", "architectures": {"x86_64": {"commit": "a"}}});
        store
            .store(
                &request::manifest_key("stable", "1"),
                &serde_json::to_vec(&doc).unwrap(),
            )
            .unwrap();
        let err = update_release_index(&store, &req("1"), Utc::now(), false).unwrap_err();
        assert!(matches!(err, StoreError::Release(ref e) if e.is_validation()), "got: {err}");
    }

    #[test]
    fn empty_commit_blocks_index_update_but_not_fetch() {
        let root = TempDir::new().unwrap();
        let store = LocalStore::new(root.path());
        write_manifest(
            &store,
            "39.0",
            json!({"x86_64": {"media": {"aws": {"images": {"us-east-1": {"image": "ami-1"}}}}}}),
        );

        let manifest = fetch_manifest(&store, "stable", "39.0").unwrap();
        assert_eq!(manifest.architectures.len(), 1);

        let err = update_release_index(&store, &req("39.0"), Utc::now(), false).unwrap_err();
        assert!(
            matches!(err, StoreError::Release(ReleaseError::EmptyCommit { .. })),
            "got: {err}"
        );
        assert!(store.load("stable/releases.json").unwrap().is_none());
    }
}
