//! Stream metadata generation.
//!
//! Derives the public per-stream document from the latest release manifest
//! and optionally overlays an operator-supplied override document.

use std::collections::BTreeMap;

use chrono::{DateTime, SecondsFormat, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::ReleaseError;
use crate::types::{ReleaseIndex, ReleaseManifest};

/// `cairn-stream-generator <crate version>`
pub fn generator() -> String {
    format!("cairn-stream-generator {}", env!("CARGO_PKG_VERSION"))
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamMetadataHeader {
    #[serde(rename = "last-modified")]
    pub last_modified: String,
    pub generator: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArtifactEntry {
    pub release: String,
    pub formats: Value,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RegionEntry {
    pub release: String,
    pub image: String,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProviderImages {
    pub regions: BTreeMap<String, RegionEntry>,
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct StreamArch {
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub artifacts: BTreeMap<String, ArtifactEntry>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub images: BTreeMap<String, ProviderImages>,
}

/// Root of `<stream>.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamMetadata {
    pub stream: String,
    pub metadata: StreamMetadataHeader,
    #[serde(default)]
    pub architectures: BTreeMap<String, StreamArch>,
}

/// Build stream metadata for `manifest`.
///
/// `version` labels every artifact and image; it falls back to the
/// manifest's own `release` field when `None`.
pub fn generate(
    manifest: &ReleaseManifest,
    version: Option<&str>,
    now: DateTime<Utc>,
) -> Result<StreamMetadata, ReleaseError> {
    let release = version
        .map(str::to_string)
        .or_else(|| manifest.release.clone())
        .ok_or(ReleaseError::MissingField { field: "release" })?;

    let mut architectures = BTreeMap::new();
    for (arch, build) in &manifest.architectures {
        let mut entry = StreamArch::default();
        for (platform, media) in &build.media {
            if let Some(formats) = &media.artifacts {
                entry.artifacts.insert(
                    platform.clone(),
                    ArtifactEntry {
                        release: release.clone(),
                        formats: formats.clone(),
                    },
                );
            }
            if !media.images.is_empty() {
                let regions = media
                    .images
                    .iter()
                    .map(|(region, image)| {
                        (
                            region.clone(),
                            RegionEntry {
                                release: release.clone(),
                                image: image.image.clone(),
                            },
                        )
                    })
                    .collect();
                entry
                    .images
                    .insert(platform.clone(), ProviderImages { regions });
            }
        }
        architectures.insert(arch.clone(), entry);
    }

    Ok(StreamMetadata {
        stream: manifest.stream.clone(),
        metadata: StreamMetadataHeader {
            last_modified: now.to_rfc3339_opts(SecondsFormat::Secs, true),
            generator: generator(),
        },
        architectures,
    })
}

/// Version of the latest release recorded in `index`.
pub fn latest_version(index: &ReleaseIndex) -> Result<&str, ReleaseError> {
    index
        .latest()
        .map(|release| release.version.as_str())
        .ok_or_else(|| ReleaseError::NoReleases {
            stream: index.stream.clone(),
        })
}

/// Overlay `overlay` onto `base`.
///
/// Objects merge key by key (overlay wins, base-only keys are kept). A
/// `null` overlay keeps a base object. Anything else replaces the base.
pub fn merge_override(base: Value, overlay: Value) -> Value {
    match (base, overlay) {
        (Value::Object(mut base), Value::Object(overlay)) => {
            for (key, value) in overlay {
                let merged = match base.remove(&key) {
                    Some(existing) => merge_override(existing, value),
                    None => value,
                };
                base.insert(key, merged);
            }
            Value::Object(base)
        }
        (base @ Value::Object(_), Value::Null) => base,
        (_, overlay) => overlay,
    }
}

/// Apply an override document to generated metadata.
pub fn apply_override(
    metadata: &StreamMetadata,
    overlay: Value,
) -> Result<StreamMetadata, ReleaseError> {
    let base = serde_json::to_value(metadata)?;
    let merged = merge_override(base, overlay);
    serde_json::from_value(merged).map_err(|source| ReleaseError::Parse {
        what: "stream metadata after override".to_string(),
        source,
    })
}

/// Parse an override document; it must be a JSON object.
pub fn parse_override(bytes: &[u8]) -> Result<Value, ReleaseError> {
    let value: Map<String, Value> =
        serde_json::from_slice(bytes).map_err(|source| ReleaseError::Parse {
            what: "override document".to_string(),
            source,
        })?;
    Ok(Value::Object(value))
}

#[cfg(test)]
mod tests {
    use chrono::TimeZone;
    use serde_json::json;

    use super::*;

    fn manifest() -> ReleaseManifest {
        serde_json::from_value(json!({
            "release": "39.0",
            "stream": "stable",
            "architectures": {
                "x86_64": {
                    "commit": "aaa",
                    "media": {
                        "aws": {"images": {"us-east-1": {"image": "ami-1"}}},
                        "qemu": {"artifacts": {"qcow2.xz": {"disk": {"location": "l"}}}}
                    }
                }
            }
        }))
        .unwrap()
    }

    #[test]
    fn generate_maps_images_and_artifacts() {
        let now = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        let meta = generate(&manifest(), None, now).unwrap();
        assert_eq!(meta.stream, "stable");
        assert_eq!(meta.metadata.last_modified, "2024-01-02T03:04:05Z");
        let arch = &meta.architectures["x86_64"];
        assert_eq!(arch.images["aws"].regions["us-east-1"].image, "ami-1");
        assert_eq!(arch.images["aws"].regions["us-east-1"].release, "39.0");
        assert!(arch.artifacts.contains_key("qemu"));
        assert!(!arch.artifacts.contains_key("aws"));
    }

    #[test]
    fn generate_requires_a_release_label() {
        let mut m = manifest();
        m.release = None;
        let err = generate(&m, None, Utc::now()).unwrap_err();
        assert!(matches!(err, ReleaseError::MissingField { field: "release" }));
    }

    #[test]
    fn merge_keeps_base_keys_and_prefers_overlay() {
        let base = json!({"a": {"x": 1, "y": 2}, "b": 3});
        let overlay = json!({"a": {"y": 20, "z": 30}, "c": 4});
        assert_eq!(
            merge_override(base, overlay),
            json!({"a": {"x": 1, "y": 20, "z": 30}, "b": 3, "c": 4})
        );
    }

    #[test]
    fn null_overlay_keeps_objects_but_clears_scalars() {
        let base = json!({"a": {"x": 1}, "b": 3});
        let overlay = json!({"a": null, "b": null});
        assert_eq!(merge_override(base, overlay), json!({"a": {"x": 1}, "b": null}));
    }

    #[test]
    fn override_must_be_an_object() {
        assert!(parse_override(b"[1,2]").is_err());
        assert!(parse_override(br#"{"stream":"next"}"#).is_ok());
    }

    #[test]
    fn apply_override_rewrites_stream_name() {
        let meta = generate(&manifest(), None, Utc::now()).unwrap();
        let out = apply_override(&meta, json!({"stream": "next"})).unwrap();
        assert_eq!(out.stream, "next");
        assert_eq!(out.architectures, meta.architectures);
    }
}
