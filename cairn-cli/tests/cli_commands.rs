use std::fs;
use std::path::Path;

use assert_cmd::Command;
use predicates::prelude::*;
use serde_json::{json, Value};
use tempfile::TempDir;

const BASE: &str = "https://example.org/streams";

fn cairn(home: &Path) -> Command {
    let mut cmd = Command::cargo_bin("cairn").expect("cairn binary");
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env_remove("RUST_LOG");
    cmd
}

fn write_json(root: &Path, key: &str, value: &Value) {
    let path = root.join(key);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, serde_json::to_vec_pretty(value).unwrap()).unwrap();
}

fn write_manifest(root: &Path, version: &str, archs: Value) {
    write_json(
        root,
        &format!("stable/builds/{version}/release.json"),
        &json!({"release": version, "stream": "stable", "architectures": archs}),
    );
}

fn read_json(path: &Path) -> Value {
    serde_json::from_slice(&fs::read(path).unwrap()).unwrap()
}

fn update(home: &Path, root: &Path, version: &str) -> Command {
    let mut cmd = cairn(home);
    cmd.args(["--local-root"])
        .arg(root)
        .args(["--metadata-base", BASE, "update-release-index"])
        .args(["--stream", "stable", "--version", version]);
    cmd
}

#[test]
fn update_release_index_appends_then_noops() {
    let home = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();
    write_manifest(root.path(), "39.0", json!({"x86_64": {"commit": "aaa"}}));

    update(home.path(), root.path(), "39.0")
        .assert()
        .success()
        .stdout(predicate::str::contains("appended 39.0"));

    let index = read_json(&root.path().join("stable/releases.json"));
    assert_eq!(index["stream"], "stable");
    assert_eq!(index["releases"][0]["version"], "39.0");
    assert_eq!(
        index["releases"][0]["metadata"],
        format!("{BASE}/stable/builds/39.0/release.json")
    );
    assert!(index["metadata"]["last-modified"].is_string());

    update(home.path(), root.path(), "39.0")
        .assert()
        .success()
        .stdout(predicate::str::contains("nothing to do"));
}

#[test]
fn dry_run_prints_diff_and_stores_nothing() {
    let home = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();
    write_manifest(root.path(), "39.0", json!({"x86_64": {"commit": "aaa"}}));

    update(home.path(), root.path(), "39.0")
        .arg("--dry-run")
        .assert()
        .success()
        .stdout(predicate::str::contains("[dry-run] would append 39.0"))
        .stdout(predicate::str::contains("\"version\": \"39.0\""));
    assert!(!root.path().join("stable/releases.json").exists());
}

#[test]
fn out_of_order_republish_fails_and_keeps_index() {
    let home = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();
    write_manifest(root.path(), "38.0", json!({"x86_64": {"commit": "a"}}));
    write_manifest(root.path(), "39.0", json!({"x86_64": {"commit": "b"}}));
    update(home.path(), root.path(), "38.0").assert().success();
    update(home.path(), root.path(), "39.0").assert().success();
    let before = fs::read(root.path().join("stable/releases.json")).unwrap();

    update(home.path(), root.path(), "38.0")
        .assert()
        .code(1)
        .stderr(predicate::str::contains("not the latest release"));
    assert_eq!(fs::read(root.path().join("stable/releases.json")).unwrap(), before);
}

#[test]
fn missing_backend_is_an_error() {
    let home = TempDir::new().unwrap();
    cairn(home.path())
        .args(["--metadata-base", BASE, "update-release-index"])
        .args(["--stream", "stable", "--version", "1"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("no backend configured"));
}

#[test]
fn backend_from_config_file() {
    let home = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();
    write_manifest(root.path(), "39.0", json!({"x86_64": {"commit": "aaa"}}));
    let config_dir = home.path().join(".cairn");
    fs::create_dir_all(&config_dir).unwrap();
    fs::write(
        config_dir.join("config.yaml"),
        format!(
            "metadata_base: {BASE}\nbackend:\n  kind: local\n  root: {}\n",
            root.path().display()
        ),
    )
    .unwrap();

    cairn(home.path())
        .args(["update-release-index", "--stream", "stable", "--version", "39.0"])
        .assert()
        .success();
    assert!(root.path().join("stable/releases.json").exists());
}

#[test]
fn publish_without_provider_images_is_skipped() {
    let home = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();
    write_manifest(root.path(), "39.0", json!({"x86_64": {"commit": "aaa"}}));

    cairn(home.path())
        .arg("--local-root")
        .arg(root.path())
        .args(["make-amis-public", "--stream", "stable", "--version", "39.0"])
        .assert()
        .success()
        .stdout(predicate::str::contains("nothing to publish"));
}

#[cfg(unix)]
mod with_fake_aws {
    use std::os::unix::fs::PermissionsExt;

    use super::*;

    /// An `aws` stand-in that fails for regions listed in `deny`.
    fn fake_aws(dir: &Path, deny: &[&str]) -> std::path::PathBuf {
        let mut script = String::from("#!/bin/sh\ncase \"$*\" in\n");
        for region in deny {
            script.push_str(&format!("  *\"--region {region} \"*) echo 'denied' >&2; exit 1 ;;\n"));
        }
        script.push_str("esac\nexit 0\n");
        let path = dir.join("aws");
        fs::write(&path, script).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    fn setup(deny: &[&str]) -> (TempDir, TempDir) {
        let home = TempDir::new().unwrap();
        let root = TempDir::new().unwrap();
        write_manifest(
            root.path(),
            "39.0",
            json!({"x86_64": {"commit": "aaa", "media": {"aws": {"images": {
                "us-east-1": {"image": "ami-1"},
                "us-west-2": {"image": "ami-2"},
                "eu-west-1": {"image": "ami-3"}
            }}}}}),
        );
        let aws = fake_aws(home.path(), deny);
        fs::create_dir_all(home.path().join(".cairn")).unwrap();
        fs::write(
            home.path().join(".cairn/config.yaml"),
            format!("aws:\n  cli: {}\n", aws.display()),
        )
        .unwrap();
        (home, root)
    }

    fn publish(home: &Path, root: &Path) -> Command {
        let mut cmd = cairn(home);
        cmd.arg("--local-root")
            .arg(root)
            .args(["make-amis-public", "--stream", "stable", "--version", "39.0"]);
        cmd
    }

    #[test]
    fn all_regions_public_exits_zero() {
        let (home, root) = setup(&[]);
        publish(home.path(), root.path())
            .assert()
            .success()
            .stdout(predicate::str::contains("3/3 regions public"));
    }

    #[test]
    fn partial_publish_exits_incomplete() {
        let (home, root) = setup(&["eu-west-1"]);
        let output = publish(home.path(), root.path())
            .arg("--json")
            .assert()
            .code(77)
            .get_output()
            .stdout
            .clone();
        let report: Value = serde_json::from_slice(&output).unwrap();
        assert_eq!(report["outcome"], "incomplete");
        let failed: Vec<_> = report["units"]
            .as_array()
            .unwrap()
            .iter()
            .filter(|u| u["status"] == "failed")
            .collect();
        assert_eq!(failed.len(), 1);
        assert_eq!(failed[0]["region"], "eu-west-1");
    }

    #[test]
    fn no_region_public_is_fatal() {
        let (home, root) = setup(&["us-east-1", "us-west-2", "eu-west-1"]);
        publish(home.path(), root.path())
            .assert()
            .code(1)
            .stderr(predicate::str::contains("all 3 publish attempts failed"));
    }
}

#[test]
fn stream_generate_from_release_file_with_override() {
    let home = TempDir::new().unwrap();
    let work = TempDir::new().unwrap();
    let release = work.path().join("release.json");
    fs::write(
        &release,
        serde_json::to_vec(&json!({
            "release": "39.0",
            "stream": "stable",
            "architectures": {"x86_64": {"commit": "aaa", "media": {
                "aws": {"images": {"us-east-1": {"image": "ami-1"}}},
                "qemu": {"artifacts": {"qcow2.xz": {"disk": {"location": "https://x/q"}}}}
            }}}
        }))
        .unwrap(),
    )
    .unwrap();
    let overlay = work.path().join("override.json");
    fs::write(&overlay, br#"{"architectures": {"x86_64": {"images": {"aws": {"regions": {"us-east-1": {"image": "ami-override"}}}}}}}"#).unwrap();

    let output = cairn(home.path())
        .args(["stream-generate", "--stream", "stable", "--pretty-print", "--release"])
        .arg(&release)
        .arg("--override")
        .arg(&overlay)
        .assert()
        .success()
        .get_output()
        .stdout
        .clone();
    let doc: Value = serde_json::from_slice(&output).unwrap();
    assert_eq!(doc["stream"], "stable");
    let region = &doc["architectures"]["x86_64"]["images"]["aws"]["regions"]["us-east-1"];
    assert_eq!(region["image"], "ami-override");
    assert_eq!(region["release"], "39.0");
    assert_eq!(
        doc["architectures"]["x86_64"]["artifacts"]["qemu"]["release"],
        "39.0"
    );
    assert!(doc["metadata"]["generator"]
        .as_str()
        .unwrap()
        .starts_with("cairn-stream-generator"));
}

#[test]
fn stream_generate_from_index_uploads() {
    let home = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();
    write_manifest(root.path(), "39.0", json!({"x86_64": {"commit": "aaa"}}));
    update(home.path(), root.path(), "39.0").assert().success();

    cairn(home.path())
        .arg("--local-root")
        .arg(root.path())
        .args(["stream-generate", "--stream", "stable", "--from-index", "--upload"])
        .assert()
        .success();
    let doc = read_json(&root.path().join("stable.json"));
    assert_eq!(doc["stream"], "stable");
    assert!(doc["architectures"]["x86_64"].is_object());
}

#[test]
fn stream_generate_needs_a_source() {
    let home = TempDir::new().unwrap();
    cairn(home.path())
        .args(["stream-generate", "--stream", "stable"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("--release"));
}

#[test]
fn stream_generate_from_empty_index_fails() {
    let home = TempDir::new().unwrap();
    let root = TempDir::new().unwrap();
    cairn(home.path())
        .arg("--local-root")
        .arg(root.path())
        .args(["stream-generate", "--stream", "stable", "--from-index"])
        .assert()
        .code(1);
}
