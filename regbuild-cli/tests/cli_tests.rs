#![allow(clippy::unwrap_used)]
//! End-to-end tests for the `regbuild` binary.
//!
//! These tests cover:
//! - Successful build: exit 0, artifacts on disk, `Wrote` lines on stdout
//! - Validation failure: exit 2, nothing written, error on stderr
//! - Unknown format selector: exit 2
//! - Missing required flag: exit 1
//! - JSON report on stderr and in a report file
//! - Tag normalization and warnings

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use tempfile::TempDir;

const SCHEMA: &str = r#"{
  "key": "source_id",
  "fields": [
    {"name": "source_id", "type": "string", "required": true, "pattern": "^[A-Z0-9_]+$"},
    {"name": "fetch_frequency_min", "type": "integer", "min": 5, "max": 1440},
    {"name": "fetch_method", "enum": ["rss", "html_list", "api"]}
  ]
}"#;

fn setup(registry: &str) -> TempDir {
    let tmp = TempDir::new().unwrap();
    fs::write(tmp.path().join("schema.json"), SCHEMA).unwrap();
    fs::write(tmp.path().join("registry.csv"), registry).unwrap();
    tmp
}

fn regbuild(dir: &Path, extra: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_regbuild"))
        .current_dir(dir)
        .env_remove("RUST_LOG")
        .args(["--input", "registry.csv", "--schema", "schema.json", "--outdir", "out"])
        .args(extra)
        .output()
        .unwrap()
}

#[test]
fn test_successful_build() {
    let tmp = setup(
        "source_id,fetch_frequency_min,fetch_method\nBA_CITY,60,rss\nKE_NEWS,30.0,api\n",
    );
    let output = regbuild(tmp.path(), &[]);

    assert_eq!(
        output.status.code(),
        Some(0),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("Wrote"), "stdout: {stdout}");
    assert!(tmp.path().join("out/registry.json").exists());
    assert!(tmp.path().join("out/registry.yaml").exists());
    assert!(!tmp.path().join("out/registry.md").exists());

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(tmp.path().join("out/registry.json")).unwrap())
            .unwrap();
    assert_eq!(json["records"][1]["fetch_frequency_min"], 30);
}

#[test]
fn test_validation_failure_exits_2() {
    let tmp = setup("source_id,fetch_frequency_min,fetch_method\nba city,2,smtp\n");
    let output = regbuild(tmp.path(), &[]);

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("VALIDATION ERRORS"), "stderr: {stderr}");
    assert!(stderr.contains("[validate] InvalidValue"), "stderr: {stderr}");
    assert!(!tmp.path().join("out").exists());
}

#[test]
fn test_unknown_format_exits_2() {
    let tmp = setup("source_id\nA\n");
    let output = regbuild(tmp.path(), &["--format", "xml"]);

    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("unknown output format 'xml'"), "stderr: {stderr}");
}

#[test]
fn test_missing_flag_exits_1() {
    let output = Command::new(env!("CARGO_BIN_EXE_regbuild"))
        .args(["--input", "registry.csv"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
}

#[test]
fn test_json_report_and_report_file() {
    let tmp = setup("source_id\nA\nA\n");
    let output = regbuild(
        tmp.path(),
        &["--format", "all", "--report-format", "json", "--report", "report.json"],
    );

    assert_eq!(output.status.code(), Some(2));
    let report: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(tmp.path().join("report.json")).unwrap()).unwrap();
    assert_eq!(report["ok"], false);
    assert_eq!(report["phase"], "failed");
    assert_eq!(report["errors"][0]["phase"], "validate");
    assert_eq!(report["errors"][0]["kind"], "InvalidValue");
    assert_eq!(report["errors"][0]["record"], 1);
    assert_eq!(report["errors"][0]["field"], "source_id");

    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("duplicate key 'A'"), "stderr: {stderr}");
    assert!(!tmp.path().join("out").exists());
}

#[test]
fn test_ambiguous_yaml_keys_fail_rendering() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("schema.json"),
        r#"{"key": "code", "fields": [{"name": "code", "required": true}]}"#,
    )
    .unwrap();
    fs::write(tmp.path().join("registry.csv"), "code\n007\n7\n").unwrap();
    let output = regbuild(
        tmp.path(),
        &["--report-format", "json", "--report", "report.json"],
    );

    assert_eq!(output.status.code(), Some(2));
    let report: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(tmp.path().join("report.json")).unwrap()).unwrap();
    assert_eq!(report["errors"][0]["kind"], "RenderFailure");
    assert_eq!(report["errors"][0]["record"], 1);
    assert!(!tmp.path().join("out/registry.json").exists());
}

#[test]
fn test_normalize_tags_and_warnings() {
    let tmp = TempDir::new().unwrap();
    fs::write(
        tmp.path().join("schema.yaml"),
        "key: source_id\n\
         fields:\n\
         \x20 - name: source_id\n\
         \x20   required: true\n\
         \x20 - name: topic_default_tags\n\
         \x20   type: list\n\
         \x20   known_values: [Doprava, Kultura]\n",
    )
    .unwrap();
    fs::write(
        tmp.path().join("registry.csv"),
        "source_id,topic_default_tags\nBA,\"Doprava, Mestsk\u{e1} politika\"\n",
    )
    .unwrap();
    let output = Command::new(env!("CARGO_BIN_EXE_regbuild"))
        .current_dir(tmp.path())
        .env_remove("RUST_LOG")
        .args(["--input", "registry.csv", "--schema", "schema.yaml", "--outdir", "out"])
        .args(["--format", "json", "--normalize-tags"])
        .output()
        .unwrap();

    assert_eq!(
        output.status.code(),
        Some(0),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("WARNINGS"), "stderr: {stderr}");
    assert!(stderr.contains("(1 warnings)"), "stderr: {stderr}");

    let json: serde_json::Value =
        serde_json::from_str(&fs::read_to_string(tmp.path().join("out/registry.json")).unwrap())
            .unwrap();
    assert_eq!(
        json["records"][0]["topic_default_tags"],
        serde_json::json!(["doprava", "mestska_politika"])
    );
    assert_eq!(json["tag_display"]["mestska_politika"], "Mestsk\u{e1} politika");
}

#[test]
fn test_unwritable_report_file_exits_1() {
    let tmp = setup("source_id\nA\n");
    let output = regbuild(tmp.path(), &["--report", "missing-dir/report.json"]);
    assert_eq!(output.status.code(), Some(1));
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("Failed to create report file"), "stderr: {stderr}");
}
