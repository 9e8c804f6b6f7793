//! Integration tests for `nodeshim preset` and `nodeshim version`.

use std::process::Command;

fn cargo_bin() -> Command {
    let mut cmd = Command::new(env!("CARGO"));
    cmd.args(["run", "-q", "-p", "nodeshim-cli", "--bin", "nodeshim", "--"]);
    cmd
}

#[test]
fn test_preset_json_normalizes_inject() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(
        dir.path().join("preset.json"),
        r#"{
            "alias": { "node:fs": "node:fs" },
            "inject": {
                "process": "unenv/node/process",
                "performance": ["unenv/node/perf_hooks", "performance", "perf"]
            },
            "external": ["node:fs"],
            "polyfill": []
        }"#,
    )
    .unwrap();

    let output = cargo_bin()
        .arg("--json")
        .arg("--cwd")
        .arg(dir.path())
        .args([
            "preset",
            "--preset-file",
            "preset.json",
            "--date",
            "2024-09-23",
            "--flag",
            "nodejs_compat",
        ])
        .output()
        .expect("Failed to run preset command");

    assert!(output.status.success());
    let json: serde_json::Value =
        serde_json::from_str(String::from_utf8_lossy(&output.stdout).trim()).unwrap();

    assert_eq!(json["ok"], true);
    assert_eq!(json["compatibility_date"], "2024-09-23");
    assert_eq!(json["compatibility_flags"][0], "nodejs_compat");
    assert_eq!(json["preset"]["inject"]["process"]["kind"], "default");
    assert_eq!(json["preset"]["inject"]["performance"]["kind"], "renamed");
    assert_eq!(json["preset"]["inject"]["performance"]["local"], "perf");
    assert_eq!(json["preset"]["external"][0], "node:fs");
}

#[test]
fn test_invalid_date_is_rejected_before_query() {
    let dir = tempfile::tempdir().unwrap();
    let output = cargo_bin()
        .arg("--json")
        .arg("--cwd")
        .arg(dir.path())
        .args(["preset", "--preset-file", "missing.json", "--date", "2024-13-01"])
        .output()
        .expect("Failed to run preset command");

    assert!(!output.status.success());
    let json: serde_json::Value =
        serde_json::from_str(String::from_utf8_lossy(&output.stdout).trim()).unwrap();
    assert_eq!(json["ok"], false);
    assert_eq!(json["error"]["code"], "COMPAT_INVALID_DATE");
}

#[test]
fn test_version_prints_name() {
    let output = cargo_bin()
        .arg("version")
        .output()
        .expect("Failed to run version command");

    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.starts_with("nodeshim "));
}
