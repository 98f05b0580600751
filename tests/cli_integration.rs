use std::process::Command;
use tempfile::tempdir;

use ipspatch::ips::{self, Patch};

fn bin() -> String {
    env!("CARGO_BIN_EXE_ipspatch").to_string()
}

fn sample_ips() -> Vec<u8> {
    ips::encode_to_vec([
        Patch::literal(1, vec![0x41, 0x42]).unwrap(),
        Patch::rle(4, 3, 0x2A).unwrap(),
    ])
    .unwrap()
}

#[test]
fn cli_apply_patches_copy() {
    let dir = tempdir().unwrap();
    let patch = dir.path().join("fix.ips");
    let source = dir.path().join("orig.bin");
    let output = dir.path().join("new.bin");

    std::fs::write(&patch, sample_ips()).unwrap();
    std::fs::write(&source, b"........").unwrap();

    let out = Command::new(bin())
        .arg("apply")
        .arg(&patch)
        .arg(&source)
        .arg(&output)
        .output()
        .unwrap();
    assert!(out.status.success());
    assert_eq!(std::fs::read(&output).unwrap(), b".AB.***.");
    assert_eq!(std::fs::read(&source).unwrap(), b"........");

    let stdout = String::from_utf8(out.stdout).unwrap();
    assert_eq!(
        stdout,
        "1: 000001: Patch of length 2\n2: 000004: RLE Patch of length 3, value 2A\n"
    );
}

#[test]
fn cli_apply_refuses_existing_output() {
    let dir = tempdir().unwrap();
    let patch = dir.path().join("fix.ips");
    let source = dir.path().join("orig.bin");
    let output = dir.path().join("new.bin");
    std::fs::write(&patch, sample_ips()).unwrap();
    std::fs::write(&source, b"........").unwrap();
    std::fs::write(&output, b"existing").unwrap();

    let st = Command::new(bin())
        .arg("apply")
        .arg(&patch)
        .arg(&source)
        .arg(&output)
        .status()
        .unwrap();
    assert!(!st.success());
    assert_eq!(std::fs::read(&output).unwrap(), b"existing");

    let st = Command::new(bin())
        .args(["--quiet", "--force", "apply"])
        .arg(&patch)
        .arg(&source)
        .arg(&output)
        .status()
        .unwrap();
    assert!(st.success());
    assert_eq!(std::fs::read(&output).unwrap(), b".AB.***.");
}

#[test]
fn cli_apply_bad_patch_fails() {
    let dir = tempdir().unwrap();
    let patch = dir.path().join("bad.ips");
    let source = dir.path().join("orig.bin");
    let output = dir.path().join("new.bin");
    std::fs::write(&patch, b"NOT A PATCH").unwrap();
    std::fs::write(&source, b"data").unwrap();

    let out = Command::new(bin())
        .arg("apply")
        .arg(&patch)
        .arg(&source)
        .arg(&output)
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("not a valid IPS file"), "stderr: {stderr}");
}

#[test]
fn cli_list_and_recode() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.ips");
    let output = dir.path().join("out.ips");
    std::fs::write(&input, sample_ips()).unwrap();

    let out = Command::new(bin()).arg("list").arg(&input).output().unwrap();
    assert!(out.status.success());
    let stdout = String::from_utf8(out.stdout).unwrap();
    assert!(stdout.contains("2: 000004: RLE Patch of length 3, value 2A"));
    assert!(stdout.contains("2 patches (1 literal, 1 RLE)"));

    let st = Command::new(bin())
        .args(["recode", "--check"])
        .arg(&input)
        .arg(&output)
        .status()
        .unwrap();
    assert!(st.success());
    assert_eq!(std::fs::read(&output).unwrap(), sample_ips());
}

#[test]
fn cli_json_stats() {
    let dir = tempdir().unwrap();
    let input = dir.path().join("in.ips");
    std::fs::write(&input, sample_ips()).unwrap();

    let out = Command::new(bin())
        .args(["--quiet", "--json", "list"])
        .arg(&input)
        .output()
        .unwrap();
    assert!(out.status.success());
    let json: serde_json::Value = serde_json::from_slice(&out.stderr).unwrap();
    assert_eq!(json["patches"], 2);
    assert_eq!(json["min_target_size"], 7);
}

#[test]
fn cli_config_works() {
    let out = Command::new(bin()).arg("config").output().unwrap();
    assert!(out.status.success());
}

#[test]
fn cli_apply_onto_source_keeps_source() {
    let dir = tempdir().unwrap();
    let patch = dir.path().join("fix.ips");
    let source = dir.path().join("orig.bin");
    std::fs::write(&patch, sample_ips()).unwrap();
    std::fs::write(&source, b"........").unwrap();

    let out = Command::new(bin())
        .args(["--force", "apply"])
        .arg(&patch)
        .arg(&source)
        .arg(&source)
        .output()
        .unwrap();
    assert_eq!(out.status.code(), Some(1));
    let stderr = String::from_utf8_lossy(&out.stderr);
    assert!(stderr.contains("overwrite input"), "stderr: {stderr}");
    assert_eq!(std::fs::read(&source).unwrap(), b"........");
}
