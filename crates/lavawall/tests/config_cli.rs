use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use lavaconfig::LavaConfig;
use tempfile::TempDir;

fn lavawall(config_dir: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_lavawall"))
        .env("LAVAWALL_CONFIG_DIR", config_dir)
        .env("RUST_LOG", "warn")
        .args(args)
        .output()
        .expect("failed to run lavawall")
}

#[test]
fn config_dump_prints_the_defaults() {
    let root = TempDir::new().unwrap();
    let output = lavawall(root.path(), &["config", "dump"]);
    assert!(output.status.success());

    let stdout = String::from_utf8(output.stdout).unwrap();
    let parsed = LavaConfig::from_toml_str(&stdout).expect("dump output parses");
    assert_eq!(parsed, LavaConfig::default());
}

#[test]
fn config_check_summarises_an_explicit_file() {
    let root = TempDir::new().unwrap();
    let path = root.path().join("lava.toml");
    fs::write(
        &path,
        r#"
[[population.classes]]
name = "solo"
count = 5
min_radius = 0.05
max_radius = 0.08
"#,
    )
    .unwrap();

    let output = lavawall(
        root.path(),
        &["config", "check", "--config", path.to_str().unwrap()],
    );
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("configuration OK"));
    assert!(stdout.contains("5 blobs in 1 size classes"));
    assert!(stdout.contains("solo"));
}

#[test]
fn config_check_discovers_the_config_dir() {
    let root = TempDir::new().unwrap();
    fs::write(
        root.path().join("config.toml"),
        "[bloom]\nthreshold = 0.5\n",
    )
    .unwrap();

    let output = lavawall(root.path(), &["config", "check"]);
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("config.toml"));
    assert!(stdout.contains("bloom threshold 0.5"));
}

#[test]
fn config_check_falls_back_to_defaults() {
    let root = TempDir::new().unwrap();
    let output = lavawall(root.path(), &["config", "check"]);
    assert!(output.status.success());
    let stdout = String::from_utf8(output.stdout).unwrap();
    assert!(stdout.contains("built-in defaults"));
    assert!(stdout.contains("12 blobs in 3 size classes"));
}

#[test]
fn config_check_rejects_invalid_values() {
    let root = TempDir::new().unwrap();
    let path = root.path().join("broken.toml");
    fs::write(&path, "[bloom]\nthreshold = 1.0\n").unwrap();

    let output = lavawall(
        root.path(),
        &["config", "check", "--config", path.to_str().unwrap()],
    );
    assert!(!output.status.success());
    let stderr = String::from_utf8(output.stderr).unwrap();
    assert!(stderr.contains("bloom.threshold"), "stderr: {stderr}");
}

#[test]
fn config_check_rejects_a_missing_explicit_file() {
    let root = TempDir::new().unwrap();
    let missing = root.path().join("nope.toml");
    let output = lavawall(
        root.path(),
        &["config", "check", "--config", missing.to_str().unwrap()],
    );
    assert!(!output.status.success());
}
