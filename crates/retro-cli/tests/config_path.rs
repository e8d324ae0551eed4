use std::fs;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::tempdir;

#[test]
fn test_config_path_command() {
    let dir = tempdir().unwrap();

    cargo_bin_cmd!("retro")
        .env("RETRO_HOME", dir.path())
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_config_init_creates_file() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("config.toml");

    cargo_bin_cmd!("retro")
        .env("RETRO_HOME", dir.path())
        .args(["config", "init"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created config at"));

    let contents = fs::read_to_string(&config_path).unwrap();
    assert!(contents.contains("model ="));
    assert!(contents.contains("# api_base_url ="));
}

#[test]
fn test_config_init_fails_if_exists() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("config.toml"), "# existing config").unwrap();

    cargo_bin_cmd!("retro")
        .env("RETRO_HOME", dir.path())
        .args(["config", "init"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn test_config_set_model_keeps_comments() {
    let dir = tempdir().unwrap();
    let config_path = dir.path().join("config.toml");
    fs::write(&config_path, "# mine\nmodel = \"old\"\n").unwrap();

    cargo_bin_cmd!("retro")
        .env("RETRO_HOME", dir.path())
        .args(["config", "set-model", "gpt-4o"])
        .assert()
        .success()
        .stdout(predicate::str::contains("gpt-4o"));

    let contents = fs::read_to_string(&config_path).unwrap();
    assert!(contents.contains("# mine"));
    assert!(contents.contains("model = \"gpt-4o\""));
}

#[test]
fn test_invalid_config_is_reported() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("config.toml"), "model = [").unwrap();

    cargo_bin_cmd!("retro")
        .env("RETRO_HOME", dir.path())
        .args(["rooms", "list", "--user", "ada"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Failed to parse config"));
}
