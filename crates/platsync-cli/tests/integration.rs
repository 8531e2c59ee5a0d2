//! Integration tests for the platsync binary
//!
//! Every run gets its own HOME, config file and local release store, and only
//! exercises paths that need neither cargo, git nor the network.

use assert_cmd::{cargo::cargo_bin_cmd, Command};
use predicates::prelude::*;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

struct Harness {
    home: TempDir,
    config_path: PathBuf,
}

impl Harness {
    fn new() -> io::Result<Self> {
        let home = TempDir::new()?;
        let root = home.path();
        fs::create_dir_all(root.join("platforms"))?;

        let config_path = root.join("platsync.toml");
        fs::write(
            &config_path,
            "platforms_dir = \"platforms\"\n\
             manifest_path = \"platforms.json\"\n\
             dist_dir = \"dist\"\n\
             \n\
             [release]\n\
             store = \"local\"\n\
             local_dir = \"release\"\n",
        )?;
        Ok(Harness { home, config_path })
    }

    fn root(&self) -> &Path {
        self.home.path()
    }

    fn command(&self) -> Command {
        let mut cmd = cargo_bin_cmd!("platsync");
        cmd.current_dir(self.root());
        cmd.env("HOME", self.root());
        cmd.env("PLATSYNC_CONFIG", &self.config_path);
        cmd.env("NO_COLOR", "1");
        cmd.env_remove("PLATSYNC_LOG");
        cmd
    }

    fn add_platform(&self, folder: &str, info: &str, native: bool) -> io::Result<()> {
        let dir = self.root().join("platforms").join(folder);
        fs::create_dir_all(&dir)?;
        fs::write(dir.join("info.json"), info)?;
        if native {
            fs::write(
                dir.join("Cargo.toml"),
                format!("[package]\nname = \"{}\"\nversion = \"0.1.0\"\n", folder),
            )?;
        }
        Ok(())
    }
}

fn info_json(id: &str, version: &str) -> String {
    format!(
        r#"{{"id": "{id}", "name": "{id}", "description": "", "version": "{version}",
            "maxThreads": 2, "requiresAuth": true, "supportedVersion": 30, "author": "test"}}"#
    )
}

#[test]
fn test_version() {
    let env = Harness::new().expect("harness");
    env.command()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("platsync"));
}

#[test]
fn test_help() {
    let env = Harness::new().expect("harness");
    env.command()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("Build and publish platform modules"));
}

#[test]
fn test_invalid_command() {
    let env = Harness::new().expect("harness");
    env.command().arg("invalid").assert().failure();
}

#[test]
fn test_config_show() {
    let env = Harness::new().expect("harness");
    env.command()
        .arg("config")
        .arg("show")
        .assert()
        .success()
        .stdout(predicate::str::contains("Configuration"))
        .stdout(predicate::str::contains("store: local"))
        .stdout(predicate::str::contains("tag: platforms"));
}

#[test]
fn test_config_path_uses_env_override() {
    let env = Harness::new().expect("harness");
    env.command()
        .arg("config")
        .arg("path")
        .assert()
        .success()
        .stdout(predicate::str::contains(
            env.config_path.to_string_lossy().to_string(),
        ));
}

#[test]
fn test_config_set_persists() {
    let env = Harness::new().expect("harness");
    env.command()
        .args(["config", "set", "branch", "main"])
        .assert()
        .success();
    env.command()
        .arg("config")
        .assert()
        .success()
        .stdout(predicate::str::contains("branch: main"));
}

#[test]
fn test_config_set_unknown_key_fails() {
    let env = Harness::new().expect("harness");
    env.command()
        .args(["config", "set", "colour", "blue"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Unknown config key"));
}

#[test]
fn test_list_without_manifest() {
    let env = Harness::new().expect("harness");
    env.command()
        .arg("list")
        .assert()
        .success()
        .stdout(predicate::str::contains("No platforms published yet"));
}

#[test]
fn test_plan_reports_pending_archive() {
    let env = Harness::new().expect("harness");
    env.add_platform("tidal", &info_json("tidal", "1.0.0"), false)
        .expect("platform");

    env.command()
        .args(["plan", "--python"])
        .assert()
        .success()
        .stdout(predicate::str::contains("tidal_1.0.0.zip"));
    assert!(!env.root().join("platforms.json").exists());
}

#[test]
fn test_sync_records_native_platform_in_python_mode() {
    let env = Harness::new().expect("harness");
    env.add_platform("deezer", &info_json("deezer", "1.4"), true)
        .expect("platform");

    env.command()
        .args(["sync", "--python"])
        .assert()
        .success()
        .stdout(predicate::str::contains("recorded"));

    let manifest = fs::read_to_string(env.root().join("platforms.json")).expect("manifest");
    assert!(manifest.contains("\"language\": \"rust\""));
    assert!(manifest.contains("\"1.4\": 30"));

    // Second run has nothing left to do
    env.command()
        .args(["sync", "--python"])
        .assert()
        .success()
        .stdout(predicate::str::contains("up to date"));

    env.command()
        .args(["list", "deezer"])
        .assert()
        .success()
        .stdout(predicate::str::contains("1.4 -> supportedVersion 30"));
}

#[test]
fn test_sync_commit_writes_to_local_store() {
    let env = Harness::new().expect("harness");
    env.add_platform("deezer", &info_json("deezer", "1.0.0"), true)
        .expect("platform");
    let store_dir = env.root().join("other-release");

    env.command()
        .args(["sync", "--python", "--commit", "--store-dir"])
        .arg(&store_dir)
        .assert()
        .success();

    let local = fs::read(env.root().join("platforms.json")).expect("local manifest");
    let remote = fs::read(store_dir.join("platforms.json")).expect("committed manifest");
    assert_eq!(local, remote);
}

#[test]
fn test_sync_fails_on_invalid_descriptor() {
    let env = Harness::new().expect("harness");
    env.add_platform(
        "beatport",
        r#"{"id": "beatport", "name": "Beatport", "version": "1.0.0"}"#,
        false,
    )
    .expect("platform");

    env.command()
        .args(["sync", "--python"])
        .assert()
        .code(1)
        .stderr(predicate::str::contains("beatport"))
        .stderr(predicate::str::contains("description"));
    assert!(!env.root().join("platforms.json").exists());
}

#[test]
fn test_list_unknown_platform_fails() {
    let env = Harness::new().expect("harness");
    env.command()
        .args(["list", "nope"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not in the manifest"));
}
