use crate::common::reelshelf_in;
use predicates::prelude::*;
use reelshelf_cli::constants::{CONFIG_FILE_NAME, INSTALL_LOCK_FILE};
use std::fs;
use tempfile::TempDir;

#[test]
fn test_init_then_refuse_second_run() {
    let temp = TempDir::new().unwrap();
    let root = temp.path().join("site");

    reelshelf_in(temp.path(), None)
        .args(["init", "--root"])
        .arg(&root)
        .args(["--version", "v1.4.7"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Installation initialized"))
        .stdout(predicate::str::contains("1.4.7"));

    assert!(root.join(CONFIG_FILE_NAME).exists());
    assert!(root.join("data/reelshelf.db").exists());
    let marker = fs::read_to_string(root.join(INSTALL_LOCK_FILE)).unwrap();
    assert!(marker.contains("installed_at"));

    reelshelf_in(temp.path(), None)
        .args(["init", "--root"])
        .arg(&root)
        .assert()
        .failure()
        .stderr(predicate::str::contains("already initialized"))
        .stderr(predicate::str::contains("reelshelf upgrade"));
}

#[test]
fn test_init_in_current_directory_with_custom_database() {
    let temp = TempDir::new().unwrap();

    reelshelf_in(temp.path(), None)
        .args(["init", "--database", "db/catalog.sqlite"])
        .assert()
        .success();

    assert!(temp.path().join("db/catalog.sqlite").exists());
    let config = fs::read_to_string(temp.path().join(CONFIG_FILE_NAME)).unwrap();
    assert!(config.contains("db/catalog.sqlite"));
}

#[test]
fn test_commands_require_configuration() {
    let temp = TempDir::new().unwrap();

    reelshelf_in(temp.path(), None)
        .args(["settings", "list"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("Configuration file not found"))
        .stderr(predicate::str::contains("reelshelf init"));
}
