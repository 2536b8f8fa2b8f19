use crate::common::CatalogSite;
use predicates::prelude::*;
use reelshelf_cli::upgrade::BackupManager;
use std::fs;

#[tokio::test]
async fn test_backup_create_list_restore_delete() {
    let site = CatalogSite::new("1.4.7").await;

    site.reelshelf()
        .args(["backup", "create"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Created backup"))
        .stdout(predicate::str::contains("backup_"));

    let manager = BackupManager::from_config(&site.config().await);
    let backups = manager.list_backups().await.unwrap();
    assert_eq!(backups.len(), 1);
    let name = backups[0].name.clone();

    site.reelshelf()
        .args(["backup", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains(name.as_str()));

    fs::write(site.root().join("app/index.php"), "defaced").unwrap();
    site.reelshelf().args(["backup", "restore", &name, "--yes"]).assert().success();
    assert_eq!(site.read("app/index.php"), "<?php echo 'catalog';");

    site.reelshelf().args(["backup", "delete", &name, "--yes"]).assert().success();
    assert!(manager.list_backups().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_restore_requires_confirmation_without_terminal() {
    let site = CatalogSite::new("1.4.7").await;
    let artifact = BackupManager::from_config(&site.config().await)
        .create_snapshot()
        .await
        .unwrap();

    site.reelshelf()
        .args(["backup", "restore", &artifact.name])
        .write_stdin("")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--yes"));
}

#[tokio::test]
async fn test_backup_name_is_validated() {
    let site = CatalogSite::new("1.4.7").await;

    site.reelshelf()
        .args(["backup", "delete", "../reelshelf.toml", "--yes"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not a backup file name"));

    site.reelshelf()
        .args(["backup", "path", "backup_20260101_000000_000.zip"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"))
        .stderr(predicate::str::contains("reelshelf backup list"));
}
