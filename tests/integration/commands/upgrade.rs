use crate::common::CatalogSite;
use predicates::prelude::*;
use reelshelf_cli::test_utils::ZipFixture;

#[tokio::test]
async fn test_upgrade_from_uploaded_zip() {
    let site = CatalogSite::new("1.4.7").await;
    let archive = ZipFixture::new()
        .dir("reelshelf-v1.4.8/")
        .file("reelshelf-v1.4.8/app/index.php", "<?php echo 'v1.4.8';")
        .file("reelshelf-v1.4.8/config/config.php", "<?php $db = 'release';")
        .write_to(&site.scratch("reelshelf-v1.4.8.zip"))
        .unwrap();

    site.reelshelf()
        .args(["upgrade", "--yes", "--from"])
        .arg(&archive)
        .assert()
        .success()
        .stdout(predicate::str::contains("Upgrade completed: 1.4.7 -> 1.4.8"))
        .stdout(predicate::str::contains("Backup:    backup_"));

    assert_eq!(site.read("app/index.php"), "<?php echo 'v1.4.8';");
    assert_eq!(site.read("config/config.php"), "<?php $db = 'live';");

    site.reelshelf()
        .args(["settings", "get", "version"])
        .assert()
        .success()
        .stdout("1.4.8\n");

    // Same file again: nothing to do.
    site.reelshelf()
        .args(["upgrade", "--yes", "--from"])
        .arg(&archive)
        .assert()
        .success()
        .stdout(predicate::str::contains("Already on the latest version (1.4.8)"));
}

#[tokio::test]
async fn test_upgrade_without_confirmation_is_refused() {
    let site = CatalogSite::new("1.4.7").await;
    let archive = ZipFixture::new()
        .file("v1.4.8/app/index.php", "new")
        .write_to(&site.scratch("reelshelf-v1.4.8.zip"))
        .unwrap();

    site.reelshelf()
        .args(["upgrade", "--no-backup", "--from"])
        .arg(&archive)
        .write_stdin("")
        .assert()
        .failure()
        .stderr(predicate::str::contains("--yes"));

    assert_eq!(site.read("app/index.php"), "<?php echo 'catalog';");
}

#[tokio::test]
async fn test_upgrade_rejects_unsupported_upload() {
    let site = CatalogSite::new("1.4.7").await;
    let upload = site.scratch("reelshelf-v1.4.8.tar.gz");
    std::fs::write(&upload, "not a zip").unwrap();

    site.reelshelf()
        .args(["upgrade", "--yes", "--from"])
        .arg(&upload)
        .assert()
        .failure()
        .stderr(predicate::str::contains("unsupported upload type"));
}
