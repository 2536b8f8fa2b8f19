use crate::common::CatalogSite;
use predicates::prelude::*;
use std::fs;

#[tokio::test]
async fn test_migrate_success_removes_script() {
    let site = CatalogSite::new("1.4.7").await;
    let script = site.root().join("update.sql");
    fs::write(&script, "CREATE TABLE loans (film_id INTEGER);\nINSERT INTO loans VALUES (7);").unwrap();

    site.reelshelf()
        .arg("migrate")
        .assert()
        .success()
        .stdout(predicate::str::contains("Migration applied"));
    assert!(!script.exists());
}

#[tokio::test]
async fn test_migrate_failure_keeps_script() {
    let site = CatalogSite::new("1.4.7").await;
    let script = site.root().join("update.sql");
    fs::write(&script, "UPDATE films SET rating = 5;").unwrap();

    site.reelshelf()
        .arg("migrate")
        .assert()
        .failure()
        .stderr(predicate::str::contains("Migration script"))
        .stderr(predicate::str::contains("rolled back"));
    assert!(script.exists());

    site.reelshelf()
        .args(["upgrade", "--status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Pending migration"));
}

#[tokio::test]
async fn test_migrate_nothing_pending() {
    let site = CatalogSite::new("1.4.7").await;

    site.reelshelf()
        .arg("migrate")
        .assert()
        .success()
        .stdout(predicate::str::contains("No pending migration"));
}
