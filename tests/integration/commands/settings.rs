use crate::common::CatalogSite;
use predicates::prelude::*;

#[tokio::test]
async fn test_settings_set_get_list() {
    let site = CatalogSite::new("1.4.7").await;

    site.reelshelf().args(["settings", "set", "site_title", "DVD Shelf"]).assert().success();

    site.reelshelf()
        .args(["settings", "get", "site_title"])
        .assert()
        .success()
        .stdout("DVD Shelf\n");

    site.reelshelf()
        .args(["settings", "get", "theme", "--default", "light"])
        .assert()
        .success()
        .stdout("light\n");

    site.reelshelf()
        .args(["settings", "list"])
        .assert()
        .success()
        .stdout(predicate::str::contains("site_title = DVD Shelf"))
        .stdout(predicate::str::contains("version = 1.4.7"));
}

#[tokio::test]
async fn test_config_from_environment() {
    let site = CatalogSite::new("1.4.7").await;

    assert_cmd::Command::cargo_bin("reelshelf")
        .unwrap()
        .current_dir(site.scratch(""))
        .env("REELSHELF_CONFIG", site.config_path())
        .args(["settings", "get", "version"])
        .assert()
        .success()
        .stdout("1.4.7\n");
}
