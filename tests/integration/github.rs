//! Release discovery and download against a mock GitHub API.

use crate::common::CatalogSite;
use httpmock::prelude::*;
use predicates::prelude::*;
use reelshelf_cli::test_utils::ZipFixture;
use reelshelf_cli::upgrade::{
    GitHubReleaseSource, ReleaseSource, UpdateOptions, UpdateOutcome, UpdatePipeline,
};
use std::fs;

const LATEST_PATH: &str = "/repos/reelshelf/reelshelf/releases/latest";
const ZIPBALL_PATH: &str = "/repos/reelshelf/reelshelf/zipball/v1.5.0";

fn release_json(server: &MockServer) -> String {
    serde_json::json!({
        "tag_name": "v1.5.0",
        "body": "- Faster search\n- New cover sizes",
        "zipball_url": server.url(ZIPBALL_PATH),
        "published_at": "2026-10-01T09:30:00Z"
    })
    .to_string()
}

/// Point the site's `[upgrade]` table at the mock server.
async fn use_mock_api(site: &CatalogSite, server: &MockServer) {
    let mut config = site.config().await;
    config.upgrade.api_base = server.base_url();
    config.save_to(&site.config_path()).await.unwrap();
}

#[tokio::test]
async fn test_discover_download_and_install() {
    let site = CatalogSite::new("1.4.7").await;
    let server = MockServer::start_async().await;
    use_mock_api(&site, &server).await;

    let zipball = ZipFixture::new()
        .file("reelshelf-reelshelf-9f8e7d6/app/index.php", "<?php echo 'v1.5.0';")
        .file("reelshelf-reelshelf-9f8e7d6/update.sql", "CREATE TABLE loans (film_id INTEGER);")
        .write_to(&site.scratch("zipball.zip"))
        .unwrap();
    let zip_bytes = fs::read(&zipball).unwrap();

    let latest = server
        .mock_async(|when, then| {
            when.method(GET).path(LATEST_PATH);
            then.status(200).header("content-type", "application/json").body(release_json(&server));
        })
        .await;
    let download = server
        .mock_async(|when, then| {
            when.method(GET).path(ZIPBALL_PATH);
            then.status(200).body(zip_bytes.clone());
        })
        .await;

    let config = site.config().await;
    let settings = site.settings().await;

    let source = GitHubReleaseSource::new(&config.upgrade, &settings).unwrap();
    let release = source.latest_release().await.unwrap().unwrap();
    assert!(release.is_remote());
    // Second lookup is served from the settings cache.
    source.latest_release().await.unwrap().unwrap();
    latest.assert_hits_async(1).await;

    let options = UpdateOptions {
        force: false,
        backup: false,
    };
    let outcome = UpdatePipeline::new(&config, &settings).run(&release, options).await.unwrap();
    assert!(matches!(outcome, UpdateOutcome::Updated(_)));
    download.assert_hits_async(1).await;

    assert_eq!(site.read("app/index.php"), "<?php echo 'v1.5.0';");
    assert!(!site.root().join("update.sql").exists());
    assert_eq!(settings.version().await.unwrap(), "1.5.0");
}

#[tokio::test]
async fn test_cli_check_and_status_share_the_cache() {
    let site = CatalogSite::new("1.4.7").await;
    let server = MockServer::start_async().await;
    use_mock_api(&site, &server).await;

    let latest = server
        .mock_async(|when, then| {
            when.method(GET).path(LATEST_PATH);
            then.status(200).body(release_json(&server));
        })
        .await;

    site.reelshelf()
        .env_remove("GITHUB_TOKEN")
        .args(["upgrade", "--check"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Update available: 1.4.7 -> v1.5.0"))
        .stdout(predicate::str::contains("Faster search"));

    // --status reads the cached response written by --check.
    site.reelshelf()
        .env_remove("GITHUB_TOKEN")
        .args(["upgrade", "--status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Latest version:  v1.5.0 (update available)"))
        .stdout(predicate::str::contains("Max upload size: 64.0 MiB"));

    latest.assert_hits_async(1).await;
}

#[tokio::test]
async fn test_cli_check_with_api_down() {
    let site = CatalogSite::new("1.4.7").await;
    let server = MockServer::start_async().await;
    use_mock_api(&site, &server).await;

    server
        .mock_async(|when, then| {
            when.method(GET).path(LATEST_PATH);
            then.status(503);
        })
        .await;

    site.reelshelf()
        .env_remove("GITHUB_TOKEN")
        .args(["upgrade", "--check"])
        .assert()
        .success()
        .stdout(predicate::str::contains("No release information available"));

    site.reelshelf()
        .env_remove("GITHUB_TOKEN")
        .args(["upgrade", "--yes"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No release information available"));
}
