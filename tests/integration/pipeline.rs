//! Releases applied to an installation created by the installer.

use crate::common::CatalogSite;
use reelshelf_cli::core::ReelshelfError;
use reelshelf_cli::test_utils::{ZipFixture, init_test_logging};
use reelshelf_cli::upgrade::{
    BackupManager, ChecksumVerifier, LocalReleaseSource, ReleaseSource, UpdateOptions,
    UpdateOutcome, UpdatePipeline,
};
use std::fs;

const NO_BACKUP: UpdateOptions = UpdateOptions {
    force: false,
    backup: false,
};

#[tokio::test]
async fn test_uploaded_release_skips_excluded_config() {
    init_test_logging(None);
    let site = CatalogSite::new("1.4.7").await;

    let mut config = site.config().await;
    config.exclusions = vec!["config/config.php".to_string()];
    config.save_to(&site.config_path()).await.unwrap();
    let config = site.config().await;
    let settings = site.settings().await;

    let archive = ZipFixture::new()
        .file("v1.4.8/config/config.php", "<?php $db = 'release';")
        .file("v1.4.8/app/index.php", "<?php echo 'v1.4.8';")
        .file("v1.4.8/newfile.txt", "hello")
        .write_to(&site.scratch("reelshelf-v1.4.8.zip"))
        .unwrap();

    let release = LocalReleaseSource::new(&archive, config.max_upload_size)
        .latest_release()
        .await
        .unwrap()
        .unwrap();
    assert_eq!(release.tag, "v1.4.8");

    let outcome = UpdatePipeline::new(&config, &settings).run(&release, NO_BACKUP).await.unwrap();
    let UpdateOutcome::Updated(report) = outcome else {
        panic!("expected an update");
    };
    let extraction = report.extraction.unwrap();
    assert_eq!(extraction.files_written, 2);
    assert_eq!(extraction.skipped_excluded, 1);

    assert_eq!(site.read("config/config.php"), "<?php $db = 'live';");
    assert_eq!(site.read("app/index.php"), "<?php echo 'v1.4.8';");
    assert_eq!(site.read("newfile.txt"), "hello");
    assert_eq!(settings.version().await.unwrap(), "1.4.8");
}

#[tokio::test]
async fn test_xml_descriptor_with_checksum() {
    let site = CatalogSite::new("1.4.7").await;
    let config = site.config().await;
    let settings = site.settings().await;

    let archive = ZipFixture::new()
        .file("reelshelf-1.5.0/app/index.php", "<?php echo 'v1.5.0';")
        .write_to(&site.scratch("uploads/reelshelf-1.5.0.zip"))
        .unwrap();
    let sha = ChecksumVerifier::compute_sha256(&archive).await.unwrap();
    let descriptor = site.scratch("uploads/release.xml");
    fs::write(
        &descriptor,
        format!(
            "<release>\n  <tag>v1.5.0</tag>\n  <changelog>Faster cover uploads.</changelog>\n  \
             <archive>reelshelf-1.5.0.zip</archive>\n  <published>2026-10-01</published>\n  \
             <sha256>{sha}</sha256>\n</release>\n"
        ),
    )
    .unwrap();

    let release = LocalReleaseSource::new(&descriptor, config.max_upload_size)
        .describe()
        .await
        .unwrap();
    assert_eq!(release.changelog, "Faster cover uploads.");
    assert!(release.published_at.is_some());

    UpdatePipeline::new(&config, &settings).run(&release, NO_BACKUP).await.unwrap();
    assert_eq!(site.read("app/index.php"), "<?php echo 'v1.5.0';");
    assert_eq!(settings.version().await.unwrap(), "1.5.0");
}

#[tokio::test]
async fn test_tampered_archive_is_rejected() {
    let site = CatalogSite::new("1.4.7").await;
    let config = site.config().await;
    let settings = site.settings().await;

    let archive = ZipFixture::new()
        .file("v1.5.0/app/index.php", "<?php echo 'tampered';")
        .write_to(&site.scratch("reelshelf-1.5.0.zip"))
        .unwrap();
    let descriptor = site.scratch("release.xml");
    fs::write(
        &descriptor,
        format!(
            "<release><tag>v1.5.0</tag><archive>reelshelf-1.5.0.zip</archive><sha256>{}</sha256></release>",
            "0".repeat(64)
        ),
    )
    .unwrap();

    let release = LocalReleaseSource::new(&descriptor, config.max_upload_size)
        .describe()
        .await
        .unwrap();
    let err = UpdatePipeline::new(&config, &settings).run(&release, NO_BACKUP).await.unwrap_err();

    assert!(matches!(
        err.downcast_ref::<ReelshelfError>(),
        Some(ReelshelfError::ChecksumMismatch { .. })
    ));
    assert_eq!(site.read("app/index.php"), "<?php echo 'catalog';");
    assert_eq!(settings.version().await.unwrap(), "1.4.7");
}

#[tokio::test]
async fn test_restore_pre_update_backup() {
    let site = CatalogSite::new("1.4.7").await;
    let config = site.config().await;
    let settings = site.settings().await;

    let archive = ZipFixture::new()
        .file("v1.4.8/app/index.php", "<?php echo 'broken release';")
        .write_to(&site.scratch("reelshelf-v1.4.8.zip"))
        .unwrap();
    let release = LocalReleaseSource::new(&archive, config.max_upload_size)
        .describe()
        .await
        .unwrap();

    let outcome = UpdatePipeline::new(&config, &settings)
        .run(&release, UpdateOptions::default())
        .await
        .unwrap();
    let UpdateOutcome::Updated(report) = outcome else {
        panic!("expected an update");
    };
    let backup = report.backup.expect("backup taken before extraction");
    assert_eq!(site.read("app/index.php"), "<?php echo 'broken release';");

    let manager = BackupManager::from_config(&config);
    manager.restore_backup(&backup).await.unwrap();

    assert_eq!(site.read("app/index.php"), "<?php echo 'catalog';");
    // Uploaded covers were neither backed up nor touched.
    assert!(site.root().join("uploads/covers/42.jpg").exists());
}
