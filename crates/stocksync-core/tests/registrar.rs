mod common;

use anyhow::Result;
use chrono::{TimeZone, Utc};
use stocksync_core::ledger::{self, ImportStatus};
use stocksync_core::registrar::{register_file, scan_watch_dir};

use common::{export_xml, memory_pool, write_file};

fn extensions() -> Vec<String> {
    vec!["xml".to_string(), "zip".to_string()]
}

#[tokio::test]
async fn scan_filters_by_prefix_and_extension_in_name_order() -> Result<()> {
    let dir = tempfile::tempdir()?;
    write_file(dir.path(), "exp_wyk_0002_20240306100000.xml", "<dane/>");
    write_file(dir.path(), "exp_wyk_0001_20240305100000.XML", "<dane/>");
    write_file(dir.path(), "exp_wyk_0003.zip", "PK");
    write_file(dir.path(), "exp_wyk_0004.csv", "nope");
    write_file(dir.path(), "other_0005.xml", "<dane/>");
    std::fs::create_dir(dir.path().join("exp_wyk_dir.xml"))?;

    let found = scan_watch_dir(dir.path(), "exp_wyk_", &extensions()).await?;
    let names: Vec<_> = found
        .iter()
        .filter_map(|path| path.file_name().and_then(|name| name.to_str()))
        .collect();

    assert_eq!(
        names,
        vec![
            "exp_wyk_0001_20240305100000.XML",
            "exp_wyk_0002_20240306100000.xml",
            "exp_wyk_0003.zip",
        ]
    );
    Ok(())
}

#[tokio::test]
async fn missing_watch_dir_is_an_error() -> Result<()> {
    let dir = tempfile::tempdir()?;
    let result = scan_watch_dir(&dir.path().join("absent"), "exp_wyk_", &extensions()).await;
    assert!(result.is_err());
    Ok(())
}

#[tokio::test]
async fn new_file_is_pending_with_capture_time_and_transmission_id() -> Result<()> {
    let pool = memory_pool().await?;
    let dir = tempfile::tempdir()?;
    let path = write_file(
        dir.path(),
        "exp_wyk_0001_20240305143000.xml",
        &export_xml(Some("TR-1"), &[(1, "111")]),
    );

    let registration = register_file(&pool, &path).await?;
    assert!(!registration.already_known);
    assert_eq!(registration.status, ImportStatus::Pending);
    assert!(registration.needs_processing());

    let row = ledger::fetch(&pool, registration.import_id).await?;
    assert_eq!(row.filename, "exp_wyk_0001_20240305143000.xml");
    assert_eq!(row.transmission_id.as_deref(), Some("TR-1"));
    assert_eq!(
        row.captured_at,
        Some(Utc.with_ymd_and_hms(2024, 3, 5, 14, 30, 0).unwrap())
    );
    assert_eq!(row.sha256.len(), 64);
    assert!(row.size_bytes > 0);
    assert!(row.processed_at.is_none());
    Ok(())
}

#[tokio::test]
async fn same_bytes_under_another_name_match_existing_row() -> Result<()> {
    let pool = memory_pool().await?;
    let dir = tempfile::tempdir()?;
    let contents = export_xml(None, &[(1, "111")]);
    let first = write_file(dir.path(), "exp_wyk_a.xml", &contents);
    let copy = write_file(dir.path(), "exp_wyk_b.xml", &contents);

    let original = register_file(&pool, &first).await?;
    let again = register_file(&pool, &copy).await?;

    assert!(again.already_known);
    assert_eq!(again.import_id, original.import_id);
    assert_eq!(ledger::list(&pool).await?.len(), 1);
    Ok(())
}

#[tokio::test]
async fn same_name_with_new_bytes_matches_existing_row() -> Result<()> {
    let pool = memory_pool().await?;
    let dir = tempfile::tempdir()?;
    let path = write_file(dir.path(), "exp_wyk_a.xml", &export_xml(None, &[(1, "111")]));
    let original = register_file(&pool, &path).await?;

    write_file(dir.path(), "exp_wyk_a.xml", &export_xml(None, &[(2, "222")]));
    let again = register_file(&pool, &path).await?;

    assert!(again.already_known);
    assert_eq!(again.import_id, original.import_id);
    Ok(())
}

#[tokio::test]
async fn same_transmission_id_matches_existing_row() -> Result<()> {
    let pool = memory_pool().await?;
    let dir = tempfile::tempdir()?;
    let first = write_file(dir.path(), "exp_wyk_a.xml", &export_xml(Some("TR-9"), &[(1, "111")]));
    let resent = write_file(dir.path(), "exp_wyk_b.xml", &export_xml(Some("TR-9"), &[(2, "222")]));

    let original = register_file(&pool, &first).await?;
    let again = register_file(&pool, &resent).await?;

    assert!(again.already_known);
    assert_eq!(again.import_id, original.import_id);
    Ok(())
}

#[tokio::test]
async fn files_without_transmission_id_do_not_collide() -> Result<()> {
    let pool = memory_pool().await?;
    let dir = tempfile::tempdir()?;
    let first = write_file(dir.path(), "exp_wyk_a.xml", &export_xml(None, &[(1, "111")]));
    let second = write_file(dir.path(), "exp_wyk_b.xml", &export_xml(Some(" "), &[(2, "222")]));

    let a = register_file(&pool, &first).await?;
    let b = register_file(&pool, &second).await?;

    assert!(!b.already_known);
    assert_ne!(a.import_id, b.import_id);
    for row in ledger::list(&pool).await? {
        assert!(row.transmission_id.is_none());
        assert!(row.captured_at.is_none());
    }
    Ok(())
}

#[tokio::test]
async fn done_files_are_not_processed_again() -> Result<()> {
    let pool = memory_pool().await?;
    let dir = tempfile::tempdir()?;
    let path = write_file(dir.path(), "exp_wyk_a.xml", &export_xml(None, &[(1, "111")]));

    let first = register_file(&pool, &path).await?;
    ledger::mark_error(&pool, first.import_id, "boom").await?;
    let errored = register_file(&pool, &path).await?;
    assert_eq!(errored.status, ImportStatus::Error);
    assert!(errored.needs_processing());

    ledger::mark_done(&pool, first.import_id).await?;
    let done = register_file(&pool, &path).await?;
    assert_eq!(done.status, ImportStatus::Done);
    assert!(!done.needs_processing());
    Ok(())
}
