mod common;

use std::io::Write;

use anyhow::Result;
use stocksync_core::config::ImporterConfig;
use stocksync_core::importer::{import_file, scan_once};
use stocksync_core::ledger::{self, ImportStatus};
use stocksync_core::registrar::register_file;
use tokio_util::sync::CancellationToken;
use zip::write::FileOptions;
use zip::ZipWriter;

use common::{count, export_xml, fixture_path, ledger_row, memory_pool, seed_remote, write_file};

fn options_for(dir: &std::path::Path) -> ImporterConfig {
    ImporterConfig {
        watch_dir: dir.to_string_lossy().into_owned(),
        ..ImporterConfig::default()
    }
}

#[tokio::test]
async fn imports_fixture_into_staging_and_marks_done() -> Result<()> {
    let pool = memory_pool().await?;
    let path = fixture_path("exp_wyk_0001_20240305143000.xml");
    let registration = register_file(&pool, &path).await?;

    let summary = import_file(&pool, registration.import_id, &path, &ImporterConfig::default()).await?;

    assert_eq!(summary.products, 3);
    assert_eq!(summary.stock, 2);
    assert_eq!(summary.transmission_id.as_deref(), Some("TR-2024-0305-01"));

    let row = ledger::fetch(&pool, registration.import_id).await?;
    assert_eq!(row.status, ImportStatus::Done);
    assert!(row.processed_at.is_some());
    assert!(row.last_error.is_none());

    let (code, price, lowest, active): (String, f64, f64, bool) = sqlx::query_as(
        "SELECT code, price_retail, lowest_price_30d, active FROM staging_products WHERE product_id = 101",
    )
    .fetch_one(&pool)
    .await?;
    assert_eq!(code, "5901234123457");
    assert_eq!(price, 19.99);
    assert_eq!(lowest, 18.99);
    assert!(active);

    let (reserved,): (f64,) = sqlx::query_as(
        "SELECT reserved FROM staging_stock WHERE product_id = 101 AND warehouse_id = 1",
    )
    .fetch_one(&pool)
    .await?;
    assert_eq!(reserved, 2.5);
    Ok(())
}

#[tokio::test]
async fn reprocessing_replaces_staging_rows() -> Result<()> {
    let pool = memory_pool().await?;
    let dir = tempfile::tempdir()?;
    let path = write_file(
        dir.path(),
        "exp_wyk_0001.xml",
        &export_xml(None, &[(1, "111"), (2, "222"), (3, "333")]),
    );
    let registration = register_file(&pool, &path).await?;
    let options = options_for(dir.path());
    import_file(&pool, registration.import_id, &path, &options).await?;

    let revised = r#"<?xml version="1.0" encoding="UTF-8"?>
<dane>
  <towary>
    <towar><towar_id>2</towar_id><kod>222</kod><nazwa>Produkt 2</nazwa>
      <magazyny>
        <magazyn><magazyn_id>2</magazyn_id><stan_magazynu>4</stan_magazynu></magazyn>
        <magazyn><magazyn_id>3</magazyn_id><stan_magazynu>9</stan_magazynu></magazyn>
      </magazyny>
    </towar>
  </towary>
</dane>
"#;
    write_file(dir.path(), "exp_wyk_0001.xml", revised);
    let summary = import_file(&pool, registration.import_id, &path, &options).await?;
    assert_eq!(summary.products, 1);
    assert_eq!(summary.stock, 2);

    let products: Vec<(i64,)> = sqlx::query_as(
        "SELECT product_id FROM staging_products WHERE import_id = $1 ORDER BY product_id",
    )
    .bind(registration.import_id)
    .fetch_all(&pool)
    .await?;
    assert_eq!(products, vec![(2,)]);

    let stock: Vec<(i64, i64, f64)> = sqlx::query_as(
        "SELECT product_id, warehouse_id, quantity FROM staging_stock \
         WHERE import_id = $1 ORDER BY product_id, warehouse_id",
    )
    .bind(registration.import_id)
    .fetch_all(&pool)
    .await?;
    assert_eq!(stock, vec![(2, 2, 4.0), (2, 3, 9.0)]);
    Ok(())
}

#[tokio::test]
async fn batches_larger_than_the_bind_limit_are_split() -> Result<()> {
    let pool = memory_pool().await?;
    let dir = tempfile::tempdir()?;
    let products: Vec<(i64, String)> = (1..=2000).map(|id| (id, format!("59{id:011}"))).collect();
    let refs: Vec<(i64, &str)> = products.iter().map(|(id, code)| (*id, code.as_str())).collect();
    let path = write_file(dir.path(), "exp_wyk_large.xml", &export_xml(None, &refs));
    let registration = register_file(&pool, &path).await?;
    let options = ImporterConfig {
        batch_size: 2000,
        ..options_for(dir.path())
    };

    let summary = import_file(&pool, registration.import_id, &path, &options).await?;

    assert_eq!(summary.products, 2000);
    assert_eq!(summary.stock, 2000);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM staging_products").await?, 2000);
    assert_eq!(ledger::fetch(&pool, registration.import_id).await?.status, ImportStatus::Done);
    Ok(())
}

#[tokio::test]
async fn small_batches_stage_every_row() -> Result<()> {
    let pool = memory_pool().await?;
    let dir = tempfile::tempdir()?;
    let products: Vec<(i64, String)> = (1..=7).map(|id| (id, format!("{id}00"))).collect();
    let refs: Vec<(i64, &str)> = products.iter().map(|(id, code)| (*id, code.as_str())).collect();
    let path = write_file(dir.path(), "exp_wyk_batch.xml", &export_xml(None, &refs));
    let registration = register_file(&pool, &path).await?;
    let options = ImporterConfig {
        batch_size: 2,
        ..options_for(dir.path())
    };

    let summary = import_file(&pool, registration.import_id, &path, &options).await?;

    assert_eq!(summary.products, 7);
    assert_eq!(summary.stock, 7);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM staging_products").await?, 7);
    Ok(())
}

#[tokio::test]
async fn broken_document_rolls_back_and_marks_error() -> Result<()> {
    let pool = memory_pool().await?;
    let dir = tempfile::tempdir()?;
    let path = write_file(dir.path(), "exp_wyk_0001.xml", &export_xml(None, &[(1, "111"), (2, "222")]));
    let registration = register_file(&pool, &path).await?;
    let options = options_for(dir.path());
    import_file(&pool, registration.import_id, &path, &options).await?;

    std::fs::copy(fixture_path("exp_wyk_0003_broken.xml"), &path)?;
    let err = import_file(&pool, registration.import_id, &path, &options)
        .await
        .expect_err("broken document must fail");
    assert!(err.to_string().contains("Export parsing failed"), "unexpected error: {err}");

    let row = ledger::fetch(&pool, registration.import_id).await?;
    assert_eq!(row.status, ImportStatus::Error);
    assert!(row.last_error.is_some());
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM staging_products").await?, 2);
    Ok(())
}

#[tokio::test]
async fn duplicate_product_in_one_file_fails_without_partial_rows() -> Result<()> {
    let pool = memory_pool().await?;
    let dir = tempfile::tempdir()?;
    let path = write_file(dir.path(), "exp_wyk_dup.xml", &export_xml(None, &[(1, "111"), (1, "111")]));
    let registration = register_file(&pool, &path).await?;

    let result = import_file(&pool, registration.import_id, &path, &options_for(dir.path())).await;

    assert!(result.is_err());
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM staging_products").await?, 0);
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM staging_stock").await?, 0);
    assert_eq!(ledger::fetch(&pool, registration.import_id).await?.status, ImportStatus::Error);
    Ok(())
}

#[tokio::test]
async fn transmission_id_found_while_importing_is_recorded() -> Result<()> {
    let pool = memory_pool().await?;
    let path = fixture_path("exp_wyk_0002_late_header.xml");
    let import_id = ledger_row(&pool, "exp_wyk_0002_late_header.xml").await?;

    let summary = import_file(&pool, import_id, &path, &ImporterConfig::default()).await?;

    assert_eq!(summary.transmission_id.as_deref(), Some("TR-LATE-7"));
    let row = ledger::fetch(&pool, import_id).await?;
    assert_eq!(row.transmission_id.as_deref(), Some("TR-LATE-7"));
    Ok(())
}

#[tokio::test]
async fn zip_exports_are_streamed() -> Result<()> {
    let pool = memory_pool().await?;
    let dir = tempfile::tempdir()?;
    let path = dir.path().join("exp_wyk_0009.zip");
    let mut writer = ZipWriter::new(std::fs::File::create(&path)?);
    writer.start_file("exp_wyk_0009.xml", FileOptions::default())?;
    writer.write_all(export_xml(Some("TR-ZIP"), &[(1, "111"), (2, "222")]).as_bytes())?;
    writer.finish()?;

    let registration = register_file(&pool, &path).await?;
    let row = ledger::fetch(&pool, registration.import_id).await?;
    assert_eq!(row.transmission_id.as_deref(), Some("TR-ZIP"));

    let summary = import_file(&pool, registration.import_id, &path, &options_for(dir.path())).await?;
    assert_eq!(summary.products, 2);
    Ok(())
}

#[tokio::test]
async fn linker_runs_after_import() -> Result<()> {
    let pool = memory_pool().await?;
    seed_remote(&pool, &[(500, "111")]).await?;
    let dir = tempfile::tempdir()?;
    let path = write_file(dir.path(), "exp_wyk_0001.xml", &export_xml(None, &[(1, "111"), (2, "")]));
    let registration = register_file(&pool, &path).await?;

    let summary = import_file(&pool, registration.import_id, &path, &options_for(dir.path())).await?;

    let link = summary.link.expect("link report");
    assert!(!link.skipped);
    assert_eq!(link.matched, 1);
    assert_eq!(link.missing_ean_src, 1);
    Ok(())
}

#[tokio::test]
async fn scan_imports_new_files_once() -> Result<()> {
    let pool = memory_pool().await?;
    let dir = tempfile::tempdir()?;
    write_file(dir.path(), "exp_wyk_0001.xml", &export_xml(Some("T1"), &[(1, "111")]));
    write_file(dir.path(), "exp_wyk_0002.xml", &export_xml(Some("T2"), &[(2, "222")]));
    write_file(dir.path(), "exp_wyk_0003.xml", "<dane><towary><towar>");
    write_file(dir.path(), "notes.txt", "ignored");
    let options = options_for(dir.path());
    let cancel = CancellationToken::new();

    let first = scan_once(&pool, &options, &cancel).await?;
    assert_eq!(first.candidates, 3);
    assert_eq!(first.imported, 2);
    assert_eq!(first.failed, 1);

    let second = scan_once(&pool, &options, &cancel).await?;
    assert_eq!(second.skipped, 2);
    assert_eq!(second.imported, 0);
    assert_eq!(second.failed, 1);
    Ok(())
}

#[tokio::test]
async fn cancelled_scan_imports_nothing() -> Result<()> {
    let pool = memory_pool().await?;
    let dir = tempfile::tempdir()?;
    write_file(dir.path(), "exp_wyk_0001.xml", &export_xml(None, &[(1, "111")]));
    let cancel = CancellationToken::new();
    cancel.cancel();

    let report = scan_once(&pool, &options_for(dir.path()), &cancel).await?;

    assert_eq!(report.candidates, 1);
    assert_eq!(report.imported, 0);
    assert!(ledger::list(&pool).await?.is_empty());
    Ok(())
}

#[tokio::test]
async fn reset_clears_ledger_and_staging() -> Result<()> {
    let pool = memory_pool().await?;
    let path = fixture_path("exp_wyk_0001_20240305143000.xml");
    let registration = register_file(&pool, &path).await?;
    import_file(&pool, registration.import_id, &path, &ImporterConfig::default()).await?;

    let summary = ledger::reset(&pool).await?;

    assert_eq!(summary.files, 1);
    assert_eq!(summary.staging_products, 3);
    assert_eq!(summary.staging_stock, 2);
    assert!(ledger::list(&pool).await?.is_empty());
    assert_eq!(count(&pool, "SELECT COUNT(*) FROM staging_products").await?, 0);

    let again = register_file(&pool, &path).await?;
    assert!(!again.already_known);
    Ok(())
}
