//! Streams registered exports into the staging tables and runs the linker.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Serialize;
use sqlx::SqliteConnection;
use stocksync_parser::{with_export_stream, ExportItem, ExportReader, ProductRecord, StockRecord};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use crate::config::ImporterConfig;
use crate::db::DbPool;
use crate::error::{Result, SyncError};
use crate::ledger;
use crate::linker::{self, LinkReport};
use crate::registrar::{register_file, scan_watch_dir};
use crate::runtime::{Component, ComponentContext, PollTimer, IMPORTER};
use crate::staging;

const CHANNEL_CAPACITY: usize = 1024;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ImportSummary {
    pub import_id: i64,
    pub products: u64,
    pub stock: u64,
    pub transmission_id: Option<String>,
    /// `None` when the link pass failed after the staging commit.
    pub link: Option<LinkReport>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ScanReport {
    pub candidates: usize,
    pub imported: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// Imports one registered file end to end.
///
/// Staging happens in a single transaction: any parse or write error rolls
/// it back and the file is marked `error` with the message. After the
/// commit the linker runs; a linker failure is logged and the file still
/// becomes `done`.
pub async fn import_file(
    pool: &DbPool,
    import_id: i64,
    path: &Path,
    options: &ImporterConfig,
) -> Result<ImportSummary> {
    let staged = match stage_file(pool, import_id, path, options.batch_size).await {
        Ok(staged) => staged,
        Err(err) => {
            error!(import_id, file = %path.display(), error = %err, "import failed");
            if let Err(mark_err) = ledger::mark_error(pool, import_id, &err.to_string()).await {
                error!(import_id, error = %mark_err, "could not record import failure");
            }
            return Err(err);
        }
    };

    let link = match linker::link_import(pool, import_id, options.issue_purge_scope).await {
        Ok(report) => Some(report),
        Err(err) => {
            error!(import_id, error = %err, "link pass failed; will retry with the next import");
            None
        }
    };

    ledger::mark_done(pool, import_id).await?;

    let summary = ImportSummary {
        import_id,
        products: staged.products,
        stock: staged.stock,
        transmission_id: staged.transmission_id,
        link,
    };
    info!(
        import_id,
        file = %path.display(),
        products = summary.products,
        stock = summary.stock,
        transmission_id = summary.transmission_id.as_deref().unwrap_or(""),
        "import finished"
    );
    Ok(summary)
}

#[derive(Debug, Default)]
struct Staged {
    products: u64,
    stock: u64,
    transmission_id: Option<String>,
}

async fn stage_file(pool: &DbPool, import_id: i64, path: &Path, batch_size: usize) -> Result<Staged> {
    let (sender, mut receiver) = mpsc::channel::<ExportItem>(CHANNEL_CAPACITY);
    let owned = path.to_path_buf();
    let reader = tokio::task::spawn_blocking(move || {
        with_export_stream(&owned, |stream| {
            for item in ExportReader::new(stream) {
                if sender.blocking_send(item?).is_err() {
                    break;
                }
            }
            Ok(())
        })
    });

    let mut tx = pool.begin().await?;
    let written = write_staging(&mut tx, import_id, &mut receiver, batch_size.max(1)).await;
    drop(receiver);

    let parsed = reader
        .await
        .map_err(|err| SyncError::Task(err.to_string()))
        .and_then(|parsed| parsed.map_err(SyncError::from));

    match (written, parsed) {
        (Ok(staged), Ok(())) => {
            tx.commit().await?;
            Ok(staged)
        }
        (Err(err), _) | (Ok(_), Err(err)) => {
            if let Err(rollback_err) = tx.rollback().await {
                warn!(import_id, error = %rollback_err, "rollback failed");
            }
            Err(err)
        }
    }
}

async fn write_staging(
    conn: &mut SqliteConnection,
    import_id: i64,
    receiver: &mut mpsc::Receiver<ExportItem>,
    batch_size: usize,
) -> Result<Staged> {
    let purged = staging::purge(conn, import_id).await?;
    if purged.products > 0 || purged.stock > 0 {
        info!(
            import_id,
            products = purged.products,
            stock = purged.stock,
            "replacing staging rows from an earlier attempt"
        );
    }

    let mut staged = Staged::default();
    let mut products: Vec<ProductRecord> = Vec::with_capacity(batch_size);
    let mut stock: Vec<(i64, StockRecord)> = Vec::with_capacity(batch_size);

    while let Some(item) = receiver.recv().await {
        match item {
            ExportItem::TransmissionId(transmission_id) => {
                if staged.transmission_id.is_none() {
                    if !ledger::set_transmission_id(conn, import_id, &transmission_id).await? {
                        debug!(import_id, transmission_id = %transmission_id, "transmission id already recorded");
                    }
                    staged.transmission_id = Some(transmission_id);
                }
            }
            ExportItem::Product(mut product) => {
                for entry in std::mem::take(&mut product.stock) {
                    stock.push((product.product_id, entry));
                    if stock.len() >= batch_size {
                        staged.stock += staging::insert_stock(conn, import_id, &stock).await?;
                        stock.clear();
                    }
                }
                products.push(product);
                if products.len() >= batch_size {
                    staged.products += staging::insert_products(conn, import_id, &products).await?;
                    products.clear();
                }
            }
        }
    }

    staged.products += staging::insert_products(conn, import_id, &products).await?;
    staged.stock += staging::insert_stock(conn, import_id, &stock).await?;
    Ok(staged)
}

/// One pass over the watch directory: register every candidate and import
/// the ones that are new or never reached `done`. Cancellation is checked
/// between files.
pub async fn scan_once(
    pool: &DbPool,
    options: &ImporterConfig,
    cancel: &CancellationToken,
) -> Result<ScanReport> {
    let dir = options.watch_dir_path();
    let files = scan_watch_dir(&dir, &options.file_prefix, &options.extensions).await?;
    let mut report = ScanReport {
        candidates: files.len(),
        ..ScanReport::default()
    };

    for path in files {
        if cancel.is_cancelled() {
            break;
        }

        let registration = match register_file(pool, &path).await {
            Ok(registration) => registration,
            Err(err) => {
                warn!(file = %path.display(), error = %err, "could not register file");
                report.failed += 1;
                continue;
            }
        };

        if !registration.needs_processing() {
            report.skipped += 1;
            continue;
        }
        if registration.already_known {
            warn!(
                import_id = registration.import_id,
                status = registration.status.as_str(),
                file = %path.display(),
                "reprocessing file that never completed"
            );
        }

        match import_file(pool, registration.import_id, &path, options).await {
            Ok(_) => report.imported += 1,
            Err(_) => report.failed += 1,
        }
    }

    Ok(report)
}

/// The watch-directory polling loop.
pub struct Importer {
    pool: DbPool,
}

impl Importer {
    pub fn new(pool: DbPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl Component for Importer {
    fn id(&self) -> &'static str {
        IMPORTER
    }

    async fn run(self: Box<Self>, mut ctx: ComponentContext) -> Result<()> {
        let initial = ctx.config.borrow_and_update().clone();
        let mut timer = PollTimer::new(initial.importer.poll_interval());
        let mut watch_dir: PathBuf = initial.importer.watch_dir_path();
        info!(watch_dir = %watch_dir.display(), "importer started");

        loop {
            tokio::select! {
                _ = ctx.cancel.cancelled() => break,
                _ = timer.tick() => {}
            }

            let config = ctx.config.borrow_and_update().clone();
            if timer.set_period(config.importer.poll_interval()) {
                info!(poll_secs = config.importer.poll_interval().as_secs(), "importer interval changed");
            }
            let current_dir = config.importer.watch_dir_path();
            if current_dir != watch_dir {
                info!(watch_dir = %current_dir.display(), "importer watch directory changed");
                watch_dir = current_dir;
            }

            match scan_once(&self.pool, &config.importer, &ctx.cancel).await {
                Ok(report) if report.imported > 0 || report.failed > 0 => info!(
                    candidates = report.candidates,
                    imported = report.imported,
                    skipped = report.skipped,
                    failed = report.failed,
                    "import cycle finished"
                ),
                Ok(_) => {}
                Err(err) => warn!(watch_dir = %watch_dir.display(), error = %err, "import cycle failed"),
            }
        }

        info!("importer stopped");
        Ok(())
    }
}
