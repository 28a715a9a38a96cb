//! Keeps the remote mirror fresh by paging the catalog newest-first and
//! stopping at the persisted watermark.

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::cache;
use super::client::CatalogClient;
use crate::db::DbPool;
use crate::error::{Result, SyncError};
use crate::kv::{self, REMOTE_SWEEP_WATERMARK};
use crate::timefmt::parse_remote_timestamp;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SweepReport {
    pub pages: u32,
    pub upserted: u64,
    pub skipped_timestamps: u64,
    pub since: Option<DateTime<Utc>>,
    /// Watermark written by this sweep, if any.
    pub watermark: Option<DateTime<Utc>>,
}

/// One incremental pass. Only items modified strictly after the watermark
/// (or `now - lookback` on first run) are upserted; the new watermark is the
/// newest upserted modification time, never the wall clock.
///
/// An error or cancellation leaves earlier pages' upserts in place and the
/// watermark untouched.
pub async fn sweep_once(
    pool: &DbPool,
    client: &CatalogClient,
    lookback: chrono::Duration,
    cancel: &CancellationToken,
) -> Result<SweepReport> {
    let since = match kv::get_timestamp(pool, REMOTE_SWEEP_WATERMARK).await? {
        Some(watermark) => watermark,
        None => Utc::now() - lookback,
    };
    let mut report = SweepReport {
        since: Some(since),
        ..SweepReport::default()
    };
    let mut newest: Option<DateTime<Utc>> = None;
    let per_page = client.per_page() as usize;
    let mut page = 1u32;

    loop {
        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        let items = client.fetch_page(page).await?;
        report.pages += 1;
        if items.is_empty() {
            break;
        }
        let page_len = items.len();

        let mut fresh = Vec::with_capacity(page_len);
        let mut reached_watermark = false;
        for item in items {
            let Some(modified) = parse_remote_timestamp(&item.modified) else {
                warn!(remote_id = item.id, modified = %item.modified, page, "skipping item with unparsable timestamp");
                report.skipped_timestamps += 1;
                continue;
            };
            if modified <= since {
                reached_watermark = true;
                break;
            }
            newest = Some(newest.map_or(modified, |current| current.max(modified)));
            fresh.push(item);
        }

        let mut conn = pool.acquire().await?;
        report.upserted += cache::upsert(&mut conn, &fresh).await?;
        drop(conn);

        if reached_watermark || page_len < per_page {
            break;
        }
        page += 1;
    }

    if report.upserted > 0 {
        if let Some(newest) = newest {
            kv::set_timestamp(pool, REMOTE_SWEEP_WATERMARK, newest).await?;
            report.watermark = Some(newest);
        }
    }

    info!(
        pages = report.pages,
        upserts = report.upserted,
        skipped_timestamps = report.skipped_timestamps,
        since = %since,
        watermark = ?report.watermark,
        "remote cache sweep finished"
    );
    Ok(report)
}

/// Pages the entire catalog once and upserts every item. The watermark is
/// neither read nor written.
pub async fn prime(
    pool: &DbPool,
    client: &CatalogClient,
    cancel: &CancellationToken,
) -> Result<SweepReport> {
    let mut report = SweepReport::default();
    let per_page = client.per_page() as usize;
    let mut page = 1u32;

    loop {
        if cancel.is_cancelled() {
            return Err(SyncError::Cancelled);
        }

        let items = client.fetch_page(page).await?;
        report.pages += 1;
        if items.is_empty() {
            break;
        }

        let mut conn = pool.acquire().await?;
        report.upserted += cache::upsert(&mut conn, &items).await?;
        drop(conn);

        if items.len() < per_page {
            break;
        }
        page += 1;
    }

    info!(pages = report.pages, upserts = report.upserted, "remote cache primed");
    Ok(report)
}
