//! Small key/value store for cursors and watermarks.

use chrono::{DateTime, Utc};
use sqlx::{Executor, Sqlite};
use tracing::warn;

use crate::error::Result;
use crate::timefmt::{format_timestamp, parse_remote_timestamp};

pub const REMOTE_SWEEP_WATERMARK: &str = "remote_cache_last_sweep";

pub async fn get<'c, E>(executor: E, key: &str) -> Result<Option<String>>
where
    E: Executor<'c, Database = Sqlite>,
{
    let value: Option<(String,)> = sqlx::query_as("SELECT v FROM kv WHERE k = $1")
        .bind(key)
        .fetch_optional(executor)
        .await?;
    Ok(value.map(|(v,)| v))
}

pub async fn set<'c, E>(executor: E, key: &str, value: &str) -> Result<()>
where
    E: Executor<'c, Database = Sqlite>,
{
    sqlx::query("INSERT INTO kv (k, v) VALUES ($1, $2) ON CONFLICT (k) DO UPDATE SET v = excluded.v")
        .bind(key)
        .bind(value)
        .execute(executor)
        .await?;
    Ok(())
}

/// A stored value that no longer parses is treated as absent.
pub async fn get_timestamp<'c, E>(executor: E, key: &str) -> Result<Option<DateTime<Utc>>>
where
    E: Executor<'c, Database = Sqlite>,
{
    let Some(raw) = get(executor, key).await? else {
        return Ok(None);
    };
    let parsed = parse_remote_timestamp(&raw);
    if parsed.is_none() {
        warn!(key, value = %raw, "ignoring unparsable stored timestamp");
    }
    Ok(parsed)
}

pub async fn set_timestamp<'c, E>(executor: E, key: &str, value: DateTime<Utc>) -> Result<()>
where
    E: Executor<'c, Database = Sqlite>,
{
    set(executor, key, &format_timestamp(value)).await
}
