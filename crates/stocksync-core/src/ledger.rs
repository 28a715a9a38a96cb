//! The `imported_files` ledger: one row per distinct export file ever seen.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqliteConnection};

use crate::db::DbPool;
use crate::error::{Result, SyncError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportStatus {
    Pending,
    Done,
    Error,
}

impl ImportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ImportStatus::Pending => "pending",
            ImportStatus::Done => "done",
            ImportStatus::Error => "error",
        }
    }

    fn from_str(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(Self::Pending),
            "done" => Some(Self::Done),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImportedFile {
    pub import_id: i64,
    pub filename: String,
    pub captured_at: Option<DateTime<Utc>>,
    pub transmission_id: Option<String>,
    pub sha256: String,
    pub size_bytes: i64,
    pub status: ImportStatus,
    pub last_error: Option<String>,
    pub received_at: DateTime<Utc>,
    pub processed_at: Option<DateTime<Utc>>,
}

impl ImportedFile {
    fn from_row(row: &SqliteRow) -> Result<Self> {
        let status: String = row.try_get("status")?;
        Ok(Self {
            import_id: row.try_get("import_id")?,
            filename: row.try_get("filename")?,
            captured_at: row.try_get("captured_at")?,
            transmission_id: row.try_get("transmission_id")?,
            sha256: row.try_get("sha256")?,
            size_bytes: row.try_get("size_bytes")?,
            status: ImportStatus::from_str(&status).ok_or_else(|| {
                SyncError::Config(format!("unknown import status '{status}' in ledger"))
            })?,
            last_error: row.try_get("last_error")?,
            received_at: row.try_get("received_at")?,
            processed_at: row.try_get("processed_at")?,
        })
    }
}

const SELECT_COLUMNS: &str = r#"
    SELECT import_id, filename, captured_at, transmission_id, sha256, size_bytes,
           status, last_error, received_at, processed_at
    FROM imported_files
"#;

#[derive(Debug, Clone)]
pub struct NewImportedFile {
    pub filename: String,
    pub captured_at: Option<DateTime<Utc>>,
    pub transmission_id: Option<String>,
    pub sha256: String,
    pub size_bytes: i64,
}

/// Any of the three keys identifies the same logical file; the oldest row wins.
pub async fn find_existing(
    pool: &DbPool,
    sha256: &str,
    filename: &str,
    transmission_id: Option<&str>,
) -> Result<Option<ImportedFile>> {
    let query = format!(
        "{SELECT_COLUMNS}
         WHERE sha256 = $1
            OR filename = $2
            OR (transmission_id IS NOT NULL AND transmission_id = $3)
         ORDER BY import_id
         LIMIT 1"
    );
    let row = sqlx::query(&query)
        .bind(sha256)
        .bind(filename)
        .bind(transmission_id)
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(ImportedFile::from_row).transpose()
}

pub async fn insert_pending(pool: &DbPool, file: &NewImportedFile) -> Result<i64> {
    let result = sqlx::query(
        r#"
            INSERT INTO imported_files
                (filename, captured_at, transmission_id, sha256, size_bytes, status, received_at)
            VALUES ($1, $2, $3, $4, $5, 'pending', $6)
        "#,
    )
    .bind(&file.filename)
    .bind(file.captured_at)
    .bind(&file.transmission_id)
    .bind(&file.sha256)
    .bind(file.size_bytes)
    .bind(Utc::now())
    .execute(pool)
    .await?;

    Ok(result.last_insert_rowid())
}

pub async fn fetch(pool: &DbPool, import_id: i64) -> Result<ImportedFile> {
    let query = format!("{SELECT_COLUMNS} WHERE import_id = $1");
    let row = sqlx::query(&query)
        .bind(import_id)
        .fetch_optional(pool)
        .await?
        .ok_or(SyncError::NotFound(import_id))?;
    ImportedFile::from_row(&row)
}

pub async fn list(pool: &DbPool) -> Result<Vec<ImportedFile>> {
    let query = format!("{SELECT_COLUMNS} ORDER BY import_id");
    let rows = sqlx::query(&query).fetch_all(pool).await?;
    rows.iter().map(ImportedFile::from_row).collect()
}

/// Records a transmission id discovered while importing, unless the row
/// already has one or another row owns the same id. Returns whether it was written.
pub async fn set_transmission_id(
    conn: &mut SqliteConnection,
    import_id: i64,
    transmission_id: &str,
) -> Result<bool> {
    let result = sqlx::query(
        r#"
            UPDATE imported_files
            SET transmission_id = $1
            WHERE import_id = $2
              AND transmission_id IS NULL
              AND NOT EXISTS (
                  SELECT 1 FROM imported_files WHERE transmission_id = $1
              )
        "#,
    )
    .bind(transmission_id)
    .bind(import_id)
    .execute(&mut *conn)
    .await?;

    Ok(result.rows_affected() == 1)
}

pub async fn mark_done(pool: &DbPool, import_id: i64) -> Result<()> {
    sqlx::query(
        r#"
            UPDATE imported_files
            SET status = 'done', last_error = NULL, processed_at = $1
            WHERE import_id = $2
        "#,
    )
    .bind(Utc::now())
    .bind(import_id)
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn mark_error(pool: &DbPool, import_id: i64, message: &str) -> Result<()> {
    sqlx::query(
        r#"
            UPDATE imported_files
            SET status = 'error', last_error = $1
            WHERE import_id = $2
        "#,
    )
    .bind(message)
    .bind(import_id)
    .execute(pool)
    .await?;
    Ok(())
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ResetSummary {
    pub files: u64,
    pub staging_products: u64,
    pub staging_stock: u64,
}

/// Administrative reset: the only path that deletes ledger rows.
pub async fn reset(pool: &DbPool) -> Result<ResetSummary> {
    let mut tx = pool.begin().await?;

    let staging_stock = sqlx::query("DELETE FROM staging_stock")
        .execute(&mut *tx)
        .await?
        .rows_affected();
    let staging_products = sqlx::query("DELETE FROM staging_products")
        .execute(&mut *tx)
        .await?
        .rows_affected();
    let files = sqlx::query("DELETE FROM imported_files")
        .execute(&mut *tx)
        .await?
        .rows_affected();

    tx.commit().await?;

    Ok(ResetSummary {
        files,
        staging_products,
        staging_stock,
    })
}
