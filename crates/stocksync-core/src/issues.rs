//! Persisted reconciliation discrepancies (`link_issues`).

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::sqlite::SqliteRow;
use sqlx::{Executor, Row, Sqlite, SqliteConnection};

use crate::config::IssuePurgeScope;
use crate::error::{Result, SyncError};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueReason {
    /// The local product code has no digits at all.
    MissingEanSrc,
    /// No remote entry carries the local code.
    MissingInShopByEan,
    /// Several remote entries carry the local code.
    DuplicateEanShop,
    /// A remote code that no staged product carries.
    MissingInMagazineByEan,
}

impl IssueReason {
    pub const ALL: [IssueReason; 4] = [
        IssueReason::MissingEanSrc,
        IssueReason::MissingInShopByEan,
        IssueReason::DuplicateEanShop,
        IssueReason::MissingInMagazineByEan,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            IssueReason::MissingEanSrc => "missing_ean_src",
            IssueReason::MissingInShopByEan => "missing_in_shop_by_ean",
            IssueReason::DuplicateEanShop => "duplicate_ean_shop",
            IssueReason::MissingInMagazineByEan => "missing_in_magazine_by_ean",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|reason| reason.as_str() == value)
    }
}

/// An issue derived by the linker, not yet written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewIssue {
    pub product_id: i64,
    pub reason: IssueReason,
    /// Normalized (digits only) code; part of the de-duplication key.
    pub code: String,
    pub raw_code: String,
    pub remote_ids: Vec<i64>,
    pub details: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkIssue {
    pub issue_id: i64,
    pub import_id: Option<i64>,
    pub product_id: i64,
    pub reason: IssueReason,
    pub code: String,
    pub raw_code: String,
    pub remote_ids: Vec<i64>,
    pub details: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl LinkIssue {
    fn from_row(row: &SqliteRow) -> Result<Self> {
        let reason: String = row.try_get("reason")?;
        let remote_ids: String = row.try_get("remote_ids")?;
        Ok(Self {
            issue_id: row.try_get("issue_id")?,
            import_id: row.try_get("import_id")?,
            product_id: row.try_get("product_id")?,
            reason: IssueReason::parse(&reason)
                .ok_or_else(|| SyncError::Config(format!("unknown link issue reason '{reason}'")))?,
            code: row.try_get("code")?,
            raw_code: row.try_get("raw_code")?,
            remote_ids: serde_json::from_str(&remote_ids)?,
            details: row.try_get("details")?,
            created_at: row.try_get("created_at")?,
            updated_at: row.try_get("updated_at")?,
        })
    }
}

pub async fn purge(
    conn: &mut SqliteConnection,
    scope: IssuePurgeScope,
    import_id: i64,
) -> Result<u64> {
    let result = match scope {
        IssuePurgeScope::Global => sqlx::query("DELETE FROM link_issues").execute(&mut *conn).await?,
        IssuePurgeScope::File => {
            sqlx::query("DELETE FROM link_issues WHERE import_id = $1")
                .bind(import_id)
                .execute(&mut *conn)
                .await?
        }
    };
    Ok(result.rows_affected())
}

/// Inserts the issue, or refreshes the row already holding its
/// `(product_id, reason, code)` key.
pub async fn upsert(
    conn: &mut SqliteConnection,
    import_id: i64,
    issue: &NewIssue,
    now: DateTime<Utc>,
) -> Result<()> {
    let remote_ids = serde_json::to_string(&issue.remote_ids)?;
    sqlx::query(
        r#"
            INSERT INTO link_issues
                (import_id, product_id, reason, code, raw_code, remote_ids, details, created_at, updated_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $8)
            ON CONFLICT (product_id, reason, code) DO UPDATE SET
                import_id = excluded.import_id,
                raw_code = excluded.raw_code,
                remote_ids = excluded.remote_ids,
                details = excluded.details,
                updated_at = excluded.updated_at
        "#,
    )
    .bind(import_id)
    .bind(issue.product_id)
    .bind(issue.reason.as_str())
    .bind(&issue.code)
    .bind(&issue.raw_code)
    .bind(remote_ids)
    .bind(&issue.details)
    .bind(now)
    .execute(&mut *conn)
    .await?;
    Ok(())
}

pub async fn list<'c, E>(executor: E, reason: Option<IssueReason>) -> Result<Vec<LinkIssue>>
where
    E: Executor<'c, Database = Sqlite>,
{
    let rows = sqlx::query(
        r#"
            SELECT issue_id, import_id, product_id, reason, code, raw_code, remote_ids,
                   details, created_at, updated_at
            FROM link_issues
            WHERE $1 IS NULL OR reason = $1
            ORDER BY reason, product_id, code
        "#,
    )
    .bind(reason.map(|reason| reason.as_str()))
    .fetch_all(executor)
    .await?;

    rows.iter().map(LinkIssue::from_row).collect()
}

#[cfg(test)]
mod tests {
    use super::IssueReason;

    #[test]
    fn reason_names_round_trip() {
        for reason in IssueReason::ALL {
            assert_eq!(IssueReason::parse(reason.as_str()), Some(reason));
        }
        assert_eq!(IssueReason::parse("something_else"), None);
    }
}
