//! The local mirror of the remote catalog (`remote_product_cache`).

use sqlx::{QueryBuilder, Sqlite, SqliteConnection};

use super::model::RemoteProduct;
use crate::error::Result;

/// A mirror row reduced to what the linker needs.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct RemoteCode {
    pub remote_id: i64,
    pub ean: String,
}

#[derive(Debug, Clone, PartialEq, sqlx::FromRow)]
pub struct CachedProduct {
    pub remote_id: i64,
    pub product_id: Option<i64>,
    pub sku: String,
    pub ean: String,
    pub name: String,
    pub price_regular: f64,
    pub price_sale: f64,
    pub price_wholesale: f64,
    pub stock_qty: f64,
    pub stock_managed: bool,
    pub status: String,
    pub item_type: String,
    pub modified_at: String,
}

/// Inserts or refreshes every item by remote id. The `product_id`
/// cross-reference is owned by the linker and never touched here.
pub async fn upsert(conn: &mut SqliteConnection, items: &[RemoteProduct]) -> Result<u64> {
    if items.is_empty() {
        return Ok(0);
    }

    let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
        "INSERT INTO remote_product_cache (remote_id, sku, ean, name, price_regular, price_sale, \
         price_wholesale, stock_qty, stock_managed, status, item_type, modified_at) ",
    );
    builder.push_values(items, |mut row, item| {
        row.push_bind(item.id)
            .push_bind(&item.sku)
            .push_bind(&item.ean)
            .push_bind(&item.name)
            .push_bind(item.regular_price)
            .push_bind(item.sale_price)
            .push_bind(item.wholesale_price)
            .push_bind(item.stock_quantity)
            .push_bind(item.manage_stock)
            .push_bind(&item.status)
            .push_bind(&item.item_type)
            .push_bind(&item.modified);
    });
    builder.push(
        " ON CONFLICT (remote_id) DO UPDATE SET \
         sku = excluded.sku, \
         ean = excluded.ean, \
         name = excluded.name, \
         price_regular = excluded.price_regular, \
         price_sale = excluded.price_sale, \
         price_wholesale = excluded.price_wholesale, \
         stock_qty = excluded.stock_qty, \
         stock_managed = excluded.stock_managed, \
         status = excluded.status, \
         item_type = excluded.item_type, \
         modified_at = excluded.modified_at",
    );

    Ok(builder.build().execute(&mut *conn).await?.rows_affected())
}

pub async fn count(conn: &mut SqliteConnection) -> Result<i64> {
    let (total,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM remote_product_cache")
        .fetch_one(&mut *conn)
        .await?;
    Ok(total)
}

pub async fn load_codes(conn: &mut SqliteConnection) -> Result<Vec<RemoteCode>> {
    let rows = sqlx::query_as::<_, RemoteCode>(
        "SELECT remote_id, ean FROM remote_product_cache ORDER BY remote_id",
    )
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}

pub async fn set_product_link(
    conn: &mut SqliteConnection,
    remote_id: i64,
    product_id: i64,
) -> Result<()> {
    sqlx::query("UPDATE remote_product_cache SET product_id = $1 WHERE remote_id = $2")
        .bind(product_id)
        .bind(remote_id)
        .execute(&mut *conn)
        .await?;
    Ok(())
}

pub async fn fetch(conn: &mut SqliteConnection, remote_id: i64) -> Result<Option<CachedProduct>> {
    let row = sqlx::query_as::<_, CachedProduct>(
        r#"
            SELECT remote_id, product_id, sku, ean, name, price_regular, price_sale,
                   price_wholesale, stock_qty, stock_managed, status, item_type, modified_at
            FROM remote_product_cache
            WHERE remote_id = $1
        "#,
    )
    .bind(remote_id)
    .fetch_optional(&mut *conn)
    .await?;
    Ok(row)
}
