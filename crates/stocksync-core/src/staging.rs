//! Staging tables: the decoded contents of one import, keyed by `import_id`.

use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use stocksync_parser::{ProductRecord, StockRecord};

use crate::error::Result;

/// SQLite's default `SQLITE_MAX_VARIABLE_NUMBER`.
const MAX_BIND_VARIABLES: usize = 32_766;
const PRODUCT_COLUMNS: usize = 20;
const STOCK_COLUMNS: usize = 5;

/// A staged product reduced to what the linker needs.
#[derive(Debug, Clone, PartialEq, Eq, sqlx::FromRow)]
pub struct StagedCode {
    pub product_id: i64,
    pub code: String,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PurgedRows {
    pub products: u64,
    pub stock: u64,
}

/// Removes every staging row of `import_id`, stock first.
pub async fn purge(conn: &mut SqliteConnection, import_id: i64) -> Result<PurgedRows> {
    let stock = sqlx::query("DELETE FROM staging_stock WHERE import_id = $1")
        .bind(import_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();
    let products = sqlx::query("DELETE FROM staging_products WHERE import_id = $1")
        .bind(import_id)
        .execute(&mut *conn)
        .await?
        .rows_affected();
    Ok(PurgedRows { products, stock })
}

/// Multi-row `INSERT`s, split so no statement exceeds the bind variable limit.
/// Returns rows written.
pub async fn insert_products(
    conn: &mut SqliteConnection,
    import_id: i64,
    batch: &[ProductRecord],
) -> Result<u64> {
    let mut written = 0;
    for chunk in batch.chunks(MAX_BIND_VARIABLES / PRODUCT_COLUMNS) {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "INSERT INTO staging_products (import_id, product_id, code, name, description, \
             vat_id, category_id, group_id, unit_id, price_retail, price_wholesale, price_night, \
             price_extra, price_retail_before_promo, lowest_price_30d, active, marked_for_deletion, \
             last_update, image_folder, image_file) ",
        );
        builder.push_values(chunk, |mut row, product| {
            row.push_bind(import_id)
                .push_bind(product.product_id)
                .push_bind(&product.code)
                .push_bind(&product.name)
                .push_bind(&product.description)
                .push_bind(product.vat_id)
                .push_bind(product.category_id)
                .push_bind(product.group_id)
                .push_bind(product.unit_id)
                .push_bind(product.price_retail)
                .push_bind(product.price_wholesale)
                .push_bind(product.price_night)
                .push_bind(product.price_extra)
                .push_bind(product.price_retail_before_promo)
                .push_bind(product.lowest_price_30d)
                .push_bind(product.active)
                .push_bind(product.marked_for_deletion)
                .push_bind(&product.last_update)
                .push_bind(&product.image_folder)
                .push_bind(&product.image_file);
        });
        written += builder.build().execute(&mut *conn).await?.rows_affected();
    }
    Ok(written)
}

pub async fn insert_stock(
    conn: &mut SqliteConnection,
    import_id: i64,
    batch: &[(i64, StockRecord)],
) -> Result<u64> {
    let mut written = 0;
    for chunk in batch.chunks(MAX_BIND_VARIABLES / STOCK_COLUMNS) {
        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new(
            "INSERT INTO staging_stock (import_id, product_id, warehouse_id, quantity, reserved) ",
        );
        builder.push_values(chunk, |mut row, (product_id, stock)| {
            row.push_bind(import_id)
                .push_bind(*product_id)
                .push_bind(stock.warehouse_id)
                .push_bind(stock.quantity)
                .push_bind(stock.reserved);
        });
        written += builder.build().execute(&mut *conn).await?.rows_affected();
    }
    Ok(written)
}

pub async fn load_codes(conn: &mut SqliteConnection, import_id: i64) -> Result<Vec<StagedCode>> {
    let rows = sqlx::query_as::<_, StagedCode>(
        "SELECT product_id, code FROM staging_products WHERE import_id = $1 ORDER BY product_id",
    )
    .bind(import_id)
    .fetch_all(&mut *conn)
    .await?;
    Ok(rows)
}
