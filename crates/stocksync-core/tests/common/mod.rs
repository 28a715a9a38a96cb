#![allow(dead_code)]

use std::path::{Path, PathBuf};

use anyhow::Result;
use stocksync_core::db::{self, DbPool};
use stocksync_core::ledger::{self, NewImportedFile};
use stocksync_core::remote::{cache, RemoteProduct};

pub async fn memory_pool() -> Result<DbPool> {
    let pool = db::connect_in_memory().await?;
    db::run_migrations(&pool).await?;
    Ok(pool)
}

pub fn fixture_path(name: &str) -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .join("../stocksync-parser/tests/data")
        .join(name)
}

/// A minimal export with one `<towar>` per `(product_id, code)`; each product
/// gets a single warehouse row.
pub fn export_xml(transmission_id: Option<&str>, products: &[(i64, &str)]) -> String {
    let mut xml = String::from("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<dane>\n");
    if let Some(transmission_id) = transmission_id {
        xml.push_str(&format!("  <transmisja_id>{transmission_id}</transmisja_id>\n"));
    }
    xml.push_str("  <towary>\n");
    for (product_id, code) in products {
        xml.push_str(&format!(
            "    <towar><towar_id>{product_id}</towar_id><kod>{code}</kod><nazwa>Produkt {product_id}</nazwa>\
             <cena_detal>1,50</cena_detal><magazyny><magazyn><magazyn_id>1</magazyn_id>\
             <stan_magazynu>5</stan_magazynu></magazyn></magazyny></towar>\n"
        ));
    }
    xml.push_str("  </towary>\n</dane>\n");
    xml
}

pub fn write_file(dir: &Path, name: &str, contents: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, contents).expect("write export");
    path
}

/// Ledger row without touching the filesystem, for tests that stage directly.
pub async fn ledger_row(pool: &DbPool, filename: &str) -> Result<i64> {
    let import_id = ledger::insert_pending(
        pool,
        &NewImportedFile {
            filename: filename.to_string(),
            captured_at: None,
            transmission_id: None,
            sha256: format!("sha-of-{filename}"),
            size_bytes: 0,
        },
    )
    .await?;
    Ok(import_id)
}

pub fn remote_product(id: i64, ean: &str, modified: &str) -> RemoteProduct {
    RemoteProduct {
        id,
        sku: format!("SKU-{id}"),
        ean: ean.to_string(),
        name: format!("Remote {id}"),
        status: "publish".to_string(),
        item_type: "simple".to_string(),
        regular_price: 10.0,
        sale_price: 0.0,
        wholesale_price: 8.0,
        stock_quantity: 3.0,
        manage_stock: true,
        modified: modified.to_string(),
    }
}

pub async fn seed_remote(pool: &DbPool, entries: &[(i64, &str)]) -> Result<()> {
    let items: Vec<RemoteProduct> = entries
        .iter()
        .map(|(id, ean)| remote_product(*id, ean, "2024-03-01T00:00:00"))
        .collect();
    let mut conn = pool.acquire().await?;
    cache::upsert(&mut conn, &items).await?;
    Ok(())
}

pub async fn count(pool: &DbPool, sql: &str) -> Result<i64> {
    let (value,): (i64,) = sqlx::query_as(sql).fetch_one(pool).await?;
    Ok(value)
}
