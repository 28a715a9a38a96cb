/// One `<towar>` element, decoded with lenient numeric and flag parsing.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProductRecord {
    pub product_id: i64,
    pub code: String,
    pub name: String,
    pub description: String,
    pub vat_id: i64,
    pub category_id: i64,
    pub group_id: i64,
    pub unit_id: i64,
    pub price_retail: f64,
    pub price_wholesale: f64,
    pub price_night: f64,
    pub price_extra: f64,
    pub price_retail_before_promo: f64,
    pub lowest_price_30d: f64,
    pub marked_for_deletion: bool,
    pub active: bool,
    pub last_update: String,
    pub image_folder: String,
    pub image_file: String,
    pub stock: Vec<StockRecord>,
}

#[derive(Debug, Clone, PartialEq, Default)]
pub struct StockRecord {
    pub warehouse_id: i64,
    pub quantity: f64,
    pub reserved: f64,
}

/// Items yielded by [`crate::ExportReader`] in document order.
#[derive(Debug, Clone, PartialEq)]
pub enum ExportItem {
    TransmissionId(String),
    Product(ProductRecord),
}
