use serde::{Deserialize, Deserializer};
use serde_json::Value;
use stocksync_parser::fields::parse_decimal;

/// One item of the remote products collection, restricted to the mirrored fields.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct RemoteProduct {
    pub id: i64,
    #[serde(default, deserialize_with = "lenient_string")]
    pub sku: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub ean: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: String,
    #[serde(default, deserialize_with = "lenient_string")]
    pub status: String,
    #[serde(default, rename = "type", deserialize_with = "lenient_string")]
    pub item_type: String,
    #[serde(default, deserialize_with = "lenient_number")]
    pub regular_price: f64,
    #[serde(default, deserialize_with = "lenient_number")]
    pub sale_price: f64,
    #[serde(default, rename = "hurt_price", deserialize_with = "lenient_number")]
    pub wholesale_price: f64,
    #[serde(default, deserialize_with = "lenient_number")]
    pub stock_quantity: f64,
    #[serde(default, deserialize_with = "lenient_bool")]
    pub manage_stock: bool,
    #[serde(default, rename = "date_modified_gmt", deserialize_with = "lenient_string")]
    pub modified: String,
}

fn lenient_string<'de, D>(deserializer: D) -> Result<String, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(text)) => text,
        Some(Value::Number(number)) => number.to_string(),
        Some(Value::Bool(flag)) => flag.to_string(),
        _ => String::new(),
    })
}

/// Decimal strings ("12,50", "") and bare numbers both land here; anything else is 0.
fn lenient_number<'de, D>(deserializer: D) -> Result<f64, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Number(number)) => number.as_f64().unwrap_or(0.0),
        Some(Value::String(text)) => parse_decimal(&text),
        _ => 0.0,
    })
}

fn lenient_bool<'de, D>(deserializer: D) -> Result<bool, D::Error>
where
    D: Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::Bool(flag)) => flag,
        Some(Value::Number(number)) => number.as_i64() == Some(1),
        Some(Value::String(text)) => {
            matches!(text.trim().to_ascii_lowercase().as_str(), "true" | "1" | "yes")
        }
        _ => false,
    })
}
