//! Element names used by the stock export. Matching is ASCII case-insensitive,
//! so every constant here is stored lowercase.

pub const TRANSMISSION_ID: &str = "transmisja_id";
pub const PRODUCT_LIST: &str = "towary";
pub const PRODUCT: &str = "towar";
pub const STOCK_LIST: &str = "magazyny";
pub const STOCK: &str = "magazyn";

pub mod product {
    pub const ID: &str = "towar_id";
    pub const CODE: &str = "kod";
    pub const NAME: &str = "nazwa";
    pub const DESCRIPTION: &str = "opis1";
    pub const VAT_ID: &str = "vat_id";
    pub const CATEGORY_ID: &str = "kategoria_id";
    pub const GROUP_ID: &str = "asortyment_id";
    pub const UNIT_ID: &str = "jm_id";
    pub const MARKED_FOR_DELETION: &str = "do_usuniecia";
    pub const ACTIVE: &str = "aktywny_w_si";
    pub const PRICE_RETAIL: &str = "cena_detal";
    pub const PRICE_WHOLESALE: &str = "cena_hurtowa";
    pub const PRICE_NIGHT: &str = "cena_nocna";
    pub const PRICE_EXTRA: &str = "cena_dodatkowa";
    pub const PRICE_RETAIL_BEFORE_PROMO: &str = "cena_detal_przed_prom";
    pub const LOWEST_PRICE_30D: &str = "najnizsza_cena_30_dni_detal";
    pub const IMAGE_FOLDER: &str = "folder_zdjec";
    pub const IMAGE_FILE: &str = "plik_zdjecia";
    pub const LAST_UPDATE: &str = "data_aktualizacji";
}

pub mod stock {
    pub const WAREHOUSE_ID: &str = "magazyn_id";
    pub const QUANTITY: &str = "stan_magazynu";
    pub const RESERVED: &str = "rezerwacja_ilosci";
}
