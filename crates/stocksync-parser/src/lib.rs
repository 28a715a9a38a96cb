pub mod archive;
pub mod encoding;
pub mod errors;
pub mod fields;
pub mod header;
pub mod model;
pub mod reader;
pub mod schema;

pub use archive::{is_archive, with_export_stream};
pub use errors::ParserError;
pub use header::{peek_transmission_id, read_transmission_id};
pub use model::{ExportItem, ProductRecord, StockRecord};
pub use reader::ExportReader;
