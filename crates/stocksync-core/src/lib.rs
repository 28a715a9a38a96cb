pub mod config;
pub mod db;
pub mod error;
pub mod fingerprint;
pub mod importer;
pub mod issues;
pub mod kv;
pub mod ledger;
pub mod linker;
pub mod registrar;
pub mod remote;
pub mod runtime;
pub mod staging;
pub mod timefmt;

pub use config::{AppConfig, ImporterConfig, IssuePurgeScope, RemoteConfig};
pub use db::DbPool;
pub use error::{Result, SyncError};
pub use importer::{import_file, scan_once, ImportSummary, ScanReport};
pub use linker::{link_import, LinkReport};
pub use registrar::{register_file, Registration};
pub use runtime::{Component, PollTimer, Supervisor};
