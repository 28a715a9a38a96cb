use std::fmt;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Result, SyncError};

pub const DEFAULT_REMOTE_FIELDS: &str = "id,sku,name,regular_price,sale_price,stock_quantity,manage_stock,status,date_modified_gmt,type,hurt_price,ean";

const DEFAULT_POLL_SECS: i64 = 10;
const MAX_PER_PAGE: u32 = 100;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub database_url: String,
    pub importer: ImporterConfig,
    pub remote: RemoteConfig,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            database_url: "sqlite://stocksync.db".to_string(),
            importer: ImporterConfig::default(),
            remote: RemoteConfig::default(),
        }
    }
}

impl AppConfig {
    pub fn from_toml_str(raw: &str) -> Result<Self> {
        let config: AppConfig =
            toml::from_str(raw).map_err(|err| SyncError::Config(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Reads `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(raw) => Self::from_toml_str(&raw),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => Ok(Self::default()),
            Err(err) => Err(err.into()),
        }
    }

    /// `STOCKSYNC_DATABASE_URL` wins over `DATABASE_URL`, which wins over the file.
    pub fn apply_env(&mut self) {
        if let Ok(url) =
            std::env::var("STOCKSYNC_DATABASE_URL").or_else(|_| std::env::var("DATABASE_URL"))
        {
            if !url.trim().is_empty() {
                self.database_url = url;
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.importer.batch_size == 0 {
            return Err(SyncError::Config("importer.batch_size must be positive".into()));
        }
        if self.remote.enabled {
            self.remote.validate()?;
        }
        Ok(())
    }
}

/// Which existing link issues the linker deletes before re-deriving them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssuePurgeScope {
    /// Every issue, regardless of which import produced it.
    #[default]
    Global,
    /// Only issues recorded by the import currently being linked.
    File,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ImporterConfig {
    pub enabled: bool,
    pub watch_dir: String,
    pub poll_secs: i64,
    pub file_prefix: String,
    pub extensions: Vec<String>,
    pub batch_size: usize,
    pub issue_purge_scope: IssuePurgeScope,
}

impl Default for ImporterConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            watch_dir: "./imports".to_string(),
            poll_secs: DEFAULT_POLL_SECS,
            file_prefix: "exp_wyk_".to_string(),
            extensions: vec!["xml".to_string(), "zip".to_string()],
            batch_size: 500,
            issue_purge_scope: IssuePurgeScope::Global,
        }
    }
}

impl ImporterConfig {
    pub fn poll_interval(&self) -> Duration {
        let secs = if self.poll_secs <= 0 {
            DEFAULT_POLL_SECS
        } else {
            self.poll_secs
        };
        Duration::from_secs(secs as u64)
    }

    pub fn watch_dir_path(&self) -> PathBuf {
        expand_home(&self.watch_dir)
    }
}

#[derive(Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    pub enabled: bool,
    pub base_url: String,
    pub products_path: String,
    pub consumer_key: String,
    pub consumer_secret: String,
    pub user_agent: String,
    pub request_timeout_secs: u64,
    pub per_page: u32,
    pub fields: String,
    pub prime_on_start: bool,
    pub sweep_interval_minutes: i64,
    pub lookback_hours: i64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            base_url: String::new(),
            products_path: "/wp-json/wc/v3/products".to_string(),
            consumer_key: String::new(),
            consumer_secret: String::new(),
            user_agent: concat!("stocksync/", env!("CARGO_PKG_VERSION")).to_string(),
            request_timeout_secs: 20,
            per_page: MAX_PER_PAGE,
            fields: DEFAULT_REMOTE_FIELDS.to_string(),
            prime_on_start: false,
            sweep_interval_minutes: 360,
            lookback_hours: 24,
        }
    }
}

impl fmt::Debug for RemoteConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RemoteConfig")
            .field("enabled", &self.enabled)
            .field("base_url", &self.base_url)
            .field("products_path", &self.products_path)
            .field("consumer_key", &self.consumer_key)
            .field("consumer_secret", &"<redacted>")
            .field("per_page", &self.per_page)
            .field("sweep_interval_minutes", &self.sweep_interval_minutes)
            .field("lookback_hours", &self.lookback_hours)
            .finish_non_exhaustive()
    }
}

impl RemoteConfig {
    pub fn validate(&self) -> Result<()> {
        if self.base_url.trim().is_empty() {
            return Err(SyncError::Config("remote.base_url must be set".into()));
        }
        if self.per_page == 0 || self.per_page > MAX_PER_PAGE {
            return Err(SyncError::Config(format!(
                "remote.per_page must be between 1 and {MAX_PER_PAGE}"
            )));
        }
        if self.request_timeout_secs == 0 {
            return Err(SyncError::Config(
                "remote.request_timeout_secs must be positive".into(),
            ));
        }
        Ok(())
    }

    /// `None` disables the periodic sweeper.
    pub fn sweep_interval(&self) -> Option<Duration> {
        if self.sweep_interval_minutes <= 0 {
            None
        } else {
            Some(Duration::from_secs(self.sweep_interval_minutes as u64 * 60))
        }
    }

    pub fn lookback(&self) -> chrono::Duration {
        chrono::Duration::hours(self.lookback_hours.max(0))
    }

    pub fn request_fields(&self) -> &str {
        if self.fields.trim().is_empty() {
            DEFAULT_REMOTE_FIELDS
        } else {
            &self.fields
        }
    }
}

fn expand_home(raw: &str) -> PathBuf {
    if let Some(rest) = raw.strip_prefix('~') {
        let home = std::env::var_os("HOME").or_else(|| std::env::var_os("USERPROFILE"));
        if let Some(home) = home {
            return PathBuf::from(home).join(rest.trim_start_matches(['/', '\\']));
        }
    }
    PathBuf::from(raw)
}
