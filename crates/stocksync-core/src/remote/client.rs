use std::time::Duration;

use reqwest::Client;
use tracing::debug;

use super::model::RemoteProduct;
use crate::config::RemoteConfig;
use crate::error::{Result, SyncError};

/// Read-only client for the storefront's paginated products collection.
#[derive(Clone)]
pub struct CatalogClient {
    http: Client,
    endpoint: String,
    consumer_key: String,
    consumer_secret: String,
    per_page: u32,
    fields: String,
}

impl CatalogClient {
    pub fn new(config: &RemoteConfig) -> Result<Self> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.request_timeout_secs))
            .user_agent(config.user_agent.clone())
            .build()?;

        Ok(Self {
            http,
            endpoint: join_endpoint(&config.base_url, &config.products_path),
            consumer_key: config.consumer_key.clone(),
            consumer_secret: config.consumer_secret.clone(),
            per_page: config.per_page,
            fields: config.request_fields().to_string(),
        })
    }

    pub fn per_page(&self) -> u32 {
        self.per_page
    }

    /// Fetches one page (1-based) sorted by modification time, newest first.
    pub async fn fetch_page(&self, page: u32) -> Result<Vec<RemoteProduct>> {
        let per_page = self.per_page.to_string();
        let page_number = page.to_string();

        let response = self
            .http
            .get(&self.endpoint)
            .basic_auth(&self.consumer_key, Some(&self.consumer_secret))
            .query(&[
                ("orderby", "modified"),
                ("order", "desc"),
                ("per_page", per_page.as_str()),
                ("page", page_number.as_str()),
                ("_fields", self.fields.as_str()),
            ])
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::HttpStatus {
                status: status.as_u16(),
                page,
            });
        }

        let body = response.bytes().await?;
        let items: Vec<RemoteProduct> = serde_json::from_slice(&body)?;
        debug!(page, items = items.len(), "fetched remote catalog page");
        Ok(items)
    }
}

fn join_endpoint(base_url: &str, path: &str) -> String {
    let base = base_url.trim_end_matches('/');
    let path = path.trim_start_matches('/');
    format!("{base}/{path}")
}
