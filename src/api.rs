//! Remote catalog access.
//!
//! One [`HttpCatalog`] is built at startup from the [`ApiConfig`] and passed
//! to whoever needs it; there is no process-wide client. The [`CatalogSource`]
//! trait is the seam the feed talks through, so tests can substitute an
//! in-memory catalog.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::{DateTime, Local};
use serde::Deserialize;

use crate::config::ApiConfig;
use crate::error::FetchError;
use crate::memory::{self, MemoryBudget};

/// One catalog entry. Immutable once deserialized.
#[derive(Debug, Clone, Deserialize)]
pub struct Item {
    pub id: String,
    #[serde(deserialize_with = "zoned_to_local")]
    pub created_at: DateTime<Local>,
    pub tags: Vec<String>,
}

/// Offset/limit pair for one page fetch. Derived per call, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PageRequest {
    pub offset: usize,
    pub limit: usize,
}

/// Raw asset body as served, before decoding.
#[derive(Debug, Clone)]
pub struct RawAsset {
    pub bytes: Bytes,
    pub content_type: String,
}

/// Remote source of catalog pages and asset bytes.
///
/// Implementations surface errors to the caller and never log payloads or
/// retry; retry policy belongs to whoever re-requests.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    async fn fetch_page(&self, offset: usize, limit: usize) -> Result<Vec<Item>, FetchError>;
    async fn fetch_asset_bytes(&self, id: &str) -> Result<RawAsset, FetchError>;
}

/// HTTP implementation of [`CatalogSource`].
pub struct HttpCatalog {
    client: reqwest::Client,
    base_url: String,
    collection: String,
    singular: String,
    budget: Arc<dyn MemoryBudget>,
}

impl HttpCatalog {
    pub fn new(config: &ApiConfig, budget: Arc<dyn MemoryBudget>) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            collection: config.collection.clone(),
            singular: config.singular.clone(),
            budget,
        }
    }

    /// Canonical URL for one asset, e.g. `https://cataas.com/cat/{id}`.
    pub fn asset_url(&self, id: &str) -> String {
        format!("{}/{}/{}", self.base_url, self.singular, id)
    }

    fn page_url(&self) -> String {
        format!("{}/api/{}", self.base_url, self.collection)
    }
}

#[async_trait]
impl CatalogSource for HttpCatalog {
    async fn fetch_page(&self, offset: usize, limit: usize) -> Result<Vec<Item>, FetchError> {
        let response = self
            .client
            .get(self.page_url())
            .query(&[("skip", offset), ("limit", limit)])
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?
            .error_for_status()
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let body = response
            .text()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        serde_json::from_str(&body).map_err(|e| FetchError::Format(e.to_string()))
    }

    async fn fetch_asset_bytes(&self, id: &str) -> Result<RawAsset, FetchError> {
        let response = self
            .client
            .get(self.asset_url(id))
            .send()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?
            .error_for_status()
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("image/jpeg")
            .to_string();

        // Admission check against the declared length before buffering the
        // body. A response without Content-Length is admitted as-is.
        memory::admit(self.budget.as_ref(), response.content_length())?;

        let bytes = response
            .bytes()
            .await
            .map_err(|e| FetchError::Transport(e.to_string()))?;

        Ok(RawAsset {
            bytes,
            content_type,
        })
    }
}

/// Parse a zoned ISO-8601 timestamp and normalize it to local time.
fn zoned_to_local<'de, D>(deserializer: D) -> Result<DateTime<Local>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|dt| dt.with_timezone(&Local))
        .map_err(serde::de::Error::custom)
}
