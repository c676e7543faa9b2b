//! Fetching items from the election-reporting API.

use crate::error::error_type_str;
use crate::{NON_PAGINATED_LIMIT, REQUEST_TIMEOUT_SECS, SyncError, SyncResult};
use log::debug;
use reqwest::blocking::Client;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;

/// Which page to ask for, and how large.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct PageRequest {
    pub page: u32,
    pub per_page: u32,
}

/// Pagination metadata as reported by the source.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pagination {
    #[serde(default)]
    pub page: Option<u32>,
    #[serde(default)]
    pub total_pages: Option<u32>,
}

/// One response worth of items.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SourcePage {
    pub items: Vec<Value>,
    pub pagination: Option<Pagination>,
}

impl SourcePage {
    /// Pull `data.<array_field>` and `data.pagination` out of a response envelope.
    /// A missing array is an empty page, not an error. A lone object (as
    /// snapshot endpoints return) is a page of one.
    #[must_use]
    pub fn from_envelope(envelope: &Value, array_field: &str) -> Self {
        let data = envelope.get("data");
        let items = match data.and_then(|d| d.get(array_field)) {
            Some(Value::Array(items)) => items.clone(),
            Some(item @ Value::Object(_)) => vec![item.clone()],
            _ => Vec::new(),
        };
        let pagination = data
            .and_then(|d| d.get("pagination"))
            .and_then(|p| serde_json::from_value(p.clone()).ok());
        Self { items, pagination }
    }
}

/// Anything that can hand out pages of source items.
pub trait Source {
    /// Fetch one page (or the whole list when `page` is `None`) from `endpoint`.
    fn fetch(
        &self,
        endpoint: &str,
        array_field: &str,
        page: Option<PageRequest>,
    ) -> SyncResult<SourcePage>;
}

/// Bearer-token HTTP client for the reporting API.
pub struct SourceClient {
    client: Client,
    token: String,
}

impl SourceClient {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(token: &str) -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| SyncError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            token: token.to_string(),
        })
    }
}

impl Source for SourceClient {
    fn fetch(
        &self,
        endpoint: &str,
        array_field: &str,
        page: Option<PageRequest>,
    ) -> SyncResult<SourcePage> {
        let query = match page {
            Some(p) => vec![
                ("page", p.page.to_string()),
                ("per_page", p.per_page.to_string()),
            ],
            None => vec![("limit", NON_PAGINATED_LIMIT.to_string())],
        };
        debug!("GET {endpoint} {query:?}");

        let response = self
            .client
            .get(endpoint)
            .bearer_auth(&self.token)
            .query(&query)
            .send()
            .map_err(|e| {
                SyncError::fetch(endpoint, format!("network error ({}): {e}", error_type_str(&e)))
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let msg = response.text().unwrap_or_default();
            return Err(SyncError::fetch(
                endpoint,
                format!("source returned {status}: {msg}"),
            ));
        }

        let envelope: Value = response
            .json()
            .map_err(|e| SyncError::fetch(endpoint, format!("could not decode response: {e}")))?;
        Ok(SourcePage::from_envelope(&envelope, array_field))
    }
}
