//! Record store backed by a PocketBase REST API.

use super::{Filter, RecordStore, StoredRecord};
use crate::auth::{Authenticator, Credentials, Session};
use crate::error::error_type_str;
use crate::{REQUEST_TIMEOUT_SECS, STORE_LIST_PAGE_SIZE, SyncError, SyncResult};
use log::debug;
use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder, Response};
use serde::Deserialize;
use serde_json::{Map, Value};
use std::time::Duration;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    page: u32,
    #[serde(default)]
    total_pages: u32,
    #[serde(default)]
    items: Vec<StoredRecord>,
}

pub struct PocketStore {
    base_url: String,
    client: Client,
    auth: Authenticator,
}

impl PocketStore {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(base_url: &str, credentials: Credentials) -> SyncResult<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()
            .map_err(|e| SyncError::Config(format!("failed to build HTTP client: {e}")))?;
        let base_url = base_url.trim_end_matches('/').to_string();
        Ok(Self {
            auth: Authenticator::new(&base_url, credentials),
            base_url,
            client,
        })
    }

    /// Obtain (or reuse) a session for subsequent requests.
    pub fn authenticate(&mut self) -> SyncResult<&Session> {
        self.auth.authenticate(&self.client)
    }

    fn records_url(&self, collection: &str) -> String {
        format!("{}/api/collections/{collection}/records", self.base_url)
    }

    fn authorized(&self, request: RequestBuilder) -> RequestBuilder {
        match self.auth.session() {
            Some(session) => request.header("Authorization", &session.token),
            None => request,
        }
    }

    fn send(&self, request: RequestBuilder) -> SyncResult<Response> {
        self.authorized(request).send().map_err(|e| {
            SyncError::Store(format!("network error ({}): {e}", error_type_str(&e)))
        })
    }

    fn list_page(
        &self,
        collection: &str,
        filter: Option<&Filter>,
        page: u32,
        per_page: u32,
    ) -> SyncResult<Option<ListResponse>> {
        let mut query = vec![
            ("page", page.to_string()),
            ("perPage", per_page.to_string()),
        ];
        if let Some(filter) = filter {
            query.push(("filter", filter.render()));
        }
        let request = self.client.get(self.records_url(collection)).query(&query);
        let response = self.send(request)?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let response = check_status(response)?;
        response
            .json::<ListResponse>()
            .map(Some)
            .map_err(|e| SyncError::Store(format!("could not decode list of {collection}: {e}")))
    }
}

fn check_status(response: Response) -> SyncResult<Response> {
    if response.status().is_success() {
        return Ok(response);
    }
    let status = response.status();
    let msg = response
        .text()
        .unwrap_or_else(|_| "Unknown error".to_string());
    Err(SyncError::Store(format!("store returned {status}: {msg}")))
}

fn decode_record(response: Response, collection: &str) -> SyncResult<StoredRecord> {
    check_status(response)?
        .json::<StoredRecord>()
        .map_err(|e| SyncError::Store(format!("could not decode {collection} record: {e}")))
}

impl RecordStore for PocketStore {
    fn find_first(&self, collection: &str, filter: &Filter) -> SyncResult<Option<StoredRecord>> {
        debug!("Looking up {collection} where {}", filter.render());
        Ok(self
            .list_page(collection, Some(filter), 1, 1)?
            .and_then(|list| list.items.into_iter().next()))
    }

    fn first_record(&self, collection: &str) -> SyncResult<Option<StoredRecord>> {
        Ok(self
            .list_page(collection, None, 1, 1)?
            .and_then(|list| list.items.into_iter().next()))
    }

    fn list_all(&self, collection: &str) -> SyncResult<Vec<StoredRecord>> {
        let mut records = Vec::new();
        let mut page = 1;
        loop {
            let Some(list) = self.list_page(collection, None, page, STORE_LIST_PAGE_SIZE)? else {
                break;
            };
            let done = list.items.is_empty() || list.page >= list.total_pages;
            records.extend(list.items);
            if done {
                break;
            }
            page += 1;
        }
        debug!("Loaded {} records from {collection}", records.len());
        Ok(records)
    }

    fn create(&self, collection: &str, payload: &Map<String, Value>) -> SyncResult<StoredRecord> {
        let request = self.client.post(self.records_url(collection)).json(payload);
        decode_record(self.send(request)?, collection)
    }

    fn update(
        &self,
        collection: &str,
        id: &str,
        payload: &Map<String, Value>,
    ) -> SyncResult<StoredRecord> {
        let url = format!("{}/{id}", self.records_url(collection));
        let request = self.client.patch(url).json(payload);
        decode_record(self.send(request)?, collection)
    }
}
