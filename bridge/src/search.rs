//! Thin client for the program search index.
//!
//! Sends the same `q`/`filter` pair a recording rule stores, so a rule can be
//! previewed against the index before it is saved.

use log::debug;
use reqwest::Client;
use rule_engine::{CanonicalQuery, ProgramDocument};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use thiserror::Error;

use crate::config::KurecConfig;

const CONNECT_TIMEOUT_MS: u64 = 2_000;
const REQUEST_TIMEOUT_MS: u64 = 10_000;

/// Page size used when none is given
pub const DEFAULT_LIMIT: usize = 20;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("failed to build HTTP client: {0}")]
    Client(#[source] reqwest::Error),

    #[error("search request to {url} failed: {source}")]
    Request {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned {status}: {body}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
        body: String,
    },

    #[error("failed to parse search response: {0}")]
    Decode(#[source] reqwest::Error),
}

/// Body of a search request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchRequest {
    pub q: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub filter: String,
    pub limit: usize,
    pub offset: usize,
}

impl SearchRequest {
    pub fn new(query: &CanonicalQuery) -> Self {
        Self {
            q: query.query.clone(),
            filter: query.filter.clone(),
            limit: DEFAULT_LIMIT,
            offset: 0,
        }
    }

    pub fn page(mut self, limit: usize, offset: usize) -> Self {
        self.limit = limit;
        self.offset = offset;
        self
    }
}

/// One page of hits.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchPage {
    pub hits: Vec<ProgramDocument>,
    #[serde(default)]
    pub estimated_total_hits: usize,
    #[serde(default)]
    pub processing_time_ms: u64,
}

pub struct MeilisearchClient {
    http: Client,
    base_url: String,
    api_key: Option<String>,
    index: String,
}

impl MeilisearchClient {
    pub fn new(config: &KurecConfig) -> Result<Self, SearchError> {
        let http = Client::builder()
            .connect_timeout(Duration::from_millis(CONNECT_TIMEOUT_MS))
            .timeout(Duration::from_millis(REQUEST_TIMEOUT_MS))
            .build()
            .map_err(SearchError::Client)?;

        Ok(Self {
            http,
            base_url: config.meilisearch.url.trim_end_matches('/').to_string(),
            api_key: config.meilisearch.api_key.clone(),
            index: config.epg_index(),
        })
    }

    pub fn search_endpoint(&self) -> String {
        format!("{}/indexes/{}/search", self.base_url, self.index)
    }

    pub async fn search(&self, request: &SearchRequest) -> Result<SearchPage, SearchError> {
        let url = self.search_endpoint();
        debug!(
            "Searching {} q={:?} filter={:?} limit={} offset={}",
            url, request.q, request.filter, request.limit, request.offset
        );

        let mut builder = self.http.post(&url).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }

        let response = builder.send().await.map_err(|source| SearchError::Request {
            url: url.clone(),
            source,
        })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unavailable>".to_string());
            return Err(SearchError::Status { url, status, body });
        }

        response.json().await.map_err(SearchError::Decode)
    }
}
