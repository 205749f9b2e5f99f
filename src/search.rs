//! Remote photo provider client.
//!
//! One `GET` per search against a fixed JSON endpoint; each hit's
//! `webformatURL` becomes a photo locator. There is no retry, no request
//! coalescing and no cancellation: one failed request is one reported
//! failure, and overlapping searches stay independent.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::{PhotoReference, SearchOutcome};

/// Configuration for the remote photo provider
#[derive(Debug, Clone)]
pub struct SearchConfig {
    /// Endpoint answering keyword searches with JSON
    pub endpoint: String,
    /// Static credential passed through as the `key` query parameter
    pub api_key: String,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://pixabay.com/api/".to_string(),
            api_key: String::new(),
        }
    }
}

/// Result type for search operations
pub type SearchResult<T> = Result<T, SearchError>;

/// Errors that can occur during a search
#[derive(Debug)]
pub enum SearchError {
    /// The request never produced a response
    Request { keyword: String, cause: String },
    /// The provider answered with a non-success status
    Status { keyword: String, status: u16 },
    /// The response body was not the expected JSON
    Parse { keyword: String, cause: String },
}

impl std::fmt::Display for SearchError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SearchError::Request { keyword, cause } => {
                write!(f, "Search for \"{}\" failed: {}", keyword, cause)
            }
            SearchError::Status { keyword, status } => {
                write!(
                    f,
                    "Search for \"{}\" failed: provider returned status {}",
                    keyword, status
                )
            }
            SearchError::Parse { keyword, cause } => {
                write!(
                    f,
                    "Search for \"{}\" returned an unreadable response: {}",
                    keyword, cause
                )
            }
        }
    }
}

impl std::error::Error for SearchError {}

/// Response envelope from the provider
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SearchResponse {
    hits: Vec<SearchHit>,
}

/// One photo in a provider response
#[derive(Debug, Clone, Serialize, Deserialize)]
struct SearchHit {
    #[serde(rename = "webformatURL")]
    webformat_url: String,
}

/// Issues one provider search per call
///
/// The session talks to the provider through this seam; tests substitute a
/// scripted implementation.
#[async_trait]
pub trait SearchProvider: Send + Sync {
    async fn search(&self, keyword: &str, per_page: u8) -> SearchResult<SearchOutcome>;
}

/// HTTP client for the remote photo provider
pub struct RemoteSearchClient {
    config: SearchConfig,
}

impl RemoteSearchClient {
    /// Create a new search client
    pub fn new(config: SearchConfig) -> Self {
        Self { config }
    }

    /// Searches the provider for `keyword`.
    ///
    /// An empty keyword is sent as-is (the provider answers it with popular
    /// photos; the engine does not special-case it). `per_page` arrives
    /// pre-clamped by the session and is not re-validated here. Exactly one
    /// request is made per call.
    pub async fn search(&self, keyword: &str, per_page: u8) -> SearchResult<SearchOutcome> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(60))
            .connect_timeout(std::time::Duration::from_secs(10))
            .user_agent("PhotoStash/0.1.0")
            .build()
            .map_err(|e| SearchError::Request {
                keyword: keyword.to_string(),
                cause: format!("Client build failed: {}", e),
            })?;

        log::debug!("Searching provider for \"{}\" (per_page {})", keyword, per_page);
        let per_page_param = per_page.to_string();

        let response = client
            .get(&self.config.endpoint)
            .query(&[
                ("key", self.config.api_key.as_str()),
                ("q", keyword),
                ("image_type", "photo"),
                ("per_page", per_page_param.as_str()),
            ])
            .send()
            .await
            .map_err(|e| SearchError::Request {
                keyword: keyword.to_string(),
                cause: format!("Request failed: {}", e),
            })?;

        if !response.status().is_success() {
            return Err(SearchError::Status {
                keyword: keyword.to_string(),
                status: response.status().as_u16(),
            });
        }

        let body = response
            .json::<SearchResponse>()
            .await
            .map_err(|e| SearchError::Parse {
                keyword: keyword.to_string(),
                cause: format!("Failed to parse response: {}", e),
            })?;

        let outcome = to_outcome(body);
        match &outcome {
            SearchOutcome::Hits(refs) => {
                log::info!("Search for \"{}\" returned {} hits", keyword, refs.len())
            }
            SearchOutcome::NoResults => {
                log::info!("Search for \"{}\" returned no hits", keyword)
            }
        }
        Ok(outcome)
    }
}

#[async_trait]
impl SearchProvider for RemoteSearchClient {
    async fn search(&self, keyword: &str, per_page: u8) -> SearchResult<SearchOutcome> {
        RemoteSearchClient::search(self, keyword, per_page).await
    }
}

/// Maps a provider response to references in response order
fn to_outcome(response: SearchResponse) -> SearchOutcome {
    if response.hits.is_empty() {
        return SearchOutcome::NoResults;
    }
    SearchOutcome::Hits(
        response
            .hits
            .into_iter()
            .map(|hit| PhotoReference::remote(hit.webformat_url))
            .collect(),
    )
}
