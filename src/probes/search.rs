//! Custom Search API client

use crate::config::Config;
use crate::model::SearchRegion;
use crate::probes::http::{error_from_response, join_endpoint};
use crate::probes::traits::{ProbeResult, SearchHit, SearchPage, SearchSource};
use crate::ConfigResult;
use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;

const SEARCH_PATH: &str = "customsearch/v1";

/// Paged keyword search backed by the Google Custom Search JSON API
pub struct GoogleSearchClient {
    client: Client,
    endpoint: String,
    api_key: String,
    engine_id: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    /// Absent entirely when a query has no (more) results
    #[serde(default)]
    items: Vec<SearchItem>,
}

#[derive(Debug, Deserialize)]
struct SearchItem {
    link: String,
    #[serde(default)]
    title: String,
}

impl GoogleSearchClient {
    pub fn new(
        client: Client,
        endpoint: impl Into<String>,
        api_key: impl Into<String>,
        engine_id: impl Into<String>,
    ) -> Self {
        Self {
            client,
            endpoint: endpoint.into(),
            api_key: api_key.into(),
            engine_id: engine_id.into(),
        }
    }

    /// Builds a client from the `[search]` section
    ///
    /// Fails with `MissingCredential` when the API key or engine id is unset.
    pub fn from_config(client: Client, config: &Config) -> ConfigResult<Self> {
        let (api_key, engine_id) = config.search_credentials()?;
        Ok(Self::new(
            client,
            config.search.endpoint.clone(),
            api_key,
            engine_id,
        ))
    }
}

#[async_trait]
impl SearchSource for GoogleSearchClient {
    async fn fetch_page(
        &self,
        keyword: &str,
        region: SearchRegion,
        start_offset: u32,
        page_size: u32,
    ) -> ProbeResult<SearchPage> {
        let url = join_endpoint(&self.endpoint, SEARCH_PATH);
        let start = start_offset.to_string();
        let num = page_size.to_string();

        tracing::debug!(keyword, start = start_offset, gl = region.country_code(), "Fetching search page");

        let response = self
            .client
            .get(&url)
            .query(&[
                ("key", self.api_key.as_str()),
                ("cx", self.engine_id.as_str()),
                ("q", keyword),
                ("gl", region.country_code()),
                ("start", start.as_str()),
                ("num", num.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(error_from_response(response, "Failed to fetch search results").await);
        }

        let body: SearchResponse = response.json().await?;
        let page_had_full_results = body.items.len() >= page_size as usize;
        let items = body
            .items
            .into_iter()
            .map(|item| SearchHit {
                url: item.link,
                title: item.title,
            })
            .collect();

        Ok(SearchPage {
            items,
            page_had_full_results,
        })
    }
}
