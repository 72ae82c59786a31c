// ABOUTME: Giphy search client returning gif page URLs for a free-text query

use super::ensure_success;
use anyhow::{Context, Result};
use serde::Deserialize;

pub const GIPHY_API_URL: &str = "https://api.giphy.com/v1/gifs";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    data: Vec<Gif>,
}

#[derive(Debug, Deserialize)]
struct Gif {
    url: String,
}

#[derive(Clone)]
pub struct GiphyClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl GiphyClient {
    pub fn new(api_key: &str) -> Self {
        Self::with_base_url(GIPHY_API_URL, api_key)
    }

    pub fn with_base_url(base_url: &str, api_key: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client: reqwest::Client::new(),
        }
    }

    pub async fn search(&self, query: &str, limit: usize) -> Result<Vec<String>> {
        let limit = limit.to_string();
        let response = self
            .client
            .get(format!("{}/search", self.base_url))
            .query(&[
                ("api_key", self.api_key.as_str()),
                ("q", query),
                ("limit", limit.as_str()),
            ])
            .send()
            .await
            .context("Giphy search request failed")?;

        let response = ensure_success("giphy", response)?;
        let body: SearchResponse = response
            .json()
            .await
            .context("Failed to decode Giphy search response")?;
        Ok(body.data.into_iter().map(|g| g.url).collect())
    }
}
