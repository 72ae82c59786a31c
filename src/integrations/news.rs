// ABOUTME: News search client (newsapi.org "everything" endpoint)
// ABOUTME: Returns article titles and links for a topic keyword

use super::ensure_success;
use anyhow::{Context, Result};
use serde::Deserialize;

pub const NEWS_API_URL: &str = "https://newsapi.org/v2";

/// Title placeholder the API uses for withdrawn articles
pub const REMOVED_TITLE: &str = "[Removed]";

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Article {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub url: String,
}

impl Article {
    pub fn is_removed(&self) -> bool {
        self.title == REMOVED_TITLE
    }
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    articles: Vec<Article>,
}

#[derive(Clone)]
pub struct NewsClient {
    base_url: String,
    api_key: String,
    client: reqwest::Client,
}

impl NewsClient {
    pub fn new(api_key: &str) -> Self {
        Self::with_base_url(NEWS_API_URL, api_key)
    }

    pub fn with_base_url(base_url: &str, api_key: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key: api_key.to_string(),
            client: reqwest::Client::new(),
        }
    }

    /// Articles mentioning `topic`, in the order the API ranks them
    pub async fn search(&self, topic: &str) -> Result<Vec<Article>> {
        let url = format!("{}/everything", self.base_url);
        let response = self
            .client
            .get(&url)
            .query(&[("q", topic), ("apiKey", self.api_key.as_str())])
            .send()
            .await
            .context("News search request failed")?;

        let response = ensure_success("news", response)?;
        let body: SearchResponse = response
            .json()
            .await
            .context("Failed to decode news search response")?;
        Ok(body.articles)
    }
}
