// ABOUTME: Twitch Helix client: app access token plus live stream lookup by login
// ABOUTME: A fresh client-credentials token is requested for every lookup

use super::ensure_success;
use anyhow::{Context, Result};
use serde::Deserialize;
use std::collections::HashSet;

pub const TWITCH_AUTH_URL: &str = "https://id.twitch.tv/oauth2/token";
pub const TWITCH_API_URL: &str = "https://api.twitch.tv/helix";

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

#[derive(Debug, Deserialize)]
struct StreamsResponse {
    #[serde(default)]
    data: Vec<Stream>,
}

#[derive(Debug, Deserialize)]
struct Stream {
    user_name: String,
}

#[derive(Clone)]
pub struct TwitchClient {
    auth_url: String,
    api_url: String,
    client_id: String,
    client_secret: String,
    client: reqwest::Client,
}

impl std::fmt::Debug for TwitchClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TwitchClient")
            .field("api_url", &self.api_url)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

impl TwitchClient {
    pub fn new(client_id: &str, client_secret: &str) -> Self {
        Self::with_urls(TWITCH_AUTH_URL, TWITCH_API_URL, client_id, client_secret)
    }

    pub fn with_urls(auth_url: &str, api_url: &str, client_id: &str, client_secret: &str) -> Self {
        Self {
            auth_url: auth_url.to_string(),
            api_url: api_url.trim_end_matches('/').to_string(),
            client_id: client_id.to_string(),
            client_secret: client_secret.to_string(),
            client: reqwest::Client::new(),
        }
    }

    async fn access_token(&self) -> Result<String> {
        let response = self
            .client
            .post(&self.auth_url)
            .query(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await
            .context("Twitch token request failed")?;

        let response = ensure_success("twitch", response)?;
        let token: TokenResponse = response
            .json()
            .await
            .context("Failed to decode Twitch token response")?;
        Ok(token.access_token)
    }

    /// Display names of the given logins that are live right now
    pub async fn live_streams(&self, logins: &[String]) -> Result<HashSet<String>> {
        if logins.is_empty() {
            return Ok(HashSet::new());
        }

        let token = self.access_token().await?;
        let query: Vec<(&str, &str)> = logins.iter().map(|l| ("user_login", l.as_str())).collect();
        let response = self
            .client
            .get(format!("{}/streams", self.api_url))
            .header("Client-ID", &self.client_id)
            .bearer_auth(token)
            .query(&query)
            .send()
            .await
            .context("Twitch streams request failed")?;

        let response = ensure_success("twitch", response)?;
        let body: StreamsResponse = response
            .json()
            .await
            .context("Failed to decode Twitch streams response")?;
        Ok(body.data.into_iter().map(|s| s.user_name).collect())
    }
}
