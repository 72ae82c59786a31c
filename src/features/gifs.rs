// ABOUTME: Gif reactions: replies with a matching gif to strongly positive or negative messages

use crate::analysis::SentimentScorer;
use crate::integrations::GiphyClient;
use anyhow::Result;
use async_trait::async_trait;
use rand::seq::SliceRandom;
use salon_core::config::GifsConfig;
use salon_core::{BehaviorModule, ChatPlatform, IncomingMessage, MessageContent};
use std::sync::Arc;

pub struct GifReactions {
    platform: Arc<dyn ChatPlatform>,
    giphy: GiphyClient,
    scorer: Box<dyn SentimentScorer>,
    threshold: f64,
    results: usize,
}

impl GifReactions {
    pub fn new(
        platform: Arc<dyn ChatPlatform>,
        giphy: GiphyClient,
        scorer: Box<dyn SentimentScorer>,
        settings: &GifsConfig,
    ) -> Self {
        Self {
            platform,
            giphy,
            scorer,
            threshold: settings.sentiment_threshold,
            results: settings.results,
        }
    }

    /// Whether a compound score is strong enough to react to
    pub fn is_strong(&self, score: f64) -> bool {
        score.abs() >= self.threshold
    }
}

#[async_trait]
impl BehaviorModule for GifReactions {
    fn name(&self) -> &str {
        "gifs"
    }

    async fn on_message(&self, event: &IncomingMessage) -> Result<()> {
        let score = self.scorer.compound(&event.body);
        if !self.is_strong(score) {
            return Ok(());
        }

        let urls = self.giphy.search(&event.body, self.results).await?;
        let picked = {
            let mut rng = rand::thread_rng();
            urls.choose(&mut rng).cloned()
        };
        let Some(url) = picked else {
            return Ok(());
        };
        tracing::debug!(score, url = %url, "Reacting with gif");
        self.platform
            .send(&event.channel_id, MessageContent::plain(url))
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::LexiconSentiment;
    use chrono::Utc;
    use salon_core::testing::MockPlatform;
    use salon_core::ChatUser;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn event(body: &str) -> IncomingMessage {
        IncomingMessage {
            platform_id: "mock".to_string(),
            channel_id: "!fun:example.com".to_string(),
            sender: ChatUser::new("@alice:example.com"),
            body: body.to_string(),
            is_direct: false,
            event_id: "$e".to_string(),
            timestamp: Utc::now(),
        }
    }

    async fn setup(platform: &MockPlatform) -> (MockServer, GifReactions) {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "data": [{"url": "https://giphy.com/gifs/party"}]
            })))
            .mount(&server)
            .await;
        let module = GifReactions::new(
            Arc::new(platform.clone()),
            GiphyClient::with_base_url(&server.uri(), "k"),
            Box::new(LexiconSentiment::new()),
            &GifsConfig::default(),
        );
        (server, module)
    }

    #[tokio::test]
    async fn test_strong_sentiment_posts_gif_in_same_channel() {
        let platform = MockPlatform::default();
        let (_server, module) = setup(&platform).await;

        module
            .on_message(&event("I love this, it's amazing!"))
            .await
            .unwrap();

        let sent = platform.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].channel_id, "!fun:example.com");
        assert_eq!(sent[0].content.text(), "https://giphy.com/gifs/party");
    }

    #[tokio::test]
    async fn test_mild_sentiment_is_ignored() {
        let platform = MockPlatform::default();
        let (server, module) = setup(&platform).await;

        module.on_message(&event("the bus is at noon")).await.unwrap();
        module.on_message(&event("good")).await.unwrap();

        assert!(platform.sent().is_empty());
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[test]
    fn test_threshold_is_inclusive() {
        let platform = MockPlatform::default();
        let module = GifReactions::new(
            Arc::new(platform),
            GiphyClient::new("k"),
            Box::new(LexiconSentiment::new()),
            &GifsConfig::default(),
        );
        assert!(module.is_strong(0.45));
        assert!(module.is_strong(-0.45));
        assert!(!module.is_strong(0.4499));
    }
}
