// ABOUTME: Recommendations module: segments recent home-channel history into discussions
// ABOUTME: and posts news articles matching each discussion's top topics

use crate::analysis::TopicExtractor;
use crate::integrations::{Article, NewsClient};
use anyhow::Result;
use salon_core::commands::CommandArgs;
use salon_core::config::{BotConfig, RecommendationsConfig};
use salon_core::message::sort_chronologically;
use salon_core::{
    BehaviorModule, ChatPlatform, Command, CommandContext, DiscussionArchive,
    DiscussionSegmenter, ExternalCallError, HistoryQuery, Replier,
};
use std::sync::Arc;

pub struct Recommendations {
    platform: Arc<dyn ChatPlatform>,
    home: Replier,
    news: NewsClient,
    topics: TopicExtractor,
    segmenter: DiscussionSegmenter,
    archive: DiscussionArchive,
    history_limit: usize,
    topics_per_discussion: usize,
    articles_per_topic: usize,
}

impl Recommendations {
    pub fn new(
        platform: Arc<dyn ChatPlatform>,
        home: Replier,
        news: NewsClient,
        settings: &RecommendationsConfig,
        bot: &BotConfig,
    ) -> Self {
        Self {
            platform,
            home,
            news,
            topics: TopicExtractor::new(),
            segmenter: DiscussionSegmenter::new(bot.gap()),
            archive: DiscussionArchive::new(bot.discussions_dir()),
            history_limit: bot.history_limit,
            topics_per_discussion: settings.topics_per_discussion,
            articles_per_topic: settings.articles_per_topic,
        }
    }

    /// Fetch, segment and archive recent history, then post recommendations.
    /// Returns how many discussions got a recommendation post.
    pub async fn analyze_discussions(&self) -> Result<usize> {
        let mut messages = self
            .platform
            .history(
                self.home.channel_id(),
                HistoryQuery::latest(self.history_limit).excluding_own(),
            )
            .await?;
        if messages.is_empty() {
            tracing::debug!("No history to analyze");
            return Ok(0);
        }
        sort_chronologically(&mut messages);

        let discussions = self.segmenter.segment(messages);
        self.archive.store(&discussions).await?;

        let mut posted = 0;
        for (i, discussion) in discussions.iter().enumerate() {
            let topics = self
                .topics
                .extract(discussion.texts(), self.topics_per_discussion);
            tracing::debug!(discussion = i, topics = ?topics, "Extracted topics");

            let mut articles = Vec::new();
            for topic in &topics {
                articles.extend(self.articles_for(topic).await?);
            }
            if articles.is_empty() {
                continue;
            }

            let mut post = format!("Here are some recommendations based on discussion {} :", i);
            for article in articles.iter().filter(|a| !a.is_removed()) {
                post.push_str(&format!("\n{} : {}", article.title, article.url));
            }
            self.home.say(post).await?;
            posted += 1;
        }

        tracing::info!(
            discussions = discussions.len(),
            posted,
            "Discussion analysis complete"
        );
        Ok(posted)
    }

    /// First articles for one topic; a rejected search is skipped
    async fn articles_for(&self, topic: &str) -> Result<Vec<Article>> {
        match self.news.search(topic).await {
            Ok(articles) => Ok(articles
                .into_iter()
                .take(self.articles_per_topic)
                .collect()),
            Err(e) if e.downcast_ref::<ExternalCallError>().is_some() => {
                tracing::warn!(topic = %topic, error = %e, "Skipping topic");
                Ok(Vec::new())
            }
            Err(e) => Err(e),
        }
    }
}

impl BehaviorModule for Recommendations {
    fn name(&self) -> &str {
        "recommendations"
    }

    fn commands(self: Arc<Self>) -> Vec<Command> {
        let module = self;
        vec![Command::new(
            "recommendations",
            "Analyze recent discussions and post recommendations",
            move |_args: CommandArgs, _ctx: CommandContext| {
                let module = Arc::clone(&module);
                async move { module.analyze_discussions().await.map(|_| ()) }
            },
        )
        .acknowledged()]
    }
}
