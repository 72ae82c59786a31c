// ABOUTME: Moderation module: warns authors of toxic messages and deletes those messages
// ABOUTME: Keeps a per-user warning count exposed through the leaderboard command

use crate::analysis::ToxicityClassifier;
use anyhow::Result;
use async_trait::async_trait;
use salon_core::commands::CommandArgs;
use salon_core::config::ModerationConfig;
use salon_core::{
    BehaviorModule, ChatPlatform, Command, CommandContext, IncomingMessage, MessageContent,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub struct Moderation {
    platform: Arc<dyn ChatPlatform>,
    classifier: Box<dyn ToxicityClassifier>,
    threshold: f64,
    delete_messages: bool,
    warnings: Mutex<HashMap<String, u32>>,
}

impl Moderation {
    pub fn new(
        platform: Arc<dyn ChatPlatform>,
        classifier: Box<dyn ToxicityClassifier>,
        settings: &ModerationConfig,
    ) -> Self {
        Self {
            platform,
            classifier,
            threshold: settings.toxicity_threshold,
            delete_messages: settings.delete_messages,
            warnings: Mutex::new(HashMap::new()),
        }
    }

    /// Increment and return the user's warning count
    fn score_up(&self, user: &str) -> u32 {
        let mut warnings = self.warnings.lock().unwrap_or_else(|e| e.into_inner());
        let count = warnings.entry(user.to_string()).or_insert(0);
        *count += 1;
        *count
    }

    /// Warning counts, highest first; equal counts ordered by name
    pub fn standings(&self) -> Vec<(String, u32)> {
        let warnings = self.warnings.lock().unwrap_or_else(|e| e.into_inner());
        let mut standings: Vec<(String, u32)> =
            warnings.iter().map(|(u, c)| (u.clone(), *c)).collect();
        standings.sort_by(|(a_user, a), (b_user, b)| b.cmp(a).then(a_user.cmp(b_user)));
        standings
    }

    pub fn leaderboard(&self) -> String {
        let mut out = String::from("===== LEADERBOARD =====\n");
        for (user, count) in self.standings() {
            out.push_str(&format!("- {} : {}\n", user, count));
        }
        out
    }
}

#[async_trait]
impl BehaviorModule for Moderation {
    fn name(&self) -> &str {
        "moderation"
    }

    async fn on_message(&self, event: &IncomingMessage) -> Result<()> {
        let verdict = self.classifier.classify(&event.body);
        if !(verdict.is_toxic() && verdict.score > self.threshold) {
            return Ok(());
        }

        let user = event.sender.label();
        let count = self.score_up(user);
        tracing::info!(
            user = %event.sender.id,
            score = verdict.score,
            warnings = count,
            "Toxic message detected"
        );

        self.platform
            .send(
                &event.channel_id,
                MessageContent::plain(format!(
                    "⚠️ {}, please keep it civil. This is warning #{}.",
                    user, count
                )),
            )
            .await?;

        if !self.delete_messages {
            return Ok(());
        }
        let Some(moderator) = self.platform.moderator() else {
            tracing::debug!("Transport cannot delete messages, warning only");
            return Ok(());
        };
        moderator
            .delete(&event.channel_id, &event.event_id, Some("Toxic message"))
            .await
    }

    fn commands(self: Arc<Self>) -> Vec<Command> {
        vec![Command::new(
            "leaderboard",
            "Show warning counts per member",
            move |_args: CommandArgs, ctx: CommandContext| {
                let module = Arc::clone(&self);
                async move { ctx.reply.say(module.leaderboard()).await }
            },
        )]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analysis::LexiconToxicity;
    use chrono::Utc;
    use salon_core::testing::MockPlatform;
    use salon_core::ChatUser;

    fn event(sender: &str, body: &str, event_id: &str) -> IncomingMessage {
        IncomingMessage {
            platform_id: "mock".to_string(),
            channel_id: "!general:example.com".to_string(),
            sender: ChatUser::with_name(format!("@{}:example.com", sender), sender),
            body: body.to_string(),
            is_direct: false,
            event_id: event_id.to_string(),
            timestamp: Utc::now(),
        }
    }

    fn moderation(platform: &MockPlatform, delete_messages: bool) -> Moderation {
        let settings = ModerationConfig {
            delete_messages,
            ..ModerationConfig::default()
        };
        Moderation::new(
            Arc::new(platform.clone()),
            Box::new(LexiconToxicity::new()),
            &settings,
        )
    }

    #[tokio::test]
    async fn test_toxic_message_is_warned_and_deleted() {
        let platform = MockPlatform::default();
        let module = moderation(&platform, true);

        module
            .on_message(&event("mallory", "you asshole", "$bad"))
            .await
            .unwrap();

        let sent = platform.sent_texts();
        assert_eq!(sent.len(), 1);
        assert!(sent[0].contains("mallory"));
        assert!(sent[0].contains("#1"));
        let deleted = platform.deleted();
        assert_eq!(deleted.len(), 1);
        assert_eq!(deleted[0].event_id, "$bad");
    }

    #[tokio::test]
    async fn test_clean_and_borderline_messages_pass() {
        let platform = MockPlatform::default();
        let module = moderation(&platform, true);

        module
            .on_message(&event("alice", "lovely weather today", "$1"))
            .await
            .unwrap();
        module
            .on_message(&event("alice", "quel idiot", "$2"))
            .await
            .unwrap();

        assert!(platform.sent().is_empty());
        assert!(platform.deleted().is_empty());
        assert!(module.standings().is_empty());
    }

    #[tokio::test]
    async fn test_warning_only_without_moderator() {
        let platform = MockPlatform::default().without_moderation();
        let module = moderation(&platform, true);

        module
            .on_message(&event("mallory", "connard", "$x"))
            .await
            .unwrap();

        assert_eq!(platform.sent().len(), 1);
        assert!(platform.deleted().is_empty());
    }

    #[tokio::test]
    async fn test_leaderboard_sorted_by_count() {
        let platform = MockPlatform::default();
        let module = moderation(&platform, false);

        for (who, id) in [("bob", "$1"), ("mallory", "$2"), ("mallory", "$3")] {
            module.on_message(&event(who, "fuck", id)).await.unwrap();
        }

        assert_eq!(
            module.leaderboard(),
            "===== LEADERBOARD =====\n- mallory : 2\n- bob : 1\n"
        );
        assert!(platform.deleted().is_empty());
    }
}
