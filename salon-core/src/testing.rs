// ABOUTME: In-memory chat platform for tests of modules, commands, and the runtime
// ABOUTME: Records every send and deletion, serves canned history per channel

use crate::message::Message;
use crate::traits::{
    ChannelInfo, ChatPlatform, EventStream, HistoryQuery, IncomingMessage, MessageContent,
    MessageModerator, MessagingPlatform,
};
use anyhow::Result;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};
use tokio::sync::mpsc;

/// A message the mock was asked to send
#[derive(Debug, Clone)]
pub struct SentMessage {
    pub channel_id: String,
    pub content: MessageContent,
}

/// A redaction the mock was asked to perform
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Deletion {
    pub channel_id: String,
    pub event_id: String,
    pub reason: Option<String>,
}

#[derive(Default)]
struct State {
    sent: Vec<SentMessage>,
    deleted: Vec<Deletion>,
    history: HashMap<String, Vec<Message>>,
    channels: Vec<ChannelInfo>,
    failing_history: HashSet<String>,
}

/// Mock transport. Cloning shares the recorded state.
#[derive(Clone)]
pub struct MockPlatform {
    bot_id: String,
    moderation: bool,
    state: Arc<Mutex<State>>,
    events: Arc<Mutex<Option<mpsc::UnboundedReceiver<IncomingMessage>>>>,
    inject: mpsc::UnboundedSender<IncomingMessage>,
}

impl Default for MockPlatform {
    fn default() -> Self {
        Self::new("@salon:example.com")
    }
}

impl MockPlatform {
    pub fn new(bot_id: &str) -> Self {
        let (inject, rx) = mpsc::unbounded_channel();
        Self {
            bot_id: bot_id.to_string(),
            moderation: true,
            state: Arc::new(Mutex::new(State::default())),
            events: Arc::new(Mutex::new(Some(rx))),
            inject,
        }
    }

    /// A platform that cannot delete messages
    pub fn without_moderation(mut self) -> Self {
        self.moderation = false;
        self
    }

    pub fn add_channel(&self, id: &str, name: Option<&str>) {
        self.state.lock().unwrap().channels.push(ChannelInfo {
            id: id.to_string(),
            name: name.map(str::to_string),
        });
    }

    /// Seed history returned for `channel_id`, in the given order.
    /// Messages authored by the bot id count as the bot's own.
    pub fn set_history(&self, channel_id: &str, messages: Vec<Message>) {
        self.state
            .lock()
            .unwrap()
            .history
            .insert(channel_id.to_string(), messages);
    }

    /// Make history fetches for `channel_id` fail
    pub fn fail_history(&self, channel_id: &str) {
        self.state
            .lock()
            .unwrap()
            .failing_history
            .insert(channel_id.to_string());
    }

    /// Push an inbound event onto the event stream
    pub fn inject(&self, event: IncomingMessage) {
        let _ = self.inject.send(event);
    }

    pub fn sent(&self) -> Vec<SentMessage> {
        self.state.lock().unwrap().sent.clone()
    }

    /// Text of every sent message, in order
    pub fn sent_texts(&self) -> Vec<String> {
        self.sent()
            .iter()
            .map(|m| m.content.text().to_string())
            .collect()
    }

    pub fn deleted(&self) -> Vec<Deletion> {
        self.state.lock().unwrap().deleted.clone()
    }
}

#[async_trait]
impl MessagingPlatform for MockPlatform {
    async fn event_stream(&self) -> Result<EventStream> {
        let rx = self
            .events
            .lock()
            .unwrap()
            .take()
            .ok_or_else(|| anyhow::anyhow!("event stream already taken"))?;
        Ok(Box::pin(tokio_stream::wrappers::UnboundedReceiverStream::new(rx)))
    }

    async fn send(&self, channel_id: &str, content: MessageContent) -> Result<()> {
        self.state.lock().unwrap().sent.push(SentMessage {
            channel_id: channel_id.to_string(),
            content,
        });
        Ok(())
    }

    fn bot_user_id(&self) -> &str {
        &self.bot_id
    }

    fn platform_id(&self) -> &'static str {
        "mock"
    }
}

#[async_trait]
impl ChatPlatform for MockPlatform {
    async fn has_channel(&self, channel_id: &str) -> bool {
        self.state
            .lock()
            .unwrap()
            .channels
            .iter()
            .any(|c| c.id == channel_id)
    }

    async fn joined_channels(&self) -> Result<Vec<ChannelInfo>> {
        Ok(self.state.lock().unwrap().channels.clone())
    }

    async fn history(&self, channel_id: &str, query: HistoryQuery) -> Result<Vec<Message>> {
        let state = self.state.lock().unwrap();
        if state.failing_history.contains(channel_id) {
            anyhow::bail!("history unavailable for {}", channel_id);
        }
        let mut messages: Vec<Message> = state
            .history
            .get(channel_id)
            .cloned()
            .unwrap_or_default()
            .into_iter()
            .filter(|m| query.since.map_or(true, |since| m.timestamp > since))
            .filter(|m| !(query.exclude_own && m.author == self.bot_id))
            .collect();
        if let Some(limit) = query.limit {
            let skip = messages.len().saturating_sub(limit);
            messages.drain(..skip);
        }
        Ok(messages)
    }

    fn moderator(&self) -> Option<&dyn MessageModerator> {
        self.moderation.then_some(self as &dyn MessageModerator)
    }
}

#[async_trait]
impl MessageModerator for MockPlatform {
    async fn delete(&self, channel_id: &str, event_id: &str, reason: Option<&str>) -> Result<()> {
        self.state.lock().unwrap().deleted.push(Deletion {
            channel_id: channel_id.to_string(),
            event_id: event_id.to_string(),
            reason: reason.map(str::to_string),
        });
        Ok(())
    }
}
