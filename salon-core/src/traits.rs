// ABOUTME: Core traits for the chat transport abstraction
// ABOUTME: Tier 1 (MessagingPlatform) for events and replies, Tier 2 (ChatPlatform) for history and channels

use crate::message::Message;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::pin::Pin;
use tokio_stream::Stream;

// =============================================================================
// Message Content Types
// =============================================================================

/// Content that can be sent to a chat channel
#[derive(Debug, Clone)]
pub enum MessageContent {
    /// Plain text message
    Plain(String),
    /// Message with both plain text and HTML formatting
    Html { plain: String, html: String },
    /// Message with an attachment
    Attachment {
        filename: String,
        data: Vec<u8>,
        mime_type: String,
        caption: Option<String>,
    },
}

impl MessageContent {
    pub fn plain(text: impl Into<String>) -> Self {
        Self::Plain(text.into())
    }

    pub fn html(plain: impl Into<String>, html: impl Into<String>) -> Self {
        Self::Html {
            plain: plain.into(),
            html: html.into(),
        }
    }

    pub fn attachment(
        filename: impl Into<String>,
        data: Vec<u8>,
        mime_type: impl Into<String>,
    ) -> Self {
        Self::Attachment {
            filename: filename.into(),
            data,
            mime_type: mime_type.into(),
            caption: None,
        }
    }

    /// Text rendering of the content, used for logs and test assertions
    pub fn text(&self) -> &str {
        match self {
            Self::Plain(text) => text,
            Self::Html { plain, .. } => plain,
            Self::Attachment {
                filename, caption, ..
            } => caption.as_deref().unwrap_or(filename),
        }
    }
}

// =============================================================================
// User Identity
// =============================================================================

/// Identity of a chat user
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ChatUser {
    /// Unique identifier (e.g., @user:matrix.org)
    pub id: String,
    /// Display name
    pub display_name: Option<String>,
}

impl ChatUser {
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: None,
        }
    }

    pub fn with_name(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            display_name: Some(name.into()),
        }
    }

    /// Display name when known, otherwise the raw identifier
    pub fn label(&self) -> &str {
        self.display_name.as_deref().unwrap_or(&self.id)
    }
}

// =============================================================================
// Incoming Message
// =============================================================================

/// Inbound chat event delivered by the transport
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    /// Which platform this message came from (e.g., "matrix")
    pub platform_id: String,
    /// The channel/room this message was sent in
    pub channel_id: String,
    /// The user who sent the message
    pub sender: ChatUser,
    /// Message body (text content)
    pub body: String,
    /// Whether this is a direct message (1:1 conversation)
    pub is_direct: bool,
    /// Platform-specific event ID
    pub event_id: String,
    /// When the server received the message
    pub timestamp: DateTime<Utc>,
}

impl IncomingMessage {
    /// Capture this event as an immutable message record
    pub fn to_record(&self) -> Message {
        Message::new(
            self.timestamp,
            self.sender.label(),
            self.body.clone(),
            self.channel_id.clone(),
        )
    }
}

/// Boxed stream type for platform events
pub type EventStream = Pin<Box<dyn Stream<Item = IncomingMessage> + Send>>;

// =============================================================================
// Tier 1: Messaging Platform
// =============================================================================

/// Tier 1: receive events and send replies.
#[async_trait]
pub trait MessagingPlatform: Send + Sync {
    /// Receive incoming messages as a stream
    async fn event_stream(&self) -> Result<EventStream>;

    /// Send a message to a channel by ID
    async fn send(&self, channel_id: &str, content: MessageContent) -> Result<()>;

    /// Bot's user ID on this platform
    fn bot_user_id(&self) -> &str;

    /// Platform identifier (e.g., "matrix")
    fn platform_id(&self) -> &'static str;

    /// Check if a user ID is the bot itself
    fn is_self(&self, user_id: &str) -> bool {
        user_id == self.bot_user_id()
    }

    /// Gracefully shut down the platform connection
    async fn shutdown(&self) -> Result<()> {
        Ok(())
    }
}

// =============================================================================
// Tier 2: Chat Platform
// =============================================================================

/// Which slice of a channel's history to fetch
#[derive(Debug, Clone, Default)]
pub struct HistoryQuery {
    /// Maximum number of messages; `None` reads back to `since` or the start
    pub limit: Option<usize>,
    /// Only messages strictly after this instant
    pub since: Option<DateTime<Utc>>,
    /// Leave out messages sent by the bot itself
    pub exclude_own: bool,
}

impl HistoryQuery {
    pub fn latest(limit: usize) -> Self {
        Self {
            limit: Some(limit),
            since: None,
            exclude_own: false,
        }
    }

    pub fn since(since: DateTime<Utc>) -> Self {
        Self {
            limit: None,
            since: Some(since),
            exclude_own: false,
        }
    }

    pub fn excluding_own(mut self) -> Self {
        self.exclude_own = true;
        self
    }
}

/// A joined channel as seen by the bot
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChannelInfo {
    pub id: String,
    pub name: Option<String>,
}

impl ChannelInfo {
    pub fn label(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.id)
    }
}

/// Tier 2: full chat platform with history and channel listing.
#[async_trait]
pub trait ChatPlatform: MessagingPlatform {
    /// Whether the bot can see the given channel
    async fn has_channel(&self, channel_id: &str) -> bool;

    /// List all joined channels
    async fn joined_channels(&self) -> Result<Vec<ChannelInfo>>;

    /// Fetch past messages of a channel. Order is unspecified; callers sort.
    async fn history(&self, channel_id: &str, query: HistoryQuery) -> Result<Vec<Message>>;

    /// Optional: message deletion
    fn moderator(&self) -> Option<&dyn MessageModerator> {
        None
    }
}

/// Message deletion capability (not all platforms or permissions allow it)
#[async_trait]
pub trait MessageModerator: Send + Sync {
    /// Delete (redact) a message by its event ID
    async fn delete(&self, channel_id: &str, event_id: &str, reason: Option<&str>) -> Result<()>;
}

// =============================================================================
// Tests
// =============================================================================
