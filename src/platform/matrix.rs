// ABOUTME: Matrix platform implementation for the salon chat abstraction
// ABOUTME: Implements ChatPlatform (history, channel listing) and MessageModerator (redaction)

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use matrix_sdk::{
    room::{MessagesOptions, Room},
    ruma::{
        events::{
            room::{
                message::{
                    FileMessageEventContent, MessageType, OriginalSyncRoomMessageEvent,
                    RoomMessageEventContent, SyncRoomMessageEvent,
                },
                MediaSource,
            },
            AnySyncMessageLikeEvent, AnySyncTimelineEvent,
        },
        MilliSecondsSinceUnixEpoch, OwnedEventId, OwnedRoomId, UInt,
    },
    Client,
};
use salon_core::{
    ChannelInfo, ChatPlatform, ChatUser, EventStream, HistoryQuery, IncomingMessage, Message,
    MessageContent, MessageModerator, MessagingPlatform,
};
use std::collections::HashMap;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Events requested per history page
const HISTORY_PAGE_SIZE: u32 = 100;

fn text_body(msgtype: &MessageType) -> Option<String> {
    match msgtype {
        MessageType::Text(text) => Some(text.body.clone()),
        MessageType::Notice(notice) => Some(notice.body.clone()),
        MessageType::Emote(emote) => Some(emote.body.clone()),
        _ => None,
    }
}

fn timestamp(ts: MilliSecondsSinceUnixEpoch) -> DateTime<Utc> {
    DateTime::from_timestamp_millis(i64::from(ts.0)).unwrap_or_default()
}

async fn display_name(room: &Room, event: &OriginalSyncRoomMessageEvent) -> Option<String> {
    room.get_member_no_sync(&event.sender)
        .await
        .ok()
        .flatten()
        .and_then(|m| m.display_name().map(|n| n.to_string()))
}

/// Matrix-specific implementation of ChatPlatform
pub struct MatrixPlatform {
    client: Client,
    /// Cached at construction so the id never needs Option handling later
    user_id: String,
}

impl MatrixPlatform {
    /// Wrap a logged-in client
    pub fn new(client: Client) -> Result<Self> {
        let user_id = client
            .user_id()
            .context("MatrixPlatform requires a logged-in client")?
            .to_string();
        Ok(Self { client, user_id })
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    fn room(&self, channel_id: &str) -> Result<Room> {
        let room_id: OwnedRoomId = channel_id.parse().context("Invalid room ID")?;
        self.client
            .get_room(&room_id)
            .with_context(|| format!("Room {} not found", channel_id))
    }

    /// Register the sync handler that feeds incoming text messages into a channel
    pub fn setup_event_stream(&self) -> mpsc::Receiver<IncomingMessage> {
        let (tx, rx) = mpsc::channel(256);
        let bot_user_id = self.user_id.clone();

        self.client.add_event_handler(
            move |event: SyncRoomMessageEvent, room: Room| {
                let tx = tx.clone();
                let bot_user_id = bot_user_id.clone();
                async move {
                    // Only process original events (not edits/redactions)
                    let Some(original) = event.as_original() else {
                        return;
                    };
                    if original.sender.as_str() == bot_user_id {
                        return;
                    }
                    let Some(body) = text_body(&original.content.msgtype) else {
                        return;
                    };

                    let msg = IncomingMessage {
                        platform_id: "matrix".to_string(),
                        channel_id: room.room_id().to_string(),
                        sender: ChatUser {
                            id: original.sender.to_string(),
                            display_name: display_name(&room, original).await,
                        },
                        body,
                        is_direct: room.is_direct().await.unwrap_or(false),
                        event_id: original.event_id.to_string(),
                        timestamp: timestamp(original.origin_server_ts),
                    };

                    if tx.send(msg).await.is_err() {
                        tracing::warn!("Event stream receiver dropped");
                    }
                }
            },
        );

        rx
    }

    async fn content_for(&self, content: MessageContent) -> Result<RoomMessageEventContent> {
        Ok(match content {
            MessageContent::Plain(text) => RoomMessageEventContent::text_plain(text),
            MessageContent::Html { plain, html } => RoomMessageEventContent::text_html(plain, html),
            MessageContent::Attachment {
                filename,
                data,
                mime_type,
                caption,
            } => {
                let content_type: mime_guess::mime::Mime = mime_type
                    .parse()
                    .unwrap_or(mime_guess::mime::APPLICATION_OCTET_STREAM);

                let response = self
                    .client
                    .media()
                    .upload(&content_type, data, None)
                    .await
                    .context("Failed to upload attachment")?;

                let body = caption.unwrap_or_else(|| filename.clone());
                let mut file_content =
                    FileMessageEventContent::new(body, MediaSource::Plain(response.content_uri));
                file_content.filename = Some(filename);
                RoomMessageEventContent::new(MessageType::File(file_content))
            }
        })
    }
}

#[async_trait]
impl MessagingPlatform for MatrixPlatform {
    async fn event_stream(&self) -> Result<EventStream> {
        let rx = self.setup_event_stream();
        Ok(Box::pin(ReceiverStream::new(rx)))
    }

    async fn send(&self, channel_id: &str, content: MessageContent) -> Result<()> {
        let room = self.room(channel_id)?;
        let content = self.content_for(content).await?;
        room.send(content).await.context("Failed to send message")?;
        Ok(())
    }

    fn bot_user_id(&self) -> &str {
        &self.user_id
    }

    fn platform_id(&self) -> &'static str {
        "matrix"
    }
}

#[async_trait]
impl ChatPlatform for MatrixPlatform {
    async fn has_channel(&self, channel_id: &str) -> bool {
        self.room(channel_id).is_ok()
    }

    async fn joined_channels(&self) -> Result<Vec<ChannelInfo>> {
        Ok(self
            .client
            .joined_rooms()
            .into_iter()
            .map(|room| ChannelInfo {
                id: room.room_id().to_string(),
                name: room.name(),
            })
            .collect())
    }

    /// Page backwards through the room timeline until the limit or the
    /// `since` cutoff is reached, then return oldest first.
    async fn history(&self, channel_id: &str, query: HistoryQuery) -> Result<Vec<Message>> {
        let room = self.room(channel_id)?;
        let mut names: HashMap<String, Option<String>> = HashMap::new();
        let mut newest_first = Vec::new();
        let mut from: Option<String> = None;

        'pages: loop {
            let mut options = MessagesOptions::backward();
            options.from = from.take();
            options.limit = UInt::from(HISTORY_PAGE_SIZE);
            let page = room
                .messages(options)
                .await
                .with_context(|| format!("Failed to read history of {}", channel_id))?;

            for event in &page.chunk {
                let Ok(AnySyncTimelineEvent::MessageLike(AnySyncMessageLikeEvent::RoomMessage(
                    msg,
                ))) = event.raw().deserialize()
                else {
                    continue;
                };
                let Some(original) = msg.as_original() else {
                    continue;
                };

                let at = timestamp(original.origin_server_ts);
                if query.since.is_some_and(|since| at <= since) {
                    break 'pages;
                }
                if query.exclude_own && original.sender.as_str() == self.user_id {
                    continue;
                }
                let Some(body) = text_body(&original.content.msgtype) else {
                    continue;
                };

                let sender = original.sender.to_string();
                if !names.contains_key(&sender) {
                    let name = display_name(&room, original).await;
                    names.insert(sender.clone(), name);
                }
                let author = names
                    .get(&sender)
                    .cloned()
                    .flatten()
                    .unwrap_or_else(|| sender.clone());

                newest_first.push(Message::new(at, author, body, channel_id));
                if query.limit.is_some_and(|limit| newest_first.len() >= limit) {
                    break 'pages;
                }
            }

            match page.end {
                Some(end) if !page.chunk.is_empty() => from = Some(end),
                _ => break,
            }
        }

        newest_first.reverse();
        Ok(newest_first)
    }

    fn moderator(&self) -> Option<&dyn MessageModerator> {
        Some(self)
    }
}

#[async_trait]
impl MessageModerator for MatrixPlatform {
    async fn delete(&self, channel_id: &str, event_id: &str, reason: Option<&str>) -> Result<()> {
        let room = self.room(channel_id)?;
        let event_id: OwnedEventId = event_id.parse().context("Invalid event ID")?;
        room.redact(&event_id, reason, None)
            .await
            .context("Failed to redact message")?;
        tracing::info!(channel = %channel_id, event_id = %event_id, "Message redacted");
        Ok(())
    }
}
