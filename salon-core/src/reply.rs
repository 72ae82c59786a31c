// ABOUTME: Write-only reply capability bound to one channel
// ABOUTME: Used by commands and modules to emit text, HTML, and file messages

use crate::traits::{ChatPlatform, MessageContent};
use anyhow::{Context, Result};
use std::path::Path;
use std::sync::Arc;

/// Sends messages to a single channel. No delivery acknowledgement is modeled.
#[derive(Clone)]
pub struct Replier {
    platform: Arc<dyn ChatPlatform>,
    channel_id: String,
}

impl std::fmt::Debug for Replier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Replier")
            .field("platform", &self.platform.platform_id())
            .field("channel_id", &self.channel_id)
            .finish()
    }
}

impl Replier {
    pub fn new(platform: Arc<dyn ChatPlatform>, channel_id: impl Into<String>) -> Self {
        Self {
            platform,
            channel_id: channel_id.into(),
        }
    }

    pub fn channel_id(&self) -> &str {
        &self.channel_id
    }

    pub async fn send(&self, content: MessageContent) -> Result<()> {
        self.platform.send(&self.channel_id, content).await
    }

    /// Send plain text
    pub async fn say(&self, text: impl Into<String>) -> Result<()> {
        self.send(MessageContent::plain(text)).await
    }

    /// Upload a file from disk as an attachment
    pub async fn send_file(&self, path: &Path, mime_type: &str) -> Result<()> {
        let data = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read {}", path.display()))?;
        let filename = path
            .file_name()
            .map(|n| n.to_string_lossy().to_string())
            .unwrap_or_else(|| "attachment".to_string());
        self.send(MessageContent::attachment(filename, data, mime_type))
            .await
    }
}
