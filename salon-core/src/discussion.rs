// ABOUTME: Splits a chronological message stream into discussions by inactivity gap
// ABOUTME: Also writes each discussion to its own CSV artifact

use crate::message::{Discussion, Message};
use anyhow::{Context, Result};
use chrono::Duration;
use std::path::{Path, PathBuf};

/// Default inactivity gap separating two discussions
pub const DEFAULT_GAP_MINUTES: i64 = 30;

/// Segments sorted message sequences into discussions
#[derive(Debug, Clone, Copy)]
pub struct DiscussionSegmenter {
    gap: Duration,
}

impl Default for DiscussionSegmenter {
    fn default() -> Self {
        Self::new(Duration::minutes(DEFAULT_GAP_MINUTES))
    }
}

impl DiscussionSegmenter {
    pub fn new(gap: Duration) -> Self {
        Self { gap }
    }

    pub fn gap(&self) -> Duration {
        self.gap
    }

    /// Group messages into discussions.
    ///
    /// `messages` must already be sorted ascending by timestamp; nothing is
    /// re-sorted here. A message joins the open discussion when it arrives at
    /// most `gap` after the previously appended message, so a discussion may
    /// last far longer than `gap` overall.
    pub fn segment<I>(&self, messages: I) -> Vec<Discussion>
    where
        I: IntoIterator<Item = Message>,
    {
        let mut discussions = Vec::new();
        let mut current: Option<Discussion> = None;

        for message in messages {
            let Some(open) = current.as_mut() else {
                current = Some(Discussion::start(message));
                continue;
            };

            if message.timestamp - open.last().timestamp <= self.gap {
                open.push(message);
                continue;
            }

            if let Some(closed) = current.replace(Discussion::start(message)) {
                discussions.push(closed);
            }
        }

        if let Some(last) = current {
            discussions.push(last);
        }

        discussions
    }
}

/// Convenience wrapper over [`DiscussionSegmenter::segment`]
pub fn segment_discussions(messages: Vec<Message>, gap: Duration) -> Vec<Discussion> {
    DiscussionSegmenter::new(gap).segment(messages)
}

// =============================================================================
// Persistence
// =============================================================================

/// Column headers of a discussion artifact
pub const DISCUSSION_COLUMNS: [&str; 3] = ["Timestamp", "Author", "Message"];

/// Writes discussions as `discussion_{i}.csv` files in one directory
#[derive(Debug, Clone)]
pub struct DiscussionArchive {
    dir: PathBuf,
}

impl DiscussionArchive {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the artifact for the discussion at `ordinal` in a batch
    pub fn path_for(&self, ordinal: usize) -> PathBuf {
        self.dir.join(format!("discussion_{}.csv", ordinal))
    }

    /// Write one file per discussion, overwriting files from earlier batches
    pub async fn store(&self, discussions: &[Discussion]) -> Result<Vec<PathBuf>> {
        tokio::fs::create_dir_all(&self.dir)
            .await
            .with_context(|| format!("Failed to create {}", self.dir.display()))?;

        let mut written = Vec::with_capacity(discussions.len());
        for (i, discussion) in discussions.iter().enumerate() {
            let path = self.path_for(i);
            tokio::fs::write(&path, render_discussion_csv(discussion))
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            written.push(path);
        }

        tracing::debug!(
            dir = %self.dir.display(),
            count = written.len(),
            "Stored discussions"
        );
        Ok(written)
    }
}

/// Render a discussion as CSV text with a header row
pub fn render_discussion_csv(discussion: &Discussion) -> String {
    let mut out = csv_row(DISCUSSION_COLUMNS.iter().copied());
    for m in discussion.messages() {
        let ts = m.timestamp.to_rfc3339();
        out.push_str(&csv_row([ts.as_str(), m.author.as_str(), m.content.as_str()]));
    }
    out
}

/// Join fields into one CSV line, quoting where RFC 4180 requires it
pub fn csv_row<'a>(fields: impl IntoIterator<Item = &'a str>) -> String {
    let mut line = fields
        .into_iter()
        .map(csv_field)
        .collect::<Vec<_>>()
        .join(",");
    line.push('\n');
    line
}

fn csv_field(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}
