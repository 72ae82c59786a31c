// ABOUTME: Reports module: sentiment and activity statistics over every joined channel
// ABOUTME: Writes CSV tables to the reports directory and posts a summary with the files attached

use crate::analysis::{Mood, SentimentScorer};
use anyhow::{Context, Result};
use chrono::{DateTime, Duration, NaiveDate, Utc};
use salon_core::commands::{CommandArgs, CommandParam, ParamKind};
use salon_core::discussion::csv_row;
use salon_core::message::sort_chronologically;
use salon_core::{
    BehaviorModule, ChatPlatform, Command, CommandContext, HistoryQuery, Message, Replier,
};
use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Messages scoring beyond this magnitude are key moments
pub const KEY_MOMENT_THRESHOLD: f64 = 0.5;

/// Occurrence counts, highest first; ties ordered by name
pub fn value_counts<'a>(items: impl IntoIterator<Item = &'a str>) -> Vec<(String, usize)> {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for item in items {
        *counts.entry(item).or_insert(0) += 1;
    }
    let mut counts: Vec<(String, usize)> =
        counts.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
    counts.sort_by(|(a_name, a), (b_name, b)| b.cmp(a).then(a_name.cmp(b_name)));
    counts
}

/// Statistics of one report period
#[derive(Debug, Clone)]
pub struct ReportAnalysis {
    pub scored: Vec<(Message, f64)>,
    pub mean: f64,
    pub mood: Mood,
    pub member_activity: Vec<(String, usize)>,
    pub top_negative: Vec<(String, usize)>,
    pub top_positive: Vec<(String, usize)>,
    pub key_moments_by_channel: Vec<(String, usize)>,
    pub daily_sentiment: Vec<(NaiveDate, f64)>,
}

impl ReportAnalysis {
    /// Score `messages`, which must not be empty
    pub fn compute(messages: Vec<Message>, scorer: &dyn SentimentScorer) -> Self {
        let scored: Vec<(Message, f64)> = messages
            .into_iter()
            .map(|m| {
                let score = scorer.compound(&m.content);
                (m, score)
            })
            .collect();

        let mean = scored.iter().map(|(_, s)| s).sum::<f64>() / scored.len().max(1) as f64;

        let mut by_day: BTreeMap<NaiveDate, (f64, usize)> = BTreeMap::new();
        for (m, s) in &scored {
            let day = by_day.entry(m.timestamp.date_naive()).or_insert((0.0, 0));
            day.0 += s;
            day.1 += 1;
        }

        Self {
            mean,
            mood: Mood::from_score(mean),
            member_activity: value_counts(scored.iter().map(|(m, _)| m.author.as_str())),
            top_negative: value_counts(
                scored
                    .iter()
                    .filter(|(_, s)| *s < -KEY_MOMENT_THRESHOLD)
                    .map(|(m, _)| m.author.as_str()),
            ),
            top_positive: value_counts(
                scored
                    .iter()
                    .filter(|(_, s)| *s > KEY_MOMENT_THRESHOLD)
                    .map(|(m, _)| m.author.as_str()),
            ),
            key_moments_by_channel: value_counts(
                scored
                    .iter()
                    .filter(|(_, s)| s.abs() > KEY_MOMENT_THRESHOLD)
                    .map(|(m, _)| m.channel.as_str()),
            ),
            daily_sentiment: by_day
                .into_iter()
                .map(|(day, (sum, n))| (day, sum / n as f64))
                .collect(),
            scored,
        }
    }

    pub fn key_moments(&self) -> impl Iterator<Item = &(Message, f64)> {
        self.scored
            .iter()
            .filter(|(_, s)| s.abs() > KEY_MOMENT_THRESHOLD)
    }

    /// Text posted with the attachments
    pub fn summary(&self) -> String {
        let mut out = String::from("Report generated :\n");
        out.push_str(&format!(
            "Global sentiment: {} (average score {:.3} over {} messages)\n",
            self.mood,
            self.mean,
            self.scored.len()
        ));
        out.push_str(&format!("Key moments: {}\n", self.key_moments().count()));
        let most_active: Vec<String> = self
            .member_activity
            .iter()
            .take(3)
            .map(|(name, n)| format!("{} ({})", name, n))
            .collect();
        out.push_str(&format!("Most active: {}", most_active.join(", ")));
        out
    }
}

fn counts_csv(header: [&str; 2], rows: &[(String, usize)]) -> String {
    let mut out = csv_row(header);
    for (name, n) in rows {
        out.push_str(&csv_row([name.as_str(), n.to_string().as_str()]));
    }
    out
}

fn messages_csv<'a>(rows: impl IntoIterator<Item = &'a (Message, f64)>) -> String {
    let mut out = csv_row(["Timestamp", "Author", "Channel", "Message", "Sentiment"]);
    for (m, s) in rows {
        let ts = m.timestamp.to_rfc3339();
        let score = format!("{:.4}", s);
        out.push_str(&csv_row([
            ts.as_str(),
            m.author.as_str(),
            m.channel.as_str(),
            m.content.as_str(),
            score.as_str(),
        ]));
    }
    out
}

/// Render every table of a report as (name, CSV text), in posting order
pub fn render_tables(analysis: &ReportAnalysis) -> Vec<(&'static str, String)> {
    let mut tables = vec![
        ("messages", messages_csv(&analysis.scored)),
        (
            "member_activity",
            counts_csv(["Author", "Messages"], &analysis.member_activity),
        ),
        (
            "top_negative_members",
            counts_csv(["Author", "Negative Messages"], &analysis.top_negative),
        ),
        (
            "top_positive_members",
            counts_csv(["Author", "Positive Messages"], &analysis.top_positive),
        ),
    ];

    let mut daily = csv_row(["Date", "Average Sentiment Score"]);
    for (day, score) in &analysis.daily_sentiment {
        daily.push_str(&csv_row([
            day.format("%Y-%m-%d").to_string().as_str(),
            format!("{:.4}", score).as_str(),
        ]));
    }
    tables.push(("daily_sentiment", daily));

    if !analysis.key_moments_by_channel.is_empty() {
        tables.push(("key_moments", messages_csv(analysis.key_moments())));
        tables.push((
            "key_moments_by_channel",
            counts_csv(["Channel", "Key Moments"], &analysis.key_moments_by_channel),
        ));
    }

    let mut summary = csv_row(["Global Sentiment", "Average Sentiment Score", "Number of Messages"]);
    summary.push_str(&csv_row([
        analysis.mood.as_str(),
        format!("{:.4}", analysis.mean).as_str(),
        analysis.scored.len().to_string().as_str(),
    ]));
    tables.push(("summary", summary));
    tables
}

pub struct Reports {
    platform: Arc<dyn ChatPlatform>,
    home: Replier,
    scorer: Box<dyn SentimentScorer>,
    reports_dir: PathBuf,
}

impl Reports {
    pub fn new(
        platform: Arc<dyn ChatPlatform>,
        home: Replier,
        scorer: Box<dyn SentimentScorer>,
        reports_dir: impl Into<PathBuf>,
    ) -> Self {
        Self {
            platform,
            home,
            scorer,
            reports_dir: reports_dir.into(),
        }
    }

    /// Messages from every joined channel over the last `days`, bot's own excluded.
    /// A channel whose history cannot be read is logged and skipped.
    pub async fn collect_messages(&self, days: u32) -> Result<Vec<Message>> {
        let cutoff = report_cutoff(Utc::now(), days)
            .with_context(|| format!("A {} day period reaches past the supported calendar", days))?;
        let mut messages = Vec::new();

        for channel in self.platform.joined_channels().await? {
            let query = HistoryQuery::since(cutoff).excluding_own();
            match self.platform.history(&channel.id, query).await {
                Ok(history) => messages.extend(history.into_iter().map(|mut m| {
                    m.channel = channel.label().to_string();
                    m
                })),
                Err(e) => {
                    tracing::warn!(channel = %channel.id, error = %e, "Failed to read channel history")
                }
            }
        }

        sort_chronologically(&mut messages);
        Ok(messages)
    }

    async fn write_tables(&self, analysis: &ReportAnalysis) -> Result<Vec<PathBuf>> {
        tokio::fs::create_dir_all(&self.reports_dir)
            .await
            .with_context(|| format!("Failed to create {}", self.reports_dir.display()))?;

        let stamp = Utc::now().format("%Y-%m-%d_%H-%M-%S");
        let mut paths = Vec::new();
        for (name, csv) in render_tables(analysis) {
            let path = self.reports_dir.join(format!("{}_{}.csv", name, stamp));
            tokio::fs::write(&path, csv)
                .await
                .with_context(|| format!("Failed to write {}", path.display()))?;
            paths.push(path);
        }
        Ok(paths)
    }

    /// Build and post a report over the last `days`. Returns the written files,
    /// or `None` when the period had no messages.
    pub async fn generate_report(&self, days: u32) -> Result<Option<Vec<PathBuf>>> {
        self.home
            .say(format!("Generating report for the last {} days...", days))
            .await?;

        let messages = self.collect_messages(days).await?;
        if messages.is_empty() {
            self.home
                .say("No messages found for the given period.")
                .await?;
            return Ok(None);
        }

        let analysis = ReportAnalysis::compute(messages, self.scorer.as_ref());
        let paths = self.write_tables(&analysis).await?;

        self.home.say(analysis.summary()).await?;
        for path in &paths {
            self.home.send_file(path, &mime_for(path)).await?;
        }

        tracing::info!(
            days,
            messages = analysis.scored.len(),
            mood = %analysis.mood,
            files = paths.len(),
            "Report generated"
        );
        Ok(Some(paths))
    }
}

/// Start of a `days` long period ending at `now`, `None` when out of calendar range
pub fn report_cutoff(now: DateTime<Utc>, days: u32) -> Option<DateTime<Utc>> {
    Duration::try_days(i64::from(days)).and_then(|period| now.checked_sub_signed(period))
}

fn mime_for(path: &Path) -> String {
    mime_guess::from_path(path)
        .first_or_octet_stream()
        .essence_str()
        .to_string()
}

impl BehaviorModule for Reports {
    fn name(&self) -> &str {
        "reports"
    }

    fn commands(self: Arc<Self>) -> Vec<Command> {
        vec![Command::new(
            "report",
            "Generate a sentiment and activity report",
            move |args: CommandArgs, ctx: CommandContext| {
                let module = Arc::clone(&self);
                async move {
                    let days = args.integer("days").unwrap_or_default();
                    let Ok(days) = u32::try_from(days) else {
                        return ctx.reply.say("❌ days must be zero or a positive number").await;
                    };
                    if report_cutoff(Utc::now(), days).is_none() {
                        return ctx.reply.say(format!("❌ {} days is too far back", days)).await;
                    }
                    module.generate_report(days).await.map(|_| ())
                }
            },
        )
        .param(CommandParam::required(
            "days",
            "Report on the last N days",
            ParamKind::Integer,
        ))]
    }
}
