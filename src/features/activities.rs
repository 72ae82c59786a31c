// ABOUTME: Activities module: proposes group activities on slots where enough members are free
// ABOUTME: and the forecast matches, picking random entries from the activities list

use crate::integrations::{load_availability, Availability, WeatherClient};
use crate::utils::{csv_column, markdown_to_html};
use anyhow::{Context, Result};
use chrono::{NaiveDate, NaiveDateTime, Timelike};
use rand::seq::SliceRandom;
use rand::Rng;
use salon_core::commands::CommandArgs;
use salon_core::config::ActivitiesConfig;
use salon_core::{BehaviorModule, Command, CommandContext, MessageContent, Replier};
use std::path::PathBuf;
use std::sync::Arc;

/// Half-day a proposal falls in; mornings sort first
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum TimeOfDay {
    Morning,
    Afternoon,
}

impl TimeOfDay {
    /// Slots starting before 11:00 are mornings
    pub fn of(slot: NaiveDateTime) -> Self {
        if slot.hour() < 11 {
            TimeOfDay::Morning
        } else {
            TimeOfDay::Afternoon
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            TimeOfDay::Morning => "morning",
            TimeOfDay::Afternoon => "afternoon",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Proposal {
    pub date: NaiveDate,
    pub time_of_day: TimeOfDay,
    pub members: Vec<String>,
    pub activities: Vec<String>,
}

impl Proposal {
    pub fn to_markdown(&self) -> String {
        let mut out = format!(
            "### Proposed activity on `{} {}`\n",
            self.date.format("%Y-%m-%d"),
            self.time_of_day.as_str()
        );
        out.push_str("### Available members:\n");
        for m in &self.members {
            out.push_str(&format!("- {}\n", m));
        }
        out.push_str("### Activities:\n");
        for a in &self.activities {
            out.push_str(&format!("- {}\n", a));
        }
        out
    }
}

/// Up to `n` distinct activities, in random order
pub fn pick_activities<R: Rng + ?Sized>(pool: &[String], n: usize, rng: &mut R) -> Vec<String> {
    pool.choose_multiple(rng, n.min(pool.len()))
        .cloned()
        .collect()
}

/// Slots with at least `min_members` available, in chronological order
pub fn candidate_slots(availability: &Availability, min_members: usize) -> Vec<(NaiveDateTime, &[String])> {
    availability
        .iter()
        .filter(|(_, members)| members.len() >= min_members)
        .map(|(slot, members)| (*slot, members.as_slice()))
        .collect()
}

pub struct Activities {
    home: Replier,
    weather: WeatherClient,
    calendars_dir: PathBuf,
    activities_file: PathBuf,
    location: String,
    condition: String,
    min_members: usize,
    suggestions: usize,
}

impl Activities {
    pub fn new(home: Replier, weather: WeatherClient, settings: &ActivitiesConfig) -> Self {
        Self {
            home,
            weather,
            calendars_dir: PathBuf::from(&settings.calendars_dir),
            activities_file: PathBuf::from(&settings.activities_file),
            location: settings.location.clone(),
            condition: settings.condition.clone(),
            min_members: settings.min_members,
            suggestions: settings.suggestions,
        }
    }

    async fn activity_pool(&self) -> Result<Vec<String>> {
        let text = tokio::fs::read_to_string(&self.activities_file)
            .await
            .with_context(|| format!("Failed to read {}", self.activities_file.display()))?;
        csv_column(&text, "activity").with_context(|| {
            format!(
                "{} has no `activity` column",
                self.activities_file.display()
            )
        })
    }

    /// Build proposals for every free slot with the wanted forecast
    pub async fn plan(&self) -> Result<Vec<Proposal>> {
        let pool = self.activity_pool().await?;
        let availability = load_availability(&self.calendars_dir).await?;

        let mut proposals = Vec::new();
        for (slot, members) in candidate_slots(&availability, self.min_members) {
            let Some(condition) = self.weather.condition(&self.location, slot.date()).await? else {
                tracing::debug!(slot = %slot, "No forecast for slot");
                continue;
            };
            if condition != self.condition {
                continue;
            }
            let activities = {
                let mut rng = rand::thread_rng();
                pick_activities(&pool, self.suggestions, &mut rng)
            };
            proposals.push(Proposal {
                date: slot.date(),
                time_of_day: TimeOfDay::of(slot),
                members: members.to_vec(),
                activities,
            });
        }

        proposals.sort_by_key(|p| (p.date, p.time_of_day));
        Ok(proposals)
    }

    pub async fn propose_activities(&self) -> Result<usize> {
        let proposals = self.plan().await?;
        for proposal in &proposals {
            let markdown = proposal.to_markdown();
            let html = markdown_to_html(&markdown);
            self.home.send(MessageContent::html(markdown, html)).await?;
        }
        tracing::info!(count = proposals.len(), "Posted activity proposals");
        Ok(proposals.len())
    }
}

impl BehaviorModule for Activities {
    fn name(&self) -> &str {
        "activities"
    }

    fn commands(self: Arc<Self>) -> Vec<Command> {
        vec![Command::new(
            "activities",
            "Propose activities for slots where members are available",
            move |_args: CommandArgs, _ctx: CommandContext| {
                let module = Arc::clone(&self);
                async move { module.propose_activities().await.map(|_| ()) }
            },
        )
        .acknowledged()]
    }
}
