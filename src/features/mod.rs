// ABOUTME: Feature modules and their wiring: construction from config, registration, job table
// ABOUTME: Only enabled features are built; each scheduled job calls into its module instance

pub mod activities;
pub mod gifs;
pub mod moderation;
pub mod recommendations;
pub mod reports;
pub mod streams;

pub use activities::Activities;
pub use gifs::GifReactions;
pub use moderation::Moderation;
pub use recommendations::Recommendations;
pub use reports::Reports;
pub use streams::StreamWatch;

use crate::analysis::{LexiconSentiment, LexiconToxicity};
use crate::integrations::{GiphyClient, NewsClient, TwitchClient, WeatherClient};
use chrono::Weekday;
use salon_core::config::{Config, FeaturesConfig};
use salon_core::{
    BehaviorModule, ChatPlatform, JobTable, ModuleRegistry, RecurringJob, Replier, ScheduleRule,
    SetupError,
};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

pub const JOB_ANALYZE_DISCUSSIONS: &str = "analyze-discussions";
pub const JOB_NOTIFY_STREAMERS: &str = "notify-online-streamers";
pub const JOB_ACTIVITIES_MONDAY: &str = "propose-activities-monday";
pub const JOB_ACTIVITIES_SATURDAY: &str = "propose-activities-saturday";
pub const JOB_DAILY_REPORT: &str = "daily-report";
pub const JOB_WEEKLY_REPORT: &str = "weekly-report";

/// Every job name the bot knows, enabled or not
pub const ALL_JOBS: [&str; 6] = [
    JOB_ANALYZE_DISCUSSIONS,
    JOB_NOTIFY_STREAMERS,
    JOB_ACTIVITIES_MONDAY,
    JOB_ACTIVITIES_SATURDAY,
    JOB_DAILY_REPORT,
    JOB_WEEKLY_REPORT,
];

fn require<'a>(value: &'a Option<String>, name: &'static str) -> Result<&'a str, SetupError> {
    value.as_deref().ok_or(SetupError::MissingCredential(name))
}

/// The enabled feature modules of one bot instance
#[derive(Default)]
pub struct Features {
    pub recommendations: Option<Arc<Recommendations>>,
    pub streams: Option<Arc<StreamWatch>>,
    pub activities: Option<Arc<Activities>>,
    pub moderation: Option<Arc<Moderation>>,
    pub gifs: Option<Arc<GifReactions>>,
    pub reports: Option<Arc<Reports>>,
    plan: Vec<(&'static str, ScheduleRule)>,
}

impl Features {
    /// Build every enabled feature, posting to `home_channel_id`
    pub fn from_config(
        config: &Config,
        platform: Arc<dyn ChatPlatform>,
        home_channel_id: &str,
    ) -> Result<Self, SetupError> {
        let features = &config.features;
        let keys = &config.integrations;
        let home = Replier::new(Arc::clone(&platform), home_channel_id);
        let mut built = Features {
            plan: job_plan(features),
            ..Features::default()
        };

        if features.recommendations.enabled {
            let news = NewsClient::new(require(&keys.news_api_key, "NEWS_API_KEY")?);
            built.recommendations = Some(Arc::new(Recommendations::new(
                Arc::clone(&platform),
                home.clone(),
                news,
                &features.recommendations,
                &config.bot,
            )));
        }

        if features.streams.enabled {
            let twitch = TwitchClient::new(
                require(&keys.twitch_client_id, "TWITCH_CLIENT_ID")?,
                require(&keys.twitch_client_secret, "TWITCH_CLIENT_SECRET")?,
            );
            built.streams = Some(Arc::new(StreamWatch::new(
                home.clone(),
                twitch,
                features.streams.streamers.clone(),
            )));
        }

        if features.activities.enabled {
            let weather = WeatherClient::new(require(&keys.weather_api_key, "WEATHER_API_KEY")?);
            built.activities = Some(Arc::new(Activities::new(
                home.clone(),
                weather,
                &features.activities,
            )));
        }

        if features.moderation.enabled {
            built.moderation = Some(Arc::new(Moderation::new(
                Arc::clone(&platform),
                Box::new(LexiconToxicity::new()),
                &features.moderation,
            )));
        }

        if features.gifs.enabled {
            let giphy = GiphyClient::new(require(&keys.giphy_api_key, "GIPHY_API_KEY")?);
            built.gifs = Some(Arc::new(GifReactions::new(
                Arc::clone(&platform),
                giphy,
                Box::new(LexiconSentiment::new()),
                &features.gifs,
            )));
        }

        if features.reports.enabled {
            built.reports = Some(Arc::new(Reports::new(
                Arc::clone(&platform),
                home,
                Box::new(LexiconSentiment::new()),
                config.bot.reports_dir(),
            )));
        }

        Ok(built)
    }

    /// Enabled modules in dispatch order
    pub fn modules(&self) -> Vec<Arc<dyn BehaviorModule>> {
        let mut modules: Vec<Arc<dyn BehaviorModule>> = Vec::new();
        if let Some(m) = &self.moderation {
            modules.push(m.clone());
        }
        if let Some(m) = &self.gifs {
            modules.push(m.clone());
        }
        if let Some(m) = &self.recommendations {
            modules.push(m.clone());
        }
        if let Some(m) = &self.streams {
            modules.push(m.clone());
        }
        if let Some(m) = &self.activities {
            modules.push(m.clone());
        }
        if let Some(m) = &self.reports {
            modules.push(m.clone());
        }
        modules
    }

    /// Register every enabled module and its commands
    pub fn install(&self, registry: &mut ModuleRegistry) -> Result<(), SetupError> {
        for module in self.modules() {
            registry.install(module)?;
        }
        Ok(())
    }

    /// One recurring job calling into its module, if that module is enabled
    fn job(&self, name: &'static str, rule: ScheduleRule) -> Option<RecurringJob> {
        match name {
            JOB_ANALYZE_DISCUSSIONS => {
                let module = Arc::clone(self.recommendations.as_ref()?);
                Some(RecurringJob::new(name, rule, move || {
                    let module = Arc::clone(&module);
                    async move { module.analyze_discussions().await.map(|_| ()) }
                }))
            }
            JOB_NOTIFY_STREAMERS => {
                let module = Arc::clone(self.streams.as_ref()?);
                Some(RecurringJob::new(name, rule, move || {
                    let module = Arc::clone(&module);
                    async move { module.notify_online_streamers().await.map(|_| ()) }
                }))
            }
            JOB_ACTIVITIES_MONDAY | JOB_ACTIVITIES_SATURDAY => {
                let module = Arc::clone(self.activities.as_ref()?);
                Some(RecurringJob::new(name, rule, move || {
                    let module = Arc::clone(&module);
                    async move { module.propose_activities().await.map(|_| ()) }
                }))
            }
            JOB_DAILY_REPORT | JOB_WEEKLY_REPORT => {
                let module = Arc::clone(self.reports.as_ref()?);
                let days = if name == JOB_DAILY_REPORT { 1 } else { 7 };
                Some(RecurringJob::new(name, rule, move || {
                    let module = Arc::clone(&module);
                    async move { module.generate_report(days).await.map(|_| ()) }
                }))
            }
            _ => None,
        }
    }

    /// Recurring jobs of the enabled features with their default rules,
    /// then `overrides` applied by job name. Overrides naming a known job
    /// of a disabled feature are ignored; unknown names are an error.
    pub fn job_table(
        &self,
        overrides: &BTreeMap<String, String>,
    ) -> Result<JobTable, SetupError> {
        let mut table = JobTable::new();
        for (name, rule) in &self.plan {
            if let Some(job) = self.job(*name, *rule) {
                table.add(job)?;
            }
        }
        apply_job_overrides(&mut table, overrides)?;
        Ok(table)
    }
}

/// Jobs of the enabled features with their default rules
pub fn job_plan(features: &FeaturesConfig) -> Vec<(&'static str, ScheduleRule)> {
    let mut plan = Vec::new();
    if features.recommendations.enabled {
        plan.push((JOB_ANALYZE_DISCUSSIONS, ScheduleRule::hourly()));
    }
    if features.streams.enabled {
        plan.push((
            JOB_NOTIFY_STREAMERS,
            ScheduleRule::Every(Duration::from_secs(5 * 60)),
        ));
    }
    if features.activities.enabled {
        plan.push((JOB_ACTIVITIES_MONDAY, ScheduleRule::weekly(Weekday::Mon)));
        plan.push((JOB_ACTIVITIES_SATURDAY, ScheduleRule::weekly(Weekday::Sat)));
    }
    if features.reports.enabled {
        plan.push((JOB_DAILY_REPORT, ScheduleRule::daily()));
        plan.push((JOB_WEEKLY_REPORT, ScheduleRule::weekly(Weekday::Mon)));
    }
    plan
}

fn apply_job_overrides(
    table: &mut JobTable,
    overrides: &BTreeMap<String, String>,
) -> Result<(), SetupError> {
    let mut applicable = overrides.clone();
    applicable.retain(|name, _| {
        let disabled = ALL_JOBS.contains(&name.as_str()) && table.get(name).is_none();
        if disabled {
            tracing::debug!(job = %name, "Ignoring override for a disabled feature's job");
        }
        !disabled
    });
    table.apply_overrides(&applicable)
}

/// The effective schedule for `config` without building any feature
pub fn schedule_preview(config: &Config) -> Result<JobTable, SetupError> {
    let mut table = JobTable::new();
    for (name, rule) in job_plan(&config.features) {
        table.add(RecurringJob::new(name, rule, || async { Ok(()) }))?;
    }
    apply_job_overrides(&mut table, &config.scheduler.jobs)?;
    Ok(table)
}

#[cfg(test)]
mod tests {
    use super::*;
    use salon_core::testing::MockPlatform;

    fn config(toml_text: &str) -> Config {
        toml::from_str(toml_text).unwrap()
    }

    const ALL_KEYS: &str = r#"
        [integrations]
        news_api_key = "n"
        giphy_api_key = "g"
        twitch_client_id = "i"
        twitch_client_secret = "s"
        weather_api_key = "w"
    "#;

    fn build(config: &Config) -> Features {
        let platform: Arc<dyn ChatPlatform> = Arc::new(MockPlatform::default());
        Features::from_config(config, platform, "!home:example.com").unwrap()
    }

    #[test]
    fn test_all_features_register_commands() {
        let features = build(&config(ALL_KEYS));
        let mut registry = ModuleRegistry::new();
        features.install(&mut registry).unwrap();

        assert_eq!(registry.module_count(), 6);
        let names: Vec<_> = registry.commands().map(|c| c.name.as_str()).collect();
        assert_eq!(
            names,
            vec!["activities", "leaderboard", "recommendations", "report", "streams"]
        );
    }

    #[test]
    fn test_default_job_table() {
        let features = build(&config(ALL_KEYS));
        let table = features.job_table(&BTreeMap::new()).unwrap();

        assert_eq!(table.len(), ALL_JOBS.len());
        assert_eq!(table.get(JOB_ANALYZE_DISCUSSIONS).unwrap().rule, ScheduleRule::hourly());
        assert_eq!(
            table.get(JOB_NOTIFY_STREAMERS).unwrap().rule,
            ScheduleRule::Every(Duration::from_secs(5 * 60))
        );
        assert_eq!(
            table.get(JOB_WEEKLY_REPORT).unwrap().rule,
            ScheduleRule::weekly(Weekday::Mon)
        );
    }

    #[test]
    fn test_disabled_features_have_no_jobs_or_modules() {
        let features = build(&config(
            r#"
            [features.recommendations]
            enabled = false
            [features.streams]
            enabled = false
            [features.activities]
            enabled = false
            [features.gifs]
            enabled = false
            "#,
        ));
        let table = features.job_table(&BTreeMap::new()).unwrap();
        let names: Vec<_> = table.iter().map(|j| j.name.as_str()).collect();
        assert_eq!(names.len(), 2);
        assert!(names.contains(&JOB_DAILY_REPORT));
        assert!(names.contains(&JOB_WEEKLY_REPORT));
        assert_eq!(features.modules().len(), 2);
    }

    #[test]
    fn test_overrides() {
        let features = build(&config(
            r#"
            [features.streams]
            enabled = false
            [integrations]
            news_api_key = "n"
            giphy_api_key = "g"
            weather_api_key = "w"
            "#,
        ));

        let mut overrides = BTreeMap::new();
        overrides.insert(JOB_DAILY_REPORT.to_string(), "daily at 08:30".to_string());
        overrides.insert(JOB_NOTIFY_STREAMERS.to_string(), "every 1m".to_string());
        let table = features.job_table(&overrides).unwrap();
        assert_eq!(
            table.get(JOB_DAILY_REPORT).unwrap().rule,
            "daily at 08:30".parse::<ScheduleRule>().unwrap()
        );

        overrides.insert("no-such-job".to_string(), "hourly".to_string());
        assert!(matches!(
            features.job_table(&overrides),
            Err(SetupError::UnknownJob(ref name)) if name == "no-such-job"
        ));
    }

    #[test]
    fn test_missing_key_for_enabled_feature() {
        let platform: Arc<dyn ChatPlatform> = Arc::new(MockPlatform::default());
        let result = Features::from_config(&Config::default(), platform, "!home:example.com");
        assert!(matches!(
            result,
            Err(SetupError::MissingCredential("NEWS_API_KEY"))
        ));
    }

    #[test]
    fn test_schedule_preview_matches_job_table() {
        let mut config = config(ALL_KEYS);
        config
            .scheduler
            .jobs
            .insert(JOB_WEEKLY_REPORT.to_string(), "friday at 17:00".to_string());

        let preview = schedule_preview(&config).unwrap();
        let table = build(&config).job_table(&config.scheduler.jobs).unwrap();

        let rules = |t: &JobTable| -> Vec<(String, ScheduleRule)> {
            t.iter().map(|j| (j.name.clone(), j.rule)).collect()
        };
        assert_eq!(rules(&preview), rules(&table));
        assert_eq!(
            preview.get(JOB_WEEKLY_REPORT).unwrap().rule,
            ScheduleRule::Weekly {
                day: Weekday::Fri,
                at: chrono::NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
            }
        );
    }
}
