// ABOUTME: Configuration parsing from TOML file with environment variable overrides
// ABOUTME: Validates credentials, the home channel, and the time zone before anything connects
use crate::error::SetupError;
use crate::paths;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub matrix: MatrixConfig,
    #[serde(default)]
    pub bot: BotConfig,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
    #[serde(default)]
    pub features: FeaturesConfig,
    #[serde(default)]
    pub integrations: IntegrationsConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

// ─── Matrix ─────────────────────────────────────────────────────

#[derive(Clone, Serialize, Deserialize)]
pub struct MatrixConfig {
    #[serde(default)]
    pub home_server: String,
    #[serde(default)]
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub access_token: Option<String>,
    #[serde(default = "default_device_name")]
    pub device_name: String,
}

impl Default for MatrixConfig {
    fn default() -> Self {
        Self {
            home_server: String::new(),
            user_id: String::new(),
            password: None,
            access_token: None,
            device_name: default_device_name(),
        }
    }
}

// Custom Debug impl to redact sensitive fields
impl std::fmt::Debug for MatrixConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MatrixConfig")
            .field("home_server", &self.home_server)
            .field("user_id", &self.user_id)
            .field("password", &self.password.as_ref().map(|_| "[REDACTED]"))
            .field(
                "access_token",
                &self.access_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("device_name", &self.device_name)
            .finish()
    }
}

fn default_device_name() -> String {
    "salon-bot".to_string()
}

// ─── Bot ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BotConfig {
    /// Room id or alias every job posts to
    #[serde(default)]
    pub home_channel: String,
    /// Long-form command prefix; `!<command>` always works too
    #[serde(default = "default_command_prefix")]
    pub command_prefix: String,
    #[serde(default = "default_data_dir")]
    pub data_dir: String,
    /// Inactivity gap separating two discussions
    #[serde(default = "default_gap_minutes")]
    pub gap_minutes: i64,
    /// Messages fetched from the home channel per analysis pass
    #[serde(default = "default_history_limit")]
    pub history_limit: usize,
}

impl Default for BotConfig {
    fn default() -> Self {
        Self {
            home_channel: String::new(),
            command_prefix: default_command_prefix(),
            data_dir: default_data_dir(),
            gap_minutes: default_gap_minutes(),
            history_limit: default_history_limit(),
        }
    }
}

impl BotConfig {
    pub fn data_path(&self) -> PathBuf {
        PathBuf::from(&self.data_dir)
    }

    pub fn discussions_dir(&self) -> PathBuf {
        self.data_path().join("discussions")
    }

    pub fn reports_dir(&self) -> PathBuf {
        self.data_path().join("reports")
    }

    pub fn log_dir(&self) -> PathBuf {
        self.data_path().join("logs")
    }

    pub fn matrix_store_dir(&self) -> PathBuf {
        self.data_path().join("matrix_store")
    }

    /// Inactivity gap; saturates when `gap_minutes` is out of range
    pub fn gap(&self) -> chrono::Duration {
        chrono::Duration::try_minutes(self.gap_minutes).unwrap_or(chrono::Duration::MAX)
    }
}

fn default_command_prefix() -> String {
    "!salon".to_string()
}

fn default_data_dir() -> String {
    paths::data_dir().to_string_lossy().to_string()
}

fn default_gap_minutes() -> i64 {
    crate::discussion::DEFAULT_GAP_MINUTES
}

fn default_history_limit() -> usize {
    300
}

// ─── Scheduler ──────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedulerConfig {
    /// IANA time zone used for daily and weekly rules. Defaults to the system zone.
    #[serde(default = "default_timezone")]
    pub timezone: String,
    #[serde(default = "default_tick_millis")]
    pub tick_millis: u64,
    /// Rule overrides keyed by job name, e.g. `daily-report = "daily at 18:00"`
    #[serde(default)]
    pub jobs: BTreeMap<String, String>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            timezone: default_timezone(),
            tick_millis: default_tick_millis(),
            jobs: BTreeMap::new(),
        }
    }
}

impl SchedulerConfig {
    pub fn tz(&self) -> Result<chrono_tz::Tz, SetupError> {
        self.timezone.parse::<chrono_tz::Tz>().map_err(|_| {
            SetupError::InvalidConfig(format!(
                "invalid timezone '{}', use IANA names like 'Europe/Paris' or 'UTC'",
                self.timezone
            ))
        })
    }

    pub fn tick(&self) -> std::time::Duration {
        std::time::Duration::from_millis(self.tick_millis.max(1))
    }
}

fn default_timezone() -> String {
    if let Ok(tz) = std::env::var("TZ") {
        if tz.parse::<chrono_tz::Tz>().is_ok() {
            return tz;
        }
    }
    #[cfg(unix)]
    {
        if let Ok(link) = std::fs::read_link("/etc/localtime") {
            if let Some(tz) = link.to_str() {
                // e.g. /usr/share/zoneinfo/Europe/Paris
                if let Some(pos) = tz.find("zoneinfo/") {
                    let detected = tz[pos + 9..].to_string();
                    if detected.parse::<chrono_tz::Tz>().is_ok() {
                        return detected;
                    }
                }
            }
        }
    }
    "UTC".to_string()
}

fn default_tick_millis() -> u64 {
    1000
}

// ─── Features ───────────────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FeaturesConfig {
    #[serde(default)]
    pub recommendations: RecommendationsConfig,
    #[serde(default)]
    pub streams: StreamsConfig,
    #[serde(default)]
    pub activities: ActivitiesConfig,
    #[serde(default)]
    pub moderation: ModerationConfig,
    #[serde(default)]
    pub gifs: GifsConfig,
    #[serde(default)]
    pub reports: ReportsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecommendationsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default = "default_topics_per_discussion")]
    pub topics_per_discussion: usize,
    #[serde(default = "default_articles_per_topic")]
    pub articles_per_topic: usize,
}

impl Default for RecommendationsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            topics_per_discussion: default_topics_per_discussion(),
            articles_per_topic: default_articles_per_topic(),
        }
    }
}

fn default_topics_per_discussion() -> usize {
    3
}

fn default_articles_per_topic() -> usize {
    2
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StreamsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Twitch logins to watch
    #[serde(default)]
    pub streamers: Vec<String>,
}

impl Default for StreamsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            streamers: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivitiesConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Directory of per-member `.ics` calendars
    #[serde(default = "default_calendars_dir")]
    pub calendars_dir: String,
    /// CSV with an `activity` column
    #[serde(default = "default_activities_file")]
    pub activities_file: String,
    #[serde(default = "default_location")]
    pub location: String,
    #[serde(default = "default_min_members")]
    pub min_members: usize,
    #[serde(default = "default_suggestions")]
    pub suggestions: usize,
    /// Forecast condition a slot must have to be proposed
    #[serde(default = "default_condition")]
    pub condition: String,
}

impl Default for ActivitiesConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            calendars_dir: default_calendars_dir(),
            activities_file: default_activities_file(),
            location: default_location(),
            min_members: default_min_members(),
            suggestions: default_suggestions(),
            condition: default_condition(),
        }
    }
}

fn default_calendars_dir() -> String {
    "data/calendars".to_string()
}

fn default_activities_file() -> String {
    "data/activities.csv".to_string()
}

fn default_location() -> String {
    "Aix-en-Provence".to_string()
}

fn default_min_members() -> usize {
    2
}

fn default_suggestions() -> usize {
    3
}

fn default_condition() -> String {
    "Sunny".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModerationConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Messages scoring above this are treated as toxic
    #[serde(default = "default_toxicity_threshold")]
    pub toxicity_threshold: f64,
    /// Redact flagged messages when the transport allows it
    #[serde(default = "default_true")]
    pub delete_messages: bool,
}

impl Default for ModerationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            toxicity_threshold: default_toxicity_threshold(),
            delete_messages: true,
        }
    }
}

fn default_toxicity_threshold() -> f64 {
    0.7
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GifsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// Absolute compound sentiment needed before a gif is posted
    #[serde(default = "default_sentiment_threshold")]
    pub sentiment_threshold: f64,
    #[serde(default = "default_gif_results")]
    pub results: usize,
}

impl Default for GifsConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            sentiment_threshold: default_sentiment_threshold(),
            results: default_gif_results(),
        }
    }
}

fn default_sentiment_threshold() -> f64 {
    0.45
}

fn default_gif_results() -> usize {
    5
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportsConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl Default for ReportsConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

fn default_true() -> bool {
    true
}

// ─── Integrations ───────────────────────────────────────────────

#[derive(Clone, Default, Serialize, Deserialize)]
pub struct IntegrationsConfig {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub news_api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub giphy_api_key: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitch_client_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub twitch_client_secret: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub weather_api_key: Option<String>,
}

impl std::fmt::Debug for IntegrationsConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let redact = |v: &Option<String>| v.as_ref().map(|_| "[REDACTED]");
        f.debug_struct("IntegrationsConfig")
            .field("news_api_key", &redact(&self.news_api_key))
            .field("giphy_api_key", &redact(&self.giphy_api_key))
            .field("twitch_client_id", &self.twitch_client_id)
            .field("twitch_client_secret", &redact(&self.twitch_client_secret))
            .field("weather_api_key", &redact(&self.weather_api_key))
            .finish()
    }
}

// ─── Logging & metrics ──────────────────────────────────────────

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Emit JSON lines on stdout instead of the human format
    #[serde(default)]
    pub json: bool,
    /// Also write a daily-rotated log under the data directory
    #[serde(default)]
    pub file: bool,
    /// Filter directives used when RUST_LOG is unset
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default = "default_metrics_port")]
    pub port: u16,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            port: default_metrics_port(),
        }
    }
}

fn default_metrics_port() -> u16 {
    9464
}

// ─── Loading ────────────────────────────────────────────────────

fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

impl Config {
    /// Find the config file, checking in order:
    /// 1. SALON_CONFIG_PATH env var (if set)
    /// 2. ./config.toml
    /// 3. ~/.config/salon/config.toml
    fn find_config_file() -> Option<PathBuf> {
        if let Some(env_path) = env_var("SALON_CONFIG_PATH") {
            let path = PathBuf::from(&env_path);
            if path.exists() {
                return Some(path);
            }
        }

        let local_config = PathBuf::from("config.toml");
        if local_config.exists() {
            return Some(local_config);
        }

        let xdg_config = paths::config_file();
        if xdg_config.exists() {
            return Some(xdg_config);
        }

        None
    }

    /// Load configuration from file (if any) plus environment overrides, then validate
    pub fn load() -> Result<Self> {
        let config = Self::load_unvalidated()?;
        config.validate()?;
        Ok(config)
    }

    /// Load without validation; used by `check-config` to report every problem
    pub fn load_unvalidated() -> Result<Self> {
        let mut config = if let Some(config_path) = Self::find_config_file() {
            tracing::info!(
                path = %config_path.display(),
                "Loading configuration from file"
            );
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("Failed to read {}", config_path.display()))?;
            toml::from_str::<Config>(&content)
                .with_context(|| format!("Failed to parse {}", config_path.display()))?
        } else {
            tracing::info!("No config file found, using environment variables and defaults");
            Config::default()
        };

        config.apply_env_overrides()?;
        config.bot.data_dir = paths::expand_tilde(&config.bot.data_dir);
        config.features.activities.calendars_dir =
            paths::expand_tilde(&config.features.activities.calendars_dir);
        config.features.activities.activities_file =
            paths::expand_tilde(&config.features.activities.activities_file);
        Ok(config)
    }

    fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(val) = env_var("MATRIX_HOME_SERVER") {
            self.matrix.home_server = val;
        }
        if let Some(val) = env_var("MATRIX_USER_ID") {
            self.matrix.user_id = val;
        }
        if let Some(val) = env_var("MATRIX_PASSWORD") {
            self.matrix.password = Some(val);
        }
        if let Some(val) = env_var("MATRIX_ACCESS_TOKEN") {
            self.matrix.access_token = Some(val);
        }
        if let Some(val) = env_var("MATRIX_DEVICE_NAME") {
            self.matrix.device_name = val;
        }
        if let Some(val) = env_var("SALON_HOME_CHANNEL") {
            self.bot.home_channel = val;
        }
        if let Some(val) = env_var("SALON_DATA_DIR") {
            self.bot.data_dir = val;
        }
        if let Some(val) = env_var("SCHEDULER_TIMEZONE") {
            self.scheduler.timezone = val;
        }
        if let Some(val) = env_var("SCHEDULER_TICK_MILLIS") {
            self.scheduler.tick_millis = val.parse().with_context(|| {
                format!("SCHEDULER_TICK_MILLIS must be a number, got: {}", val)
            })?;
        }
        if let Some(val) = env_var("NEWS_API_KEY") {
            self.integrations.news_api_key = Some(val);
        }
        if let Some(val) = env_var("GIPHY_API_KEY") {
            self.integrations.giphy_api_key = Some(val);
        }
        if let Some(val) = env_var("TWITCH_CLIENT_ID") {
            self.integrations.twitch_client_id = Some(val);
        }
        if let Some(val) = env_var("TWITCH_CLIENT_SECRET") {
            self.integrations.twitch_client_secret = Some(val);
        }
        if let Some(val) = env_var("WEATHER_API_KEY") {
            self.integrations.weather_api_key = Some(val);
        }
        Ok(())
    }

    /// Check everything that must hold before connecting
    pub fn validate(&self) -> Result<(), SetupError> {
        self.scheduler.tz()?;

        if self.matrix.home_server.trim().is_empty() {
            return Err(SetupError::InvalidConfig(
                "matrix.home_server is required (set in config.toml or MATRIX_HOME_SERVER)"
                    .to_string(),
            ));
        }
        if self.matrix.user_id.trim().is_empty() {
            return Err(SetupError::InvalidConfig(
                "matrix.user_id is required (set in config.toml or MATRIX_USER_ID)".to_string(),
            ));
        }
        if self.matrix.password.is_none() && self.matrix.access_token.is_none() {
            return Err(SetupError::MissingCredential("MATRIX_PASSWORD or MATRIX_ACCESS_TOKEN"));
        }
        if self.bot.home_channel.trim().is_empty() {
            return Err(SetupError::InvalidConfig(
                "bot.home_channel is required (set in config.toml or SALON_HOME_CHANNEL)"
                    .to_string(),
            ));
        }
        if self.bot.gap_minutes <= 0 {
            return Err(SetupError::InvalidConfig(
                "bot.gap_minutes must be positive".to_string(),
            ));
        }
        if chrono::Duration::try_minutes(self.bot.gap_minutes).is_none() {
            return Err(SetupError::InvalidConfig(
                "bot.gap_minutes is out of range".to_string(),
            ));
        }

        let features = &self.features;
        let keys = &self.integrations;
        if features.recommendations.enabled && keys.news_api_key.is_none() {
            return Err(SetupError::MissingCredential("NEWS_API_KEY"));
        }
        if features.gifs.enabled && keys.giphy_api_key.is_none() {
            return Err(SetupError::MissingCredential("GIPHY_API_KEY"));
        }
        if features.streams.enabled {
            if keys.twitch_client_id.is_none() {
                return Err(SetupError::MissingCredential("TWITCH_CLIENT_ID"));
            }
            if keys.twitch_client_secret.is_none() {
                return Err(SetupError::MissingCredential("TWITCH_CLIENT_SECRET"));
            }
        }
        if features.activities.enabled && keys.weather_api_key.is_none() {
            return Err(SetupError::MissingCredential("WEATHER_API_KEY"));
        }

        Ok(())
    }
}
