// ABOUTME: Recurring job table and the wall-clock scheduler thread
// ABOUTME: Each schedule keeps a fired-period watermark so a job runs at most once per period

use crate::bridge::{JobFuture, SubmissionBridge, SubmitOutcome};
use crate::error::SetupError;
use chrono::{DateTime, Datelike, NaiveDate, NaiveTime, Utc, Weekday};
use chrono_tz::Tz;
use std::collections::BTreeMap;
use std::fmt;
use std::future::Future;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::JoinHandle;
use std::time::Duration;

/// Default scheduler tick
pub const DEFAULT_TICK: Duration = Duration::from_secs(1);

// =============================================================================
// Rules
// =============================================================================

/// When a recurring job should run
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScheduleRule {
    /// Every fixed interval, counted from scheduler start
    Every(Duration),
    /// Once a day, at or after a time of day
    Daily { at: NaiveTime },
    /// Once a week on `day`, at or after a time of day
    Weekly { day: Weekday, at: NaiveTime },
}

impl ScheduleRule {
    pub fn hourly() -> Self {
        Self::Every(Duration::from_secs(3600))
    }

    pub fn daily() -> Self {
        Self::Daily { at: NaiveTime::MIN }
    }

    pub fn weekly(day: Weekday) -> Self {
        Self::Weekly {
            day,
            at: NaiveTime::MIN,
        }
    }
}

impl fmt::Display for ScheduleRule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Every(d) => {
                let secs = d.as_secs();
                if secs % 86_400 == 0 {
                    write!(f, "every {}d", secs / 86_400)
                } else if secs % 3600 == 0 {
                    write!(f, "every {}h", secs / 3600)
                } else if secs % 60 == 0 {
                    write!(f, "every {}m", secs / 60)
                } else {
                    write!(f, "every {}s", secs)
                }
            }
            Self::Daily { at } => write!(f, "daily at {}", at.format("%H:%M")),
            Self::Weekly { day, at } => {
                write!(f, "{} at {}", weekday_name(*day), at.format("%H:%M"))
            }
        }
    }
}

impl FromStr for ScheduleRule {
    type Err = SetupError;

    /// Accepts `every <n><s|m|h|d>`, `hourly`, `daily [at HH:MM]`, `<weekday> [at HH:MM]`
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = |reason: &str| SetupError::InvalidScheduleRule {
            rule: s.to_string(),
            reason: reason.to_string(),
        };

        let lowered = s.trim().to_lowercase();
        let words: Vec<&str> = lowered.split_whitespace().collect();

        match words.as_slice() {
            [] => Err(invalid("empty rule")),
            ["hourly"] => Ok(Self::hourly()),
            ["every", amount] => parse_interval(amount)
                .map(Self::Every)
                .ok_or_else(|| invalid("expected an interval like 5m, 1h or 30s")),
            [head, rest @ ..] => {
                let at = match rest {
                    [] => NaiveTime::MIN,
                    ["at", time] => NaiveTime::parse_from_str(time, "%H:%M")
                        .map_err(|_| invalid("expected a time of day as HH:MM"))?,
                    _ => return Err(invalid("expected `at HH:MM` after the day")),
                };
                if *head == "daily" {
                    return Ok(Self::Daily { at });
                }
                let day = parse_weekday(head).ok_or_else(|| invalid("unknown day"))?;
                Ok(Self::Weekly { day, at })
            }
        }
    }
}

fn parse_interval(amount: &str) -> Option<Duration> {
    let unit_at = amount.find(|c: char| !c.is_ascii_digit())?;
    let (digits, unit) = amount.split_at(unit_at);
    let n: u64 = digits.parse().ok()?;
    if n == 0 {
        return None;
    }
    let secs = match unit {
        "s" => n,
        "m" => n.checked_mul(60)?,
        "h" => n.checked_mul(3600)?,
        "d" => n.checked_mul(86_400)?,
        _ => return None,
    };
    Some(Duration::from_secs(secs))
}

fn parse_weekday(word: &str) -> Option<Weekday> {
    match word {
        "monday" => Some(Weekday::Mon),
        "tuesday" => Some(Weekday::Tue),
        "wednesday" => Some(Weekday::Wed),
        "thursday" => Some(Weekday::Thu),
        "friday" => Some(Weekday::Fri),
        "saturday" => Some(Weekday::Sat),
        "sunday" => Some(Weekday::Sun),
        _ => None,
    }
}

fn weekday_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "monday",
        Weekday::Tue => "tuesday",
        Weekday::Wed => "wednesday",
        Weekday::Thu => "thursday",
        Weekday::Fri => "friday",
        Weekday::Sat => "saturday",
        Weekday::Sun => "sunday",
    }
}

// =============================================================================
// Schedules
// =============================================================================

/// Identifies the period a firing belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PeriodKey {
    /// Number of whole intervals elapsed since the anchor
    Interval(u64),
    /// Local calendar date
    Date(NaiveDate),
}

/// A rule plus the watermark of the last period it fired in
#[derive(Debug, Clone)]
pub struct Schedule {
    rule: ScheduleRule,
    anchor: DateTime<Utc>,
    last_fired: Option<PeriodKey>,
}

impl Schedule {
    /// Start a schedule at `now`.
    ///
    /// Calendar rules whose window is already open count the current period as
    /// fired, so nothing runs on the first tick after a mid-period start.
    pub fn starting_at(rule: ScheduleRule, now: DateTime<Tz>) -> Self {
        let mut schedule = Self {
            rule,
            anchor: now.with_timezone(&Utc),
            last_fired: None,
        };
        if !matches!(rule, ScheduleRule::Every(_)) {
            schedule.last_fired = schedule.current_period(now);
        }
        schedule
    }

    pub fn rule(&self) -> ScheduleRule {
        self.rule
    }

    pub fn last_fired(&self) -> Option<PeriodKey> {
        self.last_fired
    }

    /// The period `now` falls in, when the rule's window is open
    pub fn current_period(&self, now: DateTime<Tz>) -> Option<PeriodKey> {
        match self.rule {
            ScheduleRule::Every(interval) => {
                let elapsed = (now.with_timezone(&Utc) - self.anchor).to_std().ok()?;
                let key = (elapsed.as_millis() / interval.as_millis().max(1)) as u64;
                (key >= 1).then_some(PeriodKey::Interval(key))
            }
            ScheduleRule::Daily { at } => {
                (now.time() >= at).then(|| PeriodKey::Date(now.date_naive()))
            }
            ScheduleRule::Weekly { day, at } => (now.weekday() == day && now.time() >= at)
                .then(|| PeriodKey::Date(now.date_naive())),
        }
    }

    /// Whether the job is due; advances the watermark when it is
    pub fn poll(&mut self, now: DateTime<Tz>) -> bool {
        let Some(key) = self.current_period(now) else {
            return false;
        };
        if self.last_fired == Some(key) {
            return false;
        }
        self.last_fired = Some(key);
        true
    }
}

// =============================================================================
// Job table
// =============================================================================

type JobAction = Arc<dyn Fn() -> JobFuture + Send + Sync>;

/// A named rule plus a factory producing the work for each firing
#[derive(Clone)]
pub struct RecurringJob {
    pub name: String,
    pub rule: ScheduleRule,
    action: JobAction,
}

impl fmt::Debug for RecurringJob {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RecurringJob")
            .field("name", &self.name)
            .field("rule", &self.rule)
            .finish()
    }
}

impl RecurringJob {
    pub fn new<F, Fut>(name: impl Into<String>, rule: ScheduleRule, action: F) -> Self
    where
        F: Fn() -> Fut + Send + Sync + 'static,
        Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
    {
        Self {
            name: name.into(),
            rule,
            action: Arc::new(move || -> JobFuture { Box::pin(action()) }),
        }
    }

    /// Build the future for one firing
    pub fn start(&self) -> JobFuture {
        (self.action)()
    }
}

/// The fixed set of recurring jobs
#[derive(Debug, Clone, Default)]
pub struct JobTable {
    jobs: Vec<RecurringJob>,
}

impl JobTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, job: RecurringJob) -> Result<(), SetupError> {
        if self.jobs.iter().any(|j| j.name == job.name) {
            return Err(SetupError::InvalidConfig(format!(
                "recurring job `{}` defined twice",
                job.name
            )));
        }
        self.jobs.push(job);
        Ok(())
    }

    /// Replace rules by job name, e.g. from configuration
    pub fn apply_overrides(&mut self, overrides: &BTreeMap<String, String>) -> Result<(), SetupError> {
        for (name, rule) in overrides {
            let job = self
                .jobs
                .iter_mut()
                .find(|j| &j.name == name)
                .ok_or_else(|| SetupError::UnknownJob(name.clone()))?;
            job.rule = rule.parse()?;
            tracing::info!(job = %name, rule = %job.rule, "Overriding job schedule");
        }
        Ok(())
    }

    pub fn get(&self, name: &str) -> Option<&RecurringJob> {
        self.jobs.iter().find(|j| j.name == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &RecurringJob> {
        self.jobs.iter()
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }
}

// =============================================================================
// Scheduler
// =============================================================================

/// Jobs handed to the loop during one tick
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TickReport {
    pub submitted: Vec<String>,
    pub dropped: Vec<String>,
}

impl TickReport {
    pub fn is_empty(&self) -> bool {
        self.submitted.is_empty() && self.dropped.is_empty()
    }
}

/// Polls every schedule and submits due jobs through the bridge
pub struct Scheduler {
    entries: Vec<(RecurringJob, Schedule)>,
    timezone: Tz,
    bridge: SubmissionBridge,
}

impl Scheduler {
    pub fn new(table: JobTable, timezone: Tz, bridge: SubmissionBridge, now: DateTime<Utc>) -> Self {
        let local = now.with_timezone(&timezone);
        let entries = table
            .jobs
            .into_iter()
            .map(|job| {
                let schedule = Schedule::starting_at(job.rule, local);
                (job, schedule)
            })
            .collect();
        Self {
            entries,
            timezone,
            bridge,
        }
    }

    pub fn timezone(&self) -> Tz {
        self.timezone
    }

    /// Submit every job that is due at `now`.
    ///
    /// The watermark moves before the submission attempt, so a dropped job
    /// waits for its next period.
    pub fn run_pending(&mut self, now: DateTime<Utc>) -> TickReport {
        let local = now.with_timezone(&self.timezone);
        let mut report = TickReport::default();

        for (job, schedule) in &mut self.entries {
            if !schedule.poll(local) {
                continue;
            }
            match self.bridge.submit(&job.name, job.start()) {
                SubmitOutcome::Submitted => report.submitted.push(job.name.clone()),
                SubmitOutcome::Dropped => report.dropped.push(job.name.clone()),
            }
        }

        report
    }
}

/// The scheduler running on its own OS thread
pub struct SchedulerThread {
    stop: Arc<AtomicBool>,
    handle: Option<JoinHandle<()>>,
}

impl SchedulerThread {
    pub fn spawn(mut scheduler: Scheduler, tick: Duration) -> anyhow::Result<Self> {
        let stop = Arc::new(AtomicBool::new(false));
        let stop_flag = Arc::clone(&stop);

        tracing::info!(
            tick_ms = tick.as_millis() as u64,
            timezone = %scheduler.timezone(),
            jobs = scheduler.entries.len(),
            "Starting scheduler thread"
        );

        let handle = std::thread::Builder::new()
            .name("salon-scheduler".to_string())
            .spawn(move || {
                while !stop_flag.load(Ordering::Acquire) {
                    let report = scheduler.run_pending(Utc::now());
                    if !report.is_empty() {
                        tracing::debug!(
                            submitted = ?report.submitted,
                            dropped = ?report.dropped,
                            "Scheduler tick"
                        );
                    }
                    std::thread::park_timeout(tick);
                }
                tracing::info!("Scheduler thread stopped");
            })?;

        Ok(Self {
            stop,
            handle: Some(handle),
        })
    }

    /// Stop ticking and wait for the thread to exit
    pub fn shutdown(mut self) {
        self.stop_and_join();
    }

    fn stop_and_join(&mut self) {
        self.stop.store(true, Ordering::Release);
        if let Some(handle) = self.handle.take() {
            handle.thread().unpark();
            if handle.join().is_err() {
                tracing::error!("Scheduler thread panicked");
            }
        }
    }
}

impl Drop for SchedulerThread {
    fn drop(&mut self) {
        self.stop_and_join();
    }
}
