// ABOUTME: Metric names and recording helpers for dispatch, commands, and scheduled jobs
// ABOUTME: Uses the `metrics` facade; the binary decides whether an exporter is installed

use metrics::{counter, describe_counter, describe_histogram, histogram, Unit};
use std::time::Duration;

pub const EVENTS_DISPATCHED: &str = "salon_events_dispatched_total";
pub const DISPATCH_ERRORS: &str = "salon_dispatch_errors_total";
pub const JOBS_SUBMITTED: &str = "salon_jobs_submitted_total";
pub const JOBS_DROPPED: &str = "salon_jobs_dropped_total";
pub const JOB_FAILURES: &str = "salon_job_failures_total";
pub const JOB_DURATION: &str = "salon_job_duration_seconds";
pub const COMMANDS: &str = "salon_commands_total";

/// Register descriptions with whatever recorder is installed
pub fn init_metrics() {
    describe_counter!(EVENTS_DISPATCHED, "Inbound events delivered to every module");
    describe_counter!(DISPATCH_ERRORS, "Events whose dispatch was aborted by a module error");
    describe_counter!(JOBS_SUBMITTED, "Scheduled jobs handed to the event loop");
    describe_counter!(JOBS_DROPPED, "Scheduled jobs dropped because the event loop was not running");
    describe_counter!(JOB_FAILURES, "Scheduled jobs that returned an error");
    describe_histogram!(JOB_DURATION, Unit::Seconds, "Wall time of scheduled job runs");
    describe_counter!(COMMANDS, "Chat commands invoked");
}

pub fn record_event_dispatched() {
    counter!(EVENTS_DISPATCHED).increment(1);
}

pub fn record_dispatch_error(module: &str) {
    counter!(DISPATCH_ERRORS, "module" => module.to_string()).increment(1);
}

pub fn record_job_submitted(job: &str) {
    counter!(JOBS_SUBMITTED, "job" => job.to_string()).increment(1);
}

pub fn record_job_dropped(job: &str) {
    counter!(JOBS_DROPPED, "job" => job.to_string()).increment(1);
}

pub fn record_job_failure(job: &str) {
    counter!(JOB_FAILURES, "job" => job.to_string()).increment(1);
}

pub fn record_job_duration(job: &str, elapsed: Duration) {
    histogram!(JOB_DURATION, "job" => job.to_string()).record(elapsed.as_secs_f64());
}

pub fn record_command(command: &str, outcome: &'static str) {
    counter!(COMMANDS, "command" => command.to_string(), "outcome" => outcome).increment(1);
}
