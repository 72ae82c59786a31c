// ABOUTME: Error taxonomy for setup, dispatch, scheduled jobs, commands, and external calls
// ABOUTME: Setup errors are fatal at startup; the rest are logged where they surface

use thiserror::Error;

/// Fatal conditions detected while wiring the bot together.
#[derive(Debug, Error)]
pub enum SetupError {
    #[error("missing credential: {0}")]
    MissingCredential(&'static str),

    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("required channel not found: {0}")]
    MissingChannel(String),

    #[error("command `{0}` is already registered")]
    DuplicateCommand(String),

    #[error("invalid schedule rule `{rule}`: {reason}")]
    InvalidScheduleRule { rule: String, reason: String },

    #[error("no recurring job named `{0}`")]
    UnknownJob(String),
}

/// A behavior module's handler failed while an event was being dispatched.
///
/// Remaining handlers for that event are skipped.
#[derive(Debug, Error)]
#[error("module `{module}` failed to handle event: {source}")]
pub struct DispatchError {
    pub module: String,
    #[source]
    pub source: anyhow::Error,
}

/// A recurring job's action failed on the event loop.
#[derive(Debug, Error)]
#[error("scheduled job `{job}` failed: {source}")]
pub struct ScheduledJobError {
    pub job: String,
    #[source]
    pub source: anyhow::Error,
}

/// A wrapped REST call answered with a non-success status.
#[derive(Debug, Error)]
#[error("{service} request failed with status {status}")]
pub struct ExternalCallError {
    pub service: &'static str,
    pub status: u16,
}

/// Problems resolving or binding a user-issued command.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unknown command `{0}`")]
    Unknown(String),

    #[error("missing required argument `{0}`")]
    MissingArgument(String),

    #[error("argument `{name}` expects {expected}, got `{value}`")]
    InvalidArgument {
        name: String,
        expected: &'static str,
        value: String,
    },

    #[error("too many arguments: expected at most {0}")]
    TooManyArguments(usize),
}
