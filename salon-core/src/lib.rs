// ABOUTME: Platform-agnostic core of the salon community bot
// ABOUTME: Segmentation, module registry and dispatch bus, scheduler thread, and the loop bridge

pub mod bridge;
pub mod commands;
pub mod config;
pub mod discussion;
pub mod error;
pub mod message;
pub mod metrics;
pub mod paths;
pub mod registry;
pub mod reply;
pub mod scheduler;
pub mod testing;
pub mod traits;

pub use bridge::{submission_bridge, BridgeEndpoint, JobFuture, SubmissionBridge, SubmitOutcome};
pub use discussion::{segment_discussions, DiscussionArchive, DiscussionSegmenter};
pub use error::{CommandError, DispatchError, ExternalCallError, ScheduledJobError, SetupError};
pub use message::{Discussion, Message};
pub use registry::{
    BehaviorModule, Command, CommandContext, CommandHandler, DispatchOutcome, EventBus,
    ModuleRegistry,
};
pub use reply::Replier;
pub use scheduler::{JobTable, RecurringJob, ScheduleRule, Scheduler, SchedulerThread};

// Re-export core traits for convenient access
pub use traits::{
    // Tier 1: Messaging Platform
    EventStream, MessagingPlatform,
    // Tier 2: Chat Platform
    ChannelInfo, ChatPlatform, HistoryQuery, MessageModerator,
    // Data Types
    ChatUser, IncomingMessage, MessageContent,
};
