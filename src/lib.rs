// ABOUTME: Root library module for the salon bot
// ABOUTME: Feature modules, text analysis, REST integrations, the Matrix transport, and the event loop

pub mod analysis;
pub mod features;
pub mod integrations;
pub mod matrix_client;
pub mod platform;
pub mod runtime;
pub mod utils;

// Re-export platform-agnostic modules from salon-core
pub use salon_core::commands;
pub use salon_core::config;
pub use salon_core::metrics;
pub use salon_core::paths;
pub use salon_core::traits;
