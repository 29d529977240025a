// Discord layer - serenity adapters and gateway event handlers.

#[path = "inactivity/events.rs"]
pub mod events;
#[path = "inactivity/presence.rs"]
pub mod presence;
#[path = "inactivity/serenity_platform.rs"]
pub mod serenity_platform;
#[path = "inactivity/sweep_task.rs"]
pub mod sweep_task;

use crate::core::inactivity::{ActivityStore, InactivityService};
use std::sync::Arc;
use std::time::Duration;

/// Data that's shared across all event handlers.
/// This is where we store our services and configuration.
pub struct Data {
    pub inactivity: Arc<InactivityService<dyn ActivityStore>>,
    pub command_prefix: String,
    pub sweep_interval: Duration,
    pub guild_pause: Duration,
}

pub type Error = Box<dyn std::error::Error + Send + Sync>;
