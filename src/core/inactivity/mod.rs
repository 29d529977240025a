// Core inactivity module - tracks member activity and kicks idle members.
// Layout: models, the storage and platform ports, then the services on top.

pub mod activity_store;
pub mod activity_tracker;
pub mod command_interpreter;
pub mod guild_policy;
pub mod inactivity_models;
pub mod inactivity_service;
pub mod inactivity_sweeper;
pub mod platform;

#[cfg(test)]
pub mod test_support;

pub use activity_store::{ActivityStore, StoreError};
pub use inactivity_models::*;
pub use inactivity_service::InactivityService;
pub use platform::{GuildPlatform, PlatformError};
