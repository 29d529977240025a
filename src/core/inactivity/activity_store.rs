// Storage port for the inactivity system.
//
// Core defines WHAT it needs from persistence; infra provides SQLite and
// in-memory implementations. Every mutation is persisted before it returns,
// and writes are last-writer-wins (there is no version token on records).
// Hot fields (sweep day, activity time, immunity) have their own column
// writes so a concurrent settings change never rolls them back.

use super::inactivity_models::{GuildRecord, UserRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Record already exists for user {user_id} in guild {guild_id}")]
    Conflict { guild_id: u64, user_id: u64 },

    #[error("Connection timed out after {0} seconds")]
    ConnectTimeout(u64),
}

/// Trait for persisting guild configuration and per-user activity.
///
/// Missing records are reported as `Ok(None)`, never as errors.
#[async_trait]
pub trait ActivityStore: Send + Sync {
    async fn get_guild(&self, guild_id: u64) -> Result<Option<GuildRecord>, StoreError>;

    /// Insert a guild, or replace the settings of an existing one.
    ///
    /// `last_sweep_day` is only taken from `guild` on insert; afterwards it
    /// moves exclusively through `set_last_sweep_day`.
    async fn upsert_guild(&self, guild: &GuildRecord) -> Result<(), StoreError>;

    /// Record the day of the latest sweep. No-op for an unknown guild.
    async fn set_last_sweep_day(&self, guild_id: u64, day: i64) -> Result<(), StoreError>;

    /// Delete a guild and every user record that belongs to it.
    async fn delete_guild(&self, guild_id: u64) -> Result<(), StoreError>;

    async fn list_guilds(&self) -> Result<Vec<GuildRecord>, StoreError>;

    async fn count_guilds(&self) -> Result<u64, StoreError>;

    async fn get_user(&self, guild_id: u64, user_id: u64)
        -> Result<Option<UserRecord>, StoreError>;

    /// Insert a new user record. Fails with `StoreError::Conflict` if one exists.
    async fn create_user(&self, user: &UserRecord) -> Result<(), StoreError>;

    /// Replace an existing user record (creating it if it vanished meanwhile).
    async fn update_user(&self, user: &UserRecord) -> Result<(), StoreError>;

    /// Set only `last_activity_at`. Returns `false` when there is no record.
    async fn touch_user(
        &self,
        guild_id: u64,
        user_id: u64,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError>;

    /// Set only `immune`. Returns `false` when there is no record.
    async fn set_user_immunity(
        &self,
        guild_id: u64,
        user_id: u64,
        immune: bool,
    ) -> Result<bool, StoreError>;

    async fn delete_user(&self, guild_id: u64, user_id: u64) -> Result<(), StoreError>;

    async fn delete_all_users(&self, guild_id: u64) -> Result<(), StoreError>;

    /// All user records of a guild, in no particular order.
    async fn list_users(&self, guild_id: u64) -> Result<Vec<UserRecord>, StoreError>;
}
