// Platform port - everything the inactivity core asks of the chat platform.
//
// The Discord layer implements this on top of serenity. Core only ever sees
// primitive ids and the narrow `GuildInfo` view.

use super::inactivity_models::GuildInfo;
use async_trait::async_trait;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PlatformError {
    #[error("Platform request failed: {0}")]
    Request(String),

    #[error("Guild {0} is not available")]
    GuildUnavailable(u64),
}

#[async_trait]
pub trait GuildPlatform: Send + Sync {
    /// Direct-message a user. Fails when the user has DMs closed.
    async fn send_direct_message(&self, user_id: u64, text: &str) -> Result<(), PlatformError>;

    /// Post a reply into a guild channel.
    async fn send_channel_message(&self, channel_id: u64, text: &str)
        -> Result<(), PlatformError>;

    /// Kick a member, recording `audit_reason` in the moderation log.
    async fn remove_member(
        &self,
        guild_id: u64,
        user_id: u64,
        audit_reason: &str,
    ) -> Result<(), PlatformError>;

    async fn delete_message(&self, channel_id: u64, message_id: u64)
        -> Result<(), PlatformError>;

    /// Every member id of a guild. Implementations page through the list.
    async fn list_members(&self, guild_id: u64) -> Result<Vec<u64>, PlatformError>;

    /// Resolve a mention token (`<@123>` / `<@!123>`) to a member of the guild.
    async fn resolve_mention(
        &self,
        guild_id: u64,
        token: &str,
    ) -> Result<Option<u64>, PlatformError>;

    async fn guild_info(&self, guild_id: u64) -> Result<GuildInfo, PlatformError>;

    fn self_account_id(&self) -> u64;

    async fn leave_guild(&self, guild_id: u64) -> Result<(), PlatformError>;
}
