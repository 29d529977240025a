// Serenity-backed implementation of the core `GuildPlatform` port.
//
// Everything here converts between serenity's typed ids and the raw u64 ids
// that core works with. No decisions are made in this file.

use crate::core::inactivity::{GuildInfo, GuildPlatform, PlatformError};
use async_trait::async_trait;
use poise::serenity_prelude as serenity;
use std::sync::Arc;

/// Discord caps one member page at 1000 entries.
const MEMBER_PAGE_SIZE: u64 = 1000;

#[derive(Clone)]
pub struct SerenityPlatform {
    http: Arc<serenity::Http>,
    cache: Arc<serenity::Cache>,
}

impl SerenityPlatform {
    pub fn new(http: Arc<serenity::Http>, cache: Arc<serenity::Cache>) -> Self {
        Self { http, cache }
    }

    pub fn from_context(ctx: &serenity::Context) -> Self {
        Self::new(ctx.http.clone(), ctx.cache.clone())
    }
}

fn request_error(e: serenity::Error) -> PlatformError {
    PlatformError::Request(e.to_string())
}

#[async_trait]
impl GuildPlatform for SerenityPlatform {
    async fn send_direct_message(&self, user_id: u64, text: &str) -> Result<(), PlatformError> {
        let dm_channel = serenity::UserId::new(user_id)
            .create_dm_channel(self.http.as_ref())
            .await
            .map_err(request_error)?;
        dm_channel
            .say(self.http.as_ref(), text)
            .await
            .map_err(request_error)?;
        Ok(())
    }

    async fn send_channel_message(
        &self,
        channel_id: u64,
        text: &str,
    ) -> Result<(), PlatformError> {
        serenity::ChannelId::new(channel_id)
            .say(self.http.as_ref(), text)
            .await
            .map_err(request_error)?;
        Ok(())
    }

    async fn remove_member(
        &self,
        guild_id: u64,
        user_id: u64,
        audit_reason: &str,
    ) -> Result<(), PlatformError> {
        serenity::GuildId::new(guild_id)
            .kick_with_reason(
                self.http.as_ref(),
                serenity::UserId::new(user_id),
                audit_reason,
            )
            .await
            .map_err(request_error)
    }

    async fn delete_message(
        &self,
        channel_id: u64,
        message_id: u64,
    ) -> Result<(), PlatformError> {
        serenity::ChannelId::new(channel_id)
            .delete_message(self.http.as_ref(), serenity::MessageId::new(message_id))
            .await
            .map_err(request_error)
    }

    async fn list_members(&self, guild_id: u64) -> Result<Vec<u64>, PlatformError> {
        let guild_id = serenity::GuildId::new(guild_id);
        let mut member_ids = Vec::new();
        let mut after: Option<serenity::UserId> = None;

        loop {
            let page = guild_id
                .members(self.http.as_ref(), Some(MEMBER_PAGE_SIZE), after)
                .await
                .map_err(request_error)?;

            let page_len = page.len() as u64;
            member_ids.extend(page.iter().map(|member| member.user.id.get()));

            // Pages are ordered by user id, so the last one is the next cursor.
            match page.last() {
                Some(last) if page_len == MEMBER_PAGE_SIZE => after = Some(last.user.id),
                _ => break,
            }
        }

        tracing::debug!(
            guild_id = guild_id.get(),
            count = member_ids.len(),
            "Fetched guild members"
        );
        Ok(member_ids)
    }

    async fn resolve_mention(
        &self,
        guild_id: u64,
        token: &str,
    ) -> Result<Option<u64>, PlatformError> {
        let Some(user_id) = ::serenity::utils::parse_user_mention(token) else {
            return Ok(None);
        };

        match serenity::GuildId::new(guild_id)
            .member(self.http.as_ref(), user_id)
            .await
        {
            Ok(member) => Ok(Some(member.user.id.get())),
            Err(e) => {
                tracing::debug!(guild_id, user_id = user_id.get(), "Member lookup failed: {}", e);
                Ok(None)
            }
        }
    }

    async fn guild_info(&self, guild_id: u64) -> Result<GuildInfo, PlatformError> {
        let id = serenity::GuildId::new(guild_id);

        // The cache guard must be released before the next await.
        let cached = self
            .cache
            .guild(id)
            .map(|guild| (guild.owner_id.get(), guild.name.clone()));

        let (owner_id, display_name) = match cached {
            Some(found) => found,
            None => {
                let partial = id.to_partial_guild(self.http.as_ref()).await.map_err(|e| {
                    tracing::debug!(guild_id, "Partial guild lookup failed: {}", e);
                    PlatformError::GuildUnavailable(guild_id)
                })?;
                (partial.owner_id.get(), partial.name)
            }
        };

        Ok(GuildInfo {
            id: guild_id,
            owner_id,
            display_name,
        })
    }

    fn self_account_id(&self) -> u64 {
        self.cache.current_user().id.get()
    }

    async fn leave_guild(&self, guild_id: u64) -> Result<(), PlatformError> {
        serenity::GuildId::new(guild_id)
            .leave(self.http.as_ref())
            .await
            .map_err(request_error)
    }
}
