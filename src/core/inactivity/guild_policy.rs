// Guild policy - validated, persisted mutation of a guild's inactivity settings.
//
// The clamping and invariant rules live on `GuildRecord` itself; this service
// loads the record, applies the change and writes it back.

use super::activity_store::ActivityStore;
use super::inactivity_models::{GuildRecord, PolicyError};
use std::sync::Arc;

pub struct GuildPolicy<S: ActivityStore + ?Sized> {
    store: Arc<S>,
}

impl<S: ActivityStore + ?Sized> GuildPolicy<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Load a guild's record, creating the default one on first contact.
    pub async fn get_or_create(&self, guild_id: u64) -> Result<GuildRecord, PolicyError> {
        if let Some(guild) = self.store.get_guild(guild_id).await? {
            return Ok(guild);
        }

        let guild = GuildRecord::new(guild_id);
        self.store.upsert_guild(&guild).await?;
        tracing::info!(guild_id, "Created guild record");
        Ok(guild)
    }

    pub async fn set_max_inactivity(
        &self,
        guild_id: u64,
        days: i64,
    ) -> Result<GuildRecord, PolicyError> {
        let mut guild = self.get_or_create(guild_id).await?;
        guild.apply_max_inactivity(days);
        self.store.upsert_guild(&guild).await?;
        Ok(guild)
    }

    pub async fn set_warn_offset(
        &self,
        guild_id: u64,
        offset: i64,
    ) -> Result<GuildRecord, PolicyError> {
        let mut guild = self.get_or_create(guild_id).await?;
        guild.apply_warn_offset(offset)?;
        self.store.upsert_guild(&guild).await?;
        Ok(guild)
    }

    pub async fn set_kick_message(
        &self,
        guild_id: u64,
        text: &str,
    ) -> Result<GuildRecord, PolicyError> {
        self.update_message(guild_id, text, |guild, text| {
            guild.kick_message_template = text
        })
        .await
    }

    pub async fn set_warn_message(
        &self,
        guild_id: u64,
        text: &str,
    ) -> Result<GuildRecord, PolicyError> {
        self.update_message(guild_id, text, |guild, text| {
            guild.warning_message_template = text
        })
        .await
    }

    async fn update_message(
        &self,
        guild_id: u64,
        text: &str,
        apply: impl FnOnce(&mut GuildRecord, String),
    ) -> Result<GuildRecord, PolicyError> {
        if text.trim().is_empty() {
            return Err(PolicyError::EmptyMessage);
        }

        let mut guild = self.get_or_create(guild_id).await?;
        apply(&mut guild, text.to_string());
        self.store.upsert_guild(&guild).await?;
        Ok(guild)
    }

    /// Current immunity flag of a tracked user.
    pub async fn user_immunity(&self, guild_id: u64, user_id: u64) -> Result<bool, PolicyError> {
        self.store
            .get_user(guild_id, user_id)
            .await?
            .map(|user| user.immune)
            .ok_or(PolicyError::UserNotTracked)
    }

    /// Flip a tracked user's immunity. Returns the new value.
    pub async fn toggle_user_immunity(
        &self,
        guild_id: u64,
        user_id: u64,
    ) -> Result<bool, PolicyError> {
        let immune = !self.user_immunity(guild_id, user_id).await?;

        // Only the flag is written, so a concurrent activity stamp survives.
        if !self.store.set_user_immunity(guild_id, user_id, immune).await? {
            return Err(PolicyError::UserNotTracked);
        }
        Ok(immune)
    }
}
