// Inactivity service - the entry points the platform layer calls.
//
// Each `on_*` handler maps one gateway event onto the tracker, the policy or
// the command interpreter. `run_sweep_tick` is driven by a timer.
//
// NO Discord dependencies here - everything platform-shaped goes through
// the `GuildPlatform` port.

use super::activity_store::{ActivityStore, StoreError};
use super::activity_tracker::ActivityTracker;
use super::command_interpreter::CommandInterpreter;
use super::inactivity_models::{GuildRecord, IncomingMessage, SweepReport};
use super::inactivity_sweeper::InactivitySweeper;
use super::platform::GuildPlatform;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;

pub struct InactivityService<S: ActivityStore + ?Sized> {
    store: Arc<S>,
    tracker: ActivityTracker<S>,
    sweeper: InactivitySweeper<S>,
    commands: CommandInterpreter<S>,
}

impl<S: ActivityStore + ?Sized> InactivityService<S> {
    pub fn new(store: Arc<S>, command_prefix: impl Into<String>) -> Self {
        Self {
            tracker: ActivityTracker::new(Arc::clone(&store)),
            sweeper: InactivitySweeper::new(Arc::clone(&store)),
            commands: CommandInterpreter::new(Arc::clone(&store), command_prefix),
            store,
        }
    }

    /// A guild message: either an owner command or plain activity.
    pub async fn on_message<P: GuildPlatform + ?Sized>(
        &self,
        platform: &P,
        message: IncomingMessage,
    ) {
        // Never react to ourselves, or the bot would end up tracking itself.
        if message.author_id == platform.self_account_id() {
            return;
        }

        let guild = match platform.guild_info(message.guild_id).await {
            Ok(guild) => guild,
            Err(e) => {
                tracing::warn!(guild_id = message.guild_id, "Failed to look up guild: {}", e);
                return;
            }
        };

        if let Some(command) = self.commands.parse(&message.content) {
            if message.author_id != guild.owner_id {
                tracing::debug!(
                    guild_id = guild.id,
                    user_id = message.author_id,
                    "Deleting command from non-owner"
                );
                if let Err(e) = platform
                    .delete_message(message.channel_id, message.message_id)
                    .await
                {
                    tracing::warn!("Failed to delete unauthorized command: {}", e);
                }
                return;
            }

            self.commands
                .execute(platform, &guild, &message, command)
                .await;
            return;
        }

        // The owner is implicitly immune, so their activity is not stored.
        if message.author_id == guild.owner_id {
            return;
        }

        if let Err(e) = self
            .tracker
            .record_activity(guild.id, message.author_id, message.sent_at)
            .await
        {
            tracing::error!(
                guild_id = guild.id,
                user_id = message.author_id,
                "Failed to record message activity: {}",
                e
            );
        }
    }

    /// A member joined: start their inactivity clock now.
    pub async fn on_member_join<P: GuildPlatform + ?Sized>(
        &self,
        platform: &P,
        guild_id: u64,
        user_id: u64,
        now: DateTime<Utc>,
    ) {
        self.track_unless_excluded(platform, guild_id, user_id, now, "join")
            .await;
    }

    pub async fn on_member_leave(&self, guild_id: u64, user_id: u64) {
        if let Err(e) = self.store.delete_user(guild_id, user_id).await {
            tracing::warn!(guild_id, user_id, "Failed to forget departed member: {}", e);
        }
    }

    pub async fn on_voice_state_change<P: GuildPlatform + ?Sized>(
        &self,
        platform: &P,
        guild_id: u64,
        user_id: u64,
        now: DateTime<Utc>,
    ) {
        self.track_unless_excluded(platform, guild_id, user_id, now, "voice")
            .await;
    }

    /// The bot was added to (or reconnected to) a guild.
    ///
    /// Returns `true` if a new guild record was created. If the record can't be
    /// created the bot leaves the guild rather than sit there untracked.
    pub async fn on_self_join_guild<P: GuildPlatform + ?Sized>(
        &self,
        platform: &P,
        guild_id: u64,
    ) -> bool {
        match self.store.get_guild(guild_id).await {
            Ok(Some(_)) => return false,
            Ok(None) => {}
            Err(e) => {
                tracing::error!(guild_id, "Failed to look up guild record: {}", e);
                return false;
            }
        }

        tracing::info!(guild_id, "Adding server");
        match self.store.upsert_guild(&GuildRecord::new(guild_id)).await {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(guild_id, "Failed to create guild record, leaving: {}", e);
                if let Err(e) = platform.leave_guild(guild_id).await {
                    tracing::error!(guild_id, "Failed to leave guild: {}", e);
                }
                if let Err(e) = self.store.delete_guild(guild_id).await {
                    tracing::error!(guild_id, "Failed to clean up guild record: {}", e);
                }
                false
            }
        }
    }

    /// The bot was removed from a guild: drop everything stored for it.
    pub async fn on_self_leave_guild(&self, guild_id: u64) -> Result<(), StoreError> {
        tracing::info!(guild_id, "Removing server data");
        self.store.delete_all_users(guild_id).await?;
        self.store.delete_guild(guild_id).await
    }

    /// One pass over every stored guild, pausing between guilds.
    ///
    /// A guild that fails (platform lookup or storage) is logged and skipped.
    pub async fn run_sweep_tick<P: GuildPlatform + ?Sized>(
        &self,
        platform: &P,
        guild_pause: Duration,
    ) -> Vec<SweepReport> {
        let guilds = match self.store.list_guilds().await {
            Ok(guilds) => guilds,
            Err(e) => {
                tracing::error!("Failed to list guilds for sweep: {}", e);
                return Vec::new();
            }
        };

        let mut reports = Vec::with_capacity(guilds.len());
        let total = guilds.len();

        for (index, record) in guilds.into_iter().enumerate() {
            let guild = match platform.guild_info(record.guild_id).await {
                Ok(guild) => guild,
                Err(e) => {
                    tracing::warn!(guild_id = record.guild_id, "Skipping sweep: {}", e);
                    continue;
                }
            };

            match self.sweeper.sweep_guild(platform, &guild, Utc::now()).await {
                Ok(report) => reports.push(report),
                Err(e) => tracing::error!(guild_id = guild.id, "Sweep failed: {}", e),
            }

            if index + 1 < total && !guild_pause.is_zero() {
                tokio::time::sleep(guild_pause).await;
            }
        }

        reports
    }

    pub async fn guild_count(&self) -> Result<u64, StoreError> {
        self.store.count_guilds().await
    }

    async fn track_unless_excluded<P: GuildPlatform + ?Sized>(
        &self,
        platform: &P,
        guild_id: u64,
        user_id: u64,
        now: DateTime<Utc>,
        source: &'static str,
    ) {
        if user_id == platform.self_account_id() {
            return;
        }

        match platform.guild_info(guild_id).await {
            Ok(guild) if guild.owner_id == user_id => return,
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(guild_id, "Failed to look up guild: {}", e);
                return;
            }
        }

        if let Err(e) = self.tracker.record_activity(guild_id, user_id, now).await {
            tracing::error!(guild_id, user_id, source, "Failed to record activity: {}", e);
        }
    }
}
