// Test doubles shared by the inactivity tests: a recording fake of the
// platform port and a store wrapper that journals and fails writes.

use super::activity_store::{ActivityStore, StoreError};
use super::inactivity_models::{GuildInfo, GuildRecord, UserRecord};
use super::platform::{GuildPlatform, PlatformError};
use crate::infra::inactivity::InMemoryActivityStore;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::DashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

pub const GUILD_ID: u64 = 100;
pub const OWNER_ID: u64 = 1;
pub const BOT_ID: u64 = 2;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlatformCall {
    DirectMessage { user_id: u64, text: String },
    ChannelMessage { channel_id: u64, text: String },
    RemoveMember { guild_id: u64, user_id: u64, reason: String },
    DeleteMessage { channel_id: u64, message_id: u64 },
    LeaveGuild { guild_id: u64 },
}

pub struct RecordingPlatform {
    pub calls: Mutex<Vec<PlatformCall>>,
    pub members: Vec<u64>,
    /// Users whose DMs are closed.
    pub dm_closed: DashSet<u64>,
    /// Users the platform refuses to kick.
    pub kick_protected: DashSet<u64>,
    /// Guilds whose info lookup fails.
    pub unavailable_guilds: DashSet<u64>,
}

impl RecordingPlatform {
    pub fn new() -> Self {
        Self::with_members(Vec::new())
    }

    pub fn with_members(members: Vec<u64>) -> Self {
        Self {
            calls: Mutex::new(Vec::new()),
            members,
            dm_closed: DashSet::new(),
            kick_protected: DashSet::new(),
            unavailable_guilds: DashSet::new(),
        }
    }

    pub fn calls(&self) -> Vec<PlatformCall> {
        self.calls.lock().unwrap().clone()
    }

    pub fn direct_messages_to(&self, user_id: u64) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PlatformCall::DirectMessage { user_id: to, text } if to == user_id => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn removed_members(&self) -> Vec<(u64, String)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PlatformCall::RemoveMember {
                    user_id, reason, ..
                } => Some((user_id, reason)),
                _ => None,
            })
            .collect()
    }

    pub fn channel_replies(&self) -> Vec<String> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PlatformCall::ChannelMessage { text, .. } => Some(text),
                _ => None,
            })
            .collect()
    }

    pub fn deleted_messages(&self) -> Vec<u64> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                PlatformCall::DeleteMessage { message_id, .. } => Some(message_id),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: PlatformCall) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl GuildPlatform for RecordingPlatform {
    async fn send_direct_message(&self, user_id: u64, text: &str) -> Result<(), PlatformError> {
        if self.dm_closed.contains(&user_id) {
            return Err(PlatformError::Request("Cannot send messages to this user".into()));
        }
        self.record(PlatformCall::DirectMessage {
            user_id,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn send_channel_message(
        &self,
        channel_id: u64,
        text: &str,
    ) -> Result<(), PlatformError> {
        self.record(PlatformCall::ChannelMessage {
            channel_id,
            text: text.to_string(),
        });
        Ok(())
    }

    async fn remove_member(
        &self,
        guild_id: u64,
        user_id: u64,
        audit_reason: &str,
    ) -> Result<(), PlatformError> {
        if self.kick_protected.contains(&user_id) {
            return Err(PlatformError::Request("Missing Permissions".into()));
        }
        self.record(PlatformCall::RemoveMember {
            guild_id,
            user_id,
            reason: audit_reason.to_string(),
        });
        Ok(())
    }

    async fn delete_message(
        &self,
        channel_id: u64,
        message_id: u64,
    ) -> Result<(), PlatformError> {
        self.record(PlatformCall::DeleteMessage {
            channel_id,
            message_id,
        });
        Ok(())
    }

    async fn list_members(&self, _guild_id: u64) -> Result<Vec<u64>, PlatformError> {
        Ok(self.members.clone())
    }

    async fn resolve_mention(
        &self,
        _guild_id: u64,
        token: &str,
    ) -> Result<Option<u64>, PlatformError> {
        let id = token
            .strip_prefix("<@")
            .and_then(|rest| rest.strip_suffix('>'))
            .map(|rest| rest.trim_start_matches('!'))
            .and_then(|rest| rest.parse::<u64>().ok());

        Ok(id.filter(|id| self.members.contains(id)))
    }

    async fn guild_info(&self, guild_id: u64) -> Result<GuildInfo, PlatformError> {
        if self.unavailable_guilds.contains(&guild_id) {
            return Err(PlatformError::GuildUnavailable(guild_id));
        }
        Ok(GuildInfo {
            id: guild_id,
            owner_id: OWNER_ID,
            display_name: format!("Guild {}", guild_id),
        })
    }

    fn self_account_id(&self) -> u64 {
        BOT_ID
    }

    async fn leave_guild(&self, guild_id: u64) -> Result<(), PlatformError> {
        self.record(PlatformCall::LeaveGuild { guild_id });
        Ok(())
    }
}

/// One write that reached `FaultyStore`, successful or not.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoreWrite {
    pub op: &'static str,
    pub guild_id: u64,
    /// Platform calls recorded before this write was attempted.
    pub platform_calls_before: usize,
}

/// In-memory store that journals every write and fails the ones it is told to.
pub struct FaultyStore {
    pub inner: InMemoryActivityStore,
    /// Fail `upsert_guild` and `set_last_sweep_day`.
    fail_guild_writes: AtomicBool,
    /// Users whose `create_user` fails.
    pub fail_create_for: DashSet<u64>,
    watched: Option<Arc<RecordingPlatform>>,
    journal: Mutex<Vec<StoreWrite>>,
}

impl FaultyStore {
    pub fn new() -> Self {
        Self {
            inner: InMemoryActivityStore::new(),
            fail_guild_writes: AtomicBool::new(false),
            fail_create_for: DashSet::new(),
            watched: None,
            journal: Mutex::new(Vec::new()),
        }
    }

    /// Journal writes together with how far `platform` had got at the time.
    pub fn watching(platform: Arc<RecordingPlatform>) -> Self {
        Self {
            watched: Some(platform),
            ..Self::new()
        }
    }

    pub fn refuse_guild_writes(&self) {
        self.fail_guild_writes.store(true, Ordering::SeqCst);
    }

    pub fn writes(&self) -> Vec<StoreWrite> {
        self.journal.lock().unwrap().clone()
    }

    pub fn writes_named(&self, op: &str) -> Vec<StoreWrite> {
        self.writes().into_iter().filter(|w| w.op == op).collect()
    }

    fn log(&self, op: &'static str, guild_id: u64) {
        let platform_calls_before = self
            .watched
            .as_ref()
            .map_or(0, |platform| platform.calls().len());
        self.journal.lock().unwrap().push(StoreWrite {
            op,
            guild_id,
            platform_calls_before,
        });
    }

    fn guild_write(&self, op: &'static str, guild_id: u64) -> Result<(), StoreError> {
        self.log(op, guild_id);
        if self.fail_guild_writes.load(Ordering::SeqCst) {
            return Err(StoreError::StorageError(format!("{} refused", op)));
        }
        Ok(())
    }
}

#[async_trait]
impl ActivityStore for FaultyStore {
    async fn get_guild(&self, guild_id: u64) -> Result<Option<GuildRecord>, StoreError> {
        self.inner.get_guild(guild_id).await
    }

    async fn upsert_guild(&self, guild: &GuildRecord) -> Result<(), StoreError> {
        self.guild_write("upsert_guild", guild.guild_id)?;
        self.inner.upsert_guild(guild).await
    }

    async fn set_last_sweep_day(&self, guild_id: u64, day: i64) -> Result<(), StoreError> {
        self.guild_write("set_last_sweep_day", guild_id)?;
        self.inner.set_last_sweep_day(guild_id, day).await
    }

    async fn delete_guild(&self, guild_id: u64) -> Result<(), StoreError> {
        self.log("delete_guild", guild_id);
        self.inner.delete_guild(guild_id).await
    }

    async fn list_guilds(&self) -> Result<Vec<GuildRecord>, StoreError> {
        self.inner.list_guilds().await
    }

    async fn count_guilds(&self) -> Result<u64, StoreError> {
        self.inner.count_guilds().await
    }

    async fn get_user(
        &self,
        guild_id: u64,
        user_id: u64,
    ) -> Result<Option<UserRecord>, StoreError> {
        self.inner.get_user(guild_id, user_id).await
    }

    async fn create_user(&self, user: &UserRecord) -> Result<(), StoreError> {
        self.log("create_user", user.guild_id);
        if self.fail_create_for.contains(&user.user_id) {
            return Err(StoreError::StorageError("create_user refused".into()));
        }
        self.inner.create_user(user).await
    }

    async fn update_user(&self, user: &UserRecord) -> Result<(), StoreError> {
        self.log("update_user", user.guild_id);
        self.inner.update_user(user).await
    }

    async fn touch_user(
        &self,
        guild_id: u64,
        user_id: u64,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        self.log("touch_user", guild_id);
        self.inner.touch_user(guild_id, user_id, at).await
    }

    async fn set_user_immunity(
        &self,
        guild_id: u64,
        user_id: u64,
        immune: bool,
    ) -> Result<bool, StoreError> {
        self.log("set_user_immunity", guild_id);
        self.inner.set_user_immunity(guild_id, user_id, immune).await
    }

    async fn delete_user(&self, guild_id: u64, user_id: u64) -> Result<(), StoreError> {
        self.log("delete_user", guild_id);
        self.inner.delete_user(guild_id, user_id).await
    }

    async fn delete_all_users(&self, guild_id: u64) -> Result<(), StoreError> {
        self.log("delete_all_users", guild_id);
        self.inner.delete_all_users(guild_id).await
    }

    async fn list_users(&self, guild_id: u64) -> Result<Vec<UserRecord>, StoreError> {
        self.inner.list_users(guild_id).await
    }
}
