// In-memory implementation of ActivityStore.
//
// Used by the test suites and for throwaway runs (`DATABASE_URL=memory`).
// Nothing survives a restart.

use crate::core::inactivity::{ActivityStore, GuildRecord, StoreError, UserRecord};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;

/// A composite key for looking up a member's record.
/// We need both guild_id AND user_id since users can be in multiple guilds.
#[derive(Hash, Eq, PartialEq, Clone, Copy, Debug)]
struct GuildUserKey {
    guild_id: u64,
    user_id: u64,
}

impl GuildUserKey {
    fn of(user: &UserRecord) -> Self {
        Self {
            guild_id: user.guild_id,
            user_id: user.user_id,
        }
    }
}

pub struct InMemoryActivityStore {
    guilds: DashMap<u64, GuildRecord>,
    users: DashMap<GuildUserKey, UserRecord>,
}

impl InMemoryActivityStore {
    pub fn new() -> Self {
        Self {
            guilds: DashMap::new(),
            users: DashMap::new(),
        }
    }
}

impl Default for InMemoryActivityStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ActivityStore for InMemoryActivityStore {
    async fn get_guild(&self, guild_id: u64) -> Result<Option<GuildRecord>, StoreError> {
        Ok(self.guilds.get(&guild_id).map(|entry| entry.clone()))
    }

    async fn upsert_guild(&self, guild: &GuildRecord) -> Result<(), StoreError> {
        match self.guilds.entry(guild.guild_id) {
            Entry::Occupied(mut slot) => {
                let last_sweep_day = slot.get().last_sweep_day;
                let stored = slot.get_mut();
                *stored = guild.clone();
                stored.last_sweep_day = last_sweep_day;
            }
            Entry::Vacant(slot) => {
                slot.insert(guild.clone());
            }
        }
        Ok(())
    }

    async fn set_last_sweep_day(&self, guild_id: u64, day: i64) -> Result<(), StoreError> {
        if let Some(mut guild) = self.guilds.get_mut(&guild_id) {
            guild.last_sweep_day = Some(day);
        }
        Ok(())
    }

    async fn delete_guild(&self, guild_id: u64) -> Result<(), StoreError> {
        self.guilds.remove(&guild_id);
        self.users.retain(|key, _| key.guild_id != guild_id);
        Ok(())
    }

    async fn list_guilds(&self) -> Result<Vec<GuildRecord>, StoreError> {
        Ok(self.guilds.iter().map(|entry| entry.clone()).collect())
    }

    async fn count_guilds(&self) -> Result<u64, StoreError> {
        Ok(self.guilds.len() as u64)
    }

    async fn get_user(
        &self,
        guild_id: u64,
        user_id: u64,
    ) -> Result<Option<UserRecord>, StoreError> {
        let key = GuildUserKey { guild_id, user_id };
        Ok(self.users.get(&key).map(|entry| entry.clone()))
    }

    async fn create_user(&self, user: &UserRecord) -> Result<(), StoreError> {
        // entry() keeps the existence check and the insert atomic
        match self.users.entry(GuildUserKey::of(user)) {
            Entry::Occupied(_) => Err(StoreError::Conflict {
                guild_id: user.guild_id,
                user_id: user.user_id,
            }),
            Entry::Vacant(slot) => {
                slot.insert(user.clone());
                Ok(())
            }
        }
    }

    async fn update_user(&self, user: &UserRecord) -> Result<(), StoreError> {
        self.users.insert(GuildUserKey::of(user), user.clone());
        Ok(())
    }

    async fn touch_user(
        &self,
        guild_id: u64,
        user_id: u64,
        at: DateTime<Utc>,
    ) -> Result<bool, StoreError> {
        let key = GuildUserKey { guild_id, user_id };
        Ok(match self.users.get_mut(&key) {
            Some(mut user) => {
                user.last_activity_at = at;
                true
            }
            None => false,
        })
    }

    async fn set_user_immunity(
        &self,
        guild_id: u64,
        user_id: u64,
        immune: bool,
    ) -> Result<bool, StoreError> {
        let key = GuildUserKey { guild_id, user_id };
        Ok(match self.users.get_mut(&key) {
            Some(mut user) => {
                user.immune = immune;
                true
            }
            None => false,
        })
    }

    async fn delete_user(&self, guild_id: u64, user_id: u64) -> Result<(), StoreError> {
        self.users.remove(&GuildUserKey { guild_id, user_id });
        Ok(())
    }

    async fn delete_all_users(&self, guild_id: u64) -> Result<(), StoreError> {
        self.users.retain(|key, _| key.guild_id != guild_id);
        Ok(())
    }

    async fn list_users(&self, guild_id: u64) -> Result<Vec<UserRecord>, StoreError> {
        Ok(self
            .users
            .iter()
            .filter(|entry| entry.key().guild_id == guild_id)
            .map(|entry| entry.value().clone())
            .collect())
    }
}
