// Activity tracker - keeps each member's last-activity timestamp current.

use super::activity_store::{ActivityStore, StoreError};
use super::inactivity_models::UserRecord;
use chrono::{DateTime, Utc};
use std::sync::Arc;

pub struct ActivityTracker<S: ActivityStore + ?Sized> {
    store: Arc<S>,
}

impl<S: ActivityStore + ?Sized> ActivityTracker<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Stamp a member's activity, creating their record on first sight.
    ///
    /// Timestamps are not merged: an older `at` overwrites a newer one.
    pub async fn record_activity(
        &self,
        guild_id: u64,
        user_id: u64,
        at: DateTime<Utc>,
    ) -> Result<(), StoreError> {
        if self.store.touch_user(guild_id, user_id, at).await? {
            return Ok(());
        }

        tracing::debug!(guild_id, user_id, "Tracking new member");
        match self
            .store
            .create_user(&UserRecord::new(guild_id, user_id, at))
            .await
        {
            // Another event created the record between our check and insert.
            Err(StoreError::Conflict { .. }) => {
                self.store.touch_user(guild_id, user_id, at).await?;
                Ok(())
            }
            other => other,
        }
    }

    /// Start tracking every listed member that isn't tracked yet.
    ///
    /// The owner and the bot itself are never enrolled. A failure on one
    /// member is logged and the rest are still processed.
    ///
    /// Returns how many records were created.
    pub async fn force_enroll(
        &self,
        guild_id: u64,
        owner_id: u64,
        self_id: u64,
        member_ids: &[u64],
        now: DateTime<Utc>,
    ) -> usize {
        let mut created = 0;

        for &user_id in member_ids {
            if user_id == owner_id || user_id == self_id {
                continue;
            }

            match self.store.get_user(guild_id, user_id).await {
                Ok(Some(_)) => continue,
                Ok(None) => {}
                Err(e) => {
                    tracing::warn!(guild_id, user_id, "Failed to look up member: {}", e);
                    continue;
                }
            }

            match self
                .store
                .create_user(&UserRecord::new(guild_id, user_id, now))
                .await
            {
                Ok(()) => created += 1,
                Err(e) => tracing::warn!(guild_id, user_id, "Failed to enroll member: {}", e),
            }
        }

        created
    }
}
