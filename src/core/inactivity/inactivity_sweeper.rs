// Inactivity sweeper - the once-per-day pass that warns and kicks idle members.
//
// For each guild:
// 1. Day guard: at most one pass per UTC day, persisted BEFORE any action
// 2. Skip immune users and the owner, purge stray records of the bot itself
// 3. Classify by whole days since last activity: warn, kick, or nothing
//
// Delivery failures never stop the pass. Kicked members' records are left
// alone here; the member-left event removes them.

use super::activity_store::{ActivityStore, StoreError};
use super::inactivity_models::{
    classify, day_number, render_template, GuildInfo, SweepDecision, SweepOutcome, SweepReport,
    UserRecord,
};
use super::platform::GuildPlatform;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SweepError {
    #[error("No configuration stored for guild {0}")]
    UnknownGuild(u64),

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Audit-log reason attached to automated kicks.
pub fn inactivity_kick_reason(max_inactivity_days: i64) -> String {
    format!(
        "Inactivity for over {} days. (Automated)",
        max_inactivity_days
    )
}

pub struct InactivitySweeper<S: ActivityStore + ?Sized> {
    store: Arc<S>,
}

#[derive(Default)]
struct Tally {
    warned: usize,
    kicked: usize,
    failed: usize,
    purged_self: usize,
}

impl<S: ActivityStore + ?Sized> InactivitySweeper<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }

    /// Run the sweep for one guild at `now`.
    pub async fn sweep_guild<P: GuildPlatform + ?Sized>(
        &self,
        platform: &P,
        guild: &GuildInfo,
        now: DateTime<Utc>,
    ) -> Result<SweepReport, SweepError> {
        let record = self
            .store
            .get_guild(guild.id)
            .await?
            .ok_or(SweepError::UnknownGuild(guild.id))?;

        let current_day = day_number(now);
        if record.last_sweep_day == Some(current_day) {
            tracing::debug!(guild_id = guild.id, day = current_day, "Already swept today");
            return Ok(SweepReport {
                guild_id: guild.id,
                day: current_day,
                outcome: SweepOutcome::Skipped,
            });
        }

        // Write-ahead: a crash after this point can only lose actions, never repeat them.
        self.store.set_last_sweep_day(guild.id, current_day).await?;

        let users = self.store.list_users(guild.id).await?;
        let self_id = platform.self_account_id();
        let mut tally = Tally::default();

        for user in users {
            if user.immune || user.user_id == guild.owner_id {
                continue;
            }

            if user.user_id == self_id {
                match self.store.delete_user(guild.id, user.user_id).await {
                    Ok(()) => tally.purged_self += 1,
                    Err(e) => {
                        tracing::warn!(guild_id = guild.id, "Failed to remove own record: {}", e)
                    }
                }
                continue;
            }

            let day_offset = current_day - day_number(user.last_activity_at);

            match classify(&record, day_offset) {
                SweepDecision::NoOp => {}
                SweepDecision::Warn { days_left } => {
                    let text =
                        render_template(&record.warning_message_template, days_left, &guild.display_name);
                    self.warn(platform, &user, &text).await;
                    tally.warned += 1;
                }
                SweepDecision::Kick => {
                    let text = render_template(
                        &record.kick_message_template,
                        record.max_inactivity_days,
                        &guild.display_name,
                    );
                    let reason = inactivity_kick_reason(record.max_inactivity_days);
                    if self.kick(platform, &user, &text, &reason).await {
                        tally.kicked += 1;
                    } else {
                        tally.failed += 1;
                    }
                }
            }
        }

        tracing::info!(
            guild_id = guild.id,
            day = current_day,
            warned = tally.warned,
            kicked = tally.kicked,
            failed = tally.failed,
            "Inactivity sweep finished"
        );

        Ok(SweepReport {
            guild_id: guild.id,
            day: current_day,
            outcome: SweepOutcome::Completed {
                warned: tally.warned,
                kicked: tally.kicked,
                failed: tally.failed,
                purged_self: tally.purged_self,
            },
        })
    }

    async fn warn<P: GuildPlatform + ?Sized>(&self, platform: &P, user: &UserRecord, text: &str) {
        if let Err(e) = platform.send_direct_message(user.user_id, text).await {
            tracing::warn!(
                guild_id = user.guild_id,
                user_id = user.user_id,
                "Failed to deliver inactivity warning: {}",
                e
            );
        }
    }

    /// Returns whether the member was actually removed.
    async fn kick<P: GuildPlatform + ?Sized>(
        &self,
        platform: &P,
        user: &UserRecord,
        text: &str,
        reason: &str,
    ) -> bool {
        tracing::info!(
            guild_id = user.guild_id,
            user_id = user.user_id,
            "Kicking member due to inactivity"
        );

        if let Err(e) = platform.send_direct_message(user.user_id, text).await {
            tracing::debug!(user_id = user.user_id, "Kick notice not delivered: {}", e);
        }

        match platform
            .remove_member(user.guild_id, user.user_id, reason)
            .await
        {
            Ok(()) => true,
            Err(e) => {
                tracing::error!(
                    guild_id = user.guild_id,
                    user_id = user.user_id,
                    "Failed to kick inactive member: {}",
                    e
                );
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::inactivity::inactivity_models::{GuildRecord, DEFAULT_WARNING_MESSAGE};
    use crate::core::inactivity::test_support::{
        FaultyStore, RecordingPlatform, BOT_ID, GUILD_ID, OWNER_ID,
    };
    use crate::infra::inactivity::InMemoryActivityStore;
    use chrono::{Duration, TimeZone};

    fn noon() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    fn guild_info() -> GuildInfo {
        GuildInfo {
            id: GUILD_ID,
            owner_id: OWNER_ID,
            display_name: "Lounge".to_string(),
        }
    }

    async fn setup(
        guild: GuildRecord,
    ) -> (Arc<InMemoryActivityStore>, InactivitySweeper<InMemoryActivityStore>) {
        let store = Arc::new(InMemoryActivityStore::new());
        store.upsert_guild(&guild).await.unwrap();
        (Arc::clone(&store), InactivitySweeper::new(store))
    }

    async fn add_user(store: &InMemoryActivityStore, user_id: u64, days_idle: i64, immune: bool) {
        let mut user = UserRecord::new(GUILD_ID, user_id, noon() - Duration::days(days_idle));
        user.immune = immune;
        store.create_user(&user).await.unwrap();
    }

    #[tokio::test]
    async fn test_warns_at_halfway_and_last_day_then_kicks() {
        let (store, sweeper) = setup(GuildRecord::new(GUILD_ID)).await;
        let platform = RecordingPlatform::new();
        add_user(&store, 10, 15, false).await;
        add_user(&store, 11, 29, false).await;
        add_user(&store, 12, 31, false).await;
        add_user(&store, 13, 30, false).await;
        add_user(&store, 14, 3, false).await;

        let report = sweeper
            .sweep_guild(&platform, &guild_info(), noon())
            .await
            .unwrap();

        assert_eq!(
            report.outcome,
            SweepOutcome::Completed {
                warned: 2,
                kicked: 1,
                failed: 0,
                purged_self: 0
            }
        );

        assert_eq!(
            platform.direct_messages_to(10),
            vec![render_template(DEFAULT_WARNING_MESSAGE, 15, "Lounge")]
        );
        assert_eq!(
            platform.direct_messages_to(11),
            vec!["**You will be kicked from Lounge in 1 days due to inactivity unless you display some activity.**".to_string()]
        );
        assert_eq!(
            platform.direct_messages_to(12),
            vec!["**You have been kicked from Lounge due to being inactive for 30 days.**".to_string()]
        );
        assert_eq!(
            platform.removed_members(),
            vec![(12, "Inactivity for over 30 days. (Automated)".to_string())]
        );
        assert!(platform.direct_messages_to(13).is_empty());
        assert!(platform.direct_messages_to(14).is_empty());

        // the sweeper leaves the kicked member's record for the leave handler
        assert!(store.get_user(GUILD_ID, 12).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_second_sweep_same_day_is_skipped() {
        let (store, sweeper) = setup(GuildRecord::new(GUILD_ID)).await;
        let platform = RecordingPlatform::new();
        add_user(&store, 12, 40, false).await;

        sweeper
            .sweep_guild(&platform, &guild_info(), noon())
            .await
            .unwrap();
        let later = noon() + Duration::hours(11);
        let report = sweeper
            .sweep_guild(&platform, &guild_info(), later)
            .await
            .unwrap();

        assert_eq!(report.outcome, SweepOutcome::Skipped);
        assert_eq!(platform.removed_members().len(), 1);
        assert_eq!(
            store.get_guild(GUILD_ID).await.unwrap().unwrap().last_sweep_day,
            Some(day_number(noon()))
        );
    }

    #[tokio::test]
    async fn test_next_day_sweeps_again() {
        let (store, sweeper) = setup(GuildRecord::new(GUILD_ID)).await;
        let platform = RecordingPlatform::new();
        add_user(&store, 12, 40, false).await;

        sweeper
            .sweep_guild(&platform, &guild_info(), noon())
            .await
            .unwrap();
        let report = sweeper
            .sweep_guild(&platform, &guild_info(), noon() + Duration::days(1))
            .await
            .unwrap();

        assert!(matches!(report.outcome, SweepOutcome::Completed { kicked: 1, .. }));
        assert_eq!(platform.removed_members().len(), 2);
    }

    #[tokio::test]
    async fn test_immune_and_owner_are_never_touched() {
        let (store, sweeper) = setup(GuildRecord::new(GUILD_ID)).await;
        let platform = RecordingPlatform::new();
        add_user(&store, 20, 15, true).await;
        add_user(&store, 21, 200, true).await;
        add_user(&store, OWNER_ID, 200, false).await;

        let report = sweeper
            .sweep_guild(&platform, &guild_info(), noon())
            .await
            .unwrap();

        assert_eq!(
            report.outcome,
            SweepOutcome::Completed {
                warned: 0,
                kicked: 0,
                failed: 0,
                purged_self: 0
            }
        );
        assert!(platform.calls().is_empty());
    }

    #[tokio::test]
    async fn test_own_record_is_purged() {
        let (store, sweeper) = setup(GuildRecord::new(GUILD_ID)).await;
        let platform = RecordingPlatform::new();
        add_user(&store, BOT_ID, 100, false).await;

        let report = sweeper
            .sweep_guild(&platform, &guild_info(), noon())
            .await
            .unwrap();

        assert!(matches!(report.outcome, SweepOutcome::Completed { purged_self: 1, kicked: 0, .. }));
        assert!(store.get_user(GUILD_ID, BOT_ID).await.unwrap().is_none());
        assert!(platform.removed_members().is_empty());
    }

    #[tokio::test]
    async fn test_failures_do_not_stop_the_pass() {
        let (store, sweeper) = setup(GuildRecord::new(GUILD_ID)).await;
        let platform = RecordingPlatform::new();
        platform.kick_protected.insert(30);
        platform.dm_closed.insert(31);
        platform.dm_closed.insert(32);
        add_user(&store, 30, 50, false).await;
        add_user(&store, 31, 50, false).await;
        add_user(&store, 32, 15, false).await;

        let report = sweeper
            .sweep_guild(&platform, &guild_info(), noon())
            .await
            .unwrap();

        assert_eq!(
            report.outcome,
            SweepOutcome::Completed {
                warned: 1,
                kicked: 1,
                failed: 1,
                purged_self: 0
            }
        );
        assert_eq!(platform.removed_members().len(), 1);
        assert_eq!(platform.removed_members()[0].0, 31);
        assert!(store.get_user(GUILD_ID, 30).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_explicit_warn_offset_is_used() {
        let mut guild = GuildRecord::new(GUILD_ID);
        guild.apply_max_inactivity(10);
        guild.apply_warn_offset(6).unwrap();
        let (store, sweeper) = setup(guild).await;
        let platform = RecordingPlatform::new();
        add_user(&store, 40, 5, false).await;
        add_user(&store, 41, 6, false).await;
        add_user(&store, 42, 9, false).await;

        sweeper
            .sweep_guild(&platform, &guild_info(), noon())
            .await
            .unwrap();

        assert!(platform.direct_messages_to(40).is_empty());
        assert_eq!(platform.direct_messages_to(41).len(), 1);
        assert_eq!(platform.direct_messages_to(42).len(), 1);
    }

    #[tokio::test]
    async fn test_day_offset_uses_calendar_days() {
        let (store, sweeper) = setup(GuildRecord::new(GUILD_ID)).await;
        let platform = RecordingPlatform::new();
        // 14 days and 23 hours earlier, but 15 UTC day boundaries ago
        let now = Utc.with_ymd_and_hms(2024, 6, 15, 0, 30, 0).unwrap();
        let last = Utc.with_ymd_and_hms(2024, 5, 31, 1, 30, 0).unwrap();
        store
            .create_user(&UserRecord::new(GUILD_ID, 50, last))
            .await
            .unwrap();

        sweeper
            .sweep_guild(&platform, &guild_info(), now)
            .await
            .unwrap();

        assert_eq!(platform.direct_messages_to(50).len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_guild_is_an_error() {
        let store = Arc::new(InMemoryActivityStore::new());
        let sweeper = InactivitySweeper::new(store);
        let platform = RecordingPlatform::new();

        let result = sweeper.sweep_guild(&platform, &guild_info(), noon()).await;
        assert!(matches!(result, Err(SweepError::UnknownGuild(GUILD_ID))));
    }

    #[tokio::test]
    async fn test_sweep_day_is_stored_before_any_action() {
        let platform = Arc::new(RecordingPlatform::new());
        let store = Arc::new(FaultyStore::watching(Arc::clone(&platform)));
        store.upsert_guild(&GuildRecord::new(GUILD_ID)).await.unwrap();
        add_user(&store.inner, 10, 15, false).await;
        add_user(&store.inner, 12, 31, false).await;
        let sweeper = InactivitySweeper::new(Arc::clone(&store));

        sweeper
            .sweep_guild(platform.as_ref(), &guild_info(), noon())
            .await
            .unwrap();

        let guard = store.writes_named("set_last_sweep_day");
        assert_eq!(guard.len(), 1);
        assert_eq!(guard[0].platform_calls_before, 0);
        // one warning, one kick notice, one removal
        assert_eq!(platform.calls().len(), 3);
    }

    #[tokio::test]
    async fn test_failed_sweep_day_write_takes_no_action() {
        let platform = Arc::new(RecordingPlatform::new());
        let store = Arc::new(FaultyStore::watching(Arc::clone(&platform)));
        store.upsert_guild(&GuildRecord::new(GUILD_ID)).await.unwrap();
        add_user(&store.inner, 10, 15, false).await;
        add_user(&store.inner, 12, 31, false).await;
        store.refuse_guild_writes();
        let sweeper = InactivitySweeper::new(Arc::clone(&store));

        let result = sweeper
            .sweep_guild(platform.as_ref(), &guild_info(), noon())
            .await;

        assert!(matches!(result, Err(SweepError::Store(StoreError::StorageError(_)))));
        assert!(platform.calls().is_empty());
        assert_eq!(
            store.get_guild(GUILD_ID).await.unwrap().unwrap().last_sweep_day,
            None
        );
        assert!(store.get_user(GUILD_ID, 12).await.unwrap().is_some());
    }
}
