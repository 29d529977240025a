// Inactivity domain models - guild configuration and per-user activity records.
//
// These are pure domain types with no Discord dependencies.
// The Discord layer converts gateway payloads into these before calling core.

use super::activity_store::StoreError;
use chrono::{DateTime, Utc};
use thiserror::Error;

/// Seconds in one UTC day. Day boundaries are computed from epoch seconds only.
pub const SECONDS_PER_DAY: i64 = 86_400;

/// Lowest accepted inactivity threshold (and lowest explicit warn offset).
pub const MIN_INACTIVITY_DAYS: i64 = 5;

/// Highest accepted inactivity threshold.
pub const MAX_INACTIVITY_DAYS: i64 = 365;

/// Sentinel for "warn at half of the inactivity threshold".
pub const AUTO_WARN_OFFSET: i64 = -1;

pub const DEFAULT_INACTIVITY_DAYS: i64 = 30;

pub const DEFAULT_KICK_MESSAGE: &str =
    "**You have been kicked from %server% due to being inactive for %time% days.**";

pub const DEFAULT_WARNING_MESSAGE: &str = "**You will be kicked from %server% in %time% days due to inactivity unless you display some activity.**";

pub const TIME_PLACEHOLDER: &str = "%time%";
pub const SERVER_PLACEHOLDER: &str = "%server%";

/// UTC day number of an instant: `floor(epoch_seconds / 86400)`.
///
/// Uses euclidean division so instants before the epoch land on the
/// previous day instead of rounding toward zero.
pub fn day_number(instant: DateTime<Utc>) -> i64 {
    instant.timestamp().div_euclid(SECONDS_PER_DAY)
}

/// Substitute `%time%` and `%server%` in a message template.
pub fn render_template(template: &str, time: i64, server_name: &str) -> String {
    template
        .replace(TIME_PLACEHOLDER, &time.to_string())
        .replace(SERVER_PLACEHOLDER, server_name)
}

// ============================================================================
// ERRORS
// ============================================================================

/// Validation failures raised while mutating a guild's policy.
#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("Offset exceeded max inactivity time of {max_allowed} days")]
    WarnOffsetTooLarge { max_allowed: i64 },

    #[error("Message cannot be empty")]
    EmptyMessage,

    #[error("User is not being tracked")]
    UserNotTracked,

    #[error(transparent)]
    Store(#[from] StoreError),
}

// ============================================================================
// RECORDS
// ============================================================================

/// Per-guild configuration for the inactivity sweep.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildRecord {
    pub guild_id: u64,
    /// Days of silence before a member is kicked. Always within [5, 365].
    pub max_inactivity_days: i64,
    /// -1 for automatic (half of max), otherwise within [5, max - 2].
    pub first_warn_offset_days: i64,
    pub kick_message_template: String,
    pub warning_message_template: String,
    /// Day number of the last completed sweep guard. `None` until the first sweep.
    pub last_sweep_day: Option<i64>,
}

impl GuildRecord {
    /// Default configuration for a guild seen for the first time.
    pub fn new(guild_id: u64) -> Self {
        Self {
            guild_id,
            max_inactivity_days: DEFAULT_INACTIVITY_DAYS,
            first_warn_offset_days: AUTO_WARN_OFFSET,
            kick_message_template: DEFAULT_KICK_MESSAGE.to_string(),
            warning_message_template: DEFAULT_WARNING_MESSAGE.to_string(),
            last_sweep_day: None,
        }
    }

    /// Clamp and apply a new inactivity threshold.
    ///
    /// An explicit warn offset that no longer fits under the new threshold
    /// falls back to the automatic value.
    pub fn apply_max_inactivity(&mut self, days: i64) {
        self.max_inactivity_days = days.clamp(MIN_INACTIVITY_DAYS, MAX_INACTIVITY_DAYS);

        if self.first_warn_offset_days > self.max_warn_offset() {
            self.first_warn_offset_days = AUTO_WARN_OFFSET;
        }
    }

    /// Apply a new warn offset, leaving the record untouched on failure.
    pub fn apply_warn_offset(&mut self, offset: i64) -> Result<(), PolicyError> {
        let offset = if offset != AUTO_WARN_OFFSET && offset < MIN_INACTIVITY_DAYS {
            MIN_INACTIVITY_DAYS
        } else {
            offset
        };

        if offset > self.max_warn_offset() {
            return Err(PolicyError::WarnOffsetTooLarge {
                max_allowed: self.max_warn_offset(),
            });
        }

        self.first_warn_offset_days = offset;
        Ok(())
    }

    /// The day offset at which the first warning goes out.
    pub fn effective_warn_offset_days(&self) -> i64 {
        if self.first_warn_offset_days >= MIN_INACTIVITY_DAYS {
            self.first_warn_offset_days
        } else {
            self.max_inactivity_days.div_euclid(2)
        }
    }

    pub fn is_auto_warn_offset(&self) -> bool {
        self.first_warn_offset_days < MIN_INACTIVITY_DAYS
    }

    fn max_warn_offset(&self) -> i64 {
        self.max_inactivity_days - 2
    }
}

/// Last observed activity of one member in one guild.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub guild_id: u64,
    pub user_id: u64,
    pub last_activity_at: DateTime<Utc>,
    pub immune: bool,
}

impl UserRecord {
    pub fn new(guild_id: u64, user_id: u64, last_activity_at: DateTime<Utc>) -> Self {
        Self {
            guild_id,
            user_id,
            last_activity_at,
            immune: false,
        }
    }
}

/// The narrow view of a platform guild that core logic needs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GuildInfo {
    pub id: u64,
    pub owner_id: u64,
    pub display_name: String,
}

/// A guild message as seen by core, already stripped of platform types.
#[derive(Debug, Clone)]
pub struct IncomingMessage {
    pub guild_id: u64,
    pub channel_id: u64,
    pub message_id: u64,
    pub author_id: u64,
    pub content: String,
    pub sent_at: DateTime<Utc>,
}

// ============================================================================
// SWEEP RESULTS
// ============================================================================

/// What the sweeper decided for one member on one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepDecision {
    NoOp,
    /// Warn the member; `days_left` is substituted for `%time%`.
    Warn { days_left: i64 },
    Kick,
}

/// Classify a member by how many whole days have passed since their last activity.
pub fn classify(guild: &GuildRecord, day_offset: i64) -> SweepDecision {
    let halfway_mark = guild.effective_warn_offset_days();
    let last_day = guild.max_inactivity_days - 1;

    if day_offset == halfway_mark || day_offset == last_day {
        SweepDecision::Warn {
            days_left: guild.max_inactivity_days - day_offset,
        }
    } else if day_offset > guild.max_inactivity_days {
        SweepDecision::Kick
    } else {
        SweepDecision::NoOp
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SweepOutcome {
    /// The guild was already swept on this day.
    Skipped,
    Completed {
        warned: usize,
        kicked: usize,
        /// Kicks the platform rejected; the records stay for the next sweep.
        failed: usize,
        /// Records of the bot's own account that were removed.
        purged_self: usize,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub guild_id: u64,
    pub day: i64,
    pub outcome: SweepOutcome,
}
