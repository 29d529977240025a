// Owner commands - parses `!yeet <verb> [args]` lines and applies them.
//
// Parsing is a pure function over one line. Execution talks to the guild
// policy, the tracker and the platform port. Authorization (owner only) is
// enforced by the caller before anything here runs.

use super::activity_store::ActivityStore;
use super::activity_tracker::ActivityTracker;
use super::guild_policy::GuildPolicy;
use super::inactivity_models::{
    render_template, GuildInfo, GuildRecord, IncomingMessage, PolicyError,
};
use super::platform::GuildPlatform;
use chrono::Utc;
use std::sync::Arc;
use thiserror::Error;

pub const DEFAULT_PREFIX: &str = "!yeet";

const NOT_FOUND_TEXT: &str = "Command not found";
const USER_NOT_FOUND_TEXT: &str = "User not found";
const OWNER_KICK_MESSAGE: &str = "**You have been kicked from %server% by the server owner.**";
const OWNER_KICK_REASON: &str = "Kicked by owner";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Help,
    ShowTimeout,
    SetTimeout(i64),
    ShowWarnTimeout,
    SetWarnTimeout(i64),
    ShowKickMessage,
    SetKickMessage(String),
    ShowWarnMessage,
    SetWarnMessage(String),
    IsImmune(String),
    ToggleImmune(String),
    ForceAdd,
    /// Any other first token. A member mention here means a manual kick.
    Unknown(String),
}

/// Problems with the command line itself. Shown to the issuer verbatim.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Invalid number of days: {0}")]
    InvalidNumber(String),

    #[error("Usage: {0} <mention>")]
    MissingMention(&'static str),
}

/// Parse a message as an owner command.
///
/// Returns `None` when the message is not a command at all. The prefix must
/// be followed by whitespace or the end of the message.
pub fn parse_command(prefix: &str, content: &str) -> Option<Result<Command, CommandError>> {
    let rest = content.strip_prefix(prefix)?;
    if !rest.is_empty() && !rest.starts_with(char::is_whitespace) {
        return None;
    }

    let rest = rest.trim_start();
    let (verb, args) = match rest.split_once(char::is_whitespace) {
        Some((verb, args)) => (verb, args.trim()),
        None => (rest, ""),
    };

    let command = match verb.to_lowercase().as_str() {
        "" | "help" => Ok(Command::Help),
        "timeout" if args.is_empty() => Ok(Command::ShowTimeout),
        "timeout" => parse_days(args).map(Command::SetTimeout),
        "warntimeout" if args.is_empty() => Ok(Command::ShowWarnTimeout),
        "warntimeout" => parse_days(args).map(Command::SetWarnTimeout),
        "kickmsg" if args.is_empty() => Ok(Command::ShowKickMessage),
        "kickmsg" => Ok(Command::SetKickMessage(args.to_string())),
        "warnmsg" if args.is_empty() => Ok(Command::ShowWarnMessage),
        "warnmsg" => Ok(Command::SetWarnMessage(args.to_string())),
        "isimmune" => first_token(args)
            .map(Command::IsImmune)
            .ok_or(CommandError::MissingMention("isimmune")),
        "immune" => first_token(args)
            .map(Command::ToggleImmune)
            .ok_or(CommandError::MissingMention("immune")),
        "forceadd" => Ok(Command::ForceAdd),
        _ => Ok(Command::Unknown(verb.to_string())),
    };

    Some(command)
}

fn parse_days(args: &str) -> Result<i64, CommandError> {
    let token = args.split_whitespace().next().unwrap_or_default();
    token
        .parse::<i64>()
        .map_err(|_| CommandError::InvalidNumber(token.to_string()))
}

fn first_token(args: &str) -> Option<String> {
    args.split_whitespace().next().map(str::to_string)
}

pub fn help_text(prefix: &str) -> String {
    format!(
        "**Inactivity moderation**\n\
         Members who stay inactive for too long are warned and then kicked.\n\
         Activity means sending a message or a voice state change (joining, moving, leaving).\n\
         Warnings go out at the warning mark and on the final day before the kick.\n\
         \n\
         **Syntax**\n\
         {prefix} <command> <args...>\n\
         \n\
         **Commands**\n\
         ```\n\
         \x20- help               | Shows this help\n\
         \x20- timeout [days]     | Gets or sets the days of inactivity before a kick\n\
         \x20- warntimeout [days] | Gets or sets the days before the first warning, -1 for halfway\n\
         \x20- kickmsg [text]     | Gets or sets the kick message\n\
         \x20- warnmsg [text]     | Gets or sets the warning message\n\
         \x20- isimmune (mention) | Shows whether a member is immune to kicks\n\
         \x20- immune (mention)   | Toggles a member's immunity to kicks\n\
         \x20- forceadd           | Starts tracking every current member\n\
         \x20- (mention)          | Kicks that member right away\n\
         ```\n\
         Messages support %time% (days) and %server% (server name)."
    )
}

pub struct CommandInterpreter<S: ActivityStore + ?Sized> {
    prefix: String,
    policy: GuildPolicy<S>,
    tracker: ActivityTracker<S>,
}

impl<S: ActivityStore + ?Sized> CommandInterpreter<S> {
    pub fn new(store: Arc<S>, prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            policy: GuildPolicy::new(Arc::clone(&store)),
            tracker: ActivityTracker::new(store),
        }
    }

    pub fn parse(&self, content: &str) -> Option<Result<Command, CommandError>> {
        parse_command(&self.prefix, content)
    }

    /// Execute an owner's command. Every outcome is reported back in the channel;
    /// storage failures are logged and leave state as it was.
    pub async fn execute<P: GuildPlatform + ?Sized>(
        &self,
        platform: &P,
        guild: &GuildInfo,
        message: &IncomingMessage,
        command: Result<Command, CommandError>,
    ) {
        let command = match command {
            Ok(command) => command,
            Err(e) => {
                self.reply(platform, message, &format!("**{}**", e)).await;
                return;
            }
        };

        tracing::debug!(guild_id = guild.id, ?command, "Executing owner command");
        match command {
            Command::Help => self.reply(platform, message, &help_text(&self.prefix)).await,

            Command::ShowTimeout => {
                if let Some(record) = self.load(guild.id).await {
                    let text = format!(
                        "**Kick timeout for this server is {} days**",
                        record.max_inactivity_days
                    );
                    self.reply(platform, message, &text).await;
                }
            }

            Command::SetTimeout(days) => match self.policy.set_max_inactivity(guild.id, days).await {
                Ok(record) => {
                    tracing::info!(guild_id = guild.id, days = record.max_inactivity_days, "Kick timeout updated");
                    let text = format!(
                        "**Kick timeout for this server set to {} days**",
                        record.max_inactivity_days
                    );
                    self.reply(platform, message, &text).await;
                }
                Err(e) => self.policy_failure(platform, message, e).await,
            },

            Command::ShowWarnTimeout => {
                if let Some(record) = self.load(guild.id).await {
                    let text = format!(
                        "**Warning timeout for this server is {} days**",
                        describe_warn_offset(&record)
                    );
                    self.reply(platform, message, &text).await;
                }
            }

            Command::SetWarnTimeout(offset) => {
                match self.policy.set_warn_offset(guild.id, offset).await {
                    Ok(record) => {
                        let text = format!(
                            "**Warning timeout for this server set to {} days**",
                            describe_warn_offset(&record)
                        );
                        self.reply(platform, message, &text).await;
                    }
                    Err(e) => self.policy_failure(platform, message, e).await,
                }
            }

            Command::ShowKickMessage => {
                if let Some(record) = self.load(guild.id).await {
                    self.reply(platform, message, &record.kick_message_template)
                        .await;
                }
            }

            Command::SetKickMessage(text) => {
                match self.policy.set_kick_message(guild.id, &text).await {
                    Ok(_) => self.reply(platform, message, "**Kick message updated**").await,
                    Err(e) => self.policy_failure(platform, message, e).await,
                }
            }

            Command::ShowWarnMessage => {
                if let Some(record) = self.load(guild.id).await {
                    self.reply(platform, message, &record.warning_message_template)
                        .await;
                }
            }

            Command::SetWarnMessage(text) => {
                match self.policy.set_warn_message(guild.id, &text).await {
                    Ok(_) => self.reply(platform, message, "**Warning message updated**").await,
                    Err(e) => self.policy_failure(platform, message, e).await,
                }
            }

            Command::IsImmune(token) => {
                let Some(user_id) = self.resolve(platform, guild, message, &token).await else {
                    return;
                };

                self.delete_command(platform, message).await;
                match self.policy.user_immunity(guild.id, user_id).await {
                    Ok(immune) => {
                        let text = format!("User immunity is set to: {}", immune);
                        self.reply(platform, message, &text).await;
                    }
                    Err(e) => self.policy_failure(platform, message, e).await,
                }
            }

            Command::ToggleImmune(token) => {
                let Some(user_id) = self.resolve(platform, guild, message, &token).await else {
                    return;
                };

                self.delete_command(platform, message).await;
                match self.policy.toggle_user_immunity(guild.id, user_id).await {
                    Ok(immune) => {
                        tracing::info!(guild_id = guild.id, user_id, immune, "Immunity toggled");
                        let text = format!("<@{}> had their immunity set to: {}", user_id, immune);
                        self.reply(platform, message, &text).await;
                    }
                    Err(e) => self.policy_failure(platform, message, e).await,
                }
            }

            Command::ForceAdd => {
                self.reply(platform, message, "**Force adding everyone...**")
                    .await;

                let members = match platform.list_members(guild.id).await {
                    Ok(members) => members,
                    Err(e) => {
                        tracing::error!(guild_id = guild.id, "Failed to list members: {}", e);
                        self.reply(platform, message, "**Could not fetch the member list**")
                            .await;
                        return;
                    }
                };

                let created = self
                    .tracker
                    .force_enroll(
                        guild.id,
                        guild.owner_id,
                        platform.self_account_id(),
                        &members,
                        Utc::now(),
                    )
                    .await;

                tracing::info!(guild_id = guild.id, created, "Force-enrolled members");
                let text = format!("**Done, added {} users...**", created);
                self.reply(platform, message, &text).await;
            }

            Command::Unknown(token) => {
                let target = match platform.resolve_mention(guild.id, &token).await {
                    Ok(target) => target,
                    Err(e) => {
                        tracing::warn!(guild_id = guild.id, "Mention lookup failed: {}", e);
                        None
                    }
                };

                match target {
                    Some(user_id) => self.kick_by_owner(platform, guild, message, user_id).await,
                    None => {
                        let text = format!("{}: {}", token, NOT_FOUND_TEXT);
                        self.reply(platform, message, &text).await;
                        self.delete_command(platform, message).await;
                    }
                }
            }
        }
    }

    async fn kick_by_owner<P: GuildPlatform + ?Sized>(
        &self,
        platform: &P,
        guild: &GuildInfo,
        message: &IncomingMessage,
        user_id: u64,
    ) {
        if user_id == guild.owner_id || user_id == platform.self_account_id() {
            self.reply(platform, message, "**That member cannot be kicked**")
                .await;
            return;
        }

        tracing::info!(guild_id = guild.id, user_id, "Owner requested kick");
        let notice = render_template(OWNER_KICK_MESSAGE, 0, &guild.display_name);
        if let Err(e) = platform.send_direct_message(user_id, &notice).await {
            tracing::debug!(user_id, "Kick notice not delivered: {}", e);
        }

        if let Err(e) = platform
            .remove_member(guild.id, user_id, OWNER_KICK_REASON)
            .await
        {
            tracing::error!(guild_id = guild.id, user_id, "Owner kick failed: {}", e);
            self.reply(platform, message, "**Could not kick that member**")
                .await;
        }
    }

    /// Resolve a mention, replying "User not found" when that fails.
    async fn resolve<P: GuildPlatform + ?Sized>(
        &self,
        platform: &P,
        guild: &GuildInfo,
        message: &IncomingMessage,
        token: &str,
    ) -> Option<u64> {
        let resolved = match platform.resolve_mention(guild.id, token).await {
            Ok(resolved) => resolved,
            Err(e) => {
                tracing::warn!(guild_id = guild.id, "Mention lookup failed: {}", e);
                None
            }
        };

        if resolved.is_none() {
            self.reply(platform, message, USER_NOT_FOUND_TEXT).await;
        }
        resolved
    }

    async fn load(&self, guild_id: u64) -> Option<GuildRecord> {
        match self.policy.get_or_create(guild_id).await {
            Ok(record) => Some(record),
            Err(e) => {
                tracing::error!(guild_id, "Failed to load guild settings: {}", e);
                None
            }
        }
    }

    async fn policy_failure<P: GuildPlatform + ?Sized>(
        &self,
        platform: &P,
        message: &IncomingMessage,
        error: PolicyError,
    ) {
        match error {
            PolicyError::Store(e) => {
                tracing::error!(guild_id = message.guild_id, "Command not applied: {}", e);
            }
            PolicyError::UserNotTracked => {
                self.reply(platform, message, "User is not being tracked yet")
                    .await;
            }
            other => self.reply(platform, message, &format!("**{}**", other)).await,
        }
    }

    async fn reply<P: GuildPlatform + ?Sized>(
        &self,
        platform: &P,
        message: &IncomingMessage,
        text: &str,
    ) {
        if let Err(e) = platform.send_channel_message(message.channel_id, text).await {
            tracing::warn!(channel_id = message.channel_id, "Failed to send reply: {}", e);
        }
    }

    async fn delete_command<P: GuildPlatform + ?Sized>(
        &self,
        platform: &P,
        message: &IncomingMessage,
    ) {
        if let Err(e) = platform
            .delete_message(message.channel_id, message.message_id)
            .await
        {
            tracing::warn!(
                channel_id = message.channel_id,
                "Failed to delete command message: {}",
                e
            );
        }
    }
}

fn describe_warn_offset(record: &GuildRecord) -> String {
    if record.is_auto_warn_offset() {
        format!("{} (auto)", record.effective_warn_offset_days())
    } else {
        record.first_warn_offset_days.to_string()
    }
}
