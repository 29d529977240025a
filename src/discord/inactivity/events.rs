// Gateway event routing for the inactivity service.
//
// Each serenity event is flattened into raw ids and handed to core. Errors
// are logged here; nothing is propagated back to poise except hard failures.

use super::presence;
use super::serenity_platform::SerenityPlatform;
use crate::core::inactivity::IncomingMessage;
use crate::discord::{Data, Error};
use chrono::{DateTime, Utc};
use poise::serenity_prelude as serenity;

/// Event handler for all non-command Discord events.
pub async fn event_handler(
    ctx: &serenity::Context,
    event: &serenity::FullEvent,
    _framework: poise::FrameworkContext<'_, Data, Error>,
    data: &Data,
) -> Result<(), Error> {
    let platform = SerenityPlatform::from_context(ctx);

    match event {
        serenity::FullEvent::Message { new_message } => {
            // Direct messages have no guild to track against.
            let Some(guild_id) = new_message.guild_id else {
                return Ok(());
            };

            let message = IncomingMessage {
                guild_id: guild_id.get(),
                channel_id: new_message.channel_id.get(),
                message_id: new_message.id.get(),
                author_id: new_message.author.id.get(),
                content: new_message.content.clone(),
                sent_at: to_utc(&new_message.timestamp),
            };
            data.inactivity.on_message(&platform, message).await;
        }
        serenity::FullEvent::GuildMemberAddition { new_member } => {
            data.inactivity
                .on_member_join(
                    &platform,
                    new_member.guild_id.get(),
                    new_member.user.id.get(),
                    Utc::now(),
                )
                .await;
        }
        serenity::FullEvent::GuildMemberRemoval { guild_id, user, .. } => {
            data.inactivity
                .on_member_leave(guild_id.get(), user.id.get())
                .await;
        }
        serenity::FullEvent::VoiceStateUpdate { new, .. } => {
            if let Some(guild_id) = new.guild_id {
                data.inactivity
                    .on_voice_state_change(
                        &platform,
                        guild_id.get(),
                        new.user_id.get(),
                        Utc::now(),
                    )
                    .await;
            }
        }
        serenity::FullEvent::GuildCreate { guild, .. } => {
            if data.inactivity.on_self_join_guild(&platform, guild.id.get()).await {
                presence::refresh(ctx, data).await;
            }
        }
        serenity::FullEvent::GuildDelete { incomplete, .. } => {
            // An outage also arrives as GuildDelete; only a real removal clears data.
            if incomplete.unavailable {
                tracing::warn!(guild_id = incomplete.id.get(), "Guild became unavailable");
                return Ok(());
            }

            if let Err(e) = data.inactivity.on_self_leave_guild(incomplete.id.get()).await {
                tracing::error!(
                    guild_id = incomplete.id.get(),
                    "Failed to remove guild data: {}",
                    e
                );
            }
            presence::refresh(ctx, data).await;
        }
        serenity::FullEvent::Ready { data_about_bot } => {
            tracing::info!(
                user = %data_about_bot.user.name,
                guilds = data_about_bot.guilds.len(),
                "Connected to gateway"
            );
            presence::refresh(ctx, data).await;
        }

        _ => {}
    }

    Ok(())
}

/// Gateway timestamps carry second precision, which is all the day math needs.
fn to_utc(timestamp: &serenity::Timestamp) -> DateTime<Utc> {
    DateTime::from_timestamp(timestamp.unix_timestamp(), 0).unwrap_or_else(Utc::now)
}
