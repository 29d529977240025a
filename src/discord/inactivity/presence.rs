// Bot presence: advertises how many guilds are being watched.
//
// Discord-layer glue only. The count comes from the store so it matches what
// the sweeper will actually visit.

use crate::discord::Data;
use poise::serenity_prelude as serenity;

pub fn presence_text(guild_count: u64, prefix: &str) -> String {
    format!("Watching {} servers | {} help", guild_count, prefix)
}

/// Refreshes the presence from the current guild count.
///
/// A storage failure leaves the previous presence in place.
pub async fn refresh(ctx: &serenity::Context, data: &Data) {
    match data.inactivity.guild_count().await {
        Ok(count) => {
            let activity = serenity::ActivityData::playing(presence_text(count, &data.command_prefix));
            ctx.set_presence(Some(activity), serenity::OnlineStatus::Online);
        }
        Err(e) => tracing::warn!("Failed to count guilds for presence: {}", e),
    }
}
