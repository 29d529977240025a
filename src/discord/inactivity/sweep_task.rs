// Background sweep loop, spawned once from the framework setup.

use super::serenity_platform::SerenityPlatform;
use crate::core::inactivity::{SweepOutcome, SweepReport};
use crate::discord::Data;
use poise::serenity_prelude as serenity;
use tokio::time::sleep;

/// Spawns the periodic inactivity sweep over every stored guild.
///
/// The per-guild day guard makes extra ticks harmless, so the interval only
/// bounds how late in the UTC day a guild gets processed.
pub fn spawn(ctx: &serenity::Context, data: &Data) {
    let service = data.inactivity.clone();
    let platform = SerenityPlatform::from_context(ctx);
    let interval = data.sweep_interval;
    let guild_pause = data.guild_pause;

    tokio::spawn(async move {
        loop {
            tracing::info!("Inactivity sweep starting");
            let reports = service.run_sweep_tick(&platform, guild_pause).await;
            log_summary(&reports);

            sleep(interval).await;
        }
    });
}

fn log_summary(reports: &[SweepReport]) {
    let (mut swept, mut warned, mut kicked, mut failed) = (0usize, 0usize, 0usize, 0usize);
    for report in reports {
        if let SweepOutcome::Completed {
            warned: w,
            kicked: k,
            failed: f,
            ..
        } = report.outcome
        {
            swept += 1;
            warned += w;
            kicked += k;
            failed += f;
        }
    }

    tracing::info!(
        guilds = reports.len(),
        swept,
        warned,
        kicked,
        failed,
        "Inactivity sweep completed"
    );
}
