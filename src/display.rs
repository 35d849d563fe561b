use anyhow::Result;
use tokio::sync::mpsc;
use tracing::info;

use crate::metrics;
use crate::models::DisplayMessage;

/// Consume fired reminders and surface them ephemerally. Emission is
/// fire-and-forget from the producer's side; the channel drains here and the
/// task ends when every sender is gone.
pub async fn run_display_sink(mut receiver: mpsc::Receiver<DisplayMessage>) -> Result<()> {
    info!("Starting display sink");

    let mut shown_count = 0u64;

    while let Some(message) = receiver.recv().await {
        shown_count += 1;
        metrics::DISPLAY_MESSAGES.inc();

        info!(
            title = %message.title,
            "{}",
            message.message
        );

        // Only log running stats periodically to reduce log spam
        if shown_count % 10 == 0 {
            info!("Display sink stats: {} messages shown", shown_count);
        }
    }

    info!("Display sink stopped");
    Ok(())
}
