//! Long-polling update loop

use super::api::BotApi;
use crate::runtime::{BlobResolver, ReplySink, RuntimeManager};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Pause after a failed poll before trying again
const RETRY_DELAY: Duration = Duration::from_secs(3);

/// Feed updates into `manager` until `shutdown` fires
pub async fn run_polling<B, R>(
    api: &BotApi,
    manager: &RuntimeManager<B, R>,
    poll_timeout: Duration,
    shutdown: CancellationToken,
) where
    B: BlobResolver + 'static,
    R: ReplySink + 'static,
{
    let mut offset: i64 = 0;
    tracing::info!(poll_timeout_secs = poll_timeout.as_secs(), "Polling for updates");

    loop {
        let updates = tokio::select! {
            biased;
            () = shutdown.cancelled() => break,
            result = api.get_updates(offset, poll_timeout) => result,
        };

        let updates = match updates {
            Ok(updates) => updates,
            Err(e) => {
                tracing::warn!(error = %e, "getUpdates failed, retrying");
                tokio::select! {
                    () = shutdown.cancelled() => break,
                    () = tokio::time::sleep(RETRY_DELAY) => continue,
                }
            }
        };

        for update in updates {
            offset = offset.max(update.update_id + 1);
            let update_id = update.update_id;
            let Some((conversation, event)) = update.into_event() else {
                tracing::debug!(update_id, "Ignoring update");
                continue;
            };
            if let Err(e) = manager.send_event(conversation, event).await {
                tracing::error!(conv_id = %conversation, error = %e, "Failed to deliver event");
            }
        }
    }

    tracing::info!("Polling stopped");
}
