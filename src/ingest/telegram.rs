use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;

use super::{IngestError, Submission, accept};
use crate::inspector;
use crate::scheduler;
use crate::state::SharedState;
use crate::transport::DeliveryError;
use crate::transport::telegram::{Message, TelegramClient};

/// Pause before polling again after a failed `getUpdates`.
const POLL_ERROR_PAUSE: Duration = Duration::from_secs(5);

/// Long-poll the bot for private messages until shutdown.
pub async fn run(
    state: SharedState,
    client: Arc<TelegramClient>,
    mut shutdown: watch::Receiver<bool>,
) {
    if let Err(e) = client.delete_webhook(true).await {
        tracing::warn!("Could not reset webhook before polling: {e}");
    }

    tracing::info!("Telegram polling started");

    let mut offset: Option<i64> = None;
    loop {
        if *shutdown.borrow() {
            break;
        }

        let updates = tokio::select! {
            updates = client.get_updates(offset, state.config.poll_timeout_secs) => updates,
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
                continue;
            }
        };

        let pause = match updates {
            Ok(updates) => {
                for update in updates {
                    offset = Some(update.update_id + 1);
                    if let Some(message) = update.message {
                        handle_message(&state, &client, &message).await;
                    }
                }
                continue;
            }
            Err(DeliveryError::RateLimited { retry_after }) => retry_after,
            Err(e) => {
                tracing::warn!("getUpdates failed: {e}");
                POLL_ERROR_PAUSE
            }
        };

        tokio::select! {
            _ = tokio::time::sleep(pause) => {}
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
        }
    }

    tracing::info!("Telegram polling stopped");
}

async fn handle_message(state: &SharedState, client: &TelegramClient, message: &Message) {
    let reply = match respond(state, message).await {
        Ok(Some(reply)) => reply,
        Ok(None) => return,
        Err(IngestError::Invalid(msg)) => format!("Not queued: {msg}"),
        Err(e) => {
            tracing::error!("Failed to handle message {}: {e}", message.message_id);
            "Could not queue that right now, please try again.".to_string()
        }
    };

    if let Err(e) = client.reply(message.chat.id, &reply).await {
        tracing::warn!("Failed to reply to chat {}: {e}", message.chat.id);
    }
}

/// Turn one inbound message into at most one queue operation and the reply
/// to send back. `None` means the message is ignored.
pub async fn respond(
    state: &SharedState,
    message: &Message,
) -> Result<Option<String>, IngestError> {
    if let Some(text) = message.text.as_deref() {
        if let Some(command) = text.trim().strip_prefix('/') {
            return run_command(state, command).await;
        }
        if text.trim().is_empty() {
            return Ok(None);
        }
        accept(&state.pool, Submission::text(text)).await?;
        return Ok(Some("Added to the queue 🧾".to_string()));
    }

    if let Some(photos) = message.photo.as_deref() {
        let Some(largest) = photos
            .iter()
            .max_by_key(|p| u64::from(p.width) * u64::from(p.height))
        else {
            return Ok(None);
        };
        accept(
            &state.pool,
            Submission::photo(&largest.file_id, message.caption.clone()),
        )
        .await?;
        return Ok(Some("Photo added to the queue 🖼️".to_string()));
    }

    if let Some(video) = &message.video {
        accept(
            &state.pool,
            Submission::video(&video.file_id, message.caption.clone()),
        )
        .await?;
        return Ok(Some("Video added to the queue 🎬".to_string()));
    }

    Ok(None)
}

async fn run_command(state: &SharedState, command: &str) -> Result<Option<String>, IngestError> {
    // "/queue@my_bot extra" -> "queue"
    let name = command
        .split_whitespace()
        .next()
        .unwrap_or_default()
        .split('@')
        .next()
        .unwrap_or_default();

    match name {
        "start" => Ok(Some(greeting(state))),
        "queue" => {
            let items = inspector::list(&state.pool, inspector::DEFAULT_LIMIT).await?;
            Ok(Some(inspector::format_listing(&items)))
        }
        "purge" => {
            inspector::clear(&state.pool).await?;
            Ok(Some("Queue cleared 🧹".to_string()))
        }
        _ => Ok(None),
    }
}

fn greeting(state: &SharedState) -> String {
    let config = &state.config;
    let upcoming = scheduler::upcoming(&config.slots, config.timezone, Utc::now());
    let slots = upcoming
        .iter()
        .map(|(slot, _)| slot.to_string())
        .collect::<Vec<_>>()
        .join(", ");
    let next = upcoming
        .iter()
        .filter_map(|(_, at)| *at)
        .min()
        .map(|at| at.format("%Y-%m-%d %H:%M").to_string())
        .unwrap_or_else(|| "unknown".to_string());

    format!(
        "Hi! Send me text, a photo or a video with a caption and I'll put it in the queue.\n\
         Posting to the channel at: {slots} ({}). Next slot: {next}.\n\
         Commands: /queue - show the queue; /purge - clear it.",
        config.timezone
    )
}
