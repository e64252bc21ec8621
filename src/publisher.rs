use std::sync::Arc;
use std::time::Duration;

use sqlx::SqlitePool;
use tokio::sync::watch;

use crate::db;
use crate::models::{ContentKind, QueueItem};
use crate::transport::{ChatTarget, DeliveryError, Transport};

/// Pause after a network failure before the slot is free again.
pub const NETWORK_BACKOFF: Duration = Duration::from_secs(5);

/// Upper bound on a single transport call.
const DELIVERY_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq)]
pub enum PublishOutcome {
    /// Nothing queued; no delivery was attempted.
    Empty,
    Published { id: i64 },
    /// Delivery failed and the content went back to the tail under `new_id`.
    Requeued {
        id: i64,
        new_id: i64,
        failure: DeliveryError,
        backoff: Duration,
    },
}

/// Pops one item per trigger and hands it to the transport.
///
/// Any number of triggers may run concurrently: each one owns the row it
/// popped, and the store's atomic pop is the only coordination point.
pub struct Publisher {
    pool: SqlitePool,
    transport: Arc<dyn Transport>,
    target: ChatTarget,
}

impl Publisher {
    pub fn new(pool: SqlitePool, transport: Arc<dyn Transport>, target: ChatTarget) -> Self {
        Self {
            pool,
            transport,
            target,
        }
    }

    /// Run one publish cycle, including the failure backoff.
    ///
    /// The backoff ends early once `shutdown` flips to true; the item is
    /// already back in the queue by then.
    pub async fn publish_next(
        &self,
        shutdown: &mut watch::Receiver<bool>,
    ) -> Result<PublishOutcome, sqlx::Error> {
        let outcome = self.attempt().await?;

        if let PublishOutcome::Requeued { backoff, .. } = &outcome {
            if !backoff.is_zero() {
                tracing::debug!("Backing off for {}s", backoff.as_secs());
                tokio::select! {
                    _ = tokio::time::sleep(*backoff) => {}
                    _ = shutdown.wait_for(|stop| *stop) => {
                        tracing::debug!("Backoff interrupted by shutdown");
                    }
                }
            }
        }

        Ok(outcome)
    }

    /// Dequeue, deliver, and on failure put the content back at the tail.
    /// Does not sleep; the backoff to apply is part of the outcome.
    ///
    /// The row is deleted before delivery, so a crash between the pop and the
    /// re-insert on the failure path loses that item.
    pub async fn attempt(&self) -> Result<PublishOutcome, sqlx::Error> {
        let Some(item) = db::queue::dequeue(&self.pool).await? else {
            return Ok(PublishOutcome::Empty);
        };

        tracing::debug!("Publishing queue item {} (kind={})", item.id, item.kind);

        let failure = match self.deliver(&item).await {
            Ok(()) => {
                tracing::info!("Published queue item {} to {}", item.id, self.target);
                return Ok(PublishOutcome::Published { id: item.id });
            }
            Err(failure) => failure,
        };

        let new_id = db::queue::enqueue(&self.pool, &item.kind, &item.payload, &item.caption)
            .await
            .inspect_err(|e| {
                tracing::error!(
                    "Failed to re-enqueue item {} after delivery failure, content lost \
                     (kind={}, payload={:?}, caption={:?}): {e}",
                    item.id,
                    item.kind,
                    item.payload,
                    item.caption
                );
            })?;

        let backoff = backoff_for(&failure);
        match &failure {
            DeliveryError::RateLimited { .. } | DeliveryError::Network(_) => {
                tracing::warn!("Queue item {} requeued as {new_id}: {failure}", item.id);
            }
            DeliveryError::Other(_) => {
                tracing::error!("Queue item {} requeued as {new_id}: {failure}", item.id);
            }
        }

        Ok(PublishOutcome::Requeued {
            id: item.id,
            new_id,
            failure,
            backoff,
        })
    }

    async fn deliver(&self, item: &QueueItem) -> Result<(), DeliveryError> {
        let kind = item.content_kind().map_err(DeliveryError::Other)?;

        let send = async {
            match kind {
                ContentKind::Text => self.transport.send_text(&self.target, &item.payload).await,
                ContentKind::Photo => {
                    self.transport
                        .send_photo(&self.target, &item.payload, item.caption())
                        .await
                }
                ContentKind::Video => {
                    self.transport
                        .send_video(&self.target, &item.payload, item.caption())
                        .await
                }
            }
        };

        match tokio::time::timeout(DELIVERY_TIMEOUT, send).await {
            Ok(result) => result,
            Err(_) => Err(DeliveryError::Network(format!(
                "Delivery timed out after {}s",
                DELIVERY_TIMEOUT.as_secs()
            ))),
        }
    }
}

/// How long a failed cycle holds its slot before returning.
pub fn backoff_for(failure: &DeliveryError) -> Duration {
    match failure {
        DeliveryError::RateLimited { retry_after } => {
            retry_after.saturating_add(Duration::from_secs(1))
        }
        DeliveryError::Network(_) => NETWORK_BACKOFF,
        DeliveryError::Other(_) => Duration::ZERO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_waits_one_second_longer() {
        let failure = DeliveryError::RateLimited {
            retry_after: Duration::from_secs(3),
        };
        assert_eq!(backoff_for(&failure), Duration::from_secs(4));
    }

    #[test]
    fn huge_rate_limit_wait_saturates() {
        let failure = DeliveryError::RateLimited {
            retry_after: Duration::MAX,
        };
        assert_eq!(backoff_for(&failure), Duration::MAX);
    }

    #[test]
    fn network_failure_uses_fixed_backoff() {
        assert_eq!(
            backoff_for(&DeliveryError::Network("reset".into())),
            Duration::from_secs(5)
        );
    }

    #[test]
    fn other_failure_does_not_wait() {
        assert!(backoff_for(&DeliveryError::Other("bad".into())).is_zero());
    }
}
