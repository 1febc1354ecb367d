//! Pending-message reclamation (spec §4.F): periodically look at the oldest
//! pending entry and, if it's been idle long enough, claim it for this
//! consumer so it gets redelivered.

use std::time::Instant;

use crate::client::RedisClient;
use crate::error::TransportError;

use super::core::Inner;

impl<C: RedisClient> Inner<C> {
    /// Inspect the single oldest pending entry and claim it if it's timed
    /// out. Runs at most once per `claim_interval`, tracked in `next_claim`.
    ///
    /// If the oldest pending entry already belongs to this consumer, there's
    /// nothing to reclaim and no other consumer's claim can race ahead of
    /// us, so we return without advancing `next_claim` — the next `get()`
    /// call re-checks immediately rather than waiting out the interval.
    pub(crate) async fn reclaim(&mut self) -> Result<(), TransportError> {
        let Some(head) = self.client.xpending_head(&self.stream, &self.group).await? else {
            self.next_claim = Instant::now() + self.options.claim_interval;
            return Ok(());
        };

        if head.consumer == self.consumer {
            self.could_have_pending_messages = true;
            return Ok(());
        }

        let redeliver_timeout_ms = self.options.redeliver_timeout.as_millis() as u64;
        if head.idle_ms >= redeliver_timeout_ms {
            let claimed = self
                .client
                .xclaim_justid(
                    &self.stream,
                    &self.group,
                    &self.consumer,
                    redeliver_timeout_ms,
                    std::slice::from_ref(&head.id),
                )
                .await?;

            if !claimed.is_empty() {
                tracing::debug!(
                    stream = %self.stream,
                    group = %self.group,
                    id = %head.id,
                    "reclaimed stale pending entry"
                );
                self.could_have_pending_messages = true;
            }
        }

        self.next_claim = Instant::now() + self.options.claim_interval;
        Ok(())
    }
}
