//! Fetching (spec §4.E): promote due delayed messages, reclaim stale pending
//! entries if it's time, then read this consumer's own redeliveries before
//! falling back to new entries.

use std::collections::HashMap;
use std::time::Instant;

use crate::client::RedisClient;
use crate::envelope::GetMessage;
use crate::error::ConnectionError;

use super::core::Inner;

impl<C: RedisClient> Inner<C> {
    /// Return the next message for this consumer, or `None` if nothing is
    /// available right now.
    ///
    /// Reads this consumer's own pending (unacked) entries first — so a
    /// crash-and-restart redelivers what was in flight before anything
    /// new — and only moves on to fresh entries once that backlog is
    /// exhausted. The flip from "pending" to "new" happens at most once per
    /// call: an empty pending read flips `could_have_pending_messages` to
    /// `false` and the loop tries the new-entries cursor in the same call,
    /// rather than returning `None` and making the caller poll again.
    pub(crate) async fn get(&mut self) -> Result<Option<GetMessage>, ConnectionError> {
        self.ensure_setup().await?;
        self.promote_due().await?;

        if !self.could_have_pending_messages && Instant::now() >= self.next_claim {
            self.reclaim().await?;
        }

        loop {
            let cursor = if self.could_have_pending_messages {
                "0"
            } else {
                ">"
            };

            let entries = self
                .client
                .xreadgroup(&self.stream, &self.group, &self.consumer, cursor, 1, 1)
                .await?;

            let Some((id, fields)) = entries.into_iter().next() else {
                if self.could_have_pending_messages {
                    self.could_have_pending_messages = false;
                    continue;
                }
                return Ok(None);
            };

            let mut data = HashMap::new();
            data.insert(id.clone(), fields);
            return Ok(Some(GetMessage { id, data }));
        }
    }
}
