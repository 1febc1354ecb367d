//! Delay-queue promotion (spec §4.C): move due members from the sorted set
//! onto the stream before every `get()`.

use crate::client::RedisClient;
use crate::envelope::DelayedEnvelope;
use crate::error::TransportError;
use crate::score;

use super::core::Inner;

impl<C: RedisClient> Inner<C> {
    /// Promote every delay-queue member due at or before now onto the
    /// stream. Bounded to the count observed at the start of the call so a
    /// steady trickle of freshly-due messages can't starve `get()` forever.
    pub(crate) async fn promote_due(&mut self) -> Result<(), TransportError> {
        let (secs, ms) = self.client.now_parts();
        let now = score::now_key_from(secs, ms);
        let due = self.client.zcount_upto(&self.queue, &now).await?;

        for _ in 0..due {
            let Some((member, popped_score)) = self.client.zpopmin(&self.queue).await? else {
                break;
            };

            if !score::is_due(&popped_score, &now) {
                // Another consumer's promotion already drained everything
                // due; what's left just wasn't there yet when we counted.
                // Put it back and stop rather than spin on it.
                self.client
                    .zadd_nx(&self.queue, &popped_score, &member)
                    .await?;
                break;
            }

            let envelope: DelayedEnvelope = serde_json::from_str(&member)?;
            tracing::debug!(
                stream = %self.stream,
                uniqid = %envelope.uniqid,
                "promoting delayed message onto stream"
            );
            self.add_immediate(envelope.body, envelope.headers).await?;
        }

        Ok(())
    }
}
