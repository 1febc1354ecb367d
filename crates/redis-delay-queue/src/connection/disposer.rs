//! Message disposal (spec §4.G): acknowledging a successfully processed
//! message, or rejecting one that should not be retried.

use crate::client::RedisClient;
use crate::error::TransportError;

use super::core::Inner;

impl<C: RedisClient> Inner<C> {
    /// Acknowledge `id`. If `delete_after_ack` is set, the stream entry is
    /// also removed, and success is judged by the delete alone — acking an
    /// entry that's already gone from the PEL but still present on the
    /// stream (e.g. a redundant ack after reclaim) still counts as success
    /// as long as the delete succeeds.
    pub(crate) async fn ack(&mut self, id: &str) -> Result<(), TransportError> {
        let acked = self.client.xack(&self.stream, &self.group, id).await?;
        let mut ok = acked > 0;

        if self.options.delete_after_ack {
            let deleted = self.client.xdel(&self.stream, id).await?;
            ok = deleted > 0;
        }

        if !ok {
            return Err(TransportError::AckFailed(id.to_string()));
        }
        Ok(())
    }

    /// Reject `id` without redelivering it. If `delete_after_reject` is set,
    /// the stream entry is also removed; unlike `ack`, the delete result is
    /// combined with the ack result rather than overwriting it, so a
    /// half-successful reject (acked but not deleted, or vice versa) is
    /// still reported as a failure.
    pub(crate) async fn reject(&mut self, id: &str) -> Result<(), TransportError> {
        let acked = self.client.xack(&self.stream, &self.group, id).await?;
        let mut ok = acked > 0;

        if self.options.delete_after_reject {
            let deleted = self.client.xdel(&self.stream, id).await?;
            ok = ok && deleted > 0;
        }

        if !ok {
            return Err(TransportError::DeleteFailed(id.to_string()));
        }
        Ok(())
    }
}
