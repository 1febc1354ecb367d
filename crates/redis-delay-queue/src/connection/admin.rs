//! Lifecycle administration (spec §4.H): idempotent setup, best-effort
//! teardown, and a lag estimate that doesn't require a live tail read.

use crate::client::RedisClient;
use crate::error::{ConnectionError, LogicError, TransportError};

use super::core::Inner;

const XRANGE_PAGE: u32 = 100;

impl<C: RedisClient> Inner<C> {
    /// Create the consumer group if it doesn't exist yet, tolerating
    /// `BUSYGROUP` from a concurrent caller or a previous run. When deleting
    /// messages after ack/reject is enabled, refuse to proceed if more than
    /// one consumer group reads the stream — a second group would never see
    /// messages the first one already deleted.
    pub(crate) async fn setup(&mut self) -> Result<(), ConnectionError> {
        match self.client.xgroup_create(&self.stream, &self.group, "0").await {
            Ok(()) => {}
            Err(TransportError::Other(msg)) if msg.contains("BUSYGROUP") => {
                tracing::debug!(stream = %self.stream, group = %self.group, "consumer group already exists");
            }
            Err(e) => return Err(e.into()),
        }

        if self.options.delete_after_ack || self.options.delete_after_reject {
            let groups = self.client.xinfo_groups(&self.stream).await?;
            if groups.len() > 1 {
                return Err(LogicError.into());
            }
        }

        self.auto_setup = false;
        Ok(())
    }

    /// Remove the stream and its delay queue. Tries `UNLINK` first (async
    /// reclaim on the server), falling back to `DEL` the first time UNLINK
    /// turns out to be unsupported, and remembering that choice for the
    /// rest of this connection's life.
    pub(crate) async fn cleanup(&mut self) -> Result<(), TransportError> {
        if self.unlink_supported.unwrap_or(true) {
            match self.client.unlink(&[self.stream.as_str(), self.queue.as_str()]).await {
                Ok(true) => {
                    self.unlink_supported = Some(true);
                    return Ok(());
                }
                Ok(false) | Err(_) => {
                    self.unlink_supported = Some(false);
                }
            }
        }

        self.client.del(&[self.stream.as_str()]).await?;
        self.client.del(&[self.queue.as_str()]).await?;
        Ok(())
    }

    /// Number of messages not yet delivered to any consumer. Prefers the
    /// server's own `lag` figure (Redis 7+); falls back to paging through
    /// the stream past the group's last-delivered id and counting entries,
    /// for servers that don't report it.
    pub(crate) async fn get_message_count(&mut self) -> Result<u64, TransportError> {
        let groups = self.client.xinfo_groups(&self.stream).await?;
        let Some(group) = groups.into_iter().find(|g| g.name == self.group) else {
            return Ok(0);
        };

        if let Some(lag) = group.lag {
            return Ok(lag);
        }

        let Some(mut cursor) = group.last_delivered_id else {
            return Ok(0);
        };

        let mut count = 0u64;
        loop {
            let ids = self
                .client
                .xrange_ids(&self.stream, &cursor, XRANGE_PAGE)
                .await?;
            if ids.is_empty() {
                break;
            }
            count += ids.len() as u64;
            if ids.len() < XRANGE_PAGE as usize {
                break;
            }
            cursor = ids.last().cloned().expect("just checked non-empty");
        }

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use crate::client::MockClient;
    use crate::connection::core::Inner;
    use crate::error::ConnectionError;
    use crate::options::Options;

    fn test_options() -> Options {
        Options::new("messages", "symfony", vec!["localhost:6379".into()]).unwrap()
    }

    #[tokio::test]
    async fn setup_is_idempotent() {
        let mut inner = Inner::new(MockClient::new(), test_options());
        inner.setup().await.unwrap();
        inner.setup().await.unwrap();
    }

    #[tokio::test]
    async fn cleanup_removes_everything_added() {
        let mut inner = Inner::new(MockClient::new(), test_options());
        inner.add("x".into(), HashMap::new(), 0).await.unwrap();
        inner.add("y".into(), HashMap::new(), 60_000).await.unwrap();

        inner.cleanup().await.unwrap();
        assert_eq!(inner.client.stream_len(), 0);
        assert_eq!(inner.client.queue_len(), 0);
    }

    #[tokio::test]
    async fn cleanup_falls_back_to_del_when_unlink_is_unsupported() {
        let client = MockClient::new();
        client.set_unlink_supported(false);
        let mut inner = Inner::new(client, test_options());
        inner.add("x".into(), HashMap::new(), 0).await.unwrap();

        inner.cleanup().await.unwrap();
        assert_eq!(inner.client.stream_len(), 0);
        assert_eq!(inner.unlink_supported, Some(false));
    }

    #[tokio::test]
    async fn get_message_count_falls_back_to_xrange_paging_when_lag_is_unavailable() {
        let mut inner = Inner::new(MockClient::new(), test_options());
        inner.setup().await.unwrap();
        inner.add("a".into(), HashMap::new(), 0).await.unwrap();
        inner.add("b".into(), HashMap::new(), 0).await.unwrap();
        inner.add("c".into(), HashMap::new(), 0).await.unwrap();

        // Nothing delivered yet: last_delivered_id is None, so the fallback
        // path reports zero rather than paging from a nonexistent cursor.
        assert_eq!(inner.get_message_count().await.unwrap(), 0);

        inner.get().await.unwrap();
        // One entry delivered; two remain undelivered.
        assert_eq!(inner.get_message_count().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn setup_rejects_a_second_group_when_delete_after_ack_is_enabled() {
        let mut first = Inner::new(MockClient::new(), test_options());
        first.setup().await.unwrap();

        // Simulate a second consumer group on the same stream by creating
        // one directly against the same client.
        first
            .client
            .xgroup_create(&first.stream, "other-group", "0")
            .await
            .unwrap();

        let err = first.setup().await.unwrap_err();
        assert!(matches!(err, ConnectionError::Logic(_)));
    }
}
