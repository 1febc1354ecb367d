//! Publishing (spec §4.D): immediate `XADD`, or `ZADD NX` onto the delay
//! queue when `delay_ms > 0`.

use std::collections::HashMap;

use crate::client::RedisClient;
use crate::envelope::{DelayedEnvelope, Envelope};
use crate::error::{ConnectionError, TransportError};
use crate::score;

use super::core::Inner;

impl<C: RedisClient> Inner<C> {
    /// Publish `body`/`headers`, delivered immediately if `delay_ms == 0`,
    /// otherwise held in the delay queue until due. Returns the id callers
    /// can pass to `ack`/`reject`: the stream entry id for an immediate
    /// publish, or the envelope's own `uniqid` for a delayed one (the real
    /// stream id doesn't exist yet).
    pub(crate) async fn add(
        &mut self,
        body: String,
        headers: HashMap<String, String>,
        delay_ms: u64,
    ) -> Result<String, ConnectionError> {
        self.ensure_setup().await?;

        if delay_ms > 0 {
            self.add_delayed(body, headers, delay_ms)
                .await
                .map_err(Into::into)
        } else {
            self.add_immediate(body, headers).await.map_err(Into::into)
        }
    }

    async fn add_delayed(
        &mut self,
        body: String,
        headers: HashMap<String, String>,
        delay_ms: u64,
    ) -> Result<String, TransportError> {
        let envelope = DelayedEnvelope::new(body, headers);
        let (secs, ms) = self.client.now_parts();
        let score =
            score::delayed_score_from(secs, ms, delay_ms).ok_or(TransportError::DelayTooBig)?;
        let member = serde_json::to_string(&envelope)?;

        let added = self.client.zadd_nx(&self.queue, &score, &member).await?;
        if !added {
            return Err(TransportError::Other(format!(
                "could not enqueue delayed message \"{}\"",
                envelope.uniqid
            )));
        }

        Ok(envelope.uniqid)
    }

    /// Append straight to the stream. Shared by `add()`'s immediate path and
    /// the scheduler's delay-queue promotion.
    pub(crate) async fn add_immediate(
        &mut self,
        body: String,
        headers: HashMap<String, String>,
    ) -> Result<String, TransportError> {
        let envelope = Envelope { body, headers };
        let json = serde_json::to_string(&envelope)?;
        let max_entries = (self.options.stream_max_entries > 0)
            .then_some(self.options.stream_max_entries);
        self.client
            .xadd(&self.stream, max_entries, "message", &json)
            .await
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use crate::client::MockClient;
    use crate::connection::core::Inner;
    use crate::options::Options;

    fn test_options() -> Options {
        Options::new("messages", "symfony", vec!["localhost:6379".into()]).unwrap()
    }

    #[tokio::test]
    async fn immediate_add_lands_directly_on_the_stream() {
        let mut inner = Inner::new(MockClient::new(), test_options());
        let id = inner.add("hi".into(), HashMap::new(), 0).await.unwrap();
        assert!(!id.is_empty());
        assert_eq!(inner.client.stream_len(), 1);
        assert_eq!(inner.client.queue_len(), 0);
    }

    #[tokio::test]
    async fn delayed_add_lands_in_the_queue_not_the_stream() {
        let mut inner = Inner::new(MockClient::new(), test_options());
        let id = inner
            .add("hi".into(), HashMap::new(), 60_000)
            .await
            .unwrap();
        assert!(!id.is_empty());
        assert_eq!(inner.client.stream_len(), 0);
        assert_eq!(inner.client.queue_len(), 1);
    }

    #[tokio::test]
    async fn stream_max_entries_trims_the_stream() {
        let options = test_options().with_stream_max_entries(2);
        let mut inner = Inner::new(MockClient::new(), options);
        for _ in 0..5 {
            inner.add("x".into(), HashMap::new(), 0).await.unwrap();
        }
        assert_eq!(inner.client.stream_len(), 2);
    }
}
