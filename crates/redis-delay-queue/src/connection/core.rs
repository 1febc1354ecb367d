use std::time::Instant;

use crate::client::RedisClient;
use crate::keys::queue_key;
use crate::options::Options;

/// The state machine from spec §3/§4: stream, delay queue, consumer-group
/// cursor, pending-message reclamation, and per-message lifecycle, generic
/// over the client adapter so it can run against a live Redis server or the
/// in-memory fake used by unit tests.
///
/// Not `Sync`-required: a single instance is meant for one logical consumer
/// (spec §5). Multiple instances share `stream`/`group` safely through the
/// server's atomics, not through anything in this struct.
pub(crate) struct Inner<C: RedisClient> {
    pub(crate) client: C,
    pub(crate) options: Options,
    pub(crate) stream: String,
    pub(crate) queue: String,
    pub(crate) group: String,
    pub(crate) consumer: String,

    pub(crate) auto_setup: bool,
    pub(crate) could_have_pending_messages: bool,
    pub(crate) next_claim: Instant,
    /// `None` until `cleanup()` has been tried once; see spec §9's note on
    /// replacing the process-wide "UNLINK works" flag with instance state.
    pub(crate) unlink_supported: Option<bool>,
}

impl<C: RedisClient> Inner<C> {
    pub(crate) fn new(client: C, options: Options) -> Self {
        let stream = options.stream.clone();
        let queue = queue_key(&stream);
        let group = options.group.clone();
        let consumer = options.consumer.clone();
        let auto_setup = options.auto_setup;

        Self {
            client,
            options,
            stream,
            queue,
            group,
            consumer,
            auto_setup,
            could_have_pending_messages: true,
            next_claim: Instant::now(),
            unlink_supported: None,
        }
    }

    pub(crate) async fn ensure_setup(&mut self) -> Result<(), crate::error::ConnectionError> {
        if self.auto_setup {
            self.setup().await?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::MockClient;

    fn test_options() -> Options {
        Options::new("messages", "symfony", vec!["localhost:6379".into()]).unwrap()
    }

    #[test]
    fn new_starts_with_pending_cursor_and_auto_setup_from_options() {
        let inner = Inner::new(MockClient::new(), test_options());
        assert!(inner.could_have_pending_messages);
        assert!(inner.auto_setup);
        assert_eq!(inner.queue, "messages__queue");
    }

    #[test]
    fn unlink_supported_starts_unknown() {
        let inner = Inner::new(MockClient::new(), test_options());
        assert!(inner.unlink_supported.is_none());
    }
}
