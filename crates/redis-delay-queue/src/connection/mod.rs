//! The durable, delayed, at-least-once queue connection (spec §3/§4).
//!
//! [`Connection`] owns the stream, its paired delay queue, and a single
//! consumer identity. It is not `Clone` and not meant to be shared across
//! tasks; run one per logical worker, the way the teacher's transport wires
//! one `ConsumerParams` per subscription loop.

mod admin;
mod consumer;
mod core;
mod disposer;
mod producer;
mod reclaimer;
mod scheduler;

use std::collections::HashMap;

use crate::client::RedisHandle;
use crate::envelope::GetMessage;
use crate::error::{ConnectionError, TransportError};
use crate::options::Options;

use core::Inner;

/// Durable, delayed, at-least-once message queue transport on Redis
/// Streams. See the module docs for the lifecycle; `add`/`get`/`ack`/
/// `reject` are the steady-state operations, `setup`/`cleanup` bookend it.
pub struct Connection {
    inner: Inner<RedisHandle>,
}

impl Connection {
    /// Connect to Redis per `options`'s topology and build a `Connection`.
    /// Does not create the consumer group yet: that happens lazily on the
    /// first `add`/`get` when `options.auto_setup` is set, or explicitly via
    /// [`Connection::setup`].
    pub async fn connect(options: Options) -> Result<Self, TransportError> {
        let client = RedisHandle::connect(&options).await?;
        Ok(Self {
            inner: Inner::new(client, options),
        })
    }

    /// Publish a message. `delay_ms == 0` delivers it immediately; any other
    /// value holds it in the delay queue until that many milliseconds have
    /// elapsed, at which point the next `get()` from any consumer promotes
    /// it onto the stream. Returns an id usable with `ack`/`reject` once the
    /// message has actually been delivered by `get()`.
    pub async fn add(
        &mut self,
        body: impl Into<String>,
        headers: HashMap<String, String>,
        delay_ms: u64,
    ) -> Result<String, ConnectionError> {
        self.inner.add(body.into(), headers, delay_ms).await
    }

    /// Fetch the next message for this consumer, or `None` if nothing is
    /// available. Also promotes any delay-queue entries that have come due,
    /// and periodically reclaims pending entries abandoned by other
    /// consumers.
    pub async fn get(&mut self) -> Result<Option<GetMessage>, ConnectionError> {
        self.inner.get().await
    }

    /// Acknowledge successful processing of `id`.
    pub async fn ack(&mut self, id: &str) -> Result<(), TransportError> {
        self.inner.ack(id).await
    }

    /// Reject `id`: acknowledged so it will not be redelivered, but not
    /// treated as successfully processed.
    pub async fn reject(&mut self, id: &str) -> Result<(), TransportError> {
        self.inner.reject(id).await
    }

    /// Idempotently ensure the stream and consumer group exist. Safe to
    /// call from multiple processes concurrently.
    pub async fn setup(&mut self) -> Result<(), ConnectionError> {
        self.inner.setup().await
    }

    /// Remove the stream and its delay queue entirely.
    pub async fn cleanup(&mut self) -> Result<(), TransportError> {
        self.inner.cleanup().await
    }

    /// Number of messages not yet delivered to any consumer.
    pub async fn get_message_count(&mut self) -> Result<u64, TransportError> {
        self.inner.get_message_count().await
    }
}
