//! Durable, delayed, at-least-once message queue transport on Redis
//! Streams.
//!
//! A [`Connection`] pairs a stream (the message log and consumer group) with
//! a sorted set (the delay queue): `add` either appends directly or holds
//! the message until due, `get` promotes anything due and then reads from
//! the consumer group, and `ack`/`reject` close out a message's lifecycle.
//! See [`Connection`] for the full operation set.

mod client;
mod connection;
mod dsn;
mod envelope;
mod error;
mod keys;
mod options;
mod score;

pub use connection::Connection;
pub use envelope::{Envelope, GetMessage};
pub use error::{ConfigError, ConnectionError, LogicError, TransportError};
pub use options::{Options, Topology};
