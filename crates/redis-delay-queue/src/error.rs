use thiserror::Error;

/// Raised synchronously while building [`crate::Options`]. Never recovered from —
/// a caller that gets one should fix its configuration, not retry.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("stream name must not be empty")]
    EmptyStream,

    #[error("group name must not be empty")]
    EmptyGroup,

    #[error("consumer name must not be empty")]
    EmptyConsumer,

    #[error("host list must not be empty")]
    EmptyHostList,

    #[error("invalid DSN: {0}")]
    InvalidDsn(String),

    #[error("invalid value for '{field}': {value}")]
    InvalidNumber { field: &'static str, value: String },
}

/// Any server/client failure encountered while running `add`, `get`, `ack`,
/// `reject`, `setup`, or `cleanup`. Always surfaced to the caller; the core
/// never retries internally.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("connection failed: {0}")]
    Connection(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("message delay is too big")]
    DelayTooBig,

    #[error("could not acknowledge redis message \"{0}\"")]
    AckFailed(String),

    #[error("could not delete message \"{0}\" from the redis stream")]
    DeleteFailed(String),

    #[error("{0}")]
    Other(String),
}

/// A precondition was violated at `setup()` time: the connection was asked to
/// delete messages after ack/reject while more than one consumer group reads
/// the stream, which risks deleting a message before every group has seen it.
#[derive(Debug, Error)]
#[error(
    "delete_after_ack/delete_after_reject is unsafe with more than one consumer group on the stream"
)]
pub struct LogicError;

/// Union of everything `Connection` methods can fail with.
#[derive(Debug, Error)]
pub enum ConnectionError {
    #[error(transparent)]
    Transport(#[from] TransportError),

    #[error(transparent)]
    Logic(#[from] LogicError),
}
