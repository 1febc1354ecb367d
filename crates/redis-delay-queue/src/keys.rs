//! Key derivation for the stream and its delay queue.

/// Derive the delay sorted-set key for a given stream key.
///
/// `messages` -> `messages__queue`
pub(crate) fn queue_key(stream: &str) -> String {
    format!("{stream}__queue")
}
