//! Lexicographically-comparable score encoding for the delay sorted set.
//!
//! A score is not stored as a Redis numeric score but as a plain string:
//! seconds-since-epoch concatenated with a 3-digit zero-padded millisecond
//! component. Two scores compare correctly as times iff they are compared by
//! `(length, lexicographic)` rather than by raw string ordering — a string one
//! digit longer always represents a later time than any string of the shorter
//! length, no matter what its digits are.
//!
//! This module never reads the wall clock itself; every function here takes
//! `(secs, ms)` from the caller, which gets it from `RedisClient::now_parts`
//! so the delay-queue's notion of "now" can be driven by a test double.

use std::cmp::Ordering;

/// `now` encoded the same way delay scores are: `<secs><ms:03>`.
pub(crate) fn now_key_from(secs: u64, ms: u32) -> String {
    encode(secs, ms)
}

pub(crate) fn encode(secs: u64, ms: u32) -> String {
    format!("{secs}{ms:03}")
}

/// Compare two score strings by `(length, lex)`, the rule the delay queue
/// requires. Longer strings always sort after shorter ones.
pub(crate) fn compare(a: &str, b: &str) -> Ordering {
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

/// `true` when `candidate` represents a time at or before `now` under the
/// `(length, lex)` ordering — i.e. the entry is due.
pub(crate) fn is_due(candidate: &str, now: &str) -> bool {
    compare(candidate, now) != Ordering::Greater
}

/// Compute the due-at score for a message delayed by `delay_ms` from
/// `(secs, ms)`, propagating a millisecond carry into the seconds component.
///
/// Returns `None` if the carry arithmetic would overflow (practically
/// unreachable for any realistic delay, but the source guards it, so we do
/// too).
pub(crate) fn delayed_score_from(secs: u64, ms: u32, delay_ms: u64) -> Option<String> {
    let ms3 = u64::from(ms);

    let mut scaled_low = ms3.checked_add(delay_ms)?;
    let mut carry_secs = 0u64;
    while scaled_low >= 1000 {
        scaled_low -= 1000;
        carry_secs = carry_secs.checked_add(1)?;
    }

    let secs = secs.checked_add(carry_secs)?;
    Some(encode(secs, scaled_low as u32))
}
