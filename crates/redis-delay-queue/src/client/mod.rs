mod mock;
mod redis_handle;

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

pub(crate) use mock::MockClient;
pub(crate) use redis_handle::RedisHandle;

use crate::error::TransportError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct PendingEntry {
    pub id: String,
    pub consumer: String,
    pub idle_ms: u64,
    pub delivery_count: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct GroupInfo {
    pub name: String,
    pub lag: Option<u64>,
    pub last_delivered_id: Option<String>,
}

/// Opaque handle to a Redis-compatible server (spec §4.A). Exposes the
/// typed command wrappers `Connection` needs; topology (single/cluster/
/// sentinel), auth, and timeouts are all resolved when the handle is built
/// from [`crate::Options`], not per-call.
#[async_trait]
pub(crate) trait RedisClient: Send + Sync {
    async fn xadd(
        &self,
        stream: &str,
        max_entries: Option<u64>,
        field: &str,
        value: &str,
    ) -> Result<String, TransportError>;

    async fn zadd_nx(&self, key: &str, score: &str, member: &str) -> Result<bool, TransportError>;

    async fn zcount_upto(&self, key: &str, max: &str) -> Result<u64, TransportError>;

    /// Pop the single lowest-scored member. `None` when the set is empty.
    async fn zpopmin(&self, key: &str) -> Result<Option<(String, String)>, TransportError>;

    async fn xack(&self, stream: &str, group: &str, id: &str) -> Result<i64, TransportError>;

    async fn xdel(&self, stream: &str, id: &str) -> Result<i64, TransportError>;

    /// `XGROUP CREATE ... MKSTREAM`. Returns the raw error on failure so the
    /// caller can absorb `BUSYGROUP` itself (spec invariant 3).
    async fn xgroup_create(
        &self,
        stream: &str,
        group: &str,
        start_id: &str,
    ) -> Result<(), TransportError>;

    /// `XREADGROUP GROUP <group> <consumer> COUNT 1 BLOCK <block_ms> STREAMS
    /// <stream> <id>`, reshaped to `(entry_id, {field: value})` pairs for
    /// just this stream.
    async fn xreadgroup(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        id: &str,
        count: u32,
        block_ms: u64,
    ) -> Result<Vec<(String, HashMap<String, String>)>, TransportError>;

    /// `XPENDING <stream> <group> - + 1`: the single oldest pending entry, if
    /// any.
    async fn xpending_head(
        &self,
        stream: &str,
        group: &str,
    ) -> Result<Option<PendingEntry>, TransportError>;

    /// `XCLAIM <stream> <group> <consumer> <min_idle_ms> <ids...> JUSTID`.
    /// Returns the ids actually claimed.
    async fn xclaim_justid(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        min_idle_ms: u64,
        ids: &[String],
    ) -> Result<Vec<String>, TransportError>;

    async fn xinfo_groups(&self, stream: &str) -> Result<Vec<GroupInfo>, TransportError>;

    /// `XRANGE <stream> <start_exclusive> + COUNT <count>`. Returns the ids
    /// in the page.
    async fn xrange_ids(
        &self,
        stream: &str,
        start_exclusive: &str,
        count: u32,
    ) -> Result<Vec<String>, TransportError>;

    /// `UNLINK <keys...>`. `Ok(false)` or `Err` both mean "fall back to DEL";
    /// only the caller's first call determines whether UNLINK is usable.
    async fn unlink(&self, keys: &[&str]) -> Result<bool, TransportError>;

    async fn del(&self, keys: &[&str]) -> Result<(), TransportError>;

    async fn ping(&self) -> Result<bool, TransportError>;

    /// Current time as `(seconds since epoch, millisecond fraction)`, the
    /// basis for every delay-queue score the scheduler and producer compute.
    /// Letting the client adapter own this is what makes `MockClient`'s
    /// manually-advanced clock actually drive delay due-ness in tests,
    /// instead of racing the real wall clock.
    fn now_parts(&self) -> (u64, u32);
}

/// Lets several `Connection`s share one client adapter, e.g. a shared
/// in-memory fake across two consumers in a test.
#[async_trait]
impl<T: RedisClient + ?Sized> RedisClient for Arc<T> {
    async fn xadd(
        &self,
        stream: &str,
        max_entries: Option<u64>,
        field: &str,
        value: &str,
    ) -> Result<String, TransportError> {
        (**self).xadd(stream, max_entries, field, value).await
    }

    async fn zadd_nx(&self, key: &str, score: &str, member: &str) -> Result<bool, TransportError> {
        (**self).zadd_nx(key, score, member).await
    }

    async fn zcount_upto(&self, key: &str, max: &str) -> Result<u64, TransportError> {
        (**self).zcount_upto(key, max).await
    }

    async fn zpopmin(&self, key: &str) -> Result<Option<(String, String)>, TransportError> {
        (**self).zpopmin(key).await
    }

    async fn xack(&self, stream: &str, group: &str, id: &str) -> Result<i64, TransportError> {
        (**self).xack(stream, group, id).await
    }

    async fn xdel(&self, stream: &str, id: &str) -> Result<i64, TransportError> {
        (**self).xdel(stream, id).await
    }

    async fn xgroup_create(
        &self,
        stream: &str,
        group: &str,
        start_id: &str,
    ) -> Result<(), TransportError> {
        (**self).xgroup_create(stream, group, start_id).await
    }

    async fn xreadgroup(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        id: &str,
        count: u32,
        block_ms: u64,
    ) -> Result<Vec<(String, HashMap<String, String>)>, TransportError> {
        (**self)
            .xreadgroup(stream, group, consumer, id, count, block_ms)
            .await
    }

    async fn xpending_head(
        &self,
        stream: &str,
        group: &str,
    ) -> Result<Option<PendingEntry>, TransportError> {
        (**self).xpending_head(stream, group).await
    }

    async fn xclaim_justid(
        &self,
        stream: &str,
        group: &str,
        consumer: &str,
        min_idle_ms: u64,
        ids: &[String],
    ) -> Result<Vec<String>, TransportError> {
        (**self)
            .xclaim_justid(stream, group, consumer, min_idle_ms, ids)
            .await
    }

    async fn xinfo_groups(&self, stream: &str) -> Result<Vec<GroupInfo>, TransportError> {
        (**self).xinfo_groups(stream).await
    }

    async fn xrange_ids(
        &self,
        stream: &str,
        start_exclusive: &str,
        count: u32,
    ) -> Result<Vec<String>, TransportError> {
        (**self).xrange_ids(stream, start_exclusive, count).await
    }

    async fn unlink(&self, keys: &[&str]) -> Result<bool, TransportError> {
        (**self).unlink(keys).await
    }

    async fn del(&self, keys: &[&str]) -> Result<(), TransportError> {
        (**self).del(keys).await
    }

    async fn ping(&self) -> Result<bool, TransportError> {
        (**self).ping().await
    }

    fn now_parts(&self) -> (u64, u32) {
        (**self).now_parts()
    }
}
