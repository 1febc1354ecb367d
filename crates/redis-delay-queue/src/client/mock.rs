//! In-memory fake of [`super::RedisClient`], grounded on the teacher's
//! in-process transport fake (`nexus-memory`). Lets the `Connection` state
//! machine (cursor flip, reclaim eligibility, delay-queue promotion) be unit
//! tested deterministically, without a live Redis server.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use super::{GroupInfo, PendingEntry, RedisClient};
use crate::error::TransportError;

struct StreamEntry {
    id: String,
    fields: HashMap<String, String>,
}

struct Group {
    pending: Vec<(String, String, u64)>, // (id, consumer, delivery_count) idle computed from clock_ms
    pending_set_at_ms: HashMap<String, u64>,
    cursor: usize, // index into entries of the next undelivered entry
    last_delivered_id: Option<String>,
}

#[derive(Default)]
struct State {
    entries: Vec<StreamEntry>,
    groups: HashMap<String, Group>,
    zset: Vec<(String, String)>, // (member, score), unsorted; sorted on read
    id_seq: u64,
    clock_ms: u64,
    unlink_supported: bool,
}

/// Baseline wall-clock instant `MockClient`'s virtual clock starts at. Any
/// fixed epoch works; tests only ever compare scores against each other or
/// against this same clock, never against the real clock.
const MOCK_BASE_EPOCH_SECS: u64 = 1_700_000_000;

/// Deterministic, manually-advanced in-memory Redis stand-in.
pub(crate) struct MockClient {
    state: Mutex<State>,
}

impl MockClient {
    pub(crate) fn new() -> Self {
        Self {
            state: Mutex::new(State {
                unlink_supported: true,
                ..Default::default()
            }),
        }
    }

    /// Advance the fake clock by `ms` milliseconds: both the "idle time" base
    /// for whatever is currently pending (reclaim tests) and the delay-queue
    /// due-ness clock `now_parts` reports.
    pub(crate) fn advance_ms(&self, ms: u64) {
        self.state.lock().unwrap().clock_ms += ms;
    }

    pub(crate) fn set_unlink_supported(&self, supported: bool) {
        self.state.lock().unwrap().unlink_supported = supported;
    }

    pub(crate) fn stream_len(&self) -> usize {
        self.state.lock().unwrap().entries.len()
    }

    pub(crate) fn queue_len(&self) -> usize {
        self.state.lock().unwrap().zset.len()
    }
}

fn next_id(state: &mut State) -> String {
    state.id_seq += 1;
    format!("{}-0", state.id_seq)
}

#[async_trait]
impl RedisClient for MockClient {
    async fn xadd(
        &self,
        _stream: &str,
        max_entries: Option<u64>,
        field: &str,
        value: &str,
    ) -> Result<String, TransportError> {
        let mut state = self.state.lock().unwrap();
        let id = next_id(&mut state);
        let mut fields = HashMap::new();
        fields.insert(field.to_string(), value.to_string());
        state.entries.push(StreamEntry {
            id: id.clone(),
            fields,
        });
        if let Some(max) = max_entries {
            let len = state.entries.len();
            let max = max as usize;
            if len > max {
                state.entries.drain(0..len - max);
            }
        }
        Ok(id)
    }

    async fn zadd_nx(&self, _key: &str, score: &str, member: &str) -> Result<bool, TransportError> {
        let mut state = self.state.lock().unwrap();
        if state.zset.iter().any(|(m, _)| m == member) {
            return Ok(false);
        }
        state.zset.push((member.to_string(), score.to_string()));
        Ok(true)
    }

    async fn zcount_upto(&self, _key: &str, max: &str) -> Result<u64, TransportError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .zset
            .iter()
            .filter(|(_, score)| crate::score::is_due(score, max))
            .count() as u64)
    }

    async fn zpopmin(&self, _key: &str) -> Result<Option<(String, String)>, TransportError> {
        let mut state = self.state.lock().unwrap();
        if state.zset.is_empty() {
            return Ok(None);
        }
        let min_idx = state
            .zset
            .iter()
            .enumerate()
            .min_by(|(_, (_, a)), (_, (_, b))| crate::score::compare(a, b))
            .map(|(i, _)| i)
            .unwrap();
        let (member, score) = state.zset.remove(min_idx);
        Ok(Some((member, score)))
    }

    async fn xack(&self, _stream: &str, group: &str, id: &str) -> Result<i64, TransportError> {
        let mut state = self.state.lock().unwrap();
        if let Some(g) = state.groups.get_mut(group) {
            let before = g.pending.len();
            g.pending.retain(|(pid, _, _)| pid != id);
            return Ok(i64::from(before != g.pending.len()));
        }
        Ok(0)
    }

    async fn xdel(&self, _stream: &str, id: &str) -> Result<i64, TransportError> {
        let mut state = self.state.lock().unwrap();
        let before = state.entries.len();
        state.entries.retain(|e| e.id != id);
        Ok(i64::from(before != state.entries.len()))
    }

    async fn xgroup_create(
        &self,
        _stream: &str,
        group: &str,
        start_id: &str,
    ) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        if state.groups.contains_key(group) {
            return Err(TransportError::Other(format!(
                "BUSYGROUP Consumer Group name already exists: {group}"
            )));
        }
        let cursor = if start_id == "0" { 0 } else { state.entries.len() };
        state.groups.insert(
            group.to_string(),
            Group {
                pending: Vec::new(),
                pending_set_at_ms: HashMap::new(),
                cursor,
                last_delivered_id: None,
            },
        );
        Ok(())
    }

    async fn xreadgroup(
        &self,
        _stream: &str,
        group: &str,
        consumer: &str,
        id: &str,
        count: u32,
        _block_ms: u64,
    ) -> Result<Vec<(String, HashMap<String, String>)>, TransportError> {
        let mut state = self.state.lock().unwrap();
        let clock_ms = state.clock_ms;
        let Some(g) = state.groups.get_mut(group) else {
            return Err(TransportError::Other(format!("NOGROUP {group}")));
        };

        let mut out = Vec::new();

        if id == "0" {
            // Re-deliver this consumer's own pending entries, oldest first.
            for (pid, owner, _) in &g.pending {
                if owner == consumer && out.len() < count as usize {
                    if let Some(entry) = state.entries.iter().find(|e| &e.id == pid) {
                        out.push((entry.id.clone(), entry.fields.clone()));
                    }
                }
            }
        } else {
            // New entries only (">").
            while out.len() < count as usize && g.cursor < state.entries.len() {
                let entry = &state.entries[g.cursor];
                out.push((entry.id.clone(), entry.fields.clone()));
                g.pending.push((entry.id.clone(), consumer.to_string(), 1));
                g.pending_set_at_ms.insert(entry.id.clone(), clock_ms);
                g.last_delivered_id = Some(entry.id.clone());
                g.cursor += 1;
            }
        }

        Ok(out)
    }

    async fn xpending_head(
        &self,
        _stream: &str,
        group: &str,
    ) -> Result<Option<PendingEntry>, TransportError> {
        let state = self.state.lock().unwrap();
        let Some(g) = state.groups.get(group) else {
            return Ok(None);
        };
        Ok(g.pending.first().map(|(id, consumer, delivery_count)| {
            let set_at = g.pending_set_at_ms.get(id).copied().unwrap_or(state.clock_ms);
            PendingEntry {
                id: id.clone(),
                consumer: consumer.clone(),
                idle_ms: state.clock_ms.saturating_sub(set_at),
                delivery_count: *delivery_count,
            }
        }))
    }

    async fn xclaim_justid(
        &self,
        _stream: &str,
        group: &str,
        consumer: &str,
        min_idle_ms: u64,
        ids: &[String],
    ) -> Result<Vec<String>, TransportError> {
        let mut state = self.state.lock().unwrap();
        let clock_ms = state.clock_ms;
        let Some(g) = state.groups.get_mut(group) else {
            return Ok(Vec::new());
        };

        let mut claimed = Vec::new();
        for id in ids {
            let set_at = g.pending_set_at_ms.get(id).copied().unwrap_or(clock_ms);
            let idle = clock_ms.saturating_sub(set_at);
            if idle < min_idle_ms {
                continue;
            }
            if let Some(entry) = g.pending.iter_mut().find(|(pid, _, _)| pid == id) {
                entry.1 = consumer.to_string();
                entry.2 += 1;
                g.pending_set_at_ms.insert(id.clone(), clock_ms);
                claimed.push(id.clone());
            }
        }
        Ok(claimed)
    }

    async fn xinfo_groups(&self, _stream: &str) -> Result<Vec<GroupInfo>, TransportError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .groups
            .iter()
            .map(|(name, g)| GroupInfo {
                name: name.clone(),
                lag: None,
                last_delivered_id: g.last_delivered_id.clone(),
            })
            .collect())
    }

    async fn xrange_ids(
        &self,
        _stream: &str,
        start_exclusive: &str,
        count: u32,
    ) -> Result<Vec<String>, TransportError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .entries
            .iter()
            .filter(|e| e.id.as_str() > start_exclusive)
            .take(count as usize)
            .map(|e| e.id.clone())
            .collect())
    }

    async fn unlink(&self, keys: &[&str]) -> Result<bool, TransportError> {
        let state = self.state.lock().unwrap();
        if !state.unlink_supported {
            return Ok(false);
        }
        drop(state);
        self.del(keys).await?;
        Ok(true)
    }

    async fn del(&self, keys: &[&str]) -> Result<(), TransportError> {
        let mut state = self.state.lock().unwrap();
        if keys.iter().any(|k| k.ends_with("__queue")) {
            state.zset.clear();
        }
        state.entries.clear();
        Ok(())
    }

    async fn ping(&self) -> Result<bool, TransportError> {
        Ok(true)
    }

    fn now_parts(&self) -> (u64, u32) {
        let state = self.state.lock().unwrap();
        let total_ms = MOCK_BASE_EPOCH_SECS * 1000 + state.clock_ms;
        (total_ms / 1000, (total_ms % 1000) as u32)
    }
}
