//! In-process adapter for [`KvStore`].
//!
//! Coordination only spans the tasks of one process, which is what tests and
//! single-node deployments need. Each operation holds the shard lock of its
//! key for its whole duration, matching the per-command atomicity of Redis.

use super::KvStore;
use crate::error::Result;
use async_trait::async_trait;
use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use std::cmp::Ordering;
use std::collections::HashMap;
use std::time::{Duration, Instant};

#[derive(Debug, Clone)]
struct StoredValue {
    value: String,
    expires_at: Option<Instant>,
}

impl StoredValue {
    fn new(value: &str, ttl: Option<Duration>) -> Self {
        Self {
            value: value.to_string(),
            expires_at: ttl.map(|ttl| Instant::now() + ttl),
        }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map_or(false, |at| at <= now)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    strings: DashMap<String, StoredValue>,
    sorted_sets: DashMap<String, HashMap<String, f64>>,
}

fn sorted_members(set: &HashMap<String, f64>) -> Vec<(String, f64)> {
    let mut members: Vec<(String, f64)> = set.iter().map(|(m, s)| (m.clone(), *s)).collect();
    members.sort_by(|a, b| match a.1.total_cmp(&b.1) {
        Ordering::Equal => a.0.cmp(&b.0),
        other => other,
    });
    members
}

/// Resolves Redis-style inclusive (possibly negative) rank bounds.
fn resolve_range(len: usize, start: isize, stop: isize) -> Option<(usize, usize)> {
    let len = len as isize;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if len == 0 || start > stop || start >= len || stop < 0 {
        return None;
    }
    Some((start as usize, stop as usize))
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn put(&self, key: &str, value: &str, ttl: Option<Duration>) {
        self.strings.insert(key.to_string(), StoredValue::new(value, ttl));
    }
}

#[async_trait]
impl KvStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let now = Instant::now();
        let expired = match self.strings.get(key) {
            Some(entry) if !entry.is_expired(now) => return Ok(Some(entry.value.clone())),
            Some(_) => true,
            None => false,
        };
        if expired {
            self.strings.remove_if(key, |_, v| v.is_expired(now));
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        self.put(key, value, None);
        Ok(())
    }

    async fn set_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<()> {
        self.put(key, value, Some(ttl));
        Ok(())
    }

    async fn set_nx_ex(&self, key: &str, value: &str, ttl: Duration) -> Result<bool> {
        let now = Instant::now();
        let created = match self.strings.entry(key.to_string()) {
            Entry::Occupied(mut occupied) => {
                if occupied.get().is_expired(now) {
                    occupied.insert(StoredValue::new(value, Some(ttl)));
                    true
                } else {
                    false
                }
            }
            Entry::Vacant(vacant) => {
                vacant.insert(StoredValue::new(value, Some(ttl)));
                true
            }
        };
        Ok(created)
    }

    async fn del(&self, key: &str) -> Result<bool> {
        let now = Instant::now();
        let removed = self.strings.remove(key).map_or(false, |(_, v)| !v.is_expired(now));
        let removed_set = self.sorted_sets.remove(key).is_some();
        Ok(removed || removed_set)
    }

    async fn del_if_eq(&self, key: &str, expected: &str) -> Result<bool> {
        let now = Instant::now();
        let removed = self
            .strings
            .remove_if(key, |_, v| !v.is_expired(now) && v.value == expected)
            .is_some();
        Ok(removed)
    }

    async fn zadd_nx(&self, key: &str, member: &str, score: f64) -> Result<bool> {
        let mut set = self.sorted_sets.entry(key.to_string()).or_default();
        if set.contains_key(member) {
            return Ok(false);
        }
        set.insert(member.to_string(), score);
        Ok(true)
    }

    async fn zrem(&self, key: &str, member: &str) -> Result<bool> {
        let removed = match self.sorted_sets.get_mut(key) {
            Some(mut set) => set.remove(member).is_some(),
            None => false,
        };
        self.sorted_sets.remove_if(key, |_, set| set.is_empty());
        Ok(removed)
    }

    async fn zrank(&self, key: &str, member: &str) -> Result<Option<u64>> {
        let Some(set) = self.sorted_sets.get(key) else {
            return Ok(None);
        };
        if !set.contains_key(member) {
            return Ok(None);
        }
        let rank = sorted_members(&set).iter().position(|(m, _)| m == member);
        Ok(rank.map(|r| r as u64))
    }

    async fn zrange_with_scores(&self, key: &str, start: isize, stop: isize) -> Result<Vec<(String, f64)>> {
        let Some(set) = self.sorted_sets.get(key) else {
            return Ok(Vec::new());
        };
        let members = sorted_members(&set);
        Ok(match resolve_range(members.len(), start, stop) {
            Some((from, to)) => members[from..=to].to_vec(),
            None => Vec::new(),
        })
    }

    async fn zcard(&self, key: &str) -> Result<u64> {
        Ok(self.sorted_sets.get(key).map_or(0, |set| set.len() as u64))
    }
}
