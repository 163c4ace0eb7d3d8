//! In-process coordination store
//!
//! Used for single-process deployments and tests. Every operation takes one
//! mutex over the whole keyspace, which makes multi-key primitives such as
//! `lmove` atomic the same way a single Redis command is. Expiry is measured
//! with `tokio::time::Instant` so paused-clock tests can step over TTLs.

use super::{CoordinationStore, StoreError, StoreResult};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::time::Duration;
use tokio::time::Instant;

#[derive(Debug, Clone)]
enum Value {
    Str(String),
    List(VecDeque<String>),
    ZSet(HashMap<String, f64>),
}

#[derive(Debug, Clone)]
struct Entry {
    value: Value,
    expires_at: Option<Instant>,
}

impl Entry {
    fn persistent(value: Value) -> Self {
        Self { value, expires_at: None }
    }

    fn is_expired(&self, now: Instant) -> bool {
        self.expires_at.map_or(false, |at| now >= at)
    }
}

/// Coordination store kept in process memory
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of live keys (expired keys are not counted)
    pub fn len(&self) -> usize {
        let now = Instant::now();
        self.entries
            .lock()
            .values()
            .filter(|entry| !entry.is_expired(now))
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Run `f` against the keyspace after dropping the expired entry at `key`
    fn with_live<T>(&self, key: &str, f: impl FnOnce(&mut HashMap<String, Entry>) -> T) -> T {
        let mut entries = self.entries.lock();
        if entries.get(key).map_or(false, |e| e.is_expired(Instant::now())) {
            entries.remove(key);
        }
        f(&mut entries)
    }
}

fn wrong_type(key: &str, expected: &'static str) -> StoreError {
    StoreError::WrongType {
        key: key.to_string(),
        expected,
    }
}

fn sorted_members(set: &HashMap<String, f64>) -> Vec<(String, f64)> {
    let mut members: Vec<(String, f64)> = set.iter().map(|(m, s)| (m.clone(), *s)).collect();
    members.sort_by(|a, b| a.1.total_cmp(&b.1).then_with(|| a.0.cmp(&b.0)));
    members
}

fn zset_mut<'a>(
    entries: &'a mut HashMap<String, Entry>,
    key: &str,
) -> StoreResult<&'a mut HashMap<String, f64>> {
    let entry = entries
        .entry(key.to_string())
        .or_insert_with(|| Entry::persistent(Value::ZSet(HashMap::new())));
    match &mut entry.value {
        Value::ZSet(set) => Ok(set),
        _ => Err(wrong_type(key, "zset")),
    }
}

fn list_mut<'a>(
    entries: &'a mut HashMap<String, Entry>,
    key: &str,
) -> StoreResult<&'a mut VecDeque<String>> {
    let entry = entries
        .entry(key.to_string())
        .or_insert_with(|| Entry::persistent(Value::List(VecDeque::new())));
    match &mut entry.value {
        Value::List(list) => Ok(list),
        _ => Err(wrong_type(key, "list")),
    }
}

/// Resolve Redis-style inclusive, possibly negative, range bounds
fn resolve_range(len: usize, start: isize, stop: isize) -> Option<(usize, usize)> {
    let len = len as isize;
    let start = if start < 0 { (len + start).max(0) } else { start };
    let stop = if stop < 0 { len + stop } else { stop.min(len - 1) };
    if len == 0 || start > stop || start >= len {
        return None;
    }
    Some((start as usize, stop as usize))
}

#[async_trait]
impl CoordinationStore for MemoryStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        self.with_live(key, |entries| match entries.get(key) {
            None => Ok(None),
            Some(Entry {
                value: Value::Str(s),
                ..
            }) => Ok(Some(s.clone())),
            Some(_) => Err(wrong_type(key, "string")),
        })
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        self.entries
            .lock()
            .insert(key.to_string(), Entry::persistent(Value::Str(value.to_string())));
        Ok(())
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        self.entries.lock().insert(
            key.to_string(),
            Entry {
                value: Value::Str(value.to_string()),
                expires_at: Some(Instant::now() + ttl),
            },
        );
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool> {
        self.with_live(key, |entries| {
            if entries.contains_key(key) {
                return Ok(false);
            }
            entries.insert(
                key.to_string(),
                Entry {
                    value: Value::Str(value.to_string()),
                    expires_at: Some(Instant::now() + ttl),
                },
            );
            Ok(true)
        })
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        self.with_live(key, |entries| Ok(entries.remove(key).is_some()))
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> StoreResult<bool> {
        self.with_live(key, |entries| {
            let matches = matches!(
                entries.get(key),
                Some(Entry { value: Value::Str(s), .. }) if s == expected
            );
            if matches {
                entries.remove(key);
            }
            Ok(matches)
        })
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        self.with_live(key, |entries| Ok(entries.contains_key(key)))
    }

    async fn incr(&self, key: &str) -> StoreResult<i64> {
        self.with_live(key, |entries| {
            let entry = entries
                .entry(key.to_string())
                .or_insert_with(|| Entry::persistent(Value::Str("0".to_string())));
            let Value::Str(raw) = &mut entry.value else {
                return Err(wrong_type(key, "string"));
            };
            let current: i64 = raw.parse().map_err(|_| StoreError::Corrupt {
                key: key.to_string(),
                message: format!("not an integer: {}", raw),
            })?;
            let next = current + 1;
            *raw = next.to_string();
            Ok(next)
        })
    }

    async fn zadd(&self, key: &str, members: &[(String, f64)]) -> StoreResult<()> {
        self.with_live(key, |entries| {
            let set = zset_mut(entries, key)?;
            for (member, score) in members {
                set.insert(member.clone(), *score);
            }
            Ok(())
        })
    }

    async fn zincrby(&self, key: &str, member: &str, delta: f64) -> StoreResult<f64> {
        self.with_live(key, |entries| {
            let set = zset_mut(entries, key)?;
            let score = set.entry(member.to_string()).or_insert(0.0);
            *score += delta;
            Ok(*score)
        })
    }

    async fn zrange(&self, key: &str, start: isize, stop: isize) -> StoreResult<Vec<String>> {
        self.with_live(key, |entries| match entries.get(key) {
            None => Ok(Vec::new()),
            Some(Entry {
                value: Value::ZSet(set),
                ..
            }) => {
                let members = sorted_members(set);
                Ok(match resolve_range(members.len(), start, stop) {
                    Some((from, to)) => members[from..=to].iter().map(|m| m.0.clone()).collect(),
                    None => Vec::new(),
                })
            }
            Some(_) => Err(wrong_type(key, "zset")),
        })
    }

    async fn zrange_with_scores(&self, key: &str) -> StoreResult<Vec<(String, f64)>> {
        self.with_live(key, |entries| match entries.get(key) {
            None => Ok(Vec::new()),
            Some(Entry {
                value: Value::ZSet(set),
                ..
            }) => Ok(sorted_members(set)),
            Some(_) => Err(wrong_type(key, "zset")),
        })
    }

    async fn zrange_by_score(
        &self,
        key: &str,
        max: f64,
        limit: usize,
    ) -> StoreResult<Vec<String>> {
        self.with_live(key, |entries| match entries.get(key) {
            None => Ok(Vec::new()),
            Some(Entry {
                value: Value::ZSet(set),
                ..
            }) => Ok(sorted_members(set)
                .into_iter()
                .take_while(|(_, score)| *score <= max)
                .take(limit)
                .map(|(member, _)| member)
                .collect()),
            Some(_) => Err(wrong_type(key, "zset")),
        })
    }

    async fn zrem(&self, key: &str, member: &str) -> StoreResult<bool> {
        self.with_live(key, |entries| match entries.get_mut(key) {
            None => Ok(false),
            Some(Entry {
                value: Value::ZSet(set),
                ..
            }) => Ok(set.remove(member).is_some()),
            Some(_) => Err(wrong_type(key, "zset")),
        })
    }

    async fn lpush(&self, key: &str, value: &str) -> StoreResult<()> {
        self.with_live(key, |entries| {
            list_mut(entries, key)?.push_front(value.to_string());
            Ok(())
        })
    }

    async fn lmove(&self, source: &str, destination: &str) -> StoreResult<Option<String>> {
        let mut entries = self.entries.lock();
        let popped = match entries.get_mut(source) {
            None => return Ok(None),
            Some(Entry {
                value: Value::List(list),
                ..
            }) => list.pop_back(),
            Some(_) => return Err(wrong_type(source, "list")),
        };
        let Some(value) = popped else {
            return Ok(None);
        };
        match list_mut(&mut entries, destination) {
            Ok(list) => {
                list.push_front(value.clone());
                Ok(Some(value))
            }
            Err(err) => {
                // Put it back so a type error never loses an element
                if let Ok(list) = list_mut(&mut entries, source) {
                    list.push_back(value);
                }
                Err(err)
            }
        }
    }

    async fn lrem(&self, key: &str, value: &str) -> StoreResult<usize> {
        self.with_live(key, |entries| match entries.get_mut(key) {
            None => Ok(0),
            Some(Entry {
                value: Value::List(list),
                ..
            }) => {
                let before = list.len();
                list.retain(|v| v != value);
                Ok(before - list.len())
            }
            Some(_) => Err(wrong_type(key, "list")),
        })
    }

    async fn lrem_zadd(&self, source: &str, destination: &str, member: &str, score: f64)
        -> StoreResult<bool> {
        let mut entries = self.entries.lock();
        if entries
            .get(destination)
            .map_or(false, |e| !matches!(e.value, Value::ZSet(_)))
        {
            return Err(wrong_type(destination, "zset"));
        }
        let removed = match entries.get_mut(source) {
            None => 0,
            Some(Entry {
                value: Value::List(list),
                ..
            }) => {
                let before = list.len();
                list.retain(|v| v != member);
                before - list.len()
            }
            Some(_) => return Err(wrong_type(source, "list")),
        };
        if removed == 0 {
            return Ok(false);
        }
        zset_mut(&mut entries, destination)?.insert(member.to_string(), score);
        Ok(true)
    }

    async fn lrange(&self, key: &str) -> StoreResult<Vec<String>> {
        self.with_live(key, |entries| match entries.get(key) {
            None => Ok(Vec::new()),
            Some(Entry {
                value: Value::List(list),
                ..
            }) => Ok(list.iter().cloned().collect()),
            Some(_) => Err(wrong_type(key, "list")),
        })
    }

    async fn llen(&self, key: &str) -> StoreResult<usize> {
        Ok(self.lrange(key).await?.len())
    }

    async fn zcard(&self, key: &str) -> StoreResult<usize> {
        Ok(self.zrange_with_scores(key).await?.len())
    }
}
