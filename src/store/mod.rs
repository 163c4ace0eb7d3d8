//! Coordination Store Module
//!
//! Shared key-value state used by every worker process: nonce slots and
//! their locks, relayer usage scores, the fee cache and the queue lanes.
//! Every mutation that needs exclusivity goes through one of the atomic
//! primitives below (set-if-absent, increment, list move, sorted-set remove).

use async_trait::async_trait;
use std::time::Duration;

pub mod memory_store;
pub mod redis_store;
pub mod store_errors;

pub use memory_store::MemoryStore;
pub use redis_store::RedisStore;
pub use store_errors::{StoreError, StoreResult};

/// Primitive operations the relayer needs from its coordination store.
///
/// Semantics follow Redis: sorted-set ranges are ascending by score with
/// ties broken lexicographically, lists are pushed on the left and moved
/// from the right so they behave as FIFO queues.
#[async_trait]
pub trait CoordinationStore: Send + Sync + std::fmt::Debug {
    /// Read a string value
    async fn get(&self, key: &str) -> StoreResult<Option<String>>;

    /// Write a string value without expiry
    async fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Write a string value that expires after `ttl`
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()>;

    /// Atomically write `value` only if `key` is absent; returns whether it was written
    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool>;

    /// Delete a key of any type; returns whether it existed
    async fn delete(&self, key: &str) -> StoreResult<bool>;

    /// Atomically delete `key` only while it still holds `expected`
    async fn delete_if_equals(&self, key: &str, expected: &str) -> StoreResult<bool>;

    /// Whether `key` currently exists (expired keys do not)
    async fn exists(&self, key: &str) -> StoreResult<bool>;

    /// Atomic increment of an integer counter, returning the new value
    async fn incr(&self, key: &str) -> StoreResult<i64>;

    /// Add members with their scores, replacing existing scores
    async fn zadd(&self, key: &str, members: &[(String, f64)]) -> StoreResult<()>;

    /// Atomically add `delta` to a member's score, returning the new score
    async fn zincrby(&self, key: &str, member: &str, delta: f64) -> StoreResult<f64>;

    /// Members ranked `start..=stop` (negative indexes count from the end)
    async fn zrange(&self, key: &str, start: isize, stop: isize) -> StoreResult<Vec<String>>;

    /// Every member with its score, ascending
    async fn zrange_with_scores(&self, key: &str) -> StoreResult<Vec<(String, f64)>>;

    /// Up to `limit` members with a score `<= max`, ascending
    async fn zrange_by_score(&self, key: &str, max: f64, limit: usize)
        -> StoreResult<Vec<String>>;

    /// Remove a member; returns whether it was present
    async fn zrem(&self, key: &str, member: &str) -> StoreResult<bool>;

    /// Push onto the head of a list
    async fn lpush(&self, key: &str, value: &str) -> StoreResult<()>;

    /// Atomically pop the tail of `source` and push it onto the head of `destination`
    async fn lmove(&self, source: &str, destination: &str) -> StoreResult<Option<String>>;

    /// Remove every occurrence of `value`; returns how many were removed
    async fn lrem(&self, key: &str, value: &str) -> StoreResult<usize>;

    /// Atomically remove `member` from the list at `source` and, only if it
    /// was there, add it to the sorted set at `destination` with `score`
    async fn lrem_zadd(&self, source: &str, destination: &str, member: &str, score: f64)
        -> StoreResult<bool>;

    /// All elements of a list, head first
    async fn lrange(&self, key: &str) -> StoreResult<Vec<String>>;

    /// Number of elements in a list
    async fn llen(&self, key: &str) -> StoreResult<usize>;

    /// Number of members in a sorted set
    async fn zcard(&self, key: &str) -> StoreResult<usize>;
}
