//! Redis-backed coordination store shared by every worker process

use super::{CoordinationStore, StoreResult};
use async_trait::async_trait;
use redis::aio::ConnectionManager;
use redis::{AsyncCommands, Direction, Script};
use std::fmt;
use std::time::Duration;
use tracing::info;

/// Deletes KEYS[1] only while it still holds ARGV[1]
const COMPARE_AND_DELETE: &str = r#"
if redis.call("GET", KEYS[1]) == ARGV[1] then
    return redis.call("DEL", KEYS[1])
else
    return 0
end
"#;

/// Moves ARGV[1] from list KEYS[1] to sorted set KEYS[2] with score ARGV[2]
const LREM_ZADD: &str = r#"
if redis.call("LREM", KEYS[1], 0, ARGV[1]) > 0 then
    redis.call("ZADD", KEYS[2], ARGV[2], ARGV[1])
    return 1
else
    return 0
end
"#;

/// Coordination store backed by a Redis server.
///
/// `ConnectionManager` reconnects transparently and is cheap to clone, so
/// each call works on its own clone of the multiplexed connection.
#[derive(Clone)]
pub struct RedisStore {
    conn: ConnectionManager,
    compare_and_delete: Script,
    lrem_zadd: Script,
}

impl fmt::Debug for RedisStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RedisStore").finish_non_exhaustive()
    }
}

impl RedisStore {
    /// Connect to `url` (e.g. `redis://127.0.0.1:6379`)
    pub async fn connect(url: &str) -> StoreResult<Self> {
        let client = redis::Client::open(url)?;
        let conn = ConnectionManager::new(client).await?;
        info!("Connected to coordination store");
        Ok(Self {
            conn,
            compare_and_delete: Script::new(COMPARE_AND_DELETE),
            lrem_zadd: Script::new(LREM_ZADD),
        })
    }

    fn conn(&self) -> ConnectionManager {
        self.conn.clone()
    }
}

fn millis(ttl: Duration) -> u64 {
    ttl.as_millis().max(1) as u64
}

#[async_trait]
impl CoordinationStore for RedisStore {
    async fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let value: Option<String> = self.conn().get(key).await?;
        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> StoreResult<()> {
        let _: () = self.conn().set(key, value).await?;
        Ok(())
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        let _: () = self.conn().pset_ex(key, value, millis(ttl)).await?;
        Ok(())
    }

    async fn set_if_absent(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<bool> {
        let reply: Option<String> = redis::cmd("SET")
            .arg(key)
            .arg(value)
            .arg("NX")
            .arg("PX")
            .arg(millis(ttl))
            .query_async(&mut self.conn())
            .await?;
        Ok(reply.is_some())
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let removed: i64 = self.conn().del(key).await?;
        Ok(removed > 0)
    }

    async fn delete_if_equals(&self, key: &str, expected: &str) -> StoreResult<bool> {
        let removed: i64 = self
            .compare_and_delete
            .key(key)
            .arg(expected)
            .invoke_async(&mut self.conn())
            .await?;
        Ok(removed > 0)
    }

    async fn exists(&self, key: &str) -> StoreResult<bool> {
        let exists: bool = self.conn().exists(key).await?;
        Ok(exists)
    }

    async fn incr(&self, key: &str) -> StoreResult<i64> {
        let value: i64 = self.conn().incr(key, 1).await?;
        Ok(value)
    }

    async fn zadd(&self, key: &str, members: &[(String, f64)]) -> StoreResult<()> {
        if members.is_empty() {
            return Ok(());
        }
        let items: Vec<(f64, &str)> = members.iter().map(|(m, s)| (*s, m.as_str())).collect();
        let _: i64 = self.conn().zadd_multiple(key, &items).await?;
        Ok(())
    }

    async fn zincrby(&self, key: &str, member: &str, delta: f64) -> StoreResult<f64> {
        let score: f64 = self.conn().zincr(key, member, delta).await?;
        Ok(score)
    }

    async fn zrange(&self, key: &str, start: isize, stop: isize) -> StoreResult<Vec<String>> {
        let members: Vec<String> = self.conn().zrange(key, start, stop).await?;
        Ok(members)
    }

    async fn zrange_with_scores(&self, key: &str) -> StoreResult<Vec<(String, f64)>> {
        let members: Vec<(String, f64)> = self.conn().zrange_withscores(key, 0, -1).await?;
        Ok(members)
    }

    async fn zrange_by_score(
        &self,
        key: &str,
        max: f64,
        limit: usize,
    ) -> StoreResult<Vec<String>> {
        let members: Vec<String> = self
            .conn()
            .zrangebyscore_limit(key, "-inf", max, 0, limit as isize)
            .await?;
        Ok(members)
    }

    async fn zrem(&self, key: &str, member: &str) -> StoreResult<bool> {
        let removed: i64 = self.conn().zrem(key, member).await?;
        Ok(removed > 0)
    }

    async fn lpush(&self, key: &str, value: &str) -> StoreResult<()> {
        let _: i64 = self.conn().lpush(key, value).await?;
        Ok(())
    }

    async fn lmove(&self, source: &str, destination: &str) -> StoreResult<Option<String>> {
        let value: Option<String> = self
            .conn()
            .lmove(source, destination, Direction::Right, Direction::Left)
            .await?;
        Ok(value)
    }

    async fn lrem(&self, key: &str, value: &str) -> StoreResult<usize> {
        let removed: i64 = self.conn().lrem(key, 0, value).await?;
        Ok(removed.max(0) as usize)
    }

    async fn lrem_zadd(&self, source: &str, destination: &str, member: &str, score: f64)
        -> StoreResult<bool> {
        let moved: i64 = self
            .lrem_zadd
            .key(source)
            .key(destination)
            .arg(member)
            .arg(score)
            .invoke_async(&mut self.conn())
            .await?;
        Ok(moved > 0)
    }

    async fn lrange(&self, key: &str) -> StoreResult<Vec<String>> {
        let values: Vec<String> = self.conn().lrange(key, 0, -1).await?;
        Ok(values)
    }

    async fn llen(&self, key: &str) -> StoreResult<usize> {
        let len: i64 = self.conn().llen(key).await?;
        Ok(len.max(0) as usize)
    }

    async fn zcard(&self, key: &str) -> StoreResult<usize> {
        let len: i64 = self.conn().zcard(key).await?;
        Ok(len.max(0) as usize)
    }
}
