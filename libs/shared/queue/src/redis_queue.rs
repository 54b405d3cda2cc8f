use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use deadpool_redis::{Config, Connection, Pool, PoolConfig, Runtime};
use redis::AsyncCommands;
use tracing::{debug, info};

use shared_config::AppConfig;

use crate::broker::{delayed_key, QueueBroker};
use crate::QueueError;

const PROMOTE_BATCH: usize = 100;

// Moves due members of the delayed sorted set onto the list in one step so
// two promoters never deliver the same payload twice.
const PROMOTE_SCRIPT: &str = r"
local due = redis.call('ZRANGEBYSCORE', KEYS[1], '-inf', ARGV[1], 'LIMIT', 0, ARGV[2])
for _, member in ipairs(due) do
    redis.call('ZREM', KEYS[1], member)
    redis.call('LPUSH', KEYS[2], member)
end
return #due
";

pub struct RedisQueueService {
    pool: Pool,
    promote_script: redis::Script,
}

impl RedisQueueService {
    /// Blocking pops hold a pooled connection for as long as they wait, so
    /// `pool_size` must exceed the number of concurrent consumers.
    pub async fn new(config: &AppConfig, pool_size: usize) -> Result<Self, QueueError> {
        let mut cfg = Config::from_url(config.redis_url.clone());
        cfg.pool = Some(PoolConfig::new(pool_size.max(2)));

        let pool = cfg.create_pool(Some(Runtime::Tokio1))
            .map_err(|e| QueueError::PoolError(format!("Pool creation error: {}", e)))?;

        // Test connection
        let mut conn = pool.get().await
            .map_err(|e| QueueError::PoolError(format!("Connection error: {}", e)))?;

        let _: String = redis::cmd("PING").query_async(&mut conn).await?;
        info!("Redis queue service initialized (pool size {})", pool_size);

        Ok(Self {
            pool,
            promote_script: redis::Script::new(PROMOTE_SCRIPT),
        })
    }

    async fn get_connection(&self) -> Result<Connection, QueueError> {
        if self.pool.is_closed() {
            return Err(QueueError::Closed);
        }

        self.pool.get().await.map_err(|e| QueueError::PoolError(e.to_string()))
    }
}

#[async_trait]
impl QueueBroker for RedisQueueService {
    async fn push(&self, queue: &str, payload: String) -> Result<(), QueueError> {
        let mut conn = self.get_connection().await?;
        let _: () = conn.lpush(queue, payload).await?;
        Ok(())
    }

    async fn pop(&self, queue: &str) -> Result<String, QueueError> {
        let mut conn = self.get_connection().await?;

        // BRPOP with a zero timeout waits indefinitely.
        let (_, payload): (String, String) = redis::cmd("BRPOP")
            .arg(queue)
            .arg(0)
            .query_async(&mut conn)
            .await?;

        Ok(payload)
    }

    async fn drain(&self, queue: &str, max: usize) -> Result<Vec<String>, QueueError> {
        let mut conn = self.get_connection().await?;
        let mut drained = Vec::new();

        while drained.len() < max {
            let payload: Option<String> = redis::cmd("RPOP")
                .arg(queue)
                .query_async(&mut conn)
                .await?;

            match payload {
                Some(payload) => drained.push(payload),
                None => break,
            }
        }

        Ok(drained)
    }

    async fn push_delayed(&self, queue: &str, payload: String, delay: Duration) -> Result<(), QueueError> {
        let mut conn = self.get_connection().await?;
        let due_at = Utc::now().timestamp_millis() + delay.as_millis() as i64;

        let _: () = redis::cmd("ZADD")
            .arg(delayed_key(queue))
            .arg(due_at)
            .arg(payload)
            .query_async(&mut conn)
            .await?;

        debug!("Parked payload on {} for {}ms", queue, delay.as_millis());
        Ok(())
    }

    async fn promote_delayed(&self, queue: &str) -> Result<usize, QueueError> {
        let mut conn = self.get_connection().await?;

        let moved: usize = self.promote_script
            .key(delayed_key(queue))
            .key(queue)
            .arg(Utc::now().timestamp_millis())
            .arg(PROMOTE_BATCH)
            .invoke_async(&mut conn)
            .await?;

        Ok(moved)
    }

    async fn len(&self, queue: &str) -> Result<u64, QueueError> {
        let mut conn = self.get_connection().await?;
        let len: u64 = conn.llen(queue).await?;
        Ok(len)
    }

    async fn close(&self) {
        self.pool.close();
        info!("Redis queue connection closed");
    }
}
