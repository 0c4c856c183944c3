use async_trait::async_trait;
use redis::AsyncCommands;
use tracing::info;

use halador_core::repository::{ListingCache, RateLimiter};
use halador_core::trip::Trip;
use halador_core::{CoreError, CoreResult};

/// Open-trips listings live under a generation-stamped key; invalidation
/// bumps the generation and the old entries age out on their own TTL.
const LISTING_GEN_KEY: &str = "halador:trips:gen";

#[derive(Clone)]
pub struct RedisClient {
    client: redis::Client,
}

impl RedisClient {
    pub async fn new(connection_string: &str) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(connection_string)?;
        Ok(Self { client })
    }

    async fn conn(&self) -> CoreResult<redis::aio::MultiplexedConnection> {
        self.client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| CoreError::InternalError(e.to_string()))
    }
}

fn redis_err(e: redis::RedisError) -> CoreError {
    CoreError::InternalError(e.to_string())
}

#[async_trait]
impl ListingCache for RedisClient {
    async fn get(&self, key: &str) -> CoreResult<Option<Vec<Trip>>> {
        let mut conn = self.conn().await?;
        let generation: Option<i64> = conn.get(LISTING_GEN_KEY).await.map_err(redis_err)?;
        let full_key = format!("halador:trips:{}:{}", generation.unwrap_or(0), key);

        let payload: Option<String> = conn.get(full_key).await.map_err(redis_err)?;
        match payload {
            // A payload that no longer parses is treated as a miss.
            Some(json) => Ok(serde_json::from_str(&json).ok()),
            None => Ok(None),
        }
    }

    async fn put(&self, key: &str, trips: &[Trip], ttl_seconds: u64) -> CoreResult<()> {
        let mut conn = self.conn().await?;
        let generation: Option<i64> = conn.get(LISTING_GEN_KEY).await.map_err(redis_err)?;
        let full_key = format!("halador:trips:{}:{}", generation.unwrap_or(0), key);

        let payload =
            serde_json::to_string(trips).map_err(|e| CoreError::InternalError(e.to_string()))?;
        conn.set_ex::<_, _, ()>(full_key, payload, ttl_seconds)
            .await
            .map_err(redis_err)?;
        Ok(())
    }

    async fn invalidate(&self) -> CoreResult<()> {
        let mut conn = self.conn().await?;
        let generation: i64 = conn.incr(LISTING_GEN_KEY, 1).await.map_err(redis_err)?;
        info!("trip listing cache invalidated (generation {})", generation);
        Ok(())
    }
}

#[async_trait]
impl RateLimiter for RedisClient {
    async fn check(&self, key: &str, limit: i64, window_seconds: i64) -> CoreResult<bool> {
        let mut conn = self.conn().await?;

        let (count,): (i64,) = redis::pipe()
            .atomic()
            .incr(key, 1)
            .expire(key, window_seconds)
            .ignore()
            .query_async(&mut conn)
            .await
            .map_err(redis_err)?;

        Ok(count <= limit)
    }
}
