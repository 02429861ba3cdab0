use super::Store;
use crate::errors::{self, StoreError};
use deadpool_redis::redis::cmd;
use deadpool_redis::{Config, Pool, PoolConfig, Runtime};
use tracing::info;

pub struct RedisStore {
    pool: Pool,
}

impl RedisStore {
    pub fn connect(url: &str, max_connections: usize) -> errors::Result<Self> {
        info!("Creating Redis pool with max_connections={}", max_connections);
        let mut cfg = Config::from_url(url);
        cfg.pool = Some(PoolConfig::new(max_connections));
        let pool = cfg.create_pool(Some(Runtime::Tokio1))?;
        Ok(Self { pool })
    }
}

#[async_trait::async_trait]
impl Store for RedisStore {
    async fn increment(&self, key: &str) -> Result<u64, StoreError> {
        let mut conn = self.pool.get().await?;
        let value: u64 = cmd("INCR").arg(key).query_async(&mut conn).await?;
        Ok(value)
    }

    async fn write_fields(
        &self,
        key: &str,
        fields: &[(String, String)],
    ) -> Result<(), StoreError> {
        // HSET without any field/value pair is a syntax error in Redis
        if fields.is_empty() {
            return Ok(());
        }

        let mut conn = self.pool.get().await?;
        let _: () = cmd("HSET").arg(key).arg(fields).query_async(&mut conn).await?;
        Ok(())
    }

    async fn add_to_set(&self, key: &str, member: &str) -> Result<(), StoreError> {
        let mut conn = self.pool.get().await?;
        let _: () = cmd("SADD").arg(key).arg(member).query_async(&mut conn).await?;
        Ok(())
    }
}
