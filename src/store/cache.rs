use async_trait::async_trait;
use std::time::Duration;

use crate::domain::{Client, Session};

use super::error::StoreError;

/// What the maintenance shunt caches for one `(instance_id, id)` key: either
/// side of the Client/Session union, since both route through the same
/// cache namespace (`maintenance:{instance_id}:{id}`, spec §4.9).
#[derive(Clone, Debug)]
pub enum MaintenanceRecord {
    Client(Client),
    Session(Session),
}

/// A pluggable TTL cache for maintenance-mode shadow writes, mirroring
/// MXWXZ-actix-cloud's `memorydb` interface/default/redis split: one trait,
/// an in-process default, and room for a networked backend.
#[async_trait]
pub trait MaintenanceCache: Send + Sync {
    async fn put(&self, key: String, record: MaintenanceRecord, ttl: Duration) -> Result<(), StoreError>;
    async fn get(&self, key: &str) -> Result<Option<MaintenanceRecord>, StoreError>;
    async fn evict(&self, key: &str) -> Result<(), StoreError>;
}

pub fn maintenance_key(instance_id: &str, id: &str) -> String {
    format!("maintenance:{instance_id}:{id}")
}

#[cfg(feature = "moka-cache")]
pub struct MokaMaintenanceCache {
    inner: moka::future::Cache<String, MaintenanceRecord>,
}

#[cfg(feature = "moka-cache")]
impl MokaMaintenanceCache {
    pub fn new(max_capacity: u64) -> Self {
        Self {
            inner: moka::future::Cache::builder()
                .max_capacity(max_capacity)
                .time_to_live(Duration::from_secs(60 * 60))
                .build(),
        }
    }
}

#[cfg(feature = "moka-cache")]
#[async_trait]
impl MaintenanceCache for MokaMaintenanceCache {
    async fn put(&self, key: String, record: MaintenanceRecord, _ttl: Duration) -> Result<(), StoreError> {
        self.inner.insert(key, record).await;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<MaintenanceRecord>, StoreError> {
        Ok(self.inner.get(key).await)
    }

    async fn evict(&self, key: &str) -> Result<(), StoreError> {
        self.inner.invalidate(key).await;
        Ok(())
    }
}

#[cfg(feature = "redis-cache")]
pub struct RedisMaintenanceCache {
    client: redis::Client,
}

#[cfg(feature = "redis-cache")]
impl RedisMaintenanceCache {
    pub fn new(client: redis::Client) -> Self {
        Self { client }
    }
}

#[cfg(feature = "redis-cache")]
#[async_trait]
impl MaintenanceCache for RedisMaintenanceCache {
    async fn put(&self, key: String, record: MaintenanceRecord, ttl: Duration) -> Result<(), StoreError> {
        use redis::AsyncCommands;
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StoreError::Unexpected(e.to_string()))?;
        let payload = serde_json::to_string(&serde_record(&record)).map_err(|e| StoreError::Unexpected(e.to_string()))?;
        let _: () = conn
            .set_ex(key, payload, ttl.as_secs())
            .await
            .map_err(|e| StoreError::Unexpected(e.to_string()))?;
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<MaintenanceRecord>, StoreError> {
        use redis::AsyncCommands;
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StoreError::Unexpected(e.to_string()))?;
        let payload: Option<String> = conn.get(key).await.map_err(|e| StoreError::Unexpected(e.to_string()))?;
        payload
            .map(|p| deserialize_record(&p))
            .transpose()
    }

    async fn evict(&self, key: &str) -> Result<(), StoreError> {
        use redis::AsyncCommands;
        let mut conn = self
            .client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| StoreError::Unexpected(e.to_string()))?;
        let _: () = conn.del(key).await.map_err(|e| StoreError::Unexpected(e.to_string()))?;
        Ok(())
    }
}

#[cfg(feature = "redis-cache")]
#[derive(serde::Serialize, serde::Deserialize)]
enum SerdeRecord {
    Client(Client),
    Session(Session),
}

#[cfg(feature = "redis-cache")]
fn serde_record(record: &MaintenanceRecord) -> SerdeRecord {
    match record {
        MaintenanceRecord::Client(c) => SerdeRecord::Client(c.clone()),
        MaintenanceRecord::Session(s) => SerdeRecord::Session(s.clone()),
    }
}

#[cfg(feature = "redis-cache")]
fn deserialize_record(payload: &str) -> Result<MaintenanceRecord, StoreError> {
    let record: SerdeRecord = serde_json::from_str(payload).map_err(|e| StoreError::Unexpected(e.to_string()))?;
    Ok(match record {
        SerdeRecord::Client(c) => MaintenanceRecord::Client(c),
        SerdeRecord::Session(s) => MaintenanceRecord::Session(s),
    })
}
