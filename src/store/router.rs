use std::sync::Arc;
use std::time::Duration;

use crate::domain::{Client, Session, TypedId};

use super::backend::ClientBackend;
use super::cache::{maintenance_key, MaintenanceCache, MaintenanceRecord};
use super::error::StoreError;

const MAINTENANCE_TTL: Duration = Duration::from_secs(60 * 60);

/// Per-request flags the router needs to pick a backend and a read/write
/// path, threaded through from the request-scoped context (spec §5).
#[derive(Clone, Copy, Debug, Default)]
pub struct StoreContext {
    /// A planned DB outage is in progress: Client/Session writes go to the
    /// TTL cache, reads merge the cache over the persisted copy.
    pub maintenance_mode: bool,
    /// The outage just ended: the next read for a touched key flushes the
    /// cached copy back to the backend and evicts it.
    pub recovery_mode: bool,
    /// The owning Instance is flagged for edge operation: new Clients are
    /// created on the edge backend rather than relational.
    pub instance_edge_enabled: bool,
}

/// `ClientStore`: routes CRUD for Client/Session across a relational and an
/// edge backend based on id shape, and transparently shunts writes through a
/// TTL cache during maintenance mode (spec §4.2, design note §9).
pub struct ClientStore {
    relational: Arc<dyn ClientBackend>,
    edge: Arc<dyn ClientBackend>,
    cache: Arc<dyn MaintenanceCache>,
}

impl ClientStore {
    pub fn new(relational: Arc<dyn ClientBackend>, edge: Arc<dyn ClientBackend>, cache: Arc<dyn MaintenanceCache>) -> Self {
        Self { relational, edge, cache }
    }

    fn backend_for_id(&self, id: &TypedId) -> &Arc<dyn ClientBackend> {
        if id.is_edge_shaped() {
            &self.edge
        } else {
            &self.relational
        }
    }

    pub async fn create_client(&self, ctx: &StoreContext, client: Client) -> Result<Client, StoreError> {
        if ctx.maintenance_mode {
            return Err(StoreError::CreateDuringMaintenance);
        }
        if ctx.instance_edge_enabled {
            self.edge.create_client(client).await
        } else {
            self.relational.create_client(client).await
        }
    }

    pub async fn find_client(
        &self,
        ctx: &StoreContext,
        instance_id: &TypedId,
        id: &TypedId,
    ) -> Result<Option<Client>, StoreError> {
        let key = maintenance_key(instance_id.as_str(), id.as_str());

        if ctx.recovery_mode {
            self.flush_cached_client(&key).await?;
        }

        let persisted = self.backend_for_id(id).find_client(instance_id, id).await?;

        if ctx.maintenance_mode {
            if let Some(MaintenanceRecord::Client(cached)) = self.cache.get(&key).await? {
                return Ok(Some(cached));
            }
        }

        Ok(persisted)
    }

    pub async fn update_client(&self, ctx: &StoreContext, client: Client) -> Result<Client, StoreError> {
        if ctx.maintenance_mode {
            let key = maintenance_key(client.instance_id.as_str(), client.id.as_str());
            self.cache
                .put(key, MaintenanceRecord::Client(client.clone()), MAINTENANCE_TTL)
                .await?;
            return Ok(client);
        }
        self.backend_for_id(&client.id).update_client(client).await
    }

    pub async fn delete_client(&self, instance_id: &TypedId, id: &TypedId) -> Result<(), StoreError> {
        self.backend_for_id(id).delete_client(instance_id, id).await
    }

    pub async fn create_session(&self, ctx: &StoreContext, session: Session) -> Result<Session, StoreError> {
        if ctx.maintenance_mode {
            return Err(StoreError::CreateDuringMaintenance);
        }
        self.backend_for_id(&session.client_id).create_session(session).await
    }

    pub async fn find_session(
        &self,
        ctx: &StoreContext,
        instance_id: &TypedId,
        id: &TypedId,
    ) -> Result<Option<Session>, StoreError> {
        let key = maintenance_key(instance_id.as_str(), id.as_str());

        if ctx.recovery_mode {
            self.flush_cached_session(&key).await?;
        }

        let persisted = self.backend_for_id(id).find_session(instance_id, id).await?;

        if ctx.maintenance_mode {
            if let Some(MaintenanceRecord::Session(cached)) = self.cache.get(&key).await? {
                return Ok(Some(cached));
            }
        }

        Ok(persisted)
    }

    pub async fn update_session(&self, ctx: &StoreContext, session: Session) -> Result<Session, StoreError> {
        if ctx.maintenance_mode {
            let key = maintenance_key(session.instance_id.as_str(), session.id.as_str());
            self.cache
                .put(key, MaintenanceRecord::Session(session.clone()), MAINTENANCE_TTL)
                .await?;
            return Ok(session);
        }
        self.backend_for_id(&session.client_id).update_session(session).await
    }

    pub async fn delete_session(&self, instance_id: &TypedId, id: &TypedId) -> Result<(), StoreError> {
        self.backend_for_id(id).delete_session(instance_id, id).await
    }

    /// Cross-backend fan-out: partitions `client_ids` by shape and queries
    /// each backend with its own subset (spec §4.2 "cross-backend list
    /// queries... partition the set and fan out").
    pub async fn list_sessions_for_clients(
        &self,
        instance_id: &TypedId,
        client_ids: &[TypedId],
        active_only: bool,
    ) -> Result<Vec<Session>, StoreError> {
        let (edge_ids, relational_ids): (Vec<_>, Vec<_>) = client_ids.iter().partition(|id| id.is_edge_shaped());

        let mut sessions = Vec::new();
        for id in relational_ids {
            sessions.extend(self.relational.list_client_sessions(instance_id, id, active_only).await?);
        }
        for id in edge_ids {
            sessions.extend(self.edge.list_client_sessions(instance_id, id, active_only).await?);
        }
        Ok(sessions)
    }

    pub async fn list_client_sessions(
        &self,
        instance_id: &TypedId,
        client_id: &TypedId,
        active_only: bool,
    ) -> Result<Vec<Session>, StoreError> {
        self.backend_for_id(client_id)
            .list_client_sessions(instance_id, client_id, active_only)
            .await
    }

    pub async fn list_user_sessions(
        &self,
        instance_id: &TypedId,
        user_id: &TypedId,
        active_only: bool,
    ) -> Result<Vec<Session>, StoreError> {
        self.backend_for_id(user_id)
            .list_user_sessions(instance_id, user_id, active_only)
            .await
    }

    /// Find the most recently touched active session on a Client, used to
    /// populate `client_uat` and the handshake `__session` cookie.
    pub async fn find_latest_touched_active_session(
        &self,
        instance_id: &TypedId,
        client_id: &TypedId,
    ) -> Result<Option<Session>, StoreError> {
        let sessions = self.list_client_sessions(instance_id, client_id, true).await?;
        Ok(sessions.into_iter().max_by_key(|s| s.touched_at))
    }

    async fn flush_cached_client(&self, key: &str) -> Result<(), StoreError> {
        if let Some(MaintenanceRecord::Client(cached)) = self.cache.get(key).await? {
            self.backend_for_id(&cached.id).update_client(cached).await?;
            self.cache.evict(key).await?;
        }
        Ok(())
    }

    async fn flush_cached_session(&self, key: &str) -> Result<(), StoreError> {
        if let Some(MaintenanceRecord::Session(cached)) = self.cache.get(key).await? {
            self.backend_for_id(&cached.client_id).update_session(cached).await?;
            self.cache.evict(key).await?;
        }
        Ok(())
    }
}
