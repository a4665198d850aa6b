use crate::domain::TypedId;
use crate::error::CoreError;
use crate::store::{ClientStore, FlowStore};

/// Cascades entity deletion per spec §4.9. Neither `ClientStore` nor
/// `FlowStore` cascade automatically (each table is deleted independently),
/// so callers must route Session/Client deletion through here.
pub struct CascadeDeleter<'a> {
    pub store: &'a ClientStore,
    pub flow_store: &'a dyn FlowStore,
}

impl<'a> CascadeDeleter<'a> {
    /// Deleting a Session cascades: SignIns whose `created_session_id`
    /// matches, and SessionActivities for the session. SessionActivities
    /// are out of this CORE's persisted scope (delegated to an analytics
    /// sink), so only the SignIn cascade applies here.
    pub async fn delete_session(&self, instance_id: &TypedId, session_id: &TypedId) -> Result<(), CoreError> {
        self.flow_store.delete_sign_ins_by_created_session(instance_id, session_id).await?;
        self.store.delete_session(instance_id, session_id).await?;
        Ok(())
    }

    /// Deleting a Client cascades: its SignIns, SignUps, and SyncNonces are
    /// deleted outright; Verifications pointing at it have `verified_at_client`
    /// cleared rather than being deleted, since a Verification can outlive
    /// the Client it was created on. Integrations are out of this CORE's
    /// persisted scope.
    pub async fn delete_client(&self, instance_id: &TypedId, client_id: &TypedId) -> Result<(), CoreError> {
        self.flow_store.delete_sign_ins_for_client(instance_id, client_id).await?;
        self.flow_store.delete_sign_ups_for_client(instance_id, client_id).await?;
        self.flow_store.delete_sync_nonces_for_client(instance_id, client_id).await?;
        self.flow_store.clear_verified_at_client(instance_id, client_id).await?;
        self.store.delete_client(instance_id, client_id).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;
    use tokio::sync::Mutex;

    use async_trait::async_trait;

    use crate::domain::{Client, Session, TypedId};
    use crate::store::backend::ClientBackend;
    use crate::store::cache::MokaMaintenanceCache;
    use crate::store::error::StoreError;
    use crate::store::{ClientStore, FlowStore};

    use super::*;

    /// Records which cascade calls fired, in order, so tests can assert on
    /// the exact fan-out without standing up a real backend.
    #[derive(Default)]
    struct CallLog(Mutex<Vec<&'static str>>);

    impl CallLog {
        async fn record(&self, call: &'static str) {
            self.0.lock().await.push(call);
        }
        async fn calls(&self) -> Vec<&'static str> {
            self.0.lock().await.clone()
        }
    }

    struct NullBackend(Arc<CallLog>);

    #[async_trait]
    impl ClientBackend for NullBackend {
        async fn create_client(&self, client: Client) -> Result<Client, StoreError> {
            self.0.record("create_client").await;
            Ok(client)
        }
        async fn find_client(&self, _instance_id: &TypedId, _id: &TypedId) -> Result<Option<Client>, StoreError> {
            self.0.record("find_client").await;
            Ok(None)
        }
        async fn update_client(&self, client: Client) -> Result<Client, StoreError> {
            self.0.record("update_client").await;
            Ok(client)
        }
        async fn delete_client(&self, _instance_id: &TypedId, _id: &TypedId) -> Result<(), StoreError> {
            self.0.record("delete_client").await;
            Ok(())
        }
        async fn create_session(&self, session: Session) -> Result<Session, StoreError> {
            self.0.record("create_session").await;
            Ok(session)
        }
        async fn find_session(&self, _instance_id: &TypedId, _id: &TypedId) -> Result<Option<Session>, StoreError> {
            self.0.record("find_session").await;
            Ok(None)
        }
        async fn update_session(&self, session: Session) -> Result<Session, StoreError> {
            self.0.record("update_session").await;
            Ok(session)
        }
        async fn delete_session(&self, _instance_id: &TypedId, _id: &TypedId) -> Result<(), StoreError> {
            self.0.record("delete_session").await;
            Ok(())
        }
        async fn list_client_sessions(&self, _instance_id: &TypedId, _client_id: &TypedId, _active_only: bool) -> Result<Vec<Session>, StoreError> {
            Ok(Vec::new())
        }
        async fn list_user_sessions(&self, _instance_id: &TypedId, _user_id: &TypedId, _active_only: bool) -> Result<Vec<Session>, StoreError> {
            Ok(Vec::new())
        }
    }

    /// Only the cascade-relevant `FlowStore` methods are exercised here; the
    /// rest panic on call so a test would fail loudly if cascade logic
    /// started reaching for entities it shouldn't.
    struct CascadeFlowStore(Arc<CallLog>);

    #[async_trait]
    impl FlowStore for CascadeFlowStore {
        async fn create_user(&self, _user: crate::domain::User) -> Result<crate::domain::User, StoreError> {
            unimplemented!()
        }
        async fn find_user(&self, _instance_id: &TypedId, _id: &TypedId) -> Result<Option<crate::domain::User>, StoreError> {
            unimplemented!()
        }
        async fn update_user(&self, _user: crate::domain::User) -> Result<crate::domain::User, StoreError> {
            unimplemented!()
        }
        async fn create_identification(&self, _identification: crate::domain::Identification) -> Result<crate::domain::Identification, StoreError> {
            unimplemented!()
        }
        async fn find_identification(&self, _instance_id: &TypedId, _id: &TypedId) -> Result<Option<crate::domain::Identification>, StoreError> {
            unimplemented!()
        }
        async fn find_identification_by_value(
            &self,
            _instance_id: &TypedId,
            _kind: crate::domain::identification::IdentificationType,
            _identifier: &str,
        ) -> Result<Option<crate::domain::Identification>, StoreError> {
            unimplemented!()
        }
        async fn update_identification(&self, _identification: crate::domain::Identification) -> Result<crate::domain::Identification, StoreError> {
            unimplemented!()
        }
        async fn create_verification(&self, _verification: crate::domain::Verification) -> Result<crate::domain::Verification, StoreError> {
            unimplemented!()
        }
        async fn find_verification(&self, _instance_id: &TypedId, _id: &TypedId) -> Result<Option<crate::domain::Verification>, StoreError> {
            unimplemented!()
        }
        async fn update_verification(&self, _verification: crate::domain::Verification) -> Result<crate::domain::Verification, StoreError> {
            unimplemented!()
        }
        async fn clear_verified_at_client(&self, _instance_id: &TypedId, _client_id: &TypedId) -> Result<(), StoreError> {
            self.0.record("clear_verified_at_client").await;
            Ok(())
        }
        async fn create_sign_in(&self, _sign_in: crate::domain::SignIn) -> Result<crate::domain::SignIn, StoreError> {
            unimplemented!()
        }
        async fn find_sign_in(&self, _instance_id: &TypedId, _id: &TypedId) -> Result<Option<crate::domain::SignIn>, StoreError> {
            unimplemented!()
        }
        async fn update_sign_in(&self, _sign_in: crate::domain::SignIn) -> Result<crate::domain::SignIn, StoreError> {
            unimplemented!()
        }
        async fn delete_sign_ins_for_client(&self, _instance_id: &TypedId, _client_id: &TypedId) -> Result<(), StoreError> {
            self.0.record("delete_sign_ins_for_client").await;
            Ok(())
        }
        async fn delete_sign_ins_by_created_session(&self, _instance_id: &TypedId, _session_id: &TypedId) -> Result<(), StoreError> {
            self.0.record("delete_sign_ins_by_created_session").await;
            Ok(())
        }
        async fn create_sign_up(&self, _sign_up: crate::domain::SignUp) -> Result<crate::domain::SignUp, StoreError> {
            unimplemented!()
        }
        async fn find_sign_up(&self, _instance_id: &TypedId, _id: &TypedId) -> Result<Option<crate::domain::SignUp>, StoreError> {
            unimplemented!()
        }
        async fn update_sign_up(&self, _sign_up: crate::domain::SignUp) -> Result<crate::domain::SignUp, StoreError> {
            unimplemented!()
        }
        async fn delete_sign_ups_for_client(&self, _instance_id: &TypedId, _client_id: &TypedId) -> Result<(), StoreError> {
            self.0.record("delete_sign_ups_for_client").await;
            Ok(())
        }
        async fn create_sync_nonce(&self, _nonce: crate::domain::SyncNonce) -> Result<crate::domain::SyncNonce, StoreError> {
            unimplemented!()
        }
        async fn find_sync_nonce(&self, _instance_id: &TypedId, _nonce: &str) -> Result<Option<crate::domain::SyncNonce>, StoreError> {
            unimplemented!()
        }
        async fn update_sync_nonce(&self, _nonce: crate::domain::SyncNonce) -> Result<crate::domain::SyncNonce, StoreError> {
            unimplemented!()
        }
        async fn delete_sync_nonces_for_client(&self, _instance_id: &TypedId, _client_id: &TypedId) -> Result<(), StoreError> {
            self.0.record("delete_sync_nonces_for_client").await;
            Ok(())
        }
        async fn find_jwt_template(&self, _instance_id: &TypedId, _name: &str) -> Result<Option<crate::domain::JwtTemplate>, StoreError> {
            unimplemented!()
        }
        async fn billing_plan_keys(&self, _instance_id: &TypedId, _user_id: &TypedId, _org_id: Option<&TypedId>) -> Result<Vec<String>, StoreError> {
            unimplemented!()
        }
    }

    #[tokio::test]
    async fn delete_session_cascades_sign_ins_before_deleting_the_session() {
        let log = Arc::new(CallLog::default());
        let backend: Arc<dyn ClientBackend> = Arc::new(NullBackend(log.clone()));
        let cache = Arc::new(MokaMaintenanceCache::new(100));
        let store = ClientStore::new(backend.clone(), backend, cache);
        let flow_store = CascadeFlowStore(log.clone());

        let deleter = CascadeDeleter { store: &store, flow_store: &flow_store };
        deleter
            .delete_session(&TypedId::new("ins_1"), &TypedId::new("sess_1"))
            .await
            .unwrap();

        assert_eq!(log.calls().await, vec!["delete_sign_ins_by_created_session", "delete_session"]);
    }

    #[tokio::test]
    async fn delete_client_cascades_sign_ins_sign_ups_sync_nonces_and_verifications() {
        let log = Arc::new(CallLog::default());
        let backend: Arc<dyn ClientBackend> = Arc::new(NullBackend(log.clone()));
        let cache = Arc::new(MokaMaintenanceCache::new(100));
        let store = ClientStore::new(backend.clone(), backend, cache);
        let flow_store = CascadeFlowStore(log.clone());

        let deleter = CascadeDeleter { store: &store, flow_store: &flow_store };
        deleter
            .delete_client(&TypedId::new("ins_1"), &TypedId::new("client_1"))
            .await
            .unwrap();

        assert_eq!(
            log.calls().await,
            vec![
                "delete_sign_ins_for_client",
                "delete_sign_ups_for_client",
                "delete_sync_nonces_for_client",
                "clear_verified_at_client",
                "delete_client",
            ]
        );
    }
}
