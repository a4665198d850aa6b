use async_trait::async_trait;

use crate::domain::{Client, Session, TypedId};

use super::error::StoreError;

/// The capability set every `ClientStore` backend must implement (design
/// note §9: "Pluggable ClientStore backends").
#[async_trait]
pub trait ClientBackend: Send + Sync {
    async fn create_client(&self, client: Client) -> Result<Client, StoreError>;
    async fn find_client(&self, instance_id: &TypedId, id: &TypedId) -> Result<Option<Client>, StoreError>;
    async fn update_client(&self, client: Client) -> Result<Client, StoreError>;
    async fn delete_client(&self, instance_id: &TypedId, id: &TypedId) -> Result<(), StoreError>;

    async fn create_session(&self, session: Session) -> Result<Session, StoreError>;
    async fn find_session(&self, instance_id: &TypedId, id: &TypedId) -> Result<Option<Session>, StoreError>;
    async fn update_session(&self, session: Session) -> Result<Session, StoreError>;
    async fn delete_session(&self, instance_id: &TypedId, id: &TypedId) -> Result<(), StoreError>;

    async fn list_client_sessions(
        &self,
        instance_id: &TypedId,
        client_id: &TypedId,
        active_only: bool,
    ) -> Result<Vec<Session>, StoreError>;

    async fn list_user_sessions(
        &self,
        instance_id: &TypedId,
        user_id: &TypedId,
        active_only: bool,
    ) -> Result<Vec<Session>, StoreError>;
}
