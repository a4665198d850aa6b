//! In-memory `ClientBackend`/`FlowStore` for exercising the state machines
//! end to end without a real database, grounded on the crate's own
//! `Fake*`/`Null*` collaborator fakes (`src/sign_in/strategies.rs`).

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;

use clerk_core::domain::identification::IdentificationType;
use clerk_core::domain::{Client, Identification, JwtTemplate, Session, SignIn, SignUp, SyncNonce, TypedId, User, Verification};
use clerk_core::store::backend::ClientBackend;
use clerk_core::store::error::StoreError;
use clerk_core::store::FlowStore;

#[derive(Default)]
pub struct InMemoryBackend {
    clients: Mutex<HashMap<String, Client>>,
    sessions: Mutex<HashMap<String, Session>>,
}

#[async_trait]
impl ClientBackend for InMemoryBackend {
    async fn create_client(&self, client: Client) -> Result<Client, StoreError> {
        self.clients.lock().unwrap().insert(client.id.to_string(), client.clone());
        Ok(client)
    }
    async fn find_client(&self, _instance_id: &TypedId, id: &TypedId) -> Result<Option<Client>, StoreError> {
        Ok(self.clients.lock().unwrap().get(id.as_str()).cloned())
    }
    async fn update_client(&self, client: Client) -> Result<Client, StoreError> {
        self.clients.lock().unwrap().insert(client.id.to_string(), client.clone());
        Ok(client)
    }
    async fn delete_client(&self, _instance_id: &TypedId, id: &TypedId) -> Result<(), StoreError> {
        self.clients.lock().unwrap().remove(id.as_str());
        Ok(())
    }
    async fn create_session(&self, session: Session) -> Result<Session, StoreError> {
        self.sessions.lock().unwrap().insert(session.id.to_string(), session.clone());
        Ok(session)
    }
    async fn find_session(&self, _instance_id: &TypedId, id: &TypedId) -> Result<Option<Session>, StoreError> {
        Ok(self.sessions.lock().unwrap().get(id.as_str()).cloned())
    }
    async fn update_session(&self, session: Session) -> Result<Session, StoreError> {
        self.sessions.lock().unwrap().insert(session.id.to_string(), session.clone());
        Ok(session)
    }
    async fn delete_session(&self, _instance_id: &TypedId, id: &TypedId) -> Result<(), StoreError> {
        self.sessions.lock().unwrap().remove(id.as_str());
        Ok(())
    }
    async fn list_client_sessions(&self, _instance_id: &TypedId, client_id: &TypedId, active_only: bool) -> Result<Vec<Session>, StoreError> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .values()
            .filter(|s| &s.client_id == client_id)
            .filter(|s| !active_only || !s.status.is_terminal())
            .cloned()
            .collect())
    }
    async fn list_user_sessions(&self, _instance_id: &TypedId, user_id: &TypedId, active_only: bool) -> Result<Vec<Session>, StoreError> {
        Ok(self
            .sessions
            .lock()
            .unwrap()
            .values()
            .filter(|s| &s.user_id == user_id)
            .filter(|s| !active_only || !s.status.is_terminal())
            .cloned()
            .collect())
    }
}

#[derive(Default)]
pub struct InMemoryFlowStore {
    pub users: Mutex<HashMap<String, User>>,
    pub identifications: Mutex<HashMap<String, Identification>>,
    pub verifications: Mutex<HashMap<String, Verification>>,
    pub sign_ins: Mutex<HashMap<String, SignIn>>,
    pub sign_ups: Mutex<HashMap<String, SignUp>>,
    pub sync_nonces: Mutex<HashMap<String, SyncNonce>>,
    pub jwt_templates: Mutex<HashMap<String, JwtTemplate>>,
}

#[async_trait]
impl FlowStore for InMemoryFlowStore {
    async fn create_user(&self, user: User) -> Result<User, StoreError> {
        self.users.lock().unwrap().insert(user.id.to_string(), user.clone());
        Ok(user)
    }
    async fn find_user(&self, _instance_id: &TypedId, id: &TypedId) -> Result<Option<User>, StoreError> {
        Ok(self.users.lock().unwrap().get(id.as_str()).cloned())
    }
    async fn update_user(&self, user: User) -> Result<User, StoreError> {
        self.users.lock().unwrap().insert(user.id.to_string(), user.clone());
        Ok(user)
    }

    async fn create_identification(&self, identification: Identification) -> Result<Identification, StoreError> {
        self.identifications.lock().unwrap().insert(identification.id.to_string(), identification.clone());
        Ok(identification)
    }
    async fn find_identification(&self, _instance_id: &TypedId, id: &TypedId) -> Result<Option<Identification>, StoreError> {
        Ok(self.identifications.lock().unwrap().get(id.as_str()).cloned())
    }
    async fn find_identification_by_value(&self, _instance_id: &TypedId, kind: IdentificationType, identifier: &str) -> Result<Option<Identification>, StoreError> {
        Ok(self
            .identifications
            .lock()
            .unwrap()
            .values()
            .find(|i| i.kind == kind && i.identifier.as_deref() == Some(identifier))
            .cloned())
    }
    async fn update_identification(&self, identification: Identification) -> Result<Identification, StoreError> {
        self.identifications.lock().unwrap().insert(identification.id.to_string(), identification.clone());
        Ok(identification)
    }

    async fn create_verification(&self, verification: Verification) -> Result<Verification, StoreError> {
        self.verifications.lock().unwrap().insert(verification.id.to_string(), verification.clone());
        Ok(verification)
    }
    async fn find_verification(&self, _instance_id: &TypedId, id: &TypedId) -> Result<Option<Verification>, StoreError> {
        Ok(self.verifications.lock().unwrap().get(id.as_str()).cloned())
    }
    async fn update_verification(&self, verification: Verification) -> Result<Verification, StoreError> {
        self.verifications.lock().unwrap().insert(verification.id.to_string(), verification.clone());
        Ok(verification)
    }
    async fn clear_verified_at_client(&self, _instance_id: &TypedId, client_id: &TypedId) -> Result<(), StoreError> {
        for v in self.verifications.lock().unwrap().values_mut() {
            if v.verified_at_client.as_ref() == Some(client_id) {
                v.verified_at_client = None;
            }
        }
        Ok(())
    }

    async fn create_sign_in(&self, sign_in: SignIn) -> Result<SignIn, StoreError> {
        self.sign_ins.lock().unwrap().insert(sign_in.id.to_string(), sign_in.clone());
        Ok(sign_in)
    }
    async fn find_sign_in(&self, _instance_id: &TypedId, id: &TypedId) -> Result<Option<SignIn>, StoreError> {
        Ok(self.sign_ins.lock().unwrap().get(id.as_str()).cloned())
    }
    async fn update_sign_in(&self, sign_in: SignIn) -> Result<SignIn, StoreError> {
        self.sign_ins.lock().unwrap().insert(sign_in.id.to_string(), sign_in.clone());
        Ok(sign_in)
    }
    async fn delete_sign_ins_for_client(&self, _instance_id: &TypedId, client_id: &TypedId) -> Result<(), StoreError> {
        self.sign_ins.lock().unwrap().retain(|_, s| &s.client_id != client_id);
        Ok(())
    }
    async fn delete_sign_ins_by_created_session(&self, _instance_id: &TypedId, session_id: &TypedId) -> Result<(), StoreError> {
        self.sign_ins.lock().unwrap().retain(|_, s| s.created_session_id.as_ref() != Some(session_id));
        Ok(())
    }

    async fn create_sign_up(&self, sign_up: SignUp) -> Result<SignUp, StoreError> {
        self.sign_ups.lock().unwrap().insert(sign_up.id.to_string(), sign_up.clone());
        Ok(sign_up)
    }
    async fn find_sign_up(&self, _instance_id: &TypedId, id: &TypedId) -> Result<Option<SignUp>, StoreError> {
        Ok(self.sign_ups.lock().unwrap().get(id.as_str()).cloned())
    }
    async fn update_sign_up(&self, sign_up: SignUp) -> Result<SignUp, StoreError> {
        self.sign_ups.lock().unwrap().insert(sign_up.id.to_string(), sign_up.clone());
        Ok(sign_up)
    }
    async fn delete_sign_ups_for_client(&self, _instance_id: &TypedId, client_id: &TypedId) -> Result<(), StoreError> {
        self.sign_ups.lock().unwrap().retain(|_, s| &s.client_id != client_id);
        Ok(())
    }

    async fn create_sync_nonce(&self, nonce: SyncNonce) -> Result<SyncNonce, StoreError> {
        self.sync_nonces.lock().unwrap().insert(nonce.nonce.clone(), nonce.clone());
        Ok(nonce)
    }
    async fn find_sync_nonce(&self, _instance_id: &TypedId, nonce: &str) -> Result<Option<SyncNonce>, StoreError> {
        Ok(self.sync_nonces.lock().unwrap().get(nonce).cloned())
    }
    async fn update_sync_nonce(&self, nonce: SyncNonce) -> Result<SyncNonce, StoreError> {
        self.sync_nonces.lock().unwrap().insert(nonce.nonce.clone(), nonce.clone());
        Ok(nonce)
    }
    async fn delete_sync_nonces_for_client(&self, _instance_id: &TypedId, client_id: &TypedId) -> Result<(), StoreError> {
        self.sync_nonces.lock().unwrap().retain(|_, n| &n.client_id != client_id);
        Ok(())
    }

    async fn find_jwt_template(&self, _instance_id: &TypedId, name: &str) -> Result<Option<JwtTemplate>, StoreError> {
        Ok(self.jwt_templates.lock().unwrap().values().find(|t| t.name == name).cloned())
    }

    async fn billing_plan_keys(&self, _instance_id: &TypedId, _user_id: &TypedId, _org_id: Option<&TypedId>) -> Result<Vec<String>, StoreError> {
        Ok(Vec::new())
    }
}

pub fn fresh_user(id: &str, instance_id: &str, password_digest: &str) -> User {
    let now = chrono::Utc::now();
    User {
        id: TypedId::new(id),
        instance_id: TypedId::new(instance_id),
        password_digest: Some(password_digest.to_owned()),
        password_enabled: true,
        two_factor_enabled: false,
        totp_enabled: false,
        backup_code_enabled: false,
        primary_email_identification_id: None,
        primary_phone_identification_id: None,
        primary_web3_wallet_identification_id: None,
        first_name: None,
        last_name: None,
        username: None,
        image_url: None,
        locked_until: None,
        failed_verification_attempts: 0,
        public_metadata: serde_json::json!({}),
        private_metadata: serde_json::json!({}),
        unsafe_metadata: serde_json::json!({}),
        external_id: None,
        created_at: now,
        updated_at: now,
    }
}

pub fn fresh_identification(id: &str, instance_id: &str, user_id: &str, identifier: &str) -> Identification {
    let now = chrono::Utc::now();
    Identification {
        id: TypedId::new(id),
        instance_id: TypedId::new(instance_id),
        user_id: Some(TypedId::new(user_id)),
        kind: IdentificationType::EmailAddress,
        identifier: Some(identifier.to_owned()),
        status: clerk_core::domain::IdentificationStatus::Verified,
        verification_id: None,
        target_identification_id: None,
        requires_verification: clerk_core::domain::Tristate::NotRequired,
        created_at: now,
        updated_at: now,
    }
}
