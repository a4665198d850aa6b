use async_trait::async_trait;
use reqwest::{Client as HttpClient, StatusCode};
use serde::{de::DeserializeOwned, Serialize};
use url::Url;

use crate::domain::{Client, Session, TypedId};

use super::backend::ClientBackend;
use super::error::StoreError;

/// `ClientStore` backend fronting a remote edge service, for Clients/Sessions
/// whose id is "edge-shaped" (spec §4.2). Routing between this and
/// [`super::relational::RelationalStore`] happens one level up in
/// [`super::router::ClientStoreRouter`].
pub struct EdgeStore {
    http: HttpClient,
    base_url: Url,
}

impl EdgeStore {
    pub fn new(http: HttpClient, base_url: Url) -> Self {
        Self { http, base_url }
    }

    fn url(&self, path: &str) -> Url {
        self.base_url.join(path).expect("edge store path must be valid")
    }

    async fn send<T: DeserializeOwned>(&self, req: reqwest::RequestBuilder) -> Result<T, StoreError> {
        let resp = req.send().await.map_err(|e| StoreError::Unexpected(e.to_string()))?;
        match resp.status() {
            StatusCode::NOT_FOUND => Err(StoreError::NoRecords),
            StatusCode::CONFLICT => Err(StoreError::Conflict),
            StatusCode::BAD_REQUEST => {
                let messages: Vec<String> = resp.json().await.unwrap_or_default();
                Err(StoreError::BadRequest(messages))
            }
            status if status.is_success() => resp.json().await.map_err(|e| StoreError::Unexpected(e.to_string())),
            status => Err(StoreError::Unexpected(format!("edge store returned {status}"))),
        }
    }

    async fn send_unit(&self, req: reqwest::RequestBuilder) -> Result<(), StoreError> {
        let resp = req.send().await.map_err(|e| StoreError::Unexpected(e.to_string()))?;
        match resp.status() {
            StatusCode::NOT_FOUND => Err(StoreError::NoRecords),
            status if status.is_success() => Ok(()),
            status => Err(StoreError::Unexpected(format!("edge store returned {status}"))),
        }
    }

    fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> reqwest::RequestBuilder {
        self.http.post(self.url(path)).json(body)
    }
}

#[async_trait]
impl ClientBackend for EdgeStore {
    async fn create_client(&self, client: Client) -> Result<Client, StoreError> {
        self.send(self.post("/v1/clients", &client)).await
    }

    async fn find_client(&self, instance_id: &TypedId, id: &TypedId) -> Result<Option<Client>, StoreError> {
        let req = self.http.get(self.url(&format!("/v1/clients/{}/{}", instance_id, id)));
        match self.send(req).await {
            Ok(client) => Ok(Some(client)),
            Err(StoreError::NoRecords) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn update_client(&self, client: Client) -> Result<Client, StoreError> {
        let path = format!("/v1/clients/{}/{}", client.instance_id, client.id);
        self.send(self.http.put(self.url(&path)).json(&client)).await
    }

    async fn delete_client(&self, instance_id: &TypedId, id: &TypedId) -> Result<(), StoreError> {
        let path = format!("/v1/clients/{}/{}", instance_id, id);
        self.send_unit(self.http.delete(self.url(&path))).await
    }

    async fn create_session(&self, session: Session) -> Result<Session, StoreError> {
        self.send(self.post("/v1/sessions", &session)).await
    }

    async fn find_session(&self, instance_id: &TypedId, id: &TypedId) -> Result<Option<Session>, StoreError> {
        let req = self.http.get(self.url(&format!("/v1/sessions/{}/{}", instance_id, id)));
        match self.send(req).await {
            Ok(session) => Ok(Some(session)),
            Err(StoreError::NoRecords) => Ok(None),
            Err(err) => Err(err),
        }
    }

    async fn update_session(&self, session: Session) -> Result<Session, StoreError> {
        let path = format!("/v1/sessions/{}/{}", session.instance_id, session.id);
        self.send(self.http.put(self.url(&path)).json(&session)).await
    }

    async fn delete_session(&self, instance_id: &TypedId, id: &TypedId) -> Result<(), StoreError> {
        let path = format!("/v1/sessions/{}/{}", instance_id, id);
        self.send_unit(self.http.delete(self.url(&path))).await
    }

    async fn list_client_sessions(
        &self,
        instance_id: &TypedId,
        client_id: &TypedId,
        active_only: bool,
    ) -> Result<Vec<Session>, StoreError> {
        let path = format!("/v1/clients/{}/{}/sessions?active_only={}", instance_id, client_id, active_only);
        self.send(self.http.get(self.url(&path))).await
    }

    async fn list_user_sessions(
        &self,
        instance_id: &TypedId,
        user_id: &TypedId,
        active_only: bool,
    ) -> Result<Vec<Session>, StoreError> {
        let path = format!("/v1/users/{}/{}/sessions?active_only={}", instance_id, user_id, active_only);
        self.send(self.http.get(self.url(&path))).await
    }
}
