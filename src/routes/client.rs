use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use axum_extra::extract::cookie::CookieJar;
use serde_json::{json, Value};

use crate::cookie::codec::{ClientResolver, Environment as CookieEnvironment};
use crate::domain::TypedId;
use crate::error::CoreError;
use crate::store::StoreContext;

use super::{ApiError, AppState};

pub const CLIENT_COOKIE_NAME: &str = "__client";

pub fn instance_id_from_headers(headers: &HeaderMap) -> Result<TypedId, ApiError> {
    headers
        .get("x-clerk-instance-id")
        .and_then(|v| v.to_str().ok())
        .map(|s| TypedId::new(s.to_owned()))
        .ok_or_else(|| ApiError::from(CoreError::InvalidHost))
}

fn client_json(client: &crate::domain::Client) -> Value {
    json!({
        "object": "client",
        "id": client.id.as_str(),
        "sign_in_id": client.sign_in_id.as_ref().map(TypedId::as_str),
        "sign_up_id": client.sign_up_id.as_ref().map(TypedId::as_str),
    })
}

/// `GET /v1/client`: resolves the caller's `Client` from the `__client`
/// cookie (spec §4.1 steps 1-3) and returns it, or an empty client payload
/// when no cookie is present (FAPI's "no client yet" response).
pub async fn get_client(State(state): State<AppState>, headers: HeaderMap, jar: CookieJar) -> Result<Json<Value>, ApiError> {
    let instance_id = instance_id_from_headers(&headers)?;
    let production = state.config().production;

    let Some(cookie) = jar.get(CLIENT_COOKIE_NAME) else {
        return Ok(Json(json!({ "object": "client", "id": null })));
    };

    let env = if production { CookieEnvironment::Production } else { CookieEnvironment::Development };
    let claims = state.cookie_codec().decode(cookie.value(), env)?;

    let resolver = ClientResolver { store: state.client_store() };
    let ctx = StoreContext::default();
    let client = resolver.resolve(&ctx, &instance_id, &claims, None, None).await?;

    Ok(Json(client_json(&client)))
}
