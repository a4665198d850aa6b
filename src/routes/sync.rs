use std::collections::HashMap;

use axum::extract::{Query, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::{IntoResponse, Redirect, Response};
use axum_extra::extract::cookie::CookieJar;

use crate::cookie::codec::Environment as CookieEnvironment;
use crate::error::CoreError;
use crate::multidomain::{append_synced_marker, build_link_redirect, consume_link_token, create_sync_nonce_and_link_token};
use crate::store::StoreContext;

use super::client::{instance_id_from_headers, CLIENT_COOKIE_NAME};
use super::{ApiError, AppState};

fn host_header(headers: &HeaderMap) -> Result<&str, ApiError> {
    headers
        .get(header::HOST)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| ApiError::from(CoreError::InvalidHost))
}

/// `GET /v1/client/sync`: runs on the Primary Domain (spec §4.8). Mints a
/// `SyncNonce` + link-token and redirects the browser back to the
/// satellite's `/client/link`, or appends `__clerk_synced=true` when the
/// Primary has no Client for this browser.
pub async fn satellite_sync(
    State(state): State<AppState>,
    headers: HeaderMap,
    Query(params): Query<HashMap<String, String>>,
    jar: CookieJar,
) -> Result<Response, ApiError> {
    let instance_id = instance_id_from_headers(&headers)?;
    let redirect_url = params.get("redirect_url").ok_or(CoreError::FormMissingParameter("redirect_url".into()))?;
    let satellite_host = host_header(&headers)?.to_owned();

    let production = state.config().production;
    let env = if production { CookieEnvironment::Production } else { CookieEnvironment::Development };

    let Some(cookie) = jar.get(CLIENT_COOKIE_NAME) else {
        let url = append_synced_marker(redirect_url)?;
        return Ok(Redirect::temporary(url.as_str()).into_response());
    };
    let claims = state.cookie_codec().decode(cookie.value(), env)?;
    let client_id = claims.id.as_ref().ok_or(CoreError::MissingClaims)?;
    let client = state
        .client_store()
        .find_client(&StoreContext::default(), &instance_id, &crate::domain::TypedId::new(client_id.clone()))
        .await
        .map_err(CoreError::from)?
        .ok_or(CoreError::ClientNotFoundInRequest)?;

    let (sync_encoding_key, _decoding_key, sync_algorithm) = state.sync_signing();
    let (_nonce, link_token) = create_sync_nonce_and_link_token(
        state.flow_store(),
        &instance_id,
        &client,
        redirect_url,
        client.updated_at.timestamp() as u64,
        sync_encoding_key,
        sync_algorithm,
    )
    .await?;

    let url = build_link_redirect(&satellite_host, &link_token)?;
    Ok(Redirect::temporary(url.as_str()).into_response())
}

/// `GET /v1/client/link`: runs on the satellite. Consumes the link token
/// minted by [`satellite_sync`], rotates the satellite's own cookie, and
/// redirects to the original destination (spec §4.8 third bullet).
pub async fn consume_link(State(state): State<AppState>, headers: HeaderMap, Query(params): Query<HashMap<String, String>>) -> Result<Response, ApiError> {
    let instance_id = instance_id_from_headers(&headers)?;
    let token = params.get("__clerk_token").ok_or(CoreError::FormMissingParameter("__clerk_token".into()))?;

    let (_encoding_key, decoding_key, sync_algorithm) = state.sync_signing();
    let ctx = StoreContext::default();
    let outcome = consume_link_token(
        state.client_store(),
        state.flow_store(),
        state.cookie_codec(),
        &ctx,
        &instance_id,
        token,
        decoding_key,
        sync_algorithm,
    )
    .await?;

    let set_cookie = format!("{CLIENT_COOKIE_NAME}={}; Path=/; HttpOnly; Secure; SameSite=None", outcome.cookie);
    let mut response = Redirect::temporary(&outcome.redirect_url).into_response();
    response.headers_mut().insert(header::SET_COOKIE, set_cookie.parse().map_err(|_| CoreError::InvalidHandshake)?);
    Ok(response)
}

/// `GET /v1/client/handshake`: the handshake variant of sync (spec §4.8
/// "handshake"). Signs the current cookie state into a JWT and delivers it
/// via cookie (production) or query parameter (development), with
/// `Access-Control-Allow-Origin: null` so it survives opaque-origin
/// satellite iframes.
pub async fn handshake(State(state): State<AppState>, headers: HeaderMap, jar: CookieJar) -> Result<Response, ApiError> {
    let production = state.config().production;
    let env = if production { CookieEnvironment::Production } else { CookieEnvironment::Development };

    let client_uat_clear = "__client_uat=; Path=/; Max-Age=0".to_owned();
    let client_uat_fresh = format!("__client_uat={}; Path=/", chrono::Utc::now().timestamp());
    let session_cookie_clear = "__session=; Path=/; Max-Age=0".to_owned();

    let session_cookie = match jar.get(CLIENT_COOKIE_NAME) {
        Some(cookie) => state.cookie_codec().decode(cookie.value(), env).ok().and(Some(cookie.value().to_owned())),
        None => None,
    };

    let directives = state.handshake_builder().build_set_cookie_directives(client_uat_clear, client_uat_fresh, session_cookie, session_cookie_clear, None);

    let delivery = state
        .handshake_builder()
        .sign_and_deliver(directives, state.config().flow_ttl.session_token_ttl_secs, production)?;

    let mut response = match delivery {
        crate::cookie::HandshakeDelivery::Cookie(token) => {
            let mut response = StatusCode::NO_CONTENT.into_response();
            let set_cookie = format!("__clerk_handshake={token}; Path=/; HttpOnly; Secure; SameSite=None");
            response.headers_mut().insert(header::SET_COOKIE, set_cookie.parse().map_err(|_| CoreError::InvalidHandshake)?);
            response
        }
        crate::cookie::HandshakeDelivery::QueryParam(token) => (StatusCode::OK, token).into_response(),
    };
    response
        .headers_mut()
        .insert(header::ACCESS_CONTROL_ALLOW_ORIGIN, crate::multidomain::HANDSHAKE_SYNC_ALLOW_ORIGIN.parse().unwrap());
    Ok(response)
}
