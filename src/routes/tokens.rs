use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde_json::{json, Value};

use crate::domain::TypedId;
use crate::error::CoreError;
use crate::store::StoreContext;
use crate::token::{SessionTokenService, TemplateContext};

use super::client::instance_id_from_headers;
use super::{ApiError, AppState};

async fn issue(state: &AppState, instance_id: &TypedId, session_id: &str, template_name: Option<&str>) -> Result<String, ApiError> {
    let session_id = TypedId::new(session_id.to_owned());
    let session = state
        .client_store()
        .find_session(&StoreContext::default(), instance_id, &session_id)
        .await
        .map_err(CoreError::from)?
        .ok_or(CoreError::SessionNotFound)?;

    if !session.is_active() {
        return Err(ApiError::from(CoreError::ErrInactiveSession));
    }

    let template = match template_name {
        Some(name) => Some(
            state
                .flow_store()
                .find_jwt_template(instance_id, name)
                .await
                .map_err(CoreError::from)?
                .ok_or(CoreError::FormInvalidParameterValue("template".into()))?,
        ),
        None => None,
    };

    let ctx = TemplateContext::default();
    let (key, algorithm, kid) = state.token_signing();
    let default_lifetime = state.config().flow_ttl.session_token_ttl_secs;
    let issuer = state.config().issuer.clone();

    let token = SessionTokenService::issue(&session, &ctx, template.as_ref(), &issuer, None, default_lifetime, key, algorithm, kid)?;
    Ok(token)
}

/// `POST /v1/client/sessions/:id/tokens`: the default, un-templated session
/// token (spec §4.5).
pub async fn issue_default_token(State(state): State<AppState>, headers: HeaderMap, Path(id): Path<String>) -> Result<Json<Value>, ApiError> {
    let instance_id = instance_id_from_headers(&headers)?;
    let jwt = issue(&state, &instance_id, &id, None).await?;
    Ok(Json(json!({ "jwt": jwt })))
}

/// `POST /v1/client/sessions/:id/tokens/:template`: a named `JwtTemplate`
/// execution (spec §4.4-§4.5).
pub async fn issue_template_token(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path((id, template)): Path<(String, String)>,
) -> Result<Json<Value>, ApiError> {
    let instance_id = instance_id_from_headers(&headers)?;
    let jwt = issue(&state, &instance_id, &id, Some(&template)).await?;
    Ok(Json(json!({ "jwt": jwt })))
}
