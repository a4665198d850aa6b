use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::domain::verification::Strategy;
use crate::domain::TypedId;
use crate::sign_in::{CreateSignInOutcome, CreateSignInRequest, SessionConverter, SignInMachine};
use crate::store::StoreContext;

use super::client::instance_id_from_headers;
use super::{ApiError, AppState};

#[derive(Deserialize)]
pub struct CreateSignInBody {
    pub identifier: Option<String>,
    pub strategy: Option<Strategy>,
    pub password: Option<String>,
    pub transfer: Option<bool>,
}

#[derive(Deserialize)]
pub struct AttemptFirstFactorBody {
    pub strategy: Strategy,
    pub password: Option<String>,
    pub code: Option<String>,
}

fn outcome_json(outcome: CreateSignInOutcome) -> Value {
    match outcome {
        CreateSignInOutcome::Pending { sign_in, state, .. } => json!({
            "object": "sign_in",
            "id": sign_in.id.as_str(),
            "status": format!("{state:?}"),
        }),
        CreateSignInOutcome::Converted { sign_in, outcome } => json!({
            "object": "sign_in",
            "id": sign_in.id.as_str(),
            "status": "complete",
            "session_id": outcome.session.id.as_str(),
        }),
    }
}

/// `POST /v1/client/sign_ins`: spec §4.6 Create.
pub async fn create_sign_in(State(state): State<AppState>, headers: HeaderMap, Json(body): Json<CreateSignInBody>) -> Result<Json<Value>, ApiError> {
    let instance_id = instance_id_from_headers(&headers)?;
    let ttl = &state.config().flow_ttl;

    let converter = SessionConverter {
        store: state.client_store(),
        flow_store: state.flow_store(),
        cookie_codec: state.cookie_codec(),
        session_lifetime: ttl.session_ttl(),
        session_abandon: ttl.session_abandon(),
    };
    let machine = SignInMachine {
        store: state.client_store(),
        flow_store: state.flow_store(),
        password_verifier: state.password_verifier(),
        code_delivery: state.code_delivery(),
        identifier_policy: state.identifier_policy(),
        converter,
        sign_in_ttl: ttl.sign_in_ttl(),
        verification_ttl: ttl.verification_ttl(),
        max_attempts: ttl.max_verification_attempts,
    };

    let ctx = StoreContext::default();
    let outcome = machine
        .create(
            &ctx,
            CreateSignInRequest {
                instance_id,
                client: None,
                identifier: body.identifier,
                strategy: body.strategy,
                password: body.password,
                proof: None,
                transfer: body.transfer.unwrap_or(false),
                single_session_mode: false,
                actor_token_id: None,
                origin: None,
            },
        )
        .await?;

    Ok(Json(outcome_json(outcome)))
}

/// `POST /v1/client/sign_ins/:id/attempt_first_factor`: spec §4.6 Attempt.
pub async fn attempt_first_factor(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<AttemptFirstFactorBody>,
) -> Result<Json<Value>, ApiError> {
    let instance_id = instance_id_from_headers(&headers)?;
    let ttl = &state.config().flow_ttl;

    let converter = SessionConverter {
        store: state.client_store(),
        flow_store: state.flow_store(),
        cookie_codec: state.cookie_codec(),
        session_lifetime: ttl.session_ttl(),
        session_abandon: ttl.session_abandon(),
    };
    let machine = SignInMachine {
        store: state.client_store(),
        flow_store: state.flow_store(),
        password_verifier: state.password_verifier(),
        code_delivery: state.code_delivery(),
        identifier_policy: state.identifier_policy(),
        converter,
        sign_in_ttl: ttl.sign_in_ttl(),
        verification_ttl: ttl.verification_ttl(),
        max_attempts: ttl.max_verification_attempts,
    };

    let sign_in_id = TypedId::new(id);
    let sign_in = state
        .flow_store()
        .find_sign_in(&instance_id, &sign_in_id)
        .await
        .map_err(crate::error::CoreError::from)?
        .ok_or(crate::error::CoreError::SignInNotFound)?;

    let sign_in = machine
        .attempt_first_factor(&instance_id, sign_in, body.strategy, body.password.as_deref(), body.code.as_deref())
        .await?;

    Ok(Json(json!({
        "object": "sign_in",
        "id": sign_in.id.as_str(),
        "created_session_id": sign_in.created_session_id.as_ref().map(TypedId::as_str),
    })))
}
