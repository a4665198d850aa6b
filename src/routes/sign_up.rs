use axum::extract::{Path, State};
use axum::http::HeaderMap;
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::domain::TypedId;
use crate::error::CoreError;
use crate::sign_up::{CreateSignUpRequest, FinalizeOutcome, SignUpMachine};
use crate::sign_in::SessionConverter;
use crate::store::StoreContext;

use super::client::instance_id_from_headers;
use super::{ApiError, AppState};

#[derive(Deserialize)]
pub struct CreateSignUpBody {
    pub transfer: Option<bool>,
}

#[derive(Deserialize)]
pub struct FinalizeSignUpBody {
    #[serde(default)]
    pub single_session_mode: bool,
}

fn finalize_json(outcome: FinalizeOutcome) -> Value {
    match outcome {
        FinalizeOutcome::Converted { sign_up, outcome } => json!({
            "object": "sign_up",
            "id": sign_up.id.as_str(),
            "status": "complete",
            "session_id": outcome.session.id.as_str(),
        }),
        FinalizeOutcome::IdentificationClaimed => json!({
            "object": "sign_up",
            "status": "abandoned",
            "error": "identification_claimed",
        }),
    }
}

/// `POST /v1/client/sign_ups`: spec §4.7 Create.
pub async fn create_sign_up(State(state): State<AppState>, headers: HeaderMap, Json(body): Json<CreateSignUpBody>) -> Result<Json<Value>, ApiError> {
    let instance_id = instance_id_from_headers(&headers)?;
    let ttl = &state.config().flow_ttl;

    let converter = SessionConverter {
        store: state.client_store(),
        flow_store: state.flow_store(),
        cookie_codec: state.cookie_codec(),
        session_lifetime: ttl.session_ttl(),
        session_abandon: ttl.session_abandon(),
    };
    let machine = SignUpMachine {
        store: state.client_store(),
        flow_store: state.flow_store(),
        converter,
        sign_up_ttl: ttl.sign_up_ttl(),
    };

    let ctx = StoreContext::default();
    let (_client, sign_up) = machine
        .create(
            &ctx,
            CreateSignUpRequest {
                instance_id,
                client: None,
                transfer: body.transfer.unwrap_or(false),
            },
        )
        .await?;

    Ok(Json(json!({ "object": "sign_up", "id": sign_up.id.as_str(), "status": "missing_requirements" })))
}

/// `POST /v1/client/sign_ups/:id/finalize`: spec §4.7 Finalize.
pub async fn finalize_sign_up(
    State(state): State<AppState>,
    headers: HeaderMap,
    Path(id): Path<String>,
    Json(body): Json<FinalizeSignUpBody>,
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
    let machine = SignUpMachine {
        store: state.client_store(),
        flow_store: state.flow_store(),
        converter,
        sign_up_ttl: ttl.sign_up_ttl(),
    };

    let sign_up_id = TypedId::new(id);
    let sign_up = state
        .flow_store()
        .find_sign_up(&instance_id, &sign_up_id)
        .await
        .map_err(CoreError::from)?
        .ok_or(CoreError::SignUpNotFound)?;
    let client = state
        .client_store()
        .find_client(&StoreContext::default(), &instance_id, &sign_up.client_id)
        .await
        .map_err(CoreError::from)?
        .ok_or(CoreError::ClientNotFoundInRequest)?;

    let ctx = StoreContext::default();
    let outcome = machine.finalize(&ctx, client, sign_up, body.single_session_mode).await?;

    Ok(Json(finalize_json(outcome)))
}
