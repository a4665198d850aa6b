//! Thin axum adapters over the CORE (spec §1 Non-goals: "HTTP routing and
//! request decoding" is an external collaborator concern; these handlers are
//! the outer surface a deployment wires the CORE behind, grounded on the
//! teacher's `AuthServiceState(Arc<Inner>)` / `Router<S>` builder shape).

pub mod client;
pub mod sign_in;
pub mod sign_up;
pub mod sync;
pub mod tokens;

use std::sync::Arc;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};
use serde_json::json;

use crate::config::AppConfig;
use crate::cookie::{CookieCodec, HandshakeBuilder};
use crate::domain_resolver::{DomainResolver, EnvironmentLookup};
use crate::error::CoreError;
use crate::external_account::ExternalAccountProvider;
use crate::sign_in::{CodeDelivery, IdentifierPolicy, PasswordVerifier};
use crate::sign_up::CaptchaClient;
use crate::store::{ClientStore, FlowStore};

fn parse_algorithm(name: &str) -> Algorithm {
    match name {
        "HS384" => Algorithm::HS384,
        "HS512" => Algorithm::HS512,
        "RS256" => Algorithm::RS256,
        _ => Algorithm::HS256,
    }
}

struct Inner {
    config: AppConfig,
    client_store: ClientStore,
    flow_store: Box<dyn FlowStore>,
    cookie_codec: CookieCodec,
    handshake_builder: HandshakeBuilder,
    token_encoding_key: EncodingKey,
    token_algorithm: Algorithm,
    sync_encoding_key: EncodingKey,
    sync_decoding_key: DecodingKey,
    sync_algorithm: Algorithm,
    domain_resolver: DomainResolver<Arc<dyn EnvironmentLookup>>,
    password_verifier: Arc<dyn PasswordVerifier>,
    code_delivery: Arc<dyn CodeDelivery>,
    identifier_policy: Arc<dyn IdentifierPolicy>,
    captcha_pool: Vec<Box<dyn CaptchaClient>>,
    external_account_provider: Arc<dyn ExternalAccountProvider>,
}

/// Request-scoped handle into the wired CORE. Cheap to clone (one `Arc`
/// bump), the way the teacher's `AuthServiceState` is.
#[derive(Clone)]
pub struct AppState(Arc<Inner>);

#[allow(clippy::too_many_arguments)]
impl AppState {
    pub fn new(
        config: AppConfig,
        client_store: ClientStore,
        flow_store: Box<dyn FlowStore>,
        environment_lookup: Arc<dyn EnvironmentLookup>,
        password_verifier: Arc<dyn PasswordVerifier>,
        code_delivery: Arc<dyn CodeDelivery>,
        identifier_policy: Arc<dyn IdentifierPolicy>,
        captcha_pool: Vec<Box<dyn CaptchaClient>>,
        external_account_provider: Arc<dyn ExternalAccountProvider>,
    ) -> Self {
        let cookie_algorithm = parse_algorithm(&config.cookie_signing.algorithm);
        let cookie_codec = CookieCodec::new(
            EncodingKey::from_secret(config.cookie_signing.secret.as_bytes()),
            DecodingKey::from_secret(config.cookie_signing.secret.as_bytes()),
            cookie_algorithm,
            config.flow_ttl.cookie_ttl_secs,
        );
        let handshake_builder = HandshakeBuilder::new(EncodingKey::from_secret(config.cookie_signing.secret.as_bytes()), cookie_algorithm);

        let token_algorithm = parse_algorithm(&config.token_signing.algorithm);
        let token_encoding_key = EncodingKey::from_secret(config.token_signing.secret.as_bytes());

        // Sync/link tokens are signed with the same material as the cookie:
        // both are short-lived, first-party artifacts the CORE itself mints
        // and verifies (spec §4.8).
        let sync_encoding_key = EncodingKey::from_secret(config.cookie_signing.secret.as_bytes());
        let sync_decoding_key = DecodingKey::from_secret(config.cookie_signing.secret.as_bytes());

        let domain_resolver = DomainResolver::new(environment_lookup);

        Self(Arc::new(Inner {
            config,
            client_store,
            flow_store,
            cookie_codec,
            handshake_builder,
            token_encoding_key,
            token_algorithm,
            sync_encoding_key,
            sync_decoding_key,
            sync_algorithm: cookie_algorithm,
            domain_resolver,
            password_verifier,
            code_delivery,
            identifier_policy,
            captcha_pool,
            external_account_provider,
        }))
    }

    pub fn config(&self) -> &AppConfig {
        &self.0.config
    }

    pub fn client_store(&self) -> &ClientStore {
        &self.0.client_store
    }

    pub fn flow_store(&self) -> &dyn FlowStore {
        self.0.flow_store.as_ref()
    }

    pub fn cookie_codec(&self) -> &CookieCodec {
        &self.0.cookie_codec
    }

    pub fn handshake_builder(&self) -> &HandshakeBuilder {
        &self.0.handshake_builder
    }

    pub fn token_signing(&self) -> (&EncodingKey, Algorithm, Option<&str>) {
        (&self.0.token_encoding_key, self.0.token_algorithm, self.0.config.token_signing.kid.as_deref())
    }

    pub fn sync_signing(&self) -> (&EncodingKey, &DecodingKey, Algorithm) {
        (&self.0.sync_encoding_key, &self.0.sync_decoding_key, self.0.sync_algorithm)
    }

    pub fn domain_resolver(&self) -> &DomainResolver<Arc<dyn EnvironmentLookup>> {
        &self.0.domain_resolver
    }

    pub fn password_verifier(&self) -> &dyn PasswordVerifier {
        self.0.password_verifier.as_ref()
    }

    pub fn code_delivery(&self) -> &dyn CodeDelivery {
        self.0.code_delivery.as_ref()
    }

    pub fn identifier_policy(&self) -> &dyn IdentifierPolicy {
        self.0.identifier_policy.as_ref()
    }

    pub fn captcha_pool(&self) -> &[Box<dyn CaptchaClient>] {
        &self.0.captcha_pool
    }

    pub fn external_account_provider(&self) -> &dyn ExternalAccountProvider {
        self.0.external_account_provider.as_ref()
    }
}

/// Maps the CORE's error taxonomy onto HTTP status + a `{"error": "..."}`
/// body. A real deployment would add FAPI's `{"errors": [...]}` envelope;
/// this keeps the shape the teacher's handlers use for early error returns.
pub struct ApiError(CoreError);

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        ApiError(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self.0 {
            CoreError::ClientNotFoundInRequest
            | CoreError::SignInNotFound
            | CoreError::SignUpNotFound
            | CoreError::SessionNotFound
            | CoreError::ExternalAccountNotFound => StatusCode::NOT_FOUND,
            CoreError::InvalidCookie
            | CoreError::MissingClaims
            | CoreError::InvalidRotatingToken
            | CoreError::InvalidHandshake
            | CoreError::InvalidHost
            | CoreError::InvalidPassword
            | CoreError::CaptchaInvalid
            | CoreError::FormInvalidParameterValue(_)
            | CoreError::FormMissingParameter(_)
            | CoreError::FormNilParameter(_)
            | CoreError::FormInvalidEmailAddress(_)
            | CoreError::SyncNonceAlreadyConsumed
            | CoreError::SamlResponseInvalid => StatusCode::BAD_REQUEST,
            CoreError::AccountLocked | CoreError::IdentifierNotAllowedAccess | CoreError::IdentificationClaimed => StatusCode::FORBIDDEN,
            CoreError::SingleModeSessionExists | CoreError::CannotCreateSessionWhenImpersonationIsPresent | CoreError::IdentificationExists => {
                StatusCode::CONFLICT
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(json!({ "error": self.0.to_string() }))).into_response()
    }
}

/// Builds the FAPI-shaped router (spec §6's `/v1/client...` surface). Kept
/// flat rather than nested per sub-resource, mirroring the teacher's single
/// `into_router` call site.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/v1/client", get(client::get_client))
        .route("/v1/client/sync", get(sync::satellite_sync))
        .route("/v1/client/link", get(sync::consume_link))
        .route("/v1/client/handshake", get(sync::handshake))
        .route("/v1/client/sign_ins", post(sign_in::create_sign_in))
        .route("/v1/client/sign_ins/:id/attempt_first_factor", post(sign_in::attempt_first_factor))
        .route("/v1/client/sign_ups", post(sign_up::create_sign_up))
        .route("/v1/client/sign_ups/:id/finalize", post(sign_up::finalize_sign_up))
        .route("/v1/client/sessions/:id/tokens", post(tokens::issue_default_token))
        .route("/v1/client/sessions/:id/tokens/:template", post(tokens::issue_template_token))
}
