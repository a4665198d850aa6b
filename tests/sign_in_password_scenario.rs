//! Exercises the "fresh sign-in, password strategy, immediate success"
//! scenario (spec §8) through `SignInMachine::create` end to end against an
//! in-memory `ClientStore`/`FlowStore`, the way a from-scratch password
//! sign-in would actually run.

mod common;

use std::sync::Arc;

use chrono::Duration;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey};

use clerk_core::cookie::codec::CookieCodec;
use clerk_core::domain::{SessionStatus, TypedId};
use clerk_core::sign_in::convert::SessionConverter;
use clerk_core::sign_in::machine::{CreateSignInOutcome, CreateSignInRequest, SignInMachine};
use clerk_core::sign_in::strategies::{FakePasswordVerifier, NullCodeDelivery, NullIdentifierPolicy};
use clerk_core::store::{ClientStore, FlowStore, StoreContext};
use clerk_core::domain::verification::Strategy;

use common::{fresh_identification, fresh_user, InMemoryBackend, InMemoryFlowStore};

#[tokio::test]
async fn fresh_sign_in_with_correct_password_converts_to_an_active_session() {
    let backend: Arc<dyn clerk_core::store::backend::ClientBackend> = Arc::new(InMemoryBackend::default());
    let cache = Arc::new(clerk_core::store::cache::MokaMaintenanceCache::new(10));
    let store = ClientStore::new(backend.clone(), backend, cache);
    let flow_store = InMemoryFlowStore::default();

    let instance_id = TypedId::new("ins_1");
    let user = fresh_user("user_1", "ins_1", "hunter2");
    flow_store.create_user(user.clone()).await.unwrap();
    let identification = fresh_identification("idn_1", "ins_1", "user_1", "alice@example.com");
    flow_store.create_identification(identification).await.unwrap();

    let cookie_codec = CookieCodec::new(EncodingKey::from_secret(b"test-secret"), DecodingKey::from_secret(b"test-secret"), Algorithm::HS256, 3600);

    let converter = SessionConverter {
        store: &store,
        flow_store: &flow_store,
        cookie_codec: &cookie_codec,
        session_lifetime: Duration::days(7),
        session_abandon: Duration::days(30),
    };

    let machine = SignInMachine {
        store: &store,
        flow_store: &flow_store,
        password_verifier: &FakePasswordVerifier,
        code_delivery: &NullCodeDelivery,
        identifier_policy: &NullIdentifierPolicy,
        converter,
        sign_in_ttl: Duration::minutes(10),
        verification_ttl: Duration::minutes(10),
        max_attempts: 5,
    };

    let outcome = machine
        .create(
            &StoreContext::default(),
            CreateSignInRequest {
                instance_id,
                client: None,
                identifier: Some("alice@example.com".into()),
                strategy: Some(Strategy::Password),
                password: Some("hunter2".into()),
                proof: None,
                transfer: false,
                single_session_mode: false,
                actor_token_id: None,
                origin: None,
            },
        )
        .await
        .unwrap();

    match outcome {
        CreateSignInOutcome::Converted { outcome, .. } => {
            assert_eq!(outcome.session.status, SessionStatus::PendingActivation);
            assert_eq!(outcome.session.user_id, TypedId::new("user_1"));
            assert!(outcome.cookie.is_some());
        }
        CreateSignInOutcome::Pending { state, .. } => {
            panic!("expected the sign-in to convert immediately, got pending state {state:?}");
        }
    }
}

#[tokio::test]
async fn wrong_password_is_rejected_and_the_sign_in_stays_pending() {
    let backend: Arc<dyn clerk_core::store::backend::ClientBackend> = Arc::new(InMemoryBackend::default());
    let cache = Arc::new(clerk_core::store::cache::MokaMaintenanceCache::new(10));
    let store = ClientStore::new(backend.clone(), backend, cache);
    let flow_store = InMemoryFlowStore::default();

    let instance_id = TypedId::new("ins_1");
    flow_store.create_user(fresh_user("user_1", "ins_1", "hunter2")).await.unwrap();
    flow_store
        .create_identification(fresh_identification("idn_1", "ins_1", "user_1", "alice@example.com"))
        .await
        .unwrap();

    let cookie_codec = CookieCodec::new(EncodingKey::from_secret(b"test-secret"), DecodingKey::from_secret(b"test-secret"), Algorithm::HS256, 3600);
    let converter = SessionConverter {
        store: &store,
        flow_store: &flow_store,
        cookie_codec: &cookie_codec,
        session_lifetime: Duration::days(7),
        session_abandon: Duration::days(30),
    };
    let machine = SignInMachine {
        store: &store,
        flow_store: &flow_store,
        password_verifier: &FakePasswordVerifier,
        code_delivery: &NullCodeDelivery,
        identifier_policy: &NullIdentifierPolicy,
        converter,
        sign_in_ttl: Duration::minutes(10),
        verification_ttl: Duration::minutes(10),
        max_attempts: 5,
    };

    let err = machine
        .create(
            &StoreContext::default(),
            CreateSignInRequest {
                instance_id,
                client: None,
                identifier: Some("alice@example.com".into()),
                strategy: Some(Strategy::Password),
                password: Some("wrong-password".into()),
                proof: None,
                transfer: false,
                single_session_mode: false,
                actor_token_id: None,
                origin: None,
            },
        )
        .await
        .unwrap_err();

    assert!(matches!(err, clerk_core::error::CoreError::InvalidPassword));
}
