use jsonwebtoken::{Algorithm, EncodingKey};
use serde_json::{Map, Value};

use crate::domain::{JwtTemplate, Session};
use crate::error::CoreError;

use super::shortcodes::TemplateContext;
use super::templater::TokenTemplater;

/// Assembles the inputs a session token needs (issuer, authorized party,
/// actor claim) and hands them to [`TokenTemplater`] (spec §4.5).
pub struct SessionTokenService;

impl SessionTokenService {
    /// Issues a session token. `template` is `None` for the default
    /// (un-templated) session token and `Some` for a named JWT template
    /// (`/v1/client/sessions/:id/tokens/:template`).
    #[allow(clippy::too_many_arguments)]
    pub fn issue(
        session: &Session,
        ctx: &TemplateContext,
        template: Option<&JwtTemplate>,
        issuer: &str,
        origin: Option<&str>,
        default_lifetime_secs: i64,
        key: &EncodingKey,
        algorithm: Algorithm,
        kid: Option<&str>,
    ) -> Result<String, CoreError> {
        let default_template;
        let template = match template {
            Some(t) => t,
            None => {
                default_template = JwtTemplate {
                    id: session.id.clone(),
                    instance_id: session.instance_id.clone(),
                    name: "__default__".into(),
                    claims: Value::Object(Map::new()),
                    lifetime_seconds: default_lifetime_secs,
                    clock_skew_seconds: 0,
                    signing_key: None,
                    signing_algorithm: None,
                };
                &default_template
            }
        };

        let mut claims = TokenTemplater::execute(template, ctx, issuer, origin)?;
        claims.insert("sid".into(), Value::String(session.id.to_string()));

        if let Some(actor) = &session.actor {
            claims.insert("act".into(), actor.clone());
        }
        if let Some(org_id) = &session.active_organization_id {
            claims.insert("org_id".into(), Value::String(org_id.to_string()));
        }

        TokenTemplater::sign(&claims, key, algorithm, kid)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::domain::{SessionStatus, TypedId};
    use chrono::Utc;
    use jsonwebtoken::{decode, DecodingKey, Validation};
    use serde_json::json;

    fn session() -> Session {
        let now = Utc::now();
        Session {
            id: TypedId::new("sess_1"),
            instance_id: TypedId::new("ins_1"),
            client_id: TypedId::new("client_1"),
            user_id: TypedId::new("user_1"),
            replacement_session_id: None,
            status: SessionStatus::Active,
            expire_at: now + chrono::Duration::days(7),
            abandon_at: now + chrono::Duration::days(30),
            touched_at: now,
            session_inactivity_timeout: None,
            active_organization_id: None,
            actor: None,
            last_touched_signaled_at: None,
            last_token_issued_at: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn default_token_carries_sub_and_sid() {
        let session = session();
        let ctx = TemplateContext::default();
        let key = EncodingKey::from_secret(b"secret");
        let token = SessionTokenService::issue(&session, &ctx, None, "https://clerk.example", None, 60, &key, Algorithm::HS256, None).unwrap();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        let decoded = decode::<Value>(&token, &DecodingKey::from_secret(b"secret"), &validation).unwrap();
        assert_eq!(decoded.claims.get("sid"), Some(&json!("sess_1")));
    }

    #[test]
    fn impersonation_actor_is_carried_into_act_claim() {
        let mut session = session();
        session.actor = Some(json!({"sub": "user_admin"}));
        let ctx = TemplateContext::default();
        let key = EncodingKey::from_secret(b"secret");
        let token = SessionTokenService::issue(&session, &ctx, None, "https://clerk.example", None, 60, &key, Algorithm::HS256, None).unwrap();

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        let decoded = decode::<Value>(&token, &DecodingKey::from_secret(b"secret"), &validation).unwrap();
        assert_eq!(decoded.claims.get("act"), Some(&json!({"sub": "user_admin"})));
    }
}
