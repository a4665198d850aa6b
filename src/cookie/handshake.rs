use chrono::Utc;
use jsonwebtoken::{encode, EncodingKey, Header};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::CoreError;

use super::names::{HANDSHAKE_EXTRA_LEEWAY_SECS, HANDSHAKE_PAYLOAD_WARN_BYTES};

/// The set of `Set-Cookie` directives shipped in one handshake exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HandshakePayload {
    pub handshake: Vec<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct HandshakeClaims {
    handshake: Vec<String>,
    iat: i64,
    exp: i64,
}

/// Where the signed handshake payload should be delivered.
#[derive(Debug, Clone)]
pub enum HandshakeDelivery {
    /// Production: a 4 kB-capped cookie.
    Cookie(String),
    /// Development: a URL query parameter value.
    QueryParam(String),
}

/// Builds and signs the handshake payload (spec §4.1 "Handshake").
pub struct HandshakeBuilder {
    encoding_key: EncodingKey,
    algorithm: jsonwebtoken::Algorithm,
}

impl HandshakeBuilder {
    pub fn new(encoding_key: EncodingKey, algorithm: jsonwebtoken::Algorithm) -> Self {
        Self { encoding_key, algorithm }
    }

    /// Builds the `Set-Cookie` directive list described in spec §4.1: a
    /// clear of the previous `client_uat`, a freshly computed one, a
    /// `__session` cookie (or clear), and, in development, a dev-browser
    /// cookie.
    pub fn build_set_cookie_directives(
        &self,
        client_uat_clear: String,
        client_uat_fresh: String,
        session_cookie: Option<String>,
        session_cookie_clear: String,
        dev_browser_cookie: Option<String>,
    ) -> Vec<String> {
        let mut directives = vec![client_uat_clear, client_uat_fresh];
        directives.push(session_cookie.unwrap_or(session_cookie_clear));
        if let Some(dev) = dev_browser_cookie {
            directives.push(dev);
        }
        directives
    }

    /// Signs the handshake payload as a short-lived JWT and chooses cookie
    /// vs. query-param delivery based on environment; warns if the payload
    /// exceeds 4 kB (still emitted either way, per spec §4.1 scenario 6).
    pub fn sign_and_deliver(
        &self,
        directives: Vec<String>,
        session_jwt_lifetime_secs: i64,
        production: bool,
    ) -> Result<HandshakeDelivery, CoreError> {
        let now = Utc::now().timestamp();
        let lifetime = session_jwt_lifetime_secs + HANDSHAKE_EXTRA_LEEWAY_SECS;
        let claims = HandshakeClaims {
            handshake: directives,
            iat: now,
            exp: now + lifetime,
        };

        let token = encode(&Header::new(self.algorithm), &claims, &self.encoding_key)
            .map_err(|e| CoreError::Unexpected(e.to_string()))?;

        let byte_len = token.as_bytes().len();
        if byte_len > HANDSHAKE_PAYLOAD_WARN_BYTES {
            warn!(
                tag = "handshake_payload_too_big",
                bytes = byte_len,
                "handshake payload exceeds 4096 bytes"
            );
        }

        Ok(if production {
            HandshakeDelivery::Cookie(token)
        } else {
            HandshakeDelivery::QueryParam(token)
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn builder() -> HandshakeBuilder {
        HandshakeBuilder::new(EncodingKey::from_secret(b"hs-secret"), jsonwebtoken::Algorithm::HS256)
    }

    #[test]
    fn oversized_payload_still_emits_but_is_flagged() {
        let builder = builder();
        let huge_directive = "x".repeat(5000);
        let directives = vec![huge_directive];
        let delivery = builder.sign_and_deliver(directives, 60, true).unwrap();
        match delivery {
            HandshakeDelivery::Cookie(token) => assert!(token.as_bytes().len() > HANDSHAKE_PAYLOAD_WARN_BYTES),
            HandshakeDelivery::QueryParam(_) => panic!("production should deliver via cookie"),
        }
    }

    #[test]
    fn development_delivers_via_query_param() {
        let builder = builder();
        let delivery = builder.sign_and_deliver(vec!["a=b".into()], 60, false).unwrap();
        assert!(matches!(delivery, HandshakeDelivery::QueryParam(_)));
    }
}
