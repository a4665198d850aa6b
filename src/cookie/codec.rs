use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::domain::{Client, DevBrowser, TypedId};
use crate::error::CoreError;
use crate::store::{ClientStore, StoreContext};

/// Claims carried by the signed `__client` cookie.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookieClaims {
    /// Client id.
    pub id: Option<String>,
    pub rotating_token: Option<String>,
    pub dev: Option<String>,
    pub iat: i64,
    pub exp: i64,
}

/// Whether the request environment requires the production claim subset
/// (`{id, rotating_token}`) or accepts the looser development subset
/// (that pair OR a non-empty `dev` claim).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Environment {
    Production,
    Development,
}

/// Produces and verifies the signed auth cookie, and resolves the Client it
/// identifies (spec §4.1), generalizing the teacher's `auth_session.rs`
/// signed-cookie-jar pattern from an opaque session blob to a JWT carrying
/// `{client_id, rotating_token, dev_browser_id?}`.
pub struct CookieCodec {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    algorithm: Algorithm,
    lifetime_secs: i64,
}

impl CookieCodec {
    pub fn new(encoding_key: EncodingKey, decoding_key: DecodingKey, algorithm: Algorithm, lifetime_secs: i64) -> Self {
        Self {
            encoding_key,
            decoding_key,
            algorithm,
            lifetime_secs,
        }
    }

    pub fn encode(&self, client_id: &TypedId, rotating_token: &str, dev_browser_id: Option<&TypedId>) -> Result<String, CoreError> {
        let now = Utc::now().timestamp();
        let claims = CookieClaims {
            id: Some(client_id.to_string()),
            rotating_token: Some(rotating_token.to_owned()),
            dev: dev_browser_id.map(TypedId::to_string),
            iat: now,
            exp: now + self.lifetime_secs,
        };
        encode(&Header::new(self.algorithm), &claims, &self.encoding_key).map_err(|e| CoreError::Unexpected(e.to_string()))
    }

    pub fn decode(&self, token: &str, environment: Environment) -> Result<CookieClaims, CoreError> {
        let mut validation = Validation::new(self.algorithm);
        validation.validate_exp = true;
        let data = decode::<CookieClaims>(token, &self.decoding_key, &validation).map_err(|_| CoreError::InvalidCookie)?;
        let claims = data.claims;

        let has_prod_pair = claims.id.is_some() && claims.rotating_token.is_some();
        let has_dev_claim = claims.dev.as_deref().is_some_and(|d| !d.is_empty());

        let satisfied = match environment {
            Environment::Production => has_prod_pair,
            Environment::Development => has_prod_pair || has_dev_claim,
        };

        if !satisfied {
            return Err(CoreError::MissingClaims);
        }

        Ok(claims)
    }

    /// Generates a fresh random rotating token (spec §4.1 "Rotation").
    pub fn new_rotating_token() -> String {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        hex::encode(bytes)
    }
}

/// Resolves the `Client` identified by a decoded cookie (spec §4.1, steps
/// 1-3): dev-browser back-reference, rotating-token match, or one-shot
/// nonce consumption.
pub struct ClientResolver<'a> {
    pub store: &'a ClientStore,
}

impl<'a> ClientResolver<'a> {
    pub async fn resolve(
        &self,
        ctx: &StoreContext,
        instance_id: &TypedId,
        claims: &CookieClaims,
        dev_browser_lookup: Option<&(dyn Fn(&TypedId) -> Option<DevBrowser> + Send + Sync)>,
        request_nonce: Option<&str>,
    ) -> Result<Client, CoreError> {
        if let Some(dev_id) = &claims.dev {
            let dev_id = TypedId::new(dev_id.clone());
            let dev_browser = dev_browser_lookup
                .and_then(|lookup| lookup(&dev_id))
                .ok_or(CoreError::ClientNotFoundInRequest)?;
            let client_id = dev_browser.client_id.ok_or(CoreError::ClientNotFoundInRequest)?;
            let client = self
                .store
                .find_client(ctx, instance_id, &client_id)
                .await
                .map_err(CoreError::from)?
                .ok_or(CoreError::ClientNotFoundInRequest)?;
            return Ok(client);
        }

        let client_id = claims.id.as_ref().ok_or(CoreError::MissingClaims)?;
        let client_id = TypedId::new(client_id.clone());

        if let Some(nonce) = request_nonce {
            if let Some(mut client) = self.store.find_client(ctx, instance_id, &client_id).await.map_err(CoreError::from)? {
                if client.rotating_token_nonce.as_deref() == Some(nonce) {
                    client.rotating_token_nonce = None;
                    let client = self.store.update_client(ctx, client).await.map_err(CoreError::from)?;
                    return Ok(client);
                }
            }
        }

        let client = self
            .store
            .find_client(ctx, instance_id, &client_id)
            .await
            .map_err(CoreError::from)?
            .ok_or(CoreError::ClientNotFoundInRequest)?;

        let rotating_token = claims.rotating_token.as_ref().ok_or(CoreError::MissingClaims)?;
        if &client.rotating_token != rotating_token {
            return Err(CoreError::InvalidRotatingToken);
        }

        Ok(client)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn codec() -> CookieCodec {
        CookieCodec::new(
            EncodingKey::from_secret(b"test-secret"),
            DecodingKey::from_secret(b"test-secret"),
            Algorithm::HS256,
            3600,
        )
    }

    #[test]
    fn round_trip_preserves_client_and_token() {
        let codec = codec();
        let client_id = TypedId::new("client_abc");
        let token = codec.encode(&client_id, "rot-token", None).unwrap();
        let claims = codec.decode(&token, Environment::Production).unwrap();
        assert_eq!(claims.id.as_deref(), Some("client_abc"));
        assert_eq!(claims.rotating_token.as_deref(), Some("rot-token"));
        assert_eq!(claims.dev, None);
    }

    #[test]
    fn production_rejects_dev_only_claims() {
        let codec = codec();
        let now = Utc::now().timestamp();
        let claims = CookieClaims {
            id: None,
            rotating_token: None,
            dev: Some("dev_1".into()),
            iat: now,
            exp: now + 60,
        };
        let token = encode(&Header::new(Algorithm::HS256), &claims, &codec.encoding_key).unwrap();
        assert!(matches!(codec.decode(&token, Environment::Production), Err(CoreError::MissingClaims)));
        assert!(codec.decode(&token, Environment::Development).is_ok());
    }

    #[test]
    fn tampered_signature_is_rejected() {
        let codec = codec();
        let token = codec.encode(&TypedId::new("client_abc"), "rot", None).unwrap();
        let mut tampered = token.clone();
        tampered.push('x');
        assert!(matches!(codec.decode(&tampered, Environment::Production), Err(CoreError::InvalidCookie)));
    }

    #[test]
    fn rotating_tokens_are_unique() {
        let a = CookieCodec::new_rotating_token();
        let b = CookieCodec::new_rotating_token();
        assert_ne!(a, b);
    }
}
