use chrono::{Duration, Utc};
use jsonwebtoken::{encode, Algorithm, EncodingKey, Header};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use url::Url;

use crate::domain::{Client, SyncNonce, TypedId};
use crate::error::CoreError;
use crate::store::FlowStore;

const SYNC_NONCE_TTL_MINUTES: i64 = 60;
const LINK_TOKEN_LIFETIME_SECS: i64 = 120;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkTokenClaims {
    pub sync_nonce: String,
    pub redirect_url: String,
    pub iat: i64,
    pub exp: i64,
}

/// Builds the satellite-side redirect to the Primary Domain's `/client/sync`
/// (spec §4.8 first bullet): sync is always mediated through the Primary.
pub fn build_satellite_redirect(primary_fapi_host: &str, link_domain: &str, redirect_url: &str) -> Result<Url, CoreError> {
    let mut url = Url::parse(&format!("https://{primary_fapi_host}/client/sync"))
        .map_err(|e| CoreError::Unexpected(e.to_string()))?;
    url.query_pairs_mut()
        .append_pair("redirect_url", redirect_url)
        .append_pair("link_domain", link_domain);
    Ok(url)
}

/// Appends `__clerk_synced=true` to a raw redirect URL, used on the Primary
/// when no Client is present for the sync request (spec §4.8 second bullet).
pub fn append_synced_marker(redirect_url: &str) -> Result<Url, CoreError> {
    let mut url = Url::parse(redirect_url).map_err(|_| CoreError::FormInvalidParameterValue("redirect_url".into()))?;
    url.query_pairs_mut().append_pair("__clerk_synced", "true");
    Ok(url)
}

/// Generates a random nonce suffixed with a monotonic counter to guard
/// against collisions under concurrent creation (spec §4.8 "a random token
/// suffixed with a monotonic identifier for collision safety").
pub fn new_sync_nonce_value(monotonic_suffix: u64) -> String {
    let mut bytes = [0u8; 16];
    rand::thread_rng().fill_bytes(&mut bytes);
    format!("{}-{monotonic_suffix}", hex::encode(bytes))
}

/// Creates and persists a `SyncNonce`, then mints the short-lived
/// `{sync_nonce, redirect_url}` link-token JWT that gets embedded in the
/// satellite redirect's `__clerk_token` parameter.
pub async fn create_sync_nonce_and_link_token(
    flow_store: &dyn FlowStore,
    instance_id: &TypedId,
    client: &Client,
    redirect_url: &str,
    monotonic_suffix: u64,
    signing_key: &EncodingKey,
    algorithm: Algorithm,
) -> Result<(SyncNonce, String), CoreError> {
    let now = Utc::now();
    let nonce = SyncNonce {
        nonce: new_sync_nonce_value(monotonic_suffix),
        instance_id: instance_id.clone(),
        client_id: client.id.clone(),
        redirect_url: redirect_url.to_owned(),
        consumed: false,
        expire_at: now + Duration::minutes(SYNC_NONCE_TTL_MINUTES),
        created_at: now,
    };
    let nonce = flow_store.create_sync_nonce(nonce).await?;

    let claims = LinkTokenClaims {
        sync_nonce: nonce.nonce.clone(),
        redirect_url: nonce.redirect_url.clone(),
        iat: now.timestamp(),
        exp: now.timestamp() + LINK_TOKEN_LIFETIME_SECS,
    };
    let token = encode(&Header::new(algorithm), &claims, signing_key).map_err(|e| CoreError::Unexpected(e.to_string()))?;

    Ok((nonce, token))
}

/// Builds the `/client/link` redirect URL on the satellite host.
pub fn build_link_redirect(satellite_fapi_host: &str, link_token: &str) -> Result<Url, CoreError> {
    let mut url = Url::parse(&format!("https://{satellite_fapi_host}/client/link")).map_err(|e| CoreError::Unexpected(e.to_string()))?;
    url.query_pairs_mut().append_pair("__clerk_token", link_token);
    Ok(url)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn satellite_redirect_carries_link_domain_and_target() {
        let url = build_satellite_redirect("primary.example.com", "satellite.example.com", "https://satellite.example.com/after").unwrap();
        assert_eq!(url.host_str(), Some("primary.example.com"));
        assert!(url.query().unwrap().contains("link_domain=satellite.example.com"));
    }

    #[test]
    fn synced_marker_is_appended() {
        let url = append_synced_marker("https://app.example.com/after").unwrap();
        assert!(url.query().unwrap().contains("__clerk_synced=true"));
    }

    #[test]
    fn nonce_value_carries_monotonic_suffix() {
        let value = new_sync_nonce_value(42);
        assert!(value.ends_with("-42"));
    }
}
