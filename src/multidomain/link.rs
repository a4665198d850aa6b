use jsonwebtoken::{decode, Algorithm, DecodingKey, Validation};

use crate::cookie::codec::CookieCodec;
use crate::domain::{Client, TypedId};
use crate::error::CoreError;
use crate::store::{ClientStore, FlowStore, StoreContext};

use super::sync::LinkTokenClaims;

/// Outcome of consuming a satellite `/client/link` request: the resolved
/// Client plus a freshly rotated cookie for the satellite host.
pub struct LinkOutcome {
    pub client: Client,
    pub cookie: String,
    pub redirect_url: String,
}

/// Parses and verifies the link-token JWT, loads the referenced
/// `SyncNonce`, enforces single-use, loads the Client, and re-issues the
/// `__client` cookie for the satellite host (spec §4.8 third bullet).
pub async fn consume_link_token(
    store: &ClientStore,
    flow_store: &dyn FlowStore,
    cookie_codec: &CookieCodec,
    ctx: &StoreContext,
    instance_id: &TypedId,
    link_token: &str,
    decoding_key: &DecodingKey,
    algorithm: Algorithm,
) -> Result<LinkOutcome, CoreError> {
    let validation = Validation::new(algorithm);
    let claims = decode::<LinkTokenClaims>(link_token, decoding_key, &validation).map_err(|_| CoreError::InvalidHandshake)?.claims;

    let mut nonce = flow_store
        .find_sync_nonce(instance_id, &claims.sync_nonce)
        .await?
        .ok_or(CoreError::InvalidHandshake)?;

    if nonce.consumed {
        return Err(CoreError::SyncNonceAlreadyConsumed);
    }

    nonce.consumed = true;
    let nonce = flow_store.update_sync_nonce(nonce).await?;

    let mut client = store
        .find_client(ctx, instance_id, &nonce.client_id)
        .await?
        .ok_or(CoreError::ClientNotFoundInRequest)?;

    client.rotating_token = CookieCodec::new_rotating_token();
    client.touch();
    let cookie = cookie_codec.encode(&client.id, &client.rotating_token, None)?;
    client.cookie_value = cookie.clone();
    let client = store.update_client(ctx, client).await?;

    Ok(LinkOutcome {
        client,
        cookie,
        redirect_url: nonce.redirect_url,
    })
}
