use chrono::{Duration, Utc};

use crate::domain::verification::{Strategy, Verification, VerificationStatus};
use crate::domain::{SignUp, TypedId};
use crate::error::CoreError;
use crate::sign_in::{new_numeric_code, CodeDelivery};
use crate::store::FlowStore;

fn new_id(prefix: &str) -> TypedId {
    use rand::RngCore;
    let mut bytes = [0u8; 12];
    rand::thread_rng().fill_bytes(&mut bytes);
    TypedId::new(format!("{prefix}_{}", hex::encode(bytes)))
}

/// Creates a Verification for `strategy` and attaches it to the matching
/// `SignUp` field: OAuth/SAML strategies write `external_account_verification_id`,
/// others write onto the identifier-specific field (spec §4.7 "Strategy
/// dispatch").
pub async fn prepare(
    flow_store: &dyn FlowStore,
    code_delivery: &dyn CodeDelivery,
    instance_id: &TypedId,
    mut sign_up: SignUp,
    strategy: Strategy,
    verification_ttl: Duration,
    max_attempts: u32,
) -> Result<SignUp, CoreError> {
    let nonce = match strategy {
        Strategy::EmailCode | Strategy::PhoneCode => Some(new_numeric_code()),
        _ => None,
    };

    if let Some(code) = &nonce {
        let target = match strategy {
            Strategy::EmailCode => sign_up.email_address.as_deref(),
            Strategy::PhoneCode => sign_up.phone_number.as_deref(),
            _ => None,
        };
        if let Some(identifier) = target {
            code_delivery.send(identifier, code).await?;
        }
    }

    let verification = Verification {
        id: new_id("ver"),
        instance_id: instance_id.clone(),
        identification_id: None,
        strategy,
        status: VerificationStatus::Unverified,
        attempts: 0,
        max_attempts,
        expire_at: Utc::now() + verification_ttl,
        nonce,
        external_account_transfer_id: None,
        token: None,
        error: None,
        verified_at_client: Some(sign_up.client_id.clone()),
        created_at: Utc::now(),
        updated_at: Utc::now(),
    };
    let verification = flow_store.create_verification(verification).await?;

    match strategy {
        Strategy::OauthCallback | Strategy::Saml => sign_up.external_account_verification_id = Some(verification.id),
        Strategy::EmailCode | Strategy::EmailLink => sign_up.email_address_verification_id = Some(verification.id),
        Strategy::PhoneCode => sign_up.phone_number_verification_id = Some(verification.id),
        Strategy::Web3Signature => sign_up.web3_wallet_verification_id = Some(verification.id),
        _ => {}
    }

    Ok(flow_store.update_sign_up(sign_up).await?)
}

/// Attempts the pending verification for `strategy`, consuming its code or
/// signature proof.
pub async fn attempt(flow_store: &dyn FlowStore, instance_id: &TypedId, sign_up: SignUp, strategy: Strategy, proof: &str) -> Result<SignUp, CoreError> {
    let verification_id = match strategy {
        Strategy::EmailCode | Strategy::EmailLink => sign_up.email_address_verification_id.clone(),
        Strategy::PhoneCode => sign_up.phone_number_verification_id.clone(),
        Strategy::Web3Signature => sign_up.web3_wallet_verification_id.clone(),
        Strategy::OauthCallback | Strategy::Saml => sign_up.external_account_verification_id.clone(),
        _ => None,
    };

    let Some(verification_id) = verification_id else {
        return Ok(sign_up);
    };
    let mut verification = flow_store.find_verification(instance_id, &verification_id).await?.ok_or(CoreError::SignUpNotFound)?;

    let matches = verification.nonce.as_deref().map(|n| n == proof).unwrap_or(!proof.is_empty());
    if matches {
        verification.record_success();
    } else {
        verification.record_failure("verification did not match");
    }
    flow_store.update_verification(verification).await?;

    if !matches {
        return Err(CoreError::FormInvalidParameterValue("code".into()));
    }
    Ok(sign_up)
}
