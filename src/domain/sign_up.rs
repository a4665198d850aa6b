use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::TypedId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignUpStatus {
    MissingRequirements,
    Complete,
    Abandoned,
}

/// Ephemeral per-flow record driving progressive attribute collection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignUp {
    pub id: TypedId,
    pub instance_id: TypedId,
    pub client_id: TypedId,

    pub email_address: Option<String>,
    pub phone_number: Option<String>,
    pub username: Option<String>,
    pub web3_wallet: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub password_digest: Option<String>,

    pub email_address_verification_id: Option<TypedId>,
    pub phone_number_verification_id: Option<TypedId>,
    pub web3_wallet_verification_id: Option<TypedId>,
    pub external_account_verification_id: Option<TypedId>,

    pub captcha_token: Option<String>,
    pub captcha_widget_token: Option<String>,
    pub captcha_error: Option<String>,

    pub external_account_identification_id: Option<TypedId>,
    pub successful_saml_identification_id: Option<TypedId>,

    pub created_user_id: Option<TypedId>,
    pub created_session_id: Option<TypedId>,

    pub abandon_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SignUp {
    pub fn new(id: TypedId, instance_id: TypedId, client_id: TypedId, medium_short_ttl: chrono::Duration) -> Self {
        let now = Utc::now();
        Self {
            id,
            instance_id,
            client_id,
            email_address: None,
            phone_number: None,
            username: None,
            web3_wallet: None,
            first_name: None,
            last_name: None,
            password_digest: None,
            email_address_verification_id: None,
            phone_number_verification_id: None,
            web3_wallet_verification_id: None,
            external_account_verification_id: None,
            captcha_token: None,
            captcha_widget_token: None,
            captcha_error: None,
            external_account_identification_id: None,
            successful_saml_identification_id: None,
            created_user_id: None,
            created_session_id: None,
            abandon_at: now + medium_short_ttl,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_abandoned(&self, now: DateTime<Utc>) -> bool {
        now > self.abandon_at
    }
}

/// Which progressive attribute a `SignUp` field maps to, used by
/// `crate::sign_up::attributes` to dispatch `AddToSignUp`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignUpAttribute {
    EmailAddress,
    PhoneNumber,
    EmailAddressOrPhoneNumber,
    Username,
    Web3Wallet,
    Password,
    FirstName,
    LastName,
}
