use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ids::TypedId;

/// The account a Session, Identification, or SignIn ultimately resolves to.
///
/// Password comparison and storage-at-rest are delegated to an external
/// password service (see [`crate::sign_in::strategies::PasswordVerifier`]);
/// `password_digest` here is the opaque value that service produced.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct User {
    pub id: TypedId,
    pub instance_id: TypedId,
    pub password_digest: Option<String>,
    pub password_enabled: bool,
    pub two_factor_enabled: bool,
    pub totp_enabled: bool,
    pub backup_code_enabled: bool,
    pub primary_email_identification_id: Option<TypedId>,
    pub primary_phone_identification_id: Option<TypedId>,
    pub primary_web3_wallet_identification_id: Option<TypedId>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub username: Option<String>,
    pub image_url: Option<String>,
    pub locked_until: Option<DateTime<Utc>>,
    pub failed_verification_attempts: u32,
    pub public_metadata: Value,
    pub private_metadata: Value,
    pub unsafe_metadata: Value,
    pub external_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    pub fn is_locked(&self, now: DateTime<Utc>) -> bool {
        self.locked_until.is_some_and(|until| until > now)
    }

    pub fn full_name(&self) -> Option<String> {
        match (&self.first_name, &self.last_name) {
            (None, None) => None,
            _ => {
                let joined = [self.first_name.as_deref(), self.last_name.as_deref()]
                    .into_iter()
                    .flatten()
                    .collect::<Vec<_>>()
                    .join(" ");
                if joined.is_empty() {
                    None
                } else {
                    Some(joined)
                }
            }
        }
    }
}
