use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::TypedId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VerificationStatus {
    Unverified,
    Verified,
    Expired,
    Failed,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Strategy {
    Password,
    EmailCode,
    EmailLink,
    PhoneCode,
    ResetPasswordEmailCode,
    ResetPasswordPhoneCode,
    Web3Signature,
    OauthCallback,
    Passkey,
    Ticket,
    Totp,
    BackupCode,
    Saml,
}

impl Strategy {
    /// Preparable strategies create a Verification via `Prepare` and wait
    /// for the client to call `Attempt`. Attemptable strategies go straight
    /// to `Attempt` and verify in the same round trip.
    pub fn is_preparable(self) -> bool {
        matches!(
            self,
            Strategy::EmailCode
                | Strategy::EmailLink
                | Strategy::PhoneCode
                | Strategy::ResetPasswordEmailCode
                | Strategy::ResetPasswordPhoneCode
                | Strategy::OauthCallback
                | Strategy::Passkey
                | Strategy::Saml
        )
    }

    pub fn is_attemptable(self) -> bool {
        matches!(
            self,
            Strategy::Password
                | Strategy::EmailCode
                | Strategy::PhoneCode
                | Strategy::ResetPasswordEmailCode
                | Strategy::ResetPasswordPhoneCode
                | Strategy::Web3Signature
                | Strategy::Ticket
                | Strategy::Totp
                | Strategy::BackupCode
                | Strategy::Passkey
        )
    }
}

/// A single strategy attempt, with counters and outcome.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Verification {
    pub id: TypedId,
    pub instance_id: TypedId,
    pub identification_id: Option<TypedId>,
    pub strategy: Strategy,
    pub status: VerificationStatus,
    pub attempts: u32,
    pub max_attempts: u32,
    pub expire_at: DateTime<Utc>,
    pub nonce: Option<String>,
    pub external_account_transfer_id: Option<TypedId>,
    pub token: Option<String>,
    pub error: Option<String>,
    /// Client the verification was created on; cleared (set to `None`) when
    /// that Client is deleted, per the CascadeDeleter's weak-link rule.
    pub verified_at_client: Option<TypedId>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Verification {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expire_at
    }

    pub fn record_failure(&mut self, error: impl Into<String>) {
        self.attempts += 1;
        self.error = Some(error.into());
        if self.attempts >= self.max_attempts {
            self.status = VerificationStatus::Failed;
        }
    }

    pub fn record_success(&mut self) {
        self.attempts += 1;
        self.status = VerificationStatus::Verified;
        self.error = None;
    }
}
