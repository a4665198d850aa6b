use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::TypedId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentificationType {
    EmailAddress,
    PhoneNumber,
    Web3Wallet,
    OauthProvider,
    Saml,
    Passkey,
    Username,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IdentificationStatus {
    NotSet,
    Reserved,
    Verified,
    Transferable,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Tristate {
    Unknown,
    Required,
    NotRequired,
}

/// A typed credential/alias attached to a User.
///
/// An external-account identification points via `target_identification_id`
/// to the email identification it authoritatively represents (e.g. the email
/// claimed by a verified OAuth account).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Identification {
    pub id: TypedId,
    pub instance_id: TypedId,
    pub user_id: Option<TypedId>,
    pub kind: IdentificationType,
    pub identifier: Option<String>,
    pub status: IdentificationStatus,
    pub verification_id: Option<TypedId>,
    pub target_identification_id: Option<TypedId>,
    pub requires_verification: Tristate,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Identification {
    pub fn is_verified(&self) -> bool {
        self.status == IdentificationStatus::Verified
    }

    pub fn is_reserved(&self) -> bool {
        self.status == IdentificationStatus::Reserved
    }
}
