use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::TypedId;
use super::verification::Strategy;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignInStatus {
    NeedsIdentifier,
    NeedsFirstFactor,
    NeedsSecondFactor,
    NeedsNewPassword,
    Complete,
    Abandoned,
}

/// Ephemeral per-flow record owned by a Client, scoped to an Instance.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SignIn {
    pub id: TypedId,
    pub instance_id: TypedId,
    pub client_id: TypedId,

    pub identification_id: Option<TypedId>,
    pub identifier_strategy: Option<Strategy>,
    pub saml_connection_id: Option<TypedId>,

    pub first_factor_current_verification_id: Option<TypedId>,
    pub first_factor_success_verification_id: Option<TypedId>,
    pub second_factor_current_verification_id: Option<TypedId>,
    pub second_factor_success_verification_id: Option<TypedId>,

    pub new_password_digest: Option<String>,
    pub sign_out_of_other_sessions: bool,

    pub actor_token_id: Option<TypedId>,
    pub organization_invitation_id: Option<TypedId>,
    pub external_account_identification_id: Option<TypedId>,
    pub successful_saml_identification_id: Option<TypedId>,
    pub to_link_identification_id: Option<TypedId>,

    pub created_session_id: Option<TypedId>,

    pub abandon_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SignIn {
    pub fn new(id: TypedId, instance_id: TypedId, client_id: TypedId, medium_short_ttl: chrono::Duration) -> Self {
        let now = Utc::now();
        Self {
            id,
            instance_id,
            client_id,
            identification_id: None,
            identifier_strategy: None,
            saml_connection_id: None,
            first_factor_current_verification_id: None,
            first_factor_success_verification_id: None,
            second_factor_current_verification_id: None,
            second_factor_success_verification_id: None,
            new_password_digest: None,
            sign_out_of_other_sessions: false,
            actor_token_id: None,
            organization_invitation_id: None,
            external_account_identification_id: None,
            successful_saml_identification_id: None,
            to_link_identification_id: None,
            created_session_id: None,
            abandon_at: now + medium_short_ttl,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn is_abandoned(&self, now: DateTime<Utc>) -> bool {
        now > self.abandon_at
    }

    pub fn has_first_factor_success(&self) -> bool {
        self.first_factor_success_verification_id.is_some()
    }
}
