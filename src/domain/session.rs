use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ids::TypedId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    PendingActivation,
    Active,
    Ended,
    Removed,
    Replaced,
    Abandoned,
    Expired,
}

impl SessionStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, SessionStatus::PendingActivation | SessionStatus::Active)
    }
}

/// A user's authenticated presence on a Client.
///
/// Invariant: at most one active session per (client, user) unless
/// multi-session mode is enabled. When an impersonated session exists on a
/// Client, no additional sessions may be created on it.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub id: TypedId,
    pub instance_id: TypedId,
    pub client_id: TypedId,
    pub user_id: TypedId,

    /// Forms a linked chain when a new session supersedes an old one.
    pub replacement_session_id: Option<TypedId>,

    pub status: SessionStatus,
    pub expire_at: DateTime<Utc>,
    pub abandon_at: DateTime<Utc>,
    pub touched_at: DateTime<Utc>,
    pub session_inactivity_timeout: Option<i64>,

    pub active_organization_id: Option<TypedId>,

    /// Impersonation metadata; presence of this field is what makes a
    /// session an "impersonation session" (see §4.6.1 step 3 and the
    /// "impersonation vs multi-session" design note).
    pub actor: Option<Value>,

    pub last_touched_signaled_at: Option<DateTime<Utc>>,
    pub last_token_issued_at: Option<DateTime<Utc>>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    pub fn is_impersonation(&self) -> bool {
        self.actor.is_some()
    }

    pub fn is_active(&self) -> bool {
        self.status == SessionStatus::Active
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expire_at
    }
}
