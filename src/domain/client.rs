use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::TypedId;

/// The server-side representation of a browser-or-device identity.
///
/// A Client always has at most one "current" [`crate::domain::sign_in::SignIn`]
/// and one "current" [`crate::domain::sign_up::SignUp`]; both are cleared when
/// consumed (converted into a session, abandoned, or transferred away).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Client {
    pub id: TypedId,
    pub instance_id: TypedId,

    /// Long-lived random secret rotated on every authoritative state change.
    pub rotating_token: String,
    /// The signed cookie value embedding `id` + `rotating_token` (+ optional
    /// dev-browser id). Kept in sync with `rotating_token` by the
    /// [`crate::cookie::codec::CookieCodec`] on every rotation.
    pub cookie_value: String,

    /// One-shot grace value letting a native app reconcile a single stale
    /// cookie after a server-side rotation it did not observe.
    pub rotating_token_nonce: Option<String>,

    pub sign_in_id: Option<TypedId>,
    pub sign_up_id: Option<TypedId>,

    /// Set when a SignIn classified this Client's flow as belonging to an
    /// account that must instead go through SignUp (or vice versa).
    pub to_sign_in_account_transfer_id: Option<TypedId>,
    pub to_sign_up_account_transfer_id: Option<TypedId>,

    /// When true, the next authoritative change must not rotate this
    /// Client's cookie; instead the flag is cleared by the originating
    /// device's next request. See `crate::cookie::codec` rotation docs.
    pub postpone_cookie_update: bool,

    pub ended: bool,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Client {
    pub fn new(id: TypedId, instance_id: TypedId, rotating_token: String, cookie_value: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            instance_id,
            rotating_token,
            cookie_value,
            rotating_token_nonce: None,
            sign_in_id: None,
            sign_up_id: None,
            to_sign_in_account_transfer_id: None,
            to_sign_up_account_transfer_id: None,
            postpone_cookie_update: false,
            ended: false,
            created_at: now,
            updated_at: now,
        }
    }

    /// Touching a Client advances its `updated_at`, which is what
    /// `client_uat` cookies reflect back to the browser.
    pub fn touch(&mut self) {
        self.updated_at = Utc::now();
    }

    pub fn has_active_flow(&self) -> bool {
        self.sign_in_id.is_some() || self.sign_up_id.is_some()
    }
}
