use serde::{Deserialize, Serialize};

use super::ids::TypedId;

/// A resolved billing subscription plan key, used by
/// `crate::token::session_token` to populate the `pla`/org-plan claims.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct BillingSubscription {
    pub subject_id: TypedId,
    pub plan_keys: Vec<String>,
}
