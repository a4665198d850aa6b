use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ids::TypedId;

/// One-shot token mapping a nonce string to a (client, instance) pair.
///
/// TTL is approximately one hour (see `crate::multidomain::sync`).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct SyncNonce {
    pub nonce: String,
    pub instance_id: TypedId,
    pub client_id: TypedId,
    pub redirect_url: String,
    pub consumed: bool,
    pub expire_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl SyncNonce {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.expire_at
    }
}
