use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use url::Url;

use super::ids::TypedId;

/// Associates a development-mode browser with a Client and the origin it
/// was first seen from.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DevBrowser {
    pub id: TypedId,
    pub instance_id: TypedId,
    pub client_id: Option<TypedId>,
    pub home_origin: Url,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
