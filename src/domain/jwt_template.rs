use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ids::TypedId;

/// A data-driven claim template: a JSON object whose string leaves may
/// contain `{{ }}` shortcodes, executed by
/// [`crate::token::templater::TokenTemplater`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct JwtTemplate {
    pub id: TypedId,
    pub instance_id: TypedId,
    pub name: String,
    pub claims: Value,
    pub lifetime_seconds: i64,
    pub clock_skew_seconds: i64,
    pub signing_key: Option<String>,
    pub signing_algorithm: Option<String>,
}
