use std::fmt;

use serde::{Deserialize, Serialize};

/// An opaque entity id, e.g. `client_2abc...`.
///
/// Ids are plain strings rather than `Uuid` because `ClientStore` routes
/// requests to a backend based on the *shape* of the id (see
/// [`crate::store::router::backend_for_id`]): an id whose hex-looking tail is
/// at least 64 characters is served by the edge backend, everything else by
/// the relational backend.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TypedId(String);

impl TypedId {
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The id's payload after its `prefix_` separator, or the whole id if
    /// there is no underscore.
    fn tail(&self) -> &str {
        match self.0.split_once('_') {
            Some((_, tail)) => tail,
            None => &self.0,
        }
    }

    /// True when this id should route to the edge backend: its tail is at
    /// least 64 hex characters. Shorter or non-hex tails are relational ids.
    pub fn is_edge_shaped(&self) -> bool {
        let tail = self.tail();
        tail.len() >= 64 && tail.chars().all(|c| c.is_ascii_hexdigit())
    }
}

impl fmt::Display for TypedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for TypedId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&str> for TypedId {
    fn from(value: &str) -> Self {
        Self(value.to_owned())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn short_id_is_relational() {
        let id = TypedId::new("client_29fj2");
        assert!(!id.is_edge_shaped());
    }

    #[test]
    fn long_hex_tail_is_edge() {
        let id = TypedId::new(format!("client_{}", "a".repeat(64)));
        assert!(id.is_edge_shaped());
    }

    #[test]
    fn long_non_hex_tail_is_relational() {
        let id = TypedId::new(format!("client_{}", "z".repeat(64)));
        assert!(!id.is_edge_shaped());
    }

    #[test]
    fn no_underscore_uses_whole_string() {
        let id = TypedId::new("a".repeat(64));
        assert!(id.is_edge_shaped());
    }
}
