//! Identity types for roomlink.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Transport-assigned identifier for one participant.
///
/// Opaque to the adapter. Valid for the lifetime of one connection and
/// reassigned on reconnect.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Wrap a transport-supplied id.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Create a random identity (UUID v4). Used by in-memory transports.
    pub fn random() -> Self {
        Self(uuid::Uuid::new_v4().to_string())
    }

    /// Borrow the raw id.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the raw id.
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Identity({})", self.0)
    }
}

impl From<&str> for Identity {
    fn from(id: &str) -> Self {
        Self::new(id)
    }
}

impl From<String> for Identity {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Who is in the room: peer identity -> join timestamp (transport clock, ms).
///
/// Ordered so that notifications are deterministic.
pub type OccupantSnapshot = BTreeMap<Identity, u64>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn identity_display_is_raw_id() {
        let id = Identity::new("abc123");
        assert_eq!(id.to_string(), "abc123");
        assert_eq!(id.as_str(), "abc123");
    }

    #[test]
    fn identity_debug_is_tagged() {
        let id = Identity::new("abc");
        assert_eq!(format!("{:?}", id), "Identity(abc)");
    }

    #[test]
    fn random_identities_differ() {
        assert_ne!(Identity::random(), Identity::random());
    }

    #[test]
    fn identity_serializes_as_plain_string() {
        let json = serde_json::to_string(&Identity::new("peer-1")).unwrap();
        assert_eq!(json, "\"peer-1\"");
    }

    #[test]
    fn snapshot_decodes_from_json_object() {
        let snapshot: OccupantSnapshot =
            serde_json::from_str(r#"{"b": 2, "a": 1}"#).unwrap();
        let keys: Vec<&str> = snapshot.keys().map(|k| k.as_str()).collect();
        assert_eq!(keys, vec!["a", "b"]);
        assert_eq!(snapshot[&Identity::new("b")], 2);
    }
}
