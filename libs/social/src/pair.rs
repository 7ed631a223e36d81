//! Pair keys address requests and connections by their two participants

use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifier for an unordered pair of users
///
/// The two ids are sorted before joining, so `PairKey::new(a, b)` and
/// `PairKey::new(b, a)` are equal and at most one request or connection
/// document can exist per pair. User ids never contain `_`
/// (see [`crate::validation::validate_user_id`]).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PairKey(String);

impl PairKey {
    pub fn new(a: &str, b: &str) -> Self {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        PairKey(format!("{}_{}", low, high))
    }

    /// Wrap a key received from a caller; it is only used for lookups
    pub fn from_raw(raw: impl Into<String>) -> Self {
        PairKey(raw.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for PairKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn order_does_not_matter() {
        assert_eq!(PairKey::new("bob", "alice"), PairKey::new("alice", "bob"));
        assert_eq!(PairKey::new("bob", "alice").as_str(), "alice_bob");
    }

    #[test]
    fn raw_keys_compare_by_value() {
        assert_eq!(PairKey::from_raw("alice_bob"), PairKey::new("bob", "alice"));
        assert_ne!(PairKey::from_raw("bob_alice"), PairKey::new("bob", "alice"));
    }
}
