//! Changesets handed to storage.
//!
//! A `Diff` is the minimal description of one entity's change during a batch.
//! Values are always in their canonical encoded form.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// The change of a single entity during one batch.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diff {
    /// Table the entity belongs to.
    pub table: String,
    /// True if the entity did not exist before this batch.
    pub creation: bool,
    /// Identity field name → encoded value.
    pub keys: BTreeMap<String, String>,
    /// Changed attribute name → encoded value.
    pub vals: BTreeMap<String, String>,
}

/// All diffs produced by one batch. Must be applied as a single unit.
pub type Changeset = Vec<Diff>;

impl Diff {
    /// Returns the encoded key value for an identity field.
    pub fn key(&self, field: &str) -> Option<&str> {
        self.keys.get(field).map(String::as_str)
    }

    /// Returns the encoded changed value for an attribute.
    pub fn val(&self, field: &str) -> Option<&str> {
        self.vals.get(field).map(String::as_str)
    }

    /// Returns true if this diff belongs to `table` and every `(field, value)`
    /// pair matches its keys.
    pub fn matches(&self, table: &str, keys: &[(&str, &str)]) -> bool {
        self.table == table && keys.iter().all(|(k, v)| self.key(k) == Some(*v))
    }
}

/// Finds the diff of one entity in a changeset.
pub fn find_diff<'a>(changeset: &'a [Diff], table: &str, keys: &[(&str, &str)]) -> Option<&'a Diff> {
    changeset.iter().find(|d| d.matches(table, keys))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn token_diff() -> Diff {
        Diff {
            table: "token".into(),
            creation: true,
            keys: BTreeMap::from([("address".to_string(), "0xabc".to_string())]),
            vals: BTreeMap::from([("numPairs".to_string(), "1".to_string())]),
        }
    }

    #[test]
    fn test_diff_accessors() {
        let diff = token_diff();
        assert_eq!(diff.key("address"), Some("0xabc"));
        assert_eq!(diff.val("numPairs"), Some("1"));
        assert_eq!(diff.val("decimals"), None);
    }

    #[test]
    fn test_find_diff() {
        let changeset = vec![token_diff()];
        assert!(find_diff(&changeset, "token", &[("address", "0xabc")]).is_some());
        assert!(find_diff(&changeset, "token", &[("address", "0xdef")]).is_none());
        assert!(find_diff(&changeset, "pair", &[("address", "0xabc")]).is_none());
    }

    #[test]
    fn test_diff_json_shape() {
        let json = serde_json::to_value(token_diff()).unwrap();
        assert_eq!(json["table"], "token");
        assert_eq!(json["creation"], true);
        assert_eq!(json["keys"]["address"], "0xabc");
        assert_eq!(json["vals"]["numPairs"], "1");
    }
}
