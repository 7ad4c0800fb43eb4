//! Outcome of one provider evaluation round.
//!
//! A `ProviderResultSet` is built fresh on every cache miss and never mutated
//! afterwards. Persisted shape (keys are load-bearing):
//!
//! ```json
//! {"r":{"manual":true,"membership":false},"t":1760000000000,"v":"<hash>"}
//! ```
//!
//! An empty string stored in place of the blob is an *invalidated* record.

use indexmap::IndexMap;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Immutable per-(learner, course) evaluation result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct ProviderResultSet {
    /// Provider id → whether that provider grants enrolment.
    #[serde(rename = "r")]
    results: IndexMap<String, bool>,

    /// When the round was computed, in epoch milliseconds.
    #[serde(rename = "t")]
    computed_at: i64,

    /// Version hash the round was computed under.
    #[serde(rename = "v")]
    version_hash: String,
}

impl ProviderResultSet {
    #[must_use]
    pub const fn new(
        results: IndexMap<String, bool>,
        computed_at: i64,
        version_hash: String,
    ) -> Self {
        Self {
            results,
            computed_at,
            version_hash,
        }
    }

    /// Parse a persisted blob.
    ///
    /// Empty (invalidated) and malformed blobs yield `None`; callers treat
    /// both as "no cached result".
    #[must_use]
    pub fn from_json(json: &str) -> Option<Self> {
        if json.trim().is_empty() {
            return None;
        }
        match serde_json::from_str(json) {
            Ok(set) => Some(set),
            Err(error) => {
                tracing::warn!(%error, "discarding malformed enrolment result blob");
                None
            }
        }
    }

    /// Serialize to the persisted blob shape.
    ///
    /// # Errors
    ///
    /// Returns `serde_json::Error` if serialization fails.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// `true` iff at least one provider granted enrolment. An empty set never
    /// provides enrolment.
    #[must_use]
    pub fn is_enrolment_provided(&self) -> bool {
        self.results.values().any(|enrolled| *enrolled)
    }

    /// Ids of providers that granted enrolment, in evaluation order.
    pub fn providing_ids(&self) -> impl Iterator<Item = &str> {
        self.results
            .iter()
            .filter(|(_, enrolled)| **enrolled)
            .map(|(id, _)| id.as_str())
    }

    #[must_use]
    pub fn provider_result(&self, provider_id: &str) -> Option<bool> {
        self.results.get(provider_id).copied()
    }

    #[must_use]
    pub const fn results(&self) -> &IndexMap<String, bool> {
        &self.results
    }

    #[must_use]
    pub const fn computed_at(&self) -> i64 {
        self.computed_at
    }

    #[must_use]
    pub fn version_hash(&self) -> &str {
        &self.version_hash
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn set_of(pairs: &[(&str, bool)]) -> ProviderResultSet {
        let results = pairs
            .iter()
            .map(|(id, enrolled)| ((*id).to_string(), *enrolled))
            .collect();
        ProviderResultSet::new(results, 1_000, "v1".into())
    }

    #[test]
    fn empty_set_never_provides() {
        assert!(!set_of(&[]).is_enrolment_provided());
    }

    #[test]
    fn combination_is_logical_or() {
        let cases: &[(&[(&str, bool)], bool)] = &[
            (&[("a", false)], false),
            (&[("a", true)], true),
            (&[("a", false), ("b", false)], false),
            (&[("a", false), ("b", true)], true),
            (&[("a", true), ("b", false), ("c", true)], true),
        ];
        for (pairs, expected) in cases {
            assert_eq!(set_of(pairs).is_enrolment_provided(), *expected, "{pairs:?}");
        }
    }

    #[test]
    fn persisted_shape_uses_short_keys() {
        let json = set_of(&[("manual", true)]).to_json().unwrap();
        assert_eq!(json, r#"{"r":{"manual":true},"t":1000,"v":"v1"}"#);
    }

    #[test]
    fn invalidated_and_malformed_blobs_are_absent() {
        assert!(ProviderResultSet::from_json("").is_none());
        assert!(ProviderResultSet::from_json("{not json").is_none());
        assert!(ProviderResultSet::from_json(r#"{"r":[]}"#).is_none());
    }

    #[test]
    fn providing_ids_follow_evaluation_order() {
        let set = set_of(&[("b", true), ("a", false), ("c", true)]);
        assert_eq!(set.providing_ids().collect::<Vec<_>>(), vec!["b", "c"]);
        assert_eq!(set.provider_result("a"), Some(false));
        assert_eq!(set.provider_result("z"), None);
    }
}
