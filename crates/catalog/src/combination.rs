use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use stockledger_core::{DomainError, DomainResult, ValueObject};

/// A specification combination: category code -> option value.
///
/// Equality, hashing and serialization use the canonical (code-sorted) form, so
/// `{length: 2m, color: red}` and `{color: red, length: 2m}` are the same
/// combination. The caller's original key order is kept only for naming.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "BTreeMap<String, String>", into = "BTreeMap<String, String>")]
pub struct SpecCombination {
    pairs: BTreeMap<String, String>,
    given_order: Vec<String>,
}

impl SpecCombination {
    /// Build a combination from (code, value) pairs in caller order.
    ///
    /// Rejects an empty set, blank codes or values, and repeated codes.
    pub fn new<I, K, V>(pairs: I) -> DomainResult<Self>
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let mut map = BTreeMap::new();
        let mut given_order = Vec::new();

        for (code, value) in pairs {
            let code: String = code.into();
            let value: String = value.into();
            if code.trim().is_empty() {
                return Err(DomainError::invalid_specification("category code cannot be blank"));
            }
            if value.trim().is_empty() {
                return Err(DomainError::invalid_specification(format!(
                    "value for '{code}' cannot be blank"
                )));
            }
            if map.insert(code.clone(), value).is_some() {
                return Err(DomainError::invalid_specification(format!(
                    "category code '{code}' appears more than once"
                )));
            }
            given_order.push(code);
        }

        if map.is_empty() {
            return Err(DomainError::invalid_specification(
                "specification combination cannot be empty",
            ));
        }

        Ok(Self {
            pairs: map,
            given_order,
        })
    }

    /// Parse an untyped JSON value (as received over the wire).
    ///
    /// Anything that is not a non-empty object of string values is rejected as
    /// `InvalidSpecification`. Object key order is taken as the caller order.
    pub fn from_json(value: &JsonValue) -> DomainResult<Self> {
        let obj = value.as_object().ok_or_else(|| {
            DomainError::invalid_specification("specification combination must be an object")
        })?;

        let mut pairs = Vec::with_capacity(obj.len());
        for (code, v) in obj {
            let v = v.as_str().ok_or_else(|| {
                DomainError::invalid_specification(format!("value for '{code}' must be a string"))
            })?;
            pairs.push((code.clone(), v.to_string()));
        }

        Self::new(pairs)
    }

    pub fn len(&self) -> usize {
        self.pairs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pairs.is_empty()
    }

    pub fn get(&self, code: &str) -> Option<&str> {
        self.pairs.get(code).map(String::as_str)
    }

    pub fn contains_code(&self, code: &str) -> bool {
        self.pairs.contains_key(code)
    }

    /// True when `code` maps to exactly `value`.
    pub fn maps(&self, code: &str, value: &str) -> bool {
        self.get(code) == Some(value)
    }

    /// True when every (code, value) filter pair is present in this combination.
    pub fn matches_all(&self, filters: &BTreeMap<String, String>) -> bool {
        filters.iter().all(|(code, value)| self.maps(code, value))
    }

    /// Canonical (code-sorted) pairs.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.pairs.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Default product name: values joined by a space, in caller order.
    pub fn default_name(&self) -> String {
        self.given_order
            .iter()
            .filter_map(|code| self.pairs.get(code))
            .map(String::as_str)
            .collect::<Vec<_>>()
            .join(" ")
    }

    /// Canonical serialized form, used as the identity key in storage.
    ///
    /// Sorted `code=value` pairs joined by `;`, with `\`, `=` and `;`
    /// escaped so distinct combinations never share a key.
    pub fn canonical_key(&self) -> String {
        self.pairs
            .iter()
            .map(|(code, value)| format!("{}={}", escape_key_part(code), escape_key_part(value)))
            .collect::<Vec<_>>()
            .join(";")
    }

    pub fn to_json(&self) -> JsonValue {
        JsonValue::Object(
            self.pairs
                .iter()
                .map(|(k, v)| (k.clone(), JsonValue::String(v.clone())))
                .collect(),
        )
    }
}

impl PartialEq for SpecCombination {
    fn eq(&self, other: &Self) -> bool {
        self.pairs == other.pairs
    }
}

impl Eq for SpecCombination {}

impl core::hash::Hash for SpecCombination {
    fn hash<H: core::hash::Hasher>(&self, state: &mut H) {
        self.pairs.hash(state);
    }
}

impl ValueObject for SpecCombination {}

impl TryFrom<BTreeMap<String, String>> for SpecCombination {
    type Error = DomainError;

    fn try_from(value: BTreeMap<String, String>) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<SpecCombination> for BTreeMap<String, String> {
    fn from(value: SpecCombination) -> Self {
        value.pairs
    }
}

fn escape_key_part(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '\\' | '=' | ';') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn combo(pairs: &[(&str, &str)]) -> SpecCombination {
        SpecCombination::new(pairs.iter().map(|(k, v)| (*k, *v))).unwrap()
    }

    #[test]
    fn canonical_key_is_sorted_and_unambiguous() {
        let a = combo(&[("length", "2m"), ("color", "red")]);
        assert_eq!(a.canonical_key(), "color=red;length=2m");

        let packed = combo(&[("a", "1;b=2")]);
        let split = combo(&[("a", "1"), ("b", "2")]);
        assert_ne!(packed.canonical_key(), split.canonical_key());
    }

    #[test]
    fn equality_ignores_key_order() {
        let a = combo(&[("length", "2m"), ("color", "red")]);
        let b = combo(&[("color", "red"), ("length", "2m")]);
        assert_eq!(a, b);
        assert_eq!(a.canonical_key(), b.canonical_key());
    }

    #[test]
    fn different_values_are_different_combinations() {
        let a = combo(&[("length", "2m")]);
        let b = combo(&[("length", "3m")]);
        assert_ne!(a, b);
    }

    #[test]
    fn subset_is_not_equal() {
        let a = combo(&[("length", "2m"), ("color", "red")]);
        let b = combo(&[("length", "2m")]);
        assert_ne!(a, b);
    }

    #[test]
    fn default_name_uses_caller_order() {
        let c = combo(&[("thickness", "5mm"), ("length", "2m"), ("color", "red")]);
        assert_eq!(c.default_name(), "5mm 2m red");
    }

    #[test]
    fn empty_combination_is_invalid() {
        let err = SpecCombination::new(Vec::<(String, String)>::new()).unwrap_err();
        assert!(matches!(err, DomainError::InvalidSpecification(_)));
    }

    #[test]
    fn repeated_code_is_invalid() {
        let err = SpecCombination::new([("a", "1"), ("a", "2")]).unwrap_err();
        assert!(matches!(err, DomainError::InvalidSpecification(_)));
    }

    #[test]
    fn from_json_rejects_non_objects_and_non_string_values() {
        for v in [
            serde_json::json!([]),
            serde_json::json!("length"),
            serde_json::json!(null),
            serde_json::json!({}),
            serde_json::json!({ "length": 2 }),
        ] {
            let err = SpecCombination::from_json(&v).unwrap_err();
            assert!(matches!(err, DomainError::InvalidSpecification(_)), "{v}");
        }
    }

    #[test]
    fn serde_uses_canonical_object() {
        let c = combo(&[("b", "2"), ("a", "1")]);
        let json = serde_json::to_string(&c).unwrap();
        assert_eq!(json, r#"{"a":"1","b":"2"}"#);

        let back: SpecCombination = serde_json::from_str(&json).unwrap();
        assert_eq!(back, c);
        assert!(serde_json::from_str::<SpecCombination>("{}").is_err());
    }

    #[test]
    fn matches_all_requires_every_filter() {
        let c = combo(&[("length", "2m"), ("color", "red")]);
        let mut filters = BTreeMap::new();
        filters.insert("color".to_string(), "red".to_string());
        assert!(c.matches_all(&filters));
        filters.insert("length".to_string(), "3m".to_string());
        assert!(!c.matches_all(&filters));
    }

    proptest! {
        /// Property: any permutation of the same pairs yields an equal combination.
        #[test]
        fn permutation_preserves_identity(
            pairs in prop::collection::btree_map("[a-z]{1,6}", "[a-z0-9]{1,6}", 1..8),
            seed in any::<u64>(),
        ) {
            let forward: Vec<_> = pairs.iter().map(|(k, v)| (k.clone(), v.clone())).collect();
            let mut shuffled = forward.clone();
            let n = shuffled.len();
            // Deterministic Fisher-Yates driven by the seed.
            let mut s = seed;
            for i in (1..n).rev() {
                s = s.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
                let j = (s % (i as u64 + 1)) as usize;
                shuffled.swap(i, j);
            }

            let a = SpecCombination::new(forward).unwrap();
            let b = SpecCombination::new(shuffled).unwrap();
            prop_assert_eq!(a.canonical_key(), b.canonical_key());
            prop_assert_eq!(a, b);
        }
    }
}
