//! Allow-list filtering of property bags

use crate::identity::Properties;
use std::collections::HashSet;

/// Requesting this key returns every property
pub const WILDCARD: &str = "*";

/// Copy `all`, keeping only the `requested` keys unless the wildcard is present.
/// An empty request yields an empty bag.
pub fn filter_properties(all: &Properties, requested: &HashSet<String>) -> Properties {
    if requested.contains(WILDCARD) {
        return all.clone();
    }
    all.iter()
        .filter(|(key, _)| requested.contains(key.as_str()))
        .map(|(key, value)| (key.clone(), value.clone()))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn props() -> Properties {
        Properties::from([("a".to_string(), json!(1)), ("b".to_string(), json!(2))])
    }

    fn keys(keys: &[&str]) -> HashSet<String> {
        keys.iter().map(|k| k.to_string()).collect()
    }

    #[test]
    fn test_single_key() {
        let filtered = filter_properties(&props(), &keys(&["a"]));
        assert_eq!(filtered, Properties::from([("a".to_string(), json!(1))]));
    }

    #[test]
    fn test_wildcard() {
        assert_eq!(filter_properties(&props(), &keys(&["*"])), props());
        assert_eq!(filter_properties(&props(), &keys(&["a", "*"])), props());
    }

    #[test]
    fn test_empty_request() {
        assert!(filter_properties(&props(), &keys(&[])).is_empty());
    }

    #[test]
    fn test_unknown_keys_ignored() {
        let filtered = filter_properties(&props(), &keys(&["b", "zzz"]));
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered["b"], json!(2));
    }
}
