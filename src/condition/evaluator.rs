//! Condition evaluation
//!
//! `BuiltinEvaluator` interprets the condition tree directly; nothing in a
//! condition is ever executed. Nesting is bounded so a hostile payload
//! cannot exhaust the stack.

use crate::condition::types::*;
use crate::error::{Error, Result};
use crate::identity::{Identity, Properties, Session};
use async_trait::async_trait;
use regex::Regex;
use serde_json::Value;
use std::cmp::Ordering;

/// Maximum nesting depth of a condition tree
pub const MAX_DEPTH: usize = 32;

/// Capability interface for matching a condition against a visitor
#[async_trait]
pub trait ConditionEvaluator: Send + Sync {
    async fn matches(
        &self,
        condition: &Condition,
        identity: &Identity,
        session: Option<&Session>,
    ) -> Result<bool>;
}

/// Evaluator for the builtin condition types
#[derive(Debug, Default, Clone)]
pub struct BuiltinEvaluator;

impl BuiltinEvaluator {
    pub fn new() -> Self {
        Self
    }

    fn eval(
        &self,
        condition: &Condition,
        identity: &Identity,
        session: Option<&Session>,
        depth: usize,
    ) -> Result<bool> {
        if depth > MAX_DEPTH {
            return Err(Error::Condition(format!(
                "condition nesting exceeds {} levels",
                MAX_DEPTH
            )));
        }

        match condition.condition_type.as_str() {
            MATCH_ALL => Ok(true),
            BOOLEAN => {
                let subs = condition.sub_conditions("subConditions")?;
                match condition.opt_str_param("operator").unwrap_or("and") {
                    "and" => {
                        for sub in &subs {
                            if !self.eval(sub, identity, session, depth + 1)? {
                                return Ok(false);
                            }
                        }
                        Ok(true)
                    }
                    "or" => {
                        for sub in &subs {
                            if self.eval(sub, identity, session, depth + 1)? {
                                return Ok(true);
                            }
                        }
                        Ok(false)
                    }
                    other => Err(Error::Condition(format!(
                        "unknown boolean operator '{}'",
                        other
                    ))),
                }
            }
            NOT => {
                let sub = condition.sub_condition("subCondition")?;
                Ok(!self.eval(&sub, identity, session, depth + 1)?)
            }
            PROFILE_PROPERTY => compare_property(condition, Some(&identity.properties)),
            SESSION_PROPERTY => compare_property(condition, session.map(|s| &s.properties)),
            PROFILE_SEGMENT => {
                let wanted = condition.str_list_param("segments");
                let is_member = |s: &String| identity.segments.contains(s);
                match condition.opt_str_param("matchType").unwrap_or("in") {
                    "in" => Ok(wanted.iter().any(is_member)),
                    "all" => Ok(wanted.iter().all(is_member)),
                    "notIn" => Ok(!wanted.iter().any(is_member)),
                    other => Err(Error::Condition(format!(
                        "unknown segment match type '{}'",
                        other
                    ))),
                }
            }
            other => Err(Error::Condition(format!(
                "unsupported condition type '{}'",
                other
            ))),
        }
    }
}

#[async_trait]
impl ConditionEvaluator for BuiltinEvaluator {
    async fn matches(
        &self,
        condition: &Condition,
        identity: &Identity,
        session: Option<&Session>,
    ) -> Result<bool> {
        self.eval(condition, identity, session, 0)
    }
}

fn compare_property(condition: &Condition, properties: Option<&Properties>) -> Result<bool> {
    let name = condition.str_param("propertyName")?;
    let operator = condition.str_param("comparisonOperator")?;
    let actual = properties.and_then(|props| lookup(props, name));
    let expected = condition.param("propertyValue");

    match operator {
        "exists" => Ok(actual.is_some()),
        "missing" => Ok(actual.is_none()),
        "equals" => Ok(matches!((actual, expected), (Some(a), Some(e)) if loosely_equal(a, e))),
        "notEquals" => Ok(!matches!((actual, expected), (Some(a), Some(e)) if loosely_equal(a, e))),
        "contains" => Ok(match (actual, expected) {
            (Some(Value::String(a)), Some(Value::String(e))) => a.contains(e.as_str()),
            (Some(Value::Array(items)), Some(e)) => items.iter().any(|i| loosely_equal(i, e)),
            _ => false,
        }),
        "greaterThan" => Ok(ordering(actual, expected) == Some(Ordering::Greater)),
        "lessThan" => Ok(ordering(actual, expected) == Some(Ordering::Less)),
        "matchesRegex" => {
            let pattern = expected.and_then(Value::as_str).ok_or_else(|| {
                Error::Condition("matchesRegex requires a string propertyValue".to_string())
            })?;
            let re = Regex::new(pattern)
                .map_err(|e| Error::Condition(format!("invalid regex '{}': {}", pattern, e)))?;
            Ok(matches!(actual, Some(Value::String(s)) if re.is_match(s)))
        }
        other => Err(Error::Condition(format!(
            "unknown comparison operator '{}'",
            other
        ))),
    }
}

/// Resolve `properties.a.b` or `a.b` against a property bag
fn lookup<'a>(properties: &'a Properties, name: &str) -> Option<&'a Value> {
    let path = name.strip_prefix("properties.").unwrap_or(name);
    if let Some(value) = properties.get(path) {
        return Some(value);
    }

    let mut parts = path.split('.');
    let mut current = properties.get(parts.next()?)?;
    for part in parts {
        current = current.as_object()?.get(part)?;
    }
    Some(current)
}

fn as_number(value: &Value) -> Option<f64> {
    match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn loosely_equal(actual: &Value, expected: &Value) -> bool {
    if actual == expected {
        return true;
    }
    match (as_number(actual), as_number(expected)) {
        (Some(a), Some(e)) => a == e,
        _ => false,
    }
}

fn ordering(actual: Option<&Value>, expected: Option<&Value>) -> Option<Ordering> {
    let (actual, expected) = (actual?, expected?);
    if let (Some(a), Some(e)) = (as_number(actual), as_number(expected)) {
        return a.partial_cmp(&e);
    }
    match (actual, expected) {
        (Value::String(a), Value::String(e)) => Some(a.cmp(e)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use serde_json::json;

    fn visitor() -> Identity {
        let mut identity = Identity::profile("p-1");
        identity.set_property("age", json!(42));
        identity.set_property("city", json!("Paris"));
        identity.set_property("tags", json!(["a", "b"]));
        identity.set_property("address", json!({"country": "FR"}));
        identity.segments.insert("vip".to_string());
        identity.segments.insert("returning".to_string());
        identity
    }

    async fn check(condition: Condition) -> Result<bool> {
        BuiltinEvaluator::new().matches(&condition, &visitor(), None).await
    }

    #[tokio::test]
    async fn test_match_all() {
        assert!(check(Condition::match_all()).await.unwrap());
    }

    #[tokio::test]
    async fn test_property_operators() {
        assert!(check(Condition::profile_property("age", "equals", json!(42))).await.unwrap());
        assert!(check(Condition::profile_property("age", "equals", json!("42"))).await.unwrap());
        assert!(check(Condition::profile_property("properties.city", "equals", json!("Paris"))).await.unwrap());
        assert!(check(Condition::profile_property("city", "notEquals", json!("Rome"))).await.unwrap());
        assert!(check(Condition::profile_property("nope", "notEquals", json!("x"))).await.unwrap());
        assert!(check(Condition::profile_property("age", "greaterThan", json!(30))).await.unwrap());
        assert!(!check(Condition::profile_property("age", "lessThan", json!(30))).await.unwrap());
        assert!(check(Condition::profile_property("city", "contains", json!("ar"))).await.unwrap());
        assert!(check(Condition::profile_property("tags", "contains", json!("b"))).await.unwrap());
        assert!(check(Condition::profile_property("city", "exists", Value::Null)).await.unwrap());
        assert!(check(Condition::profile_property("email", "missing", Value::Null)).await.unwrap());
        assert!(check(Condition::profile_property("city", "matchesRegex", json!("^Pa"))).await.unwrap());
    }

    #[tokio::test]
    async fn test_nested_property_path() {
        assert!(check(Condition::profile_property("properties.address.country", "equals", json!("FR")))
            .await
            .unwrap());
        assert!(check(Condition::profile_property("address.zip", "missing", Value::Null))
            .await
            .unwrap());
    }

    #[tokio::test]
    async fn test_boolean_and_not() {
        let both = Condition::and(vec![
            Condition::profile_property("age", "greaterThan", json!(18)),
            Condition::in_segments(&["vip"], "in"),
        ]);
        assert!(check(both).await.unwrap());

        let either = Condition::or(vec![
            Condition::profile_property("age", "lessThan", json!(18)),
            Condition::not(Condition::in_segments(&["vip"], "in")),
        ]);
        assert!(!check(either).await.unwrap());

        assert!(check(Condition::and(vec![])).await.unwrap());
        assert!(!check(Condition::or(vec![])).await.unwrap());
    }

    #[tokio::test]
    async fn test_segment_match_types() {
        assert!(check(Condition::in_segments(&["vip", "other"], "in")).await.unwrap());
        assert!(!check(Condition::in_segments(&["vip", "other"], "all")).await.unwrap());
        assert!(check(Condition::in_segments(&["vip", "returning"], "all")).await.unwrap());
        assert!(check(Condition::in_segments(&["other"], "notIn")).await.unwrap());
    }

    #[tokio::test]
    async fn test_session_property() {
        let mut session = Session::new("s-1", "p-1", Utc::now());
        session.properties.insert("referrer".to_string(), json!("google"));
        let evaluator = BuiltinEvaluator::new();
        let cond = Condition::session_property("referrer", "equals", json!("google"));

        assert!(evaluator.matches(&cond, &visitor(), Some(&session)).await.unwrap());
        assert!(!evaluator.matches(&cond, &visitor(), None).await.unwrap());
    }

    #[tokio::test]
    async fn test_unknown_type_and_operator_fail() {
        let err = check(Condition::new("scriptCondition", json!({"script": "1+1"})))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Condition(_)));

        let err = check(Condition::profile_property("age", "between", json!(1)))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("between"));
    }

    #[tokio::test]
    async fn test_invalid_regex_fails() {
        let err = check(Condition::profile_property("city", "matchesRegex", json!("(")))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Condition(_)));
    }

    #[tokio::test]
    async fn test_depth_limit() {
        let mut cond = Condition::match_all();
        for _ in 0..=MAX_DEPTH {
            cond = Condition::not(cond);
        }
        let err = check(cond).await.unwrap_err();
        assert!(err.to_string().contains("nesting"));
    }
}
