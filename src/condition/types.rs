//! Declarative condition tree
//!
//! A condition is `{"type": <name>, "parameterValues": {...}}`. Composite
//! conditions nest further conditions inside their parameter values.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

pub const MATCH_ALL: &str = "matchAllCondition";
pub const BOOLEAN: &str = "booleanCondition";
pub const NOT: &str = "notCondition";
pub const PROFILE_PROPERTY: &str = "profilePropertyCondition";
pub const SESSION_PROPERTY: &str = "sessionPropertyCondition";
pub const PROFILE_SEGMENT: &str = "profileSegmentCondition";

/// A node of the condition tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub condition_type: String,
    #[serde(default)]
    pub parameter_values: Map<String, Value>,
}

impl Condition {
    pub fn new(condition_type: impl Into<String>, parameter_values: Value) -> Self {
        let parameter_values = match parameter_values {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        Self {
            condition_type: condition_type.into(),
            parameter_values,
        }
    }

    /// Matches everything
    pub fn match_all() -> Self {
        Self::new(MATCH_ALL, Value::Null)
    }

    /// All sub-conditions must match
    pub fn and(sub_conditions: Vec<Condition>) -> Self {
        Self::new(
            BOOLEAN,
            json!({"operator": "and", "subConditions": sub_conditions}),
        )
    }

    /// At least one sub-condition must match
    pub fn or(sub_conditions: Vec<Condition>) -> Self {
        Self::new(
            BOOLEAN,
            json!({"operator": "or", "subConditions": sub_conditions}),
        )
    }

    /// Negation
    pub fn not(sub_condition: Condition) -> Self {
        Self::new(NOT, json!({"subCondition": sub_condition}))
    }

    /// Compare a profile property
    pub fn profile_property(name: &str, operator: &str, value: Value) -> Self {
        Self::new(
            PROFILE_PROPERTY,
            json!({"propertyName": name, "comparisonOperator": operator, "propertyValue": value}),
        )
    }

    /// Compare a session property
    pub fn session_property(name: &str, operator: &str, value: Value) -> Self {
        Self::new(
            SESSION_PROPERTY,
            json!({"propertyName": name, "comparisonOperator": operator, "propertyValue": value}),
        )
    }

    /// Segment membership
    pub fn in_segments(segments: &[&str], match_type: &str) -> Self {
        Self::new(
            PROFILE_SEGMENT,
            json!({"segments": segments, "matchType": match_type}),
        )
    }

    /// Raw parameter value
    pub fn param(&self, name: &str) -> Option<&Value> {
        self.parameter_values.get(name)
    }

    /// Required string parameter
    pub fn str_param(&self, name: &str) -> Result<&str> {
        self.param(name).and_then(Value::as_str).ok_or_else(|| {
            Error::Condition(format!(
                "{} requires string parameter '{}'",
                self.condition_type, name
            ))
        })
    }

    /// Optional string parameter
    pub fn opt_str_param(&self, name: &str) -> Option<&str> {
        self.param(name).and_then(Value::as_str)
    }

    /// Nested condition list parameter
    pub fn sub_conditions(&self, name: &str) -> Result<Vec<Condition>> {
        match self.param(name) {
            Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
                Error::Condition(format!(
                    "{}: invalid '{}': {}",
                    self.condition_type, name, e
                ))
            }),
            None => Ok(Vec::new()),
        }
    }

    /// Nested single condition parameter
    pub fn sub_condition(&self, name: &str) -> Result<Condition> {
        let value = self.param(name).ok_or_else(|| {
            Error::Condition(format!(
                "{} requires parameter '{}'",
                self.condition_type, name
            ))
        })?;
        serde_json::from_value(value.clone()).map_err(|e| {
            Error::Condition(format!(
                "{}: invalid '{}': {}",
                self.condition_type, name, e
            ))
        })
    }

    /// String list parameter (missing = empty)
    pub fn str_list_param(&self, name: &str) -> Vec<String> {
        match self.param(name) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|v| v.as_str().map(str::to_string))
                .collect(),
            Some(Value::String(single)) => vec![single.clone()],
            _ => Vec::new(),
        }
    }
}
