//! Condition module — declarative filters evaluated against a visitor

pub mod evaluator;
pub mod types;

pub use evaluator::{BuiltinEvaluator, ConditionEvaluator};
pub use types::Condition;
