use std::sync::Arc;

use serde_json::Value;
use tracing::debug;

use interact_store::{Condition, EntityKind, EntityStore, Operator};

/// Evaluates a single declarative condition against stored entity data.
///
/// A condition that cannot be evaluated — unknown collection, missing
/// record, lookup failure, type mismatch — is treated as not satisfied, so
/// data problems can never make a rule fire.
#[derive(Clone)]
pub struct ConditionEvaluator {
    store: Arc<dyn EntityStore>,
}

impl ConditionEvaluator {
    pub fn new(store: Arc<dyn EntityStore>) -> Self {
        Self { store }
    }

    pub async fn evaluate(
        &self,
        condition: &Condition,
        trigger_entity: Option<&str>,
        trigger_id: Option<&str>,
        user_email: &str,
    ) -> bool {
        let Some(kind) = EntityKind::from_name(&condition.entity) else {
            debug!(entity = %condition.entity, "condition references unregistered entity");
            return false;
        };

        let lookup = if trigger_entity == Some(condition.entity.as_str()) {
            // The condition inspects the record that triggered this run.
            let Some(id) = trigger_id else {
                return false;
            };
            self.store.record_by_id(kind, id).await
        } else {
            self.store.record_for_user(kind, user_email).await
        };

        let record = match lookup {
            Ok(Some(record)) => record,
            Ok(None) => return false,
            Err(err) => {
                debug!(entity = %condition.entity, error = %err, "condition lookup failed");
                return false;
            }
        };

        operator_matches(
            condition.operator,
            record.get(condition.field.as_str()),
            &condition.value,
        )
    }
}

/// Applies an operator to the field value extracted from a record. Type
/// mismatches evaluate to `false` rather than erroring.
pub fn operator_matches(operator: Operator, actual: Option<&Value>, expected: &Value) -> bool {
    match operator {
        Operator::Equals => actual.map(|value| values_equal(value, expected)).unwrap_or(false),
        Operator::Contains => match (actual.and_then(Value::as_str), expected.as_str()) {
            (Some(haystack), Some(needle)) => haystack.contains(needle),
            _ => false,
        },
        Operator::Gt => compare_numbers(actual, expected, |field, value| field > value),
        Operator::Lt => compare_numbers(actual, expected, |field, value| field < value),
        Operator::Gte => compare_numbers(actual, expected, |field, value| field >= value),
        Operator::Lte => compare_numbers(actual, expected, |field, value| field <= value),
        Operator::In => match (expected.as_array(), actual) {
            (Some(candidates), Some(value)) => {
                candidates.iter().any(|candidate| values_equal(candidate, value))
            }
            _ => false,
        },
        Operator::Exists => matches!(actual, Some(value) if !value.is_null()),
    }
}

fn compare_numbers(
    actual: Option<&Value>,
    expected: &Value,
    compare: impl Fn(f64, f64) -> bool,
) -> bool {
    match (actual.and_then(Value::as_f64), expected.as_f64()) {
        (Some(field), Some(value)) => compare(field, value),
        _ => false,
    }
}

fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Number(lhs), Value::Number(rhs)) => match (lhs.as_f64(), rhs.as_f64()) {
            (Some(l), Some(r)) => (l - r).abs() < f64::EPSILON,
            _ => lhs == rhs,
        },
        _ => left == right,
    }
}
