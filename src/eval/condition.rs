//! Condition evaluation against live control values.

use serde_json::Value;

use crate::parse::types::{Combinator, Condition, ConditionKind};
use crate::render::types::ScopeFrame;
use crate::state::control::ControlSet;
use crate::state::value::{condition_equals, has_value, unwrap_value};

/// Fold a condition list left to right. The first result seeds the
/// accumulator; every later result combines with it through its own
/// combinator. An empty list is `true`.
pub fn evaluate_conditions(conditions: &[Condition], scope: &[ScopeFrame], controls: &ControlSet) -> bool {
    let mut iter = conditions.iter();
    let Some(first) = iter.next() else {
        return true;
    };
    let mut acc = evaluate_condition(first, scope, controls);
    for cond in iter {
        let result = evaluate_condition(cond, scope, controls);
        acc = match cond.combinator {
            Combinator::And => acc && result,
            Combinator::Or => acc || result,
        };
    }
    acc
}

/// A single condition. References that do not resolve evaluate to `true`.
pub fn evaluate_condition(cond: &Condition, scope: &[ScopeFrame], controls: &ControlSet) -> bool {
    if cond.kind == ConditionKind::Always {
        return true;
    }
    let Some(field_id) = cond.field_id.as_deref().filter(|id| !id.trim().is_empty()) else {
        return true;
    };
    let Some(actual) = controls
        .resolve(field_id, scope)
        .and_then(|id| controls.value(id))
    else {
        tracing::trace!(field_id, "condition reference unresolved, failing open");
        return true;
    };

    match cond.kind {
        ConditionKind::Always => true,
        ConditionKind::HasValue => has_value(actual),
        ConditionKind::Equals => matches_value(actual, &cond.value),
        ConditionKind::NotEquals => !matches_value(actual, &cond.value),
    }
}

/// Equality with membership semantics for array values on either side.
fn matches_value(actual: &Value, expected: &Value) -> bool {
    let actual = unwrap_value(actual);
    match (actual, expected) {
        (Value::Array(items), Value::Array(wanted)) => items
            .iter()
            .any(|item| wanted.iter().any(|w| condition_equals(item, w))),
        (Value::Array(items), _) => items.iter().any(|item| condition_equals(item, expected)),
        (_, Value::Array(wanted)) => wanted.iter().any(|w| condition_equals(actual, w)),
        _ => condition_equals(actual, expected),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::control::ControlState;
    use serde_json::json;

    fn controls(values: &[(&str, Value)]) -> ControlSet {
        let mut set = ControlSet::new();
        for (id, value) in values {
            set.bind(id, id, ControlState::new(value.clone(), false, true));
        }
        set
    }

    fn cond(field: &str, kind: ConditionKind, value: Value, combinator: Combinator) -> Condition {
        Condition {
            field_id: Some(field.into()),
            kind,
            value,
            combinator,
        }
    }

    #[test]
    fn missing_reference_fails_open() {
        let set = controls(&[]);
        let c = cond("ghost", ConditionKind::Equals, json!("x"), Combinator::And);
        assert!(evaluate_condition(&c, &[], &set));
        let c = cond("ghost", ConditionKind::HasValue, Value::Null, Combinator::And);
        assert!(evaluate_condition(&c, &[], &set));
    }

    #[test]
    fn fold_uses_each_conditions_combinator() {
        let set = controls(&[("a", json!("1")), ("b", json!("2"))]);
        // false OR true → true, then AND false → false
        let list = vec![
            cond("a", ConditionKind::Equals, json!("9"), Combinator::And),
            cond("b", ConditionKind::Equals, json!("2"), Combinator::Or),
        ];
        assert!(evaluate_conditions(&list, &[], &set));
        let mut longer = list.clone();
        longer.push(cond("a", ConditionKind::Equals, json!("5"), Combinator::And));
        assert!(!evaluate_conditions(&longer, &[], &set));
    }

    #[test]
    fn array_value_means_membership() {
        let set = controls(&[("tags", json!(["red", "blue"]))]);
        assert!(evaluate_condition(
            &cond("tags", ConditionKind::Equals, json!("Blue"), Combinator::And),
            &[],
            &set
        ));
        assert!(evaluate_condition(
            &cond("tags", ConditionKind::NotEquals, json!("green"), Combinator::And),
            &[],
            &set
        ));
    }

    #[test]
    fn option_objects_are_unwrapped() {
        let set = controls(&[("status", json!({ "value": "3", "label": "Open" }))]);
        assert!(evaluate_condition(
            &cond("status", ConditionKind::Equals, json!(3), Combinator::And),
            &[],
            &set
        ));
    }
}
