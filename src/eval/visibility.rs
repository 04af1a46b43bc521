//! Visibility evaluator: shown/enabled state for every field and group.

use std::collections::BTreeMap;

use crate::render::types::{RenderGroup, RenderTree};
use crate::state::control::ControlSet;
use crate::state::value::{empty_like, is_truthy};

use super::condition::evaluate_conditions;

/// Visibility computed from current values, before it is applied.
#[derive(Debug, Default)]
pub struct VisibilityPlan {
    pub fields: Vec<(String, bool)>,
    pub groups: BTreeMap<String, bool>,
}

/// Compute visibility for the whole tree without touching any control.
pub fn plan(tree: &RenderTree, controls: &ControlSet) -> VisibilityPlan {
    let mut out = VisibilityPlan::default();
    for group in &tree.groups {
        plan_group(group, true, controls, &mut out);
    }
    out
}

/// A group is visible when its ancestors are, it is not disabled by the
/// template, its own conditions hold and at least one field below it is
/// visible. Fields inherit the ancestors' condition result.
fn plan_group(group: &RenderGroup, ancestors_ok: bool, controls: &ControlSet, out: &mut VisibilityPlan) -> bool {
    let own_ok = ancestors_ok
        && group.template_enabled
        && evaluate_conditions(&group.conditions, &group.scope, controls);

    let mut any_visible = false;
    for instance in &group.instances {
        for field in &instance.fields {
            let visible = own_ok && evaluate_conditions(&field.conditions, &field.scope, controls);
            any_visible |= visible;
            out.fields.push((field.control_id.clone(), visible));
        }
        for child in &instance.children {
            any_visible |= plan_group(child, own_ok, controls, out);
        }
    }

    let visible = own_ok && any_visible;
    out.groups.insert(group.key.clone(), visible);
    visible
}

/// Apply a plan. Invisible controls are force-disabled and lose any truthy
/// value; visible ones are enabled unless the template or a dependent parent
/// says otherwise. Returns the identifiers whose values were cleared.
pub fn apply(plan: &VisibilityPlan, controls: &mut ControlSet) -> Vec<String> {
    let mut cleared = Vec::new();
    for (control_id, visible) in &plan.fields {
        let Some(control) = controls.get_mut(control_id) else {
            continue;
        };
        control.visible = *visible;
        if *visible {
            control.disabled = !control.should_enable();
        } else {
            control.disabled = true;
            if is_truthy(&control.value) {
                let empty = empty_like(&control.value);
                control.set(empty);
                cleared.push(control_id.clone());
            }
        }
    }
    cleared
}

/// One evaluation pass. Group visibility is written into `groups`.
pub fn evaluate(tree: &RenderTree, controls: &mut ControlSet, groups: &mut BTreeMap<String, bool>) -> Vec<String> {
    let plan = plan(tree, controls);
    let cleared = apply(&plan, controls);
    *groups = plan.groups;
    if !cleared.is_empty() {
        tracing::debug!(cleared = cleared.len(), "hidden controls cleared");
    }
    cleared
}
