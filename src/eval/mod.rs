//! Visibility evaluation and the change diff reported after every recompute.

pub mod condition;
pub mod visibility;

use std::collections::{BTreeMap, HashMap};

use serde::Serialize;
use serde_json::Value;

use crate::state::control::ControlSet;

pub use condition::{evaluate_condition, evaluate_conditions};

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlChange {
    pub control_id: String,
    pub visible: bool,
    pub enabled: bool,
    /// The engine rewrote the value (cleared, filled or reconciled).
    pub value_changed: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GroupChange {
    pub key: String,
    pub visible: bool,
}

/// Diff of control and group state produced by one engine operation.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChangeSet {
    pub controls: Vec<ControlChange>,
    pub groups: Vec<GroupChange>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.controls.is_empty() && self.groups.is_empty()
    }

    pub fn control(&self, control_id: &str) -> Option<&ControlChange> {
        self.controls.iter().find(|c| c.control_id == control_id)
    }

    pub fn group(&self, key: &str) -> Option<&GroupChange> {
        self.groups.iter().find(|g| g.key == key)
    }
}

#[derive(Debug, Clone, PartialEq)]
struct ControlView {
    visible: bool,
    disabled: bool,
    value: Value,
}

/// State captured before an operation so its effects can be diffed.
#[derive(Debug, Default)]
pub struct Snapshot {
    controls: HashMap<String, ControlView>,
    groups: BTreeMap<String, bool>,
}

impl Snapshot {
    pub fn capture(controls: &ControlSet, groups: &BTreeMap<String, bool>) -> Self {
        Snapshot {
            controls: controls
                .iter()
                .map(|(id, c)| {
                    (
                        id.to_string(),
                        ControlView {
                            visible: c.visible,
                            disabled: c.disabled,
                            value: c.value.clone(),
                        },
                    )
                })
                .collect(),
            groups: groups.clone(),
        }
    }

    /// Everything that differs now. `skip_value` names a control whose value
    /// change was requested by the caller and is not reported as engine-driven.
    pub fn diff(&self, controls: &ControlSet, groups: &BTreeMap<String, bool>, skip_value: Option<&str>) -> ChangeSet {
        let mut changes = ChangeSet::default();
        for (id, control) in controls.iter() {
            let before = self.controls.get(id);
            let value_changed = Some(id) != skip_value
                && before.is_some_and(|b| b.value != control.value);
            let state_changed = before.is_none_or(|b| b.visible != control.visible || b.disabled != control.disabled);
            if value_changed || state_changed {
                changes.controls.push(ControlChange {
                    control_id: id.to_string(),
                    visible: control.visible,
                    enabled: !control.disabled,
                    value_changed,
                });
            }
        }
        for (key, visible) in groups {
            if self.groups.get(key) != Some(visible) {
                changes.groups.push(GroupChange {
                    key: key.clone(),
                    visible: *visible,
                });
            }
        }
        changes
    }
}
