//! Live control state, one entry per render field.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::{Map, Value};

use crate::error::EngineError;
use crate::render::ids;
use crate::render::types::ScopeFrame;

use super::value::has_value;

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ControlState {
    pub value: Value,
    /// Value the control was bound with; `dirty` compares against it.
    pub initial: Value,
    pub disabled: bool,
    pub touched: bool,
    pub dirty: bool,
    pub required: bool,
    pub visible: bool,
    /// Template `isEnabled` flag.
    pub template_enabled: bool,
    /// Held disabled by an empty dependent-dropdown parent.
    pub dependency_locked: bool,
}

impl ControlState {
    pub fn new(value: Value, required: bool, template_enabled: bool) -> Self {
        ControlState {
            initial: value.clone(),
            value,
            disabled: !template_enabled,
            touched: false,
            dirty: false,
            required,
            visible: true,
            template_enabled,
            dependency_locked: false,
        }
    }

    pub fn enabled(&self) -> bool {
        !self.disabled
    }

    /// Should the control accept input given its current visibility?
    pub fn should_enable(&self) -> bool {
        self.visible && self.template_enabled && !self.dependency_locked
    }

    /// Required validator. Hidden or disabled controls never fail.
    pub fn is_valid(&self) -> bool {
        !(self.required && self.visible && !self.disabled && !has_value(&self.value))
    }

    pub fn set(&mut self, value: Value) {
        self.dirty = value != self.initial;
        self.value = value;
    }

    /// Accept the current value as the new baseline after a save.
    pub fn commit(&mut self) {
        self.initial = self.value.clone();
        self.dirty = false;
    }
}

/// All controls of one render tree, in registration order.
#[derive(Debug, Clone, Default)]
pub struct ControlSet {
    controls: HashMap<String, ControlState>,
    order: Vec<String>,
    /// Sanitized raw id → identifiers in registration order.
    by_raw: HashMap<String, Vec<String>>,
}

impl ControlSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a control. An identifier that is already bound is left as is.
    pub fn bind(&mut self, control_id: &str, raw_id: &str, state: ControlState) -> bool {
        if self.controls.contains_key(control_id) {
            return false;
        }
        self.controls.insert(control_id.to_string(), state);
        self.order.push(control_id.to_string());
        self.by_raw
            .entry(ids::sanitize_id(raw_id))
            .or_default()
            .push(control_id.to_string());
        true
    }

    pub fn contains(&self, control_id: &str) -> bool {
        self.controls.contains_key(control_id)
    }

    pub fn get(&self, control_id: &str) -> Option<&ControlState> {
        self.controls.get(control_id)
    }

    pub fn get_mut(&mut self, control_id: &str) -> Option<&mut ControlState> {
        self.controls.get_mut(control_id)
    }

    pub fn value(&self, control_id: &str) -> Option<&Value> {
        self.controls.get(control_id).map(|c| &c.value)
    }

    pub fn len(&self) -> usize {
        self.order.len()
    }

    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &ControlState)> {
        self.order
            .iter()
            .filter_map(|id| self.controls.get(id).map(|c| (id.as_str(), c)))
    }

    pub fn ids(&self) -> &[String] {
        &self.order
    }

    pub fn commit_all(&mut self) {
        for control in self.controls.values_mut() {
            control.commit();
        }
    }

    pub fn set_value(&mut self, control_id: &str, value: Value) -> Result<(), EngineError> {
        let control = self
            .controls
            .get_mut(control_id)
            .ok_or_else(|| EngineError::UnknownControl(control_id.to_string()))?;
        control.set(value);
        Ok(())
    }

    /// Resolve a raw field reference. Inside a repeat instance the same
    /// instance's control wins (innermost first); otherwise the first control
    /// registered for the raw id.
    pub fn resolve(&self, raw_id: &str, scope: &[ScopeFrame]) -> Option<&str> {
        for frame in scope.iter().rev() {
            let candidate = ids::instance_control_id(&frame.prefix, frame.index, raw_id);
            if let Some((key, _)) = self.controls.get_key_value(&candidate) {
                return Some(key.as_str());
            }
        }
        self.by_raw
            .get(&ids::sanitize_id(raw_id))
            .and_then(|list| list.first())
            .map(String::as_str)
    }

    /// Current values keyed by identifier.
    pub fn snapshot(&self) -> Map<String, Value> {
        self.iter()
            .map(|(id, c)| (id.to_string(), c.value.clone()))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn frame(prefix: &str, index: u32) -> ScopeFrame {
        ScopeFrame {
            prefix: prefix.into(),
            index,
        }
    }

    #[test]
    fn rebinding_is_a_no_op() {
        let mut set = ControlSet::new();
        assert!(set.bind("a", "a", ControlState::new(json!("first"), false, true)));
        assert!(!set.bind("a", "a", ControlState::new(json!("second"), false, true)));
        assert_eq!(set.value("a"), Some(&json!("first")));
        assert_eq!(set.len(), 1);
    }

    #[test]
    fn resolve_prefers_same_instance() {
        let mut set = ControlSet::new();
        set.bind("c_1_kind", "kind", ControlState::new(Value::Null, false, true));
        set.bind("c_2_kind", "kind", ControlState::new(Value::Null, false, true));
        assert_eq!(set.resolve("kind", &[frame("c_", 2)]), Some("c_2_kind"));
        assert_eq!(set.resolve("kind", &[]), Some("c_1_kind"));
        assert_eq!(set.resolve("missing", &[]), None);
    }

    #[test]
    fn dirty_tracks_initial() {
        let mut state = ControlState::new(json!("x"), false, true);
        state.set(json!("y"));
        assert!(state.dirty);
        state.set(json!("x"));
        assert!(!state.dirty);
    }

    #[test]
    fn hidden_required_is_valid() {
        let mut state = ControlState::new(Value::Null, true, true);
        assert!(!state.is_valid());
        state.visible = false;
        state.disabled = true;
        assert!(state.is_valid());
    }
}
