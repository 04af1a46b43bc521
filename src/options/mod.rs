//! Option source resolver: static and externally sourced option lists.
//!
//! External sources are fetched through a request/response exchange with the
//! host. Every request carries the build generation it was issued for; a
//! teardown (template or step switch) bumps the generation so late responses
//! are dropped instead of landing on a discarded render tree.

pub mod dependent;
pub mod mapping;

use std::collections::{BTreeMap, HashMap, HashSet};

use serde::Serialize;
use serde_json::Value;

use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::render::types::RenderTree;
use crate::state::control::ControlSet;
use crate::state::value::{empty_like, has_value, loosely_equal, unwrap_value};

pub use dependent::{DependencyGraph, filter_options};
pub use mapping::{OptionItem, is_yes_no_pair, map_source_row, map_static_entry};

/// Options bound to one control.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionState {
    /// External source name; `None` for static lists.
    pub source: Option<String>,
    /// Every option the source produced.
    pub all: Vec<OptionItem>,
    /// Options currently offered (narrowed by a dependent parent).
    pub available: Vec<OptionItem>,
    pub loaded: bool,
    #[serde(skip)]
    pub max_options: Option<u32>,
}

/// A source the host must fetch and answer with `receive`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OptionRequest {
    pub generation: u64,
    pub source: String,
    pub module_hints: Vec<String>,
}

#[derive(Debug, Default)]
pub struct OptionResolver {
    generation: u64,
    /// Raw rows per source for the current template build.
    cache: HashMap<String, Vec<Value>>,
    in_flight: HashSet<String>,
    /// Control identifier → options.
    states: BTreeMap<String, OptionState>,
}

impl OptionResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn generation(&self) -> u64 {
        self.generation
    }

    /// Invalidate outstanding requests and drop the source cache.
    pub fn teardown(&mut self) {
        self.generation += 1;
        self.cache.clear();
        self.in_flight.clear();
        self.states.clear();
        tracing::debug!(generation = self.generation, "option sources torn down");
    }

    /// Attach options to every option-bearing control of a freshly built tree.
    /// Sources already in the cache are served from it.
    pub fn bind(&mut self, tree: &RenderTree, config: &EngineConfig) {
        self.states.clear();
        for render_field in tree.fields() {
            let field = &render_field.field;
            if !field.kind.takes_options() {
                continue;
            }
            let declared = field.options.as_deref().filter(|o| !o.is_empty());
            let source = field.data_source.as_deref().filter(|s| !s.trim().is_empty());

            let state = match (declared, source) {
                (Some(entries), _) => {
                    let all: Vec<OptionItem> = entries.iter().map(|e| map_static_entry(e, config)).collect();
                    OptionState {
                        source: None,
                        available: all.clone(),
                        all,
                        loaded: true,
                        max_options: field.max_options,
                    }
                }
                (None, Some(source)) => {
                    let mut state = OptionState {
                        source: Some(source.to_string()),
                        max_options: field.max_options,
                        ..OptionState::default()
                    };
                    if let Some(rows) = self.cache.get(source) {
                        fill_from_rows(&mut state, source, rows, config);
                    }
                    state
                }
                (None, None) => OptionState {
                    loaded: true,
                    max_options: field.max_options,
                    ..OptionState::default()
                },
            };
            self.states.insert(render_field.control_id.clone(), state);
        }
    }

    /// One request per source that is neither cached nor already requested.
    pub fn pending_requests(&mut self, module_hints: &[String]) -> Vec<OptionRequest> {
        let mut requests = Vec::new();
        for state in self.states.values() {
            let Some(source) = state.source.as_deref() else {
                continue;
            };
            if state.loaded || self.cache.contains_key(source) || self.in_flight.contains(source) {
                continue;
            }
            self.in_flight.insert(source.to_string());
            requests.push(OptionRequest {
                generation: self.generation,
                source: source.to_string(),
                module_hints: module_hints.to_vec(),
            });
        }
        requests
    }

    /// Apply a host response. Returns `false` when the response belongs to a
    /// torn-down build and was discarded.
    pub fn receive(
        &mut self,
        generation: u64,
        source: &str,
        rows: Result<Vec<Value>, EngineError>,
        config: &EngineConfig,
    ) -> bool {
        if generation != self.generation {
            tracing::debug!(source, generation, current = self.generation, "stale option response discarded");
            return false;
        }
        self.in_flight.remove(source);

        let rows = match rows {
            Ok(rows) => {
                self.cache.insert(source.to_string(), rows.clone());
                rows
            }
            Err(e) => {
                tracing::warn!(source, error = %e, "option source failed, showing no options");
                Vec::new()
            }
        };
        for state in self.states.values_mut() {
            if state.source.as_deref() == Some(source) {
                fill_from_rows(state, source, &rows, config);
            }
        }
        true
    }

    pub fn state(&self, control_id: &str) -> Option<&OptionState> {
        self.states.get(control_id)
    }

    pub fn options_for(&self, control_id: &str) -> Option<&[OptionItem]> {
        self.states.get(control_id).map(|s| s.available.as_slice())
    }

    /// Rewrite values that only match an option after coercion to that
    /// option's exact value. Returns the rewritten identifiers.
    pub fn reconcile(&self, controls: &mut ControlSet) -> Vec<String> {
        let mut rewritten = Vec::new();
        for (control_id, state) in &self.states {
            if !state.loaded || state.all.is_empty() {
                continue;
            }
            let Some(control) = controls.get_mut(control_id) else {
                continue;
            };
            let next = match &control.value {
                Value::Array(items) => {
                    let mapped: Vec<Value> = items.iter().map(|v| exact_option_value(&state.all, v)).collect();
                    Value::Array(mapped)
                }
                Value::Null => continue,
                other => exact_option_value(&state.all, other),
            };
            if next != control.value {
                control.set(next);
                rewritten.push(control_id.clone());
            }
        }
        if !rewritten.is_empty() {
            tracing::debug!(count = rewritten.len(), "option values reconciled");
        }
        rewritten
    }

    /// Refresh every dependent child from its parent's current value, parents
    /// first. Returns `true` when any control or option list changed.
    pub fn refresh_dependents(
        &mut self,
        graph: &DependencyGraph,
        config: &EngineConfig,
        controls: &mut ControlSet,
    ) -> bool {
        if graph.is_empty() {
            return false;
        }
        let mut changed = false;
        for (parent_id, child_id, rule_index) in graph.ordered_edges() {
            let Some(rule) = config.dependent_rules.get(rule_index) else {
                continue;
            };
            let parent_value = controls.value(parent_id).cloned().unwrap_or(Value::Null);
            let Some(child) = controls.get_mut(child_id) else {
                continue;
            };
            let state = self.states.get_mut(child_id);

            if !has_value(&parent_value) {
                if !child.dependency_locked || !child.disabled {
                    child.dependency_locked = true;
                    child.disabled = true;
                    changed = true;
                }
                if has_value(&child.value) {
                    let empty = empty_like(&child.value);
                    child.set(empty);
                    changed = true;
                }
                if let Some(state) = state.filter(|s| !s.available.is_empty()) {
                    state.available.clear();
                    changed = true;
                }
                continue;
            }

            if child.dependency_locked {
                child.dependency_locked = false;
                child.disabled = !child.should_enable();
                changed = true;
            }
            let Some(state) = state else {
                continue;
            };
            let allowed = filter_options(&state.all, &rule.link_property, &parent_value);
            if allowed != state.available {
                state.available = allowed;
                changed = true;
            }
            if state.loaded && has_value(&child.value) && !value_allowed(&state.available, &child.value) {
                tracing::debug!(control_id = child_id, parent = parent_id, "dependent value left allowed set");
                let empty = empty_like(&child.value);
                child.set(empty);
                changed = true;
            }
        }
        changed
    }
}

fn fill_from_rows(state: &mut OptionState, source: &str, rows: &[Value], config: &EngineConfig) {
    let mut all: Vec<OptionItem> = rows.iter().map(|row| map_source_row(row, source, config)).collect();
    if state.max_options.is_some_and(|max| max > 2) && is_yes_no_pair(&all) {
        tracing::warn!(source, "yes/no options fetched for a wider field, voided");
        all.clear();
    }
    state.available = all.clone();
    state.all = all;
    state.loaded = true;
}

fn exact_option_value(options: &[OptionItem], value: &Value) -> Value {
    options
        .iter()
        .find(|o| loosely_equal(&o.value, value))
        .map(|o| o.value.clone())
        .unwrap_or_else(|| value.clone())
}

fn value_allowed(options: &[OptionItem], value: &Value) -> bool {
    match unwrap_value(value) {
        Value::Array(items) => items
            .iter()
            .all(|item| options.iter().any(|o| loosely_equal(&o.value, item))),
        other => options.iter().any(|o| loosely_equal(&o.value, other)),
    }
}
