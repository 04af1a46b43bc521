//! Lookup/autofill resolver for search fields.
//!
//! A search field resolves to an entity, asks the host's `SearchProvider` for
//! candidates and, once the user picks one, writes the selection into its own
//! control and copies configured properties into sibling controls. Fill targets
//! resolve inside the same repeat instance as the search field.

use std::collections::HashMap;

use serde::Serialize;
use serde_json::Value;

use crate::collab::SearchRequest;
use crate::config::EngineConfig;
use crate::error::EngineError;
use crate::parse::types::{Field, FieldKind, FillMapping};
use crate::render::repeat::RemovedInstance;
use crate::render::types::RenderField;
use crate::state::control::ControlSet;
use crate::state::value::{display_text, extract_path};

/// A field's lookup settings merged with its entity defaults.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedLookup {
    pub entity: String,
    pub method: Option<String>,
    pub value_path: Option<String>,
    pub display_paths: Vec<String>,
    pub fill: Vec<FillMapping>,
    pub limit: usize,
}

impl ResolvedLookup {
    /// Text shown for a selected object: the display paths joined with
    /// `" - "`, else the first label-like property.
    pub fn display(&self, selected: &Value, config: &EngineConfig) -> String {
        let parts: Vec<String> = self
            .display_paths
            .iter()
            .filter_map(|path| extract_path(selected, path))
            .map(display_text)
            .filter(|s| !s.trim().is_empty())
            .collect();
        if !parts.is_empty() {
            return parts.join(" - ");
        }
        let Value::Object(row) = selected else {
            return display_text(selected);
        };
        config
            .label_properties
            .iter()
            .chain(config.value_properties.iter())
            .filter_map(|key| row.get(key))
            .map(display_text)
            .find(|s| !s.trim().is_empty())
            .unwrap_or_else(|| selected.to_string())
    }

    /// Value stored in the search field itself.
    fn stored_value(&self, selected: &Value, config: &EngineConfig) -> Value {
        self.value_path
            .as_deref()
            .and_then(|path| extract_path(selected, path))
            .filter(|v| !v.is_null())
            .cloned()
            .unwrap_or_else(|| Value::String(self.display(selected, config)))
    }
}

/// Lookup settings for a field, or `None` when it is not a lookup field or no
/// entity can be determined.
pub fn resolve_lookup(field: &Field, config: &EngineConfig) -> Option<ResolvedLookup> {
    if field.kind != FieldKind::Search && field.lookup.is_none() {
        return None;
    }
    let own = field.lookup.clone().unwrap_or_default();
    let entity = own
        .entity
        .clone()
        .filter(|e| !e.trim().is_empty())
        .or_else(|| infer_entity(field, config))
        .or_else(|| field.data_source.clone().filter(|s| !s.trim().is_empty()));
    let Some(entity) = entity else {
        tracing::warn!(field_id = %field.id, "search field has no resolvable entity");
        return None;
    };

    let defaults = config.lookup_entities.get(&entity).cloned().unwrap_or_default();
    Some(ResolvedLookup {
        method: own.method.or(defaults.method),
        value_path: own.value_path.or(defaults.value_path),
        display_paths: if own.display_paths.is_empty() {
            defaults.display_paths
        } else {
            own.display_paths
        },
        fill: if own.fill.is_empty() { defaults.fill } else { own.fill },
        limit: own.limit.unwrap_or(config.default_search_limit),
        entity,
    })
}

/// Match the field's source, id and name against configured entity names and
/// keywords.
fn infer_entity(field: &Field, config: &EngineConfig) -> Option<String> {
    let haystack = format!(
        "{} {} {}",
        field.data_source.as_deref().unwrap_or_default(),
        field.id,
        field.name
    )
    .to_lowercase();
    config
        .lookup_entities
        .iter()
        .find(|(name, defaults)| {
            haystack.contains(&name.to_lowercase())
                || defaults
                    .keywords
                    .iter()
                    .any(|k| !k.trim().is_empty() && haystack.contains(&k.to_lowercase()))
        })
        .map(|(name, _)| name.clone())
}

pub fn search_request(lookup: &ResolvedLookup, query: &str) -> SearchRequest {
    SearchRequest {
        entity: lookup.entity.clone(),
        method: lookup.method.clone(),
        query: query.trim().to_string(),
        limit: lookup.limit,
    }
}

/// Selected objects per search control, for the current template build.
#[derive(Debug, Default)]
pub struct LookupResolver {
    selections: HashMap<String, Value>,
}

impl LookupResolver {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn reset(&mut self) {
        self.selections.clear();
    }

    /// Follow a repeat removal: the removed instance's selections go, later
    /// instances move down with their controls.
    pub fn shift(&mut self, removed: &RemovedInstance) {
        removed.shift(&mut self.selections);
    }

    /// Store a selection and apply its fill pairs. Returns every identifier
    /// written, the search control first.
    pub fn select(
        &mut self,
        render_field: &RenderField,
        lookup: &ResolvedLookup,
        selected: Value,
        config: &EngineConfig,
        controls: &mut ControlSet,
    ) -> Result<Vec<String>, EngineError> {
        let control_id = render_field.control_id.as_str();
        controls.set_value(control_id, lookup.stored_value(&selected, config))?;
        let mut written = vec![control_id.to_string()];

        for mapping in &lookup.fill {
            let Some(target) = controls.resolve(&mapping.target, &render_field.scope).map(str::to_string) else {
                tracing::debug!(target = %mapping.target, control_id, "fill target not rendered");
                continue;
            };
            let value = extract_path(&selected, &mapping.source).cloned().unwrap_or(Value::Null);
            controls.set_value(&target, value)?;
            written.push(target);
        }

        self.selections.insert(control_id.to_string(), selected);
        Ok(written)
    }

    /// Null the search control and every fill target.
    pub fn clear(
        &mut self,
        render_field: &RenderField,
        lookup: &ResolvedLookup,
        controls: &mut ControlSet,
    ) -> Result<Vec<String>, EngineError> {
        let control_id = render_field.control_id.as_str();
        controls.set_value(control_id, Value::Null)?;
        let mut written = vec![control_id.to_string()];
        for mapping in &lookup.fill {
            if let Some(target) = controls.resolve(&mapping.target, &render_field.scope).map(str::to_string) {
                controls.set_value(&target, Value::Null)?;
                written.push(target);
            }
        }
        self.selections.remove(control_id);
        Ok(written)
    }

    /// Display text of the cached selection.
    pub fn display_label(&self, control_id: &str, lookup: &ResolvedLookup, config: &EngineConfig) -> Option<String> {
        self.selections
            .get(control_id)
            .map(|selected| lookup.display(selected, config))
    }
}
