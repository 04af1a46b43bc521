//! Engine configuration.
//!
//! Everything the engine needs beyond the template itself: the dependent
//! dropdown rule table, option label preferences and lookup entity defaults.
//! Every field has a default, so `{}` is a valid configuration.

use std::collections::{BTreeMap, HashMap};

use serde::{Deserialize, Serialize};

use crate::parse::types::FillMapping;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EngineConfig {
    /// `{child source, parent source, link property}` rules.
    pub dependent_rules: Vec<DependentRule>,
    /// Source name → row property preferred as the option label.
    pub preferred_labels: HashMap<String, String>,
    /// Properties tried, in order, for an option's value.
    pub value_properties: Vec<String>,
    /// Properties tried, in order, for an option's label.
    pub label_properties: Vec<String>,
    /// Properties never used as a fallback label.
    pub label_skip_properties: Vec<String>,
    /// Entity name → search defaults.
    pub lookup_entities: BTreeMap<String, EntityDefaults>,
    /// Fall back to matching "owner" in field ids and names when a field
    /// carries no explicit role.
    pub infer_roles: bool,
    /// Default value that expands to the current timestamp.
    pub timestamp_token: String,
    /// Upper bound used when a repeat spec declares none.
    pub repeat_fallback_max: u32,
    pub default_search_limit: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            dependent_rules: Vec::new(),
            preferred_labels: HashMap::new(),
            value_properties: strings(&["value", "id", "code", "key"]),
            label_properties: strings(&["label", "name", "text", "title", "description", "displayName"]),
            label_skip_properties: strings(&[
                "id",
                "code",
                "value",
                "key",
                "createdBy",
                "updatedBy",
                "createdAt",
                "updatedAt",
                "status",
            ]),
            lookup_entities: BTreeMap::new(),
            infer_roles: true,
            timestamp_token: "D".into(),
            repeat_fallback_max: 99,
            default_search_limit: 10,
        }
    }
}

impl EngineConfig {
    /// Parse a configuration document; malformed input yields the defaults.
    pub fn from_json(json: &str) -> Self {
        match serde_json::from_str(json) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(error = %e, "engine config rejected, using defaults");
                EngineConfig::default()
            }
        }
    }

    pub fn with_dependent_rule(mut self, child: &str, parent: &str, link: &str) -> Self {
        self.dependent_rules.push(DependentRule {
            child_source: child.into(),
            parent_source: parent.into(),
            link_property: link.into(),
        });
        self
    }

    pub fn with_entity(mut self, name: &str, defaults: EntityDefaults) -> Self {
        self.lookup_entities.insert(name.into(), defaults);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DependentRule {
    pub child_source: String,
    pub parent_source: String,
    /// Row property on the child's source rows holding the parent value(s).
    pub link_property: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct EntityDefaults {
    /// Extra words that identify this entity in a field's source or id.
    pub keywords: Vec<String>,
    pub method: Option<String>,
    pub value_path: Option<String>,
    pub display_paths: Vec<String>,
    pub fill: Vec<FillMapping>,
}

fn strings(items: &[&str]) -> Vec<String> {
    items.iter().map(|s| s.to_string()).collect()
}
