//! Typed template model.
//!
//! These types are the serde target for the template JSON after it has been
//! normalized (see `normalize`). Unknown properties are kept in `extra` so a
//! template survives a load/save round trip untouched.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

fn default_true() -> bool {
    true
}

// =============================================================================
// TOP-LEVEL TEMPLATE
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TemplateSchema {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub sections: Vec<Section>,
    /// Passed through to the option-source collaborator with every request.
    #[serde(default)]
    pub module_hints: Vec<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl TemplateSchema {
    /// Distinct step tags in section order.
    pub fn steps(&self) -> Vec<&str> {
        let mut steps: Vec<&str> = Vec::new();
        for section in &self.sections {
            if let Some(step) = section.step.as_deref() {
                if !steps.contains(&step) {
                    steps.push(step);
                }
            }
        }
        steps
    }
}

// =============================================================================
// SECTIONS
// =============================================================================

/// A section or subsection. Both share one shape and nest arbitrarily.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub order: Option<f64>,
    /// Explicit repeat identity; falls back to the sanitized title.
    #[serde(default)]
    pub base_key: Option<String>,
    #[serde(default)]
    pub repeat: Option<RepeatSpec>,
    #[serde(default)]
    pub fields: Vec<Field>,
    #[serde(default)]
    pub subsections: Vec<Section>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default = "default_true")]
    pub is_enabled: bool,
    #[serde(default)]
    pub step: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

pub type Subsection = Section;

impl Section {
    pub fn is_repeating(&self) -> bool {
        self.repeat.as_ref().is_some_and(|r| r.enabled)
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RepeatSpec {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub min: Option<u32>,
    #[serde(default)]
    pub max: Option<u32>,
    #[serde(default)]
    pub default_count: Option<u32>,
    /// Instance label, e.g. "Contact" renders as "Contact 2".
    #[serde(default)]
    pub label: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

// =============================================================================
// FIELDS
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Field {
    pub id: String,
    #[serde(rename = "type", default)]
    pub kind: FieldKind,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub required: bool,
    #[serde(default)]
    pub data_source: Option<String>,
    #[serde(default)]
    pub options: Option<Vec<Value>>,
    #[serde(default)]
    pub conditions: Vec<Condition>,
    #[serde(default)]
    pub visibility: Visibility,
    #[serde(default)]
    pub lookup: Option<LookupConfig>,
    #[serde(default)]
    pub default_value: Option<Value>,
    #[serde(default = "default_true")]
    pub is_enabled: bool,
    #[serde(default)]
    pub order: Option<f64>,
    #[serde(default)]
    pub role: Option<FieldRole>,
    /// Number of options the field is declared to allow.
    #[serde(default)]
    pub max_options: Option<u32>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// Closed set of field kinds. Per-kind behavior is decided by matching on this.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    #[default]
    Text,
    Textarea,
    Number,
    Select,
    Multiselect,
    Radio,
    Checkbox,
    Date,
    Datetime,
    Search,
    Button,
    Label,
    #[serde(other)]
    Other,
}

impl FieldKind {
    /// Kinds whose control draws from an option list.
    pub fn takes_options(self) -> bool {
        matches!(
            self,
            FieldKind::Select | FieldKind::Multiselect | FieldKind::Radio | FieldKind::Button
        )
    }

    pub fn is_multi(self) -> bool {
        matches!(self, FieldKind::Multiselect)
    }

    /// Kinds that hold no data of their own.
    pub fn is_decorative(self) -> bool {
        matches!(self, FieldKind::Label)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FieldRole {
    /// Defaults to the current operator on a fresh document.
    Owner,
}

// =============================================================================
// CONDITIONS
// =============================================================================

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ConditionKind {
    #[default]
    Always,
    Equals,
    NotEquals,
    HasValue,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Combinator {
    #[default]
    And,
    Or,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(default)]
    pub field_id: Option<String>,
    #[serde(default)]
    pub kind: ConditionKind,
    #[serde(default)]
    pub value: Value,
    /// How this condition combines with the result accumulated so far.
    #[serde(default)]
    pub combinator: Combinator,
}

/// Legacy single-condition shorthand.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Visibility {
    #[serde(default)]
    pub kind: ConditionKind,
    #[serde(default)]
    pub field_id: Option<String>,
    #[serde(default)]
    pub value: Value,
}

impl Visibility {
    /// The shorthand as a condition, unless it is the `always` default.
    pub fn as_condition(&self) -> Option<Condition> {
        if self.kind == ConditionKind::Always {
            return None;
        }
        Some(Condition {
            field_id: self.field_id.clone(),
            kind: self.kind,
            value: self.value.clone(),
            combinator: Combinator::And,
        })
    }
}

/// The effective condition list: the list form wins whenever it is non-empty.
pub fn effective_conditions(conditions: &[Condition], legacy: &Visibility) -> Vec<Condition> {
    if !conditions.is_empty() {
        return conditions.to_vec();
    }
    legacy.as_condition().into_iter().collect()
}

// =============================================================================
// LOOKUP
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LookupConfig {
    #[serde(default)]
    pub entity: Option<String>,
    /// Collaborator method name used when the entity has no dedicated search.
    #[serde(default)]
    pub method: Option<String>,
    /// Path extracted from the selected object into the field's own control.
    #[serde(default)]
    pub value_path: Option<String>,
    #[serde(default)]
    pub display_paths: Vec<String>,
    #[serde(default)]
    pub fill: Vec<FillMapping>,
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FillMapping {
    /// Raw id of the field receiving the value.
    pub target: String,
    /// Dot path into the selected object.
    pub source: String,
}
