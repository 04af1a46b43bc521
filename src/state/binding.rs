//! Control binding: one `ControlState` per render field.

use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::{Map, Value};

use crate::config::EngineConfig;
use crate::parse::types::{Field, FieldKind, FieldRole};
use crate::render::types::RenderTree;

use super::control::{ControlSet, ControlState};
use super::value::has_value;

pub struct BindingContext<'a> {
    /// Values replayed onto matching identifiers (persisted document or the
    /// pre-rebuild snapshot).
    pub snapshot: &'a Map<String, Value>,
    pub operator_id: Option<&'a str>,
    /// A document has already been persisted for this form.
    pub has_persisted: bool,
    pub config: &'a EngineConfig,
    pub now: DateTime<Utc>,
}

/// Bind every render field not yet bound. Returns how many were added.
pub fn bind_controls(tree: &RenderTree, controls: &mut ControlSet, ctx: &BindingContext<'_>) -> usize {
    let mut bound = 0;
    for render_field in tree.fields() {
        if controls.contains(&render_field.control_id) {
            continue;
        }
        let field = &render_field.field;
        let value = initial_value(field, ctx.snapshot.get(&render_field.control_id), ctx);
        let required = field.required && !field.kind.is_decorative();
        let state = ControlState::new(value, required, field.is_enabled);
        if controls.bind(&render_field.control_id, &field.id, state) {
            bound += 1;
        }
    }
    bound
}

/// Initial value of a control: a replayed value wins, then the template default
/// with the timestamp token, checkbox and owner rules applied.
pub fn initial_value(field: &Field, replayed: Option<&Value>, ctx: &BindingContext<'_>) -> Value {
    if let Some(value) = replayed {
        return value.clone();
    }

    if field.kind == FieldKind::Checkbox {
        return Value::Bool(field.is_enabled);
    }

    let default = match &field.default_value {
        Some(Value::String(token)) if *token == ctx.config.timestamp_token => {
            Value::String(ctx.now.to_rfc3339_opts(SecondsFormat::Secs, true))
        }
        Some(value) => value.clone(),
        None => Value::Null,
    };

    if !has_value(&default) && !ctx.has_persisted && is_owner(field, ctx.config) {
        if let Some(operator) = ctx.operator_id {
            return Value::String(operator.to_string());
        }
    }

    if field.kind.is_multi() && default.is_null() {
        return Value::Array(Vec::new());
    }
    default
}

/// Explicit role first; substring inference only when enabled in the config.
pub fn is_owner(field: &Field, config: &EngineConfig) -> bool {
    match field.role {
        Some(FieldRole::Owner) => true,
        None if config.infer_roles => {
            let id = field.id.to_ascii_lowercase();
            let name = field.name.to_ascii_lowercase();
            id.contains("owner") || name.contains("owner")
        }
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn field(json: Value) -> Field {
        let normalized = crate::parse::normalize::normalize_field(json, None).unwrap();
        serde_json::from_value(normalized).unwrap()
    }

    fn ctx<'a>(snapshot: &'a Map<String, Value>, config: &'a EngineConfig, persisted: bool) -> BindingContext<'a> {
        BindingContext {
            snapshot,
            operator_id: Some("op-7"),
            has_persisted: persisted,
            config,
            now: DateTime::parse_from_rfc3339("2024-03-01T10:00:00Z").unwrap().with_timezone(&Utc),
        }
    }

    #[test]
    fn timestamp_token_expands() {
        let config = EngineConfig::default();
        let snapshot = Map::new();
        let f = field(json!({ "id": "opened", "type": "datetime", "defaultValue": "D" }));
        assert_eq!(initial_value(&f, None, &ctx(&snapshot, &config, false)), json!("2024-03-01T10:00:00Z"));
    }

    #[test]
    fn checkbox_default_follows_enabled_flag() {
        let config = EngineConfig::default();
        let snapshot = Map::new();
        let on = field(json!({ "id": "agree", "type": "checkbox" }));
        let off = field(json!({ "id": "agree", "type": "checkbox", "isEnabled": false }));
        assert_eq!(initial_value(&on, None, &ctx(&snapshot, &config, false)), json!(true));
        assert_eq!(initial_value(&off, None, &ctx(&snapshot, &config, false)), json!(false));
    }

    #[test]
    fn owner_defaults_only_on_fresh_documents() {
        let config = EngineConfig::default();
        let snapshot = Map::new();
        let f = field(json!({ "id": "caseOwner" }));
        assert_eq!(initial_value(&f, None, &ctx(&snapshot, &config, false)), json!("op-7"));
        assert_eq!(initial_value(&f, None, &ctx(&snapshot, &config, true)), Value::Null);
        assert_eq!(
            initial_value(&f, Some(&json!("someone")), &ctx(&snapshot, &config, false)),
            json!("someone")
        );
    }

    #[test]
    fn role_inference_can_be_disabled() {
        let config = EngineConfig {
            infer_roles: false,
            ..EngineConfig::default()
        };
        let implicit = field(json!({ "id": "caseOwner" }));
        let explicit = field(json!({ "id": "assignedTo", "role": "owner" }));
        assert!(!is_owner(&implicit, &config));
        assert!(is_owner(&explicit, &config));
    }
}
