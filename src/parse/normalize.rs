//! Template normalizer: raw template JSON → canonical template JSON.
//!
//! Fills structural defaults (`conditions: []`, `visibility: always`), turns
//! keyed subsection/field maps into ordered lists and coerces loosely typed
//! scalars so the typed model can deserialize. Never fails; anything it does
//! not recognize passes through untouched.

use serde_json::{Map, Value, json};

/// Normalize a whole template document.
pub fn normalize_template(raw: Value) -> Value {
    let mut root = match raw {
        Value::Object(map) => map,
        Value::Array(sections) => {
            let mut map = Map::new();
            map.insert("sections".into(), Value::Array(sections));
            map
        }
        _ => Map::new(),
    };

    coerce_string(&mut root, "id");
    let sections = root.remove("sections").unwrap_or(Value::Null);
    let sections = keyed_list(sections)
        .into_iter()
        .filter_map(|(key, section)| normalize_group(section, key.as_deref()))
        .collect();
    root.insert("sections".into(), Value::Array(sections));

    let hints = match root.remove("moduleHints") {
        Some(Value::Array(items)) => items.into_iter().filter_map(scalar_string).collect(),
        Some(Value::String(single)) => vec![single],
        _ => Vec::new(),
    };
    root.insert("moduleHints".into(), json!(hints));

    Value::Object(root)
}

/// Normalize one section or subsection. Returns `None` for non-object input.
pub fn normalize_group(raw: Value, fallback_title: Option<&str>) -> Option<Value> {
    let Value::Object(mut group) = raw else {
        return None;
    };

    coerce_string(&mut group, "title");
    let has_title = group
        .get("title")
        .and_then(Value::as_str)
        .is_some_and(|t| !t.trim().is_empty());
    if !has_title {
        if let Some(fallback) = fallback_title {
            group.insert("title".into(), Value::String(fallback.to_string()));
        }
    }

    coerce_string(&mut group, "baseKey");
    coerce_string(&mut group, "step");
    coerce_number(&mut group, "order");
    coerce_bool(&mut group, "isEnabled");
    normalize_condition_slots(&mut group);

    if let Some(repeat) = group.remove("repeat") {
        if let Some(repeat) = normalize_repeat(repeat) {
            group.insert("repeat".into(), repeat);
        }
    }

    let fields = group.remove("fields").unwrap_or(Value::Null);
    let fields: Vec<Value> = keyed_list(fields)
        .into_iter()
        .filter_map(|(key, field)| normalize_field(field, key.as_deref()))
        .collect();
    group.insert("fields".into(), Value::Array(fields));

    if !group.contains_key("subsections") {
        if let Some(alt) = group.remove("subSections") {
            group.insert("subsections".into(), alt);
        }
    }
    let subsections = group.remove("subsections").unwrap_or(Value::Null);
    let subsections: Vec<Value> = keyed_list(subsections)
        .into_iter()
        .filter_map(|(key, sub)| normalize_group(sub, key.as_deref()))
        .collect();
    group.insert("subsections".into(), Value::Array(subsections));

    Some(Value::Object(group))
}

/// Normalize one field. Fields without any usable id are dropped.
pub fn normalize_field(raw: Value, fallback_id: Option<&str>) -> Option<Value> {
    let Value::Object(mut field) = raw else {
        return None;
    };

    if !field.contains_key("id") {
        if let Some(alt) = field.remove("fieldId") {
            field.insert("id".into(), alt);
        }
    }
    coerce_string(&mut field, "id");
    if !field.contains_key("id") {
        let fallback = fallback_id?;
        field.insert("id".into(), Value::String(fallback.to_string()));
    }

    let kind = field
        .get("type")
        .and_then(scalar_ref_string)
        .map(|t| canonical_kind(&t))
        .unwrap_or("text");
    field.insert("type".into(), Value::String(kind.to_string()));

    coerce_string(&mut field, "name");
    if !field.contains_key("name") {
        let name = field
            .get("label")
            .and_then(scalar_ref_string)
            .or_else(|| field.get("id").and_then(scalar_ref_string))
            .unwrap_or_default();
        field.insert("name".into(), Value::String(name));
    }

    if !field.contains_key("defaultValue") {
        if let Some(default) = field.get("default").cloned() {
            field.insert("defaultValue".into(), default);
        }
    }
    if !field.contains_key("dataSource") {
        if let Some(source) = field.get("dataSourceName").cloned() {
            field.insert("dataSource".into(), source);
        }
    }

    coerce_string(&mut field, "dataSource");
    if field
        .get("dataSource")
        .and_then(Value::as_str)
        .is_some_and(|s| s.trim().is_empty())
    {
        field.remove("dataSource");
    }
    coerce_bool(&mut field, "required");
    coerce_bool(&mut field, "isEnabled");
    coerce_number(&mut field, "order");
    coerce_count(&mut field, "maxOptions");
    normalize_condition_slots(&mut field);

    if let Some(role) = field.remove("role") {
        if let Some(role) = scalar_string(role).and_then(|r| canonical_role(&r)) {
            field.insert("role".into(), Value::String(role.into()));
        }
    }

    match field.get("options") {
        Some(Value::Array(_)) | None => {}
        Some(_) => {
            field.remove("options");
        }
    }

    if let Some(lookup) = field.remove("lookup") {
        if let Some(lookup) = normalize_lookup(lookup) {
            field.insert("lookup".into(), lookup);
        }
    }

    Some(Value::Object(field))
}

// =============================================================================
// CONDITIONS
// =============================================================================

fn normalize_condition_slots(target: &mut Map<String, Value>) {
    let conditions = match target.remove("conditions") {
        Some(Value::Array(items)) => items.into_iter().filter_map(normalize_condition).collect(),
        Some(single @ Value::Object(_)) => normalize_condition(single).into_iter().collect(),
        _ => Vec::new(),
    };
    target.insert("conditions".into(), Value::Array(conditions));

    let visibility = target
        .remove("visibility")
        .and_then(normalize_condition)
        .map(|mut v| {
            if let Value::Object(map) = &mut v {
                map.remove("combinator");
            }
            v
        })
        .unwrap_or_else(|| json!({ "kind": "always" }));
    target.insert("visibility".into(), visibility);
}

fn normalize_condition(raw: Value) -> Option<Value> {
    let Value::Object(mut cond) = raw else {
        return None;
    };

    for alt in ["field", "refFieldId", "dependsOn"] {
        if cond.contains_key("fieldId") {
            break;
        }
        if let Some(value) = cond.remove(alt) {
            cond.insert("fieldId".into(), value);
        }
    }
    coerce_string(&mut cond, "fieldId");

    if !cond.contains_key("kind") {
        if let Some(alt) = cond.remove("operator").or_else(|| cond.remove("type")) {
            cond.insert("kind".into(), alt);
        }
    }
    let kind = cond
        .get("kind")
        .and_then(scalar_ref_string)
        .map(|k| canonical_condition_kind(&k))
        .unwrap_or("always");
    cond.insert("kind".into(), Value::String(kind.into()));

    let combinator = cond
        .get("combinator")
        .or_else(|| cond.get("logic"))
        .and_then(scalar_ref_string)
        .map(|c| c.trim().to_ascii_uppercase())
        .filter(|c| c == "OR")
        .unwrap_or_else(|| "AND".into());
    cond.remove("logic");
    cond.insert("combinator".into(), Value::String(combinator));

    if !cond.contains_key("value") {
        cond.insert("value".into(), Value::Null);
    }

    Some(Value::Object(cond))
}

fn canonical_condition_kind(raw: &str) -> &'static str {
    let key: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();
    match key.as_str() {
        "equals" | "equal" | "eq" | "is" => "equals",
        "notequals" | "notequal" | "neq" | "ne" | "isnot" => "notEquals",
        "hasvalue" | "notempty" | "exists" | "filled" => "hasValue",
        // Unknown comparison kinds never hide input.
        _ => "always",
    }
}

// =============================================================================
// REPEAT / LOOKUP
// =============================================================================

fn normalize_repeat(raw: Value) -> Option<Value> {
    match raw {
        Value::Bool(enabled) => Some(json!({ "enabled": enabled })),
        Value::Object(mut repeat) => {
            if !repeat.contains_key("defaultCount") {
                if let Some(alt) = repeat.remove("default") {
                    repeat.insert("defaultCount".into(), alt);
                }
            }
            coerce_bool(&mut repeat, "enabled");
            coerce_count(&mut repeat, "min");
            coerce_count(&mut repeat, "max");
            coerce_count(&mut repeat, "defaultCount");
            coerce_string(&mut repeat, "label");
            Some(Value::Object(repeat))
        }
        _ => None,
    }
}

fn normalize_lookup(raw: Value) -> Option<Value> {
    let Value::Object(mut lookup) = raw else {
        return None;
    };
    coerce_string(&mut lookup, "entity");
    coerce_string(&mut lookup, "method");
    coerce_string(&mut lookup, "valuePath");
    coerce_count(&mut lookup, "limit");

    let display = match lookup.remove("displayPaths") {
        Some(Value::Array(items)) => items.into_iter().filter_map(scalar_string).collect(),
        Some(Value::String(single)) => vec![single],
        _ => Vec::new(),
    };
    lookup.insert("displayPaths".into(), json!(display));

    let fill: Vec<Value> = match lookup.remove("fill") {
        Some(Value::Array(items)) => items
            .into_iter()
            .filter_map(|item| {
                let Value::Object(mut pair) = item else {
                    return None;
                };
                coerce_string(&mut pair, "target");
                coerce_string(&mut pair, "source");
                (pair.contains_key("target") && pair.contains_key("source"))
                    .then_some(Value::Object(pair))
            })
            .collect(),
        // `{ "targetId": "source.path" }` map form
        Some(Value::Object(map)) => map
            .into_iter()
            .filter_map(|(target, source)| {
                scalar_string(source).map(|source| json!({ "target": target, "source": source }))
            })
            .collect(),
        _ => Vec::new(),
    };
    lookup.insert("fill".into(), Value::Array(fill));

    Some(Value::Object(lookup))
}

// =============================================================================
// SCALAR COERCION
// =============================================================================

fn canonical_kind(raw: &str) -> &'static str {
    match raw.trim().to_ascii_lowercase().as_str() {
        "text" | "string" | "input" | "email" | "phone" => "text",
        "textarea" | "multiline" => "textarea",
        "number" | "numeric" | "integer" | "decimal" | "currency" => "number",
        "select" | "dropdown" | "combo" => "select",
        "multiselect" | "multi-select" | "multi_select" => "multiselect",
        "radio" => "radio",
        "checkbox" | "bool" | "boolean" | "toggle" => "checkbox",
        "date" => "date",
        "datetime" | "datetime-local" | "timestamp" => "datetime",
        "search" | "lookup" | "autocomplete" => "search",
        "button" | "buttons" | "buttongroup" => "button",
        "label" | "heading" | "static" => "label",
        _ => "other",
    }
}

fn canonical_role(raw: &str) -> Option<&'static str> {
    let key: String = raw
        .chars()
        .filter(|c| c.is_ascii_alphanumeric())
        .collect::<String>()
        .to_ascii_lowercase();
    match key.as_str() {
        "owner" | "assignee" => Some("owner"),
        _ => None,
    }
}

/// Pair each entry of a list or keyed map with its key (maps only).
fn keyed_list(raw: Value) -> Vec<(Option<String>, Value)> {
    match raw {
        Value::Array(items) => items.into_iter().map(|v| (None, v)).collect(),
        Value::Object(map) => map.into_iter().map(|(k, v)| (Some(k), v)).collect(),
        _ => Vec::new(),
    }
}

fn scalar_ref_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    }
}

fn scalar_string(value: Value) -> Option<String> {
    scalar_ref_string(&value)
}

fn coerce_string(map: &mut Map<String, Value>, key: &str) {
    let Some(value) = map.remove(key) else { return };
    if let Some(s) = scalar_string(value) {
        map.insert(key.into(), Value::String(s));
    }
}

fn coerce_bool(map: &mut Map<String, Value>, key: &str) {
    let Some(value) = map.remove(key) else { return };
    let coerced = match value {
        Value::Bool(b) => Some(b),
        Value::Number(n) => n.as_f64().map(|f| f != 0.0),
        Value::String(s) => match s.trim().to_ascii_lowercase().as_str() {
            "true" | "yes" | "y" | "1" => Some(true),
            "false" | "no" | "n" | "0" | "" => Some(false),
            _ => None,
        },
        _ => None,
    };
    if let Some(b) = coerced {
        map.insert(key.into(), Value::Bool(b));
    }
}

fn coerce_number(map: &mut Map<String, Value>, key: &str) {
    let Some(value) = map.remove(key) else { return };
    let coerced = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    if let Some(n) = coerced.and_then(serde_json::Number::from_f64) {
        map.insert(key.into(), Value::Number(n));
    }
}

/// Non-negative integer, or the key is dropped.
fn coerce_count(map: &mut Map<String, Value>, key: &str) {
    let Some(value) = map.remove(key) else { return };
    let coerced = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => s.trim().parse::<f64>().ok(),
        _ => None,
    };
    if let Some(n) = coerced.filter(|n| n.is_finite() && *n >= 0.0) {
        map.insert(key.into(), json!(n.trunc() as u64));
    }
}
