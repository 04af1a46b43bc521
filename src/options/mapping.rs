//! Option rows → `{value, label, raw}`.
//!
//! Sources are schema-tolerant: value and label are looked up through lists of
//! conventional property names before falling back to the raw entry.

use serde::Serialize;
use serde_json::{Map, Value};

use crate::config::EngineConfig;
use crate::state::value::{display_text, scalar_text};

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OptionItem {
    pub value: Value,
    pub label: String,
    /// Source row the option was mapped from.
    #[serde(skip_serializing_if = "Value::is_null")]
    pub raw: Value,
}

/// Static option entry declared on the field.
pub fn map_static_entry(entry: &Value, config: &EngineConfig) -> OptionItem {
    match entry {
        Value::Object(row) => {
            let value = first_property(row, &config.value_properties).cloned();
            let label = first_property(row, &config.label_properties).map(display_text);
            let value = value
                .or_else(|| label.clone().map(Value::String))
                .unwrap_or_else(|| Value::String(entry.to_string()));
            let label = label.unwrap_or_else(|| display_text(&value));
            OptionItem {
                value,
                label,
                raw: entry.clone(),
            }
        }
        other => scalar_option(other),
    }
}

/// Row fetched from a named data source.
pub fn map_source_row(row: &Value, source: &str, config: &EngineConfig) -> OptionItem {
    let Value::Object(map) = row else {
        return scalar_option(row);
    };

    let value = first_property(map, &config.value_properties)
        .cloned()
        .unwrap_or_else(|| Value::String(row.to_string()));

    let preferred = config
        .preferred_labels
        .get(source)
        .and_then(|prop| map.get(prop))
        .filter(|v| scalar_text(v).is_some_and(|s| !s.is_empty()))
        .map(display_text);
    let label = preferred
        .or_else(|| first_property(map, &config.label_properties).map(display_text))
        .or_else(|| first_unskipped_string(map, &config.label_skip_properties))
        .unwrap_or_else(|| display_text(&value));

    OptionItem {
        value,
        label,
        raw: row.clone(),
    }
}

/// A fetched set that is just "Yes"/"No".
pub fn is_yes_no_pair(options: &[OptionItem]) -> bool {
    if options.len() != 2 {
        return false;
    }
    let mut labels: Vec<String> = options.iter().map(|o| o.label.trim().to_lowercase()).collect();
    labels.sort();
    labels == ["no", "yes"]
}

fn scalar_option(entry: &Value) -> OptionItem {
    OptionItem {
        value: entry.clone(),
        label: display_text(entry),
        raw: entry.clone(),
    }
}

fn first_property<'a>(row: &'a Map<String, Value>, keys: &[String]) -> Option<&'a Value> {
    keys.iter()
        .filter_map(|key| row.get(key))
        .find(|v| !v.is_null())
}

fn first_unskipped_string(row: &Map<String, Value>, skip: &[String]) -> Option<String> {
    row.iter()
        .filter(|(key, _)| !skip.iter().any(|s| s == *key))
        .find_map(|(_, value)| match value {
            Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
            _ => None,
        })
}
