//! Parse phase: template JSON → normalized JSON → typed `TemplateSchema`.

pub mod normalize;
pub mod types;

pub use types::*;

use serde_json::Value;

use crate::error::EngineError;

/// Deserialize a template JSON string into a `TemplateSchema`.
pub fn parse(json: &str) -> Result<TemplateSchema, EngineError> {
    let raw: Value =
        serde_json::from_str(json).map_err(|e| EngineError::TemplateParse(e.to_string()))?;
    from_value(raw)
}

/// Normalize and deserialize an already-parsed template document.
pub fn from_value(raw: Value) -> Result<TemplateSchema, EngineError> {
    let normalized = normalize::normalize_template(raw);
    serde_json::from_value(normalized).map_err(|e| EngineError::TemplateParse(e.to_string()))
}

/// Like `parse`, but a malformed template renders as an empty one.
pub fn parse_lenient(json: &str) -> TemplateSchema {
    match parse(json) {
        Ok(template) => template,
        Err(e) => {
            tracing::warn!(error = %e, "template rejected, rendering empty form");
            TemplateSchema::default()
        }
    }
}
