//! WASM entry points for browser use.
//!
//! Values cross the boundary as JSON text going in and plain JS objects coming
//! out. The host performs option fetches and searches itself and feeds the
//! results back.

use serde::Serialize;
use serde_json::Value;
use wasm_bindgen::prelude::*;

use crate::config::EngineConfig;
use crate::engine::FormEngine;
use crate::error::{EngineError, RequiredViolation};

#[wasm_bindgen]
pub struct WasmFormEngine {
    inner: FormEngine,
}

#[wasm_bindgen]
impl WasmFormEngine {
    /// Build an engine. Malformed template or config JSON falls back to an
    /// empty form and default configuration.
    #[wasm_bindgen(constructor)]
    pub fn new(template_json: &str, config_json: Option<String>, operator_id: Option<String>) -> WasmFormEngine {
        let config = config_json
            .as_deref()
            .map(EngineConfig::from_json)
            .unwrap_or_default();
        let mut inner = FormEngine::from_json(template_json, config);
        if let Some(operator) = operator_id {
            inner = inner.with_operator(operator);
        }
        WasmFormEngine { inner }
    }

    pub fn load_template(&mut self, template_json: &str) {
        self.inner.load_template(crate::parse::parse_lenient(template_json));
    }

    pub fn load_document(&mut self, document_json: Option<String>) {
        self.inner.load_document(document_json.as_deref());
    }

    pub fn set_step(&mut self, step: Option<String>) {
        self.inner.set_step(step.as_deref());
    }

    /// Full view state: tree, controls, options, group visibility, repeats.
    pub fn view(&self) -> JsValue {
        to_js(&self.inner.view())
    }

    /// Returns `{status: "ok", changes}` or `{status: "error", ...}`.
    pub fn set_value(&mut self, control_id: &str, value_json: &str) -> JsValue {
        let result = parse_value(value_json).and_then(|value| self.inner.set_value(control_id, value));
        to_js(&Outcome::from(result))
    }

    pub fn touch(&mut self, control_id: &str) -> JsValue {
        to_js(&Outcome::from(self.inner.touch(control_id)))
    }

    pub fn add_instance(&mut self, key: &str) -> bool {
        self.inner.add_instance(key)
    }

    pub fn remove_instance(&mut self, key: &str, index: u32) -> bool {
        self.inner.remove_instance(key, index)
    }

    /// Array of `{generation, source, moduleHints}` the host must fetch.
    pub fn pending_option_requests(&mut self) -> JsValue {
        to_js(&self.inner.pending_option_requests())
    }

    /// Feed a fetched source back. `rows_json` of `None` reports a failure.
    pub fn receive_options(&mut self, generation: u32, source: &str, rows_json: Option<String>) -> JsValue {
        let rows = match rows_json {
            Some(json) => serde_json::from_str::<Vec<Value>>(&json)
                .map_err(|e| EngineError::collaborator("options", e.to_string())),
            None => Err(EngineError::collaborator("options", "fetch failed")),
        };
        to_js(&self.inner.receive_options(u64::from(generation), source, rows))
    }

    pub fn search_request(&self, control_id: &str, query: &str) -> JsValue {
        to_js(&Outcome::from(self.inner.search_request(control_id, query)))
    }

    pub fn select_lookup(&mut self, control_id: &str, selected_json: &str) -> JsValue {
        let result = parse_value(selected_json).and_then(|selected| self.inner.select_lookup(control_id, selected));
        to_js(&Outcome::from(result))
    }

    pub fn clear_lookup(&mut self, control_id: &str) -> JsValue {
        to_js(&Outcome::from(self.inner.clear_lookup(control_id)))
    }

    pub fn display_label(&self, control_id: &str) -> Option<String> {
        self.inner.display_label(control_id)
    }

    /// Array of required violations.
    pub fn validate(&self) -> JsValue {
        to_js(&self.inner.validate())
    }

    /// The merged document to persist, or the violations blocking it.
    pub fn prepare_save(&self) -> JsValue {
        to_js(&Outcome::from(self.inner.prepare_save()))
    }

    /// Adopt the merged document once the host has stored it.
    pub fn commit_saved(&mut self) {
        let document = self.inner.merged_document();
        self.inner.commit_saved(document);
    }
}

fn parse_value(json: &str) -> Result<Value, EngineError> {
    serde_json::from_str(json).map_err(|e| EngineError::collaborator("host", format!("invalid value JSON: {e}")))
}

fn to_js<T: Serialize + ?Sized>(value: &T) -> JsValue {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .unwrap_or(JsValue::NULL)
}

// ---------------------------------------------------------------------------
// DTOs for serialization to JS
// ---------------------------------------------------------------------------

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ErrorDto {
    code: &'static str,
    message: String,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    violations: Vec<RequiredViolation>,
}

impl From<EngineError> for ErrorDto {
    fn from(e: EngineError) -> Self {
        let code = e.code();
        let message = e.to_string();
        let violations = match e {
            EngineError::Validation(violations) => violations,
            _ => Vec::new(),
        };
        ErrorDto {
            code,
            message,
            violations,
        }
    }
}

#[derive(Serialize)]
#[serde(tag = "status")]
enum Outcome<T: Serialize> {
    #[serde(rename = "ok")]
    Ok { result: T },
    #[serde(rename = "error")]
    Error(ErrorDto),
}

impl<T: Serialize> From<Result<T, EngineError>> for Outcome<T> {
    fn from(result: Result<T, EngineError>) -> Self {
        match result {
            Ok(result) => Outcome::Ok { result },
            Err(e) => Outcome::Error(ErrorDto::from(e)),
        }
    }
}
