use std::collections::HashMap;

use form_engine::collab::{
    DocumentKey, DocumentStore, OptionSource, SearchProvider, SearchRequest, TemplateSource,
};
use form_engine::{EngineConfig, EngineError, FormEngine};
use serde_json::{Map, Value, json};

// =============================================================================
// Engines
// =============================================================================

pub const INTAKE: &str = include_str!("../fixtures/intake_form.json");
pub const LOCATION: &str = include_str!("../fixtures/location_form.json");

/// Intake form with an operator and no persisted document.
pub fn intake_engine() -> FormEngine {
    FormEngine::from_json(INTAKE, EngineConfig::default()).with_operator("op-1")
}

/// Country → region → city chain over the location form.
pub fn location_config() -> EngineConfig {
    EngineConfig::default()
        .with_dependent_rule("regions", "countries", "countryId")
        .with_dependent_rule("cities", "regions", "regionId")
}

pub fn location_sources() -> StaticOptions {
    StaticOptions::default()
        .with(
            "countries",
            vec![json!({ "id": "5", "name": "Norway" }), json!({ "id": "7", "name": "Chile" })],
        )
        .with(
            "regions",
            vec![
                json!({ "id": "r1", "name": "Vestland", "countryId": ["5", "6"] }),
                json!({ "id": "r2", "name": "Biobio", "countryId": "7" }),
            ],
        )
        .with(
            "cities",
            vec![
                json!({ "id": "c1", "name": "Bergen", "regionId": "r1" }),
                json!({ "id": "c2", "name": "Concepcion", "regionId": "r2" }),
            ],
        )
}

pub fn status_rows() -> Vec<Value> {
    vec![
        json!({ "id": "1", "name": "Open" }),
        json!({ "id": "2", "name": "Pending" }),
        json!({ "id": "3", "name": "Closed" }),
    ]
}

pub fn object(value: Value) -> Map<String, Value> {
    value.as_object().cloned().expect("fixture value should be an object")
}

// =============================================================================
// Collaborators
// =============================================================================

#[derive(Default)]
pub struct StaticOptions {
    rows: HashMap<String, Vec<Value>>,
    pub calls: Vec<String>,
}

impl StaticOptions {
    pub fn with(mut self, source: &str, rows: Vec<Value>) -> Self {
        self.rows.insert(source.into(), rows);
        self
    }
}

impl OptionSource for StaticOptions {
    fn resolve(&mut self, source: &str, _module_hints: &[String]) -> Result<Vec<Value>, EngineError> {
        self.calls.push(source.to_string());
        self.rows
            .get(source)
            .cloned()
            .ok_or_else(|| EngineError::collaborator("options", format!("no source '{source}'")))
    }
}

#[derive(Default)]
pub struct MemoryStore {
    pub documents: HashMap<DocumentKey, String>,
    pub saves: Vec<(DocumentKey, Map<String, Value>, String)>,
}

impl DocumentStore for MemoryStore {
    fn load(&mut self, key: &DocumentKey) -> Result<Option<String>, EngineError> {
        Ok(self.documents.get(key).cloned())
    }

    fn save(&mut self, key: &DocumentKey, document: &Map<String, Value>, operator_id: &str) -> Result<(), EngineError> {
        let text = serde_json::to_string(document).map_err(|e| EngineError::collaborator("store", e.to_string()))?;
        self.documents.insert(key.clone(), text);
        self.saves.push((key.clone(), document.clone(), operator_id.to_string()));
        Ok(())
    }
}

pub struct FixedSearch {
    pub results: Vec<Value>,
    pub requests: Vec<SearchRequest>,
}

impl SearchProvider for FixedSearch {
    fn search(&mut self, request: &SearchRequest) -> Result<Vec<Value>, EngineError> {
        self.requests.push(request.clone());
        Ok(self.results.clone())
    }
}

pub struct FailingSearch;

impl SearchProvider for FailingSearch {
    fn search(&mut self, _request: &SearchRequest) -> Result<Vec<Value>, EngineError> {
        Err(EngineError::collaborator("search", "backend down"))
    }
}

#[derive(Default)]
pub struct StaticTemplates(pub HashMap<String, String>);

impl TemplateSource for StaticTemplates {
    fn fetch(&mut self, template_id: &str) -> Result<String, EngineError> {
        self.0
            .get(template_id)
            .cloned()
            .ok_or_else(|| EngineError::collaborator("templates", format!("unknown template '{template_id}'")))
    }
}
