//! External collaborator interfaces.
//!
//! The engine never talks to the network or storage itself. Hosts implement
//! these traits and hand them to the engine operations that need them.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::EngineError;

/// Identifies one persisted document: a case/authorization id plus step.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentKey {
    pub case_id: String,
    pub step: String,
}

impl DocumentKey {
    pub fn new(case_id: impl Into<String>, step: impl Into<String>) -> Self {
        DocumentKey {
            case_id: case_id.into(),
            step: step.into(),
        }
    }
}

pub trait TemplateSource {
    /// Raw template JSON for the given template id.
    fn fetch(&mut self, template_id: &str) -> Result<String, EngineError>;
}

pub trait DocumentStore {
    /// Last merged document for `key`, as stored JSON text.
    fn load(&mut self, key: &DocumentKey) -> Result<Option<String>, EngineError>;

    fn save(
        &mut self,
        key: &DocumentKey,
        document: &Map<String, Value>,
        operator_id: &str,
    ) -> Result<(), EngineError>;
}

pub trait OptionSource {
    /// Raw rows for a named data source.
    fn resolve(&mut self, source: &str, module_hints: &[String]) -> Result<Vec<Value>, EngineError>;
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchRequest {
    pub entity: String,
    /// Generic method name for entities without a dedicated search.
    pub method: Option<String>,
    pub query: String,
    pub limit: usize,
}

pub trait SearchProvider {
    /// Candidate objects for a search field. Implementations dispatch on
    /// `entity` and fall back to `method` when they have no dedicated search.
    fn search(&mut self, request: &SearchRequest) -> Result<Vec<Value>, EngineError>;
}

pub trait Identity {
    /// Id of the operator currently using the form.
    fn operator_id(&self) -> Option<String>;
}

/// Fixed identity, handy for hosts that resolve the session up front.
#[derive(Debug, Clone, Default)]
pub struct StaticIdentity(pub Option<String>);

impl Identity for StaticIdentity {
    fn operator_id(&self) -> Option<String> {
        self.0.clone()
    }
}
