//! Unified engine error type used across all phases.

use thiserror::Error;

/// A required control that is visible, enabled and still empty.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RequiredViolation {
    pub control_id: String,
    pub raw_id: String,
    pub label: String,
}

impl std::fmt::Display for RequiredViolation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "'{}' ({}) is required", self.label, self.control_id)
    }
}

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("[T001] failed to parse template JSON: {0}")]
    TemplateParse(String),

    #[error("[C001] unknown control '{0}'")]
    UnknownControl(String),

    #[error("[L001] control '{0}' is not a lookup field")]
    NotALookup(String),

    #[error("[S001] {} required field(s) are empty", .0.len())]
    Validation(Vec<RequiredViolation>),

    #[error("[X001] collaborator '{collaborator}' failed: {message}")]
    Collaborator {
        collaborator: &'static str,
        message: String,
    },
}

impl EngineError {
    pub fn code(&self) -> &'static str {
        match self {
            EngineError::TemplateParse(_) => "T001",
            EngineError::UnknownControl(_) => "C001",
            EngineError::NotALookup(_) => "L001",
            EngineError::Validation(_) => "S001",
            EngineError::Collaborator { .. } => "X001",
        }
    }

    pub fn collaborator(collaborator: &'static str, message: impl Into<String>) -> Self {
        EngineError::Collaborator {
            collaborator,
            message: message.into(),
        }
    }
}
