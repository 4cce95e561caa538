//! Structured error types for the emergency engine.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
  #[error("unauthorized: {principal} may not {action}")]
  Unauthorized { principal: String, action: String },

  #[error("not found: {entity} {id}")]
  NotFound { entity: String, id: String },

  #[error("invalid input: {field}: {reason}")]
  InvalidInput { field: String, reason: String },

  #[error("invalid state: {0}")]
  InvalidState(String),

  #[error("json: {0}")]
  Json(#[from] serde_json::Error),
}

impl EngineError {
  pub fn unauthorized(principal: &str, action: &str) -> Self {
    Self::Unauthorized {
      principal: principal.to_string(),
      action: action.to_string(),
    }
  }

  pub fn not_found(entity: &str, id: impl ToString) -> Self {
    Self::NotFound {
      entity: entity.to_string(),
      id: id.to_string(),
    }
  }

  pub fn invalid_input(field: &str, reason: &str) -> Self {
    Self::InvalidInput {
      field: field.to_string(),
      reason: reason.to_string(),
    }
  }

  pub fn invalid_state(msg: impl Into<String>) -> Self {
    Self::InvalidState(msg.into())
  }

  /// Taxonomy label, stable across versions (used in the JSON error contract).
  pub fn kind(&self) -> &'static str {
    match self {
      Self::Unauthorized { .. } => "unauthorized",
      Self::NotFound { .. } => "not_found",
      Self::InvalidInput { .. } => "invalid_input",
      Self::InvalidState(_) => "invalid_state",
      Self::Json(_) => "parse",
    }
  }
}
