//! Engine configuration with sane defaults.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::EngineError;

/// How `update_emergency_status` treats requested transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionPolicy {
  /// Forward-only along the lifecycle; terminal states are final.
  #[default]
  Strict,
  /// Any status may be set by an authorized party, including out of terminal states.
  Permissive,
}

impl TransitionPolicy {
  pub fn from_str_loose(s: &str) -> Option<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "strict" => Some(Self::Strict),
      "permissive" | "loose" => Some(Self::Permissive),
      _ => None,
    }
  }
}

/// Tunables for the coordination engine.
#[derive(Debug, Clone)]
pub struct Config {
  /// Time after report before an open emergency counts as overdue.
  pub response_limit: Duration,
  pub transition_policy: TransitionPolicy,
}

impl Default for Config {
  fn default() -> Self {
    Self {
      response_limit: Duration::minutes(30),
      transition_policy: TransitionPolicy::Strict,
    }
  }
}

impl Config {
  /// Read overrides from `EMERGENCY_RESPONSE_LIMIT_MINUTES` and `EMERGENCY_TRANSITIONS`.
  pub fn from_env() -> Result<Self, EngineError> {
    Self::from_lookup(|key| std::env::var(key).ok())
  }

  fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, EngineError> {
    let mut config = Self::default();

    if let Some(raw) = lookup("EMERGENCY_RESPONSE_LIMIT_MINUTES") {
      let minutes: i64 = raw.trim().parse().map_err(|_| {
        EngineError::invalid_input("EMERGENCY_RESPONSE_LIMIT_MINUTES", "expected an integer")
      })?;
      if minutes <= 0 {
        return Err(EngineError::invalid_input(
          "EMERGENCY_RESPONSE_LIMIT_MINUTES",
          "must be positive",
        ));
      }
      config.response_limit = Duration::try_minutes(minutes)
        .ok_or_else(|| EngineError::invalid_input("EMERGENCY_RESPONSE_LIMIT_MINUTES", "out of range"))?;
    }

    if let Some(raw) = lookup("EMERGENCY_TRANSITIONS") {
      config.transition_policy = TransitionPolicy::from_str_loose(&raw)
        .ok_or_else(|| EngineError::invalid_input("EMERGENCY_TRANSITIONS", "expected strict|permissive"))?;
    }

    Ok(config)
  }

  pub fn response_limit(&self) -> Duration {
    self.response_limit
  }
}
