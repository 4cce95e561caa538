//! Core types for the emergency engine (domain records + JSON contracts).

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

// ---------------------------------------------------------------------------
// Principal
// ---------------------------------------------------------------------------

/// An already-authenticated caller identity (address-like handle).
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Principal(pub String);

impl Principal {
  pub fn new(id: impl Into<String>) -> Self {
    Self(id.into())
  }

  pub fn as_str(&self) -> &str {
    &self.0
  }

  /// Empty, or nothing but zero digits after an optional `0x` prefix.
  pub fn is_null(&self) -> bool {
    let trimmed = self.0.trim();
    let digits = trimmed
      .strip_prefix("0x")
      .or_else(|| trimmed.strip_prefix("0X"))
      .unwrap_or(trimmed);
    digits.is_empty() || digits.chars().all(|c| c == '0')
  }
}

impl fmt::Display for Principal {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(&self.0)
  }
}

impl From<&str> for Principal {
  fn from(s: &str) -> Self {
    Self(s.to_string())
  }
}

// ---------------------------------------------------------------------------
// Severity / Status
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
  Low,
  Medium,
  High,
  Critical,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Status {
  Reported,
  Acknowledged,
  InProgress,
  Resolved,
  Cancelled,
}

impl Status {
  pub fn is_terminal(self) -> bool {
    matches!(self, Self::Resolved | Self::Cancelled)
  }

  /// Position along the main lifecycle path. Cancelled sits outside it.
  pub fn stage(self) -> Option<u8> {
    match self {
      Self::Reported => Some(0),
      Self::Acknowledged => Some(1),
      Self::InProgress => Some(2),
      Self::Resolved => Some(3),
      Self::Cancelled => None,
    }
  }

  pub fn as_str(self) -> &'static str {
    match self {
      Self::Reported => "REPORTED",
      Self::Acknowledged => "ACKNOWLEDGED",
      Self::InProgress => "IN_PROGRESS",
      Self::Resolved => "RESOLVED",
      Self::Cancelled => "CANCELLED",
    }
  }
}

impl fmt::Display for Status {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

// ---------------------------------------------------------------------------
// Records
// ---------------------------------------------------------------------------

/// One reported incident. Never deleted.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Emergency {
  pub id: u64,
  pub reporter: Principal,
  pub location: String,
  pub description: String,
  pub severity: Severity,
  pub status: Status,
  pub reported_at: DateTime<Utc>,
  pub assigned_responder: Option<Principal>,
  /// Set at (re)assignment; the clock that resolution is measured against.
  pub response_started_at: Option<DateTime<Utc>>,
  pub verified: bool,
}

/// A registered responder and their running performance numbers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Responder {
  pub address: Principal,
  pub name: String,
  pub specialty: String,
  pub is_active: bool,
  pub is_verified: bool,
  pub total_responses: u64,
  /// Integer mean of completed response durations, in seconds.
  pub average_response_secs: u64,
}

impl Responder {
  pub fn new(address: Principal, name: impl Into<String>, specialty: impl Into<String>) -> Self {
    Self {
      address,
      name: name.into(),
      specialty: specialty.into(),
      is_active: true,
      is_verified: true,
      total_responses: 0,
      average_response_secs: 0,
    }
  }

  /// Zero-valued record returned for addresses that were never registered.
  pub fn unregistered(address: Principal) -> Self {
    Self {
      address,
      name: String::new(),
      specialty: String::new(),
      is_active: false,
      is_verified: false,
      total_responses: 0,
      average_response_secs: 0,
    }
  }
}

/// Consistent copy of the whole engine state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EngineSnapshot {
  pub admin: Principal,
  pub emergencies: Vec<Emergency>,
  pub responders: Vec<Responder>,
  pub authorized_reporters: Vec<Principal>,
  pub assignments: BTreeMap<u64, Vec<Principal>>,
}

// ---------------------------------------------------------------------------
// Inbound types (JSON contract: what the host sends)
// ---------------------------------------------------------------------------

/// One command line from stdin. Unknown fields are silently ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundCommand {
  pub caller: Principal,
  #[serde(flatten)]
  pub op: Operation,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Operation {
  Report {
    location: String,
    description: String,
    severity: Severity,
  },
  Assign {
    emergency_id: u64,
    responder: Principal,
  },
  UpdateStatus {
    emergency_id: u64,
    status: Status,
  },
  RegisterResponder {
    address: Principal,
    name: String,
    specialty: String,
  },
  AuthorizeReporter {
    address: Principal,
  },
  DeactivateResponder {
    address: Principal,
  },
  GetEmergency {
    emergency_id: u64,
  },
  GetResponder {
    address: Principal,
  },
  GetEmergencyResponders {
    emergency_id: u64,
  },
  IsResponseOverdue {
    emergency_id: u64,
  },
  TotalEmergencies,
  IsAuthorizedReporter {
    address: Principal,
  },
  OpenEmergencies,
  OverdueEmergencies,
  Responders,
  Snapshot,
}

// ---------------------------------------------------------------------------
// Output types (JSON contract: what the host emits)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Serialize)]
pub struct ResultOutput {
  pub ok: bool,
  pub result: serde_json::Value,
}

impl ResultOutput {
  pub fn new(result: serde_json::Value) -> Self {
    Self { ok: true, result }
  }
}

/// Structured error output for rejected or unparseable command lines.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorOutput {
  pub error: bool,
  pub kind: String,
  pub message: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub field: Option<String>,
}

impl ErrorOutput {
  pub fn new(kind: impl Into<String>, message: impl Into<String>) -> Self {
    Self {
      error: true,
      kind: kind.into(),
      message: message.into(),
      field: None,
    }
  }

  pub fn with_field(mut self, field: impl Into<String>) -> Self {
    self.field = Some(field.into());
    self
  }
}
