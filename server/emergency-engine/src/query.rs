//! Read-only projections. No authorization: the records are public.

use chrono::{DateTime, Duration, Utc};

use crate::error::EngineError;
use crate::guard::{self, Action};
use crate::state::State;
use crate::types::*;

pub fn emergency(state: &State, id: u64) -> Result<Emergency, EngineError> {
  state
    .emergencies
    .get(id)
    .cloned()
    .ok_or_else(|| EngineError::not_found("emergency", id))
}

/// Never fails: unknown addresses get a zero-valued record.
pub fn responder(state: &State, address: &Principal) -> Responder {
  state.registry.get_or_default(address)
}

pub fn emergency_responders(state: &State, id: u64) -> Result<Vec<Principal>, EngineError> {
  if state.emergencies.get(id).is_none() {
    return Err(EngineError::not_found("emergency", id));
  }
  Ok(state.emergencies.assignment_history(id).to_vec())
}

/// Open (not RESOLVED/CANCELLED) and reported more than `limit` ago.
pub fn overdue(emergency: &Emergency, now: DateTime<Utc>, limit: Duration) -> bool {
  !emergency.status.is_terminal() && now - emergency.reported_at > limit
}

pub fn is_response_overdue(
  state: &State,
  id: u64,
  now: DateTime<Utc>,
  limit: Duration,
) -> Result<bool, EngineError> {
  let emergency = state
    .emergencies
    .get(id)
    .ok_or_else(|| EngineError::not_found("emergency", id))?;
  Ok(overdue(emergency, now, limit))
}

pub fn total_emergencies(state: &State) -> u64 {
  state.emergencies.count()
}

pub fn is_authorized_reporter(state: &State, address: &Principal) -> bool {
  guard::authorize(state, address, Action::AuthorizedReporter)
}

pub fn open_emergencies(state: &State) -> Vec<Emergency> {
  state
    .emergencies
    .iter()
    .filter(|e| !e.status.is_terminal())
    .cloned()
    .collect()
}

pub fn overdue_emergencies(state: &State, now: DateTime<Utc>, limit: Duration) -> Vec<u64> {
  state
    .emergencies
    .iter()
    .filter(|e| overdue(e, now, limit))
    .map(|e| e.id)
    .collect()
}

pub fn responders(state: &State) -> Vec<Responder> {
  state.registry.responders().cloned().collect()
}

pub fn snapshot(state: &State) -> EngineSnapshot {
  EngineSnapshot {
    admin: state.admin.clone(),
    emergencies: state.emergencies.iter().cloned().collect(),
    responders: responders(state),
    authorized_reporters: state.registry.reporters().cloned().collect(),
    assignments: state.emergencies.assignments().clone(),
  }
}
