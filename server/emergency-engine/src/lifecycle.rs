//! Emergency lifecycle: report, assign, status transitions, resolution analytics.
//!
//! Each command checks every precondition before touching state, then applies
//! its mutations and returns the events to emit. A rejected command leaves the
//! state exactly as it found it.

use chrono::{DateTime, Utc};

use crate::audit::EngineEvent;
use crate::config::TransitionPolicy;
use crate::error::EngineError;
use crate::guard::{self, Action};
use crate::state::State;
use crate::types::*;
use crate::validate;

/// Outcome of a committed command: its return value plus events in emit order.
#[derive(Debug)]
pub struct Committed<T> {
  pub value: T,
  pub events: Vec<EngineEvent>,
}

/// Decide whether `emergency` may move to `next` under `policy`.
pub fn check_transition(policy: TransitionPolicy, emergency: &Emergency, next: Status) -> Result<(), EngineError> {
  if policy == TransitionPolicy::Permissive {
    return Ok(());
  }

  let current = emergency.status;
  if current.is_terminal() {
    return Err(EngineError::invalid_state(format!(
      "emergency {} is {} and cannot change",
      emergency.id, current
    )));
  }
  if next == Status::Cancelled {
    return Ok(());
  }

  let forward = matches!((current.stage(), next.stage()), (Some(from), Some(to)) if to > from);
  if !forward {
    return Err(EngineError::invalid_state(format!(
      "emergency {}: {} -> {} is not a forward transition",
      emergency.id, current, next
    )));
  }
  if next == Status::Acknowledged && emergency.assigned_responder.is_none() {
    return Err(EngineError::invalid_state(format!(
      "emergency {} has no assigned responder to acknowledge",
      emergency.id
    )));
  }
  Ok(())
}

pub fn report(
  state: &mut State,
  caller: &Principal,
  location: &str,
  description: &str,
  severity: Severity,
  now: DateTime<Utc>,
) -> Result<Committed<u64>, EngineError> {
  guard::require(&*state, caller, Action::AuthorizedReporter, "report emergency")?;
  validate::require_text("location", location)?;
  validate::require_text("description", description)?;

  let id = state.emergencies.next_id();
  state.emergencies.push(Emergency {
    id,
    reporter: caller.clone(),
    location: location.to_string(),
    description: description.to_string(),
    severity,
    status: Status::Reported,
    reported_at: now,
    assigned_responder: None,
    response_started_at: None,
    verified: false,
  });

  Ok(Committed {
    value: id,
    events: vec![EngineEvent::EmergencyReported {
      emergency_id: id,
      reporter: caller.clone(),
      severity,
      location: location.to_string(),
      at: now,
    }],
  })
}

pub fn assign(
  state: &mut State,
  caller: &Principal,
  emergency_id: u64,
  responder: &Principal,
  now: DateTime<Utc>,
) -> Result<Committed<()>, EngineError> {
  guard::require(&*state, caller, Action::AdminOnly, "assign responder")?;
  let current = state
    .emergencies
    .get(emergency_id)
    .ok_or_else(|| EngineError::not_found("emergency", emergency_id))?
    .status;
  validate::require_address("responder", responder)?;
  if !state.registry.is_active(responder) {
    return Err(EngineError::invalid_state(format!("responder {} is not active", responder)));
  }
  if !matches!(current, Status::Reported | Status::Acknowledged) {
    return Err(EngineError::invalid_state(format!(
      "emergency {} is {}; responders can only be assigned while REPORTED or ACKNOWLEDGED",
      emergency_id, current
    )));
  }

  let emergency = state
    .emergencies
    .get_mut(emergency_id)
    .ok_or_else(|| EngineError::not_found("emergency", emergency_id))?;
  emergency.assigned_responder = Some(responder.clone());
  emergency.status = Status::Acknowledged;
  emergency.response_started_at = Some(now);
  state.emergencies.log_assignment(emergency_id, responder.clone());

  Ok(Committed {
    value: (),
    events: vec![
      EngineEvent::ResponderAssigned {
        emergency_id,
        responder: responder.clone(),
        assigned_by: caller.clone(),
        at: now,
      },
      EngineEvent::EmergencyStatusUpdated {
        emergency_id,
        old_status: current,
        new_status: Status::Acknowledged,
        updated_by: caller.clone(),
        at: now,
      },
    ],
  })
}

pub fn update_status(
  state: &mut State,
  caller: &Principal,
  emergency_id: u64,
  next: Status,
  policy: TransitionPolicy,
  now: DateTime<Utc>,
) -> Result<Committed<()>, EngineError> {
  let emergency = state
    .emergencies
    .get(emergency_id)
    .ok_or_else(|| EngineError::not_found("emergency", emergency_id))?;
  guard::require(&*state, caller, Action::EmergencyParty(emergency), "update emergency status")?;
  check_transition(policy, emergency, next)?;

  let old = emergency.status;
  let completion = match (&emergency.assigned_responder, next) {
    (Some(responder), Status::Resolved) => {
      let started = emergency.response_started_at.unwrap_or(emergency.reported_at);
      let elapsed = (now - started).num_seconds().max(0) as u64;
      Some((responder.clone(), elapsed))
    }
    _ => None,
  };

  if let Some(emergency) = state.emergencies.get_mut(emergency_id) {
    emergency.status = next;
  }
  if let Some((responder, elapsed)) = completion {
    if let Some(updated) = state.registry.record_completion(&responder, elapsed) {
      tracing::debug!(
        responder = %responder,
        elapsed_secs = elapsed,
        total = updated.total_responses,
        average_secs = updated.average_response_secs,
        "response recorded"
      );
    }
  }

  Ok(Committed {
    value: (),
    events: vec![EngineEvent::EmergencyStatusUpdated {
      emergency_id,
      old_status: old,
      new_status: next,
      updated_by: caller.clone(),
      at: now,
    }],
  })
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::{Duration, TimeZone};

  fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap()
  }

  fn admin() -> Principal {
    "0xadmin".into()
  }

  fn reporter() -> Principal {
    "0xreporter".into()
  }

  fn medic() -> Principal {
    "0xmedic".into()
  }

  fn seeded() -> State {
    let mut state = State::new(admin());
    state.registry.authorize_reporter(reporter()).unwrap();
    state.registry.register(medic(), "Dana", "Medical").unwrap();
    state
  }

  fn sample(status: Status, assigned: bool) -> Emergency {
    Emergency {
      id: 1,
      reporter: reporter(),
      location: "Dock 9".into(),
      description: "fuel spill".into(),
      severity: Severity::High,
      status,
      reported_at: t0(),
      assigned_responder: assigned.then(medic),
      response_started_at: assigned.then(t0),
      verified: false,
    }
  }

  #[test]
  fn strict_transitions_move_forward_only() {
    let strict = TransitionPolicy::Strict;
    assert!(check_transition(strict, &sample(Status::Acknowledged, true), Status::InProgress).is_ok());
    assert!(check_transition(strict, &sample(Status::InProgress, true), Status::Resolved).is_ok());
    assert!(check_transition(strict, &sample(Status::Reported, false), Status::Cancelled).is_ok());
    assert!(check_transition(strict, &sample(Status::InProgress, true), Status::Reported).is_err());
    assert!(check_transition(strict, &sample(Status::InProgress, true), Status::InProgress).is_err());
    assert!(check_transition(strict, &sample(Status::Resolved, true), Status::Resolved).is_err());
    assert!(check_transition(strict, &sample(Status::Cancelled, false), Status::InProgress).is_err());
    assert!(check_transition(strict, &sample(Status::Reported, false), Status::Acknowledged).is_err());
  }

  #[test]
  fn permissive_allows_anything() {
    let loose = TransitionPolicy::Permissive;
    assert!(check_transition(loose, &sample(Status::Resolved, true), Status::Reported).is_ok());
    assert!(check_transition(loose, &sample(Status::Resolved, true), Status::Resolved).is_ok());
  }

  #[test]
  fn report_allocates_sequential_ids() {
    let mut state = seeded();
    let first = report(&mut state, &reporter(), "Dock 9", "fuel spill", Severity::Low, t0()).unwrap();
    assert_eq!(first.value, 1);
    assert!(report(&mut state, &reporter(), "", "x", Severity::Low, t0()).is_err());
    let second = report(&mut state, &admin(), "Dock 9", "fire", Severity::Critical, t0()).unwrap();
    assert_eq!(second.value, 2);
    assert_eq!(second.events.len(), 1);
  }

  #[test]
  fn assign_emits_assignment_then_status() {
    let mut state = seeded();
    report(&mut state, &reporter(), "Dock 9", "fuel spill", Severity::High, t0()).unwrap();
    let done = assign(&mut state, &admin(), 1, &medic(), t0()).unwrap();
    assert!(matches!(done.events[0], EngineEvent::ResponderAssigned { .. }));
    match &done.events[1] {
      EngineEvent::EmergencyStatusUpdated { old_status, new_status, .. } => {
        assert_eq!(*old_status, Status::Reported);
        assert_eq!(*new_status, Status::Acknowledged);
      }
      other => panic!("unexpected event {:?}", other),
    }
  }

  #[test]
  fn assign_rejects_unknown_emergency_before_responder_checks() {
    let mut state = seeded();
    let err = assign(&mut state, &admin(), 5, &"0xghost".into(), t0()).unwrap_err();
    assert_eq!(err.kind(), "not_found");
  }

  #[test]
  fn reassign_restarts_clock() {
    let mut state = seeded();
    report(&mut state, &reporter(), "Dock 9", "fuel spill", Severity::High, t0()).unwrap();
    assign(&mut state, &admin(), 1, &medic(), t0()).unwrap();
    let later = t0() + Duration::minutes(10);
    assign(&mut state, &admin(), 1, &medic(), later).unwrap();

    let e = state.emergencies.get(1).unwrap();
    assert_eq!(e.response_started_at, Some(later));
    assert_eq!(state.emergencies.assignment_history(1).len(), 2);
  }

  #[test]
  fn resolve_without_responder_records_nothing() {
    let mut state = seeded();
    report(&mut state, &reporter(), "Dock 9", "fuel spill", Severity::High, t0()).unwrap();
    update_status(&mut state, &reporter(), 1, Status::Resolved, TransitionPolicy::Strict, t0()).unwrap();
    assert_eq!(state.registry.get(&medic()).unwrap().total_responses, 0);
    assert_eq!(state.emergencies.get(1).unwrap().status, Status::Resolved);
  }

  #[test]
  fn update_status_checks_existence_first() {
    let mut state = seeded();
    let err = update_status(&mut state, &"0xstranger".into(), 9, Status::Cancelled, TransitionPolicy::Strict, t0())
      .unwrap_err();
    assert_eq!(err.kind(), "not_found");
  }
}
