//! Core engine: owns the state, serializes mutations, emits audit events.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::audit::{EngineEvent, EventSink, NullSink};
use crate::clock::{Clock, SystemClock};
use crate::config::Config;
use crate::error::EngineError;
use crate::guard::{self, Action};
use crate::lifecycle::{self, Committed};
use crate::query;
use crate::state::State;
use crate::types::*;

/// The emergency coordination engine.
///
/// Every mutating operation runs under one write lock: preconditions are
/// checked, state is changed, and events are handed to the sink before the
/// lock is released. Queries share a read lock and always see whole commits.
pub struct Engine {
  config: Config,
  state: RwLock<State>,
  clock: Arc<dyn Clock>,
  sink: Arc<dyn EventSink>,
}

impl Engine {
  /// `admin` is fixed for the engine's lifetime.
  pub fn new(
    admin: Principal,
    config: Config,
    clock: Arc<dyn Clock>,
    sink: Arc<dyn EventSink>,
  ) -> Result<Self, EngineError> {
    if admin.is_null() {
      return Err(EngineError::invalid_input("admin", "must not be the null address"));
    }
    tracing::info!(
      admin = %admin,
      response_limit_secs = config.response_limit.num_seconds(),
      policy = ?config.transition_policy,
      "engine initialized"
    );
    Ok(Self {
      config,
      state: RwLock::new(State::new(admin)),
      clock,
      sink,
    })
  }

  /// System clock, default config, events discarded.
  pub fn with_defaults(admin: Principal) -> Result<Self, EngineError> {
    Self::new(admin, Config::default(), Arc::new(SystemClock::new()), Arc::new(NullSink))
  }

  fn commit<T>(
    &self,
    operation: &'static str,
    caller: &Principal,
    apply: impl FnOnce(&mut State, DateTime<Utc>) -> Result<Committed<T>, EngineError>,
  ) -> Result<T, EngineError> {
    let mut state = self.state.write();
    let now = self.clock.now();
    match apply(&mut state, now) {
      Ok(committed) => {
        for event in &committed.events {
          self.sink.emit(event);
        }
        tracing::info!(operation, caller = %caller, events = committed.events.len(), "committed");
        Ok(committed.value)
      }
      Err(e) => {
        tracing::warn!(operation, caller = %caller, kind = e.kind(), "rejected: {e}");
        Err(e)
      }
    }
  }

  // -------------------------------------------------------------------------
  // Lifecycle
  // -------------------------------------------------------------------------

  /// Returns the new emergency id.
  pub fn report_emergency(
    &self,
    caller: &Principal,
    location: &str,
    description: &str,
    severity: Severity,
  ) -> Result<u64, EngineError> {
    self.commit("report_emergency", caller, |state, now| {
      lifecycle::report(state, caller, location, description, severity, now)
    })
  }

  pub fn assign_responder(
    &self,
    caller: &Principal,
    emergency_id: u64,
    responder: &Principal,
  ) -> Result<(), EngineError> {
    self.commit("assign_responder", caller, |state, now| {
      lifecycle::assign(state, caller, emergency_id, responder, now)
    })
  }

  pub fn update_emergency_status(
    &self,
    caller: &Principal,
    emergency_id: u64,
    status: Status,
  ) -> Result<(), EngineError> {
    let policy = self.config.transition_policy;
    self.commit("update_emergency_status", caller, |state, now| {
      lifecycle::update_status(state, caller, emergency_id, status, policy, now)
    })
  }

  // -------------------------------------------------------------------------
  // Registry
  // -------------------------------------------------------------------------

  /// Creates or replaces the record; replacing resets its counters.
  pub fn register_responder(
    &self,
    caller: &Principal,
    address: &Principal,
    name: &str,
    specialty: &str,
  ) -> Result<(), EngineError> {
    self.commit("register_responder", caller, |state, now| {
      guard::require(&*state, caller, Action::AdminOnly, "register responder")?;
      let responder = state.registry.register(address.clone(), name, specialty)?;
      Ok(Committed {
        value: (),
        events: vec![EngineEvent::ResponderRegistered {
          responder: responder.address.clone(),
          name: responder.name.clone(),
          specialty: responder.specialty.clone(),
          at: now,
        }],
      })
    })
  }

  pub fn deactivate_responder(&self, caller: &Principal, address: &Principal) -> Result<(), EngineError> {
    self.commit("deactivate_responder", caller, |state, now| {
      guard::require(&*state, caller, Action::AdminOnly, "deactivate responder")?;
      state.registry.deactivate(address)?;
      Ok(Committed {
        value: (),
        events: vec![EngineEvent::ResponderDeactivated {
          responder: address.clone(),
          at: now,
        }],
      })
    })
  }

  /// Idempotent. An address already on the list emits no event.
  pub fn authorize_reporter(&self, caller: &Principal, address: &Principal) -> Result<(), EngineError> {
    self.commit("authorize_reporter", caller, |state, now| {
      guard::require(&*state, caller, Action::AdminOnly, "authorize reporter")?;
      let added = state.registry.authorize_reporter(address.clone())?;
      let events = if added {
        vec![EngineEvent::ReporterAuthorized {
          reporter: address.clone(),
          at: now,
        }]
      } else {
        Vec::new()
      };
      Ok(Committed { value: (), events })
    })
  }

  // -------------------------------------------------------------------------
  // Queries
  // -------------------------------------------------------------------------

  pub fn get_emergency(&self, emergency_id: u64) -> Result<Emergency, EngineError> {
    query::emergency(&self.state.read(), emergency_id)
  }

  pub fn get_responder(&self, address: &Principal) -> Responder {
    query::responder(&self.state.read(), address)
  }

  pub fn get_emergency_responders(&self, emergency_id: u64) -> Result<Vec<Principal>, EngineError> {
    query::emergency_responders(&self.state.read(), emergency_id)
  }

  pub fn is_response_overdue(&self, emergency_id: u64) -> Result<bool, EngineError> {
    let state = self.state.read();
    query::is_response_overdue(&state, emergency_id, self.clock.now(), self.config.response_limit())
  }

  pub fn total_emergencies(&self) -> u64 {
    query::total_emergencies(&self.state.read())
  }

  pub fn is_authorized_reporter(&self, address: &Principal) -> bool {
    query::is_authorized_reporter(&self.state.read(), address)
  }

  pub fn open_emergencies(&self) -> Vec<Emergency> {
    query::open_emergencies(&self.state.read())
  }

  pub fn overdue_emergencies(&self) -> Vec<u64> {
    let state = self.state.read();
    query::overdue_emergencies(&state, self.clock.now(), self.config.response_limit())
  }

  pub fn responders(&self) -> Vec<Responder> {
    query::responders(&self.state.read())
  }

  pub fn snapshot(&self) -> EngineSnapshot {
    query::snapshot(&self.state.read())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::audit::AuditLog;
  use crate::clock::ManualClock;
  use chrono::{Duration, TimeZone};

  fn admin() -> Principal {
    "0xadmin".into()
  }

  fn medic() -> Principal {
    "0xmedic".into()
  }

  fn setup() -> (Engine, Arc<ManualClock>, Arc<AuditLog>) {
    let clock = Arc::new(ManualClock::new(Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap()));
    let log = Arc::new(AuditLog::new());
    let engine = Engine::new(admin(), Config::default(), clock.clone(), log.clone()).unwrap();
    (engine, clock, log)
  }

  #[test]
  fn null_admin_rejected() {
    let err = Engine::with_defaults(Principal::new("")).err().unwrap();
    assert_eq!(err.kind(), "invalid_input");
  }

  #[test]
  fn rejected_operations_emit_nothing() {
    let (engine, _, log) = setup();
    assert!(engine.register_responder(&medic(), &medic(), "Dana", "Medical").is_err());
    assert!(engine.report_emergency(&medic(), "Dock 9", "spill", Severity::Low).is_err());
    assert!(log.is_empty());
    assert_eq!(engine.total_emergencies(), 0);
  }

  #[test]
  fn authorize_reporter_twice_emits_once() {
    let (engine, _, log) = setup();
    engine.authorize_reporter(&admin(), &"0xa".into()).unwrap();
    engine.authorize_reporter(&admin(), &"0xa".into()).unwrap();
    assert_eq!(log.len(), 1);
    assert!(engine.is_authorized_reporter(&"0xa".into()));
  }

  #[test]
  fn overdue_follows_the_clock() {
    let (engine, clock, _) = setup();
    let id = engine.report_emergency(&admin(), "Dock 9", "spill", Severity::Low).unwrap();
    assert!(!engine.is_response_overdue(id).unwrap());
    clock.advance(Duration::minutes(31));
    assert!(engine.is_response_overdue(id).unwrap());
    assert_eq!(engine.overdue_emergencies(), vec![id]);
  }

  #[test]
  fn deactivate_emits_and_blocks_assignment() {
    let (engine, _, log) = setup();
    engine.register_responder(&admin(), &medic(), "Dana", "Medical").unwrap();
    let id = engine.report_emergency(&admin(), "Dock 9", "spill", Severity::Low).unwrap();
    engine.deactivate_responder(&admin(), &medic()).unwrap();
    let err = engine.assign_responder(&admin(), id, &medic()).unwrap_err();
    assert_eq!(err.kind(), "invalid_state");
    assert!(matches!(log.events().last(), Some(EngineEvent::ResponderDeactivated { .. })));
  }
}
