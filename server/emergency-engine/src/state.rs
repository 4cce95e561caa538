//! The engine's whole mutable state, guarded as one unit by [`crate::Engine`].

use std::collections::BTreeMap;

use crate::guard::Roles;
use crate::registry::Registry;
use crate::types::{Emergency, Principal};

/// Emergency records plus the per-emergency assignment history.
///
/// Ids are dense: emergency `n` lives at index `n - 1`, so the record count
/// doubles as the id counter.
#[derive(Debug, Clone, Default)]
pub struct Emergencies {
  records: Vec<Emergency>,
  assignments: BTreeMap<u64, Vec<Principal>>,
}

impl Emergencies {
  pub fn count(&self) -> u64 {
    self.records.len() as u64
  }

  pub fn next_id(&self) -> u64 {
    self.count() + 1
  }

  pub fn get(&self, id: u64) -> Option<&Emergency> {
    let index = id.checked_sub(1)?;
    self.records.get(usize::try_from(index).ok()?)
  }

  pub(crate) fn get_mut(&mut self, id: u64) -> Option<&mut Emergency> {
    let index = id.checked_sub(1)?;
    self.records.get_mut(usize::try_from(index).ok()?)
  }

  /// Caller must have built `emergency` with `id == next_id()`.
  pub(crate) fn push(&mut self, emergency: Emergency) {
    debug_assert_eq!(emergency.id, self.next_id());
    self.records.push(emergency);
  }

  pub(crate) fn log_assignment(&mut self, id: u64, responder: Principal) {
    self.assignments.entry(id).or_default().push(responder);
  }

  pub fn assignment_history(&self, id: u64) -> &[Principal] {
    self.assignments.get(&id).map(Vec::as_slice).unwrap_or(&[])
  }

  pub fn iter(&self) -> impl Iterator<Item = &Emergency> {
    self.records.iter()
  }

  pub fn assignments(&self) -> &BTreeMap<u64, Vec<Principal>> {
    &self.assignments
  }
}

#[derive(Debug, Clone)]
pub struct State {
  pub admin: Principal,
  pub registry: Registry,
  pub emergencies: Emergencies,
}

impl State {
  pub fn new(admin: Principal) -> Self {
    Self {
      admin,
      registry: Registry::new(),
      emergencies: Emergencies::default(),
    }
  }
}

impl Roles for State {
  fn admin(&self) -> &Principal {
    &self.admin
  }

  fn is_listed_reporter(&self, principal: &Principal) -> bool {
    self.registry.is_listed_reporter(principal)
  }

  fn is_active_responder(&self, principal: &Principal) -> bool {
    self.registry.is_active(principal)
  }
}
