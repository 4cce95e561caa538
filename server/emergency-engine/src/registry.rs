//! Responder registry, reporter allow-list, and response-time analytics.

use std::collections::{BTreeMap, BTreeSet};

use crate::error::EngineError;
use crate::types::{Principal, Responder};
use crate::validate;

/// Fold one completed response into a running integer mean.
///
/// `completed` is the count *before* this response. The first completion
/// takes the elapsed value as-is.
pub fn running_average(average: u64, completed: u64, elapsed_secs: u64) -> u64 {
  let n = completed as u128 + 1;
  if n == 1 {
    return elapsed_secs;
  }
  let total = average as u128 * (n - 1) + elapsed_secs as u128;
  (total / n) as u64
}

#[derive(Debug, Clone, Default)]
pub struct Registry {
  responders: BTreeMap<Principal, Responder>,
  reporters: BTreeSet<Principal>,
}

impl Registry {
  pub fn new() -> Self {
    Self::default()
  }

  /// Create or replace a responder. Replacing resets counters to zero.
  pub fn register(
    &mut self,
    address: Principal,
    name: &str,
    specialty: &str,
  ) -> Result<&Responder, EngineError> {
    validate::require_address("address", &address)?;
    validate::require_text("name", name)?;
    validate::require_text("specialty", specialty)?;

    let responder = Responder::new(address.clone(), name, specialty);
    self.responders.insert(address.clone(), responder);
    Ok(&self.responders[&address])
  }

  /// Soft-delete. History and in-flight assignments are untouched.
  pub fn deactivate(&mut self, address: &Principal) -> Result<(), EngineError> {
    validate::require_address("address", address)?;
    let responder = self
      .responders
      .get_mut(address)
      .ok_or_else(|| EngineError::not_found("responder", address))?;
    responder.is_active = false;
    Ok(())
  }

  /// Returns `true` if the address was not already on the list.
  pub fn authorize_reporter(&mut self, address: Principal) -> Result<bool, EngineError> {
    validate::require_address("address", &address)?;
    Ok(self.reporters.insert(address))
  }

  /// Only the lifecycle's resolution path calls this.
  pub(crate) fn record_completion(&mut self, address: &Principal, elapsed_secs: u64) -> Option<&Responder> {
    let responder = self.responders.get_mut(address)?;
    responder.average_response_secs =
      running_average(responder.average_response_secs, responder.total_responses, elapsed_secs);
    responder.total_responses += 1;
    Some(responder)
  }

  pub fn get(&self, address: &Principal) -> Option<&Responder> {
    self.responders.get(address)
  }

  /// Registered record, or a zero-valued one for unknown addresses.
  pub fn get_or_default(&self, address: &Principal) -> Responder {
    self
      .responders
      .get(address)
      .cloned()
      .unwrap_or_else(|| Responder::unregistered(address.clone()))
  }

  pub fn is_active(&self, address: &Principal) -> bool {
    self.responders.get(address).is_some_and(|r| r.is_active)
  }

  pub fn is_listed_reporter(&self, address: &Principal) -> bool {
    self.reporters.contains(address)
  }

  pub fn responders(&self) -> impl Iterator<Item = &Responder> {
    self.responders.values()
  }

  pub fn reporters(&self) -> impl Iterator<Item = &Principal> {
    self.reporters.iter()
  }
}
