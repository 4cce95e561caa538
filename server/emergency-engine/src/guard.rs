//! Access control: decides whether a principal may perform an action.
//!
//! The guard holds no state of its own; role membership is read through
//! [`Roles`], which the engine state implements. Every check fails closed.

use crate::error::EngineError;
use crate::types::{Emergency, Principal};

/// Role lookups the guard needs from whoever owns the state.
pub trait Roles {
  fn admin(&self) -> &Principal;
  /// Explicit membership only; admin is folded in by the guard.
  fn is_listed_reporter(&self, principal: &Principal) -> bool;
  fn is_active_responder(&self, principal: &Principal) -> bool;
}

/// Action classes gated by the guard.
#[derive(Debug, Clone, Copy)]
pub enum Action<'a> {
  AdminOnly,
  ActiveResponderOnly,
  AuthorizedReporter,
  /// Admin, the assigned responder, or the original reporter of this emergency.
  EmergencyParty(&'a Emergency),
}

impl Action<'_> {
  pub fn label(&self) -> &'static str {
    match self {
      Self::AdminOnly => "admin_only",
      Self::ActiveResponderOnly => "active_responder_only",
      Self::AuthorizedReporter => "authorized_reporter",
      Self::EmergencyParty(_) => "emergency_party",
    }
  }
}

pub fn authorize(roles: &impl Roles, principal: &Principal, action: Action<'_>) -> bool {
  if principal.is_null() {
    return false;
  }
  let is_admin = principal == roles.admin();
  match action {
    Action::AdminOnly => is_admin,
    Action::ActiveResponderOnly => roles.is_active_responder(principal),
    Action::AuthorizedReporter => is_admin || roles.is_listed_reporter(principal),
    Action::EmergencyParty(emergency) => {
      is_admin
        || emergency.assigned_responder.as_ref() == Some(principal)
        || &emergency.reporter == principal
    }
  }
}

/// [`authorize`], turning a denial into `Unauthorized` naming the operation.
pub fn require(
  roles: &impl Roles,
  principal: &Principal,
  action: Action<'_>,
  operation: &str,
) -> Result<(), EngineError> {
  if authorize(roles, principal, action) {
    Ok(())
  } else {
    tracing::debug!(principal = %principal, gate = action.label(), operation, "access denied");
    Err(EngineError::unauthorized(principal.as_str(), operation))
  }
}
