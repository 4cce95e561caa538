//! Input validation shared by the mutating operations.

use crate::error::EngineError;
use crate::types::Principal;

/// Required free-text field: must contain something besides whitespace.
pub fn require_text(field: &str, value: &str) -> Result<(), EngineError> {
  if value.trim().is_empty() {
    return Err(EngineError::invalid_input(field, "must not be empty"));
  }
  Ok(())
}

/// Address argument: must not be the null principal.
pub fn require_address(field: &str, address: &Principal) -> Result<(), EngineError> {
  if address.is_null() {
    return Err(EngineError::invalid_input(field, "must not be the null address"));
  }
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn blank_text_rejected() {
    assert!(require_text("location", "").is_err());
    let err = require_text("location", "  \t").unwrap_err();
    assert!(err.to_string().contains("location"));
    assert!(require_text("location", "Pier 4").is_ok());
  }

  #[test]
  fn null_address_rejected() {
    let err = require_address("address", &Principal::new("0x0000")).unwrap_err();
    assert_eq!(err.kind(), "invalid_input");
    assert!(require_address("address", &Principal::new("0xbeef")).is_ok());
  }
}
