//! Dispatch of parsed host commands onto the engine (no I/O).

use serde_json::{json, Value};

use crate::engine::Engine;
use crate::error::EngineError;
use crate::types::{ErrorOutput, InboundCommand, Operation, ResultOutput};

/// Run one command and return its JSON result value.
pub fn execute(engine: &Engine, command: &InboundCommand) -> Result<Value, EngineError> {
  let caller = &command.caller;
  let value = match &command.op {
    Operation::Report {
      location,
      description,
      severity,
    } => {
      let id = engine.report_emergency(caller, location, description, *severity)?;
      json!({ "emergency_id": id })
    }
    Operation::Assign {
      emergency_id,
      responder,
    } => {
      engine.assign_responder(caller, *emergency_id, responder)?;
      Value::Null
    }
    Operation::UpdateStatus { emergency_id, status } => {
      engine.update_emergency_status(caller, *emergency_id, *status)?;
      Value::Null
    }
    Operation::RegisterResponder {
      address,
      name,
      specialty,
    } => {
      engine.register_responder(caller, address, name, specialty)?;
      Value::Null
    }
    Operation::AuthorizeReporter { address } => {
      engine.authorize_reporter(caller, address)?;
      Value::Null
    }
    Operation::DeactivateResponder { address } => {
      engine.deactivate_responder(caller, address)?;
      Value::Null
    }
    Operation::GetEmergency { emergency_id } => serde_json::to_value(engine.get_emergency(*emergency_id)?)?,
    Operation::GetResponder { address } => serde_json::to_value(engine.get_responder(address))?,
    Operation::GetEmergencyResponders { emergency_id } => {
      serde_json::to_value(engine.get_emergency_responders(*emergency_id)?)?
    }
    Operation::IsResponseOverdue { emergency_id } => {
      json!({ "overdue": engine.is_response_overdue(*emergency_id)? })
    }
    Operation::TotalEmergencies => json!({ "total": engine.total_emergencies() }),
    Operation::IsAuthorizedReporter { address } => {
      json!({ "authorized": engine.is_authorized_reporter(address) })
    }
    Operation::OpenEmergencies => serde_json::to_value(engine.open_emergencies())?,
    Operation::OverdueEmergencies => json!({ "emergency_ids": engine.overdue_emergencies() }),
    Operation::Responders => serde_json::to_value(engine.responders())?,
    Operation::Snapshot => serde_json::to_value(engine.snapshot())?,
  };
  Ok(value)
}

/// Parse one input line and run it, producing the JSON line to write back.
pub fn handle_line(engine: &Engine, line: &str) -> Value {
  let command: InboundCommand = match serde_json::from_str(line) {
    Ok(c) => c,
    Err(e) => return error_value(&EngineError::Json(e)),
  };
  match execute(engine, &command) {
    Ok(result) => serde_json::to_value(ResultOutput::new(result)).unwrap_or(Value::Null),
    Err(e) => error_value(&e),
  }
}

fn error_value(e: &EngineError) -> Value {
  let out = match e {
    EngineError::InvalidInput { field, reason } => ErrorOutput::new(e.kind(), reason.clone()).with_field(field.clone()),
    _ => ErrorOutput::new(e.kind(), e.to_string()),
  };
  serde_json::to_value(out).unwrap_or(Value::Null)
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::types::Principal;

  fn engine() -> Engine {
    Engine::with_defaults(Principal::new("0xadmin")).unwrap()
  }

  #[test]
  fn report_line_returns_id() {
    let engine = engine();
    let out = handle_line(
      &engine,
      r#"{"caller":"0xadmin","op":"report","location":"Dock 9","description":"spill","severity":"HIGH"}"#,
    );
    assert_eq!(out["ok"], true);
    assert_eq!(out["result"]["emergency_id"], 1);
  }

  #[test]
  fn bad_json_is_a_parse_error() {
    let out = handle_line(&engine(), "{not json");
    assert_eq!(out["error"], true);
    assert_eq!(out["kind"], "parse");
  }

  #[test]
  fn invalid_input_names_the_field() {
    let out = handle_line(
      &engine(),
      r#"{"caller":"0xadmin","op":"register_responder","address":"0xr","name":"","specialty":"Fire"}"#,
    );
    assert_eq!(out["kind"], "invalid_input");
    assert_eq!(out["field"], "name");
  }

  #[test]
  fn unauthorized_is_reported_by_kind() {
    let out = handle_line(&engine(), r#"{"caller":"0xeve","op":"authorize_reporter","address":"0xeve"}"#);
    assert_eq!(out["kind"], "unauthorized");
  }

  #[test]
  fn queries_need_no_privileges() {
    let engine = engine();
    let out = handle_line(&engine, r#"{"caller":"0xanyone","op":"total_emergencies"}"#);
    assert_eq!(out["result"]["total"], 0);
    let out = handle_line(&engine, r#"{"caller":"0xanyone","op":"get_responder","address":"0xr"}"#);
    assert_eq!(out["result"]["is_active"], false);
  }

  #[test]
  fn listing_ops_reflect_state() {
    let engine = engine();
    let lines = [
      r#"{"caller":"0xadmin","op":"register_responder","address":"0xr1","name":"Dana","specialty":"Medical"}"#,
      r#"{"caller":"0xadmin","op":"authorize_reporter","address":"0xrep"}"#,
      r#"{"caller":"0xrep","op":"report","location":"Dock 9","description":"spill","severity":"LOW"}"#,
      r#"{"caller":"0xrep","op":"report","location":"Pier 4","description":"fire","severity":"CRITICAL"}"#,
      r#"{"caller":"0xrep","op":"update_status","emergency_id":1,"status":"CANCELLED"}"#,
    ];
    for line in lines {
      assert_eq!(handle_line(&engine, line)["ok"], true, "{line}");
    }

    let out = handle_line(&engine, r#"{"caller":"0xanyone","op":"open_emergencies"}"#);
    let open = out["result"].as_array().unwrap();
    assert_eq!(open.len(), 1);
    assert_eq!(open[0]["id"], 2);
    assert_eq!(open[0]["severity"], "CRITICAL");

    let out = handle_line(&engine, r#"{"caller":"0xanyone","op":"overdue_emergencies"}"#);
    assert_eq!(out["result"]["emergency_ids"], serde_json::json!([]));

    let out = handle_line(&engine, r#"{"caller":"0xanyone","op":"responders"}"#);
    assert_eq!(out["result"][0]["address"], "0xr1");
    assert_eq!(out["result"][0]["specialty"], "Medical");

    let out = handle_line(&engine, r#"{"caller":"0xanyone","op":"is_authorized_reporter","address":"0xrep"}"#);
    assert_eq!(out["result"]["authorized"], true);
    let out = handle_line(&engine, r#"{"caller":"0xanyone","op":"is_authorized_reporter","address":"0xadmin"}"#);
    assert_eq!(out["result"]["authorized"], true);
    let out = handle_line(&engine, r#"{"caller":"0xanyone","op":"is_authorized_reporter","address":"0xeve"}"#);
    assert_eq!(out["result"]["authorized"], false);
  }
}
