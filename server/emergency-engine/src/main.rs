//! Binary entrypoint: read JSON command lines from stdin, write JSON result lines to stdout.
//!
//! Each input line is an InboundCommand. Each output line is either:
//! - A ResultOutput (`{"ok": true, "result": ...}`)
//! - An ErrorOutput (`{"error": true, "kind": ..., "message": ...}`)
//!
//! Environment:
//! - `EMERGENCY_ADMIN` (required): the admin principal.
//! - `EMERGENCY_AUDIT_LOG`: append events as JSON lines to this file.
//! - `EMERGENCY_RESPONSE_LIMIT_MINUTES`, `EMERGENCY_TRANSITIONS`: see `Config::from_env`.
//! - `RUST_LOG`: log filter (logs go to stderr).

use emergency_engine::command::handle_line;
use emergency_engine::{BackgroundSink, Config, Engine, EventSink, JsonLinesSink, NullSink, Principal, SystemClock};
use std::fs::OpenOptions;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
    .with_writer(io::stderr)
    .with_target(false)
    .init();

  if let Err(e) = run_binary() {
    tracing::error!("emergency-engine: {e}");
    std::process::exit(1);
  }
}

fn run_binary() -> Result<(), Box<dyn std::error::Error>> {
  let admin = std::env::var("EMERGENCY_ADMIN").map_err(|_| "EMERGENCY_ADMIN must be set")?;
  let config = Config::from_env()?;

  let audit = match std::env::var("EMERGENCY_AUDIT_LOG") {
    Ok(path) => {
      let file = OpenOptions::new().create(true).append(true).open(&path)?;
      tracing::info!(path = %path, "audit events enabled");
      Some(Arc::new(BackgroundSink::spawn(Arc::new(JsonLinesSink::new(file)))?))
    }
    Err(_) => None,
  };
  let sink: Arc<dyn EventSink> = match &audit {
    Some(background) => background.clone(),
    None => Arc::new(NullSink),
  };

  let engine = Engine::new(Principal::new(admin), config, Arc::new(SystemClock::new()), sink)?;

  let stdin = io::stdin();
  let stdout = io::stdout();
  let mut out = io::BufWriter::new(stdout.lock());

  for line in stdin.lock().lines() {
    let line = line?;

    // Skip blank lines.
    let trimmed = line.trim();
    if trimmed.is_empty() {
      continue;
    }

    let reply = handle_line(&engine, trimmed);
    serde_json::to_writer(&mut out, &reply)?;
    writeln!(out)?;
    out.flush()?;
  }

  // Flush queued audit events before exit.
  if let Some(background) = audit {
    background.shutdown();
  }
  Ok(())
}
