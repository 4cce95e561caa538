//! Domain events and the sinks that receive them.
//!
//! The engine emits one [`EngineEvent`] per state change, in commit order.
//! Sinks are called while the engine holds its write lock so that the audit
//! order matches the commit order. Anything that does I/O belongs behind a
//! [`BackgroundSink`], which only enqueues on the caller's thread.

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::io::Write;
use std::sync::mpsc;
use std::sync::Arc;
use std::thread::JoinHandle;

use crate::types::{Principal, Severity, Status};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum EngineEvent {
  EmergencyReported {
    emergency_id: u64,
    reporter: Principal,
    severity: Severity,
    location: String,
    at: DateTime<Utc>,
  },
  ResponderAssigned {
    emergency_id: u64,
    responder: Principal,
    assigned_by: Principal,
    at: DateTime<Utc>,
  },
  EmergencyStatusUpdated {
    emergency_id: u64,
    old_status: Status,
    new_status: Status,
    updated_by: Principal,
    at: DateTime<Utc>,
  },
  ResponderRegistered {
    responder: Principal,
    name: String,
    specialty: String,
    at: DateTime<Utc>,
  },
  ResponderDeactivated {
    responder: Principal,
    at: DateTime<Utc>,
  },
  ReporterAuthorized {
    reporter: Principal,
    at: DateTime<Utc>,
  },
}

impl EngineEvent {
  pub fn name(&self) -> &'static str {
    match self {
      Self::EmergencyReported { .. } => "emergency_reported",
      Self::ResponderAssigned { .. } => "responder_assigned",
      Self::EmergencyStatusUpdated { .. } => "emergency_status_updated",
      Self::ResponderRegistered { .. } => "responder_registered",
      Self::ResponderDeactivated { .. } => "responder_deactivated",
      Self::ReporterAuthorized { .. } => "reporter_authorized",
    }
  }
}

/// Fire-and-forget receiver of engine events.
pub trait EventSink: Send + Sync {
  fn emit(&self, event: &EngineEvent);
}

/// Drops everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl EventSink for NullSink {
  fn emit(&self, _event: &EngineEvent) {}
}

// ---------------------------------------------------------------------------
// Hash-chained in-memory audit log
// ---------------------------------------------------------------------------

const GENESIS_HASH: &str = "0000000000000000000000000000000000000000000000000000000000000000";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
  pub seq: u64,
  pub event: EngineEvent,
  pub prev_hash: String,
  pub hash: String,
}

fn record_hash(seq: u64, prev_hash: &str, event: &EngineEvent) -> Result<String, serde_json::Error> {
  let body = serde_json::to_vec(event)?;
  let mut hasher = blake3::Hasher::new();
  hasher.update(&seq.to_le_bytes());
  hasher.update(b"|");
  hasher.update(prev_hash.as_bytes());
  hasher.update(b"|");
  hasher.update(&body);
  Ok(hasher.finalize().to_hex().to_string())
}

/// Check a record sequence. Returns the seq of the first record that does not link up.
pub fn verify_chain(records: &[AuditRecord]) -> Result<(), u64> {
  let mut prev = GENESIS_HASH.to_string();
  for (i, record) in records.iter().enumerate() {
    let expected = record_hash(record.seq, &prev, &record.event).map_err(|_| record.seq)?;
    if record.seq != i as u64 || record.prev_hash != prev || record.hash != expected {
      return Err(record.seq);
    }
    prev = expected;
  }
  Ok(())
}

/// Append-only, tamper-evident event log. Stands in for the external ledger.
#[derive(Debug, Default)]
pub struct AuditLog {
  records: Mutex<Vec<AuditRecord>>,
}

impl AuditLog {
  pub fn new() -> Self {
    Self::default()
  }

  pub fn records(&self) -> Vec<AuditRecord> {
    self.records.lock().clone()
  }

  pub fn events(&self) -> Vec<EngineEvent> {
    self.records.lock().iter().map(|r| r.event.clone()).collect()
  }

  pub fn len(&self) -> usize {
    self.records.lock().len()
  }

  pub fn is_empty(&self) -> bool {
    self.records.lock().is_empty()
  }

  pub fn head_hash(&self) -> String {
    self
      .records
      .lock()
      .last()
      .map(|r| r.hash.clone())
      .unwrap_or_else(|| GENESIS_HASH.to_string())
  }

  pub fn verify(&self) -> Result<(), u64> {
    verify_chain(&self.records.lock())
  }
}

impl EventSink for AuditLog {
  fn emit(&self, event: &EngineEvent) {
    let mut records = self.records.lock();
    let seq = records.len() as u64;
    let prev_hash = records
      .last()
      .map(|r| r.hash.clone())
      .unwrap_or_else(|| GENESIS_HASH.to_string());
    match record_hash(seq, &prev_hash, event) {
      Ok(hash) => records.push(AuditRecord {
        seq,
        event: event.clone(),
        prev_hash,
        hash,
      }),
      Err(e) => tracing::error!(event = event.name(), "audit: could not encode event: {e}"),
    }
  }
}

// ---------------------------------------------------------------------------
// JSON lines writer
// ---------------------------------------------------------------------------

fn write_line(out: &mut impl Write, event: &EngineEvent) -> std::io::Result<()> {
  serde_json::to_writer(&mut *out, event)?;
  writeln!(out)?;
  out.flush()
}

/// Writes each event as one JSON line. Write failures are logged and dropped.
///
/// Writes and flushes inline, so on its own it suits tests and small hosts.
/// Hosts writing to disk should wrap it in a [`BackgroundSink`].
pub struct JsonLinesSink<W: Write + Send> {
  out: Mutex<W>,
}

impl<W: Write + Send> JsonLinesSink<W> {
  pub fn new(out: W) -> Self {
    Self {
      out: Mutex::new(out),
    }
  }

  pub fn into_inner(self) -> W {
    self.out.into_inner()
  }
}

impl<W: Write + Send> EventSink for JsonLinesSink<W> {
  fn emit(&self, event: &EngineEvent) {
    let mut out = self.out.lock();
    if let Err(e) = write_line(&mut *out, event) {
      tracing::error!(event = event.name(), "audit sink write failed: {e}");
    }
  }
}

// ---------------------------------------------------------------------------
// Background delivery
// ---------------------------------------------------------------------------

/// Hands events to a dedicated drain thread that feeds the inner sink.
///
/// `emit` clones the event onto an unbounded channel and returns, so the
/// engine lock is never held across the inner sink's I/O. The single drain
/// thread preserves send order, which is commit order.
pub struct BackgroundSink {
  tx: Mutex<Option<mpsc::Sender<EngineEvent>>>,
  drain: Mutex<Option<JoinHandle<()>>>,
}

impl BackgroundSink {
  pub fn spawn(inner: Arc<dyn EventSink>) -> std::io::Result<Self> {
    let (tx, rx) = mpsc::channel::<EngineEvent>();
    let drain = std::thread::Builder::new()
      .name("audit-drain".into())
      .spawn(move || {
        while let Ok(event) = rx.recv() {
          inner.emit(&event);
        }
      })?;
    Ok(Self {
      tx: Mutex::new(Some(tx)),
      drain: Mutex::new(Some(drain)),
    })
  }

  /// Close the channel and wait until every queued event reached the inner sink.
  /// Later emits are dropped with a warning.
  pub fn shutdown(&self) {
    drop(self.tx.lock().take());
    if let Some(handle) = self.drain.lock().take() {
      if handle.join().is_err() {
        tracing::error!("audit drain thread panicked");
      }
    }
  }
}

impl EventSink for BackgroundSink {
  fn emit(&self, event: &EngineEvent) {
    match self.tx.lock().as_ref() {
      Some(tx) => {
        if tx.send(event.clone()).is_err() {
          tracing::error!(event = event.name(), "audit drain is gone; event lost");
        }
      }
      None => tracing::warn!(event = event.name(), "audit sink already shut down; event dropped"),
    }
  }
}

impl Drop for BackgroundSink {
  fn drop(&mut self) {
    self.shutdown();
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use chrono::TimeZone;

  fn at() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, 15, 10, 0, 0).unwrap()
  }

  fn authorized(who: &str) -> EngineEvent {
    EngineEvent::ReporterAuthorized {
      reporter: Principal::new(who),
      at: at(),
    }
  }

  #[test]
  fn chain_links_and_verifies() {
    let log = AuditLog::new();
    assert!(log.is_empty());
    assert_eq!(log.head_hash(), GENESIS_HASH);

    log.emit(&authorized("0xa"));
    log.emit(&authorized("0xb"));
    let records = log.records();
    assert_eq!(records.len(), 2);
    assert_eq!(records[0].prev_hash, GENESIS_HASH);
    assert_eq!(records[1].prev_hash, records[0].hash);
    assert_eq!(log.head_hash(), records[1].hash);
    assert_eq!(log.verify(), Ok(()));
  }

  #[test]
  fn tampering_is_detected() {
    let log = AuditLog::new();
    for who in ["0xa", "0xb", "0xc"] {
      log.emit(&authorized(who));
    }
    let mut records = log.records();
    records[1].event = authorized("0xmallory");
    assert_eq!(verify_chain(&records), Err(1));

    let mut records = log.records();
    records.remove(0);
    assert_eq!(verify_chain(&records), Err(1));
  }

  #[test]
  fn json_lines_sink_writes_one_line_per_event() {
    let sink = JsonLinesSink::new(Vec::new());
    sink.emit(&authorized("0xa"));
    sink.emit(&EngineEvent::ResponderDeactivated {
      responder: Principal::new("0xr"),
      at: at(),
    });
    let text = String::from_utf8(sink.into_inner()).unwrap();
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines.len(), 2);
    let first: serde_json::Value = serde_json::from_str(lines[0]).unwrap();
    assert_eq!(first["event"], "reporter_authorized");
    assert_eq!(first["reporter"], "0xa");
  }

  #[test]
  fn background_sink_delivers_in_order_before_shutdown_returns() {
    let log = Arc::new(AuditLog::new());
    let sink = BackgroundSink::spawn(log.clone()).unwrap();
    for who in ["0xa", "0xb", "0xc"] {
      sink.emit(&authorized(who));
    }
    sink.shutdown();

    let reporters: Vec<String> = log
      .events()
      .into_iter()
      .map(|e| match e {
        EngineEvent::ReporterAuthorized { reporter, .. } => reporter.0,
        other => panic!("unexpected event {:?}", other),
      })
      .collect();
    assert_eq!(reporters, ["0xa", "0xb", "0xc"]);
    assert_eq!(log.verify(), Ok(()));

    sink.emit(&authorized("0xlate"));
    assert_eq!(log.len(), 3);
  }
}
