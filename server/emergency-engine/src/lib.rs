//! Emergency Coordination Engine: authorization-checked incident lifecycle.
//!
//! Accepts emergency reports from authorized reporters, lets the admin assign
//! registered responders, tracks status through resolution, and keeps running
//! response-time averages per responder. Every committed change is emitted as
//! a structured event for an external audit log.
//!
//! No DB, no network; persistence and transport belong to the host.

pub mod audit;
pub mod clock;
pub mod command;
pub mod config;
pub mod engine;
pub mod error;
pub mod guard;
pub mod lifecycle;
pub mod query;
pub mod registry;
pub mod state;
pub mod types;
pub mod validate;

pub use audit::{AuditLog, BackgroundSink, EngineEvent, EventSink, JsonLinesSink, NullSink};
pub use clock::{Clock, ManualClock, SystemClock};
pub use config::{Config, TransitionPolicy};
pub use engine::Engine;
pub use error::EngineError;
pub use types::{Emergency, InboundCommand, Principal, Responder, Severity, Status};
