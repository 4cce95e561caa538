//! Time sources. The engine never reads the wall clock directly.

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

/// Monotonically non-decreasing time source supplied by the host.
pub trait Clock: Send + Sync {
  fn now(&self) -> DateTime<Utc>;
}

/// Wall clock that never goes backwards, even if the system time does.
#[derive(Debug, Default)]
pub struct SystemClock {
  last: Mutex<Option<DateTime<Utc>>>,
}

impl SystemClock {
  pub fn new() -> Self {
    Self::default()
  }
}

impl Clock for SystemClock {
  fn now(&self) -> DateTime<Utc> {
    let mut last = self.last.lock();
    let now = match *last {
      Some(prev) => Utc::now().max(prev),
      None => Utc::now(),
    };
    *last = Some(now);
    now
  }
}

/// Hand-driven clock for tests and replay.
#[derive(Debug)]
pub struct ManualClock {
  now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
  pub fn new(start: DateTime<Utc>) -> Self {
    Self {
      now: Mutex::new(start),
    }
  }

  /// Move time forward. Negative durations are ignored.
  pub fn advance(&self, by: Duration) {
    if by > Duration::zero() {
      *self.now.lock() += by;
    }
  }

  /// Jump to `to` unless that would move backwards.
  pub fn set(&self, to: DateTime<Utc>) {
    let mut now = self.now.lock();
    if to > *now {
      *now = to;
    }
  }
}

impl Clock for ManualClock {
  fn now(&self) -> DateTime<Utc> {
    *self.now.lock()
  }
}
