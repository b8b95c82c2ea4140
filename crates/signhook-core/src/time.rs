//! Clock abstraction for the replay window.
//!
//! The verifier compares sender timestamps against "now"; injecting the clock
//! lets tests pin now to an exact second and probe the window boundaries.

use std::{
    sync::{
        atomic::{AtomicI64, Ordering},
        Arc,
    },
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};

/// Clock abstraction for time operations.
pub trait Clock: Send + Sync + std::fmt::Debug {
    /// Returns the current instant for duration measurements.
    fn now(&self) -> Instant;

    /// Returns the current system time.
    fn now_system(&self) -> SystemTime;

    /// Returns the current time as whole unix seconds.
    fn now_unix(&self) -> i64 {
        match self.now_system().duration_since(UNIX_EPOCH) {
            Ok(since) => i64::try_from(since.as_secs()).unwrap_or(i64::MAX),
            Err(before) => -i64::try_from(before.duration().as_secs()).unwrap_or(i64::MAX),
        }
    }
}

/// Real clock backed by the operating system.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealClock;

impl RealClock {
    /// Creates a new real clock instance.
    pub fn new() -> Self {
        Self
    }
}

impl Clock for RealClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn now_system(&self) -> SystemTime {
        SystemTime::now()
    }
}

/// Deterministic clock with second resolution.
///
/// Clones share the same underlying time, so a test can hand one clone to the
/// router and keep another to move time around.
#[derive(Debug, Clone)]
pub struct TestClock {
    unix_secs: Arc<AtomicI64>,
    base_instant: Instant,
}

impl TestClock {
    /// Creates a clock starting at the current wall time.
    pub fn new() -> Self {
        Self::at_unix(RealClock.now_unix())
    }

    /// Creates a clock pinned to `secs` since the epoch.
    pub fn at_unix(secs: i64) -> Self {
        Self { unix_secs: Arc::new(AtomicI64::new(secs)), base_instant: Instant::now() }
    }

    /// Moves the clock forward.
    pub fn advance(&self, duration: Duration) {
        let secs = i64::try_from(duration.as_secs()).unwrap_or(i64::MAX);
        self.unix_secs.fetch_add(secs, Ordering::AcqRel);
    }

    /// Sets the clock to an exact unix time, forwards or backwards.
    pub fn set_unix(&self, secs: i64) {
        self.unix_secs.store(secs, Ordering::Release);
    }
}

impl Default for TestClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for TestClock {
    fn now(&self) -> Instant {
        self.base_instant
    }

    fn now_system(&self) -> SystemTime {
        let secs = self.unix_secs.load(Ordering::Acquire);
        match u64::try_from(secs) {
            Ok(secs) => UNIX_EPOCH + Duration::from_secs(secs),
            Err(_) => UNIX_EPOCH - Duration::from_secs(secs.unsigned_abs()),
        }
    }

    fn now_unix(&self) -> i64 {
        self.unix_secs.load(Ordering::Acquire)
    }
}
