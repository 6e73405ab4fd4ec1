//! Process-wide rate gate
//!
//! Every request consults the gate before it is sent and may push the gate's
//! "paused until" instant forward after the response arrives. The instant only
//! ever moves forward: a shorter pause never overrides a longer one already in
//! effect, so a burst of concurrent responses cannot release waiters early.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::time::{sleep_until, Instant};
use tracing::debug;

use crate::downloader::config::cap_wait;

/// Source of wall-clock time used to interpret epoch-based quota headers
pub trait Clock: Send + Sync + fmt::Debug {
    /// Milliseconds since the Unix epoch
    fn now_epoch_millis(&self) -> i64;
}

/// Wall clock backed by the system time
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now_epoch_millis(&self) -> i64 {
        chrono::Utc::now().timestamp_millis()
    }
}

/// Clock frozen at a fixed epoch instant
#[derive(Debug, Clone, Copy)]
pub struct FixedClock {
    epoch_millis: i64,
}

impl FixedClock {
    /// Freeze the clock at `epoch_secs` seconds since the Unix epoch
    pub fn at_epoch_secs(epoch_secs: i64) -> Self {
        Self {
            epoch_millis: epoch_secs * 1000,
        }
    }
}

impl Clock for FixedClock {
    fn now_epoch_millis(&self) -> i64 {
        self.epoch_millis
    }
}

/// Shared pause state consulted by every request
///
/// The pause deadline is stored as microseconds past the gate's creation
/// instant (0 = never paused) and updated with `fetch_max`, which makes
/// `extend_pause` a lock-free monotonic maximum.
pub struct RateGate {
    origin: Instant,
    paused_until_micros: AtomicU64,
}

impl RateGate {
    /// Create an open gate
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            paused_until_micros: AtomicU64::new(0),
        }
    }

    /// Suspend the caller until the pause deadline has passed
    ///
    /// Returns how long the caller was held. The deadline is re-read after
    /// each wake-up because other requests may extend it meanwhile.
    pub async fn wait_if_paused(&self) -> Duration {
        let started = Instant::now();
        loop {
            match self.paused_until() {
                Some(until) if until > Instant::now() => {
                    debug!(
                        wait_ms = until.saturating_duration_since(Instant::now()).as_millis() as u64,
                        "Rate gate closed, waiting"
                    );
                    sleep_until(until).await;
                }
                _ => break,
            }
        }
        started.elapsed()
    }

    /// Move the pause deadline to `until` unless a later deadline is already set
    ///
    /// Returns `true` when this call extended the pause.
    pub fn extend_pause(&self, until: Instant) -> bool {
        let offset = Self::ceil_micros(until.saturating_duration_since(self.origin));
        let previous = self.paused_until_micros.fetch_max(offset, Ordering::SeqCst);
        offset > previous
    }

    /// Pause for `duration` starting now (see [`RateGate::extend_pause`])
    ///
    /// `duration` is capped at
    /// [`MAX_RATE_LIMIT_WAIT_MS`](crate::downloader::config::MAX_RATE_LIMIT_WAIT_MS).
    pub fn extend_pause_for(&self, duration: Duration) -> bool {
        let now = Instant::now();
        match now.checked_add(cap_wait(duration)) {
            Some(until) => self.extend_pause(until),
            None => false,
        }
    }

    /// Current pause deadline, `None` if the gate has never been closed
    pub fn paused_until(&self) -> Option<Instant> {
        match self.paused_until_micros.load(Ordering::SeqCst) {
            0 => None,
            micros => Some(self.origin + Duration::from_micros(micros)),
        }
    }

    /// Whether a request issued now would have to wait
    pub fn is_paused(&self) -> bool {
        self.paused_until()
            .is_some_and(|until| until > Instant::now())
    }

    // Round up so a stored deadline is never earlier than the requested one.
    fn ceil_micros(duration: Duration) -> u64 {
        let micros = duration.as_nanos().div_ceil(1_000);
        u64::try_from(micros).unwrap_or(u64::MAX)
    }
}

impl Default for RateGate {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RateGate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RateGate")
            .field("paused_until", &self.paused_until())
            .finish()
    }
}
