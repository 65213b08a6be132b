use std::cell::Cell;
use std::rc::Rc;
use std::time::{Duration, Instant, SystemTime, UNIX_EPOCH};

/// A source of timestamps.
///
/// Timestamps are expressed as the time elapsed since an arbitrary, clock-specific origin. Only
/// differences between two timestamps of the same clock are meaningful.
pub trait Clock {
    /// Returns the current timestamp.
    fn now(&self) -> Duration;
}

/// A monotonic high-resolution clock backed by [`Instant`].
///
/// This is the clock used by default.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    /// Creates a new [MonotonicClock] whose origin is the moment of creation.
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// A clock backed by the system wall clock.
///
/// This clock is **not** monotonic. Adjusting the system clock while a lap is running can make
/// time appear to stand still or jump. A timestamp before the Unix epoch is reported as zero.
#[derive(Debug, Clone, Copy, Default)]
pub struct WallClock;

impl Clock for WallClock {
    fn now(&self) -> Duration {
        SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default()
    }
}

/// A clock that only moves when told to.
///
/// Clones share the same time, so a benchmark case can hold a handle and advance the clock
/// the runner reads from.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Duration>>,
}

impl ManualClock {
    /// Creates a new [ManualClock] standing at zero.
    pub fn new() -> Self {
        Self::default()
    }

    /// Moves the clock forward by `delta`.
    pub fn advance(&self, delta: Duration) {
        self.now.set(self.now.get() + delta);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

/// Returns the best clock available on this platform.
///
/// [`Instant`] is monotonic on every supported platform, so this is always a [MonotonicClock].
/// [WallClock] is the documented fallback for embedders that have to avoid [`Instant`].
pub fn best_available() -> Box<dyn Clock> {
    Box::new(MonotonicClock::new())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn monotonic_clock_never_goes_backwards() {
        let clock = MonotonicClock::new();
        let first = clock.now();
        let second = clock.now();
        assert!(second >= first);
    }

    #[test]
    fn wall_clock_reads_the_system_time() {
        let before = SystemTime::now().duration_since(UNIX_EPOCH).unwrap();
        let now = WallClock.now();
        let after = SystemTime::now().duration_since(UNIX_EPOCH).unwrap();

        assert!(!now.is_zero());
        assert!(before <= now && now <= after, "{now:?} not in {before:?}..{after:?}");
    }

    #[test]
    fn manual_clock_clones_share_time() {
        let clock = ManualClock::new();
        let handle = clock.clone();
        handle.advance(Duration::from_millis(250));
        assert_eq!(clock.now(), Duration::from_millis(250));
    }
}
