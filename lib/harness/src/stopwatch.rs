use crate::clock::{best_available, Clock};
use crate::error::StopwatchError;
use std::fmt::{Debug, Formatter};
use std::time::Duration;

/// Accumulates the elapsed time of multiple start/stop cycles (laps).
pub struct Stopwatch {
    /// The time source.
    clock: Box<dyn Clock>,
    /// The sum of all finished laps.
    total: Duration,
    /// The start of the running lap, if any.
    lap_start: Option<Duration>,
}

impl Stopwatch {
    /// Creates a new idle [Stopwatch] that reads from `clock`.
    pub fn new(clock: Box<dyn Clock>) -> Self {
        Self {
            clock,
            total: Duration::ZERO,
            lap_start: None,
        }
    }

    /// Starts a new lap and returns its start timestamp.
    ///
    /// Starting again before stopping restarts the running lap.
    pub fn start(&mut self) -> Duration {
        let now = self.clock.now();
        self.lap_start = Some(now);
        now
    }

    /// Stops the running lap, adds it to the total and returns its duration.
    pub fn stop(&mut self) -> Result<Duration, StopwatchError> {
        let start = self.lap_start.take().ok_or(StopwatchError::NotStarted)?;
        // A non-monotonic clock may report a timestamp before the lap start.
        let lap = self.clock.now().saturating_sub(start);
        self.total += lap;
        Ok(lap)
    }

    /// Returns the sum of all finished laps.
    pub fn total(&self) -> Duration {
        self.total
    }

    /// Returns whether a lap is running.
    pub fn is_running(&self) -> bool {
        self.lap_start.is_some()
    }

    /// Returns the clock of this stopwatch.
    pub(crate) fn clock(&self) -> &dyn Clock {
        self.clock.as_ref()
    }
}

impl Default for Stopwatch {
    fn default() -> Self {
        Self::new(best_available())
    }
}

impl Debug for Stopwatch {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Stopwatch")
            .field("total", &self.total)
            .field("lap_start", &self.lap_start)
            .finish_non_exhaustive()
    }
}
