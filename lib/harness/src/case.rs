use crate::clock::Clock;
use crate::metrics::MetricSink;
use std::fmt::{Display, Formatter};
use std::time::Duration;

/// Identifies a benchmark case by its category and name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CaseId {
    category: String,
    name: String,
}

impl CaseId {
    /// Creates a new [CaseId].
    pub fn new(category: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            category: category.into(),
            name: name.into(),
        }
    }

    /// Returns the category of the case.
    pub fn category(&self) -> &str {
        &self.category
    }

    /// Returns the name of the case within its category.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Display for CaseId {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}::{}", self.category, self.name)
    }
}

/// The result of a benchmark case that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The case ran to completion. The value is the number of iterations (or any other count the
    /// case wants to return) and carries no meaning for the report.
    Completed(u64),
    /// The case is not applicable in this environment, e.g., because a resource is missing.
    Skipped,
}

/// A unit of benchmark work.
///
/// `R` is the type of the shared resources (database handles, scratch space, ...) that are
/// available to the cases of a run.
pub trait BenchmarkCase<R> {
    /// Executes the case.
    ///
    /// Any error returned (or panic raised) is treated as a failure of this case only.
    fn run(&self, ctx: &mut CaseContext<'_, R>) -> anyhow::Result<Outcome>;
}

/// A [BenchmarkCase] backed by a closure.
pub struct FnCase<F>(pub F);

impl<R, F> BenchmarkCase<R> for FnCase<F>
where
    F: Fn(&mut CaseContext<'_, R>) -> anyhow::Result<Outcome>,
{
    fn run(&self, ctx: &mut CaseContext<'_, R>) -> anyhow::Result<Outcome> {
        (self.0)(ctx)
    }
}

/// Everything a running benchmark case has access to.
pub struct CaseContext<'run, R> {
    /// The difficulty multiplier of the run.
    multiplier: f64,
    /// The shared resources of the run.
    resources: &'run R,
    /// The clock the runner times the case with.
    clock: &'run dyn Clock,
    /// Receives the auxiliary metrics of the case.
    metrics: &'run mut MetricSink,
}

impl<'run, R> CaseContext<'run, R> {
    /// Creates a new [CaseContext].
    pub fn new(
        multiplier: f64,
        resources: &'run R,
        clock: &'run dyn Clock,
        metrics: &'run mut MetricSink,
    ) -> Self {
        Self {
            multiplier,
            resources,
            clock,
            metrics,
        }
    }

    /// Scales a base iteration count by the difficulty multiplier, rounding up.
    #[allow(
        clippy::cast_possible_truncation,
        clippy::cast_precision_loss,
        clippy::cast_sign_loss
    )]
    pub fn scaled(&self, base_count: u64) -> u64 {
        (base_count as f64 * self.multiplier).ceil() as u64
    }

    /// Returns the shared resources.
    ///
    /// The returned reference outlives the borrow of the context, so metrics can be recorded
    /// while a resource is in use.
    pub fn resources(&self) -> &'run R {
        self.resources
    }

    /// Returns the current timestamp of the run's clock.
    pub fn now(&self) -> Duration {
        self.clock.now()
    }

    /// Records an auxiliary metric for this case.
    pub fn record_metric(&mut self, unit: &str, value: impl Display) {
        self.metrics.record(unit, value);
    }

    /// Records the rate `count / (now - since)`, rounded to an integer, for this case.
    ///
    /// A non-zero count in zero time has no finite rate and is recorded as `n/a`.
    #[allow(clippy::cast_precision_loss)]
    pub fn record_rate(&mut self, unit: &str, count: u64, since: Duration) {
        let elapsed = self.now().saturating_sub(since);
        if count == 0 {
            self.record_metric(unit, 0);
        } else if elapsed.is_zero() {
            self.record_metric(unit, "n/a");
        } else {
            let rate = count as f64 / elapsed.as_secs_f64();
            self.record_metric(unit, format!("{rate:.0}"));
        }
    }
}
