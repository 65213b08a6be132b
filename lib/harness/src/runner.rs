use crate::case::{CaseContext, CaseId, Outcome};
use crate::clock::Clock;
use crate::error::HarnessError;
use crate::metrics::{MetricEntry, MetricSink};
use crate::registry::{BenchmarkRegistry, RegisteredCase};
use crate::reporter::{format_seconds, Reporter};
use crate::stopwatch::Stopwatch;
use std::any::Any;
use std::io::Write;
use std::panic::{self, AssertUnwindSafe};
use std::time::Duration;

/// The final state of an executed benchmark case.
#[derive(Debug, Clone, PartialEq)]
pub enum CaseStatus {
    /// The case completed in the given time.
    Succeeded(Duration),
    /// The case was not applicable.
    Skipped,
    /// The case returned an error or panicked.
    Failed(String),
}

impl CaseStatus {
    /// Renders the status as the value of a report line.
    pub fn render(&self) -> String {
        match self {
            CaseStatus::Succeeded(elapsed) => format_seconds(*elapsed),
            CaseStatus::Skipped => "SKIPPED".to_owned(),
            CaseStatus::Failed(message) => format!("ERROR: {message}"),
        }
    }
}

/// The reported result of a single case.
#[derive(Debug, Clone, PartialEq)]
pub struct CaseReport {
    /// The case.
    pub id: CaseId,
    /// Its final state.
    pub status: CaseStatus,
}

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct RunSummary {
    /// One entry per executed case, in execution order.
    pub cases: Vec<CaseReport>,
    /// The auxiliary metrics, in emission order.
    pub metrics: Vec<MetricEntry>,
    /// The sum of the laps of all cases, including skipped and failed ones.
    pub total: Duration,
}

/// The heading of the metrics section.
const METRICS_TITLE: &str = "Metrics";

/// Executes the cases of a [BenchmarkRegistry] one after the other.
///
/// A case that fails (returns an error or panics) is reported and the run continues with the
/// next case.
pub struct Runner<'reg, R> {
    /// The cases to run.
    registry: &'reg BenchmarkRegistry<R>,
    /// The difficulty multiplier passed to every case.
    multiplier: f64,
    /// Times the cases.
    stopwatch: Stopwatch,
}

impl<'reg, R> Runner<'reg, R> {
    /// Creates a new [Runner] for the cases in `registry`.
    pub fn new(registry: &'reg BenchmarkRegistry<R>, multiplier: f64) -> Self {
        Self {
            registry,
            multiplier,
            stopwatch: Stopwatch::default(),
        }
    }

    /// Times the cases with `clock` instead of the default clock.
    #[must_use]
    pub fn with_clock(mut self, clock: Box<dyn Clock>) -> Self {
        self.stopwatch = Stopwatch::new(clock);
        self
    }

    /// Runs all cases, writes one line per case and the collected metrics to `reporter`.
    ///
    /// Only errors of the harness itself (e.g., a failing output sink) abort the run.
    pub fn run<W: Write>(
        mut self,
        resources: &R,
        reporter: &mut Reporter<W>,
    ) -> Result<RunSummary, HarnessError> {
        let mut metrics = MetricSink::new();
        let mut cases = Vec::with_capacity(self.registry.len());

        for case in self.registry.iter() {
            let status = self.run_case(case, resources, &mut metrics)?;
            reporter.key_value(&case.id().to_string(), &status.render())?;
            cases.push(CaseReport {
                id: case.id().clone(),
                status,
            });
        }

        if !metrics.is_empty() {
            reporter.title(METRICS_TITLE)?;
            for entry in metrics.entries() {
                reporter.key_value(&entry.case.to_string(), &entry.value)?;
            }
        }

        Ok(RunSummary {
            cases,
            metrics: metrics.into_entries(),
            total: self.stopwatch.total(),
        })
    }

    /// Runs a single case and classifies its result.
    fn run_case(
        &mut self,
        case: &RegisteredCase<R>,
        resources: &R,
        metrics: &mut MetricSink,
    ) -> Result<CaseStatus, HarnessError> {
        tracing::debug!(case = %case.id(), "Running benchmark case");
        metrics.begin_case(case.id().clone());

        self.stopwatch.start();
        let result = {
            let mut ctx = CaseContext::new(
                self.multiplier,
                resources,
                self.stopwatch.clock(),
                metrics,
            );
            panic::catch_unwind(AssertUnwindSafe(|| case.case().run(&mut ctx)))
        };
        // Skipped and failed cases are timed as well.
        let lap = self.stopwatch.stop()?;
        metrics.end_case();

        let status = match result {
            Ok(Ok(Outcome::Completed(_))) => CaseStatus::Succeeded(lap),
            Ok(Ok(Outcome::Skipped)) => CaseStatus::Skipped,
            Ok(Err(error)) => CaseStatus::Failed(format!("{error:#}")),
            Err(payload) => CaseStatus::Failed(panic_message(payload.as_ref())),
        };

        match &status {
            CaseStatus::Failed(message) => {
                tracing::warn!(case = %case.id(), error = %message, "Benchmark case failed");
            }
            CaseStatus::Skipped => tracing::debug!(case = %case.id(), "Benchmark case skipped"),
            CaseStatus::Succeeded(elapsed) => {
                tracing::debug!(case = %case.id(), ?elapsed, "Benchmark case finished");
            }
        }

        Ok(status)
    }
}

/// Extracts the message of a panic payload.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_owned()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "Benchmark case panicked".to_owned()
    }
}

#[cfg(test)]
#[allow(clippy::panic)]
mod tests {
    use super::*;
    use crate::clock::ManualClock;
    use crate::error::RegistryError;
    use anyhow::{bail, Context};
    use std::cell::Cell;

    fn run(
        registry: &BenchmarkRegistry<()>,
        multiplier: f64,
        clock: &ManualClock,
    ) -> (RunSummary, Vec<String>) {
        let mut reporter = Reporter::new(Vec::new(), 55);
        let summary = Runner::new(registry, multiplier)
            .with_clock(Box::new(clock.clone()))
            .run(&(), &mut reporter)
            .unwrap();
        let output = String::from_utf8(reporter.into_inner()).unwrap();
        (summary, output.lines().map(str::to_owned).collect())
    }

    #[test]
    fn failures_do_not_abort_the_run() -> Result<(), RegistryError> {
        let clock = ManualClock::new();
        let ticks = clock.clone();
        let mut registry = BenchmarkRegistry::new();
        registry.register_fn("core", "ok", move |_| {
            ticks.advance(Duration::from_micros(12_345));
            Ok(Outcome::Completed(1))
        })?;
        registry.register_fn("core", "boom", |_| bail!("bad"))?;

        let (summary, lines) = run(&registry, 1.0, &clock);

        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("core::ok..."));
        assert!(lines[0].ends_with(" 0.0123 s"));
        assert!(lines[1].starts_with("core::boom..."));
        assert!(lines[1].ends_with(" ERROR: bad"));
        assert_eq!(summary.cases[1].status, CaseStatus::Failed("bad".to_owned()));
        Ok(())
    }

    #[test]
    fn skip_is_rendered_verbatim_for_any_multiplier() -> Result<(), RegistryError> {
        let mut registry = BenchmarkRegistry::new();
        registry.register_fn("rand", "unsupported", |_| Ok(Outcome::Skipped))?;

        for multiplier in [0.0, 1.0, 7.5] {
            let (summary, lines) = run(&registry, multiplier, &ManualClock::new());
            assert_eq!(summary.cases[0].status, CaseStatus::Skipped);
            assert_eq!(summary.cases[0].status.render(), "SKIPPED");
            assert!(lines[0].ends_with(" SKIPPED"));
        }
        Ok(())
    }

    #[test]
    fn panics_are_contained() -> Result<(), RegistryError> {
        let executed = std::rc::Rc::new(Cell::new(false));
        let flag = std::rc::Rc::clone(&executed);
        let mut registry = BenchmarkRegistry::new();
        registry.register_fn("core", "panic", |_| panic!("out of bounds"))?;
        registry.register_fn("core", "after", move |_| {
            flag.set(true);
            Ok(Outcome::Completed(0))
        })?;

        let (summary, _) = run(&registry, 1.0, &ManualClock::new());

        assert_eq!(
            summary.cases[0].status,
            CaseStatus::Failed("out of bounds".to_owned())
        );
        assert!(executed.get());
        Ok(())
    }

    #[test]
    fn error_context_is_part_of_the_message() -> Result<(), RegistryError> {
        let mut registry = BenchmarkRegistry::new();
        registry.register_fn("io", "file_read", |_| {
            Err(anyhow::anyhow!("permission denied")).context("Cannot read scratch file")
        })?;

        let (summary, _) = run(&registry, 1.0, &ManualClock::new());
        assert_eq!(
            summary.cases[0].status.render(),
            "ERROR: Cannot read scratch file: permission denied"
        );
        Ok(())
    }

    #[test]
    fn total_is_the_sum_of_all_laps() -> Result<(), RegistryError> {
        let clock = ManualClock::new();
        let mut registry = BenchmarkRegistry::new();
        for (name, millis) in [("a", 250), ("b", 1500), ("c", 125)] {
            let ticks = clock.clone();
            registry.register_fn("core", name, move |_| {
                ticks.advance(Duration::from_millis(millis));
                Ok(Outcome::Completed(0))
            })?;
        }
        // Skipped and failed cases accrue their lap as well.
        let ticks = clock.clone();
        registry.register_fn("core", "skipped", move |_| {
            ticks.advance(Duration::from_millis(3));
            Ok(Outcome::Skipped)
        })?;
        let ticks = clock.clone();
        registry.register_fn("core", "failed", move |_| {
            ticks.advance(Duration::from_millis(2));
            bail!("late failure")
        })?;

        let (summary, _) = run(&registry, 1.0, &clock);

        assert_eq!(summary.total, Duration::from_millis(1880));
        assert_eq!(format_seconds(summary.total), "1.8800 s");
        Ok(())
    }

    #[test]
    fn metrics_are_reported_after_the_cases() -> Result<(), RegistryError> {
        let clock = ManualClock::new();
        let ticks = clock.clone();
        let mut registry = BenchmarkRegistry::new();
        registry.register_fn("db", "select", move |ctx| {
            let start = ctx.now();
            ticks.advance(Duration::from_millis(100));
            ctx.record_rate("q/s", 50, start);
            Ok(Outcome::Completed(50))
        })?;
        registry.register_fn("db", "ping", |_| Ok(Outcome::Completed(1)))?;

        let (summary, lines) = run(&registry, 1.0, &clock);

        assert_eq!(lines.len(), 4);
        assert!(lines[2].contains(" Metrics "));
        assert!(lines[3].starts_with("db::select..."));
        assert!(lines[3].ends_with(" 500 q/s"));
        assert_eq!(summary.metrics.len(), 1);
        Ok(())
    }

    #[test]
    fn no_metrics_section_without_metrics() -> Result<(), RegistryError> {
        let mut registry = BenchmarkRegistry::new();
        registry.register_fn("core", "ok", |_| Ok(Outcome::Completed(1)))?;

        let (_, lines) = run(&registry, 1.0, &ManualClock::new());
        assert_eq!(lines.len(), 1);
        Ok(())
    }

    #[test]
    fn multiplier_reaches_the_case() -> Result<(), RegistryError> {
        let mut registry = BenchmarkRegistry::new();
        registry.register_fn("core", "scaled", |ctx| {
            if ctx.scaled(10) != 25 {
                bail!("unexpected iteration count {}", ctx.scaled(10));
            }
            Ok(Outcome::Completed(ctx.scaled(10)))
        })?;

        let (summary, _) = run(&registry, 2.5, &ManualClock::new());
        assert!(matches!(summary.cases[0].status, CaseStatus::Succeeded(_)));
        Ok(())
    }
}
