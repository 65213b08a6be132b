//! The execution engine of envbench.
//!
//! Benchmark cases are registered in a [BenchmarkRegistry] and executed one after the other by a
//! [Runner]. The runner times every case with a [Stopwatch], contains failures of individual cases
//! and writes one aligned line per case to a [Reporter]. Cases can attach auxiliary measurements
//! (e.g., queries per second) through their [CaseContext], which are reported after the run.
//!
//! The engine knows nothing about concrete workloads. The resources available to the cases are a
//! type parameter of the registry and are handed to the runner explicitly.

mod case;
mod clock;
pub mod error;
mod metrics;
mod registry;
mod reporter;
mod runner;
mod stopwatch;

pub use case::{BenchmarkCase, CaseContext, CaseId, FnCase, Outcome};
pub use clock::{best_available, Clock, ManualClock, MonotonicClock, WallClock};
pub use error::{HarnessError, RegistryError, StopwatchError};
pub use metrics::{MetricEntry, MetricSink};
pub use registry::{BenchmarkRegistry, RegisteredCase};
pub use reporter::{format_line, format_seconds, Alignment, LineEnding, Reporter, DEFAULT_WIDTH};
pub use runner::{CaseReport, CaseStatus, RunSummary, Runner};
pub use stopwatch::Stopwatch;
