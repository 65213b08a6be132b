use std::io;

/// An error that aborts a benchmark run.
///
/// Errors raised by individual benchmark cases never show up here. They are contained by the
/// [`Runner`](crate::Runner) and rendered as a report line.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// Writing the report to the output sink failed.
    #[error(transparent)]
    Io(#[from] io::Error),
    /// The stopwatch was used incorrectly.
    #[error(transparent)]
    Stopwatch(#[from] StopwatchError),
}

/// An error raised by a [`Stopwatch`](crate::Stopwatch).
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum StopwatchError {
    /// [`Stopwatch::stop`](crate::Stopwatch::stop) was called without a running lap.
    #[error("Stopwatch stopped without a preceding start")]
    NotStarted,
}

/// An error raised while building a [`BenchmarkRegistry`](crate::BenchmarkRegistry).
///
/// These are programming errors in the benchmark catalog and should fail fast at startup.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RegistryError {
    /// A case with the same category and name has already been registered.
    #[error("Benchmark case '{category}::{name}' is already registered")]
    DuplicateName {
        /// The category of the duplicate case.
        category: String,
        /// The name of the duplicate case.
        name: String,
    },
    /// The category or the case name is empty.
    #[error("Benchmark categories and case names must not be empty")]
    EmptyName,
}
