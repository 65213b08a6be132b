use crate::case::CaseId;
use std::fmt::Display;

/// An auxiliary measurement emitted by a benchmark case.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MetricEntry {
    /// The case that was running when the metric was recorded.
    pub case: CaseId,
    /// The rendered value, e.g. `1234 q/s`.
    pub value: String,
}

/// Collects [MetricEntry]s while the benchmark cases run.
///
/// The sink knows which case is currently running and attributes every recorded metric to it.
/// Entries are kept in emission order.
#[derive(Debug, Default)]
pub struct MetricSink {
    /// The case that is currently running.
    current: Option<CaseId>,
    /// The recorded metrics.
    entries: Vec<MetricEntry>,
}

impl MetricSink {
    /// Creates a new empty [MetricSink].
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks `case` as the running case.
    pub fn begin_case(&mut self, case: CaseId) {
        self.current = Some(case);
    }

    /// Clears the running case.
    pub fn end_case(&mut self) {
        self.current = None;
    }

    /// Records `value` with the given `unit` for the running case.
    ///
    /// Metrics recorded while no case is running are dropped.
    pub fn record(&mut self, unit: &str, value: impl Display) {
        let Some(case) = self.current.clone() else {
            tracing::warn!(unit, "Metric recorded outside of a benchmark case, ignoring it");
            return;
        };

        self.entries.push(MetricEntry {
            case,
            value: format!("{value} {unit}"),
        });
    }

    /// Returns all recorded metrics in emission order.
    ///
    /// Reading the entries does not clear them.
    pub fn entries(&self) -> &[MetricEntry] {
        &self.entries
    }

    /// Returns whether no metric has been recorded.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Consumes the sink and returns the recorded metrics.
    pub fn into_entries(self) -> Vec<MetricEntry> {
        self.entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn metrics_are_attributed_to_the_running_case() {
        let mut sink = MetricSink::new();
        sink.begin_case(CaseId::new("db", "select"));
        sink.record("q/s", 1200);
        sink.record("rows", 3);
        sink.begin_case(CaseId::new("db", "insert"));
        sink.record("t/s", 17);
        sink.end_case();

        let rendered = sink
            .entries()
            .iter()
            .map(|e| format!("{} {}", e.case, e.value))
            .collect::<Vec<_>>();
        assert_eq!(
            rendered,
            vec!["db::select 1200 q/s", "db::select 3 rows", "db::insert 17 t/s"]
        );
    }

    #[test]
    fn same_name_in_different_categories_stays_apart() {
        let mut sink = MetricSink::new();
        sink.begin_case(CaseId::new("io", "read"));
        sink.record("op/s", 1);
        sink.begin_case(CaseId::new("db", "read"));
        sink.record("op/s", 2);

        let entries = sink.entries();
        assert_ne!(entries[0].case, entries[1].case);
    }

    #[test]
    fn metrics_outside_a_case_are_dropped() {
        let mut sink = MetricSink::new();
        sink.record("q/s", 10);
        assert!(sink.is_empty());
    }

    #[test]
    fn reading_entries_does_not_clear_them() {
        let mut sink = MetricSink::new();
        sink.begin_case(CaseId::new("core", "math"));
        sink.record("op/s", 5);
        assert_eq!(sink.entries().len(), 1);
        assert_eq!(sink.entries().len(), 1);
        assert_eq!(sink.into_entries().len(), 1);
    }
}
