//! The default catalog of benchmark cases.
//!
//! Every case scales its base iteration count with the difficulty multiplier of the run. Cases
//! that depend on an external resource skip themselves if it is unavailable.

use crate::resources::{BenchResources, ResourceUnavailable};
use envbench_harness::{BenchmarkRegistry, CaseContext, Outcome, RegistryError};

mod compute;
mod db;
mod filesystem;
mod random;

/// The registry type of envbench.
pub type BenchRegistry = BenchmarkRegistry<BenchResources>;

/// The context handed to the cases of envbench.
pub type BenchContext<'run> = CaseContext<'run, BenchResources>;

/// Creates the registry with all cases in report order: `core`, `io`, `rand`, `db`.
pub fn default_registry() -> Result<BenchRegistry, RegistryError> {
    let mut registry = BenchRegistry::new();
    compute::register(&mut registry)?;
    filesystem::register(&mut registry)?;
    random::register(&mut registry)?;
    db::register(&mut registry)?;
    Ok(registry)
}

/// Logs why a case is skipped and returns [Outcome::Skipped].
fn skip(unavailable: &ResourceUnavailable) -> Outcome {
    tracing::debug!(%unavailable, "Skipping benchmark case");
    Outcome::Skipped
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DatabaseSettings, RunConfiguration};
    use envbench_harness::{CaseStatus, Reporter, RunSummary, Runner};

    pub(super) fn run_cases(
        registry: &BenchRegistry,
        multiplier: f64,
        resources: &BenchResources,
    ) -> RunSummary {
        let mut reporter = Reporter::new(Vec::new(), 55);
        Runner::new(registry, multiplier)
            .run(resources, &mut reporter)
            .unwrap()
    }

    fn memory_database() -> BenchResources {
        BenchResources::acquire(&RunConfiguration {
            database: Some(DatabaseSettings::sqlite(":memory:", "_envbench_test_catalog")),
            ..RunConfiguration::default()
        })
    }

    #[test]
    fn catalog_order() {
        let registry = default_registry().unwrap();
        assert_eq!(
            registry.categories().collect::<Vec<_>>(),
            vec!["core", "io", "rand", "db"]
        );
        assert_eq!(
            registry.iter().next().map(|c| c.id().to_string()),
            Some("core::math".to_owned())
        );
    }

    #[test]
    fn every_case_succeeds_with_a_small_multiplier() {
        let registry = default_registry().unwrap();
        // Large enough for at least two iterations of the `io` cases.
        let summary = run_cases(&registry, 0.003, &memory_database());

        assert_eq!(summary.cases.len(), registry.len());
        for case in &summary.cases {
            if case.id.name().starts_with("aes_") {
                // SQLite has no AES functions.
                assert_eq!(case.status, CaseStatus::Skipped, "{}", case.id);
                continue;
            }
            assert!(
                matches!(case.status, CaseStatus::Succeeded(_)),
                "{} finished with {:?}",
                case.id,
                case.status
            );
        }
    }

    #[test]
    fn zero_multiplier_runs_every_case() {
        let registry = default_registry().unwrap();
        let summary = run_cases(&registry, 0.0, &memory_database());
        assert!(summary
            .cases
            .iter()
            .all(|case| !matches!(case.status, CaseStatus::Failed(_))));
    }

    #[test]
    fn database_cases_are_skipped_without_database() {
        let registry = default_registry().unwrap();
        let summary = run_cases(&registry, 0.001, &BenchResources::default());

        for case in &summary.cases {
            if case.id.category() == "db" {
                assert_eq!(case.status, CaseStatus::Skipped, "{}", case.id);
            } else {
                assert_ne!(case.status, CaseStatus::Skipped, "{}", case.id);
            }
        }
        assert!(summary.metrics.is_empty());
    }
}
