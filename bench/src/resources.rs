use crate::config::RunConfiguration;
use crate::database::{DatabaseError, ScratchDatabase};
use rand::rngs::OsRng;
use rand::TryRngCore;
use std::path::PathBuf;
use tempfile::TempDir;

/// An external resource that a benchmark case needs is missing.
///
/// Cases report this as a skip, it never fails a case.
#[derive(Debug, thiserror::Error)]
#[error("{resource} is unavailable: {reason}")]
pub struct ResourceUnavailable {
    /// The missing resource.
    pub resource: &'static str,
    /// Why it is missing.
    pub reason: String,
}

impl ResourceUnavailable {
    fn new(resource: &'static str, reason: impl ToString) -> Self {
        Self {
            resource,
            reason: reason.to_string(),
        }
    }
}

/// The external resources shared by the benchmark cases of a run.
///
/// Acquired once before the run and released once after the report has been written.
#[derive(Debug, Default)]
pub struct BenchResources {
    /// The scratch database, if configured and set up successfully.
    database: Option<ScratchDatabase>,
    /// Why the configured database could not be set up.
    database_error: Option<DatabaseError>,
    /// Where scratch directories are created. Defaults to the system temp directory.
    scratch_root: Option<PathBuf>,
}

impl BenchResources {
    /// Acquires the resources described by `config`.
    ///
    /// A database that cannot be set up is not an error, the `db` cases are skipped instead.
    pub fn acquire(config: &RunConfiguration) -> Self {
        let mut resources = Self::default();
        if let Some(settings) = &config.database {
            match ScratchDatabase::open(settings) {
                Ok(database) => resources.database = Some(database),
                Err(error) => {
                    tracing::warn!(%error, "Database disabled");
                    resources.database_error = Some(error);
                }
            }
        }
        resources
    }

    /// Creates scratch directories below `root` instead of the system temp directory.
    #[must_use]
    pub fn with_scratch_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.scratch_root = Some(root.into());
        self
    }

    /// Returns the scratch database.
    pub fn database(&self) -> Result<&ScratchDatabase, ResourceUnavailable> {
        match (&self.database, &self.database_error) {
            (Some(database), _) => Ok(database),
            (None, Some(error)) => Err(ResourceUnavailable::new("database", error)),
            (None, None) => Err(ResourceUnavailable::new("database", "not configured")),
        }
    }

    /// Returns why the configured database could not be set up.
    pub fn database_error(&self) -> Option<&DatabaseError> {
        self.database_error.as_ref()
    }

    /// Creates a new empty directory that is removed when the returned value is dropped.
    pub fn scratch_dir(&self) -> Result<TempDir, ResourceUnavailable> {
        let mut builder = tempfile::Builder::new();
        builder.prefix("envbench-");
        let dir = match &self.scratch_root {
            Some(root) => builder.tempdir_in(root),
            None => builder.tempdir(),
        };
        dir.map_err(|e| ResourceUnavailable::new("scratch directory", e))
    }

    /// Returns the random number generator of the operating system after checking that it works.
    pub fn secure_random(&self) -> Result<OsRng, ResourceUnavailable> {
        let mut rng = OsRng;
        rng.try_next_u64()
            .map_err(|e| ResourceUnavailable::new("OS random source", e))?;
        Ok(rng)
    }

    /// Tears down all resources.
    pub fn release(self) {
        drop(self);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseSettings;

    #[test]
    fn unconfigured_database_is_unavailable() {
        let resources = BenchResources::acquire(&RunConfiguration::default());
        let error = resources.database().unwrap_err();
        assert_eq!(error.to_string(), "database is unavailable: not configured");
        assert!(resources.database_error().is_none());
    }

    #[test]
    fn failed_database_is_unavailable_with_reason() {
        let dir = tempfile::tempdir().unwrap();
        let config = RunConfiguration {
            database: Some(DatabaseSettings::sqlite(
                dir.path().join("missing/bench.db").to_string_lossy(),
                "t",
            )),
            ..RunConfiguration::default()
        };

        let resources = BenchResources::acquire(&config);
        assert!(resources.database_error().is_some());
        assert!(resources
            .database()
            .unwrap_err()
            .reason
            .starts_with("Cannot"));
    }

    #[test]
    fn in_memory_database_is_available() {
        let config = RunConfiguration {
            database: Some(DatabaseSettings::sqlite(":memory:", "t")),
            ..RunConfiguration::default()
        };
        let resources = BenchResources::acquire(&config);
        assert_eq!(resources.database().unwrap().table(), "t");
    }

    #[test]
    fn scratch_dirs_are_removed_on_drop() {
        let root = tempfile::tempdir().unwrap();
        let resources = BenchResources::default().with_scratch_root(root.path());

        let scratch = resources.scratch_dir().unwrap();
        let path = scratch.path().to_path_buf();
        assert!(path.starts_with(root.path()));
        drop(scratch);
        assert!(!path.exists());
    }

    #[test]
    fn missing_scratch_root_is_unavailable() {
        let root = tempfile::tempdir().unwrap();
        let resources = BenchResources::default().with_scratch_root(root.path().join("missing"));
        assert_eq!(resources.scratch_dir().unwrap_err().resource, "scratch directory");
    }
}
