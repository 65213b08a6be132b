//! envbench measures how fast a host runs a fixed catalog of workloads and prints a scorecard
//! together with metadata about the environment.
//!
//! The binary resolves a [RunConfiguration](config::RunConfiguration) from the command line (or
//! from the query string when it is served as a CGI script) and hands it to [run_benchmark].

use crate::cases::default_registry;
use crate::config::{RunConfiguration, Surface};
use crate::environment::{peak_memory_mib, EnvironmentInfo};
use crate::report::{write_footer, write_header};
use crate::resources::BenchResources;
use anyhow::Context;
use envbench_harness::{LineEnding, Reporter, Runner};
use std::fmt::Display;
use std::io::Write;

pub mod cases;
pub mod config;
pub mod database;
pub mod environment;
pub mod report;
pub mod resources;

const CGI_HEADER: &str = "Content-Type: text/html; charset=utf-8\r\n\r\n";

/// Runs the whole catalog and writes the report to `out`.
///
/// Resources are acquired before the header is written and released after the footer. Failing
/// cases do not abort the run, only errors of the sink do.
pub fn run_benchmark<W: Write>(
    out: W,
    surface: Surface,
    config: &RunConfiguration,
    environment: &EnvironmentInfo,
) -> anyhow::Result<W> {
    let registry = default_registry().context("Invalid benchmark catalog")?;
    let resources = BenchResources::acquire(config);

    let mut reporter = Reporter::new(out, config.output_width);
    if surface == Surface::Cgi {
        reporter.raw(CGI_HEADER)?;
        reporter.raw("<pre>")?;
        reporter = reporter.with_line_ending(LineEnding::Html);
    }

    write_header(&mut reporter, environment, config, &resources)?;
    tracing::info!(
        cases = registry.len(),
        multiplier = config.multiplier,
        "Running benchmark"
    );
    let summary = Runner::new(&registry, config.multiplier).run(&resources, &mut reporter)?;
    write_footer(&mut reporter, &summary, peak_memory_mib())?;

    if surface == Surface::Cgi {
        reporter.raw("</pre>")?;
    }
    reporter.flush()?;
    resources.release();
    Ok(reporter.into_inner())
}

/// Writes a fatal startup `error` as a CGI response.
pub fn write_cgi_error(mut out: impl Write, error: impl Display) -> std::io::Result<()> {
    write!(out, "{CGI_HEADER}<pre>{error}</pre>")?;
    out.flush()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DatabaseSettings;

    fn fixed_environment() -> EnvironmentInfo {
        EnvironmentInfo {
            generated_at: "01/Jan/2025 12:00:00 +00:00".to_owned(),
            tool_version: "0.1.0",
            rust_toolchain: None,
            platform: "linux x86_64".to_owned(),
            server: "bench-host".to_owned(),
            max_memory: "unlimited".to_owned(),
            build_profile: "debug",
            debug_assertions: true,
            target_features: "baseline".to_owned(),
        }
    }

    fn run(surface: Surface, config: &RunConfiguration) -> String {
        let out = run_benchmark(Vec::new(), surface, config, &fixed_environment()).unwrap();
        String::from_utf8(out).unwrap()
    }

    fn zero_multiplier() -> RunConfiguration {
        RunConfiguration {
            multiplier: 0.0,
            ..RunConfiguration::default()
        }
    }

    #[test]
    fn report_has_one_line_per_case_in_order() {
        let output = run(Surface::Cli, &zero_multiplier());
        let registry = default_registry().unwrap();

        let case_lines = output
            .lines()
            .filter(|line| line.contains("::"))
            .collect::<Vec<_>>();
        assert_eq!(case_lines.len(), registry.len());
        for (line, case) in case_lines.iter().zip(registry.iter()) {
            assert!(line.starts_with(&case.id().to_string()), "{line}");
        }
        assert!(output.contains("Database...."));
        assert!(output.contains("Total time"));
        assert!(!output.contains("<br/>"));
    }

    #[test]
    fn database_cases_are_skipped_without_database() {
        let output = run(Surface::Cli, &zero_multiplier());
        let ping = output
            .lines()
            .find(|line| line.starts_with("db::ping"))
            .unwrap();
        assert!(ping.ends_with(" SKIPPED"), "{ping}");
        assert!(!output.contains(" Metrics "));
    }

    #[test]
    fn database_cases_report_metrics() {
        let config = RunConfiguration {
            multiplier: 0.001,
            database: Some(DatabaseSettings::sqlite(":memory:", "_envbench_test_lib")),
            ..RunConfiguration::default()
        };
        let output = run(Surface::Cli, &config);

        assert!(output.contains(" Metrics "));
        assert!(output.contains("db::select_version"));
        assert!(!output.contains("ERROR"), "{output}");
    }

    #[test]
    fn cgi_report_is_wrapped() {
        let output = run(Surface::Cgi, &zero_multiplier());

        assert!(output.starts_with("Content-Type: text/html"));
        assert!(output.contains("\r\n\r\n<pre>"));
        assert!(output.ends_with("</pre>"));
        assert!(output.contains("<br/>core::math"));
    }

    #[test]
    fn cgi_error() {
        let mut out = Vec::new();
        write_cgi_error(&mut out, "invalid value").unwrap();
        assert_eq!(
            String::from_utf8(out).unwrap(),
            "Content-Type: text/html; charset=utf-8\r\n\r\n<pre>invalid value</pre>"
        );
    }
}
