use crate::config::RunConfiguration;
use crate::database::Dialect;
use crate::environment::EnvironmentInfo;
use crate::resources::BenchResources;
use envbench_harness::{Reporter, RunSummary};
use std::io::{self, Write};

/// The banner at the top of the report.
pub const BANNER: &str = "ENVBENCH - Rust environment benchmark";

const CREDITS: [&str; 3] = [
    "Thanks for using envbench",
    "Scores are only comparable on the same build profile",
    "Run with --help to list all settings",
];

/// Writes the environment and configuration block that precedes the case lines.
pub fn write_header<W: Write>(
    reporter: &mut Reporter<W>,
    environment: &EnvironmentInfo,
    config: &RunConfiguration,
    resources: &BenchResources,
) -> io::Result<()> {
    reporter.separator()?;
    reporter.banner(BANNER)?;
    reporter.separator()?;

    reporter.key_value("Report generated at", &environment.generated_at)?;
    reporter.key_value("Tool version", environment.tool_version)?;

    reporter.title("Rust Info")?;
    reporter.key_value(
        "Rust toolchain",
        environment.rust_toolchain.as_deref().unwrap_or("unknown"),
    )?;
    reporter.key_value("Platform", &environment.platform)?;
    reporter.key_value("Server", &environment.server)?;
    reporter.key_value("Max memory usage", &environment.max_memory)?;
    reporter.key_value("Build profile", environment.build_profile)?;
    reporter.key_value(
        "Debug assertions",
        enabled_or_disabled(environment.debug_assertions),
    )?;
    reporter.key_value("Target features", &environment.target_features)?;
    reporter.key_value("Regex engine", "enabled")?;

    reporter.title("Tool config")?;
    reporter.key_value("Difficulty multiplier", &format!("{}x", config.multiplier))?;
    if let Some(error) = resources.database_error() {
        reporter.key_value("Database error", &error.to_string())?;
    }
    match resources.database() {
        Ok(database) => {
            let dialect = database.dialect();
            reporter.key_value(
                "Database",
                &format!("enabled {} v{}", dialect.name(), database.version()),
            )?;
            let location_label = match dialect {
                Dialect::Sqlite => "Database file",
                Dialect::MySql => "Database server",
            };
            reporter.key_value(location_label, database.location())?;
            reporter.key_value("Scratch table", database.table())?;
        }
        Err(_) => reporter.key_value("Database", "disabled")?,
    }
    reporter.separator()
}

/// Writes the totals and the credits that follow the case lines.
pub fn write_footer<W: Write>(
    reporter: &mut Reporter<W>,
    summary: &RunSummary,
    peak_memory_mib: Option<f64>,
) -> io::Result<()> {
    reporter.totals(summary.total, peak_memory_mib)?;
    reporter.separator()?;
    for line in CREDITS {
        reporter.banner(line)?;
    }
    Ok(())
}

fn enabled_or_disabled(enabled: bool) -> &'static str {
    if enabled {
        "enabled"
    } else {
        "disabled"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BackendSettings, DatabaseSettings, MySqlSettings};
    use envbench_harness::{format_line, Alignment};
    use std::time::Duration;

    fn fixed_environment() -> EnvironmentInfo {
        EnvironmentInfo {
            generated_at: "01/Jan/2025 12:00:00 +00:00".to_owned(),
            tool_version: "0.1.0",
            rust_toolchain: Some("rustc 1.80.0".to_owned()),
            platform: "linux x86_64".to_owned(),
            server: "bench-host".to_owned(),
            max_memory: "unlimited".to_owned(),
            build_profile: "release",
            debug_assertions: false,
            target_features: "sse2".to_owned(),
        }
    }

    fn render(config: &RunConfiguration, resources: &BenchResources) -> String {
        let mut reporter = Reporter::new(Vec::new(), 55);
        write_header(&mut reporter, &fixed_environment(), config, resources).unwrap();
        String::from_utf8(reporter.into_inner()).unwrap()
    }

    #[test]
    fn header_without_database() {
        let config = RunConfiguration::default();
        let output = render(&config, &BenchResources::acquire(&config));

        let output = output.lines().map(str::trim_end).collect::<Vec<_>>().join("\n");
        insta::assert_snapshot!(output, @r"
        -------------------------------------------------------
                 ENVBENCH - Rust environment benchmark
        -------------------------------------------------------
        Report generated at........ 01/Jan/2025 12:00:00 +00:00
        Tool version..................................... 0.1.0
        ---------------------- Rust Info ----------------------
        Rust toolchain............................ rustc 1.80.0
        Platform.................................. linux x86_64
        Server...................................... bench-host
        Max memory usage............................. unlimited
        Build profile.................................. release
        Debug assertions.............................. disabled
        Target features................................... sse2
        Regex engine................................... enabled
        --------------------- Tool config ---------------------
        Difficulty multiplier............................... 1x
        Database...................................... disabled
        -------------------------------------------------------
        ");
    }

    #[test]
    fn header_with_database() {
        let config = RunConfiguration {
            multiplier: 0.5,
            database: Some(DatabaseSettings::sqlite(":memory:", "scratch")),
            ..RunConfiguration::default()
        };
        let output = render(&config, &BenchResources::acquire(&config));

        let database = format!("enabled SQLite v{}", rusqlite::version());
        for expected in [
            format_line("Difficulty multiplier", "0.5x", '.', Alignment::Left, 55),
            format_line("Database", &database, '.', Alignment::Left, 55),
            format_line("Database file", ":memory:", '.', Alignment::Left, 55),
            format_line("Scratch table", "scratch", '.', Alignment::Left, 55),
        ] {
            assert!(output.contains(&expected), "missing line {expected:?}");
        }
        assert!(!output.contains("Database error"));
    }

    #[test]
    fn header_shows_database_errors() {
        let dir = tempfile::tempdir().unwrap();
        let config = RunConfiguration {
            database: Some(DatabaseSettings::sqlite(
                dir.path().join("missing/bench.db").to_string_lossy(),
                "scratch",
            )),
            ..RunConfiguration::default()
        };
        let output = render(&config, &BenchResources::acquire(&config));

        assert!(output.contains("Database error"));
        assert!(output.contains(" Cannot "));
        assert!(output.contains(&format_line(
            "Database",
            "disabled",
            '.',
            Alignment::Left,
            55
        )));
    }

    #[test]
    fn header_shows_mysql_errors() {
        let config = RunConfiguration {
            database: Some(DatabaseSettings {
                backend: BackendSettings::MySql(MySqlSettings {
                    host: "127.0.0.1".to_owned(),
                    port: 3306,
                    user: None,
                    password: None,
                    database: "envbench".to_owned(),
                    socket: None,
                }),
                table: "scratch".to_owned(),
            }),
            ..RunConfiguration::default()
        };
        let output = render(&config, &BenchResources::acquire(&config));

        assert!(output.contains(&format_line(
            "Database error",
            "Missing MySQL user, set mysql_user",
            '.',
            Alignment::Left,
            55
        )));
        assert!(!output.contains("Database server"));
    }

    #[test]
    fn footer_lists_totals_and_credits() {
        let summary = RunSummary {
            cases: Vec::new(),
            metrics: Vec::new(),
            total: Duration::from_millis(1500),
        };
        let mut reporter = Reporter::new(Vec::new(), 55);
        write_footer(&mut reporter, &summary, Some(3.0)).unwrap();
        let output = String::from_utf8(reporter.into_inner()).unwrap();

        let lines = output.lines().collect::<Vec<_>>();
        assert_eq!(lines.len(), 7);
        assert!(lines[1].ends_with(" 1.5000 s"));
        assert!(lines[2].ends_with(" 3.00 MiB"));
        assert_eq!(lines[4].trim(), "Thanks for using envbench");
    }
}
