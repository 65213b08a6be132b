use envbench::config::{collect_settings, ConfigError, EnvVars, RunConfiguration, Surface};
use envbench::environment::{EnvironmentInfo, UNSUPPORTED_TOOLCHAIN_MESSAGE};
use envbench::{run_benchmark, write_cgi_error};
use std::io::{self, Write};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// The environment variable that configures the log filter.
const LOG_FILTER_VAR: &str = "ENVBENCH_LOG";

fn main() -> ExitCode {
    init_tracing();

    let vars = std::env::vars_os()
        .filter_map(|(key, value)| Some((key.into_string().ok()?, value.into_string().ok()?)))
        .collect::<EnvVars>();
    let surface = Surface::detect(&vars);
    let args = std::env::args_os()
        .skip(1)
        .filter_map(|arg| arg.into_string().ok());

    let config = match resolve_config(surface, args, &vars) {
        Ok(config) => config,
        Err(error) => return report_config_error(surface, &error),
    };

    let environment = EnvironmentInfo::detect(surface, &vars);
    if !environment.meets_version_floor() {
        tracing::error!(toolchain = ?environment.rust_toolchain, "Unsupported toolchain");
        let mut stdout = io::stdout().lock();
        let _ = writeln!(stdout, "{UNSUPPORTED_TOOLCHAIN_MESSAGE}");
        return ExitCode::FAILURE;
    }

    match run_benchmark(io::stdout().lock(), surface, &config, &environment) {
        Ok(_) => ExitCode::SUCCESS,
        Err(error) => {
            tracing::error!("Benchmark run aborted: {error:#}");
            ExitCode::FAILURE
        }
    }
}

fn resolve_config(
    surface: Surface,
    args: impl IntoIterator<Item = String>,
    vars: &EnvVars,
) -> Result<RunConfiguration, ConfigError> {
    collect_settings(surface, args, vars)?.resolve()
}

/// Logs to stderr so that the report on stdout stays intact.
fn init_tracing() {
    let filter =
        EnvFilter::try_from_env(LOG_FILTER_VAR).unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();

    std::panic::set_hook(Box::new(|info| {
        tracing::error!("{info}");
    }));
}

/// Prints a configuration error and returns the exit code of the process.
///
/// Help and version requests end up here as well and exit successfully.
fn report_config_error(surface: Surface, error: &ConfigError) -> ExitCode {
    match (surface, error) {
        (Surface::Cli, ConfigError::Invalid(error)) => {
            let _ = error.print();
            ExitCode::from(u8::try_from(error.exit_code()).unwrap_or(1))
        }
        (Surface::Cli, error) => {
            tracing::error!("{error}");
            let _ = writeln!(io::stderr().lock(), "error: {error}");
            ExitCode::FAILURE
        }
        (Surface::Cgi, error) => {
            tracing::error!("{error}");
            let _ = write_cgi_error(io::stdout().lock(), error);
            ExitCode::FAILURE
        }
    }
}
