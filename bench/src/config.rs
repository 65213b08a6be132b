use clap::{Arg, CommandFactory, Parser};
use rand::distr::Alphanumeric;
use rand::Rng;
use std::collections::BTreeMap;
use std::fmt::{Debug, Formatter};

/// The environment variables of the process.
pub type EnvVars = BTreeMap<String, String>;

/// The prefix of environment variables that carry a SQLite connection string.
pub const SQLITE_CONNECTION_PREFIX: &str = "SQLITECONNSTR_";

/// The prefix of environment variables that carry a MySQL connection string.
pub const MYSQL_CONNECTION_PREFIX: &str = "MYSQLCONNSTR_";

/// The MySQL host used when only credentials are configured.
pub const DEFAULT_MYSQL_HOST: &str = "127.0.0.1";

/// Keys that clap generates itself and that are therefore not part of [CliArgs].
const META_KEYS: [&str; 2] = ["help", "version"];

/// The keys that select the MySQL backend.
const MYSQL_KEYS: [&str; 4] = ["mysql_host", "mysql_user", "mysql_password", "mysql_socket"];

/// An error that prevents a run from starting.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A setting has an invalid value (or help was requested).
    #[error(transparent)]
    Invalid(#[from] clap::Error),
    /// A connection string variable could not be interpreted.
    #[error("Connection string in '{variable}' has no 'Data Source'")]
    InvalidConnectionString {
        /// The name of the environment variable.
        variable: String,
    },
}

/// The recognized settings of envbench.
///
/// Settings are always passed as `--key=value`. Unknown keys are ignored before they reach clap.
#[derive(Parser, Debug, Clone)]
#[command(about, version, name = "envbench", args_override_self = true)]
pub struct CliArgs {
    /// Scales the iteration count of every benchmark case.
    #[arg(long = "multiplier", default_value_t = 1.0, value_parser = parse_multiplier)]
    pub multiplier: f64,
    /// The width of a report line.
    #[arg(
        long = "output_width",
        default_value_t = 55,
        value_parser = clap::value_parser!(u16).range(1..)
    )]
    pub output_width: u16,
    /// The SQLite database used by the `db` cases (`:memory:` for an in-memory database).
    #[arg(long = "db_path", conflicts_with_all = MYSQL_KEYS)]
    pub db_path: Option<String>,
    /// The scratch table created for the `db` cases.
    #[arg(long = "db_table", visible_alias = "mysql_table", value_parser = parse_identifier)]
    pub db_table: Option<String>,
    /// The MySQL server used by the `db` cases [default: 127.0.0.1].
    #[arg(long = "mysql_host")]
    pub mysql_host: Option<String>,
    /// The TCP port of the MySQL server.
    #[arg(long = "mysql_port", default_value_t = 3306)]
    pub mysql_port: u16,
    /// The MySQL user.
    #[arg(long = "mysql_user")]
    pub mysql_user: Option<String>,
    /// The password of the MySQL user.
    #[arg(long = "mysql_password")]
    pub mysql_password: Option<String>,
    /// The MySQL database that holds the scratch table. Created if missing.
    #[arg(long = "mysql_database", default_value = "envbench", value_parser = parse_identifier)]
    pub mysql_database: String,
    /// A Unix socket of the MySQL server, used instead of host and port.
    #[arg(long = "mysql_socket")]
    pub mysql_socket: Option<String>,
}

fn parse_multiplier(value: &str) -> Result<f64, String> {
    let multiplier = value
        .trim()
        .parse::<f64>()
        .map_err(|e| format!("'{value}' is not a number: {e}"))?;
    if !multiplier.is_finite() || multiplier < 0.0 {
        return Err(format!("'{value}' is not a finite, non-negative number"));
    }
    Ok(multiplier)
}

fn parse_identifier(value: &str) -> Result<String, String> {
    let mut chars = value.chars();
    let valid_start = chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_');
    if !valid_start || !chars.all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(format!(
            "'{value}' must consist of ASCII letters, digits and underscores"
        ));
    }
    Ok(value.to_owned())
}

/// The way envbench has been invoked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Surface {
    /// From a terminal, settings are command line flags.
    Cli,
    /// As a CGI script, settings are query parameters.
    Cgi,
}

impl Surface {
    /// Detects the surface from the environment.
    pub fn detect(vars: &EnvVars) -> Self {
        if vars.contains_key("GATEWAY_INTERFACE") {
            Surface::Cgi
        } else {
            Surface::Cli
        }
    }
}

/// Unvalidated settings in the order of their precedence (later entries win).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawSettings {
    entries: Vec<(String, Option<String>)>,
}

impl RawSettings {
    /// Creates an empty [RawSettings].
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a setting.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.push((key.into(), Some(value.into())));
    }

    /// Collects the `--key=value` and `--key` tokens of `args`. Other tokens are ignored.
    pub fn from_args<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let entries = args
            .into_iter()
            .filter_map(|arg| {
                let setting = arg.as_ref().strip_prefix("--")?;
                Some(match setting.split_once('=') {
                    Some((key, value)) => (key.to_owned(), Some(value.to_owned())),
                    None => (setting.to_owned(), None),
                })
            })
            .collect();
        Self { entries }
    }

    /// Collects the parameters of a URL query string.
    pub fn from_query_string(query: &str) -> Self {
        let entries = url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes())
            .map(|(key, value)| (key.into_owned(), Some(value.into_owned())))
            .collect();
        Self { entries }
    }

    /// Collects the database settings from `SQLITECONNSTR_*` and `MYSQLCONNSTR_*` variables.
    ///
    /// A SQLite connection string looks like `Data Source=/var/lib/bench.db;Table=bench`, a MySQL
    /// one like `Data Source=db.local:3306;Database=bench;User Id=bench;Password=secret`.
    pub fn from_connection_strings(vars: &EnvVars) -> Result<Self, ConfigError> {
        let mut settings = Self::new();
        for (variable, value) in vars {
            let is_mysql = if variable.starts_with(SQLITE_CONNECTION_PREFIX) {
                false
            } else if variable.starts_with(MYSQL_CONNECTION_PREFIX) {
                true
            } else {
                continue;
            };

            let parts = value
                .split(';')
                .filter_map(|part| part.split_once('='))
                .map(|(key, value)| (key.trim().to_ascii_lowercase(), value.trim()))
                .collect::<BTreeMap<_, _>>();
            let Some(data_source) = parts.get("data source").filter(|s| !s.is_empty()) else {
                return Err(ConfigError::InvalidConnectionString {
                    variable: variable.clone(),
                });
            };

            if is_mysql {
                match data_source.rsplit_once(':') {
                    Some((host, port)) if port.parse::<u16>().is_ok() => {
                        settings.set("mysql_host", host);
                        settings.set("mysql_port", port);
                    }
                    _ => settings.set("mysql_host", *data_source),
                }
                for (key, setting) in [
                    ("database", "mysql_database"),
                    ("user id", "mysql_user"),
                    ("password", "mysql_password"),
                ] {
                    if let Some(value) = parts.get(key) {
                        settings.set(setting, *value);
                    }
                }
            } else {
                settings.set("db_path", *data_source);
            }
            if let Some(table) = parts.get("table") {
                settings.set("db_table", *table);
            }
        }
        Ok(settings)
    }

    /// Appends `other`, its settings take precedence.
    pub fn merge(&mut self, other: RawSettings) {
        self.entries.extend(other.entries);
    }

    /// Returns the recognized settings as command line tokens. Unknown keys are dropped.
    pub fn to_tokens(&self) -> Vec<String> {
        let command = CliArgs::command();
        let known = command
            .get_arguments()
            .filter_map(Arg::get_long_and_visible_aliases)
            .flatten()
            .chain(META_KEYS)
            .collect::<Vec<_>>();

        self.entries
            .iter()
            .filter(|(key, _)| {
                let recognized = known.contains(&key.as_str());
                if !recognized {
                    tracing::debug!(key = key.as_str(), "Ignoring unknown setting");
                }
                recognized
            })
            .map(|(key, value)| match value {
                Some(value) => format!("--{key}={value}"),
                None => format!("--{key}"),
            })
            .collect()
    }

    /// Validates the settings.
    pub fn resolve(&self) -> Result<RunConfiguration, ConfigError> {
        let tokens = std::iter::once("envbench".to_owned()).chain(self.to_tokens());
        let args = CliArgs::try_parse_from(tokens)?;
        Ok(RunConfiguration::from(args))
    }
}

/// Collects the settings of the given `surface`, merged over the connection string variables.
pub fn collect_settings<I, S>(
    surface: Surface,
    args: I,
    vars: &EnvVars,
) -> Result<RawSettings, ConfigError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut settings = RawSettings::from_connection_strings(vars)?;
    let explicit = match surface {
        Surface::Cli => RawSettings::from_args(args),
        Surface::Cgi => vars
            .get("QUERY_STRING")
            .map(|query| RawSettings::from_query_string(query))
            .unwrap_or_default(),
    };
    settings.merge(explicit);
    Ok(settings)
}

/// How to reach a MySQL server.
#[derive(Clone, PartialEq, Eq)]
pub struct MySqlSettings {
    /// The host name or address.
    pub host: String,
    /// The TCP port.
    pub port: u16,
    /// The user. Connecting fails without one.
    pub user: Option<String>,
    /// The password of the user.
    pub password: Option<String>,
    /// The database that holds the scratch table.
    pub database: String,
    /// A Unix socket that replaces host and port.
    pub socket: Option<String>,
}

impl Debug for MySqlSettings {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MySqlSettings")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("database", &self.database)
            .field("socket", &self.socket)
            .finish()
    }
}

/// The database server of the `db` cases.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendSettings {
    /// A SQLite database file, or `:memory:`.
    Sqlite {
        /// The database file.
        path: String,
    },
    /// A MySQL server.
    MySql(MySqlSettings),
}

/// Where the `db` cases work.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatabaseSettings {
    /// The database server.
    pub backend: BackendSettings,
    /// The scratch table.
    pub table: String,
}

impl DatabaseSettings {
    /// Settings for a SQLite database at `path`.
    pub fn sqlite(path: impl Into<String>, table: impl Into<String>) -> Self {
        Self {
            backend: BackendSettings::Sqlite { path: path.into() },
            table: table.into(),
        }
    }
}

/// The validated, immutable configuration of a run.
#[derive(Debug, Clone, PartialEq)]
pub struct RunConfiguration {
    /// Scales the iteration count of every benchmark case.
    pub multiplier: f64,
    /// The width of a report line.
    pub output_width: usize,
    /// The database of the `db` cases. [None] disables them.
    pub database: Option<DatabaseSettings>,
}

impl Default for RunConfiguration {
    fn default() -> Self {
        Self {
            multiplier: 1.0,
            output_width: envbench_harness::DEFAULT_WIDTH,
            database: None,
        }
    }
}

impl From<CliArgs> for RunConfiguration {
    fn from(args: CliArgs) -> Self {
        let uses_mysql = args.mysql_host.is_some()
            || args.mysql_user.is_some()
            || args.mysql_password.is_some()
            || args.mysql_socket.is_some();
        let backend = match args.db_path {
            Some(path) => Some(BackendSettings::Sqlite { path }),
            None if uses_mysql => Some(BackendSettings::MySql(MySqlSettings {
                host: args
                    .mysql_host
                    .unwrap_or_else(|| DEFAULT_MYSQL_HOST.to_owned()),
                port: args.mysql_port,
                user: args.mysql_user,
                password: args.mysql_password,
                database: args.mysql_database,
                socket: args.mysql_socket,
            })),
            None => None,
        };

        let table = args.db_table.unwrap_or_else(default_table_name);
        Self {
            multiplier: args.multiplier,
            output_width: usize::from(args.output_width),
            database: backend.map(|backend| DatabaseSettings { backend, table }),
        }
    }
}

/// Returns `_envbench_test_` followed by six random alphanumeric characters.
pub fn default_table_name() -> String {
    let suffix = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect::<String>();
    format!("_envbench_test_{suffix}")
}
