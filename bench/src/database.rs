//! The scratch database of the `db` cases.
//!
//! Two backends are supported: an embedded SQLite database and a MySQL server. Both are driven
//! with the same SQL where possible. Identifiers are quoted with backticks, which SQLite accepts
//! as well, and parameters are bound positionally with `?`. The remaining differences live in
//! [Dialect].

use crate::config::{BackendSettings, DatabaseSettings, MySqlSettings};
use mysql::prelude::{FromValue, Queryable};
use rusqlite::types::{FromSql, ToSqlOutput};
use rusqlite::ToSql;
use std::cell::RefCell;
use std::fmt::{Debug, Formatter};
use std::hint::black_box;
use std::time::Duration;

/// The number of rows inserted into the scratch table before the run.
pub const SEED_ROW_COUNT: usize = 1000;

const MYSQL_CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// An error raised by a database backend.
#[derive(Debug, thiserror::Error)]
pub enum QueryError {
    /// Raised by SQLite.
    #[error(transparent)]
    Sqlite(#[from] rusqlite::Error),
    /// Raised by MySQL.
    #[error(transparent)]
    MySql(#[from] mysql::Error),
}

/// An error raised while preparing the scratch database.
#[derive(Debug, thiserror::Error)]
pub enum DatabaseError {
    /// No MySQL user has been configured.
    #[error("Missing MySQL user, set mysql_user")]
    MissingUser,
    /// The database could not be opened.
    #[error("Cannot open database '{location}': {source}")]
    Open {
        /// Where the database lives.
        location: String,
        /// The cause.
        source: QueryError,
    },
    /// The scratch table could not be created or filled.
    #[error("Cannot prepare table '{table}': {source}")]
    Setup {
        /// The scratch table.
        table: String,
        /// The cause.
        source: QueryError,
    },
}

/// A value bound to a `?` placeholder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SqlValue {
    /// An integer.
    Int(i64),
    /// A string.
    Text(String),
    /// A byte string.
    Bytes(Vec<u8>),
}

impl ToSql for SqlValue {
    fn to_sql(&self) -> rusqlite::Result<ToSqlOutput<'_>> {
        Ok(match self {
            SqlValue::Int(value) => ToSqlOutput::from(*value),
            SqlValue::Text(value) => ToSqlOutput::from(value.as_str()),
            SqlValue::Bytes(value) => ToSqlOutput::from(value.as_slice()),
        })
    }
}

impl From<&SqlValue> for mysql::Value {
    fn from(value: &SqlValue) -> Self {
        match value {
            SqlValue::Int(value) => mysql::Value::Int(*value),
            SqlValue::Text(value) => mysql::Value::Bytes(value.clone().into_bytes()),
            SqlValue::Bytes(value) => mysql::Value::Bytes(value.clone()),
        }
    }
}

fn mysql_params(params: &[SqlValue]) -> mysql::Params {
    if params.is_empty() {
        mysql::Params::Empty
    } else {
        mysql::Params::Positional(params.iter().map(mysql::Value::from).collect())
    }
}

/// The SQL differences between the backends.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    /// SQLite.
    Sqlite,
    /// MySQL.
    MySql,
}

impl Dialect {
    /// Returns the display name of the backend.
    pub fn name(self) -> &'static str {
        match self {
            Dialect::Sqlite => "SQLite",
            Dialect::MySql => "MySQL",
        }
    }

    /// Returns the query that selects the server version.
    pub fn version_query(self) -> &'static str {
        match self {
            Dialect::Sqlite => "SELECT sqlite_version()",
            Dialect::MySql => "SELECT VERSION()",
        }
    }

    /// Returns the query that extracts `$.name` from the JSON document bound to `?`.
    pub fn json_name_query(self) -> &'static str {
        match self {
            Dialect::Sqlite => "SELECT json_extract(?, '$.name')",
            Dialect::MySql => "SELECT JSON_UNQUOTE(JSON_EXTRACT(?, '$.name'))",
        }
    }

    /// Returns whether the backend has `AES_ENCRYPT` and `AES_DECRYPT`.
    pub fn supports_aes(self) -> bool {
        self == Dialect::MySql
    }

    fn create_table(self, table: &str) -> String {
        match self {
            Dialect::Sqlite => format!(
                "CREATE TABLE IF NOT EXISTS `{table}` \
                 (id INTEGER PRIMARY KEY AUTOINCREMENT, name TEXT)"
            ),
            Dialect::MySql => format!(
                "CREATE TABLE IF NOT EXISTS `{table}` \
                 (id INT PRIMARY KEY AUTO_INCREMENT, name VARCHAR(255))"
            ),
        }
    }

    fn drop_index(self, index: &str, table: &str) -> String {
        match self {
            Dialect::Sqlite => format!("DROP INDEX IF EXISTS `{index}`"),
            Dialect::MySql => format!("DROP INDEX `{index}` ON `{table}`"),
        }
    }
}

enum Connection {
    Sqlite(rusqlite::Connection),
    MySql(RefCell<mysql::Conn>),
}

/// A database with a scratch table that is dropped again when this value is dropped.
pub struct ScratchDatabase {
    /// The open connection.
    connection: Connection,
    /// Where the database lives, for the report.
    location: String,
    /// The version of the database server.
    version: String,
    /// The scratch table.
    table: String,
}

impl ScratchDatabase {
    /// Opens the database, creates the scratch table and inserts [SEED_ROW_COUNT] rows.
    pub fn open(settings: &DatabaseSettings) -> Result<Self, DatabaseError> {
        let database = match &settings.backend {
            BackendSettings::Sqlite { path } => Self::open_sqlite(path, &settings.table)?,
            BackendSettings::MySql(mysql) => Self::open_mysql(mysql, &settings.table)?,
        };
        database.prepare().map_err(|source| DatabaseError::Setup {
            table: settings.table.clone(),
            source,
        })?;

        tracing::debug!(
            location = %database.location,
            table = %database.table,
            "Scratch database ready"
        );
        Ok(database)
    }

    fn open_sqlite(path: &str, table: &str) -> Result<Self, DatabaseError> {
        let connection = rusqlite::Connection::open(path).map_err(|source| DatabaseError::Open {
            location: path.to_owned(),
            source: source.into(),
        })?;
        Ok(Self {
            connection: Connection::Sqlite(connection),
            location: path.to_owned(),
            version: rusqlite::version().to_owned(),
            table: table.to_owned(),
        })
    }

    fn open_mysql(settings: &MySqlSettings, table: &str) -> Result<Self, DatabaseError> {
        let user = settings.user.as_deref().ok_or(DatabaseError::MissingUser)?;
        let location = match &settings.socket {
            Some(socket) => format!("{user}@{socket}/{}", settings.database),
            None => format!(
                "{user}@{}:{}/{}",
                settings.host, settings.port, settings.database
            ),
        };
        let open_error = |source: mysql::Error| DatabaseError::Open {
            location: location.clone(),
            source: source.into(),
        };

        let opts = mysql::OptsBuilder::new()
            .ip_or_hostname(Some(settings.host.as_str()))
            .tcp_port(settings.port)
            .socket(settings.socket.as_deref())
            .user(Some(user))
            .pass(settings.password.as_deref())
            .tcp_connect_timeout(Some(MYSQL_CONNECT_TIMEOUT));
        let mut connection = mysql::Conn::new(opts).map_err(open_error)?;
        connection
            .query_drop(format!(
                "CREATE DATABASE IF NOT EXISTS `{}`",
                settings.database
            ))
            .map_err(open_error)?;
        connection
            .query_drop(format!("USE `{}`", settings.database))
            .map_err(open_error)?;

        let (major, minor, patch) = connection.server_version();
        Ok(Self {
            connection: Connection::MySql(RefCell::new(connection)),
            location,
            version: format!("{major}.{minor}.{patch}"),
            table: table.to_owned(),
        })
    }

    fn prepare(&self) -> Result<(), QueryError> {
        self.execute(&self.dialect().create_table(&self.table), &[])?;
        let insert = format!("INSERT INTO `{}` (name) VALUES (?)", self.table);
        self.execute_in_transaction(
            &insert,
            (0..SEED_ROW_COUNT).map(|i| vec![SqlValue::Text(format!("test{i}"))]),
        )
    }

    /// Returns the SQL dialect of the backend.
    pub fn dialect(&self) -> Dialect {
        match self.connection {
            Connection::Sqlite(_) => Dialect::Sqlite,
            Connection::MySql(_) => Dialect::MySql,
        }
    }

    /// Returns the version of the database server.
    pub fn version(&self) -> &str {
        &self.version
    }

    /// Returns where the database lives: a file, or `user@host:port/database`.
    pub fn location(&self) -> &str {
        &self.location
    }

    /// Returns the name of the scratch table.
    pub fn table(&self) -> &str {
        &self.table
    }

    /// Returns the name of the scratch table, quoted for use in SQL.
    ///
    /// Table names are validated to be identifiers when the configuration is resolved.
    pub fn quoted_table(&self) -> String {
        format!("`{}`", self.table)
    }

    /// Checks that the server is alive.
    pub fn ping(&self) -> Result<(), QueryError> {
        match &self.connection {
            Connection::Sqlite(connection) => {
                connection.query_row("SELECT 1", [], |_| Ok(()))?;
            }
            Connection::MySql(connection) => connection.borrow_mut().query_drop("SELECT 1")?,
        }
        Ok(())
    }

    /// Executes a statement.
    pub fn execute(&self, sql: &str, params: &[SqlValue]) -> Result<(), QueryError> {
        match &self.connection {
            Connection::Sqlite(connection) => {
                connection
                    .prepare_cached(sql)?
                    .execute(rusqlite::params_from_iter(params))?;
            }
            Connection::MySql(connection) => {
                connection
                    .borrow_mut()
                    .exec_drop(sql, mysql_params(params))?;
            }
        }
        Ok(())
    }

    /// Executes `sql` once per parameter set of `rows`, all in one transaction.
    pub fn execute_in_transaction<I>(&self, sql: &str, rows: I) -> Result<(), QueryError>
    where
        I: IntoIterator<Item = Vec<SqlValue>>,
    {
        match &self.connection {
            Connection::Sqlite(connection) => {
                let tx = connection.unchecked_transaction()?;
                {
                    let mut statement = tx.prepare_cached(sql)?;
                    for params in rows {
                        statement.execute(rusqlite::params_from_iter(&params))?;
                    }
                }
                tx.commit()?;
            }
            Connection::MySql(connection) => {
                let mut connection = connection.borrow_mut();
                let mut tx = connection.start_transaction(mysql::TxOpts::default())?;
                for params in rows {
                    tx.exec_drop(sql, mysql_params(&params))?;
                }
                tx.commit()?;
            }
        }
        Ok(())
    }

    /// Runs a query that returns a single value. Returns [None] for no row or `NULL`.
    pub fn query_scalar<T>(&self, sql: &str, params: &[SqlValue]) -> Result<Option<T>, QueryError>
    where
        T: FromSql + FromValue,
    {
        match &self.connection {
            Connection::Sqlite(connection) => {
                let mut statement = connection.prepare_cached(sql)?;
                let mut rows = statement.query(rusqlite::params_from_iter(params))?;
                match rows.next()? {
                    Some(row) => Ok(row.get::<_, Option<T>>(0)?),
                    None => Ok(None),
                }
            }
            Connection::MySql(connection) => Ok(connection
                .borrow_mut()
                .exec_first::<Option<T>, _, _>(sql, mysql_params(params))?
                .flatten()),
        }
    }

    /// Fetches all `(id, name)` rows of a query at once.
    pub fn fetch_rows(&self, sql: &str) -> Result<Vec<(i64, Option<String>)>, QueryError> {
        match &self.connection {
            Connection::Sqlite(connection) => {
                let mut statement = connection.prepare_cached(sql)?;
                let rows = statement
                    .query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?
                    .collect::<Result<Vec<_>, _>>()?;
                Ok(rows)
            }
            Connection::MySql(connection) => {
                Ok(connection.borrow_mut().query::<(i64, Option<String>), _>(sql)?)
            }
        }
    }

    /// Walks the rows of a query one by one, reading the second column of each, and returns the
    /// number of rows.
    pub fn scan_rows(&self, sql: &str) -> Result<u64, QueryError> {
        let mut count = 0;
        match &self.connection {
            Connection::Sqlite(connection) => {
                let mut statement = connection.prepare_cached(sql)?;
                let mut rows = statement.query([])?;
                while let Some(row) = rows.next()? {
                    black_box(row.get_ref(1)?);
                    count += 1;
                }
            }
            Connection::MySql(connection) => {
                let mut connection = connection.borrow_mut();
                for row in connection.query_iter(sql)? {
                    black_box(row?.get::<Option<String>, _>(1));
                    count += 1;
                }
            }
        }
        Ok(count)
    }

    /// Creates an index on `column` of the scratch table that is dropped with the guard.
    pub fn create_index(&self, name: &str, column: &str) -> Result<TemporaryIndex<'_>, QueryError> {
        self.execute(
            &format!(
                "CREATE INDEX `{name}` ON {} (`{column}`)",
                self.quoted_table()
            ),
            &[],
        )?;
        Ok(TemporaryIndex {
            database: self,
            name: name.to_owned(),
        })
    }
}

impl Debug for ScratchDatabase {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ScratchDatabase")
            .field("dialect", &self.dialect())
            .field("location", &self.location)
            .field("table", &self.table)
            .finish_non_exhaustive()
    }
}

impl Drop for ScratchDatabase {
    fn drop(&mut self) {
        let result = self.execute(&format!("DROP TABLE IF EXISTS {}", self.quoted_table()), &[]);
        match result {
            Ok(()) => tracing::debug!(table = %self.table, "Scratch table dropped"),
            Err(error) => {
                tracing::warn!(table = %self.table, %error, "Cannot drop scratch table");
            }
        }
    }
}

/// An index that exists as long as the guard lives.
#[derive(Debug)]
pub struct TemporaryIndex<'db> {
    database: &'db ScratchDatabase,
    name: String,
}

impl TemporaryIndex<'_> {
    /// Returns the name of the index.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Drop for TemporaryIndex<'_> {
    fn drop(&mut self) {
        let sql = self
            .database
            .dialect()
            .drop_index(&self.name, self.database.table());
        if let Err(error) = self.database.execute(&sql, &[]) {
            tracing::warn!(index = %self.name, %error, "Cannot drop temporary index");
        }
    }
}
