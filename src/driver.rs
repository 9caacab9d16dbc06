use std::sync::Arc;

use tracing::{debug, warn};

use crate::config::ConnectionConfig;
use crate::connection::{Autocommit, InTx, PgConnection};
use crate::error::PgScopeError;
use crate::schema::TableSpec;
use crate::types::RowValues;

/// Entry point holding one [`ConnectionConfig`].
///
/// Every scope opens its own connection and closes it on exit; nothing is
/// pooled or shared, so a driver can be cloned into other threads freely.
#[derive(Debug, Clone)]
pub struct PgDriver {
    config: Arc<ConnectionConfig>,
}

impl PgDriver {
    #[must_use]
    pub fn new(config: ConnectionConfig) -> Self {
        Self {
            config: Arc::new(config),
        }
    }

    #[must_use]
    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Liveness probe: connect, run `SELECT 1`, report success.
    ///
    /// Never fails; the reason for a `false` is logged at debug level.
    pub fn ping(&self) -> bool {
        match self.with_connection(|conn| conn.fetch_one("SELECT 1", &[])) {
            Ok(_) => true,
            Err(err) => {
                debug!(host = self.config.host(), "postgres ping failed: {err}");
                false
            }
        }
    }

    /// Open an autocommit connection guard.
    ///
    /// # Errors
    /// Returns `PgScopeError::ConnectionError` if the connection cannot be established.
    pub fn connect(&self) -> Result<PgConnection<Autocommit>, PgScopeError> {
        PgConnection::open(&self.config)
    }

    /// Open a connection and start a transaction on it.
    ///
    /// Dropping the returned handle without calling `commit` rolls back.
    ///
    /// # Errors
    /// Returns `PgScopeError::ConnectionError` if the connection cannot be established,
    /// or the error raised by `BEGIN`.
    pub fn begin(&self) -> Result<PgConnection<InTx>, PgScopeError> {
        self.connect()?.begin()
    }

    /// Run `body` on a fresh autocommit connection, closing it afterwards on every path.
    ///
    /// # Errors
    /// Returns the body's error, or a `ConnectionError` (converted into `E`) if the
    /// connection cannot be opened, in which case `body` is never called.
    pub fn with_connection<T, E, F>(&self, body: F) -> Result<T, E>
    where
        F: FnOnce(&mut PgConnection<Autocommit>) -> Result<T, E>,
        E: From<PgScopeError>,
    {
        let mut conn = self.connect()?;
        body(&mut conn)
    }

    /// Run `body` inside a transaction.
    ///
    /// Commits when `body` returns `Ok`; rolls back and hands back the body's
    /// error unchanged when it returns `Err`. A failing rollback is logged and
    /// discarded. The connection is closed on every path.
    ///
    /// ```rust,no_run
    /// use pgscope::{ConnectionConfig, PgDriver, PgScopeError, RowValues};
    ///
    /// let driver = PgDriver::new(ConnectionConfig::from_env("PG_")?);
    /// let inserted = driver.transaction(|tx| {
    ///     tx.execute("INSERT INTO t (name) VALUES ($1)", &[RowValues::from("alice")])
    /// })?;
    /// assert_eq!(inserted, 1);
    /// # Ok::<(), PgScopeError>(())
    /// ```
    ///
    /// # Errors
    /// Returns a `ConnectionError` (converted into `E`) if the connection cannot be
    /// opened (`body` is never called), the body's own error, or the commit error.
    pub fn transaction<T, E, F>(&self, body: F) -> Result<T, E>
    where
        F: FnOnce(&mut PgConnection<InTx>) -> Result<T, E>,
        E: From<PgScopeError>,
    {
        let mut tx = self.begin()?;
        match body(&mut tx) {
            Ok(value) => {
                tx.commit()?;
                Ok(value)
            }
            Err(err) => {
                if let Err(rollback_err) = tx.rollback() {
                    warn!("postgres rollback after failed scope body failed: {rollback_err}");
                }
                Err(err)
            }
        }
    }

    /// Run a single DDL statement in its own autocommit scope.
    ///
    /// # Errors
    /// Returns `PgScopeError` if connecting or executing fails.
    pub fn create_table(&self, ddl: &str) -> Result<(), PgScopeError> {
        self.create_tables(&[ddl])
    }

    /// Run several DDL statements, in order, on one autocommit connection.
    ///
    /// # Errors
    /// Returns the first `PgScopeError` raised; earlier statements stay applied.
    pub fn create_tables<S: AsRef<str>>(&self, ddls: &[S]) -> Result<(), PgScopeError> {
        self.with_connection(|conn| {
            for ddl in ddls {
                conn.execute(ddl.as_ref(), &[])?;
            }
            Ok(())
        })
    }

    /// Whether `table` (optionally schema-qualified) resolves to a relation.
    ///
    /// # Errors
    /// Returns `PgScopeError` if connecting or querying fails.
    pub fn table_exists(&self, table: &str) -> Result<bool, PgScopeError> {
        let row = self.with_connection(|conn| {
            conn.fetch_one(
                "SELECT to_regclass($1) IS NOT NULL AS exists",
                &[RowValues::Text(table.to_string())],
            )
        })?;
        Ok(row
            .and_then(|r| r.get_by_index(0).and_then(RowValues::as_bool).copied())
            .unwrap_or(false))
    }

    /// Create every table in `specs` that does not exist yet; existing ones are left untouched.
    ///
    /// Returns the names of the tables that were created.
    ///
    /// # Errors
    /// Returns `PgScopeError` if a lookup or a `CREATE TABLE` fails.
    pub fn ensure_tables(&self, specs: &[TableSpec]) -> Result<Vec<String>, PgScopeError> {
        let mut missing = Vec::new();
        for spec in specs {
            if !self.table_exists(spec.name())? {
                missing.push(spec);
            }
        }
        if missing.is_empty() {
            return Ok(Vec::new());
        }

        let ddls: Vec<String> = missing.iter().map(|spec| spec.create_table_ddl()).collect();
        self.create_tables(&ddls)?;
        Ok(missing.iter().map(|spec| spec.name().to_string()).collect())
    }
}
