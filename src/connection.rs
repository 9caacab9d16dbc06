use std::marker::PhantomData;

use postgres::{Client, NoTls};
use tracing::{debug, warn};

use crate::config::{ConnectionConfig, RowMode};
use crate::error::PgScopeError;
use crate::params::Params;
use crate::query::build_rows;
use crate::results::Row;
use crate::tls::make_connector;
use crate::types::RowValues;

/// Marker types for typestate
pub enum Autocommit {}
pub enum InTx {}

/// One live connection, closed when the handle is dropped.
///
/// `PgConnection<Autocommit>` applies every statement on its own;
/// `PgConnection<InTx>` runs inside an explicit `BEGIN` and rolls back on drop
/// unless [`PgConnection::commit`] was called.
pub struct PgConnection<State> {
    client: Option<Client>,
    row_mode: RowMode,
    /// True when a transaction is in-flight and needs rollback if dropped.
    needs_rollback: bool,
    _state: PhantomData<State>,
}

impl<State> std::fmt::Debug for PgConnection<State> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PgConnection")
            .field("open", &self.client.is_some())
            .field("row_mode", &self.row_mode)
            .field("needs_rollback", &self.needs_rollback)
            .finish()
    }
}

/// Establish a client for `config`, honouring its SSL mode and connect timeout.
pub(crate) fn open_client(config: &ConnectionConfig) -> Result<Client, PgScopeError> {
    debug!(
        host = config.host(),
        port = config.port(),
        dbname = config.dbname(),
        user = config.user(),
        ssl_mode = ?config.ssl_mode(),
        "postgres connect start"
    );
    let pg_config = config.to_pg_config();
    let client = match make_connector(config.ssl_mode())? {
        Some(tls) => pg_config.connect(tls),
        None => pg_config.connect(NoTls),
    }
    .map_err(|e| PgScopeError::connect(&e))?;
    debug!("postgres connect established");
    Ok(client)
}

impl PgConnection<Autocommit> {
    /// Open a fresh autocommit connection.
    ///
    /// # Errors
    /// Returns `PgScopeError::ConnectionError` if the connection cannot be established.
    pub fn open(config: &ConnectionConfig) -> Result<Self, PgScopeError> {
        let client = open_client(config)?;
        Ok(Self::new(client, config.row_mode(), false))
    }

    /// Begin an explicit transaction on this connection.
    ///
    /// # Errors
    /// Returns `PgScopeError` if `BEGIN` fails; the connection is closed in that case.
    pub fn begin(mut self) -> Result<PgConnection<InTx>, PgScopeError> {
        let mut client = self.take_client()?;
        client
            .batch_execute("BEGIN")
            .map_err(|e| PgScopeError::from_statement(e, "begin"))?;
        debug!("postgres transaction started");
        Ok(PgConnection::new(client, self.row_mode, true))
    }

    /// Close the connection, reporting any error from the shutdown handshake.
    ///
    /// # Errors
    /// Returns `PgScopeError::ConnectionError` if the server could not be told goodbye cleanly.
    pub fn close(mut self) -> Result<(), PgScopeError> {
        let client = self.take_client()?;
        client
            .close()
            .map_err(|e| PgScopeError::ConnectionError(format!("postgres close error: {e}")))
    }
}

impl PgConnection<InTx> {
    /// Commit and return to autocommit.
    ///
    /// # Errors
    /// Returns `PgScopeError` if the commit fails; the handle is dropped, which
    /// attempts a rollback and closes the connection.
    pub fn commit(self) -> Result<PgConnection<Autocommit>, PgScopeError> {
        self.finish_tx("COMMIT", "commit")
    }

    /// Roll back and return to autocommit.
    ///
    /// # Errors
    /// Returns `PgScopeError` if the rollback fails.
    pub fn rollback(self) -> Result<PgConnection<Autocommit>, PgScopeError> {
        self.finish_tx("ROLLBACK", "rollback")
    }

    fn finish_tx(
        mut self,
        sql: &str,
        action: &str,
    ) -> Result<PgConnection<Autocommit>, PgScopeError> {
        let mut client = self.take_client()?;
        match client.batch_execute(sql) {
            Ok(()) => {
                self.needs_rollback = false;
                debug!("postgres transaction {action} done");
                Ok(PgConnection::new(client, self.row_mode, false))
            }
            Err(err) => {
                // keep needs_rollback so Drop issues a best-effort rollback
                self.client = Some(client);
                Err(PgScopeError::from_statement(err, action))
            }
        }
    }
}

impl<State> PgConnection<State> {
    fn new(client: Client, row_mode: RowMode, needs_rollback: bool) -> Self {
        Self {
            client: Some(client),
            row_mode,
            needs_rollback,
            _state: PhantomData,
        }
    }

    fn client_mut(&mut self) -> Result<&mut Client, PgScopeError> {
        self.client.as_mut().ok_or_else(|| {
            PgScopeError::ConnectionError("postgres connection already released".into())
        })
    }

    fn take_client(&mut self) -> Result<Client, PgScopeError> {
        self.client.take().ok_or_else(|| {
            PgScopeError::ConnectionError("postgres connection already released".into())
        })
    }

    #[must_use]
    pub fn row_mode(&self) -> RowMode {
        self.row_mode
    }

    /// Run a statement with positional parameters and return the affected row count.
    ///
    /// # Errors
    /// Returns `PgScopeError::QueryError` for engine-reported failures and
    /// `PgScopeError::ConnectionError` if the connection was lost.
    pub fn execute(&mut self, sql: &str, params: &[RowValues]) -> Result<usize, PgScopeError> {
        let params = Params::convert(params);
        let rows = self
            .client_mut()?
            .execute(sql, params.as_refs())
            .map_err(|e| PgScopeError::from_statement(e, "execute"))?;
        usize::try_from(rows)
            .map_err(|e| PgScopeError::query(format!("invalid rows affected count: {e}")))
    }

    /// Run a query and return its first row, or `None` when it matched nothing.
    ///
    /// # Errors
    /// Returns `PgScopeError` if execution or row decoding fails.
    pub fn fetch_one(
        &mut self,
        sql: &str,
        params: &[RowValues],
    ) -> Result<Option<Row>, PgScopeError> {
        let rows = self.query(sql, params)?;
        let first = rows.get(..1).unwrap_or_default();
        Ok(build_rows(first, self.row_mode)?.into_iter().next())
    }

    /// Run a query and return every row in result order; empty when nothing matched.
    ///
    /// # Errors
    /// Returns `PgScopeError` if execution or row decoding fails.
    pub fn fetch_all(&mut self, sql: &str, params: &[RowValues]) -> Result<Vec<Row>, PgScopeError> {
        let rows = self.query(sql, params)?;
        build_rows(&rows, self.row_mode)
    }

    /// Execute one or more `;`-separated statements without parameters.
    ///
    /// # Errors
    /// Returns `PgScopeError` if any statement fails.
    pub fn execute_batch(&mut self, sql: &str) -> Result<(), PgScopeError> {
        self.client_mut()?
            .batch_execute(sql)
            .map_err(|e| PgScopeError::from_statement(e, "batch"))
    }

    fn query(&mut self, sql: &str, params: &[RowValues]) -> Result<Vec<postgres::Row>, PgScopeError> {
        let params = Params::convert(params);
        self.client_mut()?
            .query(sql, params.as_refs())
            .map_err(|e| PgScopeError::from_statement(e, "select"))
    }
}

impl<State> Drop for PgConnection<State> {
    fn drop(&mut self) {
        let Some(mut client) = self.client.take() else {
            return;
        };
        if self.needs_rollback {
            match client.batch_execute("ROLLBACK") {
                Ok(()) => debug!("postgres transaction rolled back on drop"),
                Err(err) => warn!("postgres rollback on drop failed: {err}"),
            }
        }
        // dropping the client terminates the session
        drop(client);
    }
}
