use postgresql_embedded::blocking::PostgreSQL;

use crate::config::{ConnectionConfig, RowMode};
use crate::driver::PgDriver;

/// Represents a running embedded `PostgreSQL` instance.
pub struct EmbeddedPostgres {
    pub postgresql: PostgreSQL,
    pub port: u16,
    /// Working configuration pointing at the test database.
    pub config: ConnectionConfig,
}

impl EmbeddedPostgres {
    /// Driver for the test database with the requested row shape.
    ///
    /// # Errors
    /// Returns an error if the stored configuration no longer validates.
    pub fn driver(&self, row_mode: RowMode) -> Result<PgDriver, crate::PgScopeError> {
        let config = ConnectionConfig::builder()
            .host(self.config.host())
            .port(self.config.port())
            .dbname(self.config.dbname())
            .user(self.config.user())
            .password(self.config.password())
            .connect_timeout(self.config.connect_timeout())
            .row_mode(row_mode)
            .build()?;
        Ok(PgDriver::new(config))
    }
}

/// Set up an embedded `PostgreSQL` instance and create `db_name` in it.
///
/// # Errors
/// Returns an error if the embedded server cannot be set up or started, if the
/// database cannot be created, or if the post-start ping fails.
pub fn setup_postgres_embedded(
    db_name: &str,
) -> Result<EmbeddedPostgres, Box<dyn std::error::Error>> {
    let mut postgresql = PostgreSQL::default();

    // Setup PostgreSQL binaries (bundled, so no download conflicts)
    postgresql.setup()?;
    postgresql.start()?;
    postgresql.create_database(db_name)?;

    let settings = postgresql.settings();
    let port = settings.port;
    let config = ConnectionConfig::builder()
        .host(settings.host.clone())
        .port(port)
        .dbname(db_name)
        .user(settings.username.clone())
        .password(settings.password.clone())
        .build()?;

    if !PgDriver::new(config.clone()).ping() {
        return Err(format!("embedded postgres on port {port} did not answer a ping").into());
    }
    tracing::info!(port, db_name, "embedded postgres started");

    Ok(EmbeddedPostgres {
        postgresql,
        port,
        config,
    })
}

/// Stop a previously started embedded `PostgreSQL` instance.
pub fn stop_postgres_embedded(postgres: EmbeddedPostgres) {
    let EmbeddedPostgres { postgresql, .. } = postgres;
    let _ = postgresql.stop();
}
