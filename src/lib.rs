//! Minimal synchronous PostgreSQL access layer.
//!
//! A [`PgDriver`] holds one [`ConnectionConfig`] and opens a fresh connection
//! for every scope:
//!
//! ```rust,no_run
//! use pgscope::{ConnectionConfig, PgDriver, PgScopeError, RowValues};
//!
//! let driver = PgDriver::new(ConnectionConfig::from_env("PG_")?);
//!
//! driver.with_connection(|conn| {
//!     conn.execute("CREATE TABLE IF NOT EXISTS t (id serial primary key, name text)", &[])?;
//!     conn.execute("INSERT INTO t (name) VALUES ($1)", &[RowValues::from("alice")])?;
//!     Ok::<_, PgScopeError>(())
//! })?;
//!
//! let rows = driver.transaction(|tx| tx.fetch_all("SELECT id, name FROM t ORDER BY id", &[]))?;
//! # let _ = rows;
//! # Ok::<(), PgScopeError>(())
//! ```

pub mod config;
pub mod connection;
pub mod driver;
pub mod error;
pub mod params;
pub mod query;
pub mod results;
pub mod schema;
pub mod types;

mod tls;

#[cfg(feature = "test-utils")]
pub mod test_utils;

pub use config::{ConnectionConfig, ConnectionConfigBuilder, DEFAULT_ENV_PREFIX, RowMode, SslMode};
pub use connection::{Autocommit, InTx, PgConnection};
pub use driver::PgDriver;
pub use error::PgScopeError;
pub use results::{MappedRow, Row};
pub use types::RowValues;
