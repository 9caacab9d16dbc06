#![allow(dead_code)]

use pgscope::test_utils::{EmbeddedPostgres, setup_postgres_embedded, stop_postgres_embedded};
use pgscope::{ConnectionConfig, PgScopeError};

pub type TestResult = Result<(), Box<dyn std::error::Error>>;

/// Run `body` against a throwaway embedded server, stopping it afterwards.
pub fn with_embedded<F>(db_name: &str, body: F) -> TestResult
where
    F: FnOnce(&EmbeddedPostgres) -> TestResult,
{
    let pg = setup_postgres_embedded(db_name)?;
    let result = body(&pg);
    stop_postgres_embedded(pg);
    result
}

/// A configuration nothing listens on.
pub fn unreachable_config() -> Result<ConnectionConfig, PgScopeError> {
    ConnectionConfig::builder()
        .host("127.0.0.1")
        .port(1)
        .connect_timeout(2)
        .build()
}
