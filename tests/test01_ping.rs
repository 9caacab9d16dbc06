#![cfg(feature = "test-utils")]

mod common;

use common::{TestResult, unreachable_config, with_embedded};
use pgscope::{ConnectionConfig, PgDriver, RowMode};

#[test]
fn ping_reports_reachable_server() -> TestResult {
    with_embedded("ping_ok", |pg| {
        assert!(pg.driver(RowMode::Mapping)?.ping());
        assert!(pg.driver(RowMode::Tuple)?.ping());
        Ok(())
    })
}

#[test]
fn ping_is_false_for_unreachable_host() -> TestResult {
    let driver = PgDriver::new(unreachable_config()?);
    assert!(!driver.ping());
    Ok(())
}

#[test]
fn ping_is_false_for_bad_credentials_and_missing_database() -> TestResult {
    with_embedded("ping_bad", |pg| {
        let base = &pg.config;

        let wrong_password = ConnectionConfig::builder()
            .host(base.host())
            .port(base.port())
            .dbname(base.dbname())
            .user(base.user())
            .password(format!("{}-wrong", base.password()))
            .build()?;
        assert!(!PgDriver::new(wrong_password).ping());

        let missing_db = ConnectionConfig::builder()
            .host(base.host())
            .port(base.port())
            .dbname("does_not_exist")
            .user(base.user())
            .password(base.password())
            .build()?;
        assert!(!PgDriver::new(missing_db).ping());
        Ok(())
    })
}
