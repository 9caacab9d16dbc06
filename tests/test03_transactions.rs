#![cfg(feature = "test-utils")]

mod common;

use common::{TestResult, unreachable_config, with_embedded};
use pgscope::{PgDriver, PgScopeError, RowMode, RowValues};
use thiserror::Error;

#[derive(Debug, Error)]
enum AppError {
    #[error(transparent)]
    Db(#[from] PgScopeError),
    #[error("booking rejected: {0}")]
    Rejected(String),
}

fn count(driver: &PgDriver, table: &str) -> Result<i64, PgScopeError> {
    let row = driver.with_connection(|conn| {
        conn.fetch_one(&format!("SELECT count(*) AS n FROM {table}"), &[])
    })?;
    Ok(row
        .and_then(|r| r.get_by_index(0).and_then(RowValues::as_int).copied())
        .unwrap_or_default())
}

#[test]
fn committed_transaction_is_visible_to_later_scopes() -> TestResult {
    with_embedded("tx_commit", |pg| {
        let driver = pg.driver(RowMode::Mapping)?;
        driver.create_table("CREATE TABLE bookings (id serial primary key, guest text)")?;

        let id = driver.transaction(|tx| {
            tx.execute("INSERT INTO bookings (guest) VALUES ($1)", &["alice".into()])?;
            let row = tx.fetch_one(
                "INSERT INTO bookings (guest) VALUES ($1) RETURNING id",
                &["bob".into()],
            )?;
            Ok::<_, PgScopeError>(row.and_then(|r| r.get("id").cloned()))
        })?;

        assert_eq!(id, Some(RowValues::Int(2)));
        assert_eq!(count(&driver, "bookings")?, 2);
        Ok(())
    })
}

#[test]
fn failing_body_rolls_back_and_returns_its_error() -> TestResult {
    with_embedded("tx_rollback", |pg| {
        let driver = pg.driver(RowMode::Tuple)?;
        driver.create_table("CREATE TABLE bookings (id serial primary key, guest text)")?;

        let result: Result<(), AppError> = driver.transaction(|tx| {
            tx.execute("INSERT INTO bookings (guest) VALUES ($1)", &["alice".into()])?;
            tx.execute("INSERT INTO bookings (guest) VALUES ($1)", &["bob".into()])?;
            Err(AppError::Rejected("table taken".into()))
        });

        match result {
            Err(AppError::Rejected(reason)) => assert_eq!(reason, "table taken"),
            other => panic!("expected the body's own error, got {other:?}"),
        }
        assert_eq!(count(&driver, "bookings")?, 0);
        Ok(())
    })
}

#[test]
fn statement_error_in_body_rolls_back_earlier_statements() -> TestResult {
    with_embedded("tx_stmt_error", |pg| {
        let driver = pg.driver(RowMode::Mapping)?;
        driver.create_table("CREATE TABLE guests (id int primary key)")?;

        let err = driver
            .transaction(|tx| {
                tx.execute("INSERT INTO guests VALUES ($1)", &[RowValues::Int(1)])?;
                tx.execute("INSERT INTO guests VALUES ($1)", &[RowValues::Int(1)])
            })
            .expect_err("duplicate key");
        assert!(err.is_query());
        assert_eq!(count(&driver, "guests")?, 0);
        Ok(())
    })
}

#[test]
fn commit_failure_propagates() -> TestResult {
    with_embedded("tx_commit_fail", |pg| {
        let driver = pg.driver(RowMode::Mapping)?;
        driver.create_tables(&[
            "CREATE TABLE users (id int primary key)",
            "CREATE TABLE bookings (user_id int REFERENCES users(id) DEFERRABLE INITIALLY DEFERRED)",
        ])?;

        let err = driver
            .transaction(|tx| tx.execute("INSERT INTO bookings VALUES ($1)", &[RowValues::Int(42)]))
            .expect_err("deferred foreign key fails at commit");
        assert!(err.is_query());
        assert_eq!(err.code(), Some("23503"));
        assert_eq!(count(&driver, "bookings")?, 0);
        Ok(())
    })
}

#[test]
fn dropped_guard_rolls_back() -> TestResult {
    with_embedded("tx_guard", |pg| {
        let driver = pg.driver(RowMode::Mapping)?;
        driver.create_table("CREATE TABLE notes (body text)")?;

        {
            let mut tx = driver.begin()?;
            tx.execute("INSERT INTO notes VALUES ($1)", &["draft".into()])?;
        }
        assert_eq!(count(&driver, "notes")?, 0);

        let mut tx = driver.begin()?;
        tx.execute("INSERT INTO notes VALUES ($1)", &["final".into()])?;
        let conn = tx.commit()?;
        conn.close()?;
        assert_eq!(count(&driver, "notes")?, 1);
        Ok(())
    })
}

#[test]
fn connection_failure_never_runs_the_body() -> TestResult {
    let driver = PgDriver::new(unreachable_config()?);
    let mut called = false;
    let result: Result<(), AppError> = driver.transaction(|_tx| {
        called = true;
        Ok(())
    });
    match result {
        Err(AppError::Db(err)) => assert!(err.is_connection()),
        other => panic!("expected a connection error, got {other:?}"),
    }
    assert!(!called);
    Ok(())
}

#[test]
fn ensure_tables_creates_only_missing_tables() -> TestResult {
    use pgscope::schema::{ColumnType, OnDelete, TableSpec};

    with_embedded("ensure_tables", |pg| {
        let driver = pg.driver(RowMode::Mapping)?;
        let users = TableSpec::new("users")
            .column("id", ColumnType::Int)
            .required("email", ColumnType::Text)
            .column("created_at", ColumnType::TimestampTz);
        let bookings = TableSpec::new("bookings")
            .column("id", ColumnType::Int)
            .foreign_key("user_id", ColumnType::Int, "users", "id", OnDelete::Cascade);

        assert!(!driver.table_exists("users")?);
        let created = driver.ensure_tables(&[users.clone(), bookings.clone()])?;
        assert_eq!(created, ["users", "bookings"]);
        assert!(driver.table_exists("users")?);
        assert!(driver.table_exists("public.bookings")?);

        assert!(driver.ensure_tables(&[users, bookings])?.is_empty());

        let row = driver.transaction(|tx| {
            tx.fetch_one(
                "INSERT INTO users (email) VALUES ($1) RETURNING id, created_at",
                &["a@example.com".into()],
            )
        })?;
        let row = row.expect("inserted row");
        assert_eq!(row.get("id"), Some(&RowValues::Int(1)));
        assert!(matches!(row.get("created_at"), Some(RowValues::TimestampTz(_))));
        Ok(())
    })
}
