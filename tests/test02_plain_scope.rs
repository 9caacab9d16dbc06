#![cfg(feature = "test-utils")]

mod common;

use common::{TestResult, unreachable_config, with_embedded};
use pgscope::{PgDriver, PgScopeError, Row, RowMode, RowValues};

#[test]
fn plain_scope_inserts_in_order() -> TestResult {
    with_embedded("plain_scope", |pg| {
        let driver = pg.driver(RowMode::Mapping)?;

        let rows = driver.with_connection(|conn| {
            conn.execute(
                "CREATE TABLE IF NOT EXISTS t (id serial primary key, name text)",
                &[],
            )?;
            assert_eq!(
                conn.execute("INSERT INTO t (name) VALUES ($1)", &["alice".into()])?,
                1
            );
            assert_eq!(
                conn.execute("INSERT INTO t (name) VALUES ($1)", &["bob".into()])?,
                1
            );
            conn.fetch_all("SELECT id, name FROM t ORDER BY id", &[])
        })?;

        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].get("id"), Some(&RowValues::Int(1)));
        assert_eq!(rows[0].get("name"), Some(&RowValues::Text("alice".into())));
        assert_eq!(rows[1].get("id"), Some(&RowValues::Int(2)));
        assert_eq!(rows[1].get("name"), Some(&RowValues::Text("bob".into())));

        // autocommit: a second, independent scope sees both rows
        let count = driver.with_connection(|conn| {
            conn.fetch_one("SELECT count(*) AS n FROM t", &[])
        })?;
        assert_eq!(count.and_then(|r| r.get("n").cloned()), Some(RowValues::Int(2)));
        Ok(())
    })
}

#[test]
fn row_shape_follows_row_mode() -> TestResult {
    with_embedded("row_shape", |pg| {
        let mapping = pg
            .driver(RowMode::Mapping)?
            .with_connection(|conn| conn.fetch_one("SELECT 1 AS ok", &[]))?
            .expect("one row");
        let mapped = mapping.as_mapping().expect("mapping row");
        assert_eq!(mapped.len(), 1);
        assert_eq!(mapped.column_names(), ["ok"]);
        assert_eq!(mapped.get("ok"), Some(&RowValues::Int(1)));

        let tuple = pg
            .driver(RowMode::Tuple)?
            .with_connection(|conn| conn.fetch_one("SELECT 1 AS ok", &[]))?;
        assert_eq!(tuple, Some(Row::Tuple(vec![RowValues::Int(1)])));
        Ok(())
    })
}

#[test]
fn empty_results_use_none_and_empty_vec() -> TestResult {
    with_embedded("empty_results", |pg| {
        let driver = pg.driver(RowMode::Mapping)?;
        driver.with_connection(|conn| {
            conn.execute_batch("CREATE TABLE empty_t (id int); CREATE TABLE other_t (id int);")?;
            assert_eq!(conn.fetch_one("SELECT id FROM empty_t", &[])?, None);
            assert!(conn.fetch_all("SELECT id FROM empty_t", &[])?.is_empty());
            assert_eq!(conn.execute("UPDATE empty_t SET id = 1", &[])?, 0);
            Ok::<_, PgScopeError>(())
        })?;
        Ok(())
    })
}

#[test]
fn values_round_trip_through_native_types() -> TestResult {
    with_embedded("value_types", |pg| {
        let driver = pg.driver(RowMode::Tuple)?;
        let row = driver.with_connection(|conn| {
            conn.fetch_one(
                "SELECT $1::int2, $2::float8, $3::bool, $4::date, $5::jsonb, $6::bytea, NULL::text",
                &[
                    RowValues::Int(7),
                    RowValues::Float(1.5),
                    RowValues::Bool(true),
                    RowValues::Date(chrono::NaiveDate::from_ymd_opt(2024, 5, 1).expect("valid date")),
                    RowValues::JSON(serde_json::json!({"a": 1})),
                    RowValues::Blob(vec![0, 1, 2]),
                ],
            )
        })?;
        let values = row.expect("one row").into_values();
        assert_eq!(values[0], RowValues::Int(7));
        assert_eq!(values[1], RowValues::Float(1.5));
        assert_eq!(values[2], RowValues::Bool(true));
        assert_eq!(
            values[3],
            RowValues::Date(chrono::NaiveDate::from_ymd_opt(2024, 5, 1).expect("valid date"))
        );
        assert_eq!(values[4], RowValues::JSON(serde_json::json!({"a": 1})));
        assert_eq!(values[5], RowValues::Blob(vec![0, 1, 2]));
        assert_eq!(values[6], RowValues::Null);
        Ok(())
    })
}

#[test]
fn engine_errors_are_query_errors() -> TestResult {
    with_embedded("query_errors", |pg| {
        let driver = pg.driver(RowMode::Mapping)?;
        let err = driver
            .with_connection(|conn| conn.execute("SELEC 1", &[]))
            .expect_err("syntax error");
        assert!(err.is_query());
        assert_eq!(err.code(), Some("42601"));

        let err = driver
            .with_connection(|conn| {
                conn.execute("CREATE TABLE uniq (id int primary key)", &[])?;
                conn.execute("INSERT INTO uniq VALUES ($1)", &[RowValues::Int(1)])?;
                conn.execute("INSERT INTO uniq VALUES ($1)", &[RowValues::Int(1)])
            })
            .expect_err("duplicate key");
        assert!(err.is_query());
        assert_eq!(err.code(), Some("23505"));
        assert!(err.to_string().contains("duplicate key"));
        Ok(())
    })
}

#[test]
fn plain_scope_connect_failure_is_connection_error() -> TestResult {
    let driver = PgDriver::new(unreachable_config()?);
    let mut called = false;
    let err = driver
        .with_connection(|_conn| {
            called = true;
            Ok::<_, PgScopeError>(())
        })
        .expect_err("nothing listens on port 1");
    assert!(err.is_connection());
    assert!(!called);
    Ok(())
}
