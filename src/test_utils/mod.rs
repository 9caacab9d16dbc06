//! Embedded PostgreSQL for integration tests.

pub mod embedded;

pub use embedded::*;
