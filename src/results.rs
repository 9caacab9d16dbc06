pub mod row;

pub use row::{Columns, MappedRow, Row};
