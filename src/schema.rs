//! `CREATE TABLE IF NOT EXISTS` rendering for application-declared tables.
//!
//! Names are emitted verbatim, so specs are meant to be written by the
//! application itself and never built from user input.

use std::fmt;

/// SQL type of a declared column.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ColumnType {
    Int,
    BigInt,
    Bool,
    Double,
    Text,
    Bytes,
    Timestamp,
    TimestampTz,
    Date,
    Time,
    Json,
}

impl ColumnType {
    #[must_use]
    pub fn sql(self) -> &'static str {
        match self {
            ColumnType::Int => "INT",
            ColumnType::BigInt => "BIGINT",
            ColumnType::Bool => "BOOLEAN",
            ColumnType::Double => "DOUBLE PRECISION",
            ColumnType::Text => "TEXT",
            ColumnType::Bytes => "BYTEA",
            ColumnType::Timestamp => "TIMESTAMP",
            ColumnType::TimestampTz => "TIMESTAMPTZ",
            ColumnType::Date => "DATE",
            ColumnType::Time => "TIME",
            ColumnType::Json => "JSONB",
        }
    }
}

/// Referential action for a foreign key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OnDelete {
    #[default]
    NoAction,
    Restrict,
    Cascade,
    SetNull,
    SetDefault,
}

impl fmt::Display for OnDelete {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            OnDelete::NoAction => "NO ACTION",
            OnDelete::Restrict => "RESTRICT",
            OnDelete::Cascade => "CASCADE",
            OnDelete::SetNull => "SET NULL",
            OnDelete::SetDefault => "SET DEFAULT",
        })
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ForeignKey {
    pub ref_table: String,
    pub ref_column: String,
    pub on_delete: OnDelete,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub ty: ColumnType,
    pub not_null: bool,
    pub references: Option<ForeignKey>,
}

impl ColumnSpec {
    fn render(&self) -> String {
        // `id` is always the surrogate key
        if self.name == "id" {
            return "id SERIAL PRIMARY KEY".to_string();
        }
        let mut sql = format!("{} {}", self.name, self.ty.sql());
        if self.not_null {
            sql.push_str(" NOT NULL");
        }
        if self.ty == ColumnType::TimestampTz
            && matches!(self.name.as_str(), "created_at" | "updated_at")
        {
            sql.push_str(" DEFAULT now()");
        }
        sql
    }
}

/// Declared shape of one table.
///
/// ```rust
/// use pgscope::schema::{ColumnType, OnDelete, TableSpec};
///
/// let bookings = TableSpec::new("bookings")
///     .column("id", ColumnType::Int)
///     .foreign_key("user_id", ColumnType::Int, "users", "id", OnDelete::Cascade)
///     .column("created_at", ColumnType::TimestampTz);
/// assert!(bookings.create_table_ddl().starts_with("CREATE TABLE IF NOT EXISTS bookings"));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSpec {
    name: String,
    columns: Vec<ColumnSpec>,
}

impl TableSpec {
    #[must_use]
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            columns: Vec::new(),
        }
    }

    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn columns(&self) -> &[ColumnSpec] {
        &self.columns
    }

    /// Add a nullable column.
    #[must_use]
    pub fn column(self, name: impl Into<String>, ty: ColumnType) -> Self {
        self.push(name.into(), ty, false, None)
    }

    #[must_use]
    pub fn required(self, name: impl Into<String>, ty: ColumnType) -> Self {
        self.push(name.into(), ty, true, None)
    }

    #[must_use]
    pub fn foreign_key(
        self,
        name: impl Into<String>,
        ty: ColumnType,
        ref_table: impl Into<String>,
        ref_column: impl Into<String>,
        on_delete: OnDelete,
    ) -> Self {
        let fk = ForeignKey {
            ref_table: ref_table.into(),
            ref_column: ref_column.into(),
            on_delete,
        };
        self.push(name.into(), ty, false, Some(fk))
    }

    fn push(
        mut self,
        name: String,
        ty: ColumnType,
        not_null: bool,
        references: Option<ForeignKey>,
    ) -> Self {
        self.columns.push(ColumnSpec {
            name,
            ty,
            not_null,
            references,
        });
        self
    }

    /// Render `CREATE TABLE IF NOT EXISTS`, columns first, then foreign keys.
    #[must_use]
    pub fn create_table_ddl(&self) -> String {
        let mut parts: Vec<String> = self.columns.iter().map(ColumnSpec::render).collect();
        parts.extend(self.columns.iter().filter_map(|col| {
            col.references.as_ref().map(|fk| {
                format!(
                    "FOREIGN KEY ({}) REFERENCES {}({}) ON DELETE {}",
                    col.name, fk.ref_table, fk.ref_column, fk.on_delete
                )
            })
        }));
        format!(
            "CREATE TABLE IF NOT EXISTS {} (\n  {}\n);",
            self.name,
            parts.join(",\n  ")
        )
    }
}
