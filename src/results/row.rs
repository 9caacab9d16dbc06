use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

use crate::config::RowMode;
use crate::types::RowValues;

/// Column names of one result, shared by every row built from it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Columns {
    names: Vec<String>,
    index: HashMap<String, usize>,
}

impl Columns {
    #[must_use]
    pub fn new(names: Vec<String>) -> Self {
        let mut index = HashMap::with_capacity(names.len());
        // last occurrence wins for duplicated column names
        for (i, name) in names.iter().enumerate() {
            index.insert(name.clone(), i);
        }
        Self { names, index }
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.index.get(name).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    /// Number of distinct names, i.e. keys of a serialised mapping row.
    #[must_use]
    pub fn distinct_len(&self) -> usize {
        self.index.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

/// A row keyed by column name, iterating in result column order.
#[derive(Debug, Clone, PartialEq)]
pub struct MappedRow {
    columns: Arc<Columns>,
    values: Vec<RowValues>,
}

impl MappedRow {
    #[must_use]
    pub fn new(columns: Arc<Columns>, values: Vec<RowValues>) -> Self {
        Self { columns, values }
    }

    /// Get a value from the row by column name
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&RowValues> {
        self.columns
            .position(column_name)
            .and_then(|idx| self.values.get(idx))
    }

    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&RowValues> {
        self.values.get(index)
    }

    #[must_use]
    pub fn column_names(&self) -> &[String] {
        self.columns.names()
    }

    /// `(column, value)` pairs in column order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &RowValues)> {
        self.columns
            .names()
            .iter()
            .map(String::as_str)
            .zip(self.values.iter())
    }

    #[must_use]
    pub fn values(&self) -> &[RowValues] {
        &self.values
    }

    #[must_use]
    pub fn into_values(self) -> Vec<RowValues> {
        self.values
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

impl Serialize for MappedRow {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // one key per distinct name, at its first position, holding the value `get` returns
        let mut map = serializer.serialize_map(Some(self.columns.distinct_len()))?;
        let mut emitted = HashSet::with_capacity(self.columns.distinct_len());
        for name in self.columns.names() {
            if emitted.insert(name.as_str())
                && let Some(value) = self.get(name)
            {
                map.serialize_entry(name, value)?;
            }
        }
        map.end()
    }
}

/// One fetched row, shaped by the driver's [`RowMode`].
#[derive(Debug, Clone, PartialEq)]
pub enum Row {
    Mapping(MappedRow),
    Tuple(Vec<RowValues>),
}

impl Row {
    pub(crate) fn shape(mode: RowMode, columns: &Arc<Columns>, values: Vec<RowValues>) -> Self {
        match mode {
            RowMode::Mapping => Row::Mapping(MappedRow::new(Arc::clone(columns), values)),
            RowMode::Tuple => Row::Tuple(values),
        }
    }

    /// Lookup by column name; always `None` for tuple rows.
    #[must_use]
    pub fn get(&self, column_name: &str) -> Option<&RowValues> {
        match self {
            Row::Mapping(row) => row.get(column_name),
            Row::Tuple(_) => None,
        }
    }

    #[must_use]
    pub fn get_by_index(&self, index: usize) -> Option<&RowValues> {
        match self {
            Row::Mapping(row) => row.get_by_index(index),
            Row::Tuple(values) => values.get(index),
        }
    }

    #[must_use]
    pub fn values(&self) -> &[RowValues] {
        match self {
            Row::Mapping(row) => row.values(),
            Row::Tuple(values) => values,
        }
    }

    #[must_use]
    pub fn into_values(self) -> Vec<RowValues> {
        match self {
            Row::Mapping(row) => row.into_values(),
            Row::Tuple(values) => values,
        }
    }

    #[must_use]
    pub fn as_mapping(&self) -> Option<&MappedRow> {
        match self {
            Row::Mapping(row) => Some(row),
            Row::Tuple(_) => None,
        }
    }

    #[must_use]
    pub fn as_tuple(&self) -> Option<&[RowValues]> {
        match self {
            Row::Mapping(_) => None,
            Row::Tuple(values) => Some(values),
        }
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.values().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.values().is_empty()
    }
}

impl Serialize for Row {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Row::Mapping(row) => row.serialize(serializer),
            Row::Tuple(values) => {
                let mut seq = serializer.serialize_seq(Some(values.len()))?;
                for value in values {
                    seq.serialize_element(value)?;
                }
                seq.end()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn columns(names: &[&str]) -> Arc<Columns> {
        Arc::new(Columns::new(
            names.iter().map(|n| (*n).to_string()).collect(),
        ))
    }

    #[test]
    fn mapping_rows_look_up_by_name_in_column_order() {
        let cols = columns(&["id", "name"]);
        let row = Row::shape(
            RowMode::Mapping,
            &cols,
            vec![RowValues::Int(1), RowValues::Text("alice".into())],
        );

        assert_eq!(row.get("name"), Some(&RowValues::Text("alice".into())));
        assert_eq!(row.get("missing"), None);
        let mapping = row.as_mapping().unwrap();
        let order: Vec<&str> = mapping.iter().map(|(name, _)| name).collect();
        assert_eq!(order, ["id", "name"]);
        assert_eq!(
            serde_json::to_string(&row).unwrap(),
            r#"{"id":1,"name":"alice"}"#
        );
    }

    #[test]
    fn tuple_rows_keep_position_only() {
        let cols = columns(&["ok"]);
        let row = Row::shape(RowMode::Tuple, &cols, vec![RowValues::Int(1)]);

        assert_eq!(row, Row::Tuple(vec![RowValues::Int(1)]));
        assert_eq!(row.get("ok"), None);
        assert_eq!(row.get_by_index(0), Some(&RowValues::Int(1)));
        assert_eq!(serde_json::to_string(&row).unwrap(), "[1]");
    }

    #[test]
    fn duplicate_column_names_resolve_to_last_everywhere() {
        let cols = columns(&["v", "id", "v"]);
        let row = MappedRow::new(
            cols,
            vec![RowValues::Int(1), RowValues::Int(7), RowValues::Int(2)],
        );
        assert_eq!(row.get("v"), Some(&RowValues::Int(2)));
        assert_eq!(row.get_by_index(0), Some(&RowValues::Int(1)));
        assert_eq!(row.len(), 3);
        assert_eq!(serde_json::to_string(&row).unwrap(), r#"{"v":2,"id":7}"#);
    }
}
