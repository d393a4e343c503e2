//! Schema definitions.
//!
//! A schema is an ordered list of named, typed columns. Names are looked up
//! through an index; when a name occurs more than once, the last column with
//! that name is the visible one.

use std::collections::HashMap;
use std::sync::Arc;

use super::kind::ColumnType;
use crate::error::ConfigError;

/// Metadata for a single column.
#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    pub name: String,
    pub ty: ColumnType,
}

impl Column {
    pub fn new(name: impl Into<String>, ty: ColumnType) -> Self {
        Self {
            name: name.into(),
            ty,
        }
    }
}

/// Ordered set of columns.
#[derive(Clone, Debug, Default)]
pub struct Schema {
    columns: Vec<Column>,
    /// Column name → index of the last column with that name.
    name_index: HashMap<String, usize>,
}

impl Schema {
    pub fn new(columns: Vec<Column>) -> Self {
        let name_index = columns
            .iter()
            .enumerate()
            .map(|(i, c)| (c.name.clone(), i))
            .collect();
        Self {
            columns,
            name_index,
        }
    }

    /// Number of columns.
    #[inline]
    pub fn len(&self) -> usize {
        self.columns.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    #[inline]
    pub fn column(&self, index: usize) -> Option<&Column> {
        self.columns.get(index)
    }

    #[inline]
    pub fn column_type(&self, index: usize) -> Option<ColumnType> {
        self.columns.get(index).map(|c| c.ty)
    }

    /// Column index by name.
    #[inline]
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.name_index.get(name).copied()
    }

    /// Column index by name, failing with [`ConfigError::UnknownColumn`].
    pub fn require(&self, name: &str) -> Result<usize, ConfigError> {
        self.index_of(name).ok_or_else(|| ConfigError::UnknownColumn {
            name: name.to_string(),
            available: self.describe(),
        })
    }

    pub fn iter(&self) -> impl Iterator<Item = &Column> {
        self.columns.iter()
    }

    /// Copy of this schema with `column` appended.
    pub fn with_column(&self, column: Column) -> Schema {
        let mut columns = self.columns.clone();
        columns.push(column);
        Schema::new(columns)
    }

    /// Copy of this schema with column `index` replaced.
    pub fn with_replaced(&self, index: usize, column: Column) -> Schema {
        let mut columns = self.columns.clone();
        columns[index] = column;
        Schema::new(columns)
    }

    /// `name:type` pairs, comma separated.
    pub fn describe(&self) -> String {
        self.columns
            .iter()
            .map(|c| format!("{}:{}", c.name, c.ty))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn into_shared(self) -> Arc<Schema> {
        Arc::new(self)
    }
}

impl PartialEq for Schema {
    fn eq(&self, other: &Self) -> bool {
        self.columns == other.columns
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::DataKind;

    fn schema() -> Schema {
        Schema::new(vec![
            Column::new("Label", ColumnType::f32()),
            Column::new("Features", ColumnType::vector(4)),
            Column::new("Weight", ColumnType::f32()),
        ])
    }

    #[test]
    fn test_lookup() {
        let s = schema();
        assert_eq!(s.len(), 3);
        assert_eq!(s.index_of("Features"), Some(1));
        assert_eq!(s.index_of("Missing"), None);
        assert_eq!(s.column_type(2), Some(ColumnType::f32()));
    }

    #[test]
    fn test_require_reports_available_columns() {
        let err = schema().require("Y").unwrap_err();
        match err {
            ConfigError::UnknownColumn { name, available } => {
                assert_eq!(name, "Y");
                assert!(available.contains("Label:f32"));
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_duplicate_names_last_wins() {
        let s = schema().with_column(Column::new("Label", ColumnType::scalar(DataKind::U8)));
        assert_eq!(s.index_of("Label"), Some(3));
    }

    #[test]
    fn test_with_replaced() {
        let s = schema().with_replaced(0, Column::new("Label", ColumnType::u32()));
        assert_eq!(s.column_type(0), Some(ColumnType::u32()));
        assert_eq!(s.index_of("Label"), Some(0));
    }
}
