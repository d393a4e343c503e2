//! Group id generation.

use std::sync::Arc;

use super::{ColumnDeriver, DerivedView};
use crate::data::{Column, ColumnType, DataKind, DataView, RowCursor, Scalar, Value};
use crate::error::{ConfigError, DataError, Result};

/// Numbers rows `0, 1, 2, ...` in cursor order.
///
/// Numbering depends on the cursor position, so this view never splits into
/// partition cursors.
#[derive(Debug, Clone, Copy, Default)]
pub struct GroupIdColumn;

impl ColumnDeriver for GroupIdColumn {
    fn inputs(&self, _k: usize) -> Vec<usize> {
        Vec::new()
    }

    fn derive(&self, _k: usize, input: &dyn RowCursor) -> Result<Value> {
        let pos = u64::try_from(input.position()).map_err(|_| DataError::NoCurrentRow)?;
        Ok(Scalar::U64(pos).into())
    }

    fn splittable(&self) -> bool {
        false
    }
}

/// Adds a monotonically increasing `u64` group id column.
pub type GroupIdTransform = DerivedView<GroupIdColumn>;

impl DerivedView<GroupIdColumn> {
    pub fn new(source: Arc<dyn DataView>, name: &str) -> Result<Self> {
        if name.is_empty() {
            return Err(ConfigError::EmptyColumnName.into());
        }
        if source.schema().index_of(name).is_some() {
            return Err(ConfigError::DuplicateColumn(name.to_string()).into());
        }
        Ok(Self::from_parts(
            source,
            vec![Column::new(name, ColumnType::scalar(DataKind::U64))],
            GroupIdColumn,
        ))
    }
}

#[cfg(test)]
mod tests {
    use ndarray::array;

    use super::*;
    use crate::data::{ActiveColumns, InMemoryView};

    #[test]
    fn test_group_ids() {
        let view = InMemoryView::builder()
            .add_f32("Label", array![0.0, 1.0, 2.0].view())
            .build()
            .unwrap();
        let view = GroupIdTransform::new(Arc::new(view), "GroupId").unwrap();
        let cursors = view.cursor_set(&ActiveColumns::all(2), 4).unwrap();
        assert_eq!(cursors.len(), 1);

        let mut cursor = view.cursor(&ActiveColumns::all(2)).unwrap();
        let mut ids = Vec::new();
        while cursor.move_next().unwrap() {
            ids.push(cursor.scalar(1).unwrap());
        }
        assert_eq!(ids, vec![Scalar::U64(0), Scalar::U64(1), Scalar::U64(2)]);
    }

    #[test]
    fn test_duplicate_name() {
        let view = InMemoryView::builder()
            .add_f32("Label", array![0.0].view())
            .build()
            .unwrap();
        assert!(GroupIdTransform::new(Arc::new(view), "Label").unwrap_err().is_config());
    }

    #[test]
    fn test_debug_lists_columns() {
        let view = InMemoryView::builder()
            .add_f32("Label", array![0.0].view())
            .build()
            .unwrap();
        let view = GroupIdTransform::new(Arc::new(view), "GroupId").unwrap();
        let shown = format!("{view:?}");
        assert!(shown.starts_with("DerivedView"));
        assert!(shown.contains("GroupId"));
    }
}
