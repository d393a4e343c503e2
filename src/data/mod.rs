//! Columnar data access.
//!
//! This module provides the data-view abstraction consumed and produced by the
//! reduction:
//!
//! - [`Schema`] / [`Column`] / [`ColumnType`]: ordered, named, typed columns
//! - [`DataView`] / [`RowCursor`]: datasets and forward-only cursors
//! - [`LabelValue`]: the five admissible label representations
//! - [`VBuffer`]: dense or sparse `f32` vectors
//! - [`InMemoryView`]: a view backed by in-memory arrays

pub mod kind;
pub mod label;
pub mod memory;
pub mod schema;
pub mod value;
pub mod vbuffer;
pub mod view;

pub use kind::{ColumnType, DataKind, KeyRange, ScalarType};
pub use label::LabelValue;
pub use memory::{ColumnData, InMemoryView, InMemoryViewBuilder};
pub use schema::{Column, Schema};
pub use value::{Scalar, Value};
pub use vbuffer::VBuffer;
pub use view::{
    count_rows, ActiveColumns, BoxedCursor, CursorState, DataView, RowCursor, RowId,
};
