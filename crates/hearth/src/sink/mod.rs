//! Warehouse loaders.
//!
//! - `postgres`: transactional partition swap over a `sqlx` pool
//! - `memory`: in-process warehouse for tests and `--dry-run`

mod memory;
mod postgres;
mod traits;

pub use memory::MemoryWarehouse;
pub use postgres::PostgresWarehouse;
pub use traits::Warehouse;

use std::sync::Arc;

use crate::transform::{ColumnType, Value};

/// A reference-counted warehouse.
pub type WarehouseRef = Arc<dyn Warehouse>;

/// A named, typed warehouse column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub column_type: ColumnType,
}

impl ColumnSpec {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
        }
    }
}

/// The full contents of one table's partition for one date.
///
/// `rows` are laid out as `columns`; the partition column is not part of
/// `columns` and is written by the warehouse from the partition date.
#[derive(Debug, Clone, PartialEq)]
pub struct TableLoad {
    pub table: String,
    pub partition_column: String,
    pub columns: Vec<ColumnSpec>,
    pub rows: Vec<Vec<Value>>,
}
