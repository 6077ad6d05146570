//! Trait for warehouse abstractions.
//!
//! The pipeline only talks to a [`Warehouse`], so Postgres can be swapped for
//! the in-memory implementation in tests and dry runs.

use async_trait::async_trait;
use chrono::NaiveDate;
use indexmap::IndexMap;

use crate::error::WarehouseError;
use crate::transform::Value;

use super::{ColumnSpec, TableLoad};

/// A relational store that can atomically replace date partitions.
#[async_trait]
pub trait Warehouse: Send + Sync + std::fmt::Debug {
    /// Replace the `partition` rows of every table in `loads`.
    ///
    /// All tables are swapped in one transaction: either every table holds
    /// exactly the new rows for the partition, or nothing changed. Other
    /// partitions are never touched. A load with no rows clears its partition.
    ///
    /// Returns the number of rows written per table.
    async fn replace_partitions(
        &self,
        loads: &[TableLoad],
        partition: NaiveDate,
    ) -> Result<IndexMap<String, u64>, WarehouseError>;

    /// Read `columns` of every row in `table`, cast to the given types.
    async fn fetch_table(
        &self,
        table: &str,
        columns: &[ColumnSpec],
    ) -> Result<Vec<Vec<Value>>, WarehouseError>;

    /// Short name for logging.
    fn name(&self) -> &'static str;
}
