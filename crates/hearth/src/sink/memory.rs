//! In-process warehouse.
//!
//! Tables live behind one mutex, so a partition swap is a clone-modify-replace
//! of the whole table map and is atomic with respect to readers.

use std::collections::{HashMap, HashSet};

use async_trait::async_trait;
use chrono::NaiveDate;
use indexmap::IndexMap;
use tokio::sync::Mutex;
use tracing::debug;

use crate::error::WarehouseError;
use crate::transform::Value;

use super::{ColumnSpec, TableLoad, Warehouse};

#[derive(Debug, Clone, Default)]
struct MemoryTable {
    columns: Vec<String>,
    partition_column: Option<String>,
    rows: Vec<Vec<Value>>,
}

impl MemoryTable {
    fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }
}

#[derive(Debug)]
struct State {
    tables: HashMap<String, MemoryTable>,
    available: bool,
    rejected: HashSet<String>,
    commits: usize,
}

/// A warehouse held entirely in memory.
#[derive(Debug)]
pub struct MemoryWarehouse {
    state: Mutex<State>,
}

impl Default for MemoryWarehouse {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryWarehouse {
    pub fn new() -> Self {
        Self {
            state: Mutex::new(State {
                tables: HashMap::new(),
                available: true,
                rejected: HashSet::new(),
                commits: 0,
            }),
        }
    }

    /// Create or replace an unpartitioned table, e.g. a lookup table.
    pub async fn seed(&self, table: &str, columns: &[&str], rows: Vec<Vec<Value>>) {
        let mut state = self.state.lock().await;
        state.tables.insert(
            table.to_string(),
            MemoryTable {
                columns: columns.iter().map(|c| c.to_string()).collect(),
                partition_column: None,
                rows,
            },
        );
    }

    /// Simulate the warehouse going away (or coming back).
    pub async fn set_available(&self, available: bool) {
        self.state.lock().await.available = available;
    }

    /// Make every write to `table` fail as a rejected load.
    pub async fn reject_table(&self, table: &str) {
        self.state.lock().await.rejected.insert(table.to_string());
    }

    /// Every row of `table`, partition column first. Empty if the table does
    /// not exist.
    pub async fn rows(&self, table: &str) -> Vec<Vec<Value>> {
        let state = self.state.lock().await;
        state
            .tables
            .get(table)
            .map(|t| t.rows.clone())
            .unwrap_or_default()
    }

    /// Rows of one partition, without the partition column.
    pub async fn partition_rows(&self, table: &str, partition: NaiveDate) -> Vec<Vec<Value>> {
        let state = self.state.lock().await;
        let Some(t) = state.tables.get(table) else {
            return Vec::new();
        };
        let Some(index) = t.partition_column.as_deref().and_then(|c| t.column_index(c)) else {
            return Vec::new();
        };

        t.rows
            .iter()
            .filter(|row| row.get(index) == Some(&Value::Date(partition)))
            .map(|row| {
                row.iter()
                    .enumerate()
                    .filter(|(i, _)| *i != index)
                    .map(|(_, v)| v.clone())
                    .collect()
            })
            .collect()
    }

    /// Number of committed partition swaps.
    pub async fn commits(&self) -> usize {
        self.state.lock().await.commits
    }
}

fn apply_load(
    tables: &mut HashMap<String, MemoryTable>,
    load: &TableLoad,
    partition: NaiveDate,
) -> Result<u64, WarehouseError> {
    let columns: Vec<String> = std::iter::once(load.partition_column.clone())
        .chain(load.columns.iter().map(|c| c.name.clone()))
        .collect();

    let table = tables
        .entry(load.table.clone())
        .or_insert_with(|| MemoryTable {
            columns: columns.clone(),
            partition_column: Some(load.partition_column.clone()),
            rows: Vec::new(),
        });

    if table.columns != columns {
        return Err(WarehouseError::Rejected {
            table: load.table.clone(),
            message: format!(
                "columns [{}] do not match table columns [{}]",
                columns.join(", "),
                table.columns.join(", ")
            ),
        });
    }
    if let Some(bad) = load.rows.iter().find(|row| row.len() != load.columns.len()) {
        return Err(WarehouseError::Rejected {
            table: load.table.clone(),
            message: format!(
                "row has {} values, expected {}",
                bad.len(),
                load.columns.len()
            ),
        });
    }

    let stamp = Value::Date(partition);
    table.rows.retain(|row| row.first() != Some(&stamp));
    table.rows.extend(load.rows.iter().map(|row| {
        std::iter::once(stamp.clone())
            .chain(row.iter().cloned())
            .collect::<Vec<_>>()
    }));

    Ok(load.rows.len() as u64)
}

#[async_trait]
impl Warehouse for MemoryWarehouse {
    async fn replace_partitions(
        &self,
        loads: &[TableLoad],
        partition: NaiveDate,
    ) -> Result<IndexMap<String, u64>, WarehouseError> {
        let mut state = self.state.lock().await;
        if !state.available {
            return Err(WarehouseError::Unavailable {
                message: "in-memory warehouse is offline".to_string(),
            });
        }

        // Work on a copy so a failing table leaves every table untouched.
        let mut staged = state.tables.clone();
        let mut loaded = IndexMap::with_capacity(loads.len());
        for load in loads {
            if state.rejected.contains(&load.table) {
                return Err(WarehouseError::Rejected {
                    table: load.table.clone(),
                    message: "table refuses writes".to_string(),
                });
            }
            let count = apply_load(&mut staged, load, partition)?;
            loaded.insert(load.table.clone(), count);
        }

        state.tables = staged;
        state.commits += 1;
        debug!(%partition, tables = loaded.len(), "Committed in-memory partition swap");
        Ok(loaded)
    }

    async fn fetch_table(
        &self,
        table: &str,
        columns: &[ColumnSpec],
    ) -> Result<Vec<Vec<Value>>, WarehouseError> {
        let state = self.state.lock().await;
        if !state.available {
            return Err(WarehouseError::Unavailable {
                message: "in-memory warehouse is offline".to_string(),
            });
        }

        let stored = state.tables.get(table).ok_or_else(|| WarehouseError::Rejected {
            table: table.to_string(),
            message: "table does not exist".to_string(),
        })?;

        let indexes = columns
            .iter()
            .map(|c| {
                stored
                    .column_index(&c.name)
                    .ok_or_else(|| WarehouseError::Rejected {
                        table: table.to_string(),
                        message: format!("column '{}' does not exist", c.name),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(stored
            .rows
            .iter()
            .map(|row| {
                indexes
                    .iter()
                    .map(|&i| row.get(i).cloned().unwrap_or(Value::Null))
                    .collect()
            })
            .collect())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}
