//! Reference-table enrichment.

use std::collections::HashMap;

use tracing::warn;

use crate::config::{DatasetConfig, LookupConfig};
use crate::sink::ColumnSpec;

use super::value::Value;

/// Separator between key parts; never appears in rendered values from CSV.
const KEY_SEPARATOR: char = '\u{1f}';

/// An in-memory copy of a reference table, indexed by its join columns.
#[derive(Debug, Clone)]
pub struct LookupTable {
    table: String,
    rows: HashMap<String, Vec<Value>>,
}

impl LookupTable {
    /// Columns to read from the reference table: the join columns (typed as
    /// the dataset maps them) followed by the selected columns.
    pub fn fetch_columns(lookup: &LookupConfig, dataset: &DatasetConfig) -> Vec<ColumnSpec> {
        let on = lookup.on.iter().map(|name| {
            let column_type = dataset
                .columns
                .iter()
                .find(|c| &c.column == name)
                .map(|c| c.column_type)
                .unwrap_or_default();
            ColumnSpec::new(name, column_type)
        });
        let select = lookup
            .select
            .iter()
            .map(|c| ColumnSpec::new(&c.column, c.column_type));
        on.chain(select).collect()
    }

    /// Build the index from rows laid out as [`LookupTable::fetch_columns`].
    ///
    /// Rows with a null join value can never match and are skipped. When two
    /// rows share join values the first one is kept.
    pub fn from_rows(lookup: &LookupConfig, rows: Vec<Vec<Value>>) -> Self {
        let width = lookup.on.len();
        let mut index = HashMap::with_capacity(rows.len());
        let mut ambiguous = 0usize;

        for mut row in rows {
            if row.len() < width || row[..width].iter().any(Value::is_null) {
                continue;
            }
            let selected = row.split_off(width);
            let key = lookup_key(row.iter());
            if index.contains_key(&key) {
                ambiguous += 1;
                continue;
            }
            index.insert(key, selected);
        }

        if ambiguous > 0 {
            warn!(
                table = %lookup.table,
                count = ambiguous,
                "Lookup table has rows with duplicate join values, keeping the first"
            );
        }

        Self {
            table: lookup.table.clone(),
            rows: index,
        }
    }

    pub fn table(&self) -> &str {
        &self.table
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Selected values for the row matching `key_values` (in `on` order).
    pub fn get<'a>(&self, key_values: impl IntoIterator<Item = &'a Value>) -> Option<&[Value]> {
        let values: Vec<&Value> = key_values.into_iter().collect();
        if values.iter().any(|v| v.is_null()) {
            return None;
        }
        self.rows
            .get(&lookup_key(values.into_iter()))
            .map(Vec::as_slice)
    }
}

fn lookup_key<'a>(values: impl Iterator<Item = &'a Value>) -> String {
    let mut key = String::new();
    for (i, value) in values.enumerate() {
        if i > 0 {
            key.push(KEY_SEPARATOR);
        }
        key.push_str(&value.key_text());
    }
    key
}
