//! Normalization of raw records into canonical, typed rows.
//!
//! - `value`: raw/canonical values and type coercion
//! - `lookup`: reference-table enrichment
//! - `normalize`: per-record column mapping
//! - `dedup`: key-based deduplication within a dataset batch

mod dedup;
mod lookup;
mod normalize;
mod value;

pub use dedup::{Deduplicated, deduplicate};
pub use lookup::LookupTable;
pub use normalize::{CanonicalRecord, Normalizer};
pub use value::{ColumnType, DEFAULT_DATE_FORMAT, RawValue, Value, coerce, parse_integer, parse_number};
