//! Per-record mapping from raw fields to canonical columns.

use chrono::NaiveDate;
use indexmap::IndexMap;

use crate::config::{DatasetConfig, DatasetKey};
use crate::error::NormalizationError;
use crate::sink::ColumnSpec;
use crate::source::RawRecord;

use super::lookup::LookupTable;
use super::value::{Value, coerce};

/// Separator between key column values in a `property_id`.
pub const ID_SEPARATOR: &str = "|";

/// Escape `\` and the separator so distinct key tuples never join to the
/// same id.
fn escape_key_part(part: &str) -> String {
    part.replace('\\', "\\\\").replace(ID_SEPARATOR, "\\|")
}

/// A record in canonical form, ready to load.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalRecord {
    /// Stable identity, unique within a dataset batch after deduplication.
    pub property_id: String,
    /// Always the request's date.
    pub extract_date: NaiveDate,
    /// Origin, kept for ordering and error reports.
    pub object_key: String,
    pub row: usize,
    /// Canonical column → value, in mapping order, lookup columns last.
    pub attributes: IndexMap<String, Value>,
}

impl CanonicalRecord {
    /// Values for `columns`, in order. Absent attributes load as null.
    pub fn to_row(&self, columns: &[ColumnSpec]) -> Vec<Value> {
        columns
            .iter()
            .map(|c| self.attributes.get(&c.name).cloned().unwrap_or(Value::Null))
            .collect()
    }
}

/// Applies one dataset's mapping table to raw records.
///
/// Pure: the extract date and any lookup table are passed in, nothing is read
/// from the environment.
#[derive(Debug, Clone, Copy)]
pub struct Normalizer<'a> {
    key: &'a DatasetKey,
    config: &'a DatasetConfig,
    lookup: Option<&'a LookupTable>,
}

impl<'a> Normalizer<'a> {
    pub fn new(key: &'a DatasetKey, config: &'a DatasetConfig) -> Self {
        Self {
            key,
            config,
            lookup: None,
        }
    }

    pub fn with_lookup(mut self, lookup: Option<&'a LookupTable>) -> Self {
        self.lookup = lookup;
        self
    }

    pub fn dataset(&self) -> &DatasetKey {
        self.key
    }

    /// Map one raw record onto the dataset's canonical columns.
    pub fn normalize(
        &self,
        record: &RawRecord,
        extract_date: NaiveDate,
    ) -> Result<CanonicalRecord, NormalizationError> {
        let mut attributes = IndexMap::with_capacity(self.config.columns.len() + 1);

        for mapping in &self.config.columns {
            let source = mapping.source_name();
            let raw = record.field(source);

            if raw.is_null() && !mapping.nullable {
                return Err(NormalizationError::MissingField {
                    key: record.object_key.clone(),
                    row: record.row,
                    field: source.to_string(),
                });
            }

            let value = coerce(raw, mapping.column_type, mapping.format.as_deref()).map_err(
                |message| NormalizationError::InvalidField {
                    key: record.object_key.clone(),
                    row: record.row,
                    field: source.to_string(),
                    message,
                },
            )?;
            attributes.insert(mapping.column.clone(), value);
        }

        if let (Some(lookup_config), Some(table)) = (&self.config.lookup, self.lookup) {
            let join_values = lookup_config
                .on
                .iter()
                .map(|column| attributes.get(column).unwrap_or(&Value::Null));

            let Some(selected) = table.get(join_values) else {
                let values = lookup_config
                    .on
                    .iter()
                    .map(|column| {
                        let value = attributes.get(column).unwrap_or(&Value::Null);
                        format!("{column}={value}")
                    })
                    .collect::<Vec<_>>()
                    .join(", ");
                return Err(NormalizationError::LookupMiss {
                    key: record.object_key.clone(),
                    row: record.row,
                    table: table.table().to_string(),
                    values,
                });
            };

            for (column, value) in lookup_config.select.iter().zip(selected) {
                attributes.insert(column.column.clone(), value.clone());
            }
        }

        let property_id = self.property_id(&attributes, record)?;

        Ok(CanonicalRecord {
            property_id,
            extract_date,
            object_key: record.object_key.clone(),
            row: record.row,
            attributes,
        })
    }

    fn property_id(
        &self,
        attributes: &IndexMap<String, Value>,
        record: &RawRecord,
    ) -> Result<String, NormalizationError> {
        let parts: Vec<String> = self
            .config
            .key_columns
            .iter()
            .map(|column| {
                attributes
                    .get(column)
                    .map(|value| escape_key_part(&value.key_text()))
                    .unwrap_or_default()
            })
            .collect();

        if parts.iter().all(|part| part.trim().is_empty()) {
            return Err(NormalizationError::EmptyKey {
                key: record.object_key.clone(),
                row: record.row,
            });
        }

        Ok(parts.join(ID_SEPARATOR))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{ColumnMapping, LookupColumn, LookupConfig};
    use crate::source::RawRecord;
    use crate::transform::{ColumnType, RawValue};

    fn mapping(source: &str, column: &str, column_type: ColumnType, nullable: bool) -> ColumnMapping {
        ColumnMapping {
            source: Some(source.to_string()),
            column: column.to_string(),
            column_type,
            nullable,
            format: None,
            load: true,
        }
    }

    fn living_wage() -> DatasetConfig {
        DatasetConfig {
            pattern: None,
            suffix: None,
            format: Default::default(),
            compression: Default::default(),
            delimiter: ',',
            table: "wage".into(),
            partition_column: "as_of_date".into(),
            key_columns: vec!["county".into(), "wage_level".into(), "children".into()],
            columns: vec![
                mapping("county", "county", ColumnType::String, false),
                mapping("wage_level", "wage_level", ColumnType::String, false),
                mapping("num_children", "children", ColumnType::Integer, false),
                mapping("usd_amount", "hourly_wage", ColumnType::Float, true),
            ],
            lookup: None,
        }
    }

    fn record(fields: &[(&str, RawValue)]) -> RawRecord {
        RawRecord::new(
            "real_estate/cost_of_living/2023-03-17/living_wage.csv",
            1,
            fields
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        )
    }

    fn date() -> NaiveDate {
        NaiveDate::from_ymd_opt(2023, 3, 17).unwrap()
    }

    #[test]
    fn test_maps_and_coerces_every_column() {
        let key = DatasetKey::new("living_wage");
        let config = living_wage();
        let normalizer = Normalizer::new(&key, &config);

        let raw = record(&[
            ("county", "Autauga".into()),
            ("wage_level", "living".into()),
            ("num_children", "2.0".into()),
            ("usd_amount", "1,234.50".into()),
        ]);

        let canonical = normalizer.normalize(&raw, date()).unwrap();

        assert_eq!(canonical.property_id, "Autauga|living|2");
        assert_eq!(canonical.extract_date, date());
        assert_eq!(canonical.attributes.len(), 4);
        assert_eq!(canonical.attributes["children"], Value::Integer(2));
        assert_eq!(canonical.attributes["hourly_wage"], Value::Float(1234.5));
    }

    #[test]
    fn test_separator_in_key_value_is_escaped() {
        let key = DatasetKey::new("living_wage");
        let config = living_wage();
        let normalizer = Normalizer::new(&key, &config);

        let left = record(&[
            ("county", "A|B".into()),
            ("wage_level", "x".into()),
            ("num_children", "1".into()),
        ]);
        let right = record(&[
            ("county", "A".into()),
            ("wage_level", "B|x".into()),
            ("num_children", "1".into()),
        ]);
        let backslash = record(&[
            ("county", "A\\".into()),
            ("wage_level", "x".into()),
            ("num_children", "1".into()),
        ]);

        let left = normalizer.normalize(&left, date()).unwrap().property_id;
        let right = normalizer.normalize(&right, date()).unwrap().property_id;
        let backslash = normalizer.normalize(&backslash, date()).unwrap().property_id;

        assert_eq!(left, "A\\|B|x|1");
        assert_eq!(right, "A|B\\|x|1");
        assert_eq!(backslash, "A\\\\|x|1");
        assert_ne!(left, right);
    }

    #[test]
    fn test_missing_optional_field_is_explicit_null() {
        let key = DatasetKey::new("living_wage");
        let config = living_wage();
        let raw = record(&[
            ("county", "Autauga".into()),
            ("wage_level", "living".into()),
            ("num_children", "0".into()),
        ]);

        let canonical = Normalizer::new(&key, &config).normalize(&raw, date()).unwrap();
        assert_eq!(canonical.attributes["hourly_wage"], Value::Null);
    }

    #[test]
    fn test_missing_required_field_reports_location() {
        let key = DatasetKey::new("living_wage");
        let config = living_wage();
        let raw = record(&[("county", "Autauga".into()), ("num_children", "0".into())]);

        let err = Normalizer::new(&key, &config).normalize(&raw, date()).unwrap_err();
        assert_eq!(err.field(), Some("wage_level"));
        assert_eq!(err.row(), Some(1));
    }

    #[test]
    fn test_uncoercible_field_reports_field() {
        let key = DatasetKey::new("living_wage");
        let config = living_wage();
        let raw = record(&[
            ("county", "Autauga".into()),
            ("wage_level", "living".into()),
            ("num_children", "two".into()),
        ]);

        let err = Normalizer::new(&key, &config).normalize(&raw, date()).unwrap_err();
        assert!(matches!(err, NormalizationError::InvalidField { ref field, .. } if field == "num_children"));
    }

    #[test]
    fn test_empty_key_is_rejected() {
        let key = DatasetKey::new("living_wage");
        let mut config = living_wage();
        config.key_columns = vec!["hourly_wage".into()];
        let raw = record(&[
            ("county", "Autauga".into()),
            ("wage_level", "living".into()),
            ("num_children", "0".into()),
        ]);

        let err = Normalizer::new(&key, &config).normalize(&raw, date()).unwrap_err();
        assert!(matches!(err, NormalizationError::EmptyKey { .. }));
    }

    #[test]
    fn test_lookup_enrichment_and_miss() {
        let key = DatasetKey::new("living_wage");
        let mut config = living_wage();
        let lookup = LookupConfig {
            table: "household".into(),
            on: vec!["children".into()],
            select: vec![LookupColumn {
                column: "household_id".into(),
                column_type: ColumnType::Integer,
            }],
        };
        config.lookup = Some(lookup.clone());
        let table = LookupTable::from_rows(&lookup, vec![vec![Value::Integer(2), Value::Integer(42)]]);
        let normalizer = Normalizer::new(&key, &config).with_lookup(Some(&table));

        let hit = record(&[
            ("county", "Autauga".into()),
            ("wage_level", "living".into()),
            ("num_children", "2".into()),
        ]);
        let canonical = normalizer.normalize(&hit, date()).unwrap();
        assert_eq!(canonical.attributes["household_id"], Value::Integer(42));

        let miss = record(&[
            ("county", "Autauga".into()),
            ("wage_level", "living".into()),
            ("num_children", "3".into()),
        ]);
        let err = normalizer.normalize(&miss, date()).unwrap_err();
        assert!(matches!(err, NormalizationError::LookupMiss { ref values, .. } if values == "children=3"));
    }

    #[test]
    fn test_to_row_follows_column_order() {
        let key = DatasetKey::new("living_wage");
        let config = living_wage();
        let raw = record(&[
            ("county", "Autauga".into()),
            ("wage_level", "living".into()),
            ("num_children", "1".into()),
            ("usd_amount", "20".into()),
        ]);
        let canonical = Normalizer::new(&key, &config).normalize(&raw, date()).unwrap();

        let columns = vec![
            ColumnSpec::new("hourly_wage", ColumnType::Float),
            ColumnSpec::new("county", ColumnType::String),
            ColumnSpec::new("household_id", ColumnType::Integer),
        ];
        assert_eq!(
            canonical.to_row(&columns),
            vec![Value::Float(20.0), Value::Text("Autauga".into()), Value::Null]
        );
    }
}
