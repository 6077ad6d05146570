//! Key-based deduplication within a dataset batch.

use indexmap::IndexMap;
use indexmap::map::Entry;

use crate::config::DuplicatePolicy;
use crate::error::NormalizationError;

use super::normalize::CanonicalRecord;

/// Result of deduplicating one dataset batch.
#[derive(Debug, Clone, PartialEq)]
pub struct Deduplicated {
    pub records: Vec<CanonicalRecord>,
    /// Records discarded because another record had the same id.
    pub dropped: usize,
}

/// Collapse records sharing a `property_id`.
///
/// Records are first ordered by (object key, row), so the outcome does not
/// depend on the order in which objects were downloaded. Survivors keep the
/// position of the first record with their id.
pub fn deduplicate(
    dataset: &str,
    mut records: Vec<CanonicalRecord>,
    policy: DuplicatePolicy,
) -> Result<Deduplicated, NormalizationError> {
    records.sort_by(|a, b| a.object_key.cmp(&b.object_key).then(a.row.cmp(&b.row)));

    let total = records.len();
    let mut by_id: IndexMap<String, CanonicalRecord> = IndexMap::with_capacity(total);

    for record in records {
        match by_id.entry(record.property_id.clone()) {
            Entry::Vacant(slot) => {
                slot.insert(record);
            }
            Entry::Occupied(mut slot) => match policy {
                DuplicatePolicy::LastWins => {
                    slot.insert(record);
                }
                DuplicatePolicy::FirstWins => {}
                DuplicatePolicy::Reject => {
                    let first = slot.get();
                    return Err(NormalizationError::DuplicateKey {
                        dataset: dataset.to_string(),
                        property_id: record.property_id,
                        first: format!("{}:{}", first.object_key, first.row),
                        second: format!("{}:{}", record.object_key, record.row),
                    });
                }
            },
        }
    }

    let records: Vec<_> = by_id.into_values().collect();
    Ok(Deduplicated {
        dropped: total - records.len(),
        records,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::Value;
    use chrono::NaiveDate;

    fn rec(id: &str, object_key: &str, row: usize, amount: i64) -> CanonicalRecord {
        let mut attributes = IndexMap::new();
        attributes.insert("amount".to_string(), Value::Integer(amount));
        CanonicalRecord {
            property_id: id.to_string(),
            extract_date: NaiveDate::from_ymd_opt(2023, 3, 17).unwrap(),
            object_key: object_key.to_string(),
            row,
            attributes,
        }
    }

    fn amounts(result: &Deduplicated) -> Vec<(String, Value)> {
        result
            .records
            .iter()
            .map(|r| (r.property_id.clone(), r.attributes["amount"].clone()))
            .collect()
    }

    #[test]
    fn test_last_wins_by_object_then_row() {
        let records = vec![
            rec("a", "part-2.csv", 1, 30),
            rec("a", "part-1.csv", 2, 20),
            rec("b", "part-1.csv", 3, 5),
            rec("a", "part-1.csv", 1, 10),
        ];

        let result = deduplicate("expenses", records, DuplicatePolicy::LastWins).unwrap();

        assert_eq!(result.dropped, 2);
        assert_eq!(
            amounts(&result),
            vec![
                ("a".to_string(), Value::Integer(30)),
                ("b".to_string(), Value::Integer(5)),
            ]
        );
    }

    #[test]
    fn test_first_wins() {
        let records = vec![rec("a", "part-2.csv", 1, 30), rec("a", "part-1.csv", 1, 10)];

        let result = deduplicate("expenses", records, DuplicatePolicy::FirstWins).unwrap();

        assert_eq!(result.dropped, 1);
        assert_eq!(amounts(&result), vec![("a".to_string(), Value::Integer(10))]);
    }

    #[test]
    fn test_input_order_does_not_matter() {
        let forward = vec![
            rec("a", "x.csv", 1, 1),
            rec("a", "y.csv", 1, 2),
            rec("b", "y.csv", 2, 3),
        ];
        let mut backward = forward.clone();
        backward.reverse();

        let one = deduplicate("d", forward, DuplicatePolicy::LastWins).unwrap();
        let two = deduplicate("d", backward, DuplicatePolicy::LastWins).unwrap();
        assert_eq!(one, two);
    }

    #[test]
    fn test_reject_names_both_locations() {
        let records = vec![rec("a", "x.csv", 4, 1), rec("a", "x.csv", 9, 2)];

        let err = deduplicate("expenses", records, DuplicatePolicy::Reject).unwrap_err();

        match err {
            NormalizationError::DuplicateKey {
                dataset,
                property_id,
                first,
                second,
            } => {
                assert_eq!(dataset, "expenses");
                assert_eq!(property_id, "a");
                assert_eq!(first, "x.csv:4");
                assert_eq!(second, "x.csv:9");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_no_duplicates_is_identity() {
        let records = vec![rec("a", "x.csv", 1, 1), rec("b", "x.csv", 2, 2)];
        let result = deduplicate("d", records.clone(), DuplicatePolicy::Reject).unwrap();
        assert_eq!(result.dropped, 0);
        assert_eq!(result.records, records);
    }
}
