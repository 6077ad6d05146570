//! End-to-end invocations against an in-memory object store and warehouse.

use std::io::Write;
use std::sync::Arc;

use chrono::NaiveDate;
use flate2::Compression;
use flate2::write::GzEncoder;

use hearth::config::Config;
use hearth::sink::MemoryWarehouse;
use hearth::transform::Value;
use hearth::{ExtractRequest, LoadResult, Pipeline, Stage};
use hearth_core::{StorageProvider, StorageProviderRef};

const BASE_CONFIG: &str = r#"
source:
  path: "memory://"
  max_concurrent_objects: 8
warehouse:
  url: "postgres://localhost/hearth"
datasets:
  living_wage:
    table: living_wage
    suffix: ".csv"
    key_columns: [county, wage_level]
    columns:
      - { column: county, nullable: false }
      - { column: wage_level, nullable: false }
      - { source: usd_amount, column: hourly_wage, type: float }
"#;

fn date(day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2023, 3, day).unwrap()
}

fn prefix(day: u32) -> String {
    format!("real_estate/cost_of_living/2023-03-{day:02}")
}

struct Harness {
    pipeline: Pipeline,
    storage: StorageProviderRef,
    warehouse: Arc<MemoryWarehouse>,
}

impl Harness {
    fn new(config: &str) -> Self {
        let config = Arc::new(Config::parse(config).unwrap());
        let storage: StorageProviderRef = Arc::new(StorageProvider::in_memory());
        let warehouse = Arc::new(MemoryWarehouse::new());
        let pipeline = Pipeline::new(config, Arc::clone(&storage), warehouse.clone());
        Self {
            pipeline,
            storage,
            warehouse,
        }
    }

    fn with_policy(policy: &str) -> Self {
        Self::new(&format!("{BASE_CONFIG}policy: {policy}\n"))
    }

    async fn put(&self, day: u32, name: &str, contents: &[u8]) {
        self.storage
            .put(format!("{}/{name}", prefix(day)).as_str(), contents.to_vec())
            .await
            .unwrap();
    }

    async fn run(&self, day: u32) -> LoadResult {
        self.pipeline.run(ExtractRequest::new(date(day))).await
    }
}

fn wage(county: &str, level: &str, amount: f64) -> Vec<Value> {
    vec![
        Value::Text(county.into()),
        Value::Text(level.into()),
        Value::Float(amount),
    ]
}

#[tokio::test]
async fn test_date_without_objects_loads_nothing() {
    let harness = Harness::new(BASE_CONFIG);

    let result = harness.run(17).await;

    assert!(result.is_success());
    assert_eq!(result.rows_loaded, 0);
    assert_eq!(harness.warehouse.commits().await, 0);
}

#[tokio::test]
async fn test_invoke_loads_three_rows() {
    let harness = Harness::new(BASE_CONFIG);
    harness
        .put(
            17,
            "living_wage.csv",
            b"county,wage_level,usd_amount\nAutauga,living,15.25\nAutauga,poverty,6.19\nBaldwin,living,16.01\n",
        )
        .await;

    let result = harness
        .pipeline
        .invoke(br#"{"extractDate": "2023-03-17"}"#)
        .await;

    assert!(result.is_success(), "{result:?}");
    assert_eq!(result.partition_date, Some(date(17)));
    assert_eq!(result.rows_loaded, 3);
    assert_eq!(result.tables["living_wage"], 3);
    assert_eq!(
        harness.warehouse.partition_rows("living_wage", date(17)).await,
        vec![
            wage("Autauga", "living", 15.25),
            wage("Autauga", "poverty", 6.19),
            wage("Baldwin", "living", 16.01),
        ]
    );

    let response = serde_json::to_value(result.response()).unwrap();
    assert_eq!(response["status"], "success");
    assert_eq!(response["rowsLoaded"], 3);
}

#[tokio::test]
async fn test_impossible_date_touches_nothing() {
    let harness = Harness::new(BASE_CONFIG);
    harness
        .put(17, "living_wage.csv", b"county,wage_level,usd_amount\nA,living,1\n")
        .await;

    let payloads: [&[u8]; 5] = [
        br#"{"extractDate": "2023-02-30"}"#,
        br#"{"extractDate": "2023-3-17"}"#,
        br#"{"extractDate": 20230317}"#,
        br#"{}"#,
        b"not json",
    ];
    for payload in payloads {
        let result = harness.pipeline.invoke(payload).await;
        assert_eq!(result.error_kind(), Some("InvalidRequest"));
        assert!(!result.is_retryable());
        assert_eq!(result.partition_date, None);
    }
    assert_eq!(harness.warehouse.commits().await, 0);
    assert!(harness.warehouse.rows("living_wage").await.is_empty());
}

#[tokio::test]
async fn test_rerun_is_idempotent() {
    let harness = Harness::new(BASE_CONFIG);
    harness
        .put(
            17,
            "living_wage.csv",
            b"county,wage_level,usd_amount\nAutauga,living,15.25\nBaldwin,living,16.01\n",
        )
        .await;

    let first = harness.run(17).await;
    let after_first = harness.warehouse.rows("living_wage").await;
    let second = harness.run(17).await;
    let after_second = harness.warehouse.rows("living_wage").await;

    assert!(first.is_success() && second.is_success());
    assert_eq!(first.rows_loaded, second.rows_loaded);
    assert_eq!(after_first, after_second);
    assert_eq!(after_second.len(), 2);
    assert_eq!(harness.warehouse.commits().await, 2);
}

#[tokio::test]
async fn test_other_partitions_untouched() {
    let harness = Harness::new(BASE_CONFIG);
    harness
        .put(16, "living_wage.csv", b"county,wage_level,usd_amount\nAutauga,living,15.00\n")
        .await;
    harness
        .put(17, "living_wage.csv", b"county,wage_level,usd_amount\nAutauga,living,15.25\n")
        .await;

    assert!(harness.run(16).await.is_success());
    assert!(harness.run(17).await.is_success());

    harness
        .put(17, "living_wage.csv", b"county,wage_level,usd_amount\nAutauga,living,15.50\n")
        .await;
    assert!(harness.run(17).await.is_success());

    assert_eq!(
        harness.warehouse.partition_rows("living_wage", date(16)).await,
        vec![wage("Autauga", "living", 15.0)]
    );
    assert_eq!(
        harness.warehouse.partition_rows("living_wage", date(17)).await,
        vec![wage("Autauga", "living", 15.5)]
    );
}

#[tokio::test]
async fn test_skip_record_keeps_valid_rows() {
    let harness = Harness::with_policy("{ on_error: skip_record }");
    harness
        .put(
            17,
            "living_wage.csv",
            b"county,wage_level,usd_amount\nAutauga,living,15.25\nBaldwin,living\nButler,living,12.00\n",
        )
        .await;

    let result = harness.run(17).await;

    assert!(result.is_success(), "{result:?}");
    assert_eq!(result.rows_loaded, 2);
    assert_eq!(result.skipped_records(), 1);
    let issue = &result.issues[0];
    assert_eq!(issue.stage, Stage::Parse);
    assert_eq!(issue.dataset, "living_wage");
    assert_eq!(issue.row, Some(2));
}

#[tokio::test]
async fn test_fail_fast_aborts_before_load() {
    let harness = Harness::with_policy("{ on_error: fail_fast }");
    harness
        .put(
            17,
            "living_wage.csv",
            b"county,wage_level,usd_amount\nAutauga,living,15.25\nBaldwin,living\n",
        )
        .await;

    let result = harness.run(17).await;

    assert_eq!(result.error_kind(), Some("ParseError"));
    assert!(!result.is_retryable());
    assert_eq!(harness.warehouse.commits().await, 0);
}

#[tokio::test]
async fn test_duplicates_resolved_by_object_order() {
    for concurrency in [1, 8] {
        let config = BASE_CONFIG.replace(
            "max_concurrent_objects: 8",
            &format!("max_concurrent_objects: {concurrency}"),
        );
        let harness = Harness::new(&config);
        harness
            .put(17, "living_wage-a.csv", b"county,wage_level,usd_amount\nAutauga,living,1.00\nAutauga,living,2.00\n")
            .await;
        harness
            .put(17, "living_wage-b.csv", b"county,wage_level,usd_amount\nAutauga,living,3.00\nBaldwin,living,4.00\n")
            .await;

        let result = harness.run(17).await;

        assert!(result.is_success(), "{result:?}");
        assert_eq!(result.rows_loaded, 2);
        assert_eq!(
            harness.warehouse.partition_rows("living_wage", date(17)).await,
            vec![wage("Autauga", "living", 3.0), wage("Baldwin", "living", 4.0)]
        );
    }
}

#[tokio::test]
async fn test_rejected_duplicates_fail() {
    let harness = Harness::with_policy("{ on_duplicate: reject }");
    harness
        .put(17, "living_wage.csv", b"county,wage_level,usd_amount\nAutauga,living,1.00\nAutauga,living,2.00\n")
        .await;

    let result = harness.run(17).await;

    assert_eq!(result.error_kind(), Some("NormalizationError"));
    assert_eq!(harness.warehouse.commits().await, 0);
}

#[tokio::test]
async fn test_unavailable_warehouse_is_retryable() {
    let harness = Harness::new(BASE_CONFIG);
    harness
        .put(17, "living_wage.csv", b"county,wage_level,usd_amount\nAutauga,living,15.25\n")
        .await;
    harness.warehouse.set_available(false).await;

    let result = harness.run(17).await;

    assert_eq!(result.error_kind(), Some("SinkUnavailable"));
    assert!(result.is_retryable());
    let response = serde_json::to_value(result.response()).unwrap();
    assert_eq!(response["error"]["stage"], "load");

    harness.warehouse.set_available(true).await;
    assert!(harness.run(17).await.is_success());
}

#[tokio::test]
async fn test_rejected_table_rolls_back_every_table() {
    let config = format!(
        "{BASE_CONFIG}  expenses:
    table: annual_expense
    key_columns: [county]
    columns:
      - {{ column: county, nullable: false }}
      - {{ source: usd_amount, column: amount, type: float }}
"
    );
    let harness = Harness::new(&config);
    harness
        .put(17, "living_wage.csv", b"county,wage_level,usd_amount\nAutauga,living,15.25\n")
        .await;
    harness
        .put(17, "expenses.csv", b"county,usd_amount\nAutauga,30000\n")
        .await;
    harness.warehouse.reject_table("annual_expense").await;

    let result = harness.run(17).await;

    assert_eq!(result.error_kind(), Some("SinkRejected"));
    assert!(!result.is_retryable());
    assert!(harness.warehouse.rows("living_wage").await.is_empty());
}

#[tokio::test]
async fn test_empty_source_clear_and_fail() {
    let harness = Harness::with_policy("{ on_empty_source: clear }");
    harness
        .put(17, "living_wage.csv", b"county,wage_level,usd_amount\nAutauga,living,15.25\n")
        .await;
    assert!(harness.run(17).await.is_success());
    assert!(harness.run(18).await.is_success());
    assert_eq!(harness.warehouse.commits().await, 2);
    assert_eq!(harness.warehouse.rows("living_wage").await.len(), 1);

    let harness = Harness::with_policy("{ on_empty_source: fail }");
    let result = harness.run(17).await;
    assert_eq!(result.error_kind(), Some("NoData"));
    assert!(matches!(
        result.response().error.map(|e| e.stage),
        Some(Stage::Locate)
    ));
}

#[tokio::test]
async fn test_unclaimed_objects_count_as_empty_source() {
    let harness = Harness::with_policy("{ on_empty_source: fail }");
    harness.put(17, "_SUCCESS", b"").await;
    harness.put(17, "manifest.json", b"{}").await;

    let result = harness.run(17).await;

    assert_eq!(result.error_kind(), Some("NoData"));
    assert!(matches!(
        result.response().error.map(|e| e.stage),
        Some(Stage::Locate)
    ));
    assert_eq!(harness.warehouse.commits().await, 0);

    let harness = Harness::new(BASE_CONFIG);
    harness
        .put(17, "living_wage.csv", b"county,wage_level,usd_amount\nAutauga,living,15.25\n")
        .await;
    assert!(harness.run(17).await.is_success());
    harness.put(18, "_SUCCESS", b"").await;

    let result = harness.run(18).await;

    assert!(result.is_success(), "{result:?}");
    assert_eq!(result.rows_loaded, 0);
    assert_eq!(harness.warehouse.commits().await, 1);
    assert_eq!(
        harness.warehouse.partition_rows("living_wage", date(17)).await,
        vec![wage("Autauga", "living", 15.25)]
    );
}

#[tokio::test]
async fn test_separator_in_key_values_keeps_records_distinct() {
    let harness = Harness::with_policy("{ on_duplicate: reject }");
    harness
        .put(
            17,
            "living_wage.csv",
            b"county,wage_level,usd_amount\nA|B,x,1.00\nA,B|x,2.00\n",
        )
        .await;

    let result = harness.run(17).await;

    assert!(result.is_success(), "{result:?}");
    assert_eq!(result.rows_loaded, 2);
    assert_eq!(
        harness.warehouse.partition_rows("living_wage", date(17)).await,
        vec![wage("A|B", "x", 1.0), wage("A", "B|x", 2.0)]
    );
}

#[tokio::test]
async fn test_skip_object_counts_every_dropped_record() {
    let harness = Harness::with_policy("{ on_error: skip_object }");
    harness
        .put(
            17,
            "living_wage-a.csv",
            b"county,wage_level,usd_amount\nA,living,1\nB,living,2\nC,living,abc\nD,living,4\nE,living,5\n",
        )
        .await;
    harness
        .put(
            17,
            "living_wage-b.csv",
            b"county,wage_level,usd_amount\nF,living,1\nG,living\nH,living,3\nI,living,4\nJ,living,5\n",
        )
        .await;
    harness
        .put(17, "living_wage-c.csv", b"county,wage_level,usd_amount\nK,living,1\n")
        .await;

    let result = harness.run(17).await;

    assert!(result.is_success(), "{result:?}");
    assert_eq!(result.rows_loaded, 1);
    assert_eq!(result.issues.len(), 2);
    assert_eq!(result.skipped_records(), 10);
    let response = serde_json::to_value(result.response()).unwrap();
    assert_eq!(response["skippedRecords"], 10);
    assert_eq!(response["issues"][0]["droppedRecords"], 5);
    assert_eq!(response["issues"][1]["droppedRecords"], 5);
}

#[tokio::test]
async fn test_gzip_objects() {
    let config = BASE_CONFIG
        .replace("suffix: \".csv\"", "suffix: \".csv.gz\"")
        .replace("table: living_wage\n", "table: living_wage\n    compression: gzip\n");
    let harness = Harness::new(&config);

    let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
    encoder
        .write_all(b"county,wage_level,usd_amount\nAutauga,living,15.25\n")
        .unwrap();
    let compressed = encoder.finish().unwrap();
    harness.put(17, "living_wage.csv.gz", &compressed).await;
    harness.put(17, "living_wage.csv", b"ignored").await;

    let result = harness.run(17).await;

    assert!(result.is_success(), "{result:?}");
    assert_eq!(result.rows_loaded, 1);
}

#[tokio::test]
async fn test_lookup_enrichment() {
    let config = r#"
source: { path: "memory://" }
warehouse: { url: "postgres://localhost/hearth" }
policy: { on_error: skip_record }
datasets:
  expenses:
    table: annual_expense
    key_columns: [county, household, expense]
    columns:
      - { column: county, nullable: false }
      - { column: household, nullable: false }
      - { column: expense, nullable: false }
      - { source: usd_amount, column: amount, type: float }
    lookup:
      table: household
      on: [household]
      select:
        - { column: adults, type: integer }
        - { column: children, type: integer }
"#;
    let harness = Harness::new(config);
    harness
        .warehouse
        .seed(
            "household",
            &["household", "adults", "children", "description"],
            vec![
                vec![
                    Value::Text("1a0c".into()),
                    Value::Integer(1),
                    Value::Integer(0),
                    Value::Text("single adult".into()),
                ],
                vec![
                    Value::Text("2a2c".into()),
                    Value::Integer(2),
                    Value::Integer(2),
                    Value::Text("two adults, two children".into()),
                ],
            ],
        )
        .await;
    harness
        .put(
            17,
            "expenses.csv",
            b"county,household,expense,usd_amount\nAutauga,1a0c,food,3000\nAutauga,2a2c,food,9000\nAutauga,9a9c,food,1\n",
        )
        .await;

    let result = harness.run(17).await;

    assert!(result.is_success(), "{result:?}");
    assert_eq!(result.rows_loaded, 2);
    assert_eq!(result.issues.len(), 1);
    assert_eq!(result.issues[0].stage, Stage::Normalize);

    let rows = harness.warehouse.partition_rows("annual_expense", date(17)).await;
    assert_eq!(
        rows[1],
        vec![
            Value::Text("Autauga".into()),
            Value::Text("2a2c".into()),
            Value::Text("food".into()),
            Value::Float(9000.0),
            Value::Integer(2),
            Value::Integer(2),
        ]
    );
}
