use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, OnceLock};

use orderlens_cli::commands::analytics::{AnalyticsRequest, ReportKind};
use orderlens_cli::commands::{analytics, config, ingest, recommend, train};
use orderlens_cli::log_filter;
use orderlens_core::analytics::RankBy;
use orderlens_core::config::{AppConfig, ConfigOverrides, LoadOptions};
use rust_xlsxwriter::Workbook;
use serde_json::Value;
use tempfile::TempDir;

#[test]
fn ingest_reports_dataset_summary_and_persists_snapshot() {
    with_env(&[], || {
        let fixture = Fixture::new();
        let result = ingest::run(&fixture.config(), &fixture.workbook);
        assert_eq!(result.exit_code, 0, "expected successful ingest: {}", result.output);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "ingest");
        assert_eq!(payload["status"], "ok");
        assert_eq!(payload["data"]["earnings_rows"], 12);
        assert_eq!(payload["data"]["total_revenue"], "390");
        assert_eq!(payload["data"]["reported_range"]["from"], "2024-01-01");
        assert!(fixture.artifact_dir().join("dataset.json").exists());
    });
}

#[test]
fn ingest_of_unreadable_file_is_an_input_failure() {
    with_env(&[], || {
        let fixture = Fixture::new();
        let result = ingest::run(&fixture.config(), &fixture.dir.path().join("missing.xlsx"));
        assert_eq!(result.exit_code, 7);

        let payload = parse_payload(&result.output);
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "input_io");
    });
}

#[test]
fn ingest_of_garbage_bytes_is_an_ingest_failure() {
    with_env(&[], || {
        let fixture = Fixture::new();
        let garbage = fixture.dir.path().join("garbage.xlsx");
        fs::write(&garbage, b"definitely not a spreadsheet").expect("write garbage");

        let result = ingest::run(&fixture.config(), &garbage);
        assert_eq!(result.exit_code, 3);
        assert_eq!(parse_payload(&result.output)["error_class"], "ingest");
    });
}

#[test]
fn train_prints_reproducible_report() {
    with_env(&[], || {
        let fixture = Fixture::new();
        let first = train::run(&fixture.config(), &fixture.workbook);
        let second = train::run(&fixture.config(), &fixture.workbook);
        assert_eq!(first.exit_code, 0, "expected successful training: {}", first.output);

        let first = parse_payload(&first.output);
        let second = parse_payload(&second.output);
        assert_eq!(first["command"], "train");
        assert_eq!(first["data"]["report"], second["data"]["report"]);
        assert_eq!(first["data"]["report"]["labelled_rows"], 12);
        assert_eq!(first["data"]["report"]["returned_rows"], 2);
        assert!(fixture.artifact_dir().join("classifier.json").exists());
    });
}

#[test]
fn train_with_too_few_rows_reports_insufficient_data() {
    with_env(&[("ORDERLENS_CLASSIFIER_MIN_TRAINING_ROWS", "50")], || {
        let fixture = Fixture::new();
        let config = AppConfig::load(fixture.load_options()).expect("config loads");
        let result = train::run(&config, &fixture.workbook);

        assert_eq!(result.exit_code, 5);
        assert_eq!(parse_payload(&result.output)["error_class"], "insufficient_data");
        assert!(!fixture.artifact_dir().join("classifier.json").exists());
    });
}

#[test]
fn analytics_conversion_report_covers_requested_range() {
    with_env(&[], || {
        let fixture = Fixture::new();
        let request = AnalyticsRequest {
            report: ReportKind::Conversion,
            from: Some(date("2024-01-01")),
            to: Some(date("2024-01-04")),
            rank_by: RankBy::AdFees,
            limit: None,
        };
        let result = analytics::run(&fixture.config(), &fixture.workbook, &request);
        assert_eq!(result.exit_code, 0, "expected analytics success: {}", result.output);

        let payload = parse_payload(&result.output);
        let report = &payload["data"]["report"];
        assert_eq!(report["daily_series"].as_array().map(Vec::len), Some(4));
        assert_eq!(report["total_clicks"], 40);
        assert_eq!(report["trend"], "up");
    });
}

#[test]
fn analytics_top_products_respects_limit_and_ranking() {
    with_env(&[], || {
        let fixture = Fixture::new();
        let request = AnalyticsRequest {
            report: ReportKind::TopProducts,
            from: None,
            to: None,
            rank_by: RankBy::AdFees,
            limit: Some(3),
        };
        let result = analytics::run(&fixture.config(), &fixture.workbook, &request);
        assert_eq!(result.exit_code, 0, "expected analytics success: {}", result.output);

        let payload = parse_payload(&result.output);
        let products = payload["data"]["report"].as_array().cloned().unwrap_or_default();
        assert_eq!(products.len(), 3);
        assert_eq!(products[0]["product_id"], "B012");
    });
}

#[test]
fn analytics_out_of_bounds_range_is_rejected() {
    with_env(&[], || {
        let fixture = Fixture::new();
        let request = AnalyticsRequest {
            report: ReportKind::Devices,
            from: Some(date("2023-12-01")),
            to: Some(date("2024-01-03")),
            rank_by: RankBy::AdFees,
            limit: None,
        };
        let result = analytics::run(&fixture.config(), &fixture.workbook, &request);

        assert_eq!(result.exit_code, 4);
        assert_eq!(parse_payload(&result.output)["error_class"], "analytics");
    });
}

#[test]
fn recommend_trains_then_reuses_stored_classifier() {
    with_env(&[], || {
        let fixture = Fixture::new();
        let candidates = fixture.candidates(&[
            ("c1", "Kindle Paperwhite"),
            ("c2", "Knockoff Earbuds"),
            ("c3", "Yoga Mat"),
            ("c3", "Yoga Mat Duplicate"),
        ]);

        let first = recommend::run(&fixture.config(), &fixture.workbook, &candidates, Some(7));
        assert_eq!(first.exit_code, 0, "expected recommend success: {}", first.output);
        let first = parse_payload(&first.output);
        assert_eq!(first["data"]["artifact_source"], "trained");
        assert_eq!(first["data"]["received"], 4);

        let second = recommend::run(&fixture.config(), &fixture.workbook, &candidates, Some(7));
        let second = parse_payload(&second.output);
        assert_eq!(second["data"]["artifact_source"], "store");
        assert_eq!(first["data"]["recommendations"], second["data"]["recommendations"]);

        let kept = first["data"]["recommendations"].as_array().cloned().unwrap_or_default();
        assert!(kept.len() <= 3);
        assert!(kept.iter().all(|item| item["name"] != "Yoga Mat Duplicate"));
    });
}

#[test]
fn recommend_rejects_malformed_candidate_feed() {
    with_env(&[], || {
        let fixture = Fixture::new();
        let feed = fixture.dir.path().join("feed.json");
        fs::write(&feed, "{not json").expect("write feed");

        let result = recommend::run(&fixture.config(), &fixture.workbook, &feed, None);
        assert_eq!(result.exit_code, 7);
        assert_eq!(parse_payload(&result.output)["error_class"], "input_io");
    });
}

#[test]
fn config_reports_sources() {
    with_env(&[("ORDERLENS_ANALYTICS_TOP_N", "5")], || {
        let options = LoadOptions {
            overrides: ConfigOverrides {
                artifact_dir: Some(PathBuf::from("/tmp/orderlens-test")),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        };
        let result = config::run(&options);
        assert_eq!(result.exit_code, 0);

        let payload = parse_payload(&result.output);
        let entries = payload["data"].as_array().cloned().unwrap_or_default();
        let source_of = |key: &str| {
            entries
                .iter()
                .find(|entry| entry["key"] == key)
                .and_then(|entry| entry["source"].as_str().map(str::to_string))
                .unwrap_or_default()
        };
        assert_eq!(source_of("analytics.top_n"), "env (ORDERLENS_ANALYTICS_TOP_N)");
        assert_eq!(source_of("storage.artifact_dir"), "flag (--artifact-dir)");
        assert_eq!(source_of("classifier.epochs"), "default");
    });
}

#[test]
fn config_returns_failure_for_invalid_env() {
    with_env(&[("ORDERLENS_CLASSIFIER_TEST_FRACTION", "1.5")], || {
        let result = config::run(&LoadOptions::default());
        assert_eq!(result.exit_code, 2, "expected config validation failure code");

        let payload = parse_payload(&result.output);
        assert_eq!(payload["command"], "config");
        assert_eq!(payload["status"], "error");
        assert_eq!(payload["error_class"], "config_validation");
    });
}

#[test]
fn log_filter_prefers_rust_log_over_configured_level() {
    with_env(&[], || {
        let mut config = AppConfig::default();
        config.logging.level = "warn".to_string();
        assert_eq!(log_filter(&config).to_string(), "warn");
    });

    with_env(&[("RUST_LOG", "orderlens_core=debug")], || {
        let config = AppConfig::default();
        assert_eq!(log_filter(&config).to_string(), "orderlens_core=debug");
    });
}

struct Fixture {
    dir: TempDir,
    workbook: PathBuf,
}

impl Fixture {
    fn new() -> Self {
        let dir = tempfile::tempdir().expect("tempdir");
        let workbook = dir.path().join("export.xlsx");
        write_export(&workbook);
        Self { dir, workbook }
    }

    fn artifact_dir(&self) -> PathBuf {
        self.dir.path().join("artifacts")
    }

    fn load_options(&self) -> LoadOptions {
        LoadOptions {
            overrides: ConfigOverrides {
                artifact_dir: Some(self.artifact_dir()),
                ..ConfigOverrides::default()
            },
            ..LoadOptions::default()
        }
    }

    fn config(&self) -> AppConfig {
        AppConfig::load(self.load_options()).expect("config loads")
    }

    fn candidates(&self, items: &[(&str, &str)]) -> PathBuf {
        let feed: Vec<Value> = items
            .iter()
            .map(|(id, name)| serde_json::json!({ "id": id, "name": name, "price": "19.99" }))
            .collect();
        let path = self.dir.path().join("candidates.json");
        fs::write(&path, serde_json::to_vec(&feed).expect("encode feed")).expect("write feed");
        path
    }
}

const PRODUCTS: [(&str, &str, u32); 12] = [
    ("Knockoff Earbuds Cheap", "Electronics", 1),
    ("Flimsy Knockoff Phone Case", "Electronics", 1),
    ("Kindle Paperwhite", "Books", 0),
    ("Echo Dot Smart Speaker", "Electronics", 0),
    ("USB C Cable Braided", "Electronics", 0),
    ("Laptop Stand Aluminium", "Office", 0),
    ("Stainless Steel Water Bottle", "Home", 0),
    ("Mechanical Keyboard", "Office", 0),
    ("Noise Cancelling Headphones", "Electronics", 0),
    ("Yoga Mat", "Sports", 0),
    ("Coffee Grinder", "Home", 0),
    ("Desk Lamp LED", "Home", 0),
];

/// Twelve products shipped one per day from 2024-01-01, revenue 5×day and ad fees 1×day.
fn write_export(path: &Path) {
    let mut book = Workbook::new();

    let earnings = book.add_worksheet();
    earnings.set_name("Fee-Earnings").expect("sheet name");
    earnings.write_string(0, 0, "Fee Earnings 01-01-2024 to 01-12-2024").expect("title");
    write_row(
        earnings,
        1,
        &[
            "Category",
            "Name",
            "ASIN",
            "Seller",
            "Tracking ID",
            "Date Shipped",
            "Price($)",
            "Items Shipped",
            "Returns",
            "Revenue($)",
            "Ad Fees($)",
            "Device Type Group",
        ],
    );
    for (index, (name, category, returns)) in PRODUCTS.iter().enumerate() {
        let day = index as u32 + 1;
        let row = [
            category.to_string(),
            name.to_string(),
            format!("B{day:03}"),
            "Amazon".to_string(),
            "tag-21".to_string(),
            format!("2024-01-{day:02}"),
            "5".to_string(),
            day.to_string(),
            returns.to_string(),
            (5 * day).to_string(),
            day.to_string(),
            if day % 2 == 0 { "PHONE" } else { "DESKTOP" }.to_string(),
        ];
        let cells: Vec<&str> = row.iter().map(String::as_str).collect();
        write_row(earnings, day + 1, &cells);
    }

    let orders = book.add_worksheet();
    orders.set_name("Fee-Orders").expect("sheet name");
    orders.write_string(0, 0, "Fee Orders").expect("title");
    write_row(
        orders,
        1,
        &["Category", "Name", "ASIN", "Seller", "Tracking ID", "Date", "Price($)", "Qty", "Link Type", "Direct Sale"],
    );
    write_row(
        orders,
        2,
        &["Books", "Kindle Paperwhite", "B003", "Amazon", "tag-21", "2024-01-03", "5", "4", "Image", "Yes"],
    );

    let trends = book.add_worksheet();
    trends.set_name("Fee-DailyTrends").expect("sheet name");
    trends.write_string(0, 0, "Fee Daily Trends").expect("title");
    write_row(trends, 1, &["Date", "Clicks", "Total Items Ordered", "Conversion"]);
    write_row(trends, 2, &["2024-01-01", "10", "1", "10%"]);
    write_row(trends, 3, &["2024-01-02", "10", "1", "10%"]);
    write_row(trends, 4, &["2024-01-03", "10", "5", "50%"]);
    write_row(trends, 5, &["2024-01-04", "10", "5", "50%"]);

    let tracking = book.add_worksheet();
    tracking.set_name("Fee-Tracking").expect("sheet name");
    tracking.write_string(0, 0, "Fee Tracking").expect("title");
    write_row(
        tracking,
        1,
        &["Tracking ID", "Clicks", "Items Ordered", "Items Shipped", "Revenue($)", "Ad Fees($)"],
    );
    write_row(tracking, 2, &["tag-21", "40", "12", "78", "390", "78"]);

    let link_types = book.add_worksheet();
    link_types.set_name("Fee-LinkType").expect("sheet name");
    link_types.write_string(0, 0, "Fee Link Type").expect("title");
    write_row(
        link_types,
        1,
        &["Link Type", "Clicks", "Items Ordered", "Conversion", "Ordered Revenue($)", "Items Shipped", "Ad Fees($)"],
    );
    write_row(link_types, 2, &["Image", "40", "12", "30%", "390", "78", "78"]);

    book.save(path).expect("save workbook");
}

fn write_row(sheet: &mut rust_xlsxwriter::Worksheet, row: u32, cells: &[&str]) {
    for (col, value) in cells.iter().enumerate() {
        sheet.write_string(row, col as u16, *value).expect("write cell");
    }
}

fn date(value: &str) -> chrono::NaiveDate {
    value.parse().expect("valid date")
}

fn parse_payload(output: &str) -> Value {
    serde_json::from_str(output).expect("command output should be valid JSON")
}

fn with_env(vars: &[(&str, &str)], test_fn: impl FnOnce()) {
    static ENV_LOCK: OnceLock<Mutex<()>> = OnceLock::new();
    let _guard =
        ENV_LOCK.get_or_init(|| Mutex::new(())).lock().expect("env mutex should not be poisoned");

    let keys = [
        "ORDERLENS_STORAGE_ARTIFACT_DIR",
        "ORDERLENS_CLASSIFIER_MIN_TRAINING_ROWS",
        "ORDERLENS_CLASSIFIER_TEST_FRACTION",
        "ORDERLENS_CLASSIFIER_SPLIT_SEED",
        "ORDERLENS_CLASSIFIER_LEARNING_RATE",
        "ORDERLENS_CLASSIFIER_EPOCHS",
        "ORDERLENS_CLASSIFIER_L2_PENALTY",
        "ORDERLENS_ANALYTICS_TREND_EPSILON",
        "ORDERLENS_ANALYTICS_TOP_N",
        "ORDERLENS_ANALYTICS_DEFAULT_WINDOW_DAYS",
        "ORDERLENS_RECOMMENDATIONS_SHUFFLE_SEED",
        "ORDERLENS_LOGGING_LEVEL",
        "ORDERLENS_LOGGING_FORMAT",
        "ORDERLENS_LOG_LEVEL",
        "ORDERLENS_LOG_FORMAT",
        "RUST_LOG",
    ];

    let previous_values: Vec<(&str, Option<String>)> =
        keys.iter().map(|key| (*key, env::var(key).ok())).collect();

    for key in &keys {
        env::remove_var(key);
    }
    for (key, value) in vars {
        env::set_var(key, value);
    }

    test_fn();

    for (key, value) in previous_values {
        if let Some(value) = value {
            env::set_var(key, value);
        } else {
            env::remove_var(key);
        }
    }
}
