//! Integration test: CSV loading, saving, and splitting

use demandcast::data::{train_test_split, DataLoader, DataSaver, SplitConfig};
use polars::prelude::*;
use std::collections::HashSet;
use std::io::Write;

fn sample_df(n: usize) -> DataFrame {
    let ids: Vec<i64> = (0..n as i64).collect();
    let vals: Vec<f64> = (0..n).map(|i| i as f64 * 1.5).collect();
    let labels: Vec<String> = (0..n).map(|i| format!("row_{}", i)).collect();
    df!("id" => ids, "val" => vals, "label" => labels).unwrap()
}

#[test]
fn test_load_csv_infers_schema() {
    let mut tmp = tempfile::NamedTempFile::with_suffix(".csv").unwrap();
    writeln!(tmp, "a,b,c").unwrap();
    writeln!(tmp, "1,2.5,hello").unwrap();
    writeln!(tmp, "2,3.5,world").unwrap();
    tmp.flush().unwrap();

    let df = DataLoader::new().load(tmp.path()).unwrap();
    assert_eq!(df.height(), 2);
    assert_eq!(df.width(), 3);
    assert_eq!(df.column("b").unwrap().dtype(), &DataType::Float64);
    assert_eq!(df.column("c").unwrap().dtype(), &DataType::String);
}

#[test]
fn test_load_treats_empty_fields_as_missing() {
    let mut tmp = tempfile::NamedTempFile::with_suffix(".csv").unwrap();
    writeln!(tmp, "a,b").unwrap();
    writeln!(tmp, "1,2.0").unwrap();
    writeln!(tmp, "2,").unwrap();
    tmp.flush().unwrap();

    let df = DataLoader::new().load(tmp.path()).unwrap();
    assert_eq!(df.column("b").unwrap().null_count(), 1);
}

#[test]
fn test_load_rejects_missing_file() {
    let result = DataLoader::new().load("/nonexistent/path/data.csv");
    assert!(result.is_err());
}

#[test]
fn test_load_rejects_non_csv_extension() {
    let mut tmp = tempfile::NamedTempFile::with_suffix(".parquet").unwrap();
    writeln!(tmp, "a,b").unwrap();
    tmp.flush().unwrap();

    assert!(DataLoader::new().load(tmp.path()).is_err());
}

#[test]
fn test_save_round_trip_preserves_shape() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("out.csv");

    let df = sample_df(25);
    DataSaver::save_csv(&df, &path).unwrap();
    assert!(path.exists(), "save_csv should create parent directories");

    let loaded = DataLoader::new().load(&path).unwrap();
    assert_eq!(loaded.height(), 25);
    assert_eq!(loaded.get_column_names(), df.get_column_names());
}

#[test]
fn test_file_info_reports_shape() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("info.csv");
    DataSaver::save_csv(&sample_df(12), &path).unwrap();

    let info = DataLoader::new().file_info(&path).unwrap();
    assert_eq!(info.n_rows, 12);
    assert_eq!(info.n_cols, 3);
    assert!(info.file_size > 0);
    assert_eq!(info.columns, vec!["id", "val", "label"]);
}

#[test]
fn test_split_is_disjoint_and_complete() {
    let df = sample_df(40);
    let (train, test) = train_test_split(&df, &SplitConfig::new(0.25, 5)).unwrap();

    assert_eq!(test.height(), 10);
    assert_eq!(train.height(), 30);

    let ids = |frame: &DataFrame| -> HashSet<i64> {
        frame
            .column("id")
            .unwrap()
            .i64()
            .unwrap()
            .into_iter()
            .flatten()
            .collect()
    };
    let train_ids = ids(&train);
    let test_ids = ids(&test);

    assert!(train_ids.is_disjoint(&test_ids));
    assert_eq!(train_ids.len() + test_ids.len(), 40);
}

#[test]
fn test_split_seed_controls_assignment() {
    let df = sample_df(60);

    let (_, test_a) = train_test_split(&df, &SplitConfig::new(0.2, 1)).unwrap();
    let (_, test_b) = train_test_split(&df, &SplitConfig::new(0.2, 1)).unwrap();
    let (_, test_c) = train_test_split(&df, &SplitConfig::new(0.2, 2)).unwrap();

    let ids = |frame: &DataFrame| -> Vec<i64> {
        frame
            .column("id")
            .unwrap()
            .i64()
            .unwrap()
            .into_iter()
            .flatten()
            .collect()
    };

    assert_eq!(ids(&test_a), ids(&test_b), "same seed must reproduce the split");
    assert_ne!(ids(&test_a), ids(&test_c), "different seeds should differ");
}

#[test]
fn test_unshuffled_split_takes_leading_rows_as_test() {
    let df = sample_df(10);
    let config = SplitConfig {
        test_fraction: 0.3,
        seed: 0,
        shuffle: false,
    };
    let (train, test) = train_test_split(&df, &config).unwrap();

    let test_ids: Vec<i64> = test
        .column("id")
        .unwrap()
        .i64()
        .unwrap()
        .into_iter()
        .flatten()
        .collect();
    assert_eq!(test_ids, vec![0, 1, 2]);
    assert_eq!(train.height(), 7);
}
