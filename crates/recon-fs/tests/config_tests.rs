use pretty_assertions::assert_eq;
use recon_fs::{ConfigStore, Error, NormalizedPath};
use serde::{Deserialize, Serialize};
use std::fs;
use tempfile::TempDir;

#[derive(Debug, Serialize, Deserialize, PartialEq)]
struct Limits {
    concurrency: usize,
    timeout_ms: u64,
}

#[test]
fn test_load_toml() {
    let temp = TempDir::new().unwrap();
    let file_path = temp.path().join("config.toml");
    fs::write(&file_path, "concurrency = 4\ntimeout_ms = 5000\n").unwrap();

    let limits: Limits = ConfigStore::new().load(&NormalizedPath::new(&file_path)).unwrap();
    assert_eq!(limits, Limits { concurrency: 4, timeout_ms: 5000 });
}

#[test]
fn test_save_then_load_json() {
    let temp = TempDir::new().unwrap();
    let path = NormalizedPath::new(temp.path().join("limits.json"));
    let store = ConfigStore::new();

    store.save(&path, &Limits { concurrency: 2, timeout_ms: 10 }).unwrap();
    let loaded: Limits = store.load(&path).unwrap();

    assert_eq!(loaded, Limits { concurrency: 2, timeout_ms: 10 });
}

#[test]
fn test_save_new_does_not_replace() {
    let temp = TempDir::new().unwrap();
    let path = NormalizedPath::new(temp.path().join("snapshot.json"));
    let store = ConfigStore::new();

    store.save_new(&path, &Limits { concurrency: 1, timeout_ms: 1 }).unwrap();
    let second = store.save_new(&path, &Limits { concurrency: 9, timeout_ms: 9 });

    assert!(matches!(second, Err(Error::AlreadyExists { .. })));
    let kept: Limits = store.load(&path).unwrap();
    assert_eq!(kept.concurrency, 1);
}

#[test]
fn test_unsupported_extension() {
    let store = ConfigStore::new();
    let path = NormalizedPath::new("/tmp/config.yaml");

    let result: Result<Limits, _> = store.parse(&path, "concurrency: 1");
    assert!(matches!(result, Err(Error::UnsupportedFormat { .. })));
}

#[test]
fn test_invalid_toml_reports_format() {
    let store = ConfigStore::new();
    let path = NormalizedPath::new("/tmp/config.toml");

    let err = store.parse::<Limits>(&path, "concurrency = ").unwrap_err();
    match err {
        Error::ConfigParse { format, .. } => assert_eq!(format, "TOML"),
        other => panic!("unexpected error: {other:?}"),
    }
}
