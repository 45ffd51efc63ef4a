use std::fs;
use std::time::Duration;

use assert_matches::assert_matches;
use camino::Utf8PathBuf;

use osh_collector::config::{ConfigLoader, ResolvedConfig};
use osh_collector::error::CollectorError;

#[test]
fn load_partial_config_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = Utf8PathBuf::from_path_buf(dir.path().join("osh-collector.json")).unwrap();
    fs::write(
        path.as_std_path(),
        r#"{ "input": "links/osf.txt", "request_interval_ms": 500, "max_retries": 1 }"#,
    )
    .unwrap();

    let resolved = ConfigLoader::resolve(Some(path.as_path())).unwrap();
    assert_eq!(resolved.input, Utf8PathBuf::from("links/osf.txt"));
    assert_eq!(resolved.request_interval, Duration::from_millis(500));
    assert_eq!(resolved.retry.max_retries, 1);
    assert_eq!(resolved.output, ResolvedConfig::default().output);
}

#[test]
fn explicit_missing_config_is_an_error() {
    let path = Utf8PathBuf::from("/nonexistent/osh-collector.json");
    let err = ConfigLoader::resolve(Some(path.as_path())).unwrap_err();
    assert_matches!(err, CollectorError::ConfigRead(_));
}

#[test]
fn unknown_keys_are_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let path = Utf8PathBuf::from_path_buf(dir.path().join("config.json")).unwrap();
    fs::write(path.as_std_path(), r#"{ "delay": 5 }"#).unwrap();

    let err = ConfigLoader::resolve(Some(path.as_path())).unwrap_err();
    assert_matches!(err, CollectorError::ConfigParse(_));
}
