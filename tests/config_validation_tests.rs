//! Configuration loading and validation tests

use std::io::Write;
use watchpost::config::{ConfigError, SourceKind, WatchConfig};

fn write_config(contents: &str) -> (tempfile::TempDir, std::path::PathBuf) {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = dir.path().join("watchpost.toml");
    let mut file = std::fs::File::create(&path).expect("create");
    file.write_all(contents.as_bytes()).expect("write");
    (dir, path)
}

#[test]
fn full_config_round_trips() {
    let toml = r#"
        [source]
        kind = "mjpeg"
        url = "http://camera.local/stream"
        dir = "frames"
        width = 1280
        height = 720
        target_fps = 25

        [detection]
        labels = ["Gun", "Knife", "Rifle"]
        min_confidence = 90.0
        interval_ms = 500
        endpoint = "http://detector.internal:9090"
        api_key = "secret"

        [alert]
        cooldown_secs = 60
        endpoint = "https://api.twilio.com"
        account_sid = "AC123"
        auth_token = "tok"
        from_number = "+15550199"
        to_number = "+15550100"
        payload_url = "http://example.com/voice.xml"

        [recording]
        enabled = true
        threat_only = false
        dir = "evidence"
        max_segment_secs = 120
        jpeg_quality = 90
        log_file = "audit.csv"

        [display]
        mode = "none"
        status_every_n_ticks = 60
    "#;
    let (_dir, path) = write_config(toml);
    let cfg = WatchConfig::load_from_file(&path).expect("load");

    assert_eq!(cfg.source.kind, SourceKind::Mjpeg);
    assert_eq!(cfg.source.target_fps, 25);
    assert_eq!(cfg.detection.labels.len(), 3);
    assert!((cfg.detection.min_confidence - 90.0).abs() < f64::EPSILON);
    assert_eq!(cfg.alert.cooldown_secs, 60);
    assert!(!cfg.recording.threat_only);
    assert_eq!(cfg.recording.max_segment_secs, 120);
}

#[test]
fn missing_file_is_an_io_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let result = WatchConfig::load_from_file(&dir.path().join("nope.toml"));
    assert!(matches!(result, Err(ConfigError::Io(_, _))));
}

#[test]
fn malformed_toml_is_a_parse_error() {
    let (_dir, path) = write_config("this is not toml [");
    let result = WatchConfig::load_from_file(&path);
    assert!(matches!(result, Err(ConfigError::Parse(_, _))));
}

#[test]
fn out_of_range_values_rejected_at_load() {
    let (_dir, path) = write_config(
        r#"
        [detection]
        labels = ["Gun"]
        min_confidence = 150.0
        interval_ms = 300
        endpoint = "http://localhost:9090"
        api_key = ""
    "#,
    );
    let result = WatchConfig::load_from_file(&path);
    assert!(matches!(result, Err(ConfigError::Invalid(_))));
}

#[test]
fn zero_segment_duration_rejected() {
    let (_dir, path) = write_config(
        r#"
        [recording]
        enabled = true
        threat_only = true
        dir = "recordings"
        max_segment_secs = 0
        jpeg_quality = 80
        log_file = "audit.csv"
    "#,
    );
    let result = WatchConfig::load_from_file(&path);
    assert!(matches!(result, Err(ConfigError::Invalid(_))));
}

#[test]
fn kebab_case_source_kinds_parse() {
    let (_dir, path) = write_config(
        r#"
        [source]
        kind = "image-dir"
        url = ""
        dir = "stills"
        width = 640
        height = 480
        target_fps = 10
    "#,
    );
    let cfg = WatchConfig::load_from_file(&path).expect("load");
    assert_eq!(cfg.source.kind, SourceKind::ImageDir);
}
