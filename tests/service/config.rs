//! `streaming.toml` handling when opening a service.

use crate::common::*;

#[test]
fn open_writes_default_config() {
    let t = TestService::open();
    let path = t.dir.path().join(CONFIG_FILE_NAME);
    assert!(path.exists());

    let written = StreamingConfig::from_file(&path).unwrap();
    assert_eq!(written, StreamingConfig::default());
    assert_eq!(t.service.config(), &StreamingConfig::default());
}

#[test]
fn open_reads_existing_config() {
    let t = TestService::open_with(Some(
        r#"
capture_close_site = true

[ghost_buster]
enabled = false
poll_interval_ms = 250
alert_name = "LEAKED_PAYLOAD"
"#,
    ));

    let config = t.service.config();
    assert!(config.capture_close_site);
    assert!(!config.ghost_buster.enabled);
    assert_eq!(config.ghost_buster.poll_interval_ms, 250);
    assert_eq!(config.ghost_buster.alert_name, "LEAKED_PAYLOAD");
}

#[test]
fn open_keeps_user_edits() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join(CONFIG_FILE_NAME);
    std::fs::write(&path, "capture_close_site = true\n").unwrap();

    let service = StreamingService::open(dir.path()).unwrap();
    assert!(service.config().capture_close_site);
    assert_eq!(
        std::fs::read_to_string(&path).unwrap(),
        "capture_close_site = true\n"
    );
}

#[test]
fn open_rejects_invalid_config() {
    let dir = tempfile::TempDir::new().unwrap();
    std::fs::write(
        dir.path().join(CONFIG_FILE_NAME),
        "[ghost_buster]\npoll_interval_ms = 0\n",
    )
    .unwrap();

    let result = StreamingService::open(dir.path());
    assert!(matches!(result, Err(StreamingError::InvalidConfig(_))));
}

#[test]
fn open_rejects_malformed_toml() {
    let dir = tempfile::TempDir::new().unwrap();
    std::fs::write(dir.path().join(CONFIG_FILE_NAME), "capture_close_site = [").unwrap();

    assert!(StreamingService::open(dir.path()).is_err());
}

#[test]
fn open_creates_missing_directory() {
    let dir = tempfile::TempDir::new().unwrap();
    let nested = dir.path().join("conf").join("streaming");

    let service = StreamingService::open(&nested).unwrap();
    assert!(nested.join(CONFIG_FILE_NAME).exists());
    assert_eq!(service.state(), LifecycleState::Created);
}
