use espmon::core::config::{ConnectionConfig, SUPPORTED_BAUD_RATES};
use espmon::core::telemetry::SerialSource;
use espmon::MonitorError;
use std::io::Write;
use std::time::Duration;
use tempfile::TempDir;

#[test]
fn test_supported_baud_rates() {
    for rate in SUPPORTED_BAUD_RATES {
        let config = ConnectionConfig::new("/dev/ttyUSB0", rate);
        assert!(config.is_supported_baud_rate());
        assert!(config.validate().is_ok());
    }
}

#[test]
fn test_invalid_config_never_opens_port() {
    let config = ConnectionConfig::new("", 115_200);
    assert!(matches!(
        SerialSource::open(&config),
        Err(MonitorError::Config(_))
    ));

    let config = ConnectionConfig::new("/dev/ttyUSB0", 0);
    assert!(matches!(config.validate(), Err(MonitorError::Config(_))));
}

#[test]
fn test_config_from_json() {
    let config: ConnectionConfig =
        serde_json::from_str(r#"{"port":"COM4","baud_rate":9600,"read_timeout":750}"#).unwrap();
    assert_eq!(config.port, "COM4");
    assert_eq!(config.baud_rate, 9600);
    assert_eq!(config.read_timeout, Duration::from_millis(750));
}

#[test]
fn test_log_file_appends() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("espmon.log");

    writeln!(espmon::open_log_file(&path).unwrap(), "one").unwrap();
    writeln!(espmon::open_log_file(&path).unwrap(), "two").unwrap();

    assert_eq!(std::fs::read_to_string(&path).unwrap(), "one\ntwo\n");
}
