use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::error::{MonitorError, Result};

/// Baud rates the device firmware is normally flashed with.
pub const SUPPORTED_BAUD_RATES: [u32; 3] = [9600, 115_200, 230_400];

pub const DEFAULT_BAUD_RATE: u32 = 115_200;

/// Bound on a single blocking read; the reader re-checks its stop flag at
/// least this often.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(2);

/// Connection parameters supplied at session start.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionConfig {
    pub port: String,
    pub baud_rate: u32,
    #[serde(with = "duration_millis")]
    pub read_timeout: Duration,
}

impl Default for ConnectionConfig {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: DEFAULT_BAUD_RATE,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }
}

impl ConnectionConfig {
    pub fn new<S: Into<String>>(port: S, baud_rate: u32) -> Self {
        Self {
            port: port.into(),
            baud_rate,
            ..Default::default()
        }
    }

    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// Check the parameters before a port is opened.
    ///
    /// Unusual baud rates are allowed (custom firmware builds exist) but logged.
    pub fn validate(&self) -> Result<()> {
        if self.port.trim().is_empty() {
            return Err(MonitorError::config("No serial port selected"));
        }

        if self.baud_rate == 0 {
            return Err(MonitorError::config("Baud rate must be greater than zero"));
        }

        if self.read_timeout.is_zero() {
            return Err(MonitorError::config("Read timeout must be greater than zero"));
        }

        if !self.is_supported_baud_rate() {
            log::warn!(
                "Baud rate {} is not one of the usual rates {:?}",
                self.baud_rate,
                SUPPORTED_BAUD_RATES
            );
        }

        Ok(())
    }

    pub fn is_supported_baud_rate(&self) -> bool {
        SUPPORTED_BAUD_RATES.contains(&self.baud_rate)
    }
}

mod duration_millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = ConnectionConfig::default();
        assert!(config.port.is_empty());
        assert_eq!(config.baud_rate, 115_200);
        assert_eq!(config.read_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_validate_requires_port() {
        let config = ConnectionConfig::default();
        assert!(matches!(config.validate(), Err(MonitorError::Config(_))));

        let config = ConnectionConfig::new("   ", 9600);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_timeout() {
        let config = ConnectionConfig::new("/dev/ttyUSB0", 115_200).with_read_timeout(Duration::ZERO);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_unusual_baud_rate_is_allowed() {
        let config = ConnectionConfig::new("/dev/ttyUSB0", 57_600);
        assert!(!config.is_supported_baud_rate());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_serializes_timeout_as_millis() {
        let config = ConnectionConfig::new("COM3", 230_400)
            .with_read_timeout(Duration::from_millis(250));
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["read_timeout"], 250);

        let back: ConnectionConfig = serde_json::from_value(json).unwrap();
        assert_eq!(back, config);
    }
}
