//! Configuration for an Aerolink endpoint.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::transport::RadioConfig;

/// Main configuration structure.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LinkConfig {
    /// Identifier this endpoint stamps into outbound headers (0-15).
    #[serde(default)]
    pub local_id: u8,

    /// Identifier of the peer endpoint (0-15).
    #[serde(default = "default_remote_id")]
    pub remote_id: u8,

    /// Retry attempts before a command gives up.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Per-command retransmission period.
    #[serde(default = "default_retry_interval", with = "humantime_serde")]
    pub retry_interval: Duration,

    /// Ring buffer depth for retained telemetry records.
    #[serde(default = "default_telemetry_capacity")]
    pub telemetry_buffer_capacity: usize,

    /// Minimum interval between diagnostics callback deliveries.
    #[serde(default = "default_diagnostics_interval", with = "humantime_serde")]
    pub diagnostics_interval: Duration,

    /// Radio module parameters, passed through to the driver.
    #[serde(default)]
    pub radio: RadioConfig,
}

fn default_remote_id() -> u8 {
    1
}
fn default_max_retries() -> u32 {
    5
}
fn default_retry_interval() -> Duration {
    Duration::from_millis(500)
}
fn default_telemetry_capacity() -> usize {
    100
}
fn default_diagnostics_interval() -> Duration {
    Duration::from_secs(1)
}

impl Default for LinkConfig {
    fn default() -> Self {
        Self {
            local_id: 0,
            remote_id: default_remote_id(),
            max_retries: default_max_retries(),
            retry_interval: default_retry_interval(),
            telemetry_buffer_capacity: default_telemetry_capacity(),
            diagnostics_interval: default_diagnostics_interval(),
            radio: RadioConfig::default(),
        }
    }
}

impl LinkConfig {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref())
            .map_err(|e| Error::Config(format!("failed to read config: {e}")))?;

        let config: Self = toml::from_str(&content)
            .map_err(|e| Error::Config(format!("failed to parse config: {e}")))?;

        config.validate()?;
        Ok(config)
    }

    /// Save configuration to a TOML file.
    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| Error::Config(format!("failed to serialize config: {e}")))?;

        std::fs::write(path.as_ref(), content)
            .map_err(|e| Error::Config(format!("failed to write config: {e}")))?;

        Ok(())
    }

    /// Validate configuration.
    pub fn validate(&self) -> Result<()> {
        if self.local_id > 0x0F || self.remote_id > 0x0F {
            return Err(Error::InvalidConfig(
                "station identifiers must fit in 4 bits".into(),
            ));
        }
        if self.local_id == self.remote_id {
            return Err(Error::InvalidConfig(
                "local and remote identifiers must differ".into(),
            ));
        }
        if self.retry_interval.is_zero() {
            return Err(Error::InvalidConfig(
                "retry interval must be non-zero".into(),
            ));
        }
        if self.telemetry_buffer_capacity == 0 {
            return Err(Error::InvalidConfig(
                "telemetry buffer capacity must be non-zero".into(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        let config = LinkConfig::default();
        config.validate().unwrap();
        assert_eq!(config.max_retries, 5);
        assert_eq!(config.retry_interval, Duration::from_millis(500));
        assert_eq!(config.telemetry_buffer_capacity, 100);
    }

    #[test]
    fn rejects_wide_station_id() {
        let config = LinkConfig {
            local_id: 16,
            ..LinkConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_identical_ids() {
        let config = LinkConfig {
            local_id: 1,
            remote_id: 1,
            ..LinkConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn rejects_zero_retry_interval() {
        let config = LinkConfig {
            retry_interval: Duration::ZERO,
            ..LinkConfig::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn toml_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("link.toml");

        let mut config = LinkConfig::default();
        config.local_id = 2;
        config.retry_interval = Duration::from_millis(250);
        config.radio.baud_rate = 115_200;
        config.save(&path).unwrap();

        let loaded = LinkConfig::load(&path).unwrap();
        assert_eq!(loaded.local_id, 2);
        assert_eq!(loaded.retry_interval, Duration::from_millis(250));
        assert_eq!(loaded.radio.baud_rate, 115_200);
    }

    #[test]
    fn parses_sparse_toml() {
        let config: LinkConfig = toml::from_str("local_id = 3\nremote_id = 4\n").unwrap();
        assert_eq!(config.local_id, 3);
        assert_eq!(config.max_retries, 5);
    }
}
