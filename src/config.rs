use crate::error::{CalError, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use std::time::Duration;

/// Settings of one calibration run
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalConfig {
    /// Device ports to characterise
    pub device_ports: usize,
    /// Instrument channels used at most, extra channels are ignored
    pub max_instrument_ports: usize,
    pub stability_timeout_s: f64,
    pub stability_poll_ms: u64,
    pub coefficient_class: String,
    pub coefficient_comments: Vec<String>,
    pub touchstone_comments: Vec<String>,
    pub vendor: VendorConfig,
}

impl Default for CalConfig {
    fn default() -> Self {
        CalConfig {
            device_ports: 4,
            max_instrument_ports: 4,
            stability_timeout_s: 180.0,
            stability_poll_ms: 100,
            coefficient_class: String::from("FACTORY"),
            coefficient_comments: vec![],
            touchstone_comments: vec![],
            vendor: VendorConfig::default(),
        }
    }
}

impl CalConfig {
    pub fn from_json(json: &str) -> Result<CalConfig> {
        let config: CalConfig = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<CalConfig> {
        CalConfig::from_json(&fs::read_to_string(path)?)
    }

    pub fn validate(&self) -> Result<()> {
        if !(2..=4).contains(&self.device_ports) {
            return Err(CalError::InvalidConfig(format!(
                "device_ports must be 2 to 4, got {}",
                self.device_ports
            )));
        }
        if self.max_instrument_ports < 2 {
            return Err(CalError::InsufficientPorts(self.max_instrument_ports));
        }
        if Duration::try_from_secs_f64(self.stability_timeout_s).is_err() {
            return Err(CalError::InvalidConfig(format!(
                "stability_timeout_s must be a non-negative duration, got {}",
                self.stability_timeout_s
            )));
        }
        Ok(())
    }

    pub fn stability_timeout(&self) -> Duration {
        Duration::try_from_secs_f64(self.stability_timeout_s).unwrap_or(Duration::MAX)
    }

    pub fn stability_poll(&self) -> Duration {
        Duration::from_millis(self.stability_poll_ms)
    }
}

/// Fields of the vendor calibration-module bundle
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct VendorConfig {
    pub vendor: String,
    pub product: String,
    pub serial: String,
    pub connector: String,
    pub module: String,
    /// Two header bytes of unverified meaning (port-count hint)
    pub flags: [u8; 2],
    /// Repeat the through columns as a confidence block
    pub confidence_block: bool,
    /// Written as `!` comment lines at the top of the CSV
    pub info_lines: Vec<String>,
    /// Calibration date, today (UTC) when unset
    pub date: Option<NaiveDate>,
}

impl Default for VendorConfig {
    fn default() -> Self {
        VendorConfig {
            vendor: String::from("LibreCAL"),
            product: String::from("LibreCAL"),
            serial: String::new(),
            connector: String::from("SMA"),
            module: String::from("Factory"),
            flags: [0, 0],
            confidence_block: true,
            info_lines: vec![],
            date: None,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn defaults() {
        let config = CalConfig::from_json("{}").unwrap();
        assert_eq!(config, CalConfig::default());
        assert_eq!(config.stability_timeout(), Duration::from_secs(180));
        assert_eq!(config.stability_poll(), Duration::from_millis(100));
        assert_eq!(config.vendor.connector, "SMA");
    }

    #[test]
    fn partial_override() {
        let config = CalConfig::from_json(
            r#"{
                "max_instrument_ports": 2,
                "stability_timeout_s": 0.5,
                "vendor": { "serial": "208A3A4B", "flags": [1, 4], "date": "2025-03-01" }
            }"#,
        )
        .unwrap();
        assert_eq!(config.max_instrument_ports, 2);
        assert_eq!(config.device_ports, 4);
        assert_eq!(config.vendor.serial, "208A3A4B");
        assert_eq!(config.vendor.flags, [1, 4]);
        assert_eq!(config.vendor.product, "LibreCAL");
        assert_eq!(config.vendor.date, NaiveDate::from_ymd_opt(2025, 3, 1));
    }

    #[test]
    fn rejects_invalid() {
        assert!(matches!(
            CalConfig::from_json(r#"{"max_instrument_ports": 1}"#),
            Err(CalError::InsufficientPorts(1))
        ));
        assert!(matches!(
            CalConfig::from_json(r#"{"device_ports": 6}"#),
            Err(CalError::InvalidConfig(_))
        ));
        assert!(matches!(
            CalConfig::from_json(r#"{"stability_timeout_s": -1}"#),
            Err(CalError::InvalidConfig(_))
        ));
        // finite but beyond what a Duration holds
        assert!(matches!(
            CalConfig::from_json(r#"{"stability_timeout_s": 1e30}"#),
            Err(CalError::InvalidConfig(_))
        ));
        let config = CalConfig {
            stability_timeout_s: 1e30,
            ..CalConfig::default()
        };
        assert_eq!(config.stability_timeout(), Duration::MAX);
        assert!(matches!(
            CalConfig::from_json("not json"),
            Err(CalError::Json(_))
        ));
    }
}
