//! # Configuration Module
//!
//! Handles loading and validating configuration from TOML files.
//!
//! These are the deployment tunables of the tracker. The three flags that the
//! AT console may change at runtime (GNSS precision, payload format, battery
//! check) are not part of this file; they live in the flag store
//! (see [`crate::storage`]).

use serde::de::Error;
use serde::Deserialize;
use std::fs;
use std::path::Path;

use crate::drivers::radio::Region;
use crate::error::{Result, TrackerError};
use crate::payload::NoFixPolicy;

/// Main configuration structure
#[derive(Debug, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub lorawan: LoraWanConfig,
    #[serde(default)]
    pub tracker: TrackerConfig,
    #[serde(default)]
    pub storage: StorageConfig,
    #[serde(default)]
    pub console: ConsoleConfig,
    #[serde(default)]
    pub telemetry: TelemetryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub simulation: SimulationConfig,
}

/// LoRaWAN / P2P link configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoraWanConfig {
    /// `false` selects LoRa P2P mode (no join procedure)
    #[serde(default = "default_lorawan_enabled")]
    pub enabled: bool,

    /// Reporting interval in milliseconds, 0 disables the periodic schedule
    #[serde(default = "default_send_repeat_time_ms")]
    pub send_repeat_time_ms: u64,

    #[serde(default)]
    pub confirmed_messages: bool,

    #[serde(default = "default_region")]
    pub region: Region,

    #[serde(default = "default_data_rate")]
    pub data_rate: u8,
}

/// Scheduler tunables
#[derive(Debug, Deserialize, Clone)]
pub struct TrackerConfig {
    /// Minimum spacing of motion-triggered sends when no interval is set
    #[serde(default = "default_min_delay_floor_ms")]
    pub min_delay_floor_ms: u64,

    /// Battery level (mV / 10) below which low-power mode is entered
    #[serde(default = "default_battery_low_threshold")]
    pub battery_low_threshold: u16,

    /// Battery level (mV / 10) above which low-power mode is left
    #[serde(default = "default_battery_recover_threshold")]
    pub battery_recover_threshold: u16,

    #[serde(default = "default_low_power_interval_ms")]
    pub low_power_interval_ms: u64,

    #[serde(default = "default_gnss_timeout_max_ms")]
    pub gnss_timeout_max_ms: u64,

    #[serde(default = "default_env_read_timeout_ms")]
    pub env_read_timeout_ms: u64,

    /// Consecutive failed uplinks that force a restart
    #[serde(default = "default_max_send_failures")]
    pub max_send_failures: u8,

    /// Extra attempts after the radio rejects a payload as too large
    #[serde(default = "default_size_error_retries")]
    pub size_error_retries: u8,

    /// Skipped acquisitions (radio busy) before the busy flag is force-cleared
    #[serde(default = "default_busy_skip_limit")]
    pub busy_skip_limit: u8,

    #[serde(default)]
    pub no_fix_policy: NoFixPolicy,

    /// Keep the GNSS module powered between acquisitions
    #[serde(default)]
    pub gnss_always_on: bool,
}

/// Flag record storage configuration
#[derive(Debug, Deserialize, Clone)]
pub struct StorageConfig {
    #[serde(default = "default_storage_dir")]
    pub dir: String,
}

/// AT console transport configuration
#[derive(Debug, Deserialize, Clone)]
pub struct ConsoleConfig {
    /// Serial device for the console, stdin/stdout when empty
    #[serde(default)]
    pub port: String,

    #[serde(default = "default_console_baud_rate")]
    pub baud_rate: u32,
}

/// Uplink journal configuration
#[derive(Debug, Deserialize, Clone)]
pub struct TelemetryConfig {
    #[serde(default = "default_telemetry_enabled")]
    pub enabled: bool,

    #[serde(default = "default_log_dir")]
    pub log_dir: String,

    #[serde(default = "default_max_records_per_file")]
    pub max_records_per_file: usize,

    #[serde(default = "default_max_files_to_keep")]
    pub max_files_to_keep: usize,
}

/// Diagnostic logging configuration
#[derive(Debug, Deserialize, Clone)]
pub struct LoggingConfig {
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for daily rolling log files, disabled when empty
    #[serde(default)]
    pub log_dir: String,
}

/// Host-simulated collaborators used by the binary
#[derive(Debug, Deserialize, Clone)]
pub struct SimulationConfig {
    #[serde(default = "default_sim_latitude")]
    pub latitude: i32,

    #[serde(default = "default_sim_longitude")]
    pub longitude: i32,

    #[serde(default = "default_sim_altitude_mm")]
    pub altitude_mm: i32,

    #[serde(default = "default_sim_accuracy")]
    pub accuracy: u16,

    #[serde(default = "default_sim_has_fix")]
    pub has_fix: bool,

    #[serde(default = "default_sim_fix_delay_ms")]
    pub fix_delay_ms: u64,

    #[serde(default = "default_sim_battery_mv")]
    pub battery_mv: u16,

    /// Period of simulated motion interrupts, disabled when 0
    #[serde(default)]
    pub motion_interval_ms: u64,

    #[serde(default = "default_sim_join_success")]
    pub join_success: bool,

    #[serde(default = "default_sim_tx_success")]
    pub tx_success: bool,

    #[serde(default = "default_sim_airtime_ms")]
    pub airtime_ms: u64,
}

// Default value functions
fn default_lorawan_enabled() -> bool { true }
fn default_send_repeat_time_ms() -> u64 { 120_000 }
fn default_region() -> Region { Region::Eu868 }
fn default_data_rate() -> u8 { 3 }

fn default_min_delay_floor_ms() -> u64 { 30_000 }
fn default_battery_low_threshold() -> u16 { 290 }
fn default_battery_recover_threshold() -> u16 { 410 }
fn default_low_power_interval_ms() -> u64 { 3_600_000 }
fn default_gnss_timeout_max_ms() -> u64 { 90_000 }
fn default_env_read_timeout_ms() -> u64 { 5_000 }
fn default_max_send_failures() -> u8 { 10 }
fn default_size_error_retries() -> u8 { 2 }
fn default_busy_skip_limit() -> u8 { 2 }

fn default_storage_dir() -> String { "./storage".to_string() }

fn default_console_baud_rate() -> u32 { 115_200 }

fn default_telemetry_enabled() -> bool { true }
fn default_log_dir() -> String { "./logs".to_string() }
fn default_max_records_per_file() -> usize { 10_000 }
fn default_max_files_to_keep() -> usize { 10 }

fn default_log_level() -> String { "info".to_string() }

fn default_sim_latitude() -> i32 { 144_213_730 }
fn default_sim_longitude() -> i32 { 1_210_069_140 }
fn default_sim_altitude_mm() -> i32 { 35_000 }
fn default_sim_accuracy() -> u16 { 120 }
fn default_sim_has_fix() -> bool { true }
fn default_sim_fix_delay_ms() -> u64 { 2_000 }
fn default_sim_battery_mv() -> u16 { 4_000 }
fn default_sim_join_success() -> bool { true }
fn default_sim_tx_success() -> bool { true }
fn default_sim_airtime_ms() -> u64 { 1_500 }

impl Default for LoraWanConfig {
    fn default() -> Self {
        Self {
            enabled: default_lorawan_enabled(),
            send_repeat_time_ms: default_send_repeat_time_ms(),
            confirmed_messages: false,
            region: default_region(),
            data_rate: default_data_rate(),
        }
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self {
            min_delay_floor_ms: default_min_delay_floor_ms(),
            battery_low_threshold: default_battery_low_threshold(),
            battery_recover_threshold: default_battery_recover_threshold(),
            low_power_interval_ms: default_low_power_interval_ms(),
            gnss_timeout_max_ms: default_gnss_timeout_max_ms(),
            env_read_timeout_ms: default_env_read_timeout_ms(),
            max_send_failures: default_max_send_failures(),
            size_error_retries: default_size_error_retries(),
            busy_skip_limit: default_busy_skip_limit(),
            no_fix_policy: NoFixPolicy::default(),
            gnss_always_on: false,
        }
    }
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self { dir: default_storage_dir() }
    }
}

impl Default for ConsoleConfig {
    fn default() -> Self {
        Self {
            port: String::new(),
            baud_rate: default_console_baud_rate(),
        }
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: default_telemetry_enabled(),
            log_dir: default_log_dir(),
            max_records_per_file: default_max_records_per_file(),
            max_files_to_keep: default_max_files_to_keep(),
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            log_dir: String::new(),
        }
    }
}

impl Default for SimulationConfig {
    fn default() -> Self {
        Self {
            latitude: default_sim_latitude(),
            longitude: default_sim_longitude(),
            altitude_mm: default_sim_altitude_mm(),
            accuracy: default_sim_accuracy(),
            has_fix: default_sim_has_fix(),
            fix_delay_ms: default_sim_fix_delay_ms(),
            battery_mv: default_sim_battery_mv(),
            motion_interval_ms: 0,
            join_success: default_sim_join_success(),
            tx_success: default_sim_tx_success(),
            airtime_ms: default_sim_airtime_ms(),
        }
    }
}

fn invalid(msg: impl std::fmt::Display) -> TrackerError {
    TrackerError::Config(toml::de::Error::custom(msg))
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Arguments
    ///
    /// * `path` - Path to the configuration file
    ///
    /// # Errors
    ///
    /// Returns error if:
    /// - File cannot be read
    /// - TOML parsing fails
    /// - Validation fails
    ///
    /// # Examples
    ///
    /// ```no_run
    /// use lpwan_tracker::config::Config;
    ///
    /// let config = Config::load("config/default.toml")?;
    /// # Ok::<(), Box<dyn std::error::Error>>(())
    /// ```
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let contents = fs::read_to_string(path)?;
        Self::from_toml(&contents)
    }

    /// Parse and validate configuration from a TOML string
    pub fn from_toml(contents: &str) -> Result<Self> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration values
    ///
    /// # Errors
    ///
    /// Returns error if any configuration value is out of valid range
    pub fn validate(&self) -> Result<()> {
        // A non-zero interval shorter than 10 s would flood the network
        if self.lorawan.send_repeat_time_ms != 0 && self.lorawan.send_repeat_time_ms < 10_000 {
            return Err(invalid("send_repeat_time_ms must be 0 or at least 10000"));
        }

        let max_dr = self.lorawan.region.max_data_rate();
        if self.lorawan.data_rate > max_dr {
            return Err(invalid(format!(
                "data_rate {} is out of range for {:?} (max {})",
                self.lorawan.data_rate, self.lorawan.region, max_dr
            )));
        }

        if self.tracker.min_delay_floor_ms == 0 || self.tracker.min_delay_floor_ms > 3_600_000 {
            return Err(invalid("min_delay_floor_ms must be between 1 and 3600000"));
        }

        if self.tracker.battery_low_threshold >= self.tracker.battery_recover_threshold {
            return Err(invalid(
                "battery_low_threshold must be less than battery_recover_threshold",
            ));
        }

        if self.tracker.low_power_interval_ms < 60_000 {
            return Err(invalid("low_power_interval_ms must be at least 60000"));
        }

        if self.tracker.gnss_timeout_max_ms == 0 || self.tracker.gnss_timeout_max_ms > 600_000 {
            return Err(invalid("gnss_timeout_max_ms must be between 1 and 600000"));
        }

        if self.tracker.env_read_timeout_ms == 0 || self.tracker.env_read_timeout_ms > 60_000 {
            return Err(invalid("env_read_timeout_ms must be between 1 and 60000"));
        }

        if self.tracker.max_send_failures == 0 {
            return Err(invalid("max_send_failures must be greater than 0"));
        }

        if self.tracker.size_error_retries > 5 {
            return Err(invalid("size_error_retries must be between 0 and 5"));
        }

        if self.tracker.busy_skip_limit == 0 {
            return Err(invalid("busy_skip_limit must be greater than 0"));
        }

        if self.storage.dir.is_empty() {
            return Err(invalid("storage dir cannot be empty"));
        }

        if ![9600, 38400, 57600, 115_200].contains(&self.console.baud_rate) {
            return Err(invalid("baud_rate must be one of: 9600, 38400, 57600, 115200"));
        }

        if self.telemetry.enabled && self.telemetry.log_dir.is_empty() {
            return Err(invalid("telemetry log_dir cannot be empty when enabled"));
        }

        if self.telemetry.max_records_per_file == 0 {
            return Err(invalid("max_records_per_file must be greater than 0"));
        }

        if self.telemetry.max_files_to_keep == 0 {
            return Err(invalid("max_files_to_keep must be greater than 0"));
        }

        if !["trace", "debug", "info", "warn", "error"].contains(&self.logging.level.as_str()) {
            return Err(invalid("logging level must be one of: trace, debug, info, warn, error"));
        }

        if self.simulation.battery_mv > 5_000 {
            return Err(invalid("simulated battery_mv must be at most 5000"));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert!(config.lorawan.enabled);
        assert_eq!(config.tracker.battery_low_threshold, 290);
        assert_eq!(config.tracker.battery_recover_threshold, 410);
        assert_eq!(config.tracker.low_power_interval_ms, 3_600_000);
        assert_eq!(config.tracker.max_send_failures, 10);
        assert_eq!(config.tracker.no_fix_policy, NoFixPolicy::Omit);
    }

    #[test]
    fn test_load_config_from_file() {
        use std::io::Write;
        use tempfile::NamedTempFile;

        let toml_content = r#"
[lorawan]
enabled = false
send_repeat_time_ms = 60000
region = "US915"
data_rate = 3

[tracker]
min_delay_floor_ms = 45000
no_fix_policy = "zero_fill"

[telemetry]
enabled = false
"#;

        let mut temp_file = NamedTempFile::new().unwrap();
        temp_file.write_all(toml_content.as_bytes()).unwrap();
        temp_file.flush().unwrap();

        let config = Config::load(temp_file.path()).unwrap();
        assert!(!config.lorawan.enabled);
        assert_eq!(config.lorawan.send_repeat_time_ms, 60_000);
        assert_eq!(config.lorawan.region, Region::Us915);
        assert_eq!(config.tracker.min_delay_floor_ms, 45_000);
        assert_eq!(config.tracker.no_fix_policy, NoFixPolicy::ZeroFill);
        // Untouched sections fall back to defaults
        assert_eq!(config.storage.dir, "./storage");
        assert_eq!(config.console.baud_rate, 115_200);
    }

    #[test]
    fn test_shipped_default_file_matches_defaults() {
        let config =
            Config::load(concat!(env!("CARGO_MANIFEST_DIR"), "/config/default.toml")).unwrap();
        assert_eq!(config.lorawan.send_repeat_time_ms, 120_000);
        assert_eq!(config.lorawan.region, Region::Eu868);
        assert_eq!(config.tracker.min_delay_floor_ms, 30_000);
        assert_eq!(config.tracker.no_fix_policy, NoFixPolicy::Omit);
        assert!(config.console.port.is_empty());
    }

    #[test]
    fn test_empty_file_is_valid() {
        assert!(Config::from_toml("").is_ok());
    }

    #[test]
    fn test_unknown_no_fix_policy_rejected() {
        let result = Config::from_toml("[tracker]\nno_fix_policy = \"drop\"\n");
        assert!(matches!(result, Err(TrackerError::Config(_))));
    }

    #[test]
    fn test_missing_file_is_io_error() {
        let result = Config::load("/nonexistent/lpwan-tracker.toml");
        assert!(matches!(result, Err(TrackerError::Io(_))));
    }

    #[test]
    fn test_send_repeat_time_zero_allowed() {
        let mut config = Config::default();
        config.lorawan.send_repeat_time_ms = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_send_repeat_time_too_short() {
        let mut config = Config::default();
        config.lorawan.send_repeat_time_ms = 5_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_data_rate_out_of_range_for_region() {
        let mut config = Config::default();
        config.lorawan.region = Region::Us915;
        config.lorawan.data_rate = 5;
        assert!(config.validate().is_err());

        config.lorawan.region = Region::Eu868;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_battery_thresholds_must_be_ordered() {
        let mut config = Config::default();
        config.tracker.battery_low_threshold = 410;
        config.tracker.battery_recover_threshold = 410;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_min_delay_floor_zero() {
        let mut config = Config::default();
        config.tracker.min_delay_floor_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_low_power_interval_too_short() {
        let mut config = Config::default();
        config.tracker.low_power_interval_ms = 1_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_gnss_timeout_zero() {
        let mut config = Config::default();
        config.tracker.gnss_timeout_max_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_env_read_timeout_too_high() {
        let mut config = Config::default();
        config.tracker.env_read_timeout_ms = 60_001;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_max_send_failures_zero() {
        let mut config = Config::default();
        config.tracker.max_send_failures = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_size_error_retries_too_high() {
        let mut config = Config::default();
        config.tracker.size_error_retries = 6;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_busy_skip_limit_zero() {
        let mut config = Config::default();
        config.tracker.busy_skip_limit = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_storage_dir() {
        let mut config = Config::default();
        config.storage.dir = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_console_baud_rate() {
        let mut config = Config::default();
        config.console.baud_rate = 420_000;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_log_dir_when_enabled() {
        let mut config = Config::default();
        config.telemetry.enabled = true;
        config.telemetry.log_dir = String::new();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_empty_log_dir_when_disabled() {
        let mut config = Config::default();
        config.telemetry.enabled = false;
        config.telemetry.log_dir = String::new();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_max_records_per_file_zero() {
        let mut config = Config::default();
        config.telemetry.max_records_per_file = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_max_files_to_keep_zero() {
        let mut config = Config::default();
        config.telemetry.max_files_to_keep = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_invalid_log_level() {
        let mut config = Config::default();
        config.logging.level = "verbose".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_simulated_battery_too_high() {
        let mut config = Config::default();
        config.simulation.battery_mv = 6_000;
        assert!(config.validate().is_err());
    }
}
