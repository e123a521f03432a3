use anyhow::{Context, Result};
use clap::Parser;
use lib_telemetry::{ChecksumKind, LaunchMode, StationSettings};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Config file read when `--config-path` is not given.
pub const DEFAULT_CONFIG_FILE: &str = "server_console.conf";

#[derive(Parser, Deserialize, Serialize, Debug, Clone, Default, PartialEq)]
#[clap(about = "Ground station operator console", version)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[clap(long, env = "STATION_CONFIG_PATH", help = "Path to the JSON configuration file.")]
    pub config_path: Option<PathBuf>,

    #[clap(long, env = "STATION_SETTINGS_PATH", help = "Path to a JSON station settings file used as the base for every station option.")]
    pub settings_path: Option<PathBuf>,

    #[clap(long, env = "STATION_LOG_DIR", help = "Directory for log files.")]
    pub log_dir: Option<PathBuf>,

    #[clap(long, env = "STATION_LOG_LEVEL", help = "Logging level (trace, debug, info, warn, error).")]
    pub log_level: Option<String>,

    #[clap(long, env = "STATION_CONSOLE_CAPACITY", help = "Console entries kept before the oldest is evicted.")]
    pub console_capacity: Option<usize>,

    #[clap(long, env = "STATION_BAUD_RATE", help = "Serial line speed.")]
    pub baud_rate: Option<u32>,

    #[clap(long, env = "STATION_CHECKSUM", help = "Frame checksum policy (crc16, xor8).")]
    pub checksum: Option<ChecksumKind>,

    #[clap(long, env = "STATION_SIMULATOR", help = "Offer the SIM0 telemetry simulator port (true/false).")]
    pub simulator: Option<bool>,

    #[clap(long, env = "STATION_SIM_RATE_HZ", help = "Simulator frames per second.")]
    pub simulator_rate_hz: Option<f64>,

    #[clap(long, env = "STATION_SIM_CORRUPT_EVERY", help = "Corrupt every n-th simulated frame.")]
    pub simulator_corrupt_every: Option<u32>,

    #[clap(long, env = "STATION_LAUNCH_MODE", help = "Launch mode (mock, live).")]
    pub launch_mode: Option<LaunchMode>,

    #[clap(long, env = "STATION_LAUNCH_SCRIPT", help = "JSON launch script replacing the built-in countdown.")]
    pub launch_script: Option<PathBuf>,

    #[clap(long, env = "STATION_AUTO_OPEN", help = "Port to open at startup.")]
    pub auto_open: Option<String>,

    #[clap(long, env = "STATION_SHOW_PARSED", help = "Print every decoded telemetry record (true/false).")]
    pub show_parsed: Option<bool>,
}

impl Config {
    // Merge two Config structs, where 'other' overrides 'self' for Some values
    fn merge(self, other: Config) -> Config {
        Config {
            config_path: other.config_path.or(self.config_path),
            settings_path: other.settings_path.or(self.settings_path),
            log_dir: other.log_dir.or(self.log_dir),
            log_level: other.log_level.or(self.log_level),
            console_capacity: other.console_capacity.or(self.console_capacity),
            baud_rate: other.baud_rate.or(self.baud_rate),
            checksum: other.checksum.or(self.checksum),
            simulator: other.simulator.or(self.simulator),
            simulator_rate_hz: other.simulator_rate_hz.or(self.simulator_rate_hz),
            simulator_corrupt_every: other.simulator_corrupt_every.or(self.simulator_corrupt_every),
            launch_mode: other.launch_mode.or(self.launch_mode),
            launch_script: other.launch_script.or(self.launch_script),
            auto_open: other.auto_open.or(self.auto_open),
            show_parsed: other.show_parsed.or(self.show_parsed),
        }
    }

    /// Station settings: the settings file (or defaults) with every option
    /// given here applied on top.
    pub fn to_settings(&self) -> Result<StationSettings> {
        let mut settings = match &self.settings_path {
            Some(path) => StationSettings::from_json_file(path)
                .with_context(|| format!("loading station settings from {}", path.display()))?,
            None => StationSettings::default(),
        };

        if let Some(capacity) = self.console_capacity {
            settings.console_capacity = capacity;
        }
        if let Some(baud_rate) = self.baud_rate {
            settings.baud_rate = baud_rate;
        }
        if let Some(checksum) = self.checksum {
            settings.checksum = checksum;
        }
        if let Some(simulator) = self.simulator {
            settings.simulator = simulator;
        }
        if let Some(rate) = self.simulator_rate_hz {
            settings.simulator_rate_hz = rate;
        }
        if self.simulator_corrupt_every.is_some() {
            settings.simulator_corrupt_every = self.simulator_corrupt_every;
        }
        if let Some(mode) = self.launch_mode {
            settings.launch_mode = mode;
        }
        if self.launch_script.is_some() {
            settings.launch_script = self.launch_script.clone();
        }

        settings.validate().context("validating station settings")?;
        Ok(settings)
    }
}

fn default_log_dir() -> PathBuf {
    dirs::data_local_dir()
        .map(|dir| dir.join("ground_station").join("logs"))
        .unwrap_or_else(|| PathBuf::from("./logs"))
}

fn defaults() -> Config {
    Config {
        log_dir: Some(default_log_dir()),
        log_level: Some("info".to_string()),
        show_parsed: Some(false),
        ..Default::default()
    }
}

fn read_config_file(path: &Path) -> Option<Config> {
    if !path.exists() {
        log::info!("Config file not found at {}. Using defaults and environment/CLI variables.", path.display());
        return None;
    }
    match fs::read_to_string(path) {
        Ok(text) => match serde_json::from_str::<Config>(&text) {
            Ok(config) => Some(config),
            Err(e) => {
                log::warn!("Failed to parse config file {}: {}. Falling back to other sources.", path.display(), e);
                None
            }
        },
        Err(e) => {
            log::warn!("Failed to read config file {}: {}. Falling back to other sources.", path.display(), e);
            None
        }
    }
}

/// Resolves the configuration from defaults, the config file and `cli`
/// (which already carries environment overrides), in increasing priority.
pub fn resolve(cli: Config) -> Config {
    let config_file_path = cli
        .config_path
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_FILE));

    let mut current = defaults();
    if let Some(file_config) = read_config_file(&config_file_path) {
        current = current.merge(file_config);
    }
    current.merge(cli)
}

pub fn load_config() -> Config {
    resolve(Config::parse())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn cli_overrides_file_overrides_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{ "logLevel": "debug", "baudRate": 57600, "autoOpen": "COM3" }}"#).unwrap();

        let cli = Config {
            config_path: Some(file.path().to_path_buf()),
            baud_rate: Some(9600),
            ..Default::default()
        };
        let config = resolve(cli);

        assert_eq!(config.log_level.as_deref(), Some("debug"));
        assert_eq!(config.baud_rate, Some(9600));
        assert_eq!(config.auto_open.as_deref(), Some("COM3"));
        assert_eq!(config.show_parsed, Some(false));
        assert!(config.log_dir.is_some());
    }

    #[test]
    fn unreadable_file_falls_back_to_defaults() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, "not json").unwrap();

        let config = resolve(Config {
            config_path: Some(file.path().to_path_buf()),
            ..Default::default()
        });
        assert_eq!(config.log_level.as_deref(), Some("info"));
    }

    #[test]
    fn options_are_applied_to_settings() {
        let config = Config {
            checksum: Some(ChecksumKind::Xor8),
            launch_mode: Some(LaunchMode::Live),
            simulator: Some(false),
            ..Default::default()
        };
        let settings = config.to_settings().unwrap();
        assert_eq!(settings.checksum, ChecksumKind::Xor8);
        assert_eq!(settings.launch_mode, LaunchMode::Live);
        assert!(!settings.simulator);

        let bad = Config {
            console_capacity: Some(0),
            ..Default::default()
        };
        assert!(bad.to_settings().is_err());
    }
}
