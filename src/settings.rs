//! Settings of the `daq-config` tool itself, loaded with Figment.
//!
//! Settings are merged from, in increasing priority:
//! 1. built-in defaults
//! 2. a TOML file (`daq-config.toml` in the working directory by default)
//! 3. environment variables prefixed with `DAQ_CONFIG_`
//!
//! # Example
//! ```no_run
//! use daq_config::settings::Settings;
//!
//! // DAQ_CONFIG_LOG_LEVEL=debug overrides the file
//! let settings = Settings::load()?;
//! println!("Log level: {}", settings.log_level);
//! # Ok::<(), figment::Error>(())
//! ```
//!
//! Instrument setup documents are never merged with the environment; these
//! settings only configure logging and default paths of the command-line tool.

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Default settings file name.
pub const SETTINGS_FILE: &str = "daq-config.toml";

/// Environment variable prefix.
pub const ENV_PREFIX: &str = "DAQ_CONFIG_";

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line, colored output
    Pretty,
    /// Single-line output
    Compact,
    /// Newline-delimited JSON
    Json,
}

/// Tool settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
    /// Log output format
    #[serde(default = "default_log_format")]
    pub log_format: LogFormat,
    /// Setup document used when no file is given on the command line
    #[serde(default)]
    pub config_path: Option<PathBuf>,
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_log_format() -> LogFormat {
    LogFormat::Compact
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            log_format: default_log_format(),
            config_path: None,
        }
    }
}

impl Settings {
    /// Load settings from `daq-config.toml` and environment variables.
    pub fn load() -> Result<Self, figment::Error> {
        Self::load_from(SETTINGS_FILE)
    }

    /// Load settings from a specific file path; a missing file is skipped.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Result<Self, figment::Error> {
        Self::figment(path.as_ref()).extract()
    }

    fn figment(path: &Path) -> Figment {
        Figment::from(Serialized::defaults(Settings::default()))
            .merge(Toml::file(path))
            .merge(Env::prefixed(ENV_PREFIX))
    }

    /// Validate settings after loading.
    pub fn validate(&self) -> Result<(), String> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.log_level.to_lowercase().as_str()) {
            return Err(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.log_level,
                valid_levels.join(", ")
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use figment::Jail;

    #[test]
    fn test_defaults_without_file() {
        Jail::expect_with(|_jail| {
            let settings = Settings::load_from("missing.toml")?;
            assert_eq!(settings, Settings::default());
            assert!(settings.validate().is_ok());
            Ok(())
        });
    }

    #[test]
    fn test_file_then_env_override() {
        Jail::expect_with(|jail| {
            jail.create_file(
                SETTINGS_FILE,
                r#"
                log_level = "info"
                log_format = "json"
                config_path = "setups/confocal.yml"
                "#,
            )?;

            let settings = Settings::load()?;
            assert_eq!(settings.log_level, "info");
            assert_eq!(settings.log_format, LogFormat::Json);
            assert_eq!(settings.config_path, Some(PathBuf::from("setups/confocal.yml")));

            jail.set_env("DAQ_CONFIG_LOG_LEVEL", "debug");
            jail.set_env("DAQ_CONFIG_LOG_FORMAT", "pretty");
            let settings = Settings::load()?;
            assert_eq!(settings.log_level, "debug");
            assert_eq!(settings.log_format, LogFormat::Pretty);
            Ok(())
        });
    }

    #[test]
    fn test_invalid_log_level() {
        let settings = Settings {
            log_level: "verbose".to_string(),
            ..Settings::default()
        };
        assert!(settings.validate().is_err());
    }

    #[test]
    fn test_invalid_format_rejected() {
        Jail::expect_with(|jail| {
            jail.set_env("DAQ_CONFIG_LOG_FORMAT", "xml");
            assert!(Settings::load().is_err());
            Ok(())
        });
    }
}
