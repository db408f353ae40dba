//! Application settings stored in `$XDG_CONFIG_HOME/window-rules/config.toml`

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn, Level as TraceLevel};

use crate::constants::{config, validation};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// trace, debug, info, warn or error
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Rule book location; defaults next to this file
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rulebook: Option<PathBuf>,

    /// Where exported rules go by default; defaults to the home directory
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub export_dir: Option<PathBuf>,

    /// Seconds to wait before probing the active window
    #[serde(default = "default_detect_delay_secs")]
    pub detect_delay_secs: u64,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_detect_delay_secs() -> u64 {
    validation::DEFAULT_DETECT_DELAY_SECS
}

impl Default for Config {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
            rulebook: None,
            export_dir: None,
            detect_delay_secs: default_detect_delay_secs(),
        }
    }
}

fn config_dir() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(config::APP_DIR)
}

pub fn parse_level(level: &str) -> TraceLevel {
    match level.trim().to_lowercase().as_str() {
        "trace" => TraceLevel::TRACE,
        "debug" => TraceLevel::DEBUG,
        "warn" => TraceLevel::WARN,
        "error" => TraceLevel::ERROR,
        _ => TraceLevel::INFO,
    }
}

/// Level used until the config file is read: `LOG_LEVEL`, else info
pub fn startup_level() -> TraceLevel {
    level_or_info(env::var(config::LOG_LEVEL_ENV).ok().as_deref())
}

fn level_or_info(value: Option<&str>) -> TraceLevel {
    value
        .filter(|level| !level.trim().is_empty())
        .map(parse_level)
        .unwrap_or(TraceLevel::INFO)
}

impl Config {
    pub fn path() -> PathBuf {
        config_dir().join(config::FILENAME)
    }

    /// Load the user's config with environment overrides applied
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from(&Self::path())?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Load `path`, writing a default file first when none exists
    pub fn load_from(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let contents = fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file {}", path.display()))?;
            toml::from_str::<Self>(&contents)
                .with_context(|| format!("Failed to parse config file {}", path.display()))?
        } else {
            info!(path = %path.display(), "No config file found, generating default");
            let config = Self::default();
            if let Err(e) = config.save_to(path) {
                warn!(path = %path.display(), error = %e, "Failed to write default config file");
            }
            config
        };

        config.validate_and_clamp();
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::path())
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .context(format!("Failed to create config directory: {}", parent.display()))?;
        }
        let contents = toml::to_string_pretty(self).context("Failed to serialize config to TOML")?;
        fs::write(path, contents).context(format!("Failed to write config file to {}", path.display()))?;
        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(level) = env::var(config::LOG_LEVEL_ENV)
            && !level.trim().is_empty()
        {
            self.log_level = level;
        }
    }

    fn validate_and_clamp(&mut self) {
        if self.detect_delay_secs > validation::MAX_DETECT_DELAY_SECS {
            warn!(
                detect_delay_secs = self.detect_delay_secs,
                max = validation::MAX_DETECT_DELAY_SECS,
                "detect_delay_secs exceeds maximum, clamping"
            );
            self.detect_delay_secs = validation::MAX_DETECT_DELAY_SECS;
        }

        let level = self.log_level.trim().to_lowercase();
        if !matches!(level.as_str(), "trace" | "debug" | "info" | "warn" | "error") {
            warn!(log_level = %self.log_level, "Unknown log_level, using info");
            self.log_level = default_log_level();
        }
    }

    pub fn level(&self) -> TraceLevel {
        parse_level(&self.log_level)
    }

    pub fn detect_delay(&self) -> Duration {
        Duration::from_secs(self.detect_delay_secs)
    }

    /// Rule book location: `WINDOW_RULES_FILE`, then the config value, then the default
    pub fn rulebook_path(&self) -> PathBuf {
        let from_env = env::var_os(config::RULEBOOK_ENV)
            .filter(|value| !value.is_empty())
            .map(PathBuf::from);
        self.resolve_rulebook(from_env)
    }

    fn resolve_rulebook(&self, override_path: Option<PathBuf>) -> PathBuf {
        override_path
            .or_else(|| self.rulebook.clone())
            .unwrap_or_else(|| config_dir().join(config::RULEBOOK_FILENAME))
    }

    pub fn export_dir(&self) -> PathBuf {
        self.export_dir
            .clone()
            .or_else(dirs::home_dir)
            .unwrap_or_else(|| PathBuf::from("."))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_config_writes_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("window-rules").join("config.toml");

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config, Config::default());
        assert!(path.exists());

        let reloaded = Config::load_from(&path).unwrap();
        assert_eq!(reloaded, config);
    }

    #[test]
    fn test_partial_config_uses_field_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "rulebook = \"/tmp/my-rules.toml\"\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.log_level, "info");
        assert_eq!(config.detect_delay_secs, validation::DEFAULT_DETECT_DELAY_SECS);
        assert_eq!(config.rulebook, Some(PathBuf::from("/tmp/my-rules.toml")));
    }

    #[test]
    fn test_validate_and_clamp() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "log_level = \"chatty\"\ndetect_delay_secs = 600\n").unwrap();

        let config = Config::load_from(&path).unwrap();
        assert_eq!(config.detect_delay_secs, validation::MAX_DETECT_DELAY_SECS);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.level(), TraceLevel::INFO);
    }

    #[test]
    fn test_malformed_config_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "detect_delay_secs = \"soon\"\n").unwrap();
        assert!(Config::load_from(&path).is_err());
    }

    #[test]
    fn test_rulebook_resolution_order() {
        let mut config = Config::default();
        assert!(config.resolve_rulebook(None).ends_with("window-rules/rules.toml"));

        config.rulebook = Some(PathBuf::from("/srv/rules.toml"));
        assert_eq!(config.resolve_rulebook(None), PathBuf::from("/srv/rules.toml"));
        assert_eq!(
            config.resolve_rulebook(Some(PathBuf::from("/tmp/override.toml"))),
            PathBuf::from("/tmp/override.toml")
        );
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(parse_level("DEBUG"), TraceLevel::DEBUG);
        assert_eq!(parse_level(" warn "), TraceLevel::WARN);
        assert_eq!(parse_level("nonsense"), TraceLevel::INFO);
    }

    #[test]
    fn test_startup_level_from_env_value() {
        assert_eq!(level_or_info(Some("trace")), TraceLevel::TRACE);
        assert_eq!(level_or_info(Some("  ")), TraceLevel::INFO);
        assert_eq!(level_or_info(None), TraceLevel::INFO);
    }
}
