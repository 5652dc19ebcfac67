// Tue Jan 13 2026 - Alex

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_KERNEL_DEBUG_NAMES: [&str; 4] = ["ntkrnlpa.pdb", "ntkrnlmp.pdb", "ntkrpamp.pdb", "ntoskrnl.pdb"];

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Config parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Root holding one `<guid_age>` directory per kernel profile.
    pub profile_cache_dir: PathBuf,
    pub kernel_debug_names: Vec<String>,
    /// Structures requested when a symbol file is converted into a profile.
    pub profile_structures: Vec<String>,
    pub scan_chunk_size: usize,
    pub poll_interval_ms: u64,
    pub cache_enabled: bool,
    pub enabled_plugins: Vec<String>,
    pub verbose: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            profile_cache_dir: PathBuf::from("profiles"),
            kernel_debug_names: DEFAULT_KERNEL_DEBUG_NAMES.iter().map(|s| s.to_string()).collect(),
            profile_structures: vec!["_EPROCESS".to_string(), "_KPROCESS".to_string()],
            scan_chunk_size: 0x10_0000,
            poll_interval_ms: 500,
            cache_enabled: true,
            enabled_plugins: Vec::new(),
            verbose: false,
        }
    }
}

impl Config {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = fs::read_to_string(path)?;
        let config: Config = serde_json::from_str(&text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }

    pub fn with_profile_cache_dir(mut self, dir: PathBuf) -> Self {
        self.profile_cache_dir = dir;
        self
    }

    pub fn with_scan_chunk_size(mut self, size: usize) -> Self {
        self.scan_chunk_size = size;
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval_ms = interval.as_millis() as u64;
        self
    }

    pub fn with_cache_enabled(mut self, enabled: bool) -> Self {
        self.cache_enabled = enabled;
        self
    }

    pub fn with_enabled_plugins(mut self, plugins: Vec<String>) -> Self {
        self.enabled_plugins = plugins;
        self
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }

    /// Log verbosity for `-v` count `requested`. `verbose` in the file means at least info.
    pub fn log_verbosity(&self, requested: u8) -> u8 {
        if self.verbose {
            requested.max(1)
        } else {
            requested
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.kernel_debug_names.is_empty() {
            return Err(ConfigError::Invalid("kernel_debug_names must not be empty".to_string()));
        }
        if self.scan_chunk_size < 64 {
            return Err(ConfigError::Invalid("scan_chunk_size must be at least 64 bytes".to_string()));
        }
        if self.poll_interval_ms == 0 {
            return Err(ConfigError::Invalid("poll_interval_ms must be greater than 0".to_string()));
        }
        if !self.profile_structures.iter().any(|s| s == "_EPROCESS") {
            return Err(ConfigError::Invalid("profile_structures must include _EPROCESS".to_string()));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_defaults_are_valid() {
        let config = Config::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.kernel_debug_names.len(), 4);
        assert_eq!(config.poll_interval(), Duration::from_millis(500));
    }

    #[test]
    fn test_partial_file_uses_defaults() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"profile_cache_dir": "/var/profiles", "cache_enabled": false}"#).unwrap();

        let config = Config::load(&path).unwrap();
        assert_eq!(config.profile_cache_dir, PathBuf::from("/var/profiles"));
        assert!(!config.cache_enabled);
        assert_eq!(config.scan_chunk_size, 0x10_0000);
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(Config::default().with_scan_chunk_size(8).validate().is_err());
        assert!(Config::default().with_poll_interval(Duration::ZERO).validate().is_err());

        let mut config = Config::default();
        config.kernel_debug_names.clear();
        assert!(matches!(config.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn test_save_then_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("config.json");
        let config = Config::default().with_enabled_plugins(vec!["pslist".to_string()]);
        config.save(&path).unwrap();

        assert_eq!(Config::load(&path).unwrap().enabled_plugins, vec!["pslist".to_string()]);
    }

    #[test]
    fn test_verbose_raises_log_verbosity() {
        let mut config = Config::default();
        assert_eq!(config.log_verbosity(0), 0);

        config.verbose = true;
        assert_eq!(config.log_verbosity(0), 1);
        assert_eq!(config.log_verbosity(3), 3);
    }
}
