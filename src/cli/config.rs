//! CLI configuration.
//!
//! Resolves where the CLI keeps its data and which protocol configuration
//! it runs with. Precedence, lowest first: built-in defaults, the JSON file
//! in the data directory (or an explicit `--config`), `PARITY_*`
//! environment variables.

use std::path::{Path, PathBuf};
use tracing::debug;

use crate::core::config::ProtocolConfig;
use crate::error::{Error, Result};
use crate::storage::{FileStore, StateManager};

use super::output::{OutputFormat, OutputFormatter};

/// File name of the protocol configuration inside the data directory
pub const CONFIG_FILE: &str = "config.json";

/// Subdirectory holding engine snapshots
pub const STATE_DIR: &str = "state";

/// Resolved CLI settings
#[derive(Debug, Clone)]
pub struct CliConfig {
    /// Data directory
    pub data_dir: PathBuf,
    /// Explicit protocol configuration file
    pub config_file: Option<PathBuf>,
    /// Output format
    pub format: OutputFormat,
    /// Colored text output
    pub color: bool,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            config_file: None,
            format: OutputFormat::Text,
            color: true,
        }
    }
}

impl CliConfig {
    /// Settings for `data_dir`, expanding a leading `~`
    pub fn new(data_dir: &Path) -> Self {
        Self {
            data_dir: expand_home(data_dir),
            ..Self::default()
        }
    }

    /// Path of the protocol configuration file
    pub fn protocol_config_path(&self) -> PathBuf {
        self.config_file
            .clone()
            .unwrap_or_else(|| self.data_dir.join(CONFIG_FILE))
    }

    /// Directory of the state store
    pub fn state_dir(&self) -> PathBuf {
        self.data_dir.join(STATE_DIR)
    }

    /// Protocol configuration after file and environment overlays, validated
    pub fn load_protocol_config(&self) -> Result<ProtocolConfig> {
        let path = self.protocol_config_path();
        let base = if path.exists() {
            debug!(path = %path.display(), "Loading protocol configuration");
            ProtocolConfig::load(&path)?
        } else if self.config_file.is_some() {
            return Err(Error::Config(format!("{} does not exist", path.display())));
        } else {
            ProtocolConfig::default()
        };
        let config = base.with_env_overrides()?;
        config.validate()?;
        Ok(config)
    }

    /// Write the default protocol configuration, refusing to overwrite unless `force`
    pub fn init_protocol_config(&self, force: bool) -> Result<PathBuf> {
        let path = self.protocol_config_path();
        if path.exists() && !force {
            return Err(Error::Config(format!(
                "{} already exists (use --force to overwrite)",
                path.display()
            )));
        }
        ProtocolConfig::default().save(&path)?;
        Ok(path)
    }

    /// Open the snapshot store
    pub fn open_state(&self) -> Result<StateManager<FileStore>> {
        Ok(StateManager::new(FileStore::open(self.state_dir())?))
    }

    /// Output formatter for these settings
    pub fn formatter(&self) -> OutputFormatter {
        OutputFormatter::new(self.format, self.color)
    }
}

/// Replace a leading `~` with `$HOME`
fn expand_home(path: &Path) -> PathBuf {
    match (path.strip_prefix("~"), std::env::var_os("HOME")) {
        (Ok(rest), Some(home)) => PathBuf::from(home).join(rest),
        _ => path.to_path_buf(),
    }
}

/// Default data directory
fn default_data_dir() -> PathBuf {
    #[cfg(target_os = "macos")]
    {
        if let Some(home) = std::env::var_os("HOME") {
            return PathBuf::from(home).join("Library/Application Support/parity");
        }
    }

    #[cfg(target_os = "windows")]
    {
        if let Some(appdata) = std::env::var_os("APPDATA") {
            return PathBuf::from(appdata).join("parity");
        }
    }

    match std::env::var_os("HOME") {
        Some(home) => PathBuf::from(home).join(".parity"),
        None => PathBuf::from(".parity"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_paths_follow_data_dir() {
        let config = CliConfig::new(Path::new("/tmp/parity-data"));
        assert_eq!(config.protocol_config_path(), PathBuf::from("/tmp/parity-data/config.json"));
        assert_eq!(config.state_dir(), PathBuf::from("/tmp/parity-data/state"));
    }

    #[test]
    fn test_init_then_load() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = CliConfig::new(temp_dir.path());

        let path = config.init_protocol_config(false).unwrap();
        assert!(path.exists());
        assert!(config.init_protocol_config(false).is_err());
        assert!(config.init_protocol_config(true).is_ok());

        let loaded = config.load_protocol_config().unwrap();
        assert_eq!(loaded.fees, ProtocolConfig::default().fees);
    }

    #[test]
    fn test_missing_explicit_file_is_error() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = CliConfig {
            config_file: Some(temp_dir.path().join("nope.json")),
            ..CliConfig::new(temp_dir.path())
        };
        assert!(matches!(config.load_protocol_config(), Err(Error::Config(_))));
    }
}
