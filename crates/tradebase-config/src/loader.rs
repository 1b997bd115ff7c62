use std::path::{Path, PathBuf};

use tracing::{debug, info};
use tradebase_common::{Error, Result};

use crate::model::AppConfig;

const CONFIG_FILE_NAMES: &[&str] = &["config.yml", "config.yaml", "config.toml"];

/// Locates and parses the tradebase configuration file.
pub struct ConfigLoader {
    config_dir: PathBuf,
}

impl ConfigLoader {
    /// Loader rooted at the platform config directory (`~/.config/tradebase`
    /// on Linux).
    pub fn new() -> Result<Self> {
        let base = dirs::config_dir()
            .ok_or_else(|| Error::Config("could not determine config directory".into()))?;
        Ok(Self::with_dir(base.join("tradebase")))
    }

    pub fn with_dir(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
        }
    }

    pub fn config_dir(&self) -> &Path {
        &self.config_dir
    }

    /// The first config file present in the config directory, if any.
    pub fn find_config_file(&self) -> Option<PathBuf> {
        CONFIG_FILE_NAMES
            .iter()
            .map(|name| self.config_dir.join(name))
            .find(|path| path.is_file())
    }

    /// Load the config file from the config directory, falling back to
    /// defaults when none exists.
    pub fn load(&self) -> Result<AppConfig> {
        match self.find_config_file() {
            Some(path) => Self::load_from(&path),
            None => {
                debug!(
                    "no config file in {}, using defaults",
                    self.config_dir.display()
                );
                Ok(AppConfig::default())
            }
        }
    }

    /// Load and validate a specific config file. The format is chosen by
    /// extension.
    pub fn load_from(path: &Path) -> Result<AppConfig> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            Error::Config(format!("failed to read {}: {e}", path.display()))
        })?;

        let ext = path.extension().and_then(|e| e.to_str()).unwrap_or("");
        let config = parse_config(&contents, ext)?;
        config.validate()?;

        info!("loaded config from {}", path.display());
        Ok(config)
    }
}

fn parse_config(contents: &str, ext: &str) -> Result<AppConfig> {
    match ext {
        "yml" | "yaml" => serde_yaml::from_str(contents)
            .map_err(|e| Error::Config(format!("YAML parse error: {e}"))),
        "toml" => {
            toml::from_str(contents).map_err(|e| Error::Config(format!("TOML parse error: {e}")))
        }
        other => Err(Error::Config(format!(
            "unsupported config extension: {other}"
        ))),
    }
}
