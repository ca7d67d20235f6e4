//! Bridge configuration loaded from TOML
//!
//! Lookup order for `discover`: the `GCBRIDGE_CONFIG` environment variable,
//! then `gcbridge.toml` in the current directory or any parent, then defaults.

use crate::error::ConfigError;
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

pub const CONFIG_ENV: &str = "GCBRIDGE_CONFIG";
pub const CONFIG_FILE: &str = "gcbridge.toml";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BridgeConfig {
    #[serde(default)]
    pub heap: HeapConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub gray: GrayConfig,

    #[serde(default)]
    pub logging: LoggingSection,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HeapConfig {
    #[serde(default = "default_initial_capacity")]
    pub initial_capacity: usize,

    /// Hard cap on live cells; allocation beyond it fails
    #[serde(default)]
    pub max_cells: Option<usize>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Panic instead of returning an error when a second wrapper is
    /// created for an already cached (native, domain) pair
    #[serde(default = "default_fatal_on_duplicate")]
    pub fatal_on_duplicate: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrayConfig {
    #[serde(default = "default_worklist_capacity")]
    pub worklist_capacity: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoggingSection {
    #[serde(default = "default_level")]
    pub level: String,

    #[serde(default)]
    pub json: bool,
}

impl Default for HeapConfig {
    fn default() -> Self {
        Self {
            initial_capacity: default_initial_capacity(),
            max_cells: None,
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            fatal_on_duplicate: default_fatal_on_duplicate(),
        }
    }
}

impl Default for GrayConfig {
    fn default() -> Self {
        Self {
            worklist_capacity: default_worklist_capacity(),
        }
    }
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: default_level(),
            json: false,
        }
    }
}

fn default_initial_capacity() -> usize { 256 }
fn default_fatal_on_duplicate() -> bool { cfg!(debug_assertions) }
fn default_worklist_capacity() -> usize { 64 }
fn default_level() -> String { "info".to_string() }

impl BridgeConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::parse(&content)
    }

    /// Parse configuration from a TOML string
    pub fn parse(content: &str) -> Result<Self, ConfigError> {
        toml::from_str(content).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Find and load configuration, falling back to defaults
    pub fn discover() -> Self {
        if let Ok(path) = std::env::var(CONFIG_ENV) {
            match Self::load(Path::new(&path)) {
                Ok(config) => return config,
                Err(err) => {
                    tracing::warn!(target: "config", path = %path, error = %err, "ignoring config");
                }
            }
        }

        std::env::current_dir()
            .ok()
            .and_then(|dir| Self::find_in_ancestors(&dir))
            .and_then(|path| Self::load(&path).ok())
            .unwrap_or_default()
    }

    fn find_in_ancestors(start: &Path) -> Option<PathBuf> {
        start
            .ancestors()
            .map(|dir| dir.join(CONFIG_FILE))
            .find(|candidate| candidate.exists())
    }

    /// Configuration with a heap cell limit, mostly useful for exercising
    /// allocation failure paths
    pub fn with_max_cells(mut self, limit: usize) -> Self {
        self.heap.max_cells = Some(limit);
        self
    }

    /// Generate default configuration file content
    pub fn generate_default() -> String {
        toml::to_string_pretty(&Self::default())
            .unwrap_or_else(|_| String::from("# failed to generate config"))
    }

    /// Save configuration to file
    pub fn save(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self)
            .map_err(|e| ConfigError::Serialize(e.to_string()))?;
        fs::write(path, content)?;
        Ok(())
    }
}
