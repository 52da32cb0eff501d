//! TOML configuration for the `consolidator` binary.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::locality::DEFAULT_MEMO_CAPACITY;
use crate::options::{ConsolidationOptions, DEFAULT_YIELD_INTERVAL};

/// Output format for match listings.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OutputFormat {
    /// Human-readable lines with highlighted spans.
    #[default]
    Text,
    /// One JSON document per match.
    Json,
}

/// Whether text output is colored.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ColorChoice {
    /// Color when stdout is a terminal.
    #[default]
    Auto,
    /// Always color.
    Always,
    /// Never color.
    Never,
}

/// `[consolidation]` section.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsolidationSection {
    /// Driver steps between ticks.
    pub yield_interval: usize,
    /// Word to phonetic code memo capacity.
    pub phonetic_memo_capacity: usize,
}

impl Default for ConsolidationSection {
    fn default() -> Self {
        Self {
            yield_interval: DEFAULT_YIELD_INTERVAL,
            phonetic_memo_capacity: DEFAULT_MEMO_CAPACITY,
        }
    }
}

/// `[output]` section.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputSection {
    /// Match listing format.
    pub format: OutputFormat,
    /// Color policy for text output.
    pub color: ColorChoice,
}

/// Parsed configuration file contents.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConfigData {
    /// Engine settings.
    pub consolidation: ConsolidationSection,
    /// Presentation settings.
    pub output: OutputSection,
}

/// Configuration together with the file it was (or would be) loaded from.
#[derive(Debug, Default)]
pub struct CliConfig {
    path: Option<PathBuf>,
    data: ConfigData,
}

impl CliConfig {
    /// Loads `explicit`, or the default location, falling back to defaults
    /// when the file does not exist.
    pub fn load(explicit: Option<PathBuf>) -> Result<Self, ConfigError> {
        let path = explicit.or_else(default_config_path);
        let data = match path.as_ref() {
            Some(config_path) if config_path.exists() => read_file(config_path)?,
            _ => ConfigData::default(),
        };
        Ok(Self { path, data })
    }

    /// The file backing this configuration, if any.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Parsed contents.
    pub fn data(&self) -> &ConfigData {
        &self.data
    }

    /// Mutable access for command-line overrides.
    pub fn data_mut(&mut self) -> &mut ConfigData {
        &mut self.data
    }

    /// Builds engine options from the `[consolidation]` section.
    pub fn consolidation_options(&self) -> ConsolidationOptions {
        ConsolidationOptions::new()
            .yield_interval(self.data.consolidation.yield_interval)
            .phonetic_memo_capacity(self.data.consolidation.phonetic_memo_capacity)
    }

    /// Renders the effective configuration as TOML.
    pub fn render(&self) -> Result<String, ConfigError> {
        toml::to_string_pretty(&self.data).map_err(|source| ConfigError::Serialize { source })
    }

    /// Writes the configuration back to its file, creating parent directories.
    pub fn persist(&self) -> Result<PathBuf, ConfigError> {
        let target = match &self.path {
            Some(path) => path.clone(),
            None => default_config_path().ok_or(ConfigError::NoConfigPath)?,
        };
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).map_err(|source| ConfigError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })?;
        }
        let serialized = self.render()?;
        fs::write(&target, serialized).map_err(|source| ConfigError::Write {
            path: target.clone(),
            source,
        })?;
        Ok(target)
    }
}

fn read_file(path: &Path) -> Result<ConfigData, ConfigError> {
    let contents = fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;
    toml::from_str(&contents).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Errors raised while loading or saving the configuration file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The file exists but could not be read.
    #[error("failed to read config {path}: {source}")]
    Read {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// The file is not valid TOML for this schema.
    #[error("failed to parse config {path}: {source}")]
    Parse {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        source: toml::de::Error,
    },
    /// The configuration could not be rendered.
    #[error("failed to serialize config: {source}")]
    Serialize {
        /// Underlying error.
        source: toml::ser::Error,
    },
    /// The file could not be written.
    #[error("failed to write config {path}: {source}")]
    Write {
        /// File path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// The parent directory could not be created.
    #[error("failed to create config directory {path}: {source}")]
    CreateDir {
        /// Directory path.
        path: PathBuf,
        /// Underlying error.
        source: std::io::Error,
    },
    /// No explicit path was given and the platform has no config directory.
    #[error("no config directory found; pass --config or set CONSOLIDATOR_CONFIG")]
    NoConfigPath,
}

/// `<config dir>/locality-consolidator/config.toml`.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|base| base.join("locality-consolidator").join("config.toml"))
}
