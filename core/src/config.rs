//! Configuration management (`config.toml`)
//!
//! Handles loading, saving, and providing defaults for scheduler and
//! Time Machine settings. Settings are stored in TOML format in the
//! platform-specific config directory unless a path is given explicitly.

use serde::{Deserialize, Deserializer, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

/// Name of the configuration file inside the config directory
pub const CONFIG_FILE: &str = "config.toml";

/// Error loading or saving configuration
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to access config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config file {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),
}

/// Application configuration.
///
/// Player and developer profiles carry separate Time Machine settings;
/// `developer_settings` selects which one is active.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Use the developer profile instead of the player profile
    #[serde(default)]
    pub developer_settings: bool,
    /// Advance to the next slot after every save
    #[serde(default)]
    pub autoslot: bool,
    /// Directory for save-state files (default: `<data dir>/state`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub state_dir: Option<PathBuf>,
    /// Player profile
    #[serde(
        default = "TimeMachineConfig::player",
        deserialize_with = "player_profile"
    )]
    pub player: TimeMachineConfig,
    /// Developer profile
    #[serde(
        default = "TimeMachineConfig::developer",
        deserialize_with = "developer_profile"
    )]
    pub developer: TimeMachineConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            developer_settings: false,
            autoslot: false,
            state_dir: None,
            player: TimeMachineConfig::player(),
            developer: TimeMachineConfig::developer(),
        }
    }
}

/// Time Machine settings for one profile.
///
/// Intervals and horizons are measured in rendered frames. A profile section
/// may list any subset of fields; the rest come from that profile's defaults.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TimeMachineConfig {
    /// Whether the Time Machine is enabled
    pub time_machine: bool,
    /// Maximum number of history entries
    pub size: usize,
    /// Newest entries kept at full density
    pub uncompressed: usize,
    /// Frames between periodic captures
    pub interval: u32,
    /// Frames of history the full buffer should span
    pub horizon: u64,
    /// Store history entries lz4-compressed
    pub compress: bool,
}

impl TimeMachineConfig {
    /// Player defaults: 200 entries reaching back ten minutes
    pub fn player() -> Self {
        Self {
            time_machine: true,
            size: 200,
            uncompressed: 60,
            interval: 1,
            horizon: 10 * 60 * 60,
            compress: true,
        }
    }

    /// Developer defaults: 1000 entries, every frame for the last ten seconds
    pub fn developer() -> Self {
        Self {
            time_machine: true,
            size: 1000,
            uncompressed: 600,
            interval: 1,
            horizon: 30 * 60,
            compress: true,
        }
    }
}

/// A profile section as written in the file
#[derive(Deserialize)]
struct ProfileSection {
    time_machine: Option<bool>,
    size: Option<usize>,
    uncompressed: Option<usize>,
    interval: Option<u32>,
    horizon: Option<u64>,
    compress: Option<bool>,
}

impl ProfileSection {
    fn over(self, base: TimeMachineConfig) -> TimeMachineConfig {
        TimeMachineConfig {
            time_machine: self.time_machine.unwrap_or(base.time_machine),
            size: self.size.unwrap_or(base.size),
            uncompressed: self.uncompressed.unwrap_or(base.uncompressed),
            interval: self.interval.unwrap_or(base.interval),
            horizon: self.horizon.unwrap_or(base.horizon),
            compress: self.compress.unwrap_or(base.compress),
        }
    }
}

fn player_profile<'de, D: Deserializer<'de>>(d: D) -> Result<TimeMachineConfig, D::Error> {
    Ok(ProfileSection::deserialize(d)?.over(TimeMachineConfig::player()))
}

fn developer_profile<'de, D: Deserializer<'de>>(d: D) -> Result<TimeMachineConfig, D::Error> {
    Ok(ProfileSection::deserialize(d)?.over(TimeMachineConfig::developer()))
}

/// Returns the platform-specific configuration directory.
///
/// On Windows: `%APPDATA%\Timeslice\config`
/// On macOS: `~/Library/Application Support/io.timeslice.Timeslice`
/// On Linux: `~/.config/Timeslice`
///
/// Returns `None` if the home directory cannot be determined.
pub fn config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("io.timeslice", "", "Timeslice")
        .map(|dirs| dirs.config_dir().to_path_buf())
}

/// Returns the platform-specific data directory.
///
/// Save states live in its `state` subdirectory by default.
pub fn data_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("io.timeslice", "", "Timeslice")
        .map(|dirs| dirs.data_dir().to_path_buf())
}

/// Default config file location
pub fn default_config_path() -> Option<PathBuf> {
    config_dir().map(|dir| dir.join(CONFIG_FILE))
}

/// Loads configuration from `path`.
///
/// A missing file yields the defaults; a malformed file is an error.
pub fn load_from(path: &Path) -> Result<Config, ConfigError> {
    let content = match fs::read_to_string(path) {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Config::default()),
        Err(source) => {
            return Err(ConfigError::Io {
                path: path.to_path_buf(),
                source,
            });
        }
    };

    toml::from_str(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Saves configuration to `path`, creating parent directories.
pub fn save_to(path: &Path, config: &Config) -> Result<(), ConfigError> {
    let content = toml::to_string_pretty(config)?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| ConfigError::Io {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, content).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Live settings with an optional backing file
///
/// Changes made through the State Manager are written back immediately when
/// a path is set.
#[derive(Debug, Clone)]
pub struct Settings {
    config: Config,
    path: Option<PathBuf>,
}

impl Settings {
    pub fn new(config: Config, path: Option<PathBuf>) -> Self {
        Self { config, path }
    }

    /// Settings that are never written to disk
    pub fn in_memory(config: Config) -> Self {
        Self::new(config, None)
    }

    /// Load settings from `path`, keeping it as the backing file
    pub fn load(path: PathBuf) -> Result<Self, ConfigError> {
        let config = load_from(&path)?;
        Ok(Self::new(config, Some(path)))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    /// Time Machine settings of the active profile
    pub fn time_machine_profile(&self) -> &TimeMachineConfig {
        if self.config.developer_settings {
            &self.config.developer
        } else {
            &self.config.player
        }
    }

    pub fn time_machine_enabled(&self) -> bool {
        self.time_machine_profile().time_machine
    }

    /// Set the Time Machine flag of the active profile
    pub fn set_time_machine_enabled(&mut self, enabled: bool) {
        if self.config.developer_settings {
            self.config.developer.time_machine = enabled;
        } else {
            self.config.player.time_machine = enabled;
        }
    }

    pub fn autoslot(&self) -> bool {
        self.config.autoslot
    }

    /// Directory holding save-state files
    pub fn state_dir(&self) -> PathBuf {
        self.config
            .state_dir
            .clone()
            .or_else(|| data_dir().map(|dir| dir.join("state")))
            .unwrap_or_else(|| PathBuf::from("state"))
    }

    /// Write settings to the backing file, if any
    pub fn persist(&self) -> Result<(), ConfigError> {
        match &self.path {
            Some(path) => save_to(path, &self.config),
            None => Ok(()),
        }
    }
}

impl Default for Settings {
    fn default() -> Self {
        Self::in_memory(Config::default())
    }
}
