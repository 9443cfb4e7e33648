//! Configuration management for the statuslined daemon.
//!
//! Handles loading, parsing, and validation of the YAML configuration file
//! that declares which modules make up the status line and in what order.

use anyhow::{Context, Result};
use log::info;
use serde::{Deserialize, Serialize};
use std::{
    env, fs,
    path::{Path, PathBuf},
};

use crate::error::Error;

/// Main configuration structure for the statuslined daemon.
///
/// The `modules` list order is the concatenation order of the status line.
///
/// # Example
///
/// ```yaml
/// version: 1
/// sink:
///   kind: x11
///
/// modules:
///   - kind: keyboard
///     format: "KB %symbol% [%caps%%num%] | "
///   - kind: volume
///     format: "VOL %volume%%state% | "
///     device: default
///     control: Master
///   - kind: brightness
///     format: "BL %value% | "
///     card: intel_backlight
///   - kind: clock
///     format: "%a %d %b %H:%M"
///     interval: 60
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Configuration version for compatibility checking.
    pub version: u8,

    /// Where the aggregated line is published.
    #[serde(default)]
    pub sink: SinkCfg,

    /// Ordered list of status line modules.
    #[serde(default)]
    pub modules: Vec<ModuleCfg>,
}

/// Status line module variants.
///
/// Adding a module type means adding a variant here and a matching
/// [`ModuleSource`](crate::sources::ModuleSource) implementation; there is no
/// separate dispatch table to patch.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum ModuleCfg {
    /// Wall-clock time, rendered with a strftime-style format.
    Clock {
        /// strftime format, e.g. `"%a %d %b %H:%M"`.
        format: String,

        /// Tick interval in seconds; wakeups align to wall-clock multiples.
        #[serde(default = "defaults::clock_interval")]
        interval: u16,
    },

    /// Backlight brightness percentage. Token: `%value%`.
    Brightness {
        format: String,

        /// Card name under `/sys/class/backlight`.
        card: String,
    },

    /// ALSA mixer volume. Tokens: `%volume%`, `%state%`.
    Volume {
        format: String,

        /// ALSA device, e.g. `default`.
        #[serde(default = "defaults::volume_device")]
        device: String,

        /// Mixer control, e.g. `Master`.
        #[serde(default = "defaults::volume_control")]
        control: String,
    },

    /// Keyboard layout and lock indicators. Tokens: `%name%`, `%symbol%`,
    /// `%caps%`, `%num%`, `%scroll%`.
    Keyboard { format: String },
}

impl ModuleCfg {
    /// Stable key identifying the module variant, used for worker names.
    pub fn key(&self) -> &'static str {
        match self {
            ModuleCfg::Clock { .. } => "clock",
            ModuleCfg::Brightness { .. } => "brightness",
            ModuleCfg::Volume { .. } => "volume",
            ModuleCfg::Keyboard { .. } => "keyboard",
        }
    }

    /// The module's configured format string.
    pub fn format(&self) -> &str {
        match self {
            ModuleCfg::Clock { format, .. }
            | ModuleCfg::Brightness { format, .. }
            | ModuleCfg::Volume { format, .. }
            | ModuleCfg::Keyboard { format } => format,
        }
    }
}

/// Display sink variants.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "kebab-case")]
pub enum SinkCfg {
    /// Root-window `WM_NAME` property of the X display.
    #[default]
    X11,
    /// One line per publish on standard output.
    Stdout,
}

impl Config {
    /// Validates the configuration for consistency.
    pub fn validate(&self) -> Result<(), Error> {
        if self.modules.is_empty() {
            return Err(Error::config("at least one module must be configured"));
        }

        for module in &self.modules {
            if module.format().is_empty() {
                return Err(Error::config(format!(
                    "module '{}' has an empty format",
                    module.key()
                )));
            }

            if let ModuleCfg::Clock { interval, .. } = module {
                if *interval == 0 {
                    return Err(Error::config("clock interval must be greater than 0"));
                }
            }

            if let ModuleCfg::Brightness { card, .. } = module {
                if card.is_empty() {
                    return Err(Error::config("brightness module requires a card name"));
                }
            }
        }

        Ok(())
    }
}

mod defaults {
    /// Default clock tick in seconds.
    pub fn clock_interval() -> u16 {
        60
    }

    pub fn volume_device() -> String {
        "default".to_string()
    }

    pub fn volume_control() -> String {
        "Master".to_string()
    }
}

fn locate_config() -> Result<PathBuf> {
    // 1) ENV
    if let Ok(env_path) = env::var("STATUSLINED_CONFIG") {
        return Ok(PathBuf::from(env_path));
    }

    // 2) XDG_CONFIG_HOME or $HOME/.config
    if let Some(mut cfg_dir) = env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(|| env::var_os("HOME").map(|h| Path::new(&h).join(".config")))
    {
        cfg_dir.push("statuslined/config.yml");
        if cfg_dir.exists() {
            return Ok(cfg_dir);
        }
    }

    // 3) /etc
    let etc = Path::new("/etc/statuslined/config.yml");
    if etc.exists() {
        return Ok(etc.to_path_buf());
    }

    anyhow::bail!("Configuration file not found in any standard location")
}

/// Configuration manager that handles config data and file operations.
///
/// # Example
///
/// ```no_run
/// use statuslined::config::ConfigManager;
/// use std::path::PathBuf;
///
/// # fn example() -> anyhow::Result<()> {
/// // Load from a specific path
/// let config_manager = ConfigManager::load(Some(PathBuf::from("config.yml")))?;
///
/// // Load from standard locations
/// let config_manager = ConfigManager::load(None)?;
///
/// let module_count = config_manager.get().modules.len();
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct ConfigManager {
    config: Config,
    path: PathBuf,
}

impl ConfigManager {
    /// Creates a new ConfigManager with the given config and path.
    pub fn new(config: Config, path: PathBuf) -> Self {
        Self { config, path }
    }

    /// Loads configuration from a file or the standard locations.
    ///
    /// Searches in the following order:
    /// 1. Provided path parameter
    /// 2. STATUSLINED_CONFIG environment variable
    /// 3. XDG_CONFIG_HOME/statuslined/config.yml or ~/.config/statuslined/config.yml
    /// 4. /etc/statuslined/config.yml
    pub fn load(path: Option<PathBuf>) -> Result<Self> {
        let config_path = match path {
            Some(p) => p,
            None => locate_config().context("No configuration file found")?,
        };

        info!("Loading config from: {}", config_path.display());
        let config = Self::load_config_from_path(&config_path)?;

        Ok(Self::new(config, config_path))
    }

    /// The current configuration.
    pub fn get(&self) -> &Config {
        &self.config
    }

    /// The path the configuration was loaded from.
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn load_config_from_path(path: &Path) -> Result<Config> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file: {}", path.display()))?;

        let config: Config = serde_yaml::from_str(&content)
            .with_context(|| format!("Failed to parse YAML in: {}", path.display()))?;

        if config.version != 1 {
            anyhow::bail!(
                "Unsupported config version {} in file: {}",
                config.version,
                path.display()
            );
        }

        config
            .validate()
            .with_context(|| format!("Configuration validation failed for: {}", path.display()))?;

        Ok(config)
    }
}
