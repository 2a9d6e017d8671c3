//! Configuration loading and resolution
//!
//! Settings are resolved in priority order:
//! 1. Command-line argument (highest priority)
//! 2. Environment variable
//! 3. TOML config file
//! 4. Compiled default (fallback)
//!
//! Command-line and environment values arrive together as `ConfigOverrides`
//! (clap reads both). A missing TOML file is not an error; the service starts
//! with defaults and logs a warning.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Environment variable naming an explicit TOML config file
pub const CONFIG_PATH_ENV: &str = "SOUNDBOARD_CONFIG";

/// Default maximum accepted audio file size: 50 MiB
pub const DEFAULT_MAX_FILE_SIZE: u64 = 50 * 1024 * 1024;

/// Bootstrap configuration loaded from TOML file
///
/// Every field is optional; absent fields fall through to compiled defaults.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct TomlConfig {
    /// Directory holding the audio files
    #[serde(default)]
    pub audio_dir: Option<PathBuf>,

    /// Maximum accepted file size in bytes
    #[serde(default)]
    pub max_file_size: Option<u64>,

    /// Enable the filesystem change watcher
    #[serde(default)]
    pub watch: Option<bool>,

    /// Per-file metadata build timeout in milliseconds
    #[serde(default)]
    pub build_timeout_ms: Option<u64>,

    /// HTTP bind address
    #[serde(default)]
    pub host: Option<String>,

    /// HTTP server port
    #[serde(default)]
    pub port: Option<u16>,

    /// Directory with the browser frontend (served at `/`)
    #[serde(default)]
    pub public_dir: Option<PathBuf>,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Logging configuration
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    #[serde(default)]
    pub level: Option<String>,
}

/// Compiled default values
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub audio_dir: PathBuf,
    pub max_file_size: u64,
    pub watch: bool,
    pub build_timeout_ms: u64,
    pub host: String,
    pub port: u16,
    pub log_level: String,
}

impl Default for CompiledDefaults {
    fn default() -> Self {
        Self {
            audio_dir: PathBuf::from("./sounds"),
            max_file_size: DEFAULT_MAX_FILE_SIZE,
            watch: true,
            build_timeout_ms: 5_000,
            host: "127.0.0.1".to_string(),
            port: 3000,
            log_level: "info".to_string(),
        }
    }
}

/// Values supplied on the command line or through the environment
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub audio_dir: Option<PathBuf>,
    pub max_file_size: Option<u64>,
    pub watch: Option<bool>,
    pub build_timeout_ms: Option<u64>,
    pub host: Option<String>,
    pub port: Option<u16>,
    pub public_dir: Option<PathBuf>,
    pub log_level: Option<String>,
}

/// Fully resolved service configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// Watched audio directory
    pub audio_dir: PathBuf,
    /// Maximum accepted file size in bytes
    pub max_file_size: u64,
    /// Whether the change watcher runs
    pub watch: bool,
    /// Per-file metadata build timeout in milliseconds
    pub build_timeout_ms: u64,
    /// HTTP bind address
    pub host: String,
    /// HTTP port
    pub port: u16,
    /// Optional static frontend directory
    pub public_dir: Option<PathBuf>,
    /// Log level directive
    pub log_level: String,
}

impl ServerConfig {
    /// Merge overrides, TOML values and compiled defaults
    ///
    /// Returns `Error::Config` if the merged values are unusable.
    pub fn resolve(overrides: ConfigOverrides, toml: TomlConfig) -> Result<Self> {
        let defaults = CompiledDefaults::default();

        let config = Self {
            audio_dir: overrides
                .audio_dir
                .or(toml.audio_dir)
                .unwrap_or(defaults.audio_dir),
            max_file_size: overrides
                .max_file_size
                .or(toml.max_file_size)
                .unwrap_or(defaults.max_file_size),
            watch: overrides.watch.or(toml.watch).unwrap_or(defaults.watch),
            build_timeout_ms: overrides
                .build_timeout_ms
                .or(toml.build_timeout_ms)
                .unwrap_or(defaults.build_timeout_ms),
            host: overrides.host.or(toml.host).unwrap_or(defaults.host),
            port: overrides.port.or(toml.port).unwrap_or(defaults.port),
            public_dir: overrides.public_dir.or(toml.public_dir),
            log_level: overrides
                .log_level
                .or(toml.logging.level)
                .unwrap_or(defaults.log_level),
        };

        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.max_file_size == 0 {
            return Err(Error::Config(
                "max_file_size must be greater than zero".to_string(),
            ));
        }
        if self.build_timeout_ms == 0 {
            return Err(Error::Config(
                "build_timeout_ms must be greater than zero".to_string(),
            ));
        }
        if self.audio_dir.as_os_str().is_empty() {
            return Err(Error::Config("audio_dir must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Determine which TOML file to read
///
/// Priority: command-line argument, then `SOUNDBOARD_CONFIG`, then the
/// platform config directory (`~/.config/soundboard/config.toml` on Linux).
pub fn resolve_config_path(cli_arg: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = cli_arg {
        return Some(path.to_path_buf());
    }

    if let Ok(path) = std::env::var(CONFIG_PATH_ENV) {
        if !path.trim().is_empty() {
            return Some(PathBuf::from(path));
        }
    }

    default_config_path()
}

/// Platform default location of the TOML config file
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("soundboard").join("config.toml"))
}

/// Load TOML configuration
///
/// A missing file yields defaults with a warning. A file that exists but
/// cannot be read is an `Io` error, one that cannot be parsed a `Config` error.
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    if !path.exists() {
        warn!(
            "Config file {} not found, using defaults",
            path.display()
        );
        return Ok(TomlConfig::default());
    }

    let content = std::fs::read_to_string(path).map_err(|source| Error::Io {
        path: path.to_path_buf(),
        source,
    })?;

    let config: TomlConfig = toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse TOML failed ({}): {}", path.display(), e)))?;

    info!("Loaded TOML configuration from {}", path.display());
    Ok(config)
}
