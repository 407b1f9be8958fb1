//! Bootstrap configuration loading and root folder resolution
//!
//! Two layers, resolved in this priority order:
//! 1. Command-line argument / environment variable (handled by each binary's clap `Args`)
//! 2. TOML config file (`~/.config/caelum/<module>.toml`)
//! 3. OS-dependent compiled default
//!
//! A missing TOML file is never fatal: a warning is logged and defaults apply.

use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

/// Environment variable naming the root folder
pub const ROOT_FOLDER_ENV: &str = "CAELUM_ROOT_FOLDER";

/// Alternative (shorter) root folder variable
pub const ROOT_ENV: &str = "CAELUM_ROOT";

/// Database file name inside the root folder
pub const DATABASE_FILE: &str = "caelum.db";

/// Bootstrap configuration loaded from TOML
///
/// Every field is optional so that partial files are valid.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct TomlConfig {
    /// Folder holding the database
    #[serde(default)]
    pub root_folder: Option<PathBuf>,

    /// HTTP server port
    #[serde(default)]
    pub port: Option<u16>,

    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub relay: RelaySection,

    #[serde(default)]
    pub stats: StatsSection,

    #[serde(default)]
    pub notifications: NotificationsSection,

    #[serde(default)]
    pub mint: MintSection,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error) or a full EnvFilter directive
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// `[relay]` section: mint relay endpoint
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct RelaySection {
    pub endpoint: Option<String>,
    pub token: Option<String>,
    /// "simple" or "sig"
    pub mode: Option<String>,
}

/// `[stats]` section
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct StatsSection {
    /// Shared secret expected in `x-caelum-secret` by the record-shard webhook
    pub webhook_secret: Option<String>,
}

/// `[notifications]` section: outbound webhooks
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NotificationsSection {
    pub reflection_webhook: Option<String>,
    pub mint_webhook: Option<String>,
}

/// `[mint]` section: typed-data domain and content gateway
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct MintSection {
    pub domain_name: Option<String>,
    pub domain_version: Option<String>,
    pub chain_id: Option<u64>,
    pub verifying_contract: Option<String>,
    pub gateway_base: Option<String>,
}

/// Parse a TOML config file
pub fn load_toml_config(path: &Path) -> Result<TomlConfig> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| Error::Config(format!("Read {} failed: {}", path.display(), e)))?;
    toml::from_str(&content)
        .map_err(|e| Error::Config(format!("Parse {} failed: {}", path.display(), e)))
}

/// Default config file location for a module (`<config_dir>/caelum/<module>.toml`)
pub fn default_config_path(module_name: &str) -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("caelum").join(format!("{}.toml", module_name)))
}

/// Load the module's TOML config, falling back to defaults
///
/// An explicit path that cannot be read or parsed is an error. A missing
/// file at the default location only logs a warning.
pub fn load_or_default(module_name: &str, explicit: Option<&Path>) -> Result<TomlConfig> {
    if let Some(path) = explicit {
        return load_toml_config(path);
    }

    match default_config_path(module_name) {
        Some(path) if path.exists() => {
            debug!("Loading config from {}", path.display());
            load_toml_config(&path)
        }
        Some(path) => {
            warn!(
                "Config file {} not found, using built-in defaults",
                path.display()
            );
            Ok(TomlConfig::default())
        }
        None => {
            warn!("Could not determine config directory, using built-in defaults");
            Ok(TomlConfig::default())
        }
    }
}

/// OS-dependent compiled defaults
#[derive(Debug, Clone)]
pub struct CompiledDefaults {
    pub root_folder: PathBuf,
    pub log_level: String,
}

impl CompiledDefaults {
    pub fn for_current_platform() -> Self {
        let root_folder = if cfg!(target_os = "windows") {
            dirs::data_local_dir()
                .map(|d| d.join("caelum"))
                .unwrap_or_else(|| PathBuf::from("C:\\ProgramData\\caelum"))
        } else {
            // ~/.local/share/caelum on Linux, ~/Library/Application Support/caelum on macOS
            dirs::data_local_dir()
                .map(|d| d.join("caelum"))
                .unwrap_or_else(|| PathBuf::from("./caelum_data"))
        };

        Self {
            root_folder,
            log_level: default_log_level(),
        }
    }
}

/// Root folder resolution: CLI → ENV → TOML → compiled default
#[derive(Debug, Clone)]
pub struct RootFolderResolver {
    module_name: String,
    cli_arg: Option<PathBuf>,
    toml_value: Option<PathBuf>,
}

impl RootFolderResolver {
    pub fn new(module_name: impl Into<String>) -> Self {
        Self {
            module_name: module_name.into(),
            cli_arg: None,
            toml_value: None,
        }
    }

    /// Highest-priority override from the command line
    pub fn with_cli_arg(mut self, path: Option<PathBuf>) -> Self {
        self.cli_arg = path;
        self
    }

    /// Value already read from the module's TOML file
    pub fn with_toml(mut self, config: &TomlConfig) -> Self {
        self.toml_value = config.root_folder.clone();
        self
    }

    pub fn resolve(&self) -> PathBuf {
        if let Some(path) = &self.cli_arg {
            return path.clone();
        }

        // CAELUM_ROOT_FOLDER wins over CAELUM_ROOT
        for var in [ROOT_FOLDER_ENV, ROOT_ENV] {
            if let Ok(path) = std::env::var(var) {
                if !path.trim().is_empty() {
                    return PathBuf::from(path);
                }
            }
        }

        if let Some(path) = &self.toml_value {
            return path.clone();
        }

        debug!(
            module = %self.module_name,
            "No root folder configured, using compiled default"
        );
        CompiledDefaults::for_current_platform().root_folder
    }
}

/// Creates the root folder and locates the database inside it
#[derive(Debug, Clone)]
pub struct RootFolderInitializer {
    root_folder: PathBuf,
}

impl RootFolderInitializer {
    pub fn new(root_folder: PathBuf) -> Self {
        Self { root_folder }
    }

    /// Create the root folder if missing (idempotent)
    pub fn ensure_directory_exists(&self) -> Result<()> {
        std::fs::create_dir_all(&self.root_folder)?;
        Ok(())
    }

    pub fn database_path(&self) -> PathBuf {
        self.root_folder.join(DATABASE_FILE)
    }

    pub fn database_exists(&self) -> bool {
        self.database_path().exists()
    }
}
