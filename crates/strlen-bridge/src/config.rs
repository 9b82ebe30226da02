//! Bridge configuration
//!
//! Names the native library and export, and where to look for the file.
//! Loaded from TOML:
//!
//! ```toml
//! library = "string_length"
//! symbol = "calculate_string_length_from_rust"
//! search_paths = ["/opt/app/lib"]
//! system_search_paths = true
//! ```
//!
//! Every field is optional; missing fields take the defaults above (with no
//! extra search paths).

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// Library base name produced by the `strlen-native` crate
pub const DEFAULT_LIBRARY: &str = "string_length";

/// Function exported by the `strlen-native` crate
pub const DEFAULT_SYMBOL: &str = "calculate_string_length_from_rust";

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read configuration file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax in {file}: {error}")]
    TomlParseError {
        file: PathBuf,
        error: toml::de::Error,
    },

    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue { field: String, reason: String },
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

/// Where the native library lives and what it exports
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    /// Library base name without platform prefix or suffix
    pub library: String,

    /// Exported function name
    pub symbol: String,

    /// Directories searched before any other location
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub search_paths: Vec<PathBuf>,

    /// Also search the platform library path variable and system directories
    pub system_search_paths: bool,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            library: DEFAULT_LIBRARY.to_string(),
            symbol: DEFAULT_SYMBOL.to_string(),
            search_paths: Vec::new(),
            system_search_paths: true,
        }
    }
}

impl BridgeConfig {
    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> ConfigResult<Self> {
        Self::parse(content, Path::new("<string>"))
    }

    /// Load and validate a TOML file
    pub fn load_from_file(path: &Path) -> ConfigResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::IoError(e)
            }
        })?;

        Self::parse(&content, path)
    }

    fn parse(content: &str, file: &Path) -> ConfigResult<Self> {
        let config: Self = toml::from_str(content).map_err(|e| ConfigError::TomlParseError {
            file: file.to_path_buf(),
            error: e,
        })?;

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> ConfigResult<()> {
        if self.library.is_empty() {
            return Err(ConfigError::InvalidValue {
                field: "library".to_string(),
                reason: "must not be empty".to_string(),
            });
        }
        if self.library.contains(['/', '\\']) {
            return Err(ConfigError::InvalidValue {
                field: "library".to_string(),
                reason: format!(
                    "'{}' is a path; give the base name and add its directory to search_paths",
                    self.library
                ),
            });
        }
        if !is_c_identifier(&self.symbol) {
            return Err(ConfigError::InvalidValue {
                field: "symbol".to_string(),
                reason: format!("'{}' is not a C identifier", self.symbol),
            });
        }
        Ok(())
    }
}

fn is_c_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first == '_' || first.is_ascii_alphabetic() => {
            chars.all(|c| c == '_' || c.is_ascii_alphanumeric())
        }
        _ => false,
    }
}
