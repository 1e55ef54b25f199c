//! Catalog configuration passed explicitly into store and fingerprinter.
//!
//! # Responsibility
//! - Carry the digest algorithm and table-name overrides as one value.
//! - Load configuration from TOML text or a TOML file.
//! - Resolve default catalog and log locations under the user's home.
//!
//! # Invariants
//! - Table names are plain SQL identifiers and pairwise distinct.
//! - Every field has a default, so an empty document is a valid config.

use crate::fingerprint::DigestAlgorithm;
use serde::{Deserialize, Serialize};
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::path::{Path, PathBuf};

const DEFAULT_CATALOG_FILE_NAME: &str = ".contentdex.sqlite";
const DEFAULT_LOG_DIR_NAME: &str = ".contentdex/logs";

/// Fixed-name tables created by the bibliography migration.
const METADATA_TABLES: [&str; 5] = [
    "publication",
    "author",
    "topic",
    "publication_author",
    "publication_topic",
];

pub type ConfigResult<T> = Result<T, ConfigError>;

/// Configuration loading and validation error.
#[derive(Debug)]
pub enum ConfigError {
    Io { path: PathBuf, source: std::io::Error },
    Parse(toml::de::Error),
    InvalidTableName { role: &'static str, name: String },
    DuplicateTableName(String),
    /// The name belongs to a metadata table or to SQLite itself.
    ReservedTableName { role: &'static str, name: String },
}

impl Display for ConfigError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io { path, source } => {
                write!(f, "failed to read config `{}`: {source}", path.display())
            }
            Self::Parse(err) => write!(f, "invalid config: {err}"),
            Self::InvalidTableName { role, name } => {
                write!(f, "invalid {role} table name `{name}`")
            }
            Self::DuplicateTableName(name) => {
                write!(f, "table name `{name}` is used for more than one table")
            }
            Self::ReservedTableName { role, name } => {
                write!(f, "{role} table name `{name}` is reserved")
            }
        }
    }
}

impl Error for ConfigError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::Parse(err) => Some(err),
            Self::InvalidTableName { .. }
            | Self::DuplicateTableName(_)
            | Self::ReservedTableName { .. } => None,
        }
    }
}

impl From<toml::de::Error> for ConfigError {
    fn from(value: toml::de::Error) -> Self {
        Self::Parse(value)
    }
}

/// Physical names of the three catalog tables.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TableNames {
    pub content: String,
    pub repository: String,
    pub location: String,
}

impl Default for TableNames {
    fn default() -> Self {
        Self {
            content: "content".to_string(),
            repository: "repository".to_string(),
            location: "location".to_string(),
        }
    }
}

impl TableNames {
    /// Checks identifier shape, reserved names and distinctness.
    pub fn validate(&self) -> ConfigResult<()> {
        let roles = [
            ("content", self.content.as_str()),
            ("repository", self.repository.as_str()),
            ("location", self.location.as_str()),
        ];
        for (role, name) in roles {
            if !is_sql_identifier(name) {
                return Err(ConfigError::InvalidTableName {
                    role,
                    name: name.to_string(),
                });
            }
            if is_reserved_table_name(name) {
                return Err(ConfigError::ReservedTableName {
                    role,
                    name: name.to_string(),
                });
            }
        }
        for (index, (_, name)) in roles.iter().enumerate() {
            if roles[index + 1..]
                .iter()
                .any(|(_, other)| other.eq_ignore_ascii_case(name))
            {
                return Err(ConfigError::DuplicateTableName((*name).to_string()));
            }
        }
        Ok(())
    }

    /// Substitutes `{content}`, `{repository}` and `{location}` placeholders.
    pub(crate) fn render(&self, sql: &str) -> String {
        sql.replace("{content}", &self.content)
            .replace("{repository}", &self.repository)
            .replace("{location}", &self.location)
    }
}

/// Explicit configuration for a catalog instance.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CatalogConfig {
    pub digest_algorithm: DigestAlgorithm,
    pub table_names: TableNames,
}

impl CatalogConfig {
    /// Parses and validates a TOML document.
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let config: CatalogConfig = toml::from_str(text)?;
        config.table_names.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a TOML file.
    pub fn load(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }
}

/// Default catalog database file, `~/.contentdex.sqlite`.
///
/// Falls back to the working directory when no home directory is known.
pub fn default_catalog_path() -> PathBuf {
    home_or_cwd().join(DEFAULT_CATALOG_FILE_NAME)
}

/// Default rolling-log directory, `~/.contentdex/logs`.
pub fn default_log_dir() -> PathBuf {
    home_or_cwd().join(DEFAULT_LOG_DIR_NAME)
}

fn home_or_cwd() -> PathBuf {
    dirs::home_dir()
        .or_else(|| std::env::current_dir().ok())
        .unwrap_or_else(|| PathBuf::from("."))
}

fn is_reserved_table_name(name: &str) -> bool {
    name.to_ascii_lowercase().starts_with("sqlite_")
        || METADATA_TABLES
            .iter()
            .any(|reserved| reserved.eq_ignore_ascii_case(name))
}

fn is_sql_identifier(value: &str) -> bool {
    let mut chars = value.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() || first == '_' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_')
}
