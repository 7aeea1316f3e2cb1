//! Configuration handling for schema_annotate

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs;
use std::str::FromStr;

use crate::error::{Error, Result};

/// Default location of the configuration file
pub const DEFAULT_CONFIG_PATH: &str = "schema_annotate.toml";

/// Load configuration from a TOML file
pub fn load_from_file(path: &str) -> Result<Config> {
    let config_str = fs::read_to_string(path)
        .map_err(|e| Error::ConfigError(format!("Failed to read config file: {}", e)))?;

    let config: Config = toml::from_str(&config_str)
        .map_err(|e| Error::ConfigError(format!("Failed to parse config file: {}", e)))?;

    Ok(config)
}

/// Represents the complete schema_annotate configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Config {
    pub database: DatabaseConfig,
    #[serde(default)]
    pub models: ModelsConfig,
    #[serde(default)]
    pub naming: NamingConfig,
    #[serde(default)]
    pub annotate: AnnotateConfig,
    pub logging: Option<LoggingConfig>,
}

impl Config {
    /// Default configuration for a bare database URL
    pub fn for_database_url(url: &str) -> Self {
        Self {
            database: DatabaseConfig {
                url: url.to_string(),
                ..Default::default()
            },
            models: ModelsConfig::default(),
            naming: NamingConfig::default(),
            annotate: AnnotateConfig::default(),
            logging: None,
        }
    }
}

/// Database connection configuration
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct DatabaseConfig {
    /// `postgres`, `mysql` or `sqlite`; inferred from the URL when absent
    pub driver: Option<String>,
    pub url: String,
    pub pool_size: Option<u32>,
    pub timeout_seconds: Option<u64>,
    pub schema: Option<String>,
}

impl DatabaseConfig {
    /// The configured driver, or the one implied by the URL scheme
    pub fn driver_name(&self) -> Result<String> {
        if let Some(driver) = &self.driver {
            return Ok(driver.to_lowercase());
        }

        let scheme = self.url.split(':').next().unwrap_or_default();
        match scheme {
            "postgres" | "postgresql" => Ok("postgres".to_string()),
            "mysql" | "mariadb" => Ok("mysql".to_string()),
            "sqlite" => Ok("sqlite".to_string()),
            _ => Err(Error::ConfigError(format!(
                "Cannot infer database driver from url scheme '{}'",
                scheme
            ))),
        }
    }
}

/// Model discovery configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct ModelsConfig {
    pub paths: Vec<String>,
    pub exclude_paths: Option<Vec<String>>,
    pub extensions: Vec<String>,
    pub recursive_scan: bool,
    /// Superclass a declaration must name to count as a model
    pub base_type: String,
    /// Files containing `# <skip_marker>: false` are never touched
    pub skip_marker: String,
    /// Model name to table name overrides
    pub tables: HashMap<String, String>,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            paths: vec!["app/models".to_string()],
            exclude_paths: None,
            extensions: vec!["rb".to_string()],
            recursive_scan: true,
            base_type: "Sequel::Model".to_string(),
            skip_marker: "schema-annotate".to_string(),
            tables: HashMap::new(),
        }
    }
}

/// Naming conventions used to derive table names from model names
#[derive(Debug, Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct NamingConfig {
    pub table_style: String,
    pub pluralize_tables: bool,
}

impl Default for NamingConfig {
    fn default() -> Self {
        Self {
            table_style: "snake_case".to_string(),
            pluralize_tables: true,
        }
    }
}

/// Annotation behaviour
#[derive(Debug, Serialize, Deserialize, Clone, Default)]
#[serde(default)]
pub struct AnnotateConfig {
    #[serde(flatten)]
    pub render: RenderOptions,
    /// Leave every file alone
    pub skip: bool,
    pub namespace: Option<NamespaceSetting>,
}

/// Where the comment block goes in the file
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum Position {
    /// Replace a trailing block or append a new one
    #[default]
    After,
    /// Replace a leading block or prepend a new one
    Before,
}

impl FromStr for Position {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "after" | "end" => Ok(Position::After),
            "before" | "top" => Ok(Position::Before),
            other => Err(format!("unknown position '{}', expected 'after' or 'before'", other)),
        }
    }
}

/// Line terminator used for rendered and patched text
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum LineEnding {
    #[default]
    Native,
    Lf,
    Crlf,
}

impl LineEnding {
    pub fn as_str(&self) -> &'static str {
        match self {
            LineEnding::Lf => "\n",
            LineEnding::Crlf => "\r\n",
            LineEnding::Native if cfg!(windows) => "\r\n",
            LineEnding::Native => "\n",
        }
    }
}

/// Section toggles and placement for a rendered comment
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(default)]
pub struct RenderOptions {
    pub indexes: bool,
    pub constraints: bool,
    pub foreign_keys: bool,
    pub references: bool,
    pub triggers: bool,
    pub comments: bool,
    pub border: bool,
    pub position: Position,
    pub line_ending: LineEnding,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            indexes: true,
            constraints: true,
            foreign_keys: true,
            references: true,
            triggers: true,
            comments: true,
            border: false,
            position: Position::After,
            line_ending: LineEnding::Native,
        }
    }
}

/// `namespace = true` in TOML detects the namespace, a string names it
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
#[serde(untagged)]
pub enum NamespaceSetting {
    Detect(bool),
    Named(String),
}

impl NamespaceSetting {
    pub fn to_namespace(&self) -> Option<Namespace> {
        match self {
            NamespaceSetting::Detect(true) => Some(Namespace::Detect),
            NamespaceSetting::Detect(false) => None,
            NamespaceSetting::Named(name) if name.is_empty() => None,
            NamespaceSetting::Named(name) => Some(Namespace::Named(name.clone())),
        }
    }
}

/// How model names are scoped before resolution
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Namespace {
    /// Prefix every declared name with this namespace
    Named(String),
    /// Use the `module` declarations enclosing the model in its file
    Detect,
}

/// Logging configuration
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct LoggingConfig {
    pub level: String,
    pub file: Option<String>,
    pub format: String,
    pub stdout: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn minimal_config_uses_defaults() {
        let config: Config = toml::from_str(
            r#"
            [database]
            url = "postgres://localhost/app_development"
            "#,
        )
        .expect("config should parse");

        assert_eq!(config.database.driver_name().unwrap(), "postgres");
        assert_eq!(config.models.base_type, "Sequel::Model");
        assert_eq!(config.annotate.render, RenderOptions::default());
        assert!(!config.annotate.skip);
        assert!(config.annotate.namespace.is_none());
    }

    #[test]
    fn annotate_section_is_flattened() {
        let config: Config = toml::from_str(
            r#"
            [database]
            url = "sqlite::memory:"

            [annotate]
            position = "before"
            indexes = false
            border = true
            line_ending = "crlf"
            namespace = "ModelNamespace"
            skip = true

            [models.tables]
            Item = "stock_items"
            "#,
        )
        .expect("config should parse");

        let render = &config.annotate.render;
        assert_eq!(render.position, Position::Before);
        assert!(!render.indexes);
        assert!(render.border);
        assert!(render.triggers);
        assert_eq!(render.line_ending.as_str(), "\r\n");
        assert!(config.annotate.skip);
        assert_eq!(
            config.annotate.namespace.and_then(|n| n.to_namespace()),
            Some(Namespace::Named("ModelNamespace".to_string()))
        );
        assert_eq!(config.models.tables["Item"], "stock_items");
        assert_eq!(config.database.driver_name().unwrap(), "sqlite");
    }

    #[test]
    fn namespace_true_detects() {
        let config: AnnotateConfig = toml::from_str("namespace = true").unwrap();
        assert_eq!(
            config.namespace.and_then(|n| n.to_namespace()),
            Some(Namespace::Detect)
        );
    }

    #[test]
    fn unknown_scheme_is_a_config_error() {
        let database = DatabaseConfig {
            url: "oracle://db".to_string(),
            ..Default::default()
        };
        assert!(matches!(database.driver_name(), Err(Error::ConfigError(_))));
    }

    #[test]
    fn position_parses_from_cli_text() {
        assert_eq!("before".parse::<Position>(), Ok(Position::Before));
        assert_eq!("AFTER".parse::<Position>(), Ok(Position::After));
        assert!("middle".parse::<Position>().is_err());
    }
}
