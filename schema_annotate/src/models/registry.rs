//! Model registry for schema_annotate
//!
//! This module discovers model files, finds the model declared in each one
//! and resolves it to the table it reads from.

use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

use crate::config::{ModelsConfig, Namespace, NamingConfig};
use crate::error::{Error, Result};
use crate::schema::types::{TableRef, TableSource};
use crate::utils::naming::get_table_name;

static CLASS_DECLARATION: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*class\s+([A-Za-z_][\w:]*)\s*<\s*([A-Za-z_][\w:]*)(?:\((.*)\))?").unwrap()
});
static MODULE_DECLARATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\s*module\s+([A-Za-z_][\w:]*)").unwrap());
static BLOCK_END: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\s*end\b").unwrap());
static ONE_LINE_END: Lazy<Regex> = Lazy::new(|| Regex::new(r";\s*end\s*$").unwrap());

static SYMBOL: Lazy<Regex> = Lazy::new(|| Regex::new(r"^:(\w+)$").unwrap());
static QUOTED: Lazy<Regex> = Lazy::new(|| Regex::new(r#"^(?:'([^']+)'|"([^"]+)")$"#).unwrap());
static DATASET: Lazy<Regex> = Lazy::new(|| Regex::new(r"^[A-Za-z_][\w:]*\[(.+)\]$").unwrap());
static QUALIFY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^Sequel\.qualify\(\s*:?(\w+)\s*,\s*:?(\w+)\s*\)$").unwrap()
});

/// A `class Name < Base(argument)` line found in a model file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModelDeclaration {
    /// Class name, including any `module` scopes when namespaces are detected
    pub name: String,
    pub base: String,
    /// Text between the parentheses after the superclass
    pub argument: Option<String>,
}

impl ModelDeclaration {
    /// Find every class declaration in a source file, in file order.
    ///
    /// With [`Namespace::Detect`] the names of the `module` blocks still open
    /// at the class line are joined onto it with `::`. A block closes at the
    /// first `end` with the same indentation as its `module` line.
    pub fn scan(source: &str, namespace: Option<&Namespace>) -> Vec<Self> {
        let mut modules: Vec<(usize, &str)> = Vec::new();
        let mut declarations = Vec::new();

        for line in source.lines() {
            let indent = line.len() - line.trim_start().len();

            if let Some(caps) = MODULE_DECLARATION.captures(line) {
                if !ONE_LINE_END.is_match(line) {
                    modules.push((indent, caps.get(1).map_or("", |m| m.as_str())));
                }
                continue;
            }

            if BLOCK_END.is_match(line) {
                if modules.last().map_or(false, |(open, _)| *open == indent) {
                    modules.pop();
                }
                continue;
            }

            let Some(caps) = CLASS_DECLARATION.captures(line) else {
                continue;
            };

            let class = caps.get(1).map_or("", |m| m.as_str());
            let name = match namespace {
                Some(Namespace::Detect) if !modules.is_empty() => {
                    let scopes: Vec<&str> = modules.iter().map(|(_, name)| *name).collect();
                    format!("{}::{}", scopes.join("::"), class)
                }
                _ => class.to_string(),
            };

            declarations.push(Self {
                name,
                base: caps.get(2).map_or("", |m| m.as_str()).to_string(),
                argument: caps
                    .get(3)
                    .map(|m| m.as_str().trim().to_string())
                    .filter(|a| !a.is_empty()),
            });
        }

        declarations
    }

    /// Last `::` segment of the class name
    pub fn short_name(&self) -> &str {
        self.name.rsplit("::").next().unwrap_or(&self.name)
    }
}

/// Whether a file opts out with `# <marker>: false`
pub fn has_skip_marker(source: &str, marker: &str) -> Result<bool> {
    let pattern = Regex::new(&format!(
        r"(?im)^#\s*{}:\s*false\s*$",
        regex::escape(marker)
    ))?;
    Ok(pattern.is_match(source))
}

/// A model together with the table it reads from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableHandle {
    pub model: String,
    pub source: TableSource,
}

/// Maps a model declaration to its table
pub trait ModelResolver: Send + Sync {
    /// `None` when the declaration is not a model this resolver knows about
    fn resolve(&self, declaration: &ModelDeclaration, namespace: Option<&Namespace>)
        -> Option<TableHandle>;

    /// The first declaration that resolves, skipping helper classes
    fn resolve_first(
        &self,
        declarations: &[ModelDeclaration],
        namespace: Option<&Namespace>,
    ) -> Option<TableHandle> {
        declarations.iter().find_map(|d| self.resolve(d, namespace))
    }
}

/// Resolves models by explicit table argument, then configured overrides,
/// then naming convention
#[derive(Debug, Clone)]
pub struct ConventionResolver {
    base_type: String,
    tables: HashMap<String, String>,
    naming: NamingConfig,
}

impl ConventionResolver {
    pub fn new(models: &ModelsConfig, naming: &NamingConfig) -> Self {
        Self {
            base_type: models.base_type.clone(),
            tables: models.tables.clone(),
            naming: naming.clone(),
        }
    }

    fn is_model_base(&self, base: &str, namespaced: bool) -> bool {
        if base == self.base_type {
            return true;
        }
        // inside a namespace the superclass is often written relative to it
        let last = |s: &str| s.rsplit("::").next().unwrap_or(s).to_string();
        namespaced && last(base) == last(&self.base_type)
    }

    fn table_from_argument(argument: &str) -> TableSource {
        let argument = argument.trim();
        let inner = DATASET
            .captures(argument)
            .and_then(|c| c.get(1))
            .map_or(argument, |m| m.as_str().trim());

        if let Some(caps) = SYMBOL.captures(inner) {
            return TableSource::Table(TableRef::parse(&caps[1]));
        }
        if let Some(caps) = QUOTED.captures(inner) {
            let name = caps.get(1).or_else(|| caps.get(2)).map_or("", |m| m.as_str());
            return TableSource::Table(TableRef::parse(name));
        }
        if let Some(caps) = QUALIFY.captures(inner) {
            return TableSource::Table(TableRef::qualified(&caps[1], &caps[2]));
        }

        TableSource::Derived(argument.to_string())
    }
}

impl ModelResolver for ConventionResolver {
    fn resolve(
        &self,
        declaration: &ModelDeclaration,
        namespace: Option<&Namespace>,
    ) -> Option<TableHandle> {
        if !self.is_model_base(&declaration.base, namespace.is_some()) {
            tracing::debug!(
                model = %declaration.name,
                base = %declaration.base,
                "Declaration does not inherit from the model base"
            );
            return None;
        }

        let model = match namespace {
            Some(Namespace::Named(ns)) => format!("{}::{}", ns, declaration.name),
            _ => declaration.name.clone(),
        };

        let source = if let Some(argument) = &declaration.argument {
            Self::table_from_argument(argument)
        } else if let Some(table) = self
            .tables
            .get(&model)
            .or_else(|| self.tables.get(&declaration.name))
        {
            TableSource::Table(TableRef::parse(table))
        } else {
            TableSource::Table(TableRef::new(&get_table_name(
                declaration.short_name(),
                &self.naming.table_style,
                self.naming.pluralize_tables,
            )))
        };

        Some(TableHandle { model, source })
    }
}

/// Collects the model files to annotate
pub struct ModelRegistry {
    config: ModelsConfig,
}

impl ModelRegistry {
    /// Create a new model registry
    pub fn new(config: &ModelsConfig) -> Self {
        Self {
            config: config.clone(),
        }
    }

    /// Expand explicit paths, which may be glob patterns
    pub fn expand_paths(&self, patterns: &[String]) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        for pattern in patterns {
            let matches = glob::glob(pattern)
                .map_err(|e| Error::PatternError(format!("Invalid pattern '{}': {}", pattern, e)))?;

            let before = files.len();
            for entry in matches {
                let path = entry.map_err(|e| Error::IoError(e.into_error()))?;
                if path.is_dir() {
                    files.extend(self.walk(&path)?);
                } else {
                    files.push(path);
                }
            }

            if files.len() == before {
                tracing::warn!(pattern = %pattern, "Pattern matched no files");
            }
        }

        Ok(files)
    }

    /// Walk the configured model directories
    pub fn discover(&self) -> Result<Vec<PathBuf>> {
        let mut files = Vec::new();

        for path in &self.config.paths {
            let base_path = Path::new(path);
            if !base_path.exists() {
                return Err(Error::ModelResolutionError(format!(
                    "Path does not exist: {}",
                    path
                )));
            }
            files.extend(self.walk(base_path)?);
        }

        Ok(files)
    }

    fn walk(&self, base_path: &Path) -> Result<Vec<PathBuf>> {
        let exclude_paths = self.config.exclude_paths.clone().unwrap_or_default();
        let max_depth = if self.config.recursive_scan { usize::MAX } else { 1 };
        let mut files = Vec::new();

        for entry in WalkDir::new(base_path)
            .follow_links(true)
            .max_depth(max_depth)
            .sort_by_file_name()
            .into_iter()
            .filter_map(|e| e.ok())
        {
            let path = entry.path();

            if exclude_paths.iter().any(|exclude| path.starts_with(exclude)) {
                continue;
            }

            let wanted = path.extension().map_or(false, |ext| {
                self.config.extensions.iter().any(|e| ext == e.as_str())
            });
            if path.is_file() && wanted {
                files.push(path.to_path_buf());
            }
        }

        Ok(files)
    }
}
