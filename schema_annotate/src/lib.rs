//! schema_annotate: keeps a schema comment at the top or bottom of each model file
//!
//! The comment lists the model's table columns, indexes, constraints and
//! foreign keys as they exist in the database, and is refreshed in place on
//! every run.

pub mod annotate;
pub mod config;
pub mod db;
pub mod error;
pub mod models;
pub mod schema;
pub mod utils;

use std::path::PathBuf;

// Re-export main types for easier access
pub use annotate::{patch, AnnotateReport, Annotator, FileOutcome};
pub use config::{Config, Namespace, Position, RenderOptions};
pub use db::connection::DatabaseConnection;
pub use error::{Error, Result};
pub use models::registry::{ConventionResolver, ModelRegistry, ModelResolver};
pub use schema::analyzer::{Catalog, SchemaAnalyzer};
pub use schema::renderer::SchemaRenderer;
pub use schema::types::{TableRef, TableSnapshot, TableSource};

/// Initialize schema_annotate with the specified configuration file
pub async fn init(config_path: &str) -> Result<SchemaAnnotateClient> {
    let config = config::load_from_file(config_path)?;
    SchemaAnnotateClient::new(config).await
}

/// The main client for annotating models against a live database
pub struct SchemaAnnotateClient {
    config: Config,
    model_registry: ModelRegistry,
    schema_analyzer: SchemaAnalyzer,
    resolver: ConventionResolver,
}

impl SchemaAnnotateClient {
    /// Create a new client from configuration
    pub async fn new(config: Config) -> Result<Self> {
        let db_connection = DatabaseConnection::connect(&config.database).await?;
        let model_registry = ModelRegistry::new(&config.models);
        let schema_analyzer = SchemaAnalyzer::new(db_connection);
        let resolver = ConventionResolver::new(&config.models, &config.naming);

        Ok(Self {
            config,
            model_registry,
            schema_analyzer,
            resolver,
        })
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Files to annotate: the given patterns, or the configured model paths
    pub fn model_files(&self, patterns: &[String]) -> Result<Vec<PathBuf>> {
        if patterns.is_empty() {
            self.model_registry.discover()
        } else {
            self.model_registry.expand_paths(patterns)
        }
    }

    /// An annotator configured from the `[annotate]` and `[models]` sections
    pub fn annotator(&self) -> Annotator<'_> {
        let annotate = &self.config.annotate;
        Annotator::new(&self.schema_analyzer, &self.resolver)
            .with_options(annotate.render.clone())
            .with_namespace(annotate.namespace.as_ref().and_then(|n| n.to_namespace()))
            .with_skip(annotate.skip)
            .with_skip_marker(&self.config.models.skip_marker)
    }

    /// Annotate the matching model files
    pub async fn annotate(&self, patterns: &[String]) -> Result<AnnotateReport> {
        let files = self.model_files(patterns)?;
        tracing::info!(files = files.len(), "Annotating model files");
        self.annotator().annotate_paths(&files).await
    }

    /// Rendered schema comment for a table, empty when it cannot be described
    pub async fn schema_comment(&self, table: &str) -> String {
        let source = TableSource::Table(self.table_ref(table));
        SchemaRenderer::new(&self.config.annotate.render)
            .render(&self.schema_analyzer, &source)
            .await
    }

    /// Introspect a table
    pub async fn snapshot(&self, table: &str) -> Result<TableSnapshot> {
        self.schema_analyzer.introspect(&self.table_ref(table)).await
    }

    /// Parse a table name, falling back to the configured schema
    fn table_ref(&self, table: &str) -> TableRef {
        let mut table_ref = TableRef::parse(table);
        if table_ref.schema.is_none() {
            table_ref.schema = self.config.database.schema.clone();
        }
        table_ref
    }
}
