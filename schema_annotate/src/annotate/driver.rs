//! Whole-file annotation: read, resolve, render, patch and write

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use crate::annotate::patcher::patch;
use crate::config::{Namespace, RenderOptions};
use crate::error::Result;
use crate::models::registry::{has_skip_marker, ModelDeclaration, ModelResolver, TableHandle};
use crate::schema::analyzer::Catalog;
use crate::schema::renderer::SchemaRenderer;
use crate::schema::types::TableSource;

/// Why a file was left alone
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The file opted out with a skip marker
    Marker,
    /// No class declaration was found
    NoDeclaration,
    /// The declaration is not a model the resolver knows
    Unresolved,
    /// Nothing was rendered for the table
    EmptyRender,
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let reason = match self {
            SkipReason::Marker => "skip marker",
            SkipReason::NoDeclaration => "no model declaration",
            SkipReason::Unresolved => "not a model",
            SkipReason::EmptyRender => "table could not be described",
        };
        f.write_str(reason)
    }
}

/// What happened to one file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileOutcome {
    Updated,
    Unchanged,
    Skipped(SkipReason),
}

/// Per-file results of a batch run
#[derive(Debug, Default)]
pub struct AnnotateReport {
    pub files: Vec<(PathBuf, FileOutcome)>,
}

impl AnnotateReport {
    fn count(&self, pred: impl Fn(&FileOutcome) -> bool) -> usize {
        self.files.iter().filter(|(_, o)| pred(o)).count()
    }

    pub fn updated(&self) -> usize {
        self.count(|o| *o == FileOutcome::Updated)
    }

    pub fn unchanged(&self) -> usize {
        self.count(|o| *o == FileOutcome::Unchanged)
    }

    pub fn skipped(&self) -> usize {
        self.count(|o| matches!(o, FileOutcome::Skipped(_)))
    }
}

/// Annotates model files against a catalog
pub struct Annotator<'a> {
    catalog: &'a dyn Catalog,
    resolver: &'a dyn ModelResolver,
    options: RenderOptions,
    namespace: Option<Namespace>,
    skip: bool,
    skip_marker: String,
}

impl<'a> Annotator<'a> {
    pub fn new(catalog: &'a dyn Catalog, resolver: &'a dyn ModelResolver) -> Self {
        Self {
            catalog,
            resolver,
            options: RenderOptions::default(),
            namespace: None,
            skip: false,
            skip_marker: "schema-annotate".to_string(),
        }
    }

    pub fn with_options(mut self, options: RenderOptions) -> Self {
        self.options = options;
        self
    }

    pub fn with_namespace(mut self, namespace: Option<Namespace>) -> Self {
        self.namespace = namespace;
        self
    }

    /// When set, batch runs touch nothing
    pub fn with_skip(mut self, skip: bool) -> Self {
        self.skip = skip;
        self
    }

    pub fn with_skip_marker(mut self, marker: &str) -> Self {
        self.skip_marker = marker.to_string();
        self
    }

    /// Annotate every file in order. The first I/O error aborts the run.
    pub async fn annotate_paths(&self, paths: &[PathBuf]) -> Result<AnnotateReport> {
        let mut report = AnnotateReport::default();

        if self.skip {
            tracing::info!(files = paths.len(), "Annotation disabled, leaving files untouched");
            return Ok(report);
        }

        for path in paths {
            let outcome = self.annotate_file(path).await?;
            report.files.push((path.clone(), outcome));
        }

        tracing::info!(
            updated = report.updated(),
            unchanged = report.unchanged(),
            skipped = report.skipped(),
            "Annotation finished"
        );

        Ok(report)
    }

    /// Annotate the model declared in one file
    ///
    /// Classes that do not resolve to a model, such as helper errors declared
    /// above it, are passed over.
    pub async fn annotate_file(&self, path: &Path) -> Result<FileOutcome> {
        let original = fs::read_to_string(path)?;

        if self.is_skip_marked(path, &original)? {
            return Ok(FileOutcome::Skipped(SkipReason::Marker));
        }

        let declarations = ModelDeclaration::scan(&original, self.namespace.as_ref());
        if declarations.is_empty() {
            tracing::debug!(path = %path.display(), "No model declaration found");
            return Ok(FileOutcome::Skipped(SkipReason::NoDeclaration));
        }

        let Some(handle) = self
            .resolver
            .resolve_first(&declarations, self.namespace.as_ref())
        else {
            return Ok(FileOutcome::Skipped(SkipReason::Unresolved));
        };

        self.write_annotation(path, &original, &handle).await
    }

    /// Annotate a file for an already resolved model
    pub async fn annotate_model(&self, path: &Path, handle: &TableHandle) -> Result<FileOutcome> {
        let original = fs::read_to_string(path)?;

        if self.is_skip_marked(path, &original)? {
            return Ok(FileOutcome::Skipped(SkipReason::Marker));
        }

        self.write_annotation(path, &original, handle).await
    }

    /// Rendered block for a table source, empty when it cannot be described
    pub async fn schema_comment(&self, source: &TableSource) -> String {
        SchemaRenderer::new(&self.options)
            .render(self.catalog, source)
            .await
    }

    fn is_skip_marked(&self, path: &Path, original: &str) -> Result<bool> {
        let marked = has_skip_marker(original, &self.skip_marker)?;
        if marked {
            tracing::debug!(path = %path.display(), "File carries skip marker");
        }
        Ok(marked)
    }

    async fn write_annotation(
        &self,
        path: &Path,
        original: &str,
        handle: &TableHandle,
    ) -> Result<FileOutcome> {
        let block = self.schema_comment(&handle.source).await;
        if block.is_empty() {
            tracing::debug!(model = %handle.model, "Nothing rendered, leaving file untouched");
            return Ok(FileOutcome::Skipped(SkipReason::EmptyRender));
        }

        let patched = patch(original, &block, &self.options);
        if patched == original {
            return Ok(FileOutcome::Unchanged);
        }

        fs::write(path, patched)?;
        tracing::info!(path = %path.display(), model = %handle.model, "Annotated model");

        Ok(FileOutcome::Updated)
    }
}
