//! Schema module for schema_annotate
//!
//! This module handles catalog introspection and rendering of schema comments.

pub mod align;
pub mod analyzer;
pub mod renderer;
pub mod types;

// Re-export key types
pub use analyzer::{Catalog, SchemaAnalyzer};
pub use renderer::SchemaRenderer;
pub use types::{
    ColumnDescriptor, ConstraintDescriptor, Dialect, ForeignKeyDescriptor, IndexDescriptor,
    ReferenceDescriptor, TableDescriptor, TableRef, TableSnapshot, TableSource, TriggerDescriptor,
};
