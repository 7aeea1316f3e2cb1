//! Models module for schema_annotate
//!
//! This module handles model discovery and table resolution.

pub mod registry;

// Re-export key types
pub use registry::{
    has_skip_marker, ConventionResolver, ModelDeclaration, ModelRegistry, ModelResolver,
    TableHandle,
};
