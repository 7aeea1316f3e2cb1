//! Annotation module for schema_annotate
//!
//! This module places rendered schema comments into model files.

pub mod driver;
pub mod patcher;

// Re-export key types
pub use driver::{AnnotateReport, Annotator, FileOutcome, SkipReason};
pub use patcher::patch;
