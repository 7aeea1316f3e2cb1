//! Utilities for schema_annotate
//!
//! This module provides utility functions used across the library.

pub mod logging;
pub mod naming;

// Re-export key utility functions
pub use logging::init_logging;
pub use naming::{apply_naming_convention, get_table_name, quote_identifier};
