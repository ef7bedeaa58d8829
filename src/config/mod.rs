//! Configuration parsing and validation
//!
//! This module handles parsing of xh.yml configuration files
//! and validation of aliases, defaults and env files.

pub mod parse;
pub mod schema;
pub mod types;

// Re-export main types
pub use parse::*;
pub use schema::*;
pub use types::*;
