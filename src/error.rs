//! Error types for facet mapping operations.
//!
//! This module provides the [`MapperError`] type for all library operations
//! and the [`Result`] convenience type. Path expression failures have their own
//! [`XPathError`](crate::xpath::XPathError); they are logged by the rule that
//! hit them and never surface here.
//!
//! Only configuration errors are meant to stop a run. Rule evaluation errors
//! and per-record output errors are logged where they happen and never reach
//! the caller as `Err`.

use std::path::PathBuf;

use thiserror::Error;

/// Error type for all facet mapping operations.
#[derive(Error, Debug)]
pub enum MapperError {
    /// The rule-definition (mapping table) source is malformed.
    #[error("Invalid mapping table: {0}")]
    RuleDefinition(String),

    /// A configuration file or parameter is invalid.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A parameter name outside the known set was supplied.
    #[error("Unknown parameter \"{name}\". Known parameter names: {known}")]
    UnknownParameter {
        /// The rejected parameter name
        name: String,
        /// Space separated list of accepted names
        known: String,
    },

    /// An output directory does not exist and cannot be created.
    #[error("Directory {path} does not exist and cannot be created: {source}")]
    OutputDirectory {
        /// The directory that was requested
        path: PathBuf,
        /// The underlying IO failure
        source: std::io::Error,
    },

    /// An input metadata document is not well-formed XML.
    #[error("Malformed document {source_id}: {message}")]
    Document {
        /// Source identifier (file name) of the document
        source_id: String,
        /// Parser message
        message: String,
    },

    /// Template variable expansion did not terminate.
    #[error("Variable expansion error: {0}")]
    Expansion(String),

    /// A record could not be serialized to an output format.
    #[error("Encoding error: {0}")]
    Encoding(String),

    /// Two records resolved to the same output file.
    #[error("Output file {0} was already written during this run")]
    OutputCollision(PathBuf),

    /// IO error from the underlying source/destination.
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}

/// Convenience type alias for [`std::result::Result`] with [`MapperError`].
pub type Result<T> = std::result::Result<T, MapperError>;
