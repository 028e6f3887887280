#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

//! ## Modules
//!
//! - [`table`] - Mapping tables and the field resolution algorithm
//! - [`rule`] - Path and template rules, variable expansion
//! - [`xpath`] - The path expression language rules are written in
//! - [`namespace`] - Prefix to URI bindings used by path rules
//! - [`record`] - The flat facet record produced per document
//! - [`stats`] - Per-rule usage counters and the coverage report
//! - [`formats`] - Output encoders (plain JSON, CKAN 3 JSON, plain XML)
//! - [`config`] - Run parameters and output declarations
//! - [`processor`] - Directory walking and batch processing
//! - [`error`] - Error types and result type

pub mod config;
pub mod error;
pub mod formats;
pub mod namespace;
pub mod processor;
pub mod record;
pub mod rule;
pub mod stats;
pub mod table;
pub mod xpath;

pub use config::{Configuration, OutputSpec, VariableSource};
pub use error::{MapperError, Result};
pub use formats::{OutputKind, OutputTarget, RecordEncoder};
pub use namespace::NamespaceContext;
pub use processor::{Processor, RunSummary};
pub use record::FacetRecord;
pub use rule::MappingRule;
pub use stats::RunStatistics;
pub use table::MappingTable;
pub use xpath::{XPath, XPathError};
