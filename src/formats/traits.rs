//! Record encoder trait and output targets.
//!
//! An encoder turns a [`FacetRecord`] into text; an [`OutputTarget`] decides
//! where that text goes. Encoders are shared between worker threads, so both
//! are `Send + Sync`. Directory targets that write into the same directory
//! share one [`ClaimedFiles`] set, so no file is written twice in a run.
//!
//! # Example
//!
//! ```
//! use facetmap::formats::{OutputTarget, PlainJsonEncoder, RecordEncoder};
//! use facetmap::FacetRecord;
//!
//! let mut record = FacetRecord::new("a.xml");
//! record.set("title", "Example");
//!
//! let encoder = PlainJsonEncoder::new(false, OutputTarget::stdout());
//! assert_eq!(encoder.encode(&record)?, r#"{"title":"Example"}"#);
//! assert_eq!(encoder.file_name(&record), "a.json");
//! # Ok::<(), facetmap::MapperError>(())
//! ```

use std::collections::HashSet;
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, error};

use crate::error::{MapperError, Result};
use crate::record::FacetRecord;

/// File names written so far into one output directory. Clones share the
/// same set.
#[derive(Debug, Clone, Default)]
pub struct ClaimedFiles(Arc<Mutex<HashSet<String>>>);

impl ClaimedFiles {
    /// Create an empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record `file_name` as written. Returns `false` if it already was.
    pub fn claim(&self, file_name: &str) -> bool {
        self.0
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(file_name.to_string())
    }
}

/// Where encoded records are written.
#[derive(Debug)]
pub enum OutputTarget {
    /// Standard output, one record after another
    Stdout,
    /// One file per record in a directory
    Directory {
        /// The output directory
        path: PathBuf,
        /// Files written so far in this run
        claimed: ClaimedFiles,
    },
}

impl OutputTarget {
    /// Write to standard output.
    #[must_use]
    pub fn stdout() -> Self {
        OutputTarget::Stdout
    }

    /// Write one file per record into `path`.
    #[must_use]
    pub fn directory(path: impl Into<PathBuf>) -> Self {
        Self::shared_directory(path, ClaimedFiles::new())
    }

    /// Write one file per record into `path`, refusing file names that any
    /// target holding the same `claimed` set has already written.
    #[must_use]
    pub fn shared_directory(path: impl Into<PathBuf>, claimed: ClaimedFiles) -> Self {
        OutputTarget::Directory {
            path: path.into(),
            claimed,
        }
    }

    /// The output directory, if any.
    #[must_use]
    pub fn path(&self) -> Option<&Path> {
        match self {
            OutputTarget::Stdout => None,
            OutputTarget::Directory { path, .. } => Some(path),
        }
    }

    /// Write `contents` followed by a newline, either to stdout or to
    /// `file_name` inside the target directory.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::OutputCollision`] if `file_name` was already
    /// written into this directory during the run, or an IO error.
    pub fn write(&self, file_name: &str, contents: &str) -> Result<()> {
        match self {
            OutputTarget::Stdout => {
                let mut out = io::stdout().lock();
                writeln!(out, "{contents}")?;
                out.flush()?;
                Ok(())
            }
            OutputTarget::Directory { path, claimed } => {
                let target = path.join(file_name);
                if !claimed.claim(file_name) {
                    return Err(MapperError::OutputCollision(target));
                }
                fs::write(&target, format!("{contents}\n"))?;
                debug!(path = %target.display(), "wrote record");
                Ok(())
            }
        }
    }
}

/// Serializes records into one output format.
pub trait RecordEncoder: std::fmt::Debug + Send + Sync {
    /// Encode `record`. Encoders never modify the record.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::Encoding`] if the serializer fails.
    fn encode(&self, record: &FacetRecord) -> Result<String>;

    /// Output file name for `record` when writing to a directory.
    fn file_name(&self, record: &FacetRecord) -> String;

    /// Where this encoder writes.
    fn target(&self) -> &OutputTarget;

    /// Encode and write `record`.
    ///
    /// Failures are per record: they are logged and the record is skipped.
    fn save(&self, record: &FacetRecord) {
        let written = self
            .encode(record)
            .and_then(|text| self.target().write(&self.file_name(record), &text));
        if let Err(e) = written {
            error!(source = record.source(), error = %e, "cannot save record");
        }
    }
}

/// `source` with a trailing `xml` replaced by `json`; other names get `json`
/// appended.
pub(crate) fn json_file_name(source: &str) -> String {
    let stem = source.strip_suffix("xml").unwrap_or(source);
    format!("{stem}json")
}
