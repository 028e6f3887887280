//! Batch processing: walk an input directory, map every XML file and hand
//! the records to the configured encoders.
//!
//! Files are processed in sorted path order. In parallel mode the files are
//! mapped on Rayon's work-stealing pool; records are independent, so only the
//! table's counters and the output targets are shared between tasks.
//!
//! # Examples
//!
//! ```no_run
//! use facetmap::processor::Processor;
//! use facetmap::MappingTable;
//!
//! let table = MappingTable::load("mappings/olac.xml")?;
//! let summary = Processor::new(&table, Vec::new())
//!     .parallel(true)
//!     .process_directory("records".as_ref())?;
//! println!("{} of {} files mapped", summary.mapped(), summary.files);
//! # Ok::<(), facetmap::MapperError>(())
//! ```

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, error, info, warn};

use crate::config::{Configuration, VariableSource};
use crate::error::{MapperError, Result};
use crate::formats::{encoders_for, RecordEncoder};
use crate::record::FacetRecord;
use crate::table::{parse_document, MappingTable};

/// Outcome of processing a set of files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RunSummary {
    /// Input files found
    pub files: usize,
    /// Files that could not be read or parsed
    pub failed: usize,
}

impl RunSummary {
    /// Files that were mapped to a record.
    #[must_use]
    pub fn mapped(&self) -> usize {
        self.files - self.failed
    }
}

/// Maps input files with one table and writes each record to every encoder.
pub struct Processor<'a> {
    table: &'a MappingTable,
    encoders: Vec<Box<dyn RecordEncoder>>,
    variables: Option<&'a (dyn VariableSource + Sync)>,
    parallel: bool,
}

impl fmt::Debug for Processor<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Processor")
            .field("encoders", &self.encoders)
            .field("variables", &self.variables.is_some())
            .field("parallel", &self.parallel)
            .finish_non_exhaustive()
    }
}

impl<'a> Processor<'a> {
    /// Create a sequential processor without template variables.
    #[must_use]
    pub fn new(table: &'a MappingTable, encoders: Vec<Box<dyn RecordEncoder>>) -> Self {
        Self {
            table,
            encoders,
            variables: None,
            parallel: false,
        }
    }

    /// Expand template placeholders from `variables`.
    #[must_use]
    pub fn with_variables(mut self, variables: &'a (dyn VariableSource + Sync)) -> Self {
        self.variables = Some(variables);
        self
    }

    /// Map files on the Rayon pool instead of one after another.
    #[must_use]
    pub fn parallel(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Map one file and save the record to every encoder.
    ///
    /// The record's source is the file's base name.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::IoError`] if the file cannot be read and
    /// [`MapperError::Document`] if it is not well-formed XML. Encoder
    /// failures are logged, not returned.
    pub fn process_file(&self, path: &Path) -> Result<FacetRecord> {
        info!(path = %path.display(), "processing");
        let text = fs::read_to_string(path)?;
        let document = parse_document(&text).map_err(|e| MapperError::Document {
            source_id: path.display().to_string(),
            message: e.to_string(),
        })?;

        let source = path
            .file_name()
            .map_or_else(|| path.display().to_string(), |n| n.to_string_lossy().into_owned());
        let variables = self.variables.map(|v| v as &dyn VariableSource);
        let record = self.table.apply_with_variables(&document, &source, variables);

        for encoder in &self.encoders {
            encoder.save(&record);
        }
        Ok(record)
    }

    /// Map every file in `files`. A file that fails is logged and counted,
    /// and processing continues with the next one.
    #[must_use]
    pub fn process_files(&self, files: &[PathBuf]) -> RunSummary {
        use rayon::prelude::*;

        let succeeded = |path: &PathBuf| match self.process_file(path) {
            Ok(_) => true,
            Err(e) => {
                error!(path = %path.display(), error = %e, "failed to process file");
                false
            }
        };

        let failed = if self.parallel {
            files.par_iter().filter(|path| !succeeded(*path)).count()
        } else {
            files.iter().filter(|path| !succeeded(*path)).count()
        };

        RunSummary {
            files: files.len(),
            failed,
        }
    }

    /// Map every `.xml` file below `dir`.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::Config`] if `dir` does not exist and
    /// [`MapperError::IoError`] if it cannot be listed.
    pub fn process_directory(&self, dir: &Path) -> Result<RunSummary> {
        let files = collect_xml_files(dir)?;
        info!(dir = %dir.display(), files = files.len(), "processing files");
        Ok(self.process_files(&files))
    }
}

fn is_xml_file(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext == "xml")
}

/// Symbolic links to directories are not followed.
fn walk(dir: &Path, out: &mut Vec<PathBuf>) -> Result<()> {
    let mut entries: Vec<(PathBuf, fs::FileType)> = fs::read_dir(dir)?
        .filter_map(|entry| {
            match entry.and_then(|entry| Ok((entry.path(), entry.file_type()?))) {
                Ok(pair) => Some(pair),
                Err(e) => {
                    warn!(dir = %dir.display(), error = %e, "unreadable directory entry");
                    None
                }
            }
        })
        .collect();
    entries.sort_by(|a, b| a.0.cmp(&b.0));

    for (path, file_type) in entries {
        if file_type.is_dir() {
            if let Err(e) = walk(&path, out) {
                warn!(dir = %path.display(), error = %e, "skipping unreadable directory");
            }
        } else if file_type.is_symlink() && path.is_dir() {
            debug!(path = %path.display(), "not following directory link");
        } else if is_xml_file(&path) {
            out.push(path);
        }
    }
    Ok(())
}

/// All files ending in `.xml` below `root`, recursively, in sorted order.
/// A `root` that is itself an XML file yields just that file.
///
/// # Errors
///
/// Returns [`MapperError::Config`] if `root` does not exist and
/// [`MapperError::IoError`] if it cannot be listed. Unreadable
/// subdirectories are logged and skipped.
pub fn collect_xml_files(root: &Path) -> Result<Vec<PathBuf>> {
    if root.is_file() {
        return Ok(if is_xml_file(root) {
            vec![root.to_path_buf()]
        } else {
            Vec::new()
        });
    }
    if !root.is_dir() {
        return Err(MapperError::Config(format!(
            "input directory {} does not exist",
            root.display()
        )));
    }
    let mut out = Vec::new();
    walk(root, &mut out)?;
    Ok(out)
}

/// Run a whole mapping job as described by `config`.
///
/// Loads the table named by `mapfile`, builds an encoder for every declared
/// output and maps every XML file below `inputdir`. Configuration
/// parameters are available to templates as variables. The table is
/// returned so its counters can be reported.
///
/// # Errors
///
/// Returns [`MapperError::Config`] if `mapfile` or `inputdir` is not set or
/// the input directory does not exist, and any error from loading the table.
pub fn run(config: &Configuration, parallel: bool) -> Result<(MappingTable, RunSummary)> {
    let mapfile = config
        .mapfile()
        .ok_or_else(|| MapperError::Config("parameter 'mapfile' is not set".to_string()))?;
    let inputdir = config
        .inputdir()
        .ok_or_else(|| MapperError::Config("parameter 'inputdir' is not set".to_string()))?;

    let table = MappingTable::load(mapfile)?;
    if config.outputs().is_empty() {
        warn!("no outputs configured, records will only be counted");
    }
    let encoders = encoders_for(config.outputs());

    let summary = Processor::new(&table, encoders)
        .with_variables(config)
        .parallel(parallel)
        .process_directory(Path::new(inputdir))?;
    Ok((table, summary))
}
