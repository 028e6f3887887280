//! Run configuration: parameters, output declarations and variable lookup.
//!
//! Parameters come from `key=value` command line arguments first and from a
//! configuration file second; a parameter set on the command line is never
//! overwritten by the file. Only the names in [`KNOWN_PARAMETERS`] are
//! accepted.
//!
//! # Configuration file
//!
//! ```xml
//! <config>
//!   <params>
//!     <mapfile>mappings/olac.xml</mapfile>
//!     <inputdir>records</inputdir>
//!     <outputdir>out</outputdir>
//!   </params>
//!   <outputs>
//!     <output type="ckan3json" prettyPrint="true">ckan</output>
//!     <output type="simplejson"/>
//!   </outputs>
//! </config>
//! ```
//!
//! An output with empty text writes to stdout. Otherwise the text names a
//! directory, resolved against `outputdir` when that is set, which is created
//! if it does not exist.

use std::collections::HashMap;
use std::fs;
use std::hash::BuildHasher;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use roxmltree::{Document, Node};
use tracing::{debug, error, warn};

use crate::error::{MapperError, Result};
use crate::formats::OutputKind;

/// Parameter names accepted on the command line and in configuration files.
pub const KNOWN_PARAMETERS: [&str; 5] = ["mapfile", "inputdir", "outputdir", "savestats", "config"];

/// Configuration file read when the `config` parameter is not set.
pub const DEFAULT_CONFIG_FILE: &str = "config.xml";

/// Named string values available to template rules as `${name}`.
pub trait VariableSource {
    /// The value of `name`, or `None` if it is undefined.
    fn variable(&self, name: &str) -> Option<&str>;
}

impl<S: BuildHasher> VariableSource for HashMap<String, String, S> {
    fn variable(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }
}

impl<S: BuildHasher> VariableSource for IndexMap<String, String, S> {
    fn variable(&self, name: &str) -> Option<&str> {
        self.get(name).map(String::as_str)
    }
}

/// One declared output: the encoder kind and where records go.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputSpec {
    /// Encoder to use
    pub kind: OutputKind,
    /// Indent the encoded output
    pub pretty: bool,
    /// Target directory, or `None` for stdout
    pub directory: Option<PathBuf>,
}

/// Parameters and output declarations for one run.
#[derive(Debug, Clone, Default)]
pub struct Configuration {
    params: IndexMap<String, String>,
    outputs: Vec<OutputSpec>,
}

fn unknown_parameter(name: &str) -> MapperError {
    MapperError::UnknownParameter {
        name: name.to_string(),
        known: KNOWN_PARAMETERS.join(" "),
    }
}

/// XML `xs:boolean`-ish parsing as the configuration format has always done
/// it: only `true`, in any case, is true.
fn is_true(value: Option<&str>) -> bool {
    value.is_some_and(|v| v.eq_ignore_ascii_case("true"))
}

impl Configuration {
    /// Create an empty configuration.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a parameter, replacing any earlier value.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::UnknownParameter`] if `key` is not one of
    /// [`KNOWN_PARAMETERS`].
    pub fn set_param(&mut self, key: &str, value: impl Into<String>) -> Result<()> {
        if !KNOWN_PARAMETERS.contains(&key) {
            return Err(unknown_parameter(key));
        }
        self.params.insert(key.to_string(), value.into());
        Ok(())
    }

    /// The value of a parameter, or `None` if it has not been set.
    #[must_use]
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    /// Apply `key=value` arguments in order.
    ///
    /// The value is everything after the first `=`, so `key=` sets the empty
    /// string. Arguments without `=` are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::UnknownParameter`] for an unknown key.
    pub fn apply_args<I, S>(&mut self, args: I) -> Result<()>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        for arg in args {
            let arg = arg.as_ref();
            match arg.split_once('=') {
                Some((key, value)) => self.set_param(key, value)?,
                None => debug!(arg, "ignoring argument without '='"),
            }
        }
        Ok(())
    }

    /// Read the configuration file named by the `config` parameter, or
    /// [`DEFAULT_CONFIG_FILE`].
    ///
    /// A missing, unreadable or malformed file is logged and otherwise
    /// ignored, since the command line may already be complete.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::UnknownParameter`] for an unknown parameter in
    /// the file and [`MapperError::OutputDirectory`] if an output directory
    /// cannot be created.
    pub fn read_config_file(&mut self) -> Result<()> {
        let path = PathBuf::from(self.config_file());
        let text = match fs::read_to_string(&path) {
            Ok(text) => text,
            Err(e) => {
                error!(path = %path.display(), error = %e, "cannot read configuration file");
                return Ok(());
            }
        };
        match self.merge_config_str(&text) {
            Err(MapperError::Config(message)) => {
                error!(path = %path.display(), "{message}");
                Ok(())
            }
            other => other,
        }
    }

    /// Merge parameters and outputs from configuration file text.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::Config`] if the text is not well-formed XML,
    /// [`MapperError::UnknownParameter`] for an unknown parameter and
    /// [`MapperError::OutputDirectory`] if an output directory cannot be
    /// created.
    pub fn merge_config_str(&mut self, text: &str) -> Result<()> {
        let doc = Document::parse(text)
            .map_err(|e| MapperError::Config(format!("malformed configuration file: {e}")))?;
        let root = doc.root_element();
        if !root.has_tag_name("config") {
            warn!(root = root.tag_name().name(), "configuration root is not <config>, ignoring");
            return Ok(());
        }

        for section in root.children().filter(|n| n.has_tag_name("params")) {
            for param in section.children().filter(Node::is_element) {
                let key = param.tag_name().name();
                if !KNOWN_PARAMETERS.contains(&key) {
                    return Err(unknown_parameter(key));
                }
                if !self.params.contains_key(key) {
                    self.params.insert(key.to_string(), text_content(param));
                }
            }
        }

        for section in root.children().filter(|n| n.has_tag_name("outputs")) {
            for output in section.children().filter(|n| n.has_tag_name("output")) {
                if let Some(spec) = self.output_spec(output)? {
                    self.outputs.push(spec);
                }
            }
        }
        Ok(())
    }

    fn output_spec(&self, node: Node<'_, '_>) -> Result<Option<OutputSpec>> {
        let Some(type_name) = node.attribute("type") else {
            debug!("skipping output without type");
            return Ok(None);
        };
        let Some(kind) = OutputKind::from_name(type_name) else {
            error!(output_type = type_name, "unknown output type");
            return Ok(None);
        };

        let dir_name = text_content(node);
        let directory = if dir_name.is_empty() {
            None
        } else {
            let dir = match self.outputdir() {
                Some(base) => Path::new(base).join(&dir_name),
                None => PathBuf::from(&dir_name),
            };
            ensure_directory(&dir)?;
            Some(dir)
        };

        Ok(Some(OutputSpec {
            kind,
            pretty: is_true(node.attribute("prettyPrint")),
            directory,
        }))
    }

    /// Declare an output directly.
    pub fn add_output(&mut self, spec: OutputSpec) {
        self.outputs.push(spec);
    }

    /// Declared outputs, in declaration order.
    #[must_use]
    pub fn outputs(&self) -> &[OutputSpec] {
        &self.outputs
    }

    /// Path of the mapping table.
    #[must_use]
    pub fn mapfile(&self) -> Option<&str> {
        self.param("mapfile")
    }

    /// Directory searched for input documents.
    #[must_use]
    pub fn inputdir(&self) -> Option<&str> {
        self.param("inputdir")
    }

    /// Base directory for output subdirectories.
    #[must_use]
    pub fn outputdir(&self) -> Option<&str> {
        self.param("outputdir")
    }

    /// Where to write coverage statistics: `Some("")` means stdout.
    #[must_use]
    pub fn savestats(&self) -> Option<&str> {
        self.param("savestats")
    }

    /// The configuration file to read.
    #[must_use]
    pub fn config_file(&self) -> &str {
        self.param("config").unwrap_or(DEFAULT_CONFIG_FILE)
    }
}

impl VariableSource for Configuration {
    fn variable(&self, name: &str) -> Option<&str> {
        self.param(name)
    }
}

fn text_content(node: Node<'_, '_>) -> String {
    node.descendants()
        .filter(Node::is_text)
        .filter_map(|n| n.text())
        .collect()
}

/// Create `dir` (and parents) if it does not exist.
pub(crate) fn ensure_directory(dir: &Path) -> Result<()> {
    if dir.is_dir() {
        return Ok(());
    }
    fs::create_dir_all(dir).map_err(|source| MapperError::OutputDirectory {
        path: dir.to_path_buf(),
        source,
    })
}
