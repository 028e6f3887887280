//! Output formats for facet records.
//!
//! Every format implements [`RecordEncoder`], so the processor can hand each
//! record to any number of encoders without knowing their formats.
//! Outputs declared with the same directory share their record of written
//! files, so one format never silently replaces another's output.
//!
//! # Supported Formats
//!
//! | Format | Config name | Encoder | Output file |
//! |--------|-------------|---------|-------------|
//! | Plain JSON | `simplejson` | [`PlainJsonEncoder`] | `name.xml` -> `name.json` |
//! | CKAN 3 JSON | `ckan3json` | [`Ckan3Encoder`] | `name.xml` -> `name.json` |
//! | Plain XML | `xml` | [`PlainXmlEncoder`] | `name.xml` |
//!
//! # Usage
//!
//! ```
//! use facetmap::formats::{OutputKind, OutputTarget};
//! use facetmap::FacetRecord;
//!
//! let kind = OutputKind::from_name("ckan3json").unwrap();
//! let encoder = kind.encoder(true, OutputTarget::stdout());
//!
//! let mut record = FacetRecord::new("a.xml");
//! record.set("title", "Example");
//! assert!(encoder.encode(&record)?.contains("\"title\": \"Example\""));
//! # Ok::<(), facetmap::MapperError>(())
//! ```

mod ckan3;
mod plain_json;
mod plain_xml;
mod traits;

pub use ckan3::{Ckan3Encoder, NATIVE_FIELDS};
pub use plain_json::PlainJsonEncoder;
pub use plain_xml::PlainXmlEncoder;
pub use traits::{ClaimedFiles, OutputTarget, RecordEncoder};

use std::fs;
use std::path::PathBuf;

use crate::config::OutputSpec;

/// Output formats that can be declared in a configuration file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum OutputKind {
    /// Flat JSON object (`simplejson`)
    SimpleJson,
    /// CKAN API v3 dataset JSON (`ckan3json`)
    Ckan3Json,
    /// Flat XML field list (`xml`)
    Xml,
}

impl OutputKind {
    /// Look up a format by its configuration name.
    ///
    /// # Example
    ///
    /// ```
    /// use facetmap::formats::OutputKind;
    ///
    /// assert_eq!(OutputKind::from_name("xml"), Some(OutputKind::Xml));
    /// assert_eq!(OutputKind::from_name("XML"), None);
    /// ```
    #[must_use]
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "simplejson" => Some(Self::SimpleJson),
            "ckan3json" => Some(Self::Ckan3Json),
            "xml" => Some(Self::Xml),
            _ => None,
        }
    }

    /// The configuration name of this format.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self {
            Self::SimpleJson => "simplejson",
            Self::Ckan3Json => "ckan3json",
            Self::Xml => "xml",
        }
    }

    /// Create an encoder of this kind.
    #[must_use]
    pub fn encoder(self, pretty: bool, target: OutputTarget) -> Box<dyn RecordEncoder> {
        match self {
            Self::SimpleJson => Box::new(PlainJsonEncoder::new(pretty, target)),
            Self::Ckan3Json => Box::new(Ckan3Encoder::new(pretty, target)),
            Self::Xml => Box::new(PlainXmlEncoder::new(pretty, target)),
        }
    }
}

impl std::fmt::Display for OutputKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Create the encoders for a list of declared outputs.
///
/// Directories are compared after canonicalization; outputs resolving to the
/// same directory share one [`ClaimedFiles`] set.
#[must_use]
pub fn encoders_for(specs: &[OutputSpec]) -> Vec<Box<dyn RecordEncoder>> {
    let mut claims: Vec<(PathBuf, ClaimedFiles)> = Vec::new();
    specs
        .iter()
        .map(|spec| {
            let target = match &spec.directory {
                Some(dir) => {
                    let key = fs::canonicalize(dir).unwrap_or_else(|_| dir.clone());
                    let claimed = match claims.iter().find(|(seen, _)| *seen == key) {
                        Some((_, claimed)) => claimed.clone(),
                        None => {
                            let claimed = ClaimedFiles::new();
                            claims.push((key, claimed.clone()));
                            claimed
                        }
                    };
                    OutputTarget::shared_directory(dir, claimed)
                }
                None => OutputTarget::stdout(),
            };
            spec.kind.encoder(spec.pretty, target)
        })
        .collect()
}
