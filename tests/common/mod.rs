//! Common test helpers shared across the integration tests.

use std::fs;
use std::path::{Path, PathBuf};

use facetmap::MappingTable;

/// Directory holding the test fixtures.
pub fn data_dir() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR")).join("tests/data")
}

/// The OLAC mapping table fixture.
pub fn olac_mapping_path() -> PathBuf {
    data_dir().join("olac_mapping.xml")
}

/// Directory of input records. Contains one malformed file and one non-XML file.
pub fn records_dir() -> PathBuf {
    data_dir().join("records")
}

/// Load the OLAC mapping table fixture.
pub fn olac_table() -> MappingTable {
    MappingTable::load(olac_mapping_path()).expect("Could not load mapping table fixture")
}

/// Read a file written by an encoder, without its trailing newline.
#[allow(dead_code)]
pub fn read_output(dir: &Path, name: &str) -> String {
    let text = fs::read_to_string(dir.join(name))
        .unwrap_or_else(|e| panic!("Missing output {name}: {e}"));
    text.strip_suffix('\n').unwrap_or(&text).to_string()
}
