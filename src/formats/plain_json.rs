//! Plain JSON: the record's facets as one flat object.

use crate::error::{MapperError, Result};
use crate::formats::traits::{json_file_name, OutputTarget, RecordEncoder};
use crate::record::FacetRecord;

/// Encodes a record as `{"field": "value", ...}` in field order.
#[derive(Debug)]
pub struct PlainJsonEncoder {
    pretty: bool,
    target: OutputTarget,
}

impl PlainJsonEncoder {
    /// Create an encoder writing to `target`.
    #[must_use]
    pub fn new(pretty: bool, target: OutputTarget) -> Self {
        Self { pretty, target }
    }
}

impl RecordEncoder for PlainJsonEncoder {
    fn encode(&self, record: &FacetRecord) -> Result<String> {
        let encoded = if self.pretty {
            serde_json::to_string_pretty(record.facets())
        } else {
            serde_json::to_string(record.facets())
        };
        encoded.map_err(|e| MapperError::Encoding(e.to_string()))
    }

    fn file_name(&self, record: &FacetRecord) -> String {
        json_file_name(record.source())
    }

    fn target(&self) -> &OutputTarget {
        &self.target
    }
}
