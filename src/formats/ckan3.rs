//! JSON shaped for the CKAN API, version 3.
//!
//! CKAN knows a fixed set of dataset fields; those go at the top level of
//! the object. Everything else is stored as `extras` key/value pairs. Two
//! facets are reshaped on the way:
//!
//! - `tags` is a comma-separated list and becomes `[{"name": ...}, ...]`.
//!   Parts are not trimmed, so `"a, b"` yields the tag `" b"`.
//! - `spatial` is a bounding box `minx,miny,maxx,maxy` and becomes a GeoJSON
//!   polygon string in the extras. Malformed boxes are dropped.
//!
//! ```
//! use facetmap::formats::{Ckan3Encoder, OutputTarget};
//! use facetmap::FacetRecord;
//!
//! let mut record = FacetRecord::new("a.xml");
//! record.set("title", "Survey");
//! record.set("tags", "speech,corpus");
//! record.set("region", "Lapland");
//!
//! let value = Ckan3Encoder::to_value(&record);
//! assert_eq!(value["title"], "Survey");
//! assert_eq!(value["tags"][1]["name"], "corpus");
//! assert_eq!(value["extras"][0]["key"], "region");
//! ```

use std::str::FromStr;

use serde_json::{json, Map, Value};
use tracing::warn;

use crate::error::{MapperError, Result};
use crate::formats::traits::{json_file_name, OutputTarget, RecordEncoder};
use crate::record::FacetRecord;

/// Fields CKAN stores at the top level of a dataset.
pub const NATIVE_FIELDS: [&str; 10] = [
    "author",
    "maintainer",
    "title",
    "name",
    "version",
    "url",
    "notes",
    "status",
    "id",
    "group",
];

const TAGS: &str = "tags";
const SPATIAL: &str = "spatial";

/// Encodes records for CKAN 3.
#[derive(Debug)]
pub struct Ckan3Encoder {
    pretty: bool,
    target: OutputTarget,
}

/// Split on commas, dropping trailing empty parts. A value without any
/// comma is a single part even when empty.
fn split_list(value: &str) -> Vec<&str> {
    let mut parts: Vec<&str> = value.split(',').collect();
    if parts.len() > 1 {
        while parts.last().is_some_and(|p| p.is_empty()) {
            parts.pop();
        }
    }
    parts
}

/// A coordinate as JSON number text. Valid JSON numbers keep their spelling;
/// other finite decimals (`+1`, `.5`, `2.`) are normalized.
fn coordinate(part: &str) -> Option<String> {
    let trimmed = part.trim();
    if serde_json::Number::from_str(trimmed).is_ok() {
        return Some(trimmed.to_string());
    }
    let parsed: f64 = trimmed.parse().ok()?;
    serde_json::Number::from_f64(parsed).map(|n| n.to_string())
}

/// GeoJSON polygon for a `minx,miny,maxx,maxy` box, or `None` if the value
/// has fewer than four parts or a part is not a finite number. Parts after
/// the fourth are ignored.
pub(crate) fn bounding_box(value: &str) -> Option<String> {
    let parts = split_list(value);
    if parts.len() < 4 {
        return None;
    }
    let coords: Vec<String> = parts[..4]
        .iter()
        .map(|part| coordinate(part))
        .collect::<Option<_>>()?;
    let [minx, miny, maxx, maxy] = [&coords[0], &coords[1], &coords[2], &coords[3]];
    Some(format!(
        "{{\"type\":\"Polygon\",\"coordinates\":[[[{minx},{miny}],[{minx},{maxy}],[{maxx},{maxy}],[{maxx},{miny}],[{minx},{miny}]]]}}"
    ))
}

impl Ckan3Encoder {
    /// Create an encoder writing to `target`.
    #[must_use]
    pub fn new(pretty: bool, target: OutputTarget) -> Self {
        Self { pretty, target }
    }

    /// Reshape `record` into a CKAN dataset object.
    #[must_use]
    pub fn to_value(record: &FacetRecord) -> Value {
        let mut dataset = Map::new();
        let mut tags: Option<Vec<Value>> = None;
        let mut extras = Vec::new();

        for (key, value) in record.iter() {
            match key {
                TAGS => tags
                    .get_or_insert_with(Vec::new)
                    .extend(split_list(value).into_iter().map(|tag| json!({ "name": tag }))),
                SPATIAL => match bounding_box(value) {
                    Some(polygon) => extras.push(json!({ "key": key, "value": polygon })),
                    None => warn!(
                        source = record.source(),
                        value, "spatial value is malformed, skipping"
                    ),
                },
                _ if NATIVE_FIELDS.contains(&key) => {
                    dataset.insert(key.to_string(), Value::String(value.to_string()));
                }
                _ => extras.push(json!({ "key": key, "value": value })),
            }
        }

        if let Some(tags) = tags {
            dataset.insert(TAGS.to_string(), Value::Array(tags));
        }
        if !extras.is_empty() {
            dataset.insert("extras".to_string(), Value::Array(extras));
        }
        Value::Object(dataset)
    }
}

impl RecordEncoder for Ckan3Encoder {
    fn encode(&self, record: &FacetRecord) -> Result<String> {
        let value = Self::to_value(record);
        let encoded = if self.pretty {
            serde_json::to_string_pretty(&value)
        } else {
            serde_json::to_string(&value)
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
