//! Plain XML: `<fieldList>` with one `<field name="...">` per facet.
//!
//! Pretty output breaks lines between elements only; field text is written
//! exactly as stored.

use std::path::Path;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use crate::error::{MapperError, Result};
use crate::formats::traits::{OutputTarget, RecordEncoder};
use crate::record::FacetRecord;

fn write_field_list<W: std::io::Write>(
    writer: &mut Writer<W>,
    record: &FacetRecord,
) -> std::result::Result<(), quick_xml::Error> {
    writer.write_event(Event::Decl(BytesDecl::new("1.0", Some("UTF-8"), None)))?;
    writer.write_event(Event::Start(BytesStart::new("fieldList")))?;
    for (name, value) in record.iter() {
        writer
            .create_element("field")
            .with_attribute(("name", name))
            .write_text_content(BytesText::new(value))?;
    }
    writer.write_event(Event::End(BytesEnd::new("fieldList")))?;
    Ok(())
}

/// Encodes a record as a flat XML field list.
#[derive(Debug)]
pub struct PlainXmlEncoder {
    pretty: bool,
    target: OutputTarget,
}

impl PlainXmlEncoder {
    /// Create an encoder writing to `target`.
    #[must_use]
    pub fn new(pretty: bool, target: OutputTarget) -> Self {
        Self { pretty, target }
    }
}

impl RecordEncoder for PlainXmlEncoder {
    fn encode(&self, record: &FacetRecord) -> Result<String> {
        let mut writer = if self.pretty {
            Writer::new_with_indent(Vec::new(), b' ', 2)
        } else {
            Writer::new(Vec::new())
        };
        write_field_list(&mut writer, record).map_err(|e| MapperError::Encoding(e.to_string()))?;
        String::from_utf8(writer.into_inner()).map_err(|e| MapperError::Encoding(e.to_string()))
    }

    /// The source's base name; the output keeps the input file name.
    fn file_name(&self, record: &FacetRecord) -> String {
        Path::new(record.source())
            .file_name()
            .map_or_else(|| record.source().to_string(), |n| n.to_string_lossy().into_owned())
    }

    fn target(&self) -> &OutputTarget {
        &self.target
    }
}
