//! Mapping tables: the per-schema rule set and the resolution algorithm.
//!
//! A table is loaded from a rule-definition file:
//!
//! ```xml
//! <mapping-table>
//!   <namespaces>
//!     <namespace ns="dc" uri="http://purl.org/dc/elements/1.1/"/>
//!   </namespaces>
//!   <mappings>
//!     <field name="title">
//!       <xpath>//dc:title</xpath>
//!       <string>Untitled</string>
//!     </field>
//!     <field name="id">
//!       <string expand="true">${filename}</string>
//!     </field>
//!   </mappings>
//! </mapping-table>
//! ```
//!
//! Fields are resolved in declaration order. For each field the rules are
//! tried in order and the first non-empty value is kept; later rules are not
//! evaluated for that document.
//!
//! # Examples
//!
//! ```
//! use facetmap::MappingTable;
//!
//! let table = MappingTable::from_xml(r#"
//!     <mapping-table>
//!       <namespaces><namespace ns="dc" uri="http://purl.org/dc/elements/1.1/"/></namespaces>
//!       <mappings>
//!         <field name="title"><xpath>//dc:title</xpath></field>
//!       </mappings>
//!     </mapping-table>"#)?;
//!
//! let record = table.apply_str(
//!     r#"<r xmlns:dc="http://purl.org/dc/elements/1.1/"><dc:title>Hello</dc:title></r>"#,
//!     "hello.xml",
//! )?;
//! assert_eq!(record.get("title"), Some("Hello"));
//! assert_eq!(table.documents_processed(), 1);
//! # Ok::<(), facetmap::MapperError>(())
//! ```

use std::fs;
use std::io::{self, Write};
use std::path::Path;

use indexmap::IndexMap;
use roxmltree::{Document, Node, ParsingOptions};
use tracing::{debug, warn};

use crate::config::VariableSource;
use crate::error::{MapperError, Result};
use crate::namespace::NamespaceContext;
use crate::record::FacetRecord;
use crate::rule::{MappingRule, RuleContext};
use crate::stats::RunStatistics;

/// The rules for one input schema, plus the usage counters of this run.
#[derive(Debug)]
pub struct MappingTable {
    namespaces: NamespaceContext,
    fields: IndexMap<String, Vec<MappingRule>>,
    stats: RunStatistics,
}

fn required_attribute<'a>(node: Node<'a, '_>, name: &str) -> Result<&'a str> {
    node.attribute(name).ok_or_else(|| {
        MapperError::RuleDefinition(format!(
            "<{}> without '{name}' attribute at byte {}",
            node.tag_name().name(),
            node.range().start
        ))
    })
}

fn text_content(node: Node<'_, '_>) -> String {
    node.descendants()
        .filter(Node::is_text)
        .filter_map(|n| n.text())
        .collect()
}

/// Parse an input document. Document type declarations are allowed since
/// metadata records often carry one.
pub(crate) fn parse_document(text: &str) -> std::result::Result<Document<'_>, roxmltree::Error> {
    let options = ParsingOptions {
        allow_dtd: true,
        ..ParsingOptions::default()
    };
    Document::parse_with_options(text, options)
}

impl MappingTable {
    /// Build a table from already constructed parts.
    #[must_use]
    pub fn new(namespaces: NamespaceContext, fields: IndexMap<String, Vec<MappingRule>>) -> Self {
        let stats = RunStatistics::with_shape(fields.values().map(Vec::len));
        Self {
            namespaces,
            fields,
            stats,
        }
    }

    /// Load a table from a rule-definition file.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::IoError`] if the file cannot be read and
    /// [`MapperError::RuleDefinition`] if it is malformed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = fs::read_to_string(path)?;
        debug!(path = %path.display(), "loading mapping table");
        Self::from_xml(&text)
    }

    /// Parse a table from rule-definition text.
    ///
    /// Rule elements other than `xpath` and `string` are skipped with a
    /// warning. Path expressions that fail to compile are logged and always
    /// evaluate to the empty string.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::RuleDefinition`] if the text is not well-formed
    /// XML, the root is not `mapping-table`, a `namespace` lacks `ns` or
    /// `uri`, or a `field` lacks `name`.
    pub fn from_xml(text: &str) -> Result<Self> {
        let doc = Document::parse(text).map_err(|e| MapperError::RuleDefinition(e.to_string()))?;
        let root = doc.root_element();
        if !root.has_tag_name("mapping-table") {
            return Err(MapperError::RuleDefinition(format!(
                "expected <mapping-table>, found <{}>",
                root.tag_name().name()
            )));
        }

        let mut namespaces = NamespaceContext::new();
        for node in root
            .children()
            .filter(|n| n.has_tag_name("namespaces"))
            .flat_map(|section| section.children())
            .filter(|n| n.has_tag_name("namespace"))
        {
            let prefix = required_attribute(node, "ns")?;
            let uri = required_attribute(node, "uri")?;
            namespaces.bind(prefix, uri);
        }

        let mut fields: IndexMap<String, Vec<MappingRule>> = IndexMap::new();
        for node in root
            .children()
            .filter(|n| n.has_tag_name("mappings"))
            .flat_map(|section| section.children())
            .filter(|n| n.has_tag_name("field"))
        {
            let name = required_attribute(node, "name")?;
            let rules = fields.entry(name.to_string()).or_default();
            for declaration in node.children().filter(Node::is_element) {
                let rule = match declaration.tag_name().name() {
                    "xpath" => MappingRule::path(&text_content(declaration)),
                    "string" => {
                        let expand = declaration
                            .attribute("expand")
                            .is_some_and(|v| v.eq_ignore_ascii_case("true"));
                        MappingRule::template(&text_content(declaration), expand)
                    }
                    other => {
                        warn!(field = name, element = other, "unsure how to handle element, skipping");
                        continue;
                    }
                };
                debug!(field = name, rule = %rule, "adding rule");
                rules.push(rule);
            }
        }

        Ok(Self::new(namespaces, fields))
    }

    /// The namespace bindings declared by the table.
    #[must_use]
    pub fn namespaces(&self) -> &NamespaceContext {
        &self.namespaces
    }

    /// Field names in declaration order.
    pub fn field_names(&self) -> impl Iterator<Item = &str> {
        self.fields.keys().map(String::as_str)
    }

    /// The rules of `field`, in order.
    #[must_use]
    pub fn rules(&self, field: &str) -> Option<&[MappingRule]> {
        self.fields.get(field).map(Vec::as_slice)
    }

    /// Map one document to a record. Templates see no variables except
    /// `${filename}`.
    #[must_use]
    pub fn apply(&self, document: &Document<'_>, source: &str) -> FacetRecord {
        self.apply_with_variables(document, source, None)
    }

    /// Map one document to a record, expanding template placeholders from
    /// `variables`.
    ///
    /// Every declared field is resolved with the first rule that yields a
    /// non-empty value; fields without one are absent from the record. The
    /// document counter and the winning rule's counter are incremented.
    #[must_use]
    pub fn apply_with_variables(
        &self,
        document: &Document<'_>,
        source: &str,
        variables: Option<&dyn VariableSource>,
    ) -> FacetRecord {
        self.stats.record_document();
        let mut record = FacetRecord::new(source);

        for (field_index, (field, rules)) in self.fields.iter().enumerate() {
            let ctx = RuleContext {
                document,
                namespaces: &self.namespaces,
                variables,
                record: Some(&record),
            };
            let found = rules.iter().enumerate().find_map(|(rule_index, rule)| {
                let value = rule.evaluate(&ctx);
                (!value.is_empty()).then_some((rule_index, value))
            });
            if let Some((rule_index, value)) = found {
                self.stats.record_hit(field_index, rule_index);
                record.set(field.as_str(), value);
            }
        }

        record
    }

    /// Parse `xml` and map it.
    ///
    /// # Errors
    ///
    /// Returns [`MapperError::Document`] if `xml` is not well-formed. The
    /// document counter is not incremented in that case.
    pub fn apply_str(&self, xml: &str, source: &str) -> Result<FacetRecord> {
        let document = parse_document(xml).map_err(|e| MapperError::Document {
            source_id: source.to_string(),
            message: e.to_string(),
        })?;
        Ok(self.apply(&document, source))
    }

    /// Number of documents mapped so far.
    #[must_use]
    pub fn documents_processed(&self) -> u64 {
        self.stats.documents()
    }

    /// The usage counters of this run.
    #[must_use]
    pub fn statistics(&self) -> &RunStatistics {
        &self.stats
    }

    /// Write the coverage report.
    ///
    /// # Errors
    ///
    /// Returns any error from `out`.
    pub fn write_report<W: Write>(&self, out: &mut W) -> io::Result<()> {
        self.stats.write_report(&self.fields, out)
    }

    /// The coverage report as a string.
    #[must_use]
    pub fn report(&self) -> String {
        let mut out = Vec::new();
        // writing to a Vec cannot fail
        let _ = self.write_report(&mut out);
        String::from_utf8_lossy(&out).into_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const TABLE: &str = r#"<?xml version="1.0"?>
<mapping-table>
  <namespaces>
    <namespace ns="dc" uri="http://purl.org/dc/elements/1.1/"/>
  </namespaces>
  <mappings>
    <field name="title">
      <xpath>//dc:missing</xpath>
      <xpath>//dc:title</xpath>
      <string>fallback</string>
    </field>
    <field name="source">
      <!-- comment between rules -->
      <string expand="TRUE">${filename}</string>
    </field>
    <field name="site">
      <string expand="true">${inputdir}</string>
      <regex>.*</regex>
    </field>
    <field name="title">
      <string>appended</string>
    </field>
  </mappings>
</mapping-table>"#;

    const RECORD: &str = r#"<record xmlns:dc="http://purl.org/dc/elements/1.1/">
  <dc:title> A title </dc:title>
</record>"#;

    #[test]
    fn test_load_declaration_order() {
        let table = MappingTable::from_xml(TABLE).unwrap();
        assert_eq!(
            table.field_names().collect::<Vec<_>>(),
            vec!["title", "source", "site"]
        );
        // the second <field name="title"> appends
        assert_eq!(table.rules("title").unwrap().len(), 4);
        // unknown <regex> is skipped
        assert_eq!(table.rules("site").unwrap().len(), 1);
        assert_eq!(
            table.namespaces().resolve_uri("dc"),
            "http://purl.org/dc/elements/1.1/"
        );
    }

    #[test]
    fn test_first_match_wins() {
        let table = MappingTable::from_xml(TABLE).unwrap();
        let record = table.apply_str(RECORD, "rec.xml").unwrap();

        assert_eq!(record.get("title"), Some("A title"));
        let stats = table.statistics();
        assert_eq!(stats.hits(0, 0), 0);
        assert_eq!(stats.hits(0, 1), 1);
        // later rules are never evaluated once a value is found
        assert_eq!(stats.hits(0, 2), 0);
        assert_eq!(stats.hits(0, 3), 0);
    }

    #[test]
    fn test_filename_and_variables() {
        let table = MappingTable::from_xml(TABLE).unwrap();
        let doc = Document::parse(RECORD).unwrap();

        let record = table.apply(&doc, "rec.xml");
        assert_eq!(record.get("source"), Some("rec.xml"));
        // undefined variable expands to nothing, so the field is absent
        assert_eq!(record.get("site"), None);

        let mut vars = HashMap::new();
        vars.insert("inputdir".to_string(), "records".to_string());
        let record = table.apply_with_variables(&doc, "rec.xml", Some(&vars));
        assert_eq!(record.get("site"), Some("records"));
    }

    #[test]
    fn test_empty_fields_are_absent() {
        let table = MappingTable::from_xml(
            r#"<mapping-table><mappings>
                 <field name="a"><xpath>//nothing</xpath></field>
                 <field name="b"><string>   </string></field>
               </mappings></mapping-table>"#,
        )
        .unwrap();
        let record = table.apply_str("<x/>", "x.xml").unwrap();
        assert_eq!(record.get("a"), None);
        // templates are not trimmed
        assert_eq!(record.get("b"), Some("   "));
    }

    #[test]
    fn test_idempotent() {
        let table = MappingTable::from_xml(TABLE).unwrap();
        let doc = Document::parse(RECORD).unwrap();
        let first = table.apply(&doc, "rec.xml");
        let second = table.apply(&doc, "rec.xml");
        assert_eq!(first, second);
        assert_eq!(table.documents_processed(), 2);
    }

    #[test]
    fn test_malformed_input_document() {
        let table = MappingTable::from_xml(TABLE).unwrap();
        let err = table.apply_str("<record>", "bad.xml").unwrap_err();
        assert!(matches!(err, MapperError::Document { ref source_id, .. } if source_id == "bad.xml"));
        assert_eq!(table.documents_processed(), 0);
    }

    #[test]
    fn test_missing_attributes_are_fatal() {
        assert!(matches!(
            MappingTable::from_xml(
                "<mapping-table><namespaces><namespace ns=\"dc\"/></namespaces></mapping-table>"
            ),
            Err(MapperError::RuleDefinition(_))
        ));
        assert!(matches!(
            MappingTable::from_xml("<mapping-table><mappings><field/></mappings></mapping-table>"),
            Err(MapperError::RuleDefinition(_))
        ));
        assert!(matches!(
            MappingTable::from_xml("<mapping-table>"),
            Err(MapperError::RuleDefinition(_))
        ));
        assert!(matches!(
            MappingTable::from_xml("<other/>"),
            Err(MapperError::RuleDefinition(_))
        ));
    }

    #[test]
    fn test_bad_expression_is_not_fatal() {
        let table = MappingTable::from_xml(
            r#"<mapping-table><mappings>
                 <field name="a"><xpath>//[</xpath><string>ok</string></field>
               </mappings></mapping-table>"#,
        )
        .unwrap();
        let record = table.apply_str("<x/>", "x.xml").unwrap();
        assert_eq!(record.get("a"), Some("ok"));
    }

    #[test]
    fn test_report_coverage() {
        let table = MappingTable::from_xml(TABLE).unwrap();
        table.apply_str(RECORD, "one.xml").unwrap();
        table.apply_str("<record/>", "two.xml").unwrap();

        let report = table.report();
        assert!(report.starts_with("----- Statistics of coverage of mappings -----\n"));
        assert!(report.contains("  --- Facet: title ---\n"));
        assert!(report.contains("\t1 (50 %) \tXPath '//dc:title'\n"));
        assert!(report.contains("\t1 (50 %) \t'fallback'\n"));
        assert!(report.contains("\t2 (100 %) \t'${filename}'\n"));
        assert!(report.contains("\t2 (100 %) \tunmapped\n"));
    }
}
