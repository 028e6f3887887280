//! Property tests for the resolution algorithm and its counters.

use facetmap::MappingTable;
use proptest::prelude::*;

const TABLE: &str = r#"<mapping-table>
  <mappings>
    <field name="primary">
      <xpath>//a</xpath>
      <xpath>//b</xpath>
    </field>
    <field name="secondary">
      <xpath>//c</xpath>
    </field>
    <field name="never"/>
  </mappings>
</mapping-table>"#;

fn element(name: &str, text: &Option<String>) -> String {
    text.as_ref()
        .map(|t| format!("<{name}>{t}</{name}>"))
        .unwrap_or_default()
}

fn non_blank(text: &Option<String>) -> bool {
    text.as_ref().is_some_and(|t| !t.trim().is_empty())
}

fn text() -> impl Strategy<Value = Option<String>> {
    proptest::option::of("[ a-z]{0,6}")
}

proptest! {
    #[test]
    fn test_hits_plus_unmapped_equals_documents(
        docs in proptest::collection::vec((text(), text(), text()), 0..40)
    ) {
        let table = MappingTable::from_xml(TABLE).unwrap();
        for (i, (a, b, c)) in docs.iter().enumerate() {
            let xml = format!("<r>{}{}{}</r>", element("a", a), element("b", b), element("c", c));
            table.apply_str(&xml, &format!("{i}.xml")).unwrap();
        }

        let stats = table.statistics();
        let documents = docs.len() as u64;
        prop_assert_eq!(stats.documents(), documents);

        for (field, rules) in [(0, 2), (1, 1), (2, 0)] {
            let hits: u64 = (0..rules).map(|rule| stats.hits(field, rule)).sum();
            prop_assert_eq!(hits + stats.unmapped(field), documents);
        }

        let first = docs.iter().filter(|(a, _, _)| non_blank(a)).count() as u64;
        let second = docs.iter().filter(|(a, b, _)| !non_blank(a) && non_blank(b)).count() as u64;
        prop_assert_eq!(stats.hits(0, 0), first);
        prop_assert_eq!(stats.hits(0, 1), second);
        prop_assert_eq!(stats.unmapped(2), documents);
    }

    #[test]
    fn test_applying_twice_gives_equal_records(a in text(), c in text()) {
        let table = MappingTable::from_xml(TABLE).unwrap();
        let xml = format!("<r>{}{}</r>", element("a", &a), element("c", &c));
        let first = table.apply_str(&xml, "same.xml").unwrap();
        let second = table.apply_str(&xml, "same.xml").unwrap();
        prop_assert_eq!(first, second);
    }
}
