//! Integration tests for the facetmap library

mod common;

use std::fs;

use facetmap::formats::{Ckan3Encoder, OutputKind, OutputTarget};
use facetmap::processor::{self, collect_xml_files, Processor};
use facetmap::{Configuration, MapperError, OutputSpec};
use serde_json::{json, Value};

#[test]
fn test_collect_fixture_records() {
    let files = collect_xml_files(&common::records_dir()).expect("Could not walk records");
    let names: Vec<String> = files
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect();
    assert_eq!(names, ["broken.xml", "empty.xml", "kalevala.xml", "saami.xml"]);
}

#[test]
fn test_map_full_record() {
    let table = common::olac_table();
    let path = common::records_dir().join("kalevala.xml");
    let record = Processor::new(&table, Vec::new())
        .process_file(&path)
        .expect("Failed to map record");

    let facets: Vec<(&str, &str)> = record.iter().collect();
    assert_eq!(
        facets,
        [
            ("id", "kalevala.xml"),
            ("title", "Kalevala recitations"),
            ("author", "Lönnrot, Elias"),
            ("language", "fin"),
            ("tags", "poetry,oral tradition"),
            ("spatial", "24.5,59.8,31.6,70.1"),
            ("year", "1849"),
            ("notes", "Runes sung in Karelia."),
        ]
    );
}

#[test]
fn test_fallback_rules() {
    let table = common::olac_table();
    let processor = Processor::new(&table, Vec::new());

    let saami = processor
        .process_file(&common::records_dir().join("saami.xml"))
        .unwrap();
    assert_eq!(saami.get("title"), Some("Joik collection"));
    assert_eq!(saami.get("author"), Some("Aikio, Ante"));
    assert_eq!(saami.get("tags"), None);
    assert_eq!(saami.get("year"), None);

    let empty = processor
        .process_file(&common::records_dir().join("archive/empty.xml"))
        .unwrap();
    assert_eq!(empty.get("title"), Some("Untitled"));
    assert_eq!(empty.len(), 2);
}

#[test]
fn test_malformed_document_is_reported() {
    let table = common::olac_table();
    let err = Processor::new(&table, Vec::new())
        .process_file(&common::records_dir().join("archive/broken.xml"))
        .unwrap_err();
    assert!(matches!(err, MapperError::Document { .. }));
    assert_eq!(table.documents_processed(), 0);
}

#[test]
fn test_ckan_output_files() {
    let out = tempfile::tempdir().unwrap();
    let table = common::olac_table();
    let encoder = OutputKind::Ckan3Json.encoder(false, OutputTarget::directory(out.path()));

    let summary = Processor::new(&table, vec![encoder])
        .process_directory(&common::records_dir())
        .unwrap();
    assert_eq!(summary.files, 4);
    assert_eq!(summary.failed, 1);

    let kalevala: Value = serde_json::from_str(&common::read_output(out.path(), "kalevala.json")).unwrap();
    assert_eq!(kalevala["title"], "Kalevala recitations");
    assert_eq!(kalevala["author"], "Lönnrot, Elias");
    assert_eq!(kalevala["id"], "kalevala.xml");
    assert_eq!(
        kalevala["tags"],
        json!([{ "name": "poetry" }, { "name": "oral tradition" }])
    );
    let extras = kalevala["extras"].as_array().unwrap();
    let keys: Vec<&str> = extras.iter().map(|e| e["key"].as_str().unwrap()).collect();
    assert_eq!(keys, ["language", "spatial", "year"]);
    let polygon: Value = serde_json::from_str(extras[1]["value"].as_str().unwrap()).unwrap();
    assert_eq!(polygon["type"], "Polygon");
    assert_eq!(polygon["coordinates"][0][0], json!([24.5, 59.8]));

    let saami: Value = serde_json::from_str(&common::read_output(out.path(), "saami.json")).unwrap();
    let extras = saami["extras"].as_array().unwrap();
    assert!(extras.iter().all(|e| e["key"] != "spatial"));
    assert!(!out.path().join("broken.json").exists());
}

#[test]
fn test_ckan_value_matches_encoder_output() {
    let table = common::olac_table();
    let record = Processor::new(&table, Vec::new())
        .process_file(&common::records_dir().join("kalevala.xml"))
        .unwrap();
    let encoder = OutputKind::Ckan3Json.encoder(true, OutputTarget::stdout());
    let decoded: Value = serde_json::from_str(&encoder.encode(&record).unwrap()).unwrap();
    assert_eq!(decoded, Ckan3Encoder::to_value(&record));
}

#[test]
fn test_run_from_config_file() {
    let work = tempfile::tempdir().unwrap();
    let config_path = work.path().join("config.xml");
    fs::write(
        &config_path,
        format!(
            r#"<config>
  <params>
    <mapfile>{}</mapfile>
    <inputdir>{}</inputdir>
    <outputdir>{}</outputdir>
  </params>
  <outputs>
    <output type="simplejson">json</output>
    <output type="xml" prettyPrint="true">xml</output>
    <output type="rdf">rdf</output>
  </outputs>
</config>"#,
            common::olac_mapping_path().display(),
            common::records_dir().display(),
            work.path().display()
        ),
    )
    .unwrap();

    let mut config = Configuration::new();
    config
        .apply_args([format!("config={}", config_path.display()), "savestats=".to_string()])
        .unwrap();
    config.read_config_file().unwrap();
    assert_eq!(config.outputs().len(), 2);
    assert_eq!(config.savestats(), Some(""));

    let (table, summary) = processor::run(&config, false).unwrap();
    assert_eq!(summary.mapped(), 3);
    assert_eq!(table.documents_processed(), 3);

    let json_dir = work.path().join("json");
    let empty: Value = serde_json::from_str(&common::read_output(&json_dir, "empty.json")).unwrap();
    assert_eq!(empty, json!({ "id": "empty.xml", "title": "Untitled" }));

    let xml = common::read_output(&work.path().join("xml"), "saami.xml");
    assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<fieldList>"));
    assert!(xml.contains("<field name=\"title\">Joik collection</field>"));
    assert!(!work.path().join("rdf").exists());
}

#[test]
fn test_parallel_run_counts_match_sequential() {
    let table = common::olac_table();
    let sequential = Processor::new(&table, Vec::new())
        .process_directory(&common::records_dir())
        .unwrap();

    let parallel_table = common::olac_table();
    let parallel = Processor::new(&parallel_table, Vec::new())
        .parallel(true)
        .process_directory(&common::records_dir())
        .unwrap();

    assert_eq!(sequential, parallel);
    assert_eq!(table.report(), parallel_table.report());
}

#[test]
fn test_coverage_report() {
    let table = common::olac_table();
    Processor::new(&table, Vec::new())
        .process_directory(&common::records_dir())
        .unwrap();
    let report = table.report();

    let mut lines = report.lines();
    assert_eq!(lines.next(), Some("----- Statistics of coverage of mappings -----"));
    assert_eq!(lines.next(), Some("  --- Facet: id ---"));
    assert_eq!(lines.next(), Some("\t3 (100 %) \t'${filename}'"));
    assert_eq!(lines.next(), Some("  --- Facet: title ---"));
    assert_eq!(lines.next(), Some("\t1 (33.3 %) \tXPath '//dc:title'"));
    assert_eq!(lines.next(), Some("\t1 (33.3 %) \tXPath '//dcterms:alternative'"));
    assert_eq!(lines.next(), Some("\t1 (33.3 %) \t'Untitled'"));
    assert_eq!(lines.next(), Some("  --- Facet: author ---"));
    assert_eq!(lines.next(), Some("\t1 (33.3 %) \tXPath '//dc:creator'"));
    assert_eq!(
        lines.next(),
        Some("\t1 (33.3 %) \tXPath '//dc:contributor[@olac:code='author']'")
    );
    assert_eq!(lines.next(), Some("\t1 (33.3 %) \tunmapped"));
    assert!(report.contains("  --- Facet: tags ---\n\t1 (33.3 %) \tXPath 'string-join(//dc:subject, ',')'\n\t2 (66.7 %) \tunmapped\n"));
}

#[test]
fn test_outputs_sharing_a_directory_keep_first_file() {
    let out = tempfile::tempdir().unwrap();
    let mut config = Configuration::new();
    config
        .set_param("mapfile", common::olac_mapping_path().to_string_lossy())
        .unwrap();
    config
        .set_param("inputdir", common::records_dir().to_string_lossy())
        .unwrap();
    for kind in [OutputKind::SimpleJson, OutputKind::Ckan3Json] {
        config.add_output(OutputSpec {
            kind,
            pretty: false,
            directory: Some(out.path().to_path_buf()),
        });
    }

    let (table, summary) = processor::run(&config, false).unwrap();
    assert_eq!(summary.mapped(), 3);

    let record = Processor::new(&table, Vec::new())
        .process_file(&common::records_dir().join("kalevala.xml"))
        .unwrap();
    let simple = OutputKind::SimpleJson
        .encoder(false, OutputTarget::stdout())
        .encode(&record)
        .unwrap();
    assert_eq!(common::read_output(out.path(), "kalevala.json"), simple);
}

#[test]
fn test_missing_mapfile_is_fatal() {
    let mut config = Configuration::new();
    config
        .apply_args([format!("inputdir={}", common::records_dir().display())])
        .unwrap();
    assert!(matches!(processor::run(&config, false), Err(MapperError::Config(_))));

    config.set_param("mapfile", "/nonexistent/map.xml").unwrap();
    assert!(matches!(processor::run(&config, false), Err(MapperError::IoError(_))));
}
