//! Unit tests for artifact discovery and document loading

use std::path::PathBuf;

use tempfile::TempDir;

use rust_edm::som::loader::{parse_mapping_document, parse_schema_document};
use rust_edm::som::{discover_artifacts, load_artifacts, ArtifactKind, SchemaElement, SchemaLayer};
use rust_edm::MetadataError;

const MINIMAL_CONCEPTUAL: &str = r#"{ "namespace": "A", "layer": "Conceptual" }"#;
const MINIMAL_STORAGE: &str = r#"{ "namespace": "AStore", "layer": "Storage", "providerManifestToken": "2008" }"#;
const MINIMAL_MAPPING: &str = r#"{ "version": 3.0 }"#;

fn create_tree(files: &[(&str, &[u8])]) -> TempDir {
    let temp_dir = TempDir::new().unwrap();
    for (name, content) in files {
        let path = temp_dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
    }
    temp_dir
}

fn relative(root: &TempDir, paths: &[PathBuf]) -> Vec<String> {
    paths
        .iter()
        .map(|p| {
            p.strip_prefix(root.path())
                .unwrap()
                .to_string_lossy()
                .replace('\\', "/")
        })
        .collect()
}

// ============================================================================
// Discovery Tests
// ============================================================================

#[test]
fn test_artifact_kind_from_extension() {
    assert_eq!(
        ArtifactKind::from_path(&PathBuf::from("Model.CSDL.json")),
        Some(ArtifactKind::Conceptual)
    );
    assert_eq!(
        ArtifactKind::from_path(&PathBuf::from("x/Model.ssdl.json")),
        Some(ArtifactKind::Storage)
    );
    assert_eq!(
        ArtifactKind::from_path(&PathBuf::from("Model.msl.json")),
        Some(ArtifactKind::Mapping)
    );
    assert_eq!(ArtifactKind::from_path(&PathBuf::from("Model.json")), None);
}

#[test]
fn test_discovery_skips_build_output_directories() {
    let root = create_tree(&[
        ("Model.csdl.json", MINIMAL_CONCEPTUAL.as_bytes()),
        ("store/Model.ssdl.json", MINIMAL_STORAGE.as_bytes()),
        ("bin/Debug/Model.csdl.json", MINIMAL_CONCEPTUAL.as_bytes()),
        ("obj/Model.msl.json", MINIMAL_MAPPING.as_bytes()),
        ("notes.json", b"{}".as_slice()),
    ]);

    let found = discover_artifacts(&[root.path().to_path_buf()]);
    assert_eq!(relative(&root, &found), vec!["Model.csdl.json", "store/Model.ssdl.json"]);
}

#[test]
fn test_discovery_accepts_files_and_dedups() {
    let root = create_tree(&[("Model.csdl.json", MINIMAL_CONCEPTUAL.as_bytes())]);
    let file = root.path().join("Model.csdl.json");

    let found = discover_artifacts(&[file.clone(), root.path().to_path_buf(), root.path().join("readme.txt")]);
    assert_eq!(found, vec![file]);
}

// ============================================================================
// Loading Tests
// ============================================================================

#[test]
fn test_load_splits_by_declared_layer() {
    // A storage document saved with the conceptual extension still loads as
    // storage: the layer inside the document decides.
    let root = create_tree(&[
        ("A.csdl.json", MINIMAL_CONCEPTUAL.as_bytes()),
        ("B.csdl.json", MINIMAL_STORAGE.as_bytes()),
        ("A.msl.json", MINIMAL_MAPPING.as_bytes()),
    ]);

    let found = discover_artifacts(&[root.path().to_path_buf()]);
    let result = load_artifacts(&found);
    assert!(result.is_ok(), "Failed to load: {:?}", result.err());

    let artifacts = result.unwrap();
    assert_eq!(artifacts.conceptual.len(), 1);
    assert_eq!(artifacts.storage.len(), 1);
    assert_eq!(artifacts.mapping.len(), 1);
    assert_eq!(artifacts.storage[0].provider_manifest_token.as_deref(), Some("2008"));
    assert!(!artifacts.is_empty());
}

#[test]
fn test_schema_document_defaults_and_location() {
    let root = create_tree(&[("A.csdl.json", MINIMAL_CONCEPTUAL.as_bytes())]);
    let path = root.path().join("A.csdl.json");

    let document = parse_schema_document(&path).unwrap();
    assert_eq!(document.layer, SchemaLayer::Conceptual);
    assert_eq!(document.version, 3.0);
    assert!(document.elements.is_empty());
    assert_eq!(document.location, Some(path.display().to_string()));
}

#[test]
fn test_byte_order_mark_is_honored() {
    let mut bytes = vec![0xEF, 0xBB, 0xBF];
    bytes.extend_from_slice(MINIMAL_CONCEPTUAL.as_bytes());
    let root = create_tree(&[("A.csdl.json", bytes.as_slice())]);

    let result = parse_schema_document(&root.path().join("A.csdl.json"));
    assert!(result.is_ok(), "Failed to parse: {:?}", result.err());
    assert_eq!(result.unwrap().namespace, "A");
}

#[test]
fn test_invalid_json_reports_path() {
    let root = create_tree(&[("Broken.msl.json", b"{ \"version\": ".as_slice())]);
    let path = root.path().join("Broken.msl.json");

    let err = parse_mapping_document(&path).unwrap_err();
    match err {
        MetadataError::DocumentParseError { path: reported, .. } => assert_eq!(reported, path),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_unknown_element_kind_is_a_parse_error() {
    let root = create_tree(&[(
        "A.csdl.json",
        br#"{ "namespace": "A", "layer": "Conceptual", "elements": [{ "kind": "Table", "name": "T" }] }"#.as_slice(),
    )]);

    let err = parse_schema_document(&root.path().join("A.csdl.json")).unwrap_err();
    assert!(matches!(err, MetadataError::DocumentParseError { .. }));
}

#[test]
fn test_fixture_conceptual_document_parses() {
    let path = PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/shop/Shop.csdl.json");
    let document = parse_schema_document(&path).unwrap();

    let kinds: Vec<_> = document.elements.iter().map(SchemaElement::kind_name).collect();
    assert_eq!(
        kinds,
        vec!["EnumType", "ComplexType", "EntityType", "EntityType", "Association", "EntityContainer"]
    );
    assert_eq!(document.alias.as_deref(), Some("Self"));
}
