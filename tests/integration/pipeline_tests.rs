//! End-to-end load tests
//!
//! Project file to workspace through `load_workspace`, and the CLI on top.

use std::process::Command;

use pretty_assertions::assert_eq;

use rust_edm::error::ErrorCode;
use rust_edm::metadata::{DataSpace, EntityType};
use rust_edm::{load_workspace, LoadOptions, MetadataError};

use crate::common::{create_test_project, TestContext};

const KEYLESS_CONCEPTUAL: &str = r#"{
  "namespace": "Broken",
  "layer": "Conceptual",
  "elements": [
    { "kind": "EntityType", "name": "Thing", "properties": [{ "name": "Id", "type": "Int32", "nullable": false }] }
  ]
}"#;

fn metadata_error(err: &anyhow::Error) -> Option<&MetadataError> {
    err.chain().find_map(|cause| cause.downcast_ref::<MetadataError>())
}

fn options(path: std::path::PathBuf, throw_on_error: Option<bool>) -> LoadOptions {
    LoadOptions {
        project_path: path,
        throw_on_error,
        verbose: false,
    }
}

// ============================================================================
// Project Loading Tests
// ============================================================================

#[test]
fn test_project_token_fills_storage_documents() {
    let ctx = TestContext::with_fixture("shop");
    let workspace = ctx.load_successfully();

    let store = workspace.store_collection().unwrap().unwrap();
    assert_eq!(store.manifest().manifest_token(), "2008");
}

#[test]
fn test_verbose_load_succeeds() {
    let ctx = TestContext::with_fixture("shop");
    let result = load_workspace(LoadOptions {
        project_path: ctx.project_path(),
        throw_on_error: None,
        verbose: true,
    });
    assert!(result.is_ok(), "Load failed: {:?}", result.err());
}

#[test]
fn test_project_schema_version_must_match_documents() {
    let ctx = TestContext::with_fixture("shop");
    let project = ctx
        .read_file("shop.edmproj")
        .replace("<SchemaVersion>3.0</SchemaVersion>", "<SchemaVersion>2.0</SchemaVersion>");
    ctx.write_file("shop.edmproj", &project);

    let err = ctx.load().unwrap_err();
    let message = err.to_string();
    assert!(message.contains("expects schema version 2"), "unexpected error: {}", message);
}

#[test]
fn test_missing_project_file_fails() {
    let ctx = TestContext::with_fixture("shop");
    let err = load_workspace(options(ctx.project_dir.join("absent.edmproj"), None)).unwrap_err();
    assert!(matches!(metadata_error(&err), Some(MetadataError::FileReadError { .. })));
}

#[test]
fn test_missing_assembly_file_fails() {
    let ctx = TestContext::with_fixture("shop");
    std::fs::remove_file(ctx.project_dir.join("Shop.Model.json")).unwrap();

    let err = ctx.load().unwrap_err();
    assert!(matches!(metadata_error(&err), Some(MetadataError::FileReadError { .. })));
}

#[test]
fn test_project_without_items_discovers_artifacts() {
    let ctx = TestContext::with_fixture("shop");
    ctx.write_file(
        "shop.edmproj",
        r#"<Project>
  <PropertyGroup>
    <ProviderManifestToken>2008</ProviderManifestToken>
  </PropertyGroup>
</Project>"#,
    );
    ctx.write_file("bin/Stale.csdl.json", "not json");

    let workspace = ctx.load_successfully();
    assert!(workspace.mapping_collection().unwrap().is_some());
    assert!(workspace
        .get_items::<EntityType>(DataSpace::OSpace)
        .unwrap()
        .is_empty());
}

// ============================================================================
// Schema Error Handling
// ============================================================================

#[test]
fn test_schema_errors_fail_the_load_by_default() {
    let project = r#"<Project><ItemGroup><Conceptual Include="*.csdl.json" /></ItemGroup></Project>"#;
    let temp_dir = create_test_project(project, &[("Broken.csdl.json", KEYLESS_CONCEPTUAL)]);

    let err = load_workspace(options(temp_dir.path().join("project.edmproj"), None)).unwrap_err();
    match metadata_error(&err) {
        Some(MetadataError::Schema { errors }) => {
            assert!(errors.iter().any(|e| e.code == ErrorCode::KeyMissingOnEntityType));
        }
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_schema_errors_recorded_when_not_throwing() {
    let project = r#"<Project>
  <PropertyGroup><ThrowOnError>false</ThrowOnError></PropertyGroup>
  <ItemGroup><Conceptual Include="*.csdl.json" /></ItemGroup>
</Project>"#;
    let temp_dir = create_test_project(project, &[("Broken.csdl.json", KEYLESS_CONCEPTUAL)]);

    let result = load_workspace(options(temp_dir.path().join("project.edmproj"), None));
    assert!(result.is_ok(), "Load failed: {:?}", result.err());

    let workspace = result.unwrap();
    let edm = workspace.edm_collection().unwrap().unwrap();
    assert_eq!(edm.errors().len(), 1);
    assert_eq!(edm.errors()[0].code.code(), 75);
    assert!(workspace
        .try_get_item::<EntityType>("Broken.Thing", DataSpace::CSpace, false)
        .unwrap()
        .is_none());
}

#[test]
fn test_load_option_overrides_project_setting() {
    let project = r#"<Project><ItemGroup><Conceptual Include="*.csdl.json" /></ItemGroup></Project>"#;
    let temp_dir = create_test_project(project, &[("Broken.csdl.json", KEYLESS_CONCEPTUAL)]);

    let result = load_workspace(options(temp_dir.path().join("project.edmproj"), Some(false)));
    assert!(result.is_ok(), "Load failed: {:?}", result.err());
}

// ============================================================================
// CLI Tests
// ============================================================================

#[test]
fn test_cli_inspect_prints_summary() {
    let ctx = TestContext::with_fixture("shop");
    let output = Command::new(env!("CARGO_BIN_EXE_rust-edm"))
        .args(["inspect", "--project"])
        .arg(ctx.project_path())
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("Schema version: 3.0"));
    assert!(stdout.contains("Conceptual: 2 entity types, 1 complex types, 1 enum types, 1 associations"));
    assert!(stdout.contains("container ShopContainer: 2 entity sets, 1 association sets"));
    assert!(stdout.contains("Mapping hash: "));
}

#[test]
fn test_cli_write_csdl_to_file() {
    let ctx = TestContext::with_fixture("shop");
    let output_path = ctx.project_dir.join("out").join("ShopStore.ssdl.xml");
    std::fs::create_dir_all(output_path.parent().unwrap()).unwrap();

    let output = Command::new(env!("CARGO_BIN_EXE_rust-edm"))
        .args(["write-csdl", "--space", "storage", "--project"])
        .arg(ctx.project_path())
        .arg("--output")
        .arg(&output_path)
        .output()
        .unwrap();
    assert!(output.status.success(), "stderr: {}", String::from_utf8_lossy(&output.stderr));

    let xml = std::fs::read_to_string(&output_path).unwrap();
    let doc = roxmltree::Document::parse(&xml).unwrap();
    assert_eq!(doc.root_element().attribute("Namespace"), Some("ShopStore"));
    assert_eq!(doc.root_element().attribute("ProviderManifestToken"), Some("2008"));
}

#[test]
fn test_cli_reports_load_failure() {
    let ctx = TestContext::with_fixture("shop");
    let output = Command::new(env!("CARGO_BIN_EXE_rust-edm"))
        .args(["inspect", "--project"])
        .arg(ctx.project_dir.join("absent.edmproj"))
        .output()
        .unwrap();
    assert!(!output.status.success());
}
