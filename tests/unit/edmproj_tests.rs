//! Unit tests for .edmproj parser
//!
//! These tests verify the parsing of metadata project files.

use std::io::Write;

use tempfile::{NamedTempFile, TempDir};

use rust_edm::project::parse_edmproj;
use rust_edm::MetadataError;

/// Helper to create a temp edmproj file with content
fn create_edmproj_file(content: &str) -> NamedTempFile {
    let mut file = NamedTempFile::with_suffix(".edmproj").unwrap();
    file.write_all(content.as_bytes()).unwrap();
    file.flush().unwrap();
    file
}

/// Helper to create a test project directory with an edmproj and artifact files
fn create_test_project(edmproj_content: &str, files: &[(&str, &str)]) -> TempDir {
    let temp_dir = TempDir::new().unwrap();

    let edmproj_path = temp_dir.path().join("project.edmproj");
    std::fs::write(&edmproj_path, edmproj_content).unwrap();

    for (name, content) in files {
        let path = temp_dir.path().join(name);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
    }

    temp_dir
}

fn file_names(paths: &[std::path::PathBuf]) -> Vec<String> {
    paths
        .iter()
        .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
        .collect()
}

// ============================================================================
// Property Tests
// ============================================================================

#[test]
fn test_parse_properties() {
    let content = r#"<?xml version="1.0" encoding="utf-8"?>
<Project xmlns="http://schemas.microsoft.com/developer/msbuild/2003">
  <PropertyGroup>
    <Name>Sales</Name>
    <Provider>System.Data.SqlClient</Provider>
    <ProviderManifestToken> 2008 </ProviderManifestToken>
    <ThrowOnError>False</ThrowOnError>
    <SchemaVersion>2.0</SchemaVersion>
  </PropertyGroup>
</Project>"#;

    let temp_dir = create_test_project(content, &[]);
    let result = parse_edmproj(&temp_dir.path().join("project.edmproj"));
    assert!(result.is_ok(), "Failed to parse: {:?}", result.err());

    let project = result.unwrap();
    assert_eq!(project.name, "Sales");
    assert_eq!(project.provider.as_deref(), Some("System.Data.SqlClient"));
    assert_eq!(project.provider_manifest_token.as_deref(), Some("2008"));
    assert!(!project.throw_on_error);
    assert_eq!(project.schema_version, Some(2.0));
    assert_eq!(project.project_dir, temp_dir.path());
}

#[test]
fn test_defaults_when_properties_are_missing() {
    let content = r#"<Project><PropertyGroup /></Project>"#;
    let file = create_edmproj_file(content);

    let project = parse_edmproj(file.path()).unwrap();
    let stem = file.path().file_stem().unwrap().to_string_lossy().into_owned();
    assert_eq!(project.name, stem);
    assert!(project.throw_on_error);
    assert_eq!(project.schema_version, None);
    assert_eq!(project.provider, None);
    assert!(project.artifact_files().is_empty());
    assert!(project.assembly_files.is_empty());
}

#[test]
fn test_invalid_throw_on_error_is_rejected() {
    let content = r#"<Project><PropertyGroup><ThrowOnError>sometimes</ThrowOnError></PropertyGroup></Project>"#;
    let file = create_edmproj_file(content);

    let err = parse_edmproj(file.path()).unwrap_err();
    assert!(
        matches!(err, MetadataError::InvalidProjectFormat { ref message } if message.contains("ThrowOnError")),
        "unexpected error: {:?}",
        err
    );
}

#[test]
fn test_invalid_schema_version_is_rejected() {
    let content = r#"<Project><PropertyGroup><SchemaVersion>three</SchemaVersion></PropertyGroup></Project>"#;
    let file = create_edmproj_file(content);

    let err = parse_edmproj(file.path()).unwrap_err();
    assert!(matches!(err, MetadataError::InvalidProjectFormat { .. }));
}

// ============================================================================
// Format Errors
// ============================================================================

#[test]
fn test_wrong_root_element() {
    let file = create_edmproj_file(r#"<Solution><PropertyGroup /></Solution>"#);

    let err = parse_edmproj(file.path()).unwrap_err();
    assert!(
        matches!(err, MetadataError::InvalidProjectFormat { ref message } if message.contains("Solution")),
        "unexpected error: {:?}",
        err
    );
}

#[test]
fn test_malformed_xml() {
    let file = create_edmproj_file("<Project><PropertyGroup></Project>");

    let err = parse_edmproj(file.path()).unwrap_err();
    assert!(matches!(err, MetadataError::ProjectParseError { .. }));
}

#[test]
fn test_missing_project_file() {
    let temp_dir = TempDir::new().unwrap();
    let err = parse_edmproj(&temp_dir.path().join("missing.edmproj")).unwrap_err();
    assert!(matches!(err, MetadataError::FileReadError { .. }));
}

// ============================================================================
// Item Tests
// ============================================================================

#[test]
fn test_glob_includes_filter_by_suffix() {
    let content = r#"<Project>
  <ItemGroup>
    <Conceptual Include="models\*" />
    <Storage Include="models/*" />
    <Mapping Include="models/*" />
  </ItemGroup>
</Project>"#;

    let temp_dir = create_test_project(
        content,
        &[
            ("models/b.csdl.json", "{}"),
            ("models/a.CSDL.JSON", "{}"),
            ("models/store.ssdl.json", "{}"),
            ("models/map.msl.json", "{}"),
            ("models/readme.txt", ""),
        ],
    );

    let project = parse_edmproj(&temp_dir.path().join("project.edmproj")).unwrap();
    assert_eq!(file_names(&project.conceptual_files), vec!["a.CSDL.JSON", "b.csdl.json"]);
    assert_eq!(file_names(&project.storage_files), vec!["store.ssdl.json"]);
    assert_eq!(file_names(&project.mapping_files), vec!["map.msl.json"]);
    assert_eq!(
        file_names(&project.artifact_files()),
        vec!["a.CSDL.JSON", "b.csdl.json", "store.ssdl.json", "map.msl.json"]
    );
}

#[test]
fn test_remove_pattern_excludes_files() {
    let content = r#"<Project>
  <ItemGroup>
    <Conceptual Include="*.csdl.json" />
    <Conceptual Remove="Draft*.csdl.json" />
  </ItemGroup>
</Project>"#;

    let temp_dir = create_test_project(
        content,
        &[("Shop.csdl.json", "{}"), ("DraftShop.csdl.json", "{}")],
    );

    let project = parse_edmproj(&temp_dir.path().join("project.edmproj")).unwrap();
    assert_eq!(file_names(&project.conceptual_files), vec!["Shop.csdl.json"]);
}

#[test]
fn test_explicit_includes_keep_order_and_missing_files() {
    let content = r#"<Project>
  <ItemGroup>
    <Assembly Include="Shop.App.json" />
    <Assembly Include="Shop.Model.json" />
  </ItemGroup>
</Project>"#;

    let temp_dir = create_test_project(content, &[("Shop.Model.json", "{}")]);

    let project = parse_edmproj(&temp_dir.path().join("project.edmproj")).unwrap();
    assert_eq!(file_names(&project.assembly_files), vec!["Shop.App.json", "Shop.Model.json"]);
    assert!(!project.assembly_files[0].exists());
}

#[test]
fn test_properties_outside_property_group_are_ignored() {
    let content = r#"<Project>
  <ItemGroup>
    <Name>NotTheName</Name>
  </ItemGroup>
  <PropertyGroup>
    <Name>Shop</Name>
  </PropertyGroup>
</Project>"#;

    let file = create_edmproj_file(content);
    let project = parse_edmproj(file.path()).unwrap();
    assert_eq!(project.name, "Shop");
}
