//! Parser for .edmproj files

use std::path::{Path, PathBuf};

use roxmltree::Document;
use tracing::{debug, warn};

use crate::error::MetadataError;

/// Parsed metadata project
#[derive(Debug, Clone)]
pub struct EdmProject {
    /// Project name
    pub name: String,
    /// Conceptual schema documents (.csdl.json)
    pub conceptual_files: Vec<PathBuf>,
    /// Storage schema documents (.ssdl.json)
    pub storage_files: Vec<PathBuf>,
    /// Mapping documents (.msl.json)
    pub mapping_files: Vec<PathBuf>,
    /// Object-space assembly descriptions, loaded in listed order
    pub assembly_files: Vec<PathBuf>,
    /// Store provider invariant name
    pub provider: Option<String>,
    /// Manifest token for storage documents that do not name one
    pub provider_manifest_token: Option<String>,
    /// Whether recorded schema errors abort loading (default: true)
    pub throw_on_error: bool,
    /// Schema version every artifact must declare
    pub schema_version: Option<f64>,
    /// Project directory
    pub project_dir: PathBuf,
}

impl EdmProject {
    /// Every schema and mapping document, conceptual first.
    pub fn artifact_files(&self) -> Vec<PathBuf> {
        self.conceptual_files
            .iter()
            .chain(&self.storage_files)
            .chain(&self.mapping_files)
            .cloned()
            .collect()
    }
}

/// Item elements that name artifact files, with the suffix their files carry.
const CONCEPTUAL_ITEM: (&str, &str) = ("Conceptual", ".csdl.json");
const STORAGE_ITEM: (&str, &str) = ("Storage", ".ssdl.json");
const MAPPING_ITEM: (&str, &str) = ("Mapping", ".msl.json");
const ASSEMBLY_ITEM: (&str, &str) = ("Assembly", ".json");

pub fn parse_edmproj(path: &Path) -> Result<EdmProject, MetadataError> {
    let content = std::fs::read_to_string(path).map_err(|e| MetadataError::FileReadError {
        path: path.to_path_buf(),
        source: e,
    })?;

    let doc = Document::parse(&content).map_err(|e| MetadataError::ProjectParseError {
        path: path.to_path_buf(),
        source: e,
    })?;

    let root = doc.root_element();
    if root.tag_name().name() != "Project" {
        return Err(MetadataError::InvalidProjectFormat {
            message: format!(
                "expected a <Project> root element, found <{}>",
                root.tag_name().name()
            ),
        });
    }
    let project_dir = path.parent().unwrap_or(Path::new(".")).to_path_buf();

    // Project name from the property group, falling back to the file stem
    let name = find_property_value(&root, "Name").unwrap_or_else(|| {
        path.file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("Metadata")
            .to_string()
    });

    let throw_on_error = match find_property_value(&root, "ThrowOnError") {
        Some(value) => parse_bool(&value).ok_or_else(|| MetadataError::InvalidProjectFormat {
            message: format!("ThrowOnError must be true or false, found '{}'", value),
        })?,
        None => true,
    };

    let schema_version = match find_property_value(&root, "SchemaVersion") {
        Some(value) => Some(value.trim().parse::<f64>().map_err(|_| {
            MetadataError::InvalidProjectFormat {
                message: format!("SchemaVersion '{}' is not a number", value),
            }
        })?),
        None => None,
    };

    let project = EdmProject {
        name,
        conceptual_files: find_item_files(&root, &project_dir, CONCEPTUAL_ITEM),
        storage_files: find_item_files(&root, &project_dir, STORAGE_ITEM),
        mapping_files: find_item_files(&root, &project_dir, MAPPING_ITEM),
        assembly_files: find_item_files(&root, &project_dir, ASSEMBLY_ITEM),
        provider: find_property_value(&root, "Provider"),
        provider_manifest_token: find_property_value(&root, "ProviderManifestToken"),
        throw_on_error,
        schema_version,
        project_dir,
    };
    debug!(
        project = %project.name,
        conceptual = project.conceptual_files.len(),
        storage = project.storage_files.len(),
        mapping = project.mapping_files.len(),
        assemblies = project.assembly_files.len(),
        "parsed metadata project"
    );
    Ok(project)
}

fn find_property_value(root: &roxmltree::Node, property_name: &str) -> Option<String> {
    root.descendants()
        .filter(|n| n.parent().is_some_and(|p| p.tag_name().name() == "PropertyGroup"))
        .find(|n| n.tag_name().name() == property_name)
        .and_then(|n| n.text())
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim() {
        v if v.eq_ignore_ascii_case("true") => Some(true),
        v if v.eq_ignore_ascii_case("false") => Some(false),
        _ => None,
    }
}

/// Files named by `<Element Include=".."/>` items, with `Remove` patterns
/// applied. Globbed includes keep only files with the element's suffix;
/// explicit includes are kept as written so a missing file surfaces when it
/// is read.
fn find_item_files(
    root: &roxmltree::Node,
    project_dir: &Path,
    (element, suffix): (&str, &str),
) -> Vec<PathBuf> {
    let mut include_patterns: Vec<String> = Vec::new();
    let mut exclude_patterns: Vec<String> = Vec::new();

    for node in root.descendants() {
        if node.tag_name().name() == element {
            if let Some(include) = node.attribute("Include") {
                include_patterns.push(include.replace('\\', "/"));
            }
            if let Some(remove) = node.attribute("Remove") {
                exclude_patterns.push(remove.replace('\\', "/"));
            }
        }
    }

    let mut files = Vec::new();
    for pattern in &include_patterns {
        if pattern.contains('*') || pattern.contains('?') {
            let glob_pattern = project_dir.join(pattern);
            match glob::glob(&glob_pattern.to_string_lossy()) {
                Ok(paths) => {
                    let mut matched: Vec<PathBuf> = paths
                        .filter_map(|p| p.ok())
                        .filter(|p| has_suffix(p, suffix))
                        .collect();
                    matched.sort();
                    files.extend(matched);
                }
                Err(e) => warn!(pattern = %pattern, error = %e, "ignoring invalid include pattern"),
            }
        } else {
            files.push(project_dir.join(pattern));
        }
    }

    if !exclude_patterns.is_empty() {
        files.retain(|file| {
            !exclude_patterns.iter().any(|pattern| {
                let exclude = project_dir.join(pattern);
                match glob::Pattern::new(&exclude.to_string_lossy()) {
                    Ok(matcher) => matcher.matches_path(file),
                    Err(_) => file == &exclude,
                }
            })
        });
    }

    files.dedup();
    files
}

fn has_suffix(path: &Path, suffix: &str) -> bool {
    path.file_name()
        .and_then(|n| n.to_str())
        .is_some_and(|n| n.to_ascii_lowercase().ends_with(suffix))
}
