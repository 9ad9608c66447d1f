//! Reading schema and mapping documents from disk.

use std::path::{Path, PathBuf};

use encoding_rs::{Encoding, WINDOWS_1252};
use rayon::prelude::*;
use tracing::{debug, trace};
use walkdir::WalkDir;

use super::document::{MappingDocument, SchemaDocument, SchemaLayer};
use crate::error::MetadataError;

/// Document count at which loading switches to the rayon pool.
const PARALLEL_THRESHOLD: usize = 8;

const CONCEPTUAL_EXTENSION: &str = ".csdl.json";
const STORAGE_EXTENSION: &str = ".ssdl.json";
const MAPPING_EXTENSION: &str = ".msl.json";

/// Kind of metadata artifact, decided by file name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ArtifactKind {
    Conceptual,
    Storage,
    Mapping,
}

impl ArtifactKind {
    pub fn from_path(path: &Path) -> Option<Self> {
        let name = path.file_name()?.to_str()?.to_ascii_lowercase();
        if name.ends_with(CONCEPTUAL_EXTENSION) {
            Some(ArtifactKind::Conceptual)
        } else if name.ends_with(STORAGE_EXTENSION) {
            Some(ArtifactKind::Storage)
        } else if name.ends_with(MAPPING_EXTENSION) {
            Some(ArtifactKind::Mapping)
        } else {
            None
        }
    }
}

/// Documents loaded from a set of paths, split by layer
#[derive(Debug, Default)]
pub struct LoadedArtifacts {
    pub conceptual: Vec<SchemaDocument>,
    pub storage: Vec<SchemaDocument>,
    pub mapping: Vec<MappingDocument>,
}

impl LoadedArtifacts {
    pub fn is_empty(&self) -> bool {
        self.conceptual.is_empty() && self.storage.is_empty() && self.mapping.is_empty()
    }
}

/// Find every metadata artifact under the given roots.
///
/// Directories are walked recursively, skipping `bin` and `obj`; files are
/// taken as given. The result is sorted so loads are deterministic.
pub fn discover_artifacts(roots: &[PathBuf]) -> Vec<PathBuf> {
    let mut found = Vec::new();
    for root in roots {
        if root.is_file() {
            if ArtifactKind::from_path(root).is_some() {
                found.push(root.clone());
            }
            continue;
        }
        for entry in WalkDir::new(root)
            .into_iter()
            .filter_entry(|e| {
                let name = e.file_name().to_string_lossy();
                !(e.file_type().is_dir() && (name == "bin" || name == "obj"))
            })
            .filter_map(|e| e.ok())
        {
            let path = entry.path();
            if path.is_file() && ArtifactKind::from_path(path).is_some() {
                found.push(path.to_path_buf());
            }
        }
    }
    found.sort();
    found.dedup();
    found
}

/// Load every artifact in `paths`, splitting schema documents by the layer
/// they declare.
pub fn load_artifacts(paths: &[PathBuf]) -> Result<LoadedArtifacts, MetadataError> {
    let (mapping_paths, schema_paths): (Vec<PathBuf>, Vec<PathBuf>) = paths
        .iter()
        .filter(|p| ArtifactKind::from_path(p).is_some())
        .cloned()
        .partition(|p| ArtifactKind::from_path(p) == Some(ArtifactKind::Mapping));

    let mut artifacts = LoadedArtifacts::default();
    for document in load_schema_documents(&schema_paths)? {
        match document.layer {
            SchemaLayer::Conceptual => artifacts.conceptual.push(document),
            SchemaLayer::Storage => artifacts.storage.push(document),
        }
    }
    for path in &mapping_paths {
        artifacts.mapping.push(parse_mapping_document(path)?);
    }
    debug!(
        conceptual = artifacts.conceptual.len(),
        storage = artifacts.storage.len(),
        mapping = artifacts.mapping.len(),
        "loaded metadata artifacts"
    );
    Ok(artifacts)
}

/// Parse schema documents, using parallel processing for larger sets
pub fn load_schema_documents(paths: &[PathBuf]) -> Result<Vec<SchemaDocument>, MetadataError> {
    let mut documents = Vec::with_capacity(paths.len());

    if paths.len() >= PARALLEL_THRESHOLD {
        let results: Vec<Result<SchemaDocument, MetadataError>> = paths
            .par_iter()
            .map(|path| parse_schema_document(path))
            .collect();
        // Order follows `paths`; the first failure wins.
        for result in results {
            documents.push(result?);
        }
    } else {
        for path in paths {
            documents.push(parse_schema_document(path)?);
        }
    }

    Ok(documents)
}

/// Parse a single schema document
pub fn parse_schema_document(path: &Path) -> Result<SchemaDocument, MetadataError> {
    trace!(path = %path.display(), "parsing schema document");
    let text = read_document_text(path)?;
    let mut document: SchemaDocument =
        serde_json::from_str(&text).map_err(|e| MetadataError::DocumentParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
    document.location = Some(path.display().to_string());
    Ok(document)
}

/// Parse a single mapping document
pub fn parse_mapping_document(path: &Path) -> Result<MappingDocument, MetadataError> {
    trace!(path = %path.display(), "parsing mapping document");
    let text = read_document_text(path)?;
    let mut document: MappingDocument =
        serde_json::from_str(&text).map_err(|e| MetadataError::DocumentParseError {
            path: path.to_path_buf(),
            source: e,
        })?;
    document.location = Some(path.display().to_string());
    Ok(document)
}

/// Read a document, honoring a byte order mark.
///
/// Without a BOM the bytes are taken as UTF-8, falling back to Windows-1252
/// for files saved by older editors.
pub fn read_document_text(path: &Path) -> Result<String, MetadataError> {
    let bytes = std::fs::read(path).map_err(|e| MetadataError::FileReadError {
        path: path.to_path_buf(),
        source: e,
    })?;
    decode_document(&bytes).ok_or_else(|| MetadataError::FileReadError {
        path: path.to_path_buf(),
        source: std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            "File contains invalid characters",
        ),
    })
}

fn decode_document(bytes: &[u8]) -> Option<String> {
    if let Some((encoding, bom_length)) = Encoding::for_bom(bytes) {
        let (decoded, had_errors) = encoding.decode_without_bom_handling(&bytes[bom_length..]);
        return (!had_errors).then(|| decoded.into_owned());
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => Some(text.to_string()),
        Err(_) => {
            let (decoded, _, had_errors) = WINDOWS_1252.decode(bytes);
            (!had_errors).then(|| decoded.into_owned())
        }
    }
}
