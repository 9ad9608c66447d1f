//! rust-edm: conceptual and storage metadata for entity data models
//!
//! This library converts schema object model documents into frozen,
//! queryable metadata (entity, complex, enum and association types,
//! functions and containers) and serves it through a [`MetadataWorkspace`].

pub mod converter;
pub mod error;
pub mod items;
pub mod metadata;
pub mod project;
pub mod provider;
pub mod som;
pub mod util;
pub mod validator;
pub mod workspace;
pub mod writer;

use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Context, Result};

pub use error::{EdmSchemaError, ErrorCode, MetadataError, Severity};
pub use workspace::{MetadataWorkspace, SpaceCollection};

use items::{AssemblyCatalog, ClrAssembly};

/// Options for loading a metadata project
#[derive(Debug, Clone)]
pub struct LoadOptions {
    /// Path to the .edmproj file
    pub project_path: PathBuf,
    /// Abort on recorded schema errors; `None` defers to the project's
    /// `ThrowOnError` property
    pub throw_on_error: Option<bool>,
    /// Enable verbose output
    pub verbose: bool,
}

/// Load a workspace from a metadata project
pub fn load_workspace(options: LoadOptions) -> Result<MetadataWorkspace> {
    if options.verbose {
        println!("Loading project: {}", options.project_path.display());
    }

    // Step 1: Parse the project file
    let project = project::parse_edmproj(&options.project_path)?;
    let throw_on_error = options.throw_on_error.unwrap_or(project.throw_on_error);

    // Step 2: Read assembly descriptions
    let mut catalog = AssemblyCatalog::new();
    let mut assembly_names = Vec::with_capacity(project.assembly_files.len());
    for path in &project.assembly_files {
        let assembly = ClrAssembly::from_file(path)?;
        assembly_names.push(assembly.name.clone());
        catalog.add(assembly);
    }

    // Step 3: Load schema and mapping documents; without explicit items
    // the project directory is scanned
    let mut artifact_files = project.artifact_files();
    if artifact_files.is_empty() {
        artifact_files = som::discover_artifacts(&[project.project_dir.clone()]);
    }
    let mut artifacts = som::load_artifacts(&artifact_files)?;
    if let Some(token) = &project.provider_manifest_token {
        for document in artifacts.storage.iter_mut() {
            if document.provider_manifest_token.is_none() {
                document.provider_manifest_token = Some(token.clone());
            }
        }
    }
    if let Some(provider) = &project.provider {
        for document in artifacts.storage.iter_mut() {
            if document.provider.is_none() {
                document.provider = Some(provider.clone());
            }
        }
    }

    if options.verbose {
        println!(
            "Found {} conceptual, {} storage and {} mapping documents",
            artifacts.conceptual.len(),
            artifacts.storage.len(),
            artifacts.mapping.len()
        );
    }

    // Step 4: Build the workspace
    let workspace = MetadataWorkspace::from_artifacts(artifacts, Arc::new(catalog), throw_on_error)
        .with_context(|| format!("loading project '{}'", project.name))?;

    if let (Some(expected), Some(actual)) = (project.schema_version, workspace.schema_version()) {
        if (expected - actual).abs() > f64::EPSILON {
            bail!(
                "project '{}' expects schema version {} but its documents declare {}",
                project.name,
                expected,
                actual
            );
        }
    }

    // Step 5: Load object-space types in project order
    for name in &assembly_names {
        let loaded = workspace.load_from_assembly(name)?;
        if options.verbose {
            println!("Loaded assembly {} (types: {})", name, loaded);
        }
    }

    if options.verbose {
        println!("Workspace {} ready", workspace.id());
    }

    Ok(workspace)
}
