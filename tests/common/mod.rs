//! Common test utilities for rust-edm tests

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};

use tempfile::TempDir;

use rust_edm::{load_workspace, LoadOptions, MetadataWorkspace};

/// Test context with temporary directory for isolated test execution
pub struct TestContext {
    /// Kept to prevent temp directory cleanup until TestContext is dropped
    _temp_dir: TempDir,
    pub project_dir: PathBuf,
    /// Stored for debugging purposes
    _fixture_name: String,
}

impl TestContext {
    /// Create a new test context by copying a fixture to a temp directory
    pub fn with_fixture(fixture_name: &str) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let fixture_path = PathBuf::from(env!("CARGO_MANIFEST_DIR"))
            .join("tests")
            .join("fixtures")
            .join(fixture_name);

        let project_dir = temp_dir.path().to_path_buf();
        copy_dir_recursive(&fixture_path, &project_dir).expect("Failed to copy fixture");

        Self {
            _temp_dir: temp_dir,
            project_dir,
            _fixture_name: fixture_name.to_string(),
        }
    }

    /// Get the path to the .edmproj file
    pub fn project_path(&self) -> PathBuf {
        self.project_dir.join("shop.edmproj")
    }

    /// Overwrite (or add) a file inside the copied fixture
    pub fn write_file(&self, name: &str, content: &str) {
        let path = self.project_dir.join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("Failed to create parent directory");
        }
        fs::write(path, content).expect("Failed to write fixture file");
    }

    /// Read a file of the copied fixture
    pub fn read_file(&self, name: &str) -> String {
        fs::read_to_string(self.project_dir.join(name)).expect("Failed to read fixture file")
    }

    /// Load the project with its own settings
    pub fn load(&self) -> anyhow::Result<MetadataWorkspace> {
        load_workspace(LoadOptions {
            project_path: self.project_path(),
            throw_on_error: None,
            verbose: false,
        })
    }

    /// Load the project, panicking if loading fails.
    pub fn load_successfully(&self) -> MetadataWorkspace {
        let result = self.load();
        assert!(
            result.is_ok(),
            "Load failed for fixture '{}': {:?}",
            self._fixture_name,
            result.as_ref().err()
        );
        result.unwrap()
    }
}

/// Helper to create a test project directory with an edmproj and artifact files
pub fn create_test_project(edmproj_content: &str, files: &[(&str, &str)]) -> TempDir {
    let temp_dir = TempDir::new().unwrap();

    let edmproj_path = temp_dir.path().join("project.edmproj");
    fs::write(&edmproj_path, edmproj_content).unwrap();

    for (name, content) in files {
        let path = temp_dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(&path, content).unwrap();
    }

    temp_dir
}

/// Path of a file in the checked-in fixture, for tests that only read it
pub fn fixture_file(fixture_name: &str, file: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(fixture_name)
        .join(file)
}

fn copy_dir_recursive(src: &Path, dst: &Path) -> std::io::Result<()> {
    if !dst.exists() {
        fs::create_dir_all(dst)?;
    }

    for entry in fs::read_dir(src)? {
        let entry = entry?;
        let src_path = entry.path();
        let dst_path = dst.join(entry.file_name());

        if src_path.is_dir() {
            copy_dir_recursive(&src_path, &dst_path)?;
        } else {
            fs::copy(&src_path, &dst_path)?;
        }
    }

    Ok(())
}
