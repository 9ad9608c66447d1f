//! Integration tests for rust-edm
//!
//! This file serves as the entry point for all integration tests.

#[path = "common/mod.rs"]
mod common;

#[path = "integration/workspace_tests.rs"]
mod workspace_tests;

#[path = "integration/mapping_tests.rs"]
mod mapping_tests;

#[path = "integration/object_tests.rs"]
mod object_tests;

#[path = "integration/pipeline_tests.rs"]
mod pipeline_tests;
