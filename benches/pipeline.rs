//! Pipeline benchmarks for rust-edm
//!
//! This benchmark module measures:
//! - Full pipeline: edmproj -> workspace
//! - Schema document parsing
//! - Conceptual item conversion
//! - Item lookup
//! - Schema XML generation
//!
//! Run with: cargo bench
//! Compare against baseline: cargo bench -- --save-baseline before
//!                          (make changes)
//!                          cargo bench -- --baseline before

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use rust_edm::items::EdmItemCollection;
use rust_edm::metadata::{DataSpace, EntityType};
use rust_edm::provider::EdmProviderManifest;
use rust_edm::som::loader::parse_schema_document;
use rust_edm::writer::{write_schema, CsdlXmlWriter};
use rust_edm::{load_workspace, LoadOptions};
use std::path::PathBuf;
use std::sync::Arc;

/// Get the path to a test fixture
fn fixture_path(name: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join(name)
}

/// Benchmark the full pipeline: edmproj -> workspace with object space loaded
fn bench_full_pipeline(c: &mut Criterion) {
    let mut group = c.benchmark_group("full_pipeline");

    let project_path = fixture_path("shop").join("shop.edmproj");
    group.bench_function("shop", |b| {
        b.iter(|| {
            let options = LoadOptions {
                project_path: black_box(project_path.clone()),
                throw_on_error: None,
                verbose: false,
            };
            load_workspace(options).unwrap()
        })
    });

    // The mapping hash is cached per collection, so a fresh load is timed
    group.bench_function("shop_with_mapping_hash", |b| {
        b.iter(|| {
            let workspace = load_workspace(LoadOptions {
                project_path: project_path.clone(),
                throw_on_error: None,
                verbose: false,
            })
            .unwrap();
            workspace.get_mapping_hash().unwrap()
        })
    });

    group.finish();
}

/// Benchmark schema document parsing
fn bench_document_parsing(c: &mut Criterion) {
    let mut group = c.benchmark_group("document_parsing");

    let path = fixture_path("shop").join("Shop.csdl.json");
    group.bench_function("conceptual", |b| {
        b.iter(|| parse_schema_document(black_box(&path)).unwrap())
    });

    group.finish();
}

/// Benchmark conversion of a conceptual document into items
fn bench_conversion(c: &mut Criterion) {
    let mut group = c.benchmark_group("conversion");

    let document = parse_schema_document(&fixture_path("shop").join("Shop.csdl.json")).unwrap();
    let manifest = Arc::new(EdmProviderManifest::new().unwrap());

    group.throughput(Throughput::Elements(document.elements.len() as u64));
    group.bench_function(BenchmarkId::new("shop", document.elements.len()), |b| {
        b.iter(|| {
            EdmItemCollection::from_documents(
                black_box(vec![document.clone()]),
                Arc::clone(&manifest),
                true,
            )
            .unwrap()
        })
    });

    group.finish();
}

/// Benchmark item lookup through the workspace
fn bench_lookup(c: &mut Criterion) {
    let mut group = c.benchmark_group("lookup");

    let workspace = load_workspace(LoadOptions {
        project_path: fixture_path("shop").join("shop.edmproj"),
        throw_on_error: None,
        verbose: false,
    })
    .unwrap();

    group.bench_function("exact", |b| {
        b.iter(|| {
            workspace
                .try_get_item::<EntityType>(black_box("Shop.Customer"), DataSpace::CSpace, false)
                .unwrap()
        })
    });

    group.bench_function("ignore_case", |b| {
        b.iter(|| {
            workspace
                .try_get_item::<EntityType>(black_box("shop.customer"), DataSpace::CSpace, true)
                .unwrap()
        })
    });

    group.finish();
}

/// Benchmark schema XML generation
fn bench_xml_generation(c: &mut Criterion) {
    let mut group = c.benchmark_group("xml_generation");

    let document = parse_schema_document(&fixture_path("shop").join("Shop.csdl.json")).unwrap();
    let edm = EdmItemCollection::from_documents(
        vec![document],
        Arc::new(EdmProviderManifest::new().unwrap()),
        true,
    )
    .unwrap();

    group.bench_function("conceptual_xml", |b| {
        b.iter(|| {
            let mut writer = CsdlXmlWriter::new(Vec::new());
            write_schema(edm.items(), black_box("Shop"), 3.0, &mut writer).unwrap();
            writer.into_inner()
        })
    });

    group.finish();
}

criterion_group!(
    benches,
    bench_full_pipeline,
    bench_document_parsing,
    bench_conversion,
    bench_lookup,
    bench_xml_generation,
);

criterion_main!(benches);
