//! Workspace integration tests
//!
//! Load the shop fixture and query it through the workspace surface.

use std::sync::Arc;

use rust_edm::items::{
    AssemblyCatalog, EdmItemCollection, ObjectItemCollection, StorageMappingItemCollection, StoreItemCollection,
};
use rust_edm::metadata::{
    ComplexType, DataSpace, EdmType, EntityContainer, EntityType, EnumType, GlobalItem, MetadataItem,
    PrimitiveTypeKind,
};
use rust_edm::provider::EdmProviderManifest;
use rust_edm::som::{MappingDocument, SchemaDocument};
use rust_edm::workspace::{WorkspaceLoaders, MAXIMUM_EDM_VERSION_SUPPORTED};
use rust_edm::{MetadataError, MetadataWorkspace, SpaceCollection};

use crate::common::TestContext;

fn empty_workspace() -> MetadataWorkspace {
    MetadataWorkspace::new(Arc::new(AssemblyCatalog::new())).unwrap()
}

fn document(json: &str) -> SchemaDocument {
    serde_json::from_str(json).unwrap()
}

fn edm_collection(version: f64) -> EdmItemCollection {
    let json = format!(
        r#"{{ "namespace": "Versioned", "layer": "Conceptual", "version": {:.1} }}"#,
        version
    );
    EdmItemCollection::from_documents(vec![document(&json)], Arc::new(EdmProviderManifest::new().unwrap()), true)
        .unwrap()
}

fn store_collection(version: f64) -> StoreItemCollection {
    let json = format!(
        r#"{{ "namespace": "VersionedStore", "layer": "Storage", "version": {:.1}, "providerManifestToken": "2008" }}"#,
        version
    );
    StoreItemCollection::from_documents(vec![document(&json)], Arc::new(EdmProviderManifest::new().unwrap()), true)
        .unwrap()
}

// ============================================================================
// Loading Tests
// ============================================================================

#[test]
fn test_load_fixture_registers_every_space() {
    let ctx = TestContext::with_fixture("shop");
    let workspace = ctx.load_successfully();

    assert_eq!(workspace.schema_version(), Some(3.0));
    for space in [
        DataSpace::CSpace,
        DataSpace::SSpace,
        DataSpace::OSpace,
        DataSpace::CSSpace,
        DataSpace::OCSpace,
    ] {
        let collection = workspace.get_item_collection(space);
        assert!(collection.is_ok(), "No collection for {}: {:?}", space, collection.err());
        assert_eq!(collection.unwrap().data_space(), space);
    }
}

#[test]
fn test_items_are_read_only_after_load() {
    let ctx = TestContext::with_fixture("shop");
    let workspace = ctx.load_successfully();

    let items = workspace.all_items(DataSpace::CSpace).unwrap();
    assert!(!items.is_empty());
    assert!(items.iter().all(|item| item.is_read_only()));
}

#[test]
fn test_workspace_ids_are_unique() {
    let first = empty_workspace();
    let second = empty_workspace();
    assert_ne!(first.id(), second.id());
    assert_eq!(MetadataWorkspace::maximum_edm_version_supported(), MAXIMUM_EDM_VERSION_SUPPORTED);
}

// ============================================================================
// Lookup Tests
// ============================================================================

#[test]
fn test_get_item_by_identity() {
    let ctx = TestContext::with_fixture("shop");
    let workspace = ctx.load_successfully();

    let customer = workspace.get_item::<EntityType>("Shop.Customer", DataSpace::CSpace).unwrap();
    assert_eq!(customer.name(), "Customer");
    assert_eq!(customer.declared_key_member_names(), ["Id".to_string()]);
    assert_eq!(customer.properties().count(), 3);
    assert_eq!(customer.navigation_properties().count(), 1);

    let address = workspace.get_item::<ComplexType>("Shop.Address", DataSpace::CSpace).unwrap();
    assert_eq!(address.properties().count(), 2);

    let status = workspace.get_item::<EnumType>("Shop.OrderStatus", DataSpace::CSpace).unwrap();
    assert_eq!(status.underlying_type().kind(), PrimitiveTypeKind::Int32);
}

#[test]
fn test_lookup_honors_case_sensitivity() {
    let ctx = TestContext::with_fixture("shop");
    let workspace = ctx.load_successfully();

    let exact = workspace
        .try_get_item::<EntityType>("shop.customer", DataSpace::CSpace, false)
        .unwrap();
    assert!(exact.is_none());

    let relaxed = workspace
        .try_get_item::<EntityType>("shop.customer", DataSpace::CSpace, true)
        .unwrap();
    assert_eq!(relaxed.map(|e| e.identity().to_string()).as_deref(), Some("Shop.Customer"));

    let by_name = workspace.try_get_type("ORDER", "Shop", DataSpace::CSpace, true).unwrap();
    assert!(matches!(by_name, Some(GlobalItem::EntityType(_))));
}

#[test]
fn test_get_item_of_wrong_kind_fails() {
    let ctx = TestContext::with_fixture("shop");
    let workspace = ctx.load_successfully();

    let err = workspace
        .get_item::<ComplexType>("Shop.Customer", DataSpace::CSpace)
        .unwrap_err();
    assert!(
        matches!(err, MetadataError::UnexpectedItemKind { .. } | MetadataError::ItemNotFound { .. }),
        "unexpected error: {:?}",
        err
    );
}

#[test]
fn test_missing_item_is_not_found() {
    let ctx = TestContext::with_fixture("shop");
    let workspace = ctx.load_successfully();

    let err = workspace.get_type("Invoice", "Shop", DataSpace::CSpace, false).unwrap_err();
    assert!(matches!(err, MetadataError::ItemNotFound { .. }));
    assert!(workspace
        .try_get_type("Invoice", "Shop", DataSpace::CSpace, false)
        .unwrap()
        .is_none());
}

#[test]
fn test_entity_containers_per_space() {
    let ctx = TestContext::with_fixture("shop");
    let workspace = ctx.load_successfully();

    let conceptual = workspace
        .get_entity_container("ShopContainer", DataSpace::CSpace, false)
        .unwrap();
    assert_eq!(conceptual.entity_sets().count(), 2);
    assert_eq!(conceptual.association_sets().count(), 1);

    let storage = workspace
        .get_entity_container("shopstorecontainer", DataSpace::SSpace, true)
        .unwrap();
    assert_eq!(storage.name(), "ShopStoreContainer");

    assert!(workspace
        .try_get_entity_container("ShopContainer", DataSpace::SSpace, false)
        .unwrap()
        .is_none());

    let containers = workspace.get_items::<EntityContainer>(DataSpace::CSpace).unwrap();
    assert_eq!(containers.len(), 1);
}

#[test]
fn test_primitive_types_per_space() {
    let ctx = TestContext::with_fixture("shop");
    let workspace = ctx.load_successfully();

    let conceptual = workspace.get_primitive_types(DataSpace::CSpace).unwrap();
    assert!(conceptual.iter().any(|t| t.name() == "Int32"));

    let storage = workspace.get_primitive_types(DataSpace::SSpace).unwrap();
    assert!(storage.iter().any(|t| t.name() == "nvarchar"));

    let object = workspace.get_primitive_types(DataSpace::OSpace).unwrap();
    assert!(object.iter().any(|t| t.identity() == "System.Int32"));

    let err = workspace.get_primitive_types(DataSpace::CSSpace).unwrap_err();
    assert!(matches!(err, MetadataError::InvalidDataSpace { .. }));
}

#[test]
fn test_store_functions_come_from_the_provider_manifest() {
    let ctx = TestContext::with_fixture("shop");
    let workspace = ctx.load_successfully();

    let overloads = workspace
        .get_functions("LEN", "SqlServer", DataSpace::SSpace, false)
        .unwrap();
    assert!(!overloads.is_empty());
    assert!(overloads.iter().all(|f| f.is_from_provider_manifest()));

    let none = workspace
        .get_functions("LEN", "SqlServer", DataSpace::CSpace, false)
        .unwrap();
    assert!(none.is_empty());
}

// ============================================================================
// Registration Tests
// ============================================================================

#[test]
fn test_space_without_collection_is_reported() {
    let workspace = empty_workspace();

    assert!(workspace.try_get_item_collection(DataSpace::CSpace).unwrap().is_none());
    let err = workspace.get_item_collection(DataSpace::SSpace).unwrap_err();
    assert!(matches!(
        err,
        MetadataError::ItemCollectionNotRegistered {
            space: DataSpace::SSpace
        }
    ));
    let err = workspace
        .get_item::<EntityType>("Shop.Customer", DataSpace::CSpace)
        .unwrap_err();
    assert!(matches!(err, MetadataError::ItemCollectionNotRegistered { .. }));

    // Object space always exists
    assert!(workspace.try_get_item_collection(DataSpace::OSpace).unwrap().is_some());
}

#[test]
fn test_register_twice_is_rejected() {
    let workspace = empty_workspace();
    workspace
        .register_item_collection(SpaceCollection::Edm(Arc::new(edm_collection(3.0))))
        .unwrap();

    let err = workspace
        .register_item_collection(SpaceCollection::Edm(Arc::new(edm_collection(3.0))))
        .unwrap_err();
    assert!(matches!(
        err,
        MetadataError::ItemCollectionAlreadyRegistered {
            space: DataSpace::CSpace
        }
    ));
}

#[test]
fn test_object_collection_cannot_be_replaced() {
    let workspace = empty_workspace();
    let objects = ObjectItemCollection::new(Arc::new(AssemblyCatalog::new())).unwrap();

    let err = workspace
        .register_item_collection(SpaceCollection::Object(Arc::new(objects)))
        .unwrap_err();
    assert!(matches!(
        err,
        MetadataError::ItemCollectionAlreadyRegistered {
            space: DataSpace::OSpace
        }
    ));
}

#[test]
fn test_schema_versions_must_agree() {
    let workspace = empty_workspace();
    workspace
        .register_item_collection(SpaceCollection::Edm(Arc::new(edm_collection(3.0))))
        .unwrap();
    assert_eq!(workspace.schema_version(), Some(3.0));

    let err = workspace
        .register_item_collection(SpaceCollection::Store(Arc::new(store_collection(2.0))))
        .unwrap_err();
    match err {
        MetadataError::SchemaVersionMismatch { expected, actual, .. } => {
            assert_eq!(expected, 3.0);
            assert_eq!(actual, 2.0);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert!(workspace.try_get_item_collection(DataSpace::SSpace).unwrap().is_none());

    workspace
        .register_item_collection(SpaceCollection::Store(Arc::new(store_collection(3.0))))
        .unwrap();
}

#[test]
fn test_loaders_run_on_first_access() {
    use std::sync::atomic::{AtomicUsize, Ordering};

    let calls = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&calls);
    let loaders = WorkspaceLoaders {
        conceptual: Some(Box::new(move || {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(edm_collection(2.0))
        })),
        ..Default::default()
    };
    let workspace = MetadataWorkspace::with_loaders(Arc::new(AssemblyCatalog::new()), loaders).unwrap();
    assert_eq!(calls.load(Ordering::SeqCst), 0);
    assert_eq!(workspace.schema_version(), None);

    assert!(workspace.edm_collection().unwrap().is_some());
    assert!(workspace.edm_collection().unwrap().is_some());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert_eq!(workspace.schema_version(), Some(2.0));
}

#[test]
fn test_lazily_loaded_mapping_must_match_schema_version() {
    let loaders = WorkspaceLoaders {
        conceptual: Some(Box::new(|| Ok(edm_collection(2.0)))),
        storage: Some(Box::new(|| Ok(store_collection(2.0)))),
        mapping: Some(Box::new(|edm, store| {
            let documents = [MappingDocument {
                version: 3.0,
                container_mappings: Vec::new(),
                location: None,
            }];
            StorageMappingItemCollection::new(Arc::clone(edm), Arc::clone(store), &documents)
        })),
    };
    let workspace = MetadataWorkspace::with_loaders(Arc::new(AssemblyCatalog::new()), loaders).unwrap();

    let err = workspace.mapping_collection().unwrap_err();
    match err {
        MetadataError::SchemaVersionMismatch { expected, actual, .. } => {
            assert_eq!(expected, 2.0);
            assert_eq!(actual, 3.0);
        }
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(workspace.schema_version(), Some(2.0));
    assert!(workspace.mapping_collection().is_err());
}

#[test]
fn test_from_paths_discovers_artifacts() {
    let ctx = TestContext::with_fixture("shop");
    let workspace = MetadataWorkspace::from_paths(
        &[ctx.project_dir.clone()],
        Arc::new(AssemblyCatalog::new()),
        true,
    )
    .unwrap();

    assert!(workspace.mapping_collection().unwrap().is_some());
    assert!(workspace.get_mapping_hash().unwrap().is_some());
    // No assembly was loaded, so object space holds primitives only
    assert!(workspace
        .get_items::<EntityType>(DataSpace::OSpace)
        .unwrap()
        .is_empty());
}
