//! Mapping integration tests
//!
//! Storage mappings between the shop containers, and the default object
//! mapping between conceptual and CLR types.

use rust_edm::items::MemberMappingKind;
use rust_edm::metadata::{DataSpace, EntityType, MetadataItem};
use rust_edm::MetadataError;

use crate::common::TestContext;

/// The `MetadataError` behind a failed load, if there is one
fn metadata_error(err: &anyhow::Error) -> Option<&MetadataError> {
    err.chain().find_map(|cause| cause.downcast_ref::<MetadataError>())
}

fn load_with_mapping(mapping: &str) -> anyhow::Result<rust_edm::MetadataWorkspace> {
    let ctx = TestContext::with_fixture("shop");
    ctx.write_file("Shop.msl.json", mapping);
    ctx.load()
}

// ============================================================================
// Storage Mapping Tests
// ============================================================================

#[test]
fn test_container_mapping_resolves_both_containers() {
    let ctx = TestContext::with_fixture("shop");
    let workspace = ctx.load_successfully();

    let mapping = workspace.mapping_collection().unwrap().unwrap();
    assert_eq!(mapping.data_space(), DataSpace::CSSpace);
    assert_eq!(mapping.mapping_version(), Some(3.0));
    assert_eq!(mapping.container_mappings().len(), 1);

    let container = mapping.get_container_mapping("ShopContainer", false).unwrap();
    assert_eq!(container.conceptual_container().name(), "ShopContainer");
    assert_eq!(container.storage_container().name(), "ShopStoreContainer");
    assert_eq!(container.set_mappings().len(), 3);

    let orders = container.find_set_mapping("Orders").unwrap();
    assert_eq!(orders.store_set, "Orders");
    assert!(!orders.is_association);
    let association = container.find_set_mapping("CustomerOrders").unwrap();
    assert!(association.is_association);
}

#[test]
fn test_container_mapping_found_by_storage_name() {
    let ctx = TestContext::with_fixture("shop");
    let workspace = ctx.load_successfully();
    let mapping = workspace.mapping_collection().unwrap().unwrap();

    let by_storage = mapping.try_get_container_mapping("shopstorecontainer", true).unwrap();
    assert_eq!(by_storage.identity(), "ShopContainer");
    assert!(mapping.try_get_container_mapping("shopstorecontainer", false).is_none());

    let err = mapping.get_container_mapping("Elsewhere", false).unwrap_err();
    assert!(matches!(err, MetadataError::MappingNotFound { .. }));
}

#[test]
fn test_mapping_hash_is_stable_and_sensitive() {
    let first = TestContext::with_fixture("shop").load_successfully();
    let second = TestContext::with_fixture("shop").load_successfully();

    let hash = first.get_mapping_hash().unwrap().unwrap();
    assert_eq!(hash.len(), 64);
    assert!(hash.chars().all(|c| c.is_ascii_hexdigit() && !c.is_ascii_uppercase()));
    assert_eq!(second.get_mapping_hash().unwrap().unwrap(), hash);

    // Same mappings listed in another order
    let reordered = load_with_mapping(
        r#"{
          "version": 3.0,
          "containerMappings": [{
            "conceptualContainer": "ShopContainer",
            "storageContainer": "ShopStoreContainer",
            "entitySetMappings": [
              { "name": "Orders", "storeEntitySet": "Orders" },
              { "name": "Customers", "storeEntitySet": "Customers" }
            ],
            "associationSetMappings": [{ "name": "CustomerOrders", "storeEntitySet": "Orders" }]
          }]
        }"#,
    )
    .unwrap();
    assert_eq!(reordered.get_mapping_hash().unwrap().unwrap(), hash);

    let changed = load_with_mapping(
        r#"{
          "version": 3.0,
          "containerMappings": [{
            "conceptualContainer": "ShopContainer",
            "storageContainer": "ShopStoreContainer",
            "entitySetMappings": [{ "name": "Customers", "storeEntitySet": "Customers" }]
          }]
        }"#,
    )
    .unwrap();
    assert_ne!(changed.get_mapping_hash().unwrap().unwrap(), hash);
}

#[test]
fn test_missing_store_set_is_rejected() {
    let err = load_with_mapping(
        r#"{
          "version": 3.0,
          "containerMappings": [{
            "conceptualContainer": "ShopContainer",
            "storageContainer": "ShopStoreContainer",
            "entitySetMappings": [{ "name": "Customers", "storeEntitySet": "Clients" }]
          }]
        }"#,
    )
    .unwrap_err();

    match metadata_error(&err) {
        Some(MetadataError::StorageMapping { message }) => assert!(message.contains("Clients")),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_unknown_conceptual_set_is_rejected() {
    let err = load_with_mapping(
        r#"{
          "version": 3.0,
          "containerMappings": [{
            "conceptualContainer": "ShopContainer",
            "storageContainer": "ShopStoreContainer",
            "associationSetMappings": [{ "name": "Customers", "storeEntitySet": "Customers" }]
          }]
        }"#,
    )
    .unwrap_err();
    assert!(matches!(metadata_error(&err), Some(MetadataError::StorageMapping { .. })));
}

#[test]
fn test_container_mapped_twice_is_rejected() {
    let err = load_with_mapping(
        r#"{
          "version": 3.0,
          "containerMappings": [
            { "conceptualContainer": "ShopContainer", "storageContainer": "ShopStoreContainer" },
            { "conceptualContainer": "ShopContainer", "storageContainer": "ShopStoreContainer" }
          ]
        }"#,
    )
    .unwrap_err();

    match metadata_error(&err) {
        Some(MetadataError::StorageMapping { message }) => assert!(message.contains("more than once")),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[test]
fn test_mapping_version_must_match_schemas() {
    let err = load_with_mapping(r#"{ "version": 2.0, "containerMappings": [] }"#).unwrap_err();
    assert!(
        matches!(metadata_error(&err), Some(MetadataError::SchemaVersionMismatch { .. })),
        "unexpected error: {:?}",
        err
    );
}

#[test]
fn test_unsupported_mapping_version_is_rejected() {
    let err = load_with_mapping(r#"{ "version": 4.0 }"#).unwrap_err();
    assert!(matches!(
        metadata_error(&err),
        Some(MetadataError::UnsupportedSchemaVersion { .. })
    ));
}

// ============================================================================
// Object Mapping Tests
// ============================================================================

#[test]
fn test_entity_mapping_pairs_every_member() {
    let ctx = TestContext::with_fixture("shop");
    let workspace = ctx.load_successfully();
    let oc = workspace.oc_mapping_collection().unwrap().unwrap();
    assert_eq!(oc.data_space(), DataSpace::OCSpace);

    let customer = oc.get_map("Shop.Customer", DataSpace::CSpace, false).unwrap();
    assert_eq!(customer.edm_type().identity(), "Shop.Customer");
    assert_eq!(customer.clr_type().identity(), "Shop.Clr.Customer");

    let kinds: Vec<_> = customer
        .member_mappings()
        .iter()
        .map(|m| (m.edm_member.as_str(), m.kind))
        .collect();
    assert_eq!(
        kinds,
        vec![
            ("Id", MemberMappingKind::Scalar),
            ("Name", MemberMappingKind::Scalar),
            ("Address", MemberMappingKind::Complex),
            ("Orders", MemberMappingKind::Navigation),
        ]
    );
}

#[test]
fn test_reachable_types_are_mapped_together() {
    let ctx = TestContext::with_fixture("shop");
    let workspace = ctx.load_successfully();
    let oc = workspace.oc_mapping_collection().unwrap().unwrap();

    oc.get_map("Shop.Customer", DataSpace::CSpace, false).unwrap();

    // Reached through Orders, then through Order.Status
    let status = oc.get_map("Shop.Clr.OrderStatus", DataSpace::OSpace, false).unwrap();
    assert_eq!(status.edm_type().identity(), "Shop.OrderStatus");
    assert!(status.member_mappings().is_empty());

    let association = oc.get_map("Shop.CustomerOrders", DataSpace::CSpace, false).unwrap();
    let end = association.member_mapping("Order").unwrap();
    assert_eq!(end.kind, MemberMappingKind::AssociationEnd);
}

#[test]
fn test_primitive_types_map_by_kind() {
    let ctx = TestContext::with_fixture("shop");
    let workspace = ctx.load_successfully();
    let oc = workspace.oc_mapping_collection().unwrap().unwrap();

    let int32 = oc.get_map("Edm.Int32", DataSpace::CSpace, false).unwrap();
    assert_eq!(int32.clr_type().identity(), "System.Int32");
}

#[test]
fn test_unknown_types_have_no_map() {
    let ctx = TestContext::with_fixture("shop");
    let workspace = ctx.load_successfully();
    let oc = workspace.oc_mapping_collection().unwrap().unwrap();

    assert!(oc.try_get_map("Shop.Invoice", DataSpace::CSpace, false).unwrap().is_none());
    let err = oc.get_map("Shop.Invoice", DataSpace::CSpace, false).unwrap_err();
    assert!(matches!(err, MetadataError::MappingNotFound { .. }));

    let err = oc.try_get_map("Shop.Customer", DataSpace::SSpace, false).unwrap_err();
    assert!(matches!(err, MetadataError::InvalidDataSpace { .. }));
}

#[test]
fn test_member_count_mismatch_is_rejected() {
    let ctx = TestContext::with_fixture("shop");
    let assembly = ctx.read_file("Shop.Model.json").replace(
        r#"{ "name": "Name", "type": "System.String" },"#,
        "",
    );
    ctx.write_file("Shop.Model.json", &assembly);
    let workspace = ctx.load_successfully();

    let oc = workspace.oc_mapping_collection().unwrap().unwrap();
    let err = oc.get_map("Shop.Customer", DataSpace::CSpace, false).unwrap_err();
    assert!(matches!(err, MetadataError::ObjectMapping { .. }), "unexpected error: {:?}", err);
}

#[test]
fn test_member_type_mismatch_is_rejected() {
    let ctx = TestContext::with_fixture("shop");
    let assembly = ctx.read_file("Shop.Model.json").replace(
        r#"{ "name": "CustomerId", "type": "System.Int32", "nullable": false }"#,
        r#"{ "name": "CustomerId", "type": "System.String" }"#,
    );
    ctx.write_file("Shop.Model.json", &assembly);
    let workspace = ctx.load_successfully();

    let order = workspace.get_item::<EntityType>("Shop.Order", DataSpace::CSpace).unwrap();
    let oc = workspace.oc_mapping_collection().unwrap().unwrap();
    let err = oc.get_map(order.identity(), DataSpace::CSpace, false).unwrap_err();
    match err {
        MetadataError::ObjectMapping { message } => assert!(message.contains("CustomerId")),
        other => panic!("unexpected error: {:?}", other),
    }
}
