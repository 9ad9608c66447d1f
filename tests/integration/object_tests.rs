//! Object space integration tests
//!
//! CLR assembly descriptions loaded into object space and paired with the
//! conceptual model.

use std::sync::Arc;

use rust_edm::items::{AssemblyCatalog, ClrAssembly, ClrTypeHandle};
use rust_edm::metadata::{
    DataSpace, EdmType, EdmTypeRef, EntityType, EnumType, GlobalItem, MetadataItem, NavigationProperty,
};
use rust_edm::{MetadataError, MetadataWorkspace};

use crate::common::{fixture_file, TestContext};

/// Workspace over the fixture schemas with assemblies registered but not
/// loaded. `Shop.App` references the model and carries the schema marker.
fn unloaded_workspace(ctx: &TestContext) -> MetadataWorkspace {
    let mut catalog = AssemblyCatalog::new();
    catalog.add(ClrAssembly::from_file(&fixture_file("shop", "Shop.Model.json")).unwrap());
    let mut app = ClrAssembly::new("Shop.App");
    app.referenced.push("Shop.Model".to_string());
    catalog.add(app);
    catalog.add(ClrAssembly::new("Unrelated"));

    MetadataWorkspace::from_paths(&[ctx.project_dir.clone()], Arc::new(catalog), true).unwrap()
}

fn c_type(workspace: &MetadataWorkspace, identity: &str) -> GlobalItem {
    workspace
        .try_get_type(
            identity.rsplit('.').next().unwrap(),
            identity.rsplit_once('.').unwrap().0,
            DataSpace::CSpace,
            false,
        )
        .unwrap()
        .unwrap()
}

// ============================================================================
// Loading Tests
// ============================================================================

#[test]
fn test_project_assemblies_load_into_object_space() {
    let ctx = TestContext::with_fixture("shop");
    let workspace = ctx.load_successfully();

    let order = workspace.get_item::<EntityType>("Shop.Clr.Order", DataSpace::OSpace).unwrap();
    assert_eq!(order.data_space(), DataSpace::OSpace);
    assert_eq!(order.properties().count(), 3);

    let objects = workspace.object_items();
    assert_eq!(
        objects.try_get_mapping_c_space_type_identity("Shop.Clr.Order").as_deref(),
        Some("Shop.Order")
    );
    assert_eq!(
        objects.try_get_clr_type("Shop.Clr.Order"),
        Some(ClrTypeHandle::new("Shop.Model", "Shop.Clr.Order"))
    );
    assert!(objects.is_known_assembly("Shop.Model"));
}

#[test]
fn test_navigation_targets_object_types() {
    let ctx = TestContext::with_fixture("shop");
    let workspace = ctx.load_successfully();

    let customer = workspace
        .get_item::<EntityType>("Shop.Clr.Customer", DataSpace::OSpace)
        .unwrap();
    let orders: &NavigationProperty = customer.navigation_properties().next().unwrap();
    assert_eq!(orders.relationship_type().data_space(), DataSpace::OSpace);
    match orders.type_usage().edm_type() {
        EdmTypeRef::Collection(collection) => {
            assert_eq!(collection.element_type().edm_type().identity(), "Shop.Clr.Order");
        }
        other => panic!("expected a collection, found {:?}", other),
    }

    let status = workspace
        .get_item::<EnumType>("Shop.Clr.OrderStatus", DataSpace::OSpace)
        .unwrap();
    assert_eq!(status.members().len(), 2);
}

#[test]
fn test_loading_an_assembly_twice_adds_nothing() {
    let ctx = TestContext::with_fixture("shop");
    let workspace = ctx.load_successfully();
    let before = workspace.object_items().len();

    assert!(workspace.load_from_assembly("Shop.Model").unwrap());
    assert_eq!(workspace.object_items().len(), before);
}

#[test]
fn test_unresolvable_assembly_is_an_error() {
    let ctx = TestContext::with_fixture("shop");
    let workspace = ctx.load_successfully();

    let err = workspace.load_from_assembly("Missing.Assembly").unwrap_err();
    assert!(matches!(err, MetadataError::ObjectMapping { .. }));
}

#[test]
fn test_assembly_without_types_reports_false() {
    let ctx = TestContext::with_fixture("shop");
    let workspace = unloaded_workspace(&ctx);

    assert!(!workspace.load_from_assembly("Unrelated").unwrap());
    assert!(workspace.object_items().is_known_assembly("Unrelated"));
}

#[test]
fn test_invalidated_cookie_rescans_assemblies() {
    let ctx = TestContext::with_fixture("shop");
    let workspace = ctx.load_successfully();
    let objects = workspace.object_items();

    let cookie = objects.loader_cookie();
    assert_eq!(objects.invalidate_loader_cookie(), cookie + 1);
    let before = objects.len();
    assert!(workspace.load_from_assembly("Shop.Model").unwrap());
    assert_eq!(objects.len(), before);
}

// ============================================================================
// Implicit Loading Tests
// ============================================================================

#[test]
fn test_implicit_load_from_declaring_assembly() {
    let ctx = TestContext::with_fixture("shop");
    let workspace = unloaded_workspace(&ctx);
    assert!(!workspace.object_items().contains("Shop.Clr.Order"));

    let handle = ClrTypeHandle::new("Shop.Model", "Shop.Clr.Order");
    assert!(workspace.implicit_load_assembly_for_type(&handle, None).unwrap());
    assert!(workspace.object_items().contains("Shop.Clr.Order"));
}

#[test]
fn test_implicit_load_through_calling_assembly() {
    let ctx = TestContext::with_fixture("shop");
    let workspace = unloaded_workspace(&ctx);

    // Declaring assembly unknown: only the caller's references can supply it
    let handle = ClrTypeHandle::new("Elsewhere", "Shop.Clr.Order");
    assert!(workspace
        .implicit_load_assembly_for_type(&handle, Some("Shop.App"))
        .unwrap());
    assert!(workspace.object_items().contains("Shop.Clr.Customer"));
}

#[test]
fn test_implicit_load_for_conceptual_entity() {
    let ctx = TestContext::with_fixture("shop");
    let workspace = unloaded_workspace(&ctx);

    assert!(workspace.implicit_load_from_entity_type("Shop.Customer", "Shop.App").unwrap());
    let err = workspace
        .implicit_load_from_entity_type("Shop.Invoice", "Shop.App")
        .unwrap_err();
    assert!(matches!(err, MetadataError::ItemNotFound { .. }));
}

#[test]
fn test_implicit_load_without_schema_marker_stays_shallow() {
    let ctx = TestContext::with_fixture("shop");
    let model = ctx
        .read_file("Shop.Model.json")
        .replace(r#""hasSchemaAttribute": true,"#, "");
    ctx.write_file("Shop.Model.json", &model);

    let mut catalog = AssemblyCatalog::new();
    catalog.add(ClrAssembly::from_file(&ctx.project_dir.join("Shop.Model.json")).unwrap());
    let mut app = ClrAssembly::new("Shop.App");
    app.referenced.push("Shop.Model".to_string());
    catalog.add(app);
    let workspace = MetadataWorkspace::from_paths(&[ctx.project_dir.clone()], Arc::new(catalog), true).unwrap();

    assert!(!workspace.implicit_load_from_entity_type("Shop.Customer", "Shop.App").unwrap());
    assert!(!workspace.object_items().contains("Shop.Clr.Customer"));
}

// ============================================================================
// Cross-Space Tests
// ============================================================================

#[test]
fn test_object_and_conceptual_types_pair_both_ways() {
    let ctx = TestContext::with_fixture("shop");
    let workspace = ctx.load_successfully();

    let c_customer = c_type(&workspace, "Shop.Customer");
    let o_customer = workspace.get_object_space_type(&c_customer).unwrap();
    assert_eq!(o_customer.identity(), "Shop.Clr.Customer");

    let back = workspace.get_edm_space_type(&o_customer).unwrap();
    assert_eq!(back.identity(), "Shop.Customer");
}

#[test]
fn test_cross_space_lookups_check_the_space() {
    let ctx = TestContext::with_fixture("shop");
    let workspace = ctx.load_successfully();

    let c_customer = c_type(&workspace, "Shop.Customer");
    let err = workspace.try_get_edm_space_type(&c_customer).unwrap_err();
    assert!(matches!(err, MetadataError::InvalidDataSpace { .. }));

    let o_customer = workspace.get_object_space_type(&c_customer).unwrap();
    let err = workspace.try_get_object_space_type(&o_customer).unwrap_err();
    assert!(matches!(err, MetadataError::InvalidDataSpace { .. }));
}

#[test]
fn test_object_type_missing_without_assembly() {
    let ctx = TestContext::with_fixture("shop");
    let workspace = unloaded_workspace(&ctx);

    let c_order = c_type(&workspace, "Shop.Order");
    assert!(workspace.try_get_object_space_type(&c_order).unwrap().is_none());
    let err = workspace.get_object_space_type(&c_order).unwrap_err();
    assert!(matches!(err, MetadataError::MappingNotFound { .. }));
}

#[test]
fn test_o_space_type_usage_keeps_facets() {
    let ctx = TestContext::with_fixture("shop");
    let workspace = ctx.load_successfully();

    let customer = workspace.get_item::<EntityType>("Shop.Customer", DataSpace::CSpace).unwrap();
    let address = customer.properties().find(|p| p.name() == "Address").unwrap();

    let usage = workspace.get_o_space_type_usage(address.type_usage()).unwrap();
    assert_eq!(usage.edm_type().identity(), "Shop.Clr.Address");
    assert!(!usage.is_nullable());

    let name = customer.properties().find(|p| p.name() == "Name").unwrap();
    let usage = workspace.get_o_space_type_usage(name.type_usage()).unwrap();
    assert_eq!(usage.edm_type().identity(), "System.String");
    assert_eq!(usage.max_length(), name.type_usage().max_length());
}
