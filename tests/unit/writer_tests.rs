//! Unit tests for schema XML output
//!
//! These tests load the shop fixture documents and check the XML the
//! writer produces for them.

use std::path::PathBuf;
use std::sync::Arc;

use rust_edm::items::{EdmItemCollection, StoreItemCollection};
use rust_edm::provider::EdmProviderManifest;
use rust_edm::som::loader::parse_schema_document;
use rust_edm::writer::{write_schema, CsdlXmlWriter};
use rust_edm::MetadataError;

fn fixture(file: &str) -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR"))
        .join("tests")
        .join("fixtures")
        .join("shop")
        .join(file)
}

fn conceptual() -> EdmItemCollection {
    let document = parse_schema_document(&fixture("Shop.csdl.json")).unwrap();
    EdmItemCollection::from_documents(vec![document], Arc::new(EdmProviderManifest::new().unwrap()), true)
        .unwrap()
}

fn storage() -> StoreItemCollection {
    let document = parse_schema_document(&fixture("ShopStore.ssdl.json")).unwrap();
    StoreItemCollection::from_documents(vec![document], Arc::new(EdmProviderManifest::new().unwrap()), true)
        .unwrap()
}

fn render_conceptual(version: f64) -> Result<String, MetadataError> {
    let edm = conceptual();
    let mut writer = CsdlXmlWriter::new(Vec::new());
    write_schema(edm.items(), "Shop", version, &mut writer)?;
    Ok(String::from_utf8(writer.into_inner()).unwrap())
}

/// Names of the direct element children of `node`, as `Tag:Name`
fn child_names(node: roxmltree::Node) -> Vec<String> {
    node.children()
        .filter(|n| n.is_element())
        .map(|n| format!("{}:{}", n.tag_name().name(), n.attribute("Name").unwrap_or("")))
        .collect()
}

// ============================================================================
// Conceptual Schema Tests
// ============================================================================

#[test]
fn test_conceptual_schema_element_order() {
    let xml = render_conceptual(3.0).unwrap();
    let doc = roxmltree::Document::parse(&xml).unwrap();
    let schema = doc.root_element();

    assert_eq!(schema.tag_name().name(), "Schema");
    assert_eq!(schema.tag_name().namespace(), Some("http://schemas.microsoft.com/ado/2009/11/edm"));
    assert_eq!(schema.attribute("Namespace"), Some("Shop"));
    assert_eq!(schema.attribute("Provider"), None);
    assert_eq!(
        child_names(schema),
        vec![
            "EnumType:OrderStatus",
            "ComplexType:Address",
            "EntityType:Customer",
            "EntityType:Order",
            "Association:CustomerOrders",
            "EntityContainer:ShopContainer",
        ]
    );
}

#[test]
fn test_entity_type_key_properties_and_navigation() {
    let xml = render_conceptual(3.0).unwrap();
    let doc = roxmltree::Document::parse(&xml).unwrap();
    let customer = doc
        .descendants()
        .find(|n| n.has_tag_name("EntityType") && n.attribute("Name") == Some("Customer"))
        .unwrap();

    let key_refs: Vec<_> = customer
        .descendants()
        .filter(|n| n.has_tag_name("PropertyRef"))
        .filter_map(|n| n.attribute("Name"))
        .collect();
    assert_eq!(key_refs, vec!["Id"]);

    let property = |name: &str| {
        customer
            .children()
            .find(|n| n.has_tag_name("Property") && n.attribute("Name") == Some(name))
            .unwrap()
    };
    assert_eq!(property("Id").attribute("Type"), Some("Int32"));
    assert_eq!(property("Id").attribute("Nullable"), Some("false"));
    assert_eq!(property("Name").attribute("MaxLength"), Some("100"));
    assert_eq!(property("Name").attribute("Nullable"), None);
    assert_eq!(property("Address").attribute("Type"), Some("Shop.Address"));

    let navigation = customer
        .children()
        .find(|n| n.has_tag_name("NavigationProperty"))
        .unwrap();
    assert_eq!(navigation.attribute("Relationship"), Some("Shop.CustomerOrders"));
    assert_eq!(navigation.attribute("FromRole"), Some("Customer"));
    assert_eq!(navigation.attribute("ToRole"), Some("Order"));
}

#[test]
fn test_association_and_container() {
    let xml = render_conceptual(3.0).unwrap();
    let doc = roxmltree::Document::parse(&xml).unwrap();

    let association = doc.descendants().find(|n| n.has_tag_name("Association")).unwrap();
    let ends: Vec<_> = association
        .children()
        .filter(|n| n.has_tag_name("End"))
        .map(|n| (n.attribute("Role").unwrap(), n.attribute("Multiplicity").unwrap()))
        .collect();
    assert_eq!(ends, vec![("Customer", "1"), ("Order", "*")]);

    let principal = association.descendants().find(|n| n.has_tag_name("Principal")).unwrap();
    assert_eq!(principal.attribute("Role"), Some("Customer"));
    let dependent = association.descendants().find(|n| n.has_tag_name("Dependent")).unwrap();
    let dependent_refs: Vec<_> = dependent.children().filter_map(|n| n.attribute("Name")).collect();
    assert_eq!(dependent_refs, vec!["CustomerId"]);

    let container = doc.descendants().find(|n| n.has_tag_name("EntityContainer")).unwrap();
    assert_eq!(
        child_names(container),
        vec!["EntitySet:Customers", "EntitySet:Orders", "AssociationSet:CustomerOrders"]
    );
    let set = container.children().find(|n| n.has_tag_name("EntitySet")).unwrap();
    assert_eq!(set.attribute("EntityType"), Some("Shop.Customer"));
    assert_eq!(set.attribute("Schema"), None);
}

#[test]
fn test_enum_members_written_in_order() {
    let xml = render_conceptual(3.0).unwrap();
    let doc = roxmltree::Document::parse(&xml).unwrap();
    let status = doc.descendants().find(|n| n.has_tag_name("EnumType")).unwrap();

    assert_eq!(status.attribute("UnderlyingType"), Some("Int32"));
    assert_eq!(status.attribute("IsFlags"), Some("false"));
    let members: Vec<_> = status
        .children()
        .filter(|n| n.has_tag_name("Member"))
        .map(|n| (n.attribute("Name").unwrap(), n.attribute("Value").unwrap()))
        .collect();
    assert_eq!(members, vec![("Pending", "0"), ("Shipped", "1")]);
}

// ============================================================================
// Versions
// ============================================================================

#[test]
fn test_older_version_uses_its_namespace() {
    let xml = render_conceptual(2.0).unwrap();
    assert!(xml.contains(r#"xmlns="http://schemas.microsoft.com/ado/2008/09/edm""#));
}

#[test]
fn test_unknown_version_is_rejected() {
    let err = render_conceptual(4.0).unwrap_err();
    assert!(matches!(err, MetadataError::UnsupportedSchemaVersion { .. }));
}

#[test]
fn test_unknown_namespace_writes_empty_schema() {
    let edm = conceptual();
    let mut writer = CsdlXmlWriter::new(Vec::new());
    write_schema(edm.items(), "Elsewhere", 3.0, &mut writer).unwrap();
    let xml = String::from_utf8(writer.into_inner()).unwrap();

    let doc = roxmltree::Document::parse(&xml).unwrap();
    assert!(child_names(doc.root_element()).is_empty());
}

// ============================================================================
// Storage Schema Tests
// ============================================================================

#[test]
fn test_storage_schema_carries_provider_and_tables() {
    let store = storage();
    let mut writer = CsdlXmlWriter::new(Vec::new())
        .with_provider("System.Data.SqlClient", store.manifest().manifest_token());
    write_schema(store.items(), "ShopStore", 3.0, &mut writer).unwrap();
    let xml = String::from_utf8(writer.into_inner()).unwrap();

    let doc = roxmltree::Document::parse(&xml).unwrap();
    let schema = doc.root_element();
    assert_eq!(schema.tag_name().namespace(), Some("http://schemas.microsoft.com/ado/2009/11/edm/ssdl"));
    assert_eq!(schema.attribute("Provider"), Some("System.Data.SqlClient"));
    assert_eq!(schema.attribute("ProviderManifestToken"), Some("2008"));

    let orders = doc
        .descendants()
        .find(|n| n.has_tag_name("EntitySet") && n.attribute("Name") == Some("Orders"))
        .unwrap();
    assert_eq!(orders.attribute("Schema"), Some("dbo"));
    assert_eq!(orders.attribute("Table"), Some("Orders"));

    let id = doc
        .descendants()
        .find(|n| n.has_tag_name("Property") && n.attribute("Name") == Some("Id"))
        .unwrap();
    assert_eq!(id.attribute("Type"), Some("int"));
}
