//! Base metadata item: identity, read-only lifecycle and the extended property bag.

use std::fmt;

use once_cell::sync::OnceCell;

use super::collection::MetadataCollection;
use crate::error::MetadataError;

/// The metadata space an item belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum DataSpace {
    /// Object space (CLR-backed runtime types)
    OSpace,
    /// Conceptual space
    CSpace,
    /// Storage space
    SSpace,
    /// Object/conceptual mapping space
    OCSpace,
    /// Conceptual/storage mapping space
    CSSpace,
}

impl DataSpace {
    pub const ALL: [DataSpace; 5] = [
        DataSpace::OSpace,
        DataSpace::CSpace,
        DataSpace::SSpace,
        DataSpace::OCSpace,
        DataSpace::CSSpace,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            DataSpace::OSpace => "OSpace",
            DataSpace::CSpace => "CSpace",
            DataSpace::SSpace => "SSpace",
            DataSpace::OCSpace => "OCSpace",
            DataSpace::CSSpace => "CSSpace",
        }
    }
}

impl fmt::Display for DataSpace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Closed set of concrete metadata node kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BuiltInTypeKind {
    AssociationEndMember,
    AssociationSet,
    AssociationSetEnd,
    AssociationType,
    CollectionType,
    ComplexType,
    Documentation,
    EdmFunction,
    EdmProperty,
    EntityContainer,
    EntitySet,
    EntityType,
    EnumMember,
    EnumType,
    Facet,
    FunctionParameter,
    MetadataProperty,
    NavigationProperty,
    PrimitiveType,
    RefType,
    ReferentialConstraint,
    RowType,
    TypeUsage,
    ObjectTypeMapping,
    EntityContainerMapping,
}

impl BuiltInTypeKind {
    pub fn name(&self) -> &'static str {
        match self {
            BuiltInTypeKind::AssociationEndMember => "AssociationEndMember",
            BuiltInTypeKind::AssociationSet => "AssociationSet",
            BuiltInTypeKind::AssociationSetEnd => "AssociationSetEnd",
            BuiltInTypeKind::AssociationType => "AssociationType",
            BuiltInTypeKind::CollectionType => "CollectionType",
            BuiltInTypeKind::ComplexType => "ComplexType",
            BuiltInTypeKind::Documentation => "Documentation",
            BuiltInTypeKind::EdmFunction => "EdmFunction",
            BuiltInTypeKind::EdmProperty => "EdmProperty",
            BuiltInTypeKind::EntityContainer => "EntityContainer",
            BuiltInTypeKind::EntitySet => "EntitySet",
            BuiltInTypeKind::EntityType => "EntityType",
            BuiltInTypeKind::EnumMember => "EnumMember",
            BuiltInTypeKind::EnumType => "EnumType",
            BuiltInTypeKind::Facet => "Facet",
            BuiltInTypeKind::FunctionParameter => "FunctionParameter",
            BuiltInTypeKind::MetadataProperty => "MetadataProperty",
            BuiltInTypeKind::NavigationProperty => "NavigationProperty",
            BuiltInTypeKind::PrimitiveType => "PrimitiveType",
            BuiltInTypeKind::RefType => "RefType",
            BuiltInTypeKind::ReferentialConstraint => "ReferentialConstraint",
            BuiltInTypeKind::RowType => "RowType",
            BuiltInTypeKind::TypeUsage => "TypeUsage",
            BuiltInTypeKind::ObjectTypeMapping => "ObjectTypeMapping",
            BuiltInTypeKind::EntityContainerMapping => "EntityContainerMapping",
        }
    }
}

/// Whether a metadata property was produced by the system or carried over from an annotation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PropertyKind {
    System,
    Extended,
}

/// Value stored in a metadata property
#[derive(Debug, Clone, PartialEq)]
pub enum PropertyValue {
    Text(String),
    Bool(bool),
    Integer(i64),
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Text(text) => f.write_str(text),
            PropertyValue::Bool(true) => f.write_str("true"),
            PropertyValue::Bool(false) => f.write_str("false"),
            PropertyValue::Integer(value) => write!(f, "{}", value),
        }
    }
}

/// A named value attached to a metadata item.
///
/// Extended properties come from schema annotations and are named
/// `namespaceUri:attributeName`.
#[derive(Debug, Clone)]
pub struct MetadataProperty {
    name: String,
    value: PropertyValue,
    kind: PropertyKind,
    read_only: bool,
}

impl MetadataProperty {
    pub fn new(name: impl Into<String>, value: PropertyValue, kind: PropertyKind) -> Self {
        Self {
            name: name.into(),
            value,
            kind,
            read_only: false,
        }
    }

    pub fn extended(name: impl Into<String>, value: impl Into<String>) -> Self {
        Self::new(name, PropertyValue::Text(value.into()), PropertyKind::Extended)
    }

    pub fn system(name: impl Into<String>, value: PropertyValue) -> Self {
        Self::new(name, value, PropertyKind::System)
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> &PropertyValue {
        &self.value
    }

    pub fn kind(&self) -> PropertyKind {
        self.kind
    }

    pub fn set_value(&mut self, value: PropertyValue) -> Result<(), MetadataError> {
        if self.read_only {
            return Err(MetadataError::OperationOnReadOnlyItem {
                operation: "MetadataProperty::set_value",
                identity: self.name.clone(),
            });
        }
        self.value = value;
        Ok(())
    }
}

impl MetadataItem for MetadataProperty {
    fn identity(&self) -> &str {
        &self.name
    }

    fn built_in_type_kind(&self) -> BuiltInTypeKind {
        BuiltInTypeKind::MetadataProperty
    }

    fn is_read_only(&self) -> bool {
        self.read_only
    }

    fn set_read_only(&mut self) {
        self.read_only = true;
    }
}

/// Summary and long description attached to an item
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Documentation {
    pub summary: String,
    pub long_description: String,
}

impl Documentation {
    pub fn is_empty(&self) -> bool {
        self.summary.is_empty() && self.long_description.is_empty()
    }
}

/// Behaviour shared by every node in the metadata graph.
pub trait MetadataItem {
    /// Identity used as the key in metadata collections.
    fn identity(&self) -> &str;

    fn built_in_type_kind(&self) -> BuiltInTypeKind;

    fn is_read_only(&self) -> bool;

    /// Freeze the item. One-way; owned sub-items are frozen too.
    fn set_read_only(&mut self);
}

/// State common to items that carry a cached identity, a read-only flag and
/// a property bag.
#[derive(Debug, Clone, Default)]
pub struct ItemState {
    read_only: bool,
    identity: OnceCell<String>,
    properties: Option<MetadataCollection<MetadataProperty>>,
    documentation: Option<Documentation>,
}

impl ItemState {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn freeze(&mut self) {
        if let Some(properties) = self.properties.as_mut() {
            properties.set_read_only();
        }
        self.read_only = true;
    }

    /// Reopens a frozen item for editing.
    ///
    /// Only design-time tooling that edits a model in place should call this;
    /// frozen graphs are otherwise shared across threads without locking.
    #[doc(hidden)]
    pub fn reset_read_only(&mut self) {
        self.read_only = false;
        if let Some(properties) = self.properties.as_mut() {
            properties.reset_read_only();
        }
    }

    /// Fails with `OperationOnReadOnlyItem` once the item is frozen.
    pub fn ensure_mutable(&self, operation: &'static str, identity: &str) -> Result<(), MetadataError> {
        if self.read_only {
            return Err(MetadataError::OperationOnReadOnlyItem {
                operation,
                identity: identity.to_string(),
            });
        }
        Ok(())
    }

    /// Cached identity, computed on first use.
    pub fn identity_or_init(&self, compute: impl FnOnce() -> String) -> &str {
        self.identity.get_or_init(compute)
    }

    /// Drop the cached identity after a rename on a mutable item.
    pub fn invalidate_identity(&mut self) {
        self.identity = OnceCell::new();
    }

    pub fn metadata_properties(&self) -> &[MetadataProperty] {
        match &self.properties {
            Some(properties) => properties.as_slice(),
            None => &[],
        }
    }

    pub fn extended_properties(&self) -> impl Iterator<Item = &MetadataProperty> + '_ {
        self.metadata_properties()
            .iter()
            .filter(|p| p.kind() == PropertyKind::Extended)
    }

    pub fn add_metadata_property(
        &mut self,
        property: MetadataProperty,
        owner: &str,
    ) -> Result<(), MetadataError> {
        self.ensure_mutable("add_metadata_property", owner)?;
        self.properties
            .get_or_insert_with(MetadataCollection::new)
            .add(property)
    }

    pub fn documentation(&self) -> Option<&Documentation> {
        self.documentation.as_ref()
    }

    pub fn set_documentation(
        &mut self,
        documentation: Documentation,
        owner: &str,
    ) -> Result<(), MetadataError> {
        self.ensure_mutable("set_documentation", owner)?;
        self.documentation = if documentation.is_empty() {
            None
        } else {
            Some(documentation)
        };
        Ok(())
    }
}

/// Accessors for items built on [`ItemState`].
pub trait HasItemState: MetadataItem {
    fn item_state(&self) -> &ItemState;
    fn item_state_mut(&mut self) -> &mut ItemState;

    fn metadata_properties(&self) -> &[MetadataProperty] {
        self.item_state().metadata_properties()
    }

    fn add_metadata_property(&mut self, property: MetadataProperty) -> Result<(), MetadataError> {
        let owner = self.identity().to_string();
        self.item_state_mut().add_metadata_property(property, &owner)
    }

    fn documentation(&self) -> Option<&Documentation> {
        self.item_state().documentation()
    }

    fn set_documentation(&mut self, documentation: Documentation) -> Result<(), MetadataError> {
        let owner = self.identity().to_string();
        self.item_state_mut().set_documentation(documentation, &owner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_is_cached() {
        let state = ItemState::new();
        let mut calls = 0;
        let first = state
            .identity_or_init(|| {
                calls += 1;
                "NS.Customer".to_string()
            })
            .to_string();
        let second = state.identity_or_init(|| "other".to_string());
        assert_eq!(first, "NS.Customer");
        assert_eq!(second, "NS.Customer");
        assert_eq!(calls, 1);
    }

    #[test]
    fn test_frozen_state_rejects_properties() {
        let mut state = ItemState::new();
        state
            .add_metadata_property(MetadataProperty::extended("urn:a:Tag", "x"), "NS.T")
            .unwrap();
        state.freeze();
        let err = state
            .add_metadata_property(MetadataProperty::extended("urn:a:Other", "y"), "NS.T")
            .unwrap_err();
        assert!(matches!(err, MetadataError::OperationOnReadOnlyItem { .. }));
        assert!(state.is_read_only());
        assert_eq!(state.metadata_properties().len(), 1);
    }

    #[test]
    fn test_reset_read_only_reopens_properties() {
        let mut state = ItemState::new();
        state
            .add_metadata_property(MetadataProperty::extended("urn:a:Tag", "x"), "NS.T")
            .unwrap();
        state.freeze();
        state.reset_read_only();
        state
            .add_metadata_property(MetadataProperty::extended("urn:a:Other", "y"), "NS.T")
            .unwrap();
        assert_eq!(state.metadata_properties().len(), 2);
    }

    #[test]
    fn test_extended_properties_keep_insertion_order() {
        let mut state = ItemState::new();
        state
            .add_metadata_property(MetadataProperty::extended("urn:z:Last", "1"), "NS.T")
            .unwrap();
        state
            .add_metadata_property(
                MetadataProperty::system("Nullable", PropertyValue::Bool(false)),
                "NS.T",
            )
            .unwrap();
        state
            .add_metadata_property(MetadataProperty::extended("urn:a:First", "2"), "NS.T")
            .unwrap();
        let names: Vec<&str> = state.extended_properties().map(|p| p.name()).collect();
        assert_eq!(names, vec!["urn:z:Last", "urn:a:First"]);
    }
}
