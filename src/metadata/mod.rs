//! In-memory metadata graph: items, collections, facets and the EdmType family.

pub mod collection;
pub mod container;
pub mod facet;
pub mod function;
pub mod global;
pub mod item;
pub mod structural;
pub mod type_usage;
pub mod types;

pub use collection::{MetadataCollection, USE_DICTIONARY_CROSSOVER};
pub use container::{AssociationSet, AssociationSetEnd, EntityContainer, EntitySet, EntitySetBase};
pub use facet::{Facet, FacetDescription, FacetType, FacetValue, FacetValues};
pub use function::{
    build_identity, EdmFunction, FunctionAttributes, FunctionParameter, FunctionPayload,
    ParameterMode,
};
pub use global::{GlobalItem, GlobalItemType};
pub use item::{
    BuiltInTypeKind, DataSpace, Documentation, HasItemState, ItemState, MetadataItem,
    MetadataProperty, PropertyKind, PropertyValue,
};
pub use structural::{
    AssociationEndMember, AssociationType, ComplexType, EdmMember, EdmProperty, EntityType,
    NavigationProperty, OperationAction, ReferentialConstraint, RelationshipMultiplicity,
};
pub use type_usage::TypeUsage;
pub use types::{
    ancestors, CollectionType, EdmType, EdmTypeRef, EnumMember, EnumType, NamedTypeKind,
    NamedTypeRef, PrimitiveType, PrimitiveTypeKind, RefType, RowType, TypeCore, TypeLookup,
    TypeName,
};
