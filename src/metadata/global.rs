//! GlobalItem: the closed set of items addressable by identity within one space.

use std::sync::Arc;

use super::container::EntityContainer;
use super::function::EdmFunction;
use super::item::{BuiltInTypeKind, DataSpace, MetadataItem};
use super::structural::{AssociationType, ComplexType, EntityType};
use super::types::{EdmType, EnumType, NamedTypeRef, PrimitiveType};

/// A frozen, shareable item registered in an item collection
#[derive(Debug, Clone)]
pub enum GlobalItem {
    PrimitiveType(Arc<PrimitiveType>),
    EnumType(Arc<EnumType>),
    EntityType(Arc<EntityType>),
    ComplexType(Arc<ComplexType>),
    AssociationType(Arc<AssociationType>),
    Function(Arc<EdmFunction>),
    EntityContainer(Arc<EntityContainer>),
}

impl GlobalItem {
    pub fn data_space(&self) -> DataSpace {
        match self {
            GlobalItem::PrimitiveType(t) => t.data_space(),
            GlobalItem::EnumType(t) => t.data_space(),
            GlobalItem::EntityType(t) => t.data_space(),
            GlobalItem::ComplexType(t) => t.data_space(),
            GlobalItem::AssociationType(t) => t.data_space(),
            GlobalItem::Function(f) => f.data_space(),
            GlobalItem::EntityContainer(c) => c.data_space(),
        }
    }

    /// Unqualified name.
    pub fn name(&self) -> &str {
        match self {
            GlobalItem::PrimitiveType(t) => t.name(),
            GlobalItem::EnumType(t) => t.name(),
            GlobalItem::EntityType(t) => t.name(),
            GlobalItem::ComplexType(t) => t.name(),
            GlobalItem::AssociationType(t) => t.name(),
            GlobalItem::Function(f) => f.name(),
            GlobalItem::EntityContainer(c) => c.name(),
        }
    }

    /// Namespace, or `None` for containers.
    pub fn namespace_name(&self) -> Option<&str> {
        match self {
            GlobalItem::PrimitiveType(t) => Some(t.namespace_name()),
            GlobalItem::EnumType(t) => Some(t.namespace_name()),
            GlobalItem::EntityType(t) => Some(t.namespace_name()),
            GlobalItem::ComplexType(t) => Some(t.namespace_name()),
            GlobalItem::AssociationType(t) => Some(t.namespace_name()),
            GlobalItem::Function(f) => Some(f.namespace_name()),
            GlobalItem::EntityContainer(_) => None,
        }
    }

    /// True for every variant that is an EdmType (everything but containers).
    pub fn is_edm_type(&self) -> bool {
        !matches!(self, GlobalItem::EntityContainer(_))
    }

    pub fn as_named_type(&self) -> Option<NamedTypeRef<'_>> {
        match self {
            GlobalItem::EnumType(t) => Some(NamedTypeRef::Enum(t)),
            GlobalItem::EntityType(t) => Some(NamedTypeRef::Entity(t)),
            GlobalItem::ComplexType(t) => Some(NamedTypeRef::Complex(t)),
            GlobalItem::AssociationType(t) => Some(NamedTypeRef::Association(t)),
            _ => None,
        }
    }

    pub fn downcast<T: GlobalItemType>(&self) -> Option<&Arc<T>> {
        T::from_global(self)
    }
}

impl MetadataItem for GlobalItem {
    fn identity(&self) -> &str {
        match self {
            GlobalItem::PrimitiveType(t) => t.identity(),
            GlobalItem::EnumType(t) => t.identity(),
            GlobalItem::EntityType(t) => t.identity(),
            GlobalItem::ComplexType(t) => t.identity(),
            GlobalItem::AssociationType(t) => t.identity(),
            GlobalItem::Function(f) => f.identity(),
            GlobalItem::EntityContainer(c) => c.identity(),
        }
    }

    fn built_in_type_kind(&self) -> BuiltInTypeKind {
        match self {
            GlobalItem::PrimitiveType(_) => BuiltInTypeKind::PrimitiveType,
            GlobalItem::EnumType(_) => BuiltInTypeKind::EnumType,
            GlobalItem::EntityType(_) => BuiltInTypeKind::EntityType,
            GlobalItem::ComplexType(_) => BuiltInTypeKind::ComplexType,
            GlobalItem::AssociationType(_) => BuiltInTypeKind::AssociationType,
            GlobalItem::Function(_) => BuiltInTypeKind::EdmFunction,
            GlobalItem::EntityContainer(_) => BuiltInTypeKind::EntityContainer,
        }
    }

    fn is_read_only(&self) -> bool {
        match self {
            GlobalItem::PrimitiveType(t) => t.is_read_only(),
            GlobalItem::EnumType(t) => t.is_read_only(),
            GlobalItem::EntityType(t) => t.is_read_only(),
            GlobalItem::ComplexType(t) => t.is_read_only(),
            GlobalItem::AssociationType(t) => t.is_read_only(),
            GlobalItem::Function(f) => f.is_read_only(),
            GlobalItem::EntityContainer(c) => c.is_read_only(),
        }
    }

    /// Shared items are frozen before they are wrapped.
    fn set_read_only(&mut self) {}
}

/// Concrete item types that can be pulled out of a [`GlobalItem`]
pub trait GlobalItemType: MetadataItem + Send + Sync + 'static {
    const KIND: BuiltInTypeKind;

    fn from_global(item: &GlobalItem) -> Option<&Arc<Self>>;

    fn into_global(item: Arc<Self>) -> GlobalItem;
}

macro_rules! global_item_type {
    ($ty:ty, $variant:ident, $kind:ident) => {
        impl GlobalItemType for $ty {
            const KIND: BuiltInTypeKind = BuiltInTypeKind::$kind;

            fn from_global(item: &GlobalItem) -> Option<&Arc<Self>> {
                match item {
                    GlobalItem::$variant(inner) => Some(inner),
                    _ => None,
                }
            }

            fn into_global(item: Arc<Self>) -> GlobalItem {
                GlobalItem::$variant(item)
            }
        }
    };
}

global_item_type!(PrimitiveType, PrimitiveType, PrimitiveType);
global_item_type!(EnumType, EnumType, EnumType);
global_item_type!(EntityType, EntityType, EntityType);
global_item_type!(ComplexType, ComplexType, ComplexType);
global_item_type!(AssociationType, AssociationType, AssociationType);
global_item_type!(EdmFunction, Function, EdmFunction);
global_item_type!(EntityContainer, EntityContainer, EntityContainer);
