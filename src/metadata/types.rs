//! EdmType node family: shared type core, primitive/enum/transient types,
//! type references and hierarchy queries.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use super::collection::MetadataCollection;
use super::facet::FacetDescription;
use super::item::{BuiltInTypeKind, DataSpace, HasItemState, ItemState, MetadataItem};
use super::structural::{AssociationType, ComplexType, EdmProperty, EntityType};
use super::type_usage::TypeUsage;
use crate::error::MetadataError;
use crate::util::qualify;

/// Namespace used by transient (collection, reference, row) types.
pub const TRANSIENT_NAMESPACE: &str = "Transient";

/// Kinds of global types that other nodes refer to by name
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum NamedTypeKind {
    EntityType,
    ComplexType,
    EnumType,
    AssociationType,
}

impl NamedTypeKind {
    pub fn built_in_type_kind(&self) -> BuiltInTypeKind {
        match self {
            NamedTypeKind::EntityType => BuiltInTypeKind::EntityType,
            NamedTypeKind::ComplexType => BuiltInTypeKind::ComplexType,
            NamedTypeKind::EnumType => BuiltInTypeKind::EnumType,
            NamedTypeKind::AssociationType => BuiltInTypeKind::AssociationType,
        }
    }
}

/// Non-owning handle to a global type, keyed by identity.
///
/// The type itself is owned by the item collection (or, while a schema is
/// being converted, by the converter's staging area) and is resolved through
/// a [`TypeLookup`].
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeName {
    kind: NamedTypeKind,
    data_space: DataSpace,
    namespace: Arc<str>,
    name: Arc<str>,
    identity: Arc<str>,
}

impl TypeName {
    pub fn new(kind: NamedTypeKind, namespace: &str, name: &str, data_space: DataSpace) -> Self {
        Self {
            kind,
            data_space,
            namespace: Arc::from(namespace),
            name: Arc::from(name),
            identity: Arc::from(qualify(namespace, name)),
        }
    }

    pub fn kind(&self) -> NamedTypeKind {
        self.kind
    }

    pub fn data_space(&self) -> DataSpace {
        self.data_space
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn identity(&self) -> &str {
        &self.identity
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.identity)
    }
}

/// Borrowed view of a resolved global type
#[derive(Debug, Clone, Copy)]
pub enum NamedTypeRef<'a> {
    Entity(&'a EntityType),
    Complex(&'a ComplexType),
    Enum(&'a EnumType),
    Association(&'a AssociationType),
}

impl<'a> NamedTypeRef<'a> {
    pub fn core(&self) -> &'a TypeCore {
        match *self {
            NamedTypeRef::Entity(t) => t.core(),
            NamedTypeRef::Complex(t) => t.core(),
            NamedTypeRef::Enum(t) => t.core(),
            NamedTypeRef::Association(t) => t.core(),
        }
    }

    pub fn identity(&self) -> &'a str {
        match *self {
            NamedTypeRef::Entity(t) => t.identity(),
            NamedTypeRef::Complex(t) => t.identity(),
            NamedTypeRef::Enum(t) => t.identity(),
            NamedTypeRef::Association(t) => t.identity(),
        }
    }

    pub fn base_type(&self) -> Option<&'a TypeName> {
        self.core().base_type()
    }

    pub fn type_name(&self) -> TypeName {
        match *self {
            NamedTypeRef::Entity(t) => t.type_name(),
            NamedTypeRef::Complex(t) => t.type_name(),
            NamedTypeRef::Enum(t) => t.type_name(),
            NamedTypeRef::Association(t) => t.type_name(),
        }
    }

    pub fn as_entity(&self) -> Option<&'a EntityType> {
        match *self {
            NamedTypeRef::Entity(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_complex(&self) -> Option<&'a ComplexType> {
        match *self {
            NamedTypeRef::Complex(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_enum(&self) -> Option<&'a EnumType> {
        match *self {
            NamedTypeRef::Enum(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_association(&self) -> Option<&'a AssociationType> {
        match *self {
            NamedTypeRef::Association(t) => Some(t),
            _ => None,
        }
    }
}

/// Resolves global types by identity.
pub trait TypeLookup {
    fn find_named_type(&self, identity: &str) -> Option<NamedTypeRef<'_>>;
}

/// Identities of every ancestor of a type, nearest first.
///
/// Stops at the first unresolvable name or at a repeated identity.
pub fn ancestors(start: Option<&TypeName>, lookup: &dyn TypeLookup) -> Vec<TypeName> {
    let mut chain = Vec::new();
    let mut seen = HashSet::new();
    let mut current = start.cloned();
    while let Some(name) = current {
        if !seen.insert(name.identity().to_string()) {
            break;
        }
        current = lookup
            .find_named_type(name.identity())
            .and_then(|t| t.base_type().cloned());
        chain.push(name);
    }
    chain
}

/// State shared by every named type: name, namespace, space, base type and flags.
#[derive(Debug, Clone)]
pub struct TypeCore {
    name: String,
    namespace: String,
    data_space: DataSpace,
    base_type: Option<TypeName>,
    is_abstract: bool,
    state: ItemState,
    collection_type: OnceCell<Arc<CollectionType>>,
}

impl TypeCore {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>, data_space: DataSpace) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            data_space,
            base_type: None,
            is_abstract: false,
            state: ItemState::new(),
            collection_type: OnceCell::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn data_space(&self) -> DataSpace {
        self.data_space
    }

    pub fn base_type(&self) -> Option<&TypeName> {
        self.base_type.as_ref()
    }

    pub fn is_abstract(&self) -> bool {
        self.is_abstract
    }

    pub fn state(&self) -> &ItemState {
        &self.state
    }

    pub fn state_mut(&mut self) -> &mut ItemState {
        &mut self.state
    }

    /// `Namespace.Name`, cached after the first call.
    pub fn identity(&self) -> &str {
        self.state
            .identity_or_init(|| qualify(&self.namespace, &self.name))
    }

    pub fn ensure_mutable(&self, operation: &'static str) -> Result<(), MetadataError> {
        self.state.ensure_mutable(operation, self.identity())
    }

    pub fn set_name(&mut self, name: impl Into<String>) -> Result<(), MetadataError> {
        self.ensure_mutable("set_name")?;
        self.name = name.into();
        self.state.invalidate_identity();
        Ok(())
    }

    pub fn set_abstract(&mut self, is_abstract: bool) -> Result<(), MetadataError> {
        self.ensure_mutable("set_abstract")?;
        self.is_abstract = is_abstract;
        Ok(())
    }

    /// Assign the base type after checking the proposed chain does not lead
    /// back to this type.
    pub fn set_base_type(
        &mut self,
        base_type: Option<TypeName>,
        lookup: &dyn TypeLookup,
    ) -> Result<(), MetadataError> {
        self.ensure_mutable("set_base_type")?;
        if let Some(base) = base_type.as_ref() {
            let own = self.identity().to_string();
            if ancestors(Some(base), lookup)
                .iter()
                .any(|ancestor| ancestor.identity() == own)
            {
                return Err(MetadataError::CyclicBaseType {
                    type_name: own,
                    base_type: base.identity().to_string(),
                });
            }
        }
        self.base_type = base_type;
        Ok(())
    }

    pub fn freeze(&mut self) {
        self.state.freeze();
    }

    /// Memoized collection type; racing callers publish one instance and
    /// discard the other.
    pub fn collection_type_with(&self, element: impl FnOnce() -> EdmTypeRef) -> Arc<CollectionType> {
        if let Some(existing) = self.collection_type.get() {
            return Arc::clone(existing);
        }
        let candidate = Arc::new(CollectionType::new(TypeUsage::create(element())));
        match self.collection_type.try_insert(candidate) {
            Ok(published) => Arc::clone(published),
            Err((published, _discarded)) => Arc::clone(published),
        }
    }

    /// True when `other` is a strict ancestor of this type.
    pub fn is_subtype_of(&self, other: &str, lookup: &dyn TypeLookup) -> bool {
        ancestors(self.base_type(), lookup)
            .iter()
            .any(|ancestor| ancestor.identity() == other)
    }

    /// True when this type is a strict ancestor of `other`. Not reflexive.
    pub fn is_base_type_of(&self, other: &str, lookup: &dyn TypeLookup) -> bool {
        let Some(other) = lookup.find_named_type(other) else {
            return false;
        };
        other.core().is_subtype_of(self.identity(), lookup)
    }

    /// True when `other` is this type or one of its descendants.
    pub fn is_assignable_from(&self, other: &str, lookup: &dyn TypeLookup) -> bool {
        self.identity() == other || self.is_base_type_of(other, lookup)
    }
}

/// Accessors common to every named EdmType.
pub trait EdmType: MetadataItem {
    fn core(&self) -> &TypeCore;

    fn name(&self) -> &str {
        self.core().name()
    }

    fn namespace_name(&self) -> &str {
        self.core().namespace()
    }

    /// `Namespace.Name`
    fn full_name(&self) -> &str {
        self.core().identity()
    }

    fn data_space(&self) -> DataSpace {
        self.core().data_space()
    }

    fn base_type(&self) -> Option<&TypeName> {
        self.core().base_type()
    }

    fn is_abstract(&self) -> bool {
        self.core().is_abstract()
    }
}

/// Reference to the EdmType described by a [`TypeUsage`]
#[derive(Debug, Clone)]
pub enum EdmTypeRef {
    Primitive(Arc<PrimitiveType>),
    Named(TypeName),
    Collection(Arc<CollectionType>),
    Ref(Arc<RefType>),
    Row(Arc<RowType>),
}

impl EdmTypeRef {
    pub fn identity(&self) -> &str {
        match self {
            EdmTypeRef::Primitive(t) => t.identity(),
            EdmTypeRef::Named(t) => t.identity(),
            EdmTypeRef::Collection(t) => t.identity(),
            EdmTypeRef::Ref(t) => t.identity(),
            EdmTypeRef::Row(t) => t.identity(),
        }
    }

    pub fn built_in_type_kind(&self) -> BuiltInTypeKind {
        match self {
            EdmTypeRef::Primitive(_) => BuiltInTypeKind::PrimitiveType,
            EdmTypeRef::Named(t) => t.kind().built_in_type_kind(),
            EdmTypeRef::Collection(_) => BuiltInTypeKind::CollectionType,
            EdmTypeRef::Ref(_) => BuiltInTypeKind::RefType,
            EdmTypeRef::Row(_) => BuiltInTypeKind::RowType,
        }
    }

    pub fn data_space(&self) -> DataSpace {
        match self {
            EdmTypeRef::Primitive(t) => t.data_space(),
            EdmTypeRef::Named(t) => t.data_space(),
            EdmTypeRef::Collection(t) => t.element_type().edm_type().data_space(),
            EdmTypeRef::Ref(t) => t.element_type().data_space(),
            EdmTypeRef::Row(t) => t.data_space(),
        }
    }

    pub fn as_primitive(&self) -> Option<&Arc<PrimitiveType>> {
        match self {
            EdmTypeRef::Primitive(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_named(&self) -> Option<&TypeName> {
        match self {
            EdmTypeRef::Named(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_collection(&self) -> Option<&Arc<CollectionType>> {
        match self {
            EdmTypeRef::Collection(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_ref_type(&self) -> Option<&Arc<RefType>> {
        match self {
            EdmTypeRef::Ref(t) => Some(t),
            _ => None,
        }
    }

    pub fn is_primitive(&self) -> bool {
        matches!(self, EdmTypeRef::Primitive(_))
    }

    pub fn is_kind(&self, kind: NamedTypeKind) -> bool {
        matches!(self, EdmTypeRef::Named(t) if t.kind() == kind)
    }

    /// Name as written in a schema: unqualified for primitives, qualified
    /// for named types, `Collection(...)` for collections.
    pub fn schema_name(&self) -> String {
        match self {
            EdmTypeRef::Primitive(t) => t.name().to_string(),
            EdmTypeRef::Named(t) => t.identity().to_string(),
            EdmTypeRef::Collection(t) => {
                format!("Collection({})", t.element_type().edm_type().schema_name())
            }
            EdmTypeRef::Ref(t) => format!("Ref({})", t.element_type().identity()),
            EdmTypeRef::Row(t) => t.identity().to_string(),
        }
    }
}

impl PartialEq for EdmTypeRef {
    fn eq(&self, other: &Self) -> bool {
        self.built_in_type_kind() == other.built_in_type_kind() && self.identity() == other.identity()
    }
}

/// Canonical primitive type kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PrimitiveTypeKind {
    Binary,
    Boolean,
    Byte,
    DateTime,
    Decimal,
    Double,
    Guid,
    Single,
    SByte,
    Int16,
    Int32,
    Int64,
    String,
    Time,
    DateTimeOffset,
    Geometry,
    Geography,
    GeometryPoint,
    GeometryLineString,
    GeometryPolygon,
    GeometryMultiPoint,
    GeometryMultiLineString,
    GeometryMultiPolygon,
    GeometryCollection,
    GeographyPoint,
    GeographyLineString,
    GeographyPolygon,
    GeographyMultiPoint,
    GeographyMultiLineString,
    GeographyMultiPolygon,
    GeographyCollection,
}

impl PrimitiveTypeKind {
    pub const ALL: [PrimitiveTypeKind; 31] = [
        PrimitiveTypeKind::Binary,
        PrimitiveTypeKind::Boolean,
        PrimitiveTypeKind::Byte,
        PrimitiveTypeKind::DateTime,
        PrimitiveTypeKind::Decimal,
        PrimitiveTypeKind::Double,
        PrimitiveTypeKind::Guid,
        PrimitiveTypeKind::Single,
        PrimitiveTypeKind::SByte,
        PrimitiveTypeKind::Int16,
        PrimitiveTypeKind::Int32,
        PrimitiveTypeKind::Int64,
        PrimitiveTypeKind::String,
        PrimitiveTypeKind::Time,
        PrimitiveTypeKind::DateTimeOffset,
        PrimitiveTypeKind::Geometry,
        PrimitiveTypeKind::Geography,
        PrimitiveTypeKind::GeometryPoint,
        PrimitiveTypeKind::GeometryLineString,
        PrimitiveTypeKind::GeometryPolygon,
        PrimitiveTypeKind::GeometryMultiPoint,
        PrimitiveTypeKind::GeometryMultiLineString,
        PrimitiveTypeKind::GeometryMultiPolygon,
        PrimitiveTypeKind::GeometryCollection,
        PrimitiveTypeKind::GeographyPoint,
        PrimitiveTypeKind::GeographyLineString,
        PrimitiveTypeKind::GeographyPolygon,
        PrimitiveTypeKind::GeographyMultiPoint,
        PrimitiveTypeKind::GeographyMultiLineString,
        PrimitiveTypeKind::GeographyMultiPolygon,
        PrimitiveTypeKind::GeographyCollection,
    ];

    pub fn name(&self) -> &'static str {
        match self {
            PrimitiveTypeKind::Binary => "Binary",
            PrimitiveTypeKind::Boolean => "Boolean",
            PrimitiveTypeKind::Byte => "Byte",
            PrimitiveTypeKind::DateTime => "DateTime",
            PrimitiveTypeKind::Decimal => "Decimal",
            PrimitiveTypeKind::Double => "Double",
            PrimitiveTypeKind::Guid => "Guid",
            PrimitiveTypeKind::Single => "Single",
            PrimitiveTypeKind::SByte => "SByte",
            PrimitiveTypeKind::Int16 => "Int16",
            PrimitiveTypeKind::Int32 => "Int32",
            PrimitiveTypeKind::Int64 => "Int64",
            PrimitiveTypeKind::String => "String",
            PrimitiveTypeKind::Time => "Time",
            PrimitiveTypeKind::DateTimeOffset => "DateTimeOffset",
            PrimitiveTypeKind::Geometry => "Geometry",
            PrimitiveTypeKind::Geography => "Geography",
            PrimitiveTypeKind::GeometryPoint => "GeometryPoint",
            PrimitiveTypeKind::GeometryLineString => "GeometryLineString",
            PrimitiveTypeKind::GeometryPolygon => "GeometryPolygon",
            PrimitiveTypeKind::GeometryMultiPoint => "GeometryMultiPoint",
            PrimitiveTypeKind::GeometryMultiLineString => "GeometryMultiLineString",
            PrimitiveTypeKind::GeometryMultiPolygon => "GeometryMultiPolygon",
            PrimitiveTypeKind::GeometryCollection => "GeometryCollection",
            PrimitiveTypeKind::GeographyPoint => "GeographyPoint",
            PrimitiveTypeKind::GeographyLineString => "GeographyLineString",
            PrimitiveTypeKind::GeographyPolygon => "GeographyPolygon",
            PrimitiveTypeKind::GeographyMultiPoint => "GeographyMultiPoint",
            PrimitiveTypeKind::GeographyMultiLineString => "GeographyMultiLineString",
            PrimitiveTypeKind::GeographyMultiPolygon => "GeographyMultiPolygon",
            PrimitiveTypeKind::GeographyCollection => "GeographyCollection",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.iter().copied().find(|kind| kind.name() == name)
    }

    pub fn is_spatial(&self) -> bool {
        self.is_geometry() || self.is_geography()
    }

    pub fn is_geometry(&self) -> bool {
        matches!(
            self,
            PrimitiveTypeKind::Geometry
                | PrimitiveTypeKind::GeometryPoint
                | PrimitiveTypeKind::GeometryLineString
                | PrimitiveTypeKind::GeometryPolygon
                | PrimitiveTypeKind::GeometryMultiPoint
                | PrimitiveTypeKind::GeometryMultiLineString
                | PrimitiveTypeKind::GeometryMultiPolygon
                | PrimitiveTypeKind::GeometryCollection
        )
    }

    pub fn is_geography(&self) -> bool {
        matches!(
            self,
            PrimitiveTypeKind::Geography
                | PrimitiveTypeKind::GeographyPoint
                | PrimitiveTypeKind::GeographyLineString
                | PrimitiveTypeKind::GeographyPolygon
                | PrimitiveTypeKind::GeographyMultiPoint
                | PrimitiveTypeKind::GeographyMultiLineString
                | PrimitiveTypeKind::GeographyMultiPolygon
                | PrimitiveTypeKind::GeographyCollection
        )
    }

    /// Kinds allowed as the underlying type of an enum.
    pub fn is_enum_underlying(&self) -> bool {
        matches!(
            self,
            PrimitiveTypeKind::Byte
                | PrimitiveTypeKind::SByte
                | PrimitiveTypeKind::Int16
                | PrimitiveTypeKind::Int32
                | PrimitiveTypeKind::Int64
        )
    }

    /// Inclusive value range of an integral kind.
    pub fn integral_range(&self) -> Option<(i64, i64)> {
        match self {
            PrimitiveTypeKind::Byte => Some((0, i64::from(u8::MAX))),
            PrimitiveTypeKind::SByte => Some((i64::from(i8::MIN), i64::from(i8::MAX))),
            PrimitiveTypeKind::Int16 => Some((i64::from(i16::MIN), i64::from(i16::MAX))),
            PrimitiveTypeKind::Int32 => Some((i64::from(i32::MIN), i64::from(i32::MAX))),
            PrimitiveTypeKind::Int64 => Some((i64::MIN, i64::MAX)),
            _ => None,
        }
    }
}

impl fmt::Display for PrimitiveTypeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A primitive type supplied by a provider manifest (canonical, store or CLR).
pub struct PrimitiveType {
    core: TypeCore,
    kind: PrimitiveTypeKind,
    facet_descriptions: Vec<Arc<FacetDescription>>,
}

impl PrimitiveType {
    /// Create a frozen primitive type.
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        data_space: DataSpace,
        kind: PrimitiveTypeKind,
        facet_descriptions: Vec<Arc<FacetDescription>>,
    ) -> Self {
        let mut core = TypeCore::new(name, namespace, data_space);
        core.freeze();
        Self {
            core,
            kind,
            facet_descriptions,
        }
    }

    pub fn kind(&self) -> PrimitiveTypeKind {
        self.kind
    }

    pub fn facet_descriptions(&self) -> &[Arc<FacetDescription>] {
        &self.facet_descriptions
    }

    pub fn facet_description(&self, name: &str) -> Option<&Arc<FacetDescription>> {
        self.facet_descriptions.iter().find(|d| d.name() == name)
    }

    /// Memoized collection of this primitive type.
    ///
    /// The collection type refers back to this type, so the pair stays alive
    /// together once the collection type has been created.
    pub fn collection_type(self: &Arc<Self>) -> Arc<CollectionType> {
        self.core
            .collection_type_with(|| EdmTypeRef::Primitive(Arc::clone(self)))
    }
}

// Skips the memoized collection type, which points back here.
impl fmt::Debug for PrimitiveType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrimitiveType")
            .field("identity", &self.core.identity())
            .field("data_space", &self.core.data_space())
            .field("kind", &self.kind)
            .finish()
    }
}

impl MetadataItem for PrimitiveType {
    fn identity(&self) -> &str {
        self.core.identity()
    }

    fn built_in_type_kind(&self) -> BuiltInTypeKind {
        BuiltInTypeKind::PrimitiveType
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn set_read_only(&mut self) {}
}

impl EdmType for PrimitiveType {
    fn core(&self) -> &TypeCore {
        &self.core
    }
}

/// A named member of an enum type
#[derive(Debug, Clone)]
pub struct EnumMember {
    name: String,
    value: i64,
    state: ItemState,
}

impl EnumMember {
    pub fn new(name: impl Into<String>, value: i64) -> Self {
        Self {
            name: name.into(),
            value,
            state: ItemState::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn value(&self) -> i64 {
        self.value
    }
}

impl MetadataItem for EnumMember {
    fn identity(&self) -> &str {
        &self.name
    }

    fn built_in_type_kind(&self) -> BuiltInTypeKind {
        BuiltInTypeKind::EnumMember
    }

    fn is_read_only(&self) -> bool {
        self.state.is_read_only()
    }

    fn set_read_only(&mut self) {
        self.state.freeze();
    }
}

impl HasItemState for EnumMember {
    fn item_state(&self) -> &ItemState {
        &self.state
    }

    fn item_state_mut(&mut self) -> &mut ItemState {
        &mut self.state
    }
}

/// An enumeration over an integral primitive type
#[derive(Debug, Clone)]
pub struct EnumType {
    core: TypeCore,
    underlying_type: Arc<PrimitiveType>,
    is_flags: bool,
    members: MetadataCollection<EnumMember>,
}

impl EnumType {
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        data_space: DataSpace,
        underlying_type: Arc<PrimitiveType>,
        is_flags: bool,
    ) -> Self {
        Self {
            core: TypeCore::new(name, namespace, data_space),
            underlying_type,
            is_flags,
            members: MetadataCollection::new(),
        }
    }

    pub fn underlying_type(&self) -> &Arc<PrimitiveType> {
        &self.underlying_type
    }

    pub fn is_flags(&self) -> bool {
        self.is_flags
    }

    pub fn members(&self) -> &MetadataCollection<EnumMember> {
        &self.members
    }

    pub fn add_member(&mut self, member: EnumMember) -> Result<(), MetadataError> {
        self.core.ensure_mutable("EnumType::add_member")?;
        self.members.add(member)
    }

    pub fn type_name(&self) -> TypeName {
        TypeName::new(
            NamedTypeKind::EnumType,
            self.core.namespace(),
            self.core.name(),
            self.core.data_space(),
        )
    }

    pub fn collection_type(&self) -> Arc<CollectionType> {
        self.core
            .collection_type_with(|| EdmTypeRef::Named(self.type_name()))
    }

    pub fn core_mut(&mut self) -> &mut TypeCore {
        &mut self.core
    }
}

impl MetadataItem for EnumType {
    fn identity(&self) -> &str {
        self.core.identity()
    }

    fn built_in_type_kind(&self) -> BuiltInTypeKind {
        BuiltInTypeKind::EnumType
    }

    fn is_read_only(&self) -> bool {
        self.core.state().is_read_only()
    }

    fn set_read_only(&mut self) {
        self.members.set_read_only();
        self.core.freeze();
    }
}

impl HasItemState for EnumType {
    fn item_state(&self) -> &ItemState {
        self.core.state()
    }

    fn item_state_mut(&mut self) -> &mut ItemState {
        self.core.state_mut()
    }
}

impl EdmType for EnumType {
    fn core(&self) -> &TypeCore {
        &self.core
    }
}

/// Collection of a single element type usage. Transient and immutable.
#[derive(Debug)]
pub struct CollectionType {
    element_type: Arc<TypeUsage>,
    state: ItemState,
}

impl CollectionType {
    pub fn new(element_type: Arc<TypeUsage>) -> Self {
        let mut state = ItemState::new();
        state.freeze();
        Self {
            element_type,
            state,
        }
    }

    pub fn element_type(&self) -> &Arc<TypeUsage> {
        &self.element_type
    }
}

impl MetadataItem for CollectionType {
    fn identity(&self) -> &str {
        self.state
            .identity_or_init(|| format!("collection[{}]", self.element_type.identity()))
    }

    fn built_in_type_kind(&self) -> BuiltInTypeKind {
        BuiltInTypeKind::CollectionType
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn set_read_only(&mut self) {}
}

/// Reference to an entity type. Transient and immutable.
#[derive(Debug)]
pub struct RefType {
    element_type: TypeName,
    state: ItemState,
}

impl RefType {
    pub fn new(element_type: TypeName) -> Self {
        let mut state = ItemState::new();
        state.freeze();
        Self {
            element_type,
            state,
        }
    }

    /// The referenced entity type.
    pub fn element_type(&self) -> &TypeName {
        &self.element_type
    }
}

impl MetadataItem for RefType {
    fn identity(&self) -> &str {
        self.state
            .identity_or_init(|| format!("reference[{}]", self.element_type.identity()))
    }

    fn built_in_type_kind(&self) -> BuiltInTypeKind {
        BuiltInTypeKind::RefType
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn set_read_only(&mut self) {}
}

/// Anonymous structural type, used for function results and store row shapes
#[derive(Debug)]
pub struct RowType {
    properties: MetadataCollection<EdmProperty>,
    data_space: DataSpace,
    state: ItemState,
}

impl RowType {
    pub fn new(
        properties: Vec<EdmProperty>,
        data_space: DataSpace,
    ) -> Result<Self, MetadataError> {
        let mut properties = MetadataCollection::try_from_items(properties)?;
        properties.set_read_only();
        let mut state = ItemState::new();
        state.freeze();
        Ok(Self {
            properties,
            data_space,
            state,
        })
    }

    pub fn properties(&self) -> &MetadataCollection<EdmProperty> {
        &self.properties
    }

    pub fn data_space(&self) -> DataSpace {
        self.data_space
    }
}

impl MetadataItem for RowType {
    fn identity(&self) -> &str {
        self.state.identity_or_init(|| {
            let columns: Vec<String> = self
                .properties
                .iter()
                .map(|p| format!("({},{})", p.name(), p.type_usage().identity()))
                .collect();
            format!("rowtype[{}]", columns.join(","))
        })
    }

    fn built_in_type_kind(&self) -> BuiltInTypeKind {
        BuiltInTypeKind::RowType
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn set_read_only(&mut self) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primitive_kind_names_round_trip() {
        for kind in PrimitiveTypeKind::ALL {
            assert_eq!(PrimitiveTypeKind::from_name(kind.name()), Some(kind));
        }
        assert!(PrimitiveTypeKind::GeographyPoint.is_spatial());
        assert!(!PrimitiveTypeKind::Int32.is_spatial());
    }

    #[test]
    fn test_primitive_collection_type_is_memoized() {
        let int32 = Arc::new(PrimitiveType::new(
            "Int32",
            "Edm",
            DataSpace::CSpace,
            PrimitiveTypeKind::Int32,
            Vec::new(),
        ));
        let first = int32.collection_type();
        let second = int32.collection_type();
        assert!(Arc::ptr_eq(&first, &second));
        assert_eq!(first.identity(), "collection[Edm.Int32(DefaultValue=,Nullable=True)]");
    }

    #[test]
    fn test_primitive_collection_type_outlives_callers() {
        let int32 = Arc::new(PrimitiveType::new(
            "Int32",
            "Edm",
            DataSpace::CSpace,
            PrimitiveTypeKind::Int32,
            Vec::new(),
        ));
        let first = Arc::as_ptr(&int32.collection_type());
        let second = int32.collection_type();
        assert_eq!(Arc::as_ptr(&second), first);
        assert!(format!("{:?}", int32).contains("Edm.Int32"));
    }

    #[test]
    fn test_type_name_identity() {
        let name = TypeName::new(NamedTypeKind::EntityType, "Model", "Order", DataSpace::CSpace);
        assert_eq!(name.identity(), "Model.Order");
        assert_eq!(name.to_string(), "Model.Order");
    }
}
