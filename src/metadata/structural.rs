//! Structural types (entity, complex, association) and their members.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::OnceCell;

use super::collection::MetadataCollection;
use super::item::{BuiltInTypeKind, DataSpace, HasItemState, ItemState, MetadataItem};
use super::type_usage::TypeUsage;
use super::types::{
    ancestors, CollectionType, EdmType, EdmTypeRef, NamedTypeKind, RefType, TypeCore, TypeLookup,
    TypeName,
};
use crate::error::MetadataError;

/// Multiplicity of an association end
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RelationshipMultiplicity {
    ZeroOrOne,
    One,
    Many,
}

impl RelationshipMultiplicity {
    pub fn parse(text: &str) -> Option<Self> {
        match text.trim() {
            "0..1" => Some(RelationshipMultiplicity::ZeroOrOne),
            "1" => Some(RelationshipMultiplicity::One),
            "*" => Some(RelationshipMultiplicity::Many),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            RelationshipMultiplicity::ZeroOrOne => "0..1",
            RelationshipMultiplicity::One => "1",
            RelationshipMultiplicity::Many => "*",
        }
    }
}

impl fmt::Display for RelationshipMultiplicity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Action taken on an end when the other end is deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum OperationAction {
    #[default]
    None,
    Cascade,
}

/// A scalar, complex or enum valued property
#[derive(Debug, Clone)]
pub struct EdmProperty {
    name: String,
    type_usage: Arc<TypeUsage>,
    declaring_type: Option<String>,
    state: ItemState,
}

impl EdmProperty {
    pub fn new(name: impl Into<String>, type_usage: Arc<TypeUsage>) -> Self {
        Self {
            name: name.into(),
            type_usage,
            declaring_type: None,
            state: ItemState::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_usage(&self) -> &Arc<TypeUsage> {
        &self.type_usage
    }

    pub fn is_nullable(&self) -> bool {
        self.type_usage.is_nullable()
    }

    /// Identity of the type that declared this property.
    pub fn declaring_type(&self) -> Option<&str> {
        self.declaring_type.as_deref()
    }
}

/// Property navigating from one association end to the other
#[derive(Debug, Clone)]
pub struct NavigationProperty {
    name: String,
    type_usage: Arc<TypeUsage>,
    relationship_type: TypeName,
    from_end: String,
    to_end: String,
    declaring_type: Option<String>,
    state: ItemState,
}

impl NavigationProperty {
    pub fn new(
        name: impl Into<String>,
        type_usage: Arc<TypeUsage>,
        relationship_type: TypeName,
        from_end: impl Into<String>,
        to_end: impl Into<String>,
    ) -> Self {
        Self {
            name: name.into(),
            type_usage,
            relationship_type,
            from_end: from_end.into(),
            to_end: to_end.into(),
            declaring_type: None,
            state: ItemState::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_usage(&self) -> &Arc<TypeUsage> {
        &self.type_usage
    }

    pub fn relationship_type(&self) -> &TypeName {
        &self.relationship_type
    }

    pub fn from_end_name(&self) -> &str {
        &self.from_end
    }

    pub fn to_end_name(&self) -> &str {
        &self.to_end
    }

    pub fn declaring_type(&self) -> Option<&str> {
        self.declaring_type.as_deref()
    }

    pub fn from_end_member<'a>(&self, lookup: &'a dyn TypeLookup) -> Option<&'a AssociationEndMember> {
        self.association(lookup)?.end(&self.from_end)
    }

    pub fn to_end_member<'a>(&self, lookup: &'a dyn TypeLookup) -> Option<&'a AssociationEndMember> {
        self.association(lookup)?.end(&self.to_end)
    }

    fn association<'a>(&self, lookup: &'a dyn TypeLookup) -> Option<&'a AssociationType> {
        lookup
            .find_named_type(self.relationship_type.identity())?
            .as_association()
    }
}

/// One end of an association, typed as a reference to an entity type
#[derive(Debug, Clone)]
pub struct AssociationEndMember {
    name: String,
    type_usage: Arc<TypeUsage>,
    multiplicity: RelationshipMultiplicity,
    delete_behavior: OperationAction,
    declaring_type: Option<String>,
    state: ItemState,
}

impl AssociationEndMember {
    pub fn new(
        name: impl Into<String>,
        entity_type: TypeName,
        multiplicity: RelationshipMultiplicity,
    ) -> Self {
        let reference = Arc::new(RefType::new(entity_type));
        Self {
            name: name.into(),
            type_usage: TypeUsage::create(EdmTypeRef::Ref(reference)),
            multiplicity,
            delete_behavior: OperationAction::None,
            declaring_type: None,
            state: ItemState::new(),
        }
    }

    pub fn with_delete_behavior(mut self, delete_behavior: OperationAction) -> Self {
        self.delete_behavior = delete_behavior;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_usage(&self) -> &Arc<TypeUsage> {
        &self.type_usage
    }

    /// Entity type at this end.
    pub fn entity_type(&self) -> Option<&TypeName> {
        self.type_usage
            .edm_type()
            .as_ref_type()
            .map(|reference| reference.element_type())
    }

    pub fn multiplicity(&self) -> RelationshipMultiplicity {
        self.multiplicity
    }

    pub fn delete_behavior(&self) -> OperationAction {
        self.delete_behavior
    }

    pub fn declaring_type(&self) -> Option<&str> {
        self.declaring_type.as_deref()
    }
}

/// Member of a structural type
#[derive(Debug, Clone)]
pub enum EdmMember {
    Property(EdmProperty),
    Navigation(NavigationProperty),
    AssociationEnd(AssociationEndMember),
}

impl EdmMember {
    pub fn name(&self) -> &str {
        match self {
            EdmMember::Property(m) => m.name(),
            EdmMember::Navigation(m) => m.name(),
            EdmMember::AssociationEnd(m) => m.name(),
        }
    }

    pub fn type_usage(&self) -> &Arc<TypeUsage> {
        match self {
            EdmMember::Property(m) => m.type_usage(),
            EdmMember::Navigation(m) => m.type_usage(),
            EdmMember::AssociationEnd(m) => m.type_usage(),
        }
    }

    pub fn declaring_type(&self) -> Option<&str> {
        match self {
            EdmMember::Property(m) => m.declaring_type(),
            EdmMember::Navigation(m) => m.declaring_type(),
            EdmMember::AssociationEnd(m) => m.declaring_type(),
        }
    }

    fn set_declaring_type(&mut self, declaring_type: &str) {
        let slot = match self {
            EdmMember::Property(m) => &mut m.declaring_type,
            EdmMember::Navigation(m) => &mut m.declaring_type,
            EdmMember::AssociationEnd(m) => &mut m.declaring_type,
        };
        *slot = Some(declaring_type.to_string());
    }

    pub fn as_property(&self) -> Option<&EdmProperty> {
        match self {
            EdmMember::Property(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_navigation(&self) -> Option<&NavigationProperty> {
        match self {
            EdmMember::Navigation(m) => Some(m),
            _ => None,
        }
    }

    pub fn as_association_end(&self) -> Option<&AssociationEndMember> {
        match self {
            EdmMember::AssociationEnd(m) => Some(m),
            _ => None,
        }
    }

    fn state(&self) -> &ItemState {
        match self {
            EdmMember::Property(m) => &m.state,
            EdmMember::Navigation(m) => &m.state,
            EdmMember::AssociationEnd(m) => &m.state,
        }
    }

    fn state_mut(&mut self) -> &mut ItemState {
        match self {
            EdmMember::Property(m) => &mut m.state,
            EdmMember::Navigation(m) => &mut m.state,
            EdmMember::AssociationEnd(m) => &mut m.state,
        }
    }
}

impl MetadataItem for EdmMember {
    fn identity(&self) -> &str {
        self.name()
    }

    fn built_in_type_kind(&self) -> BuiltInTypeKind {
        match self {
            EdmMember::Property(_) => BuiltInTypeKind::EdmProperty,
            EdmMember::Navigation(_) => BuiltInTypeKind::NavigationProperty,
            EdmMember::AssociationEnd(_) => BuiltInTypeKind::AssociationEndMember,
        }
    }

    fn is_read_only(&self) -> bool {
        self.state().is_read_only()
    }

    fn set_read_only(&mut self) {
        self.state_mut().freeze();
    }
}

impl HasItemState for EdmMember {
    fn item_state(&self) -> &ItemState {
        self.state()
    }

    fn item_state_mut(&mut self) -> &mut ItemState {
        self.state_mut()
    }
}

impl MetadataItem for EdmProperty {
    fn identity(&self) -> &str {
        &self.name
    }

    fn built_in_type_kind(&self) -> BuiltInTypeKind {
        BuiltInTypeKind::EdmProperty
    }

    fn is_read_only(&self) -> bool {
        self.state.is_read_only()
    }

    fn set_read_only(&mut self) {
        self.state.freeze();
    }
}

impl HasItemState for EdmProperty {
    fn item_state(&self) -> &ItemState {
        &self.state
    }

    fn item_state_mut(&mut self) -> &mut ItemState {
        &mut self.state
    }
}

fn add_member_to(
    core: &TypeCore,
    members: &mut MetadataCollection<EdmMember>,
    mut member: EdmMember,
) -> Result<(), MetadataError> {
    core.ensure_mutable("add_member")?;
    member.set_declaring_type(core.identity());
    members.add(member)
}

/// An entity type: keyed structural type with navigation properties
#[derive(Debug, Clone)]
pub struct EntityType {
    core: TypeCore,
    members: MetadataCollection<EdmMember>,
    key_member_names: Vec<String>,
    reference_type: OnceCell<Arc<RefType>>,
}

impl EntityType {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>, data_space: DataSpace) -> Self {
        Self {
            core: TypeCore::new(name, namespace, data_space),
            members: MetadataCollection::new(),
            key_member_names: Vec::new(),
            reference_type: OnceCell::new(),
        }
    }

    pub fn type_name(&self) -> TypeName {
        TypeName::new(
            NamedTypeKind::EntityType,
            self.core.namespace(),
            self.core.name(),
            self.core.data_space(),
        )
    }

    /// Members declared on this type, in declaration order.
    pub fn members(&self) -> &MetadataCollection<EdmMember> {
        &self.members
    }

    pub fn properties(&self) -> impl Iterator<Item = &EdmProperty> {
        self.members.iter().filter_map(EdmMember::as_property)
    }

    pub fn navigation_properties(&self) -> impl Iterator<Item = &NavigationProperty> {
        self.members.iter().filter_map(EdmMember::as_navigation)
    }

    pub fn add_member(&mut self, member: EdmMember) -> Result<(), MetadataError> {
        add_member_to(&self.core, &mut self.members, member)
    }

    pub fn add_property(&mut self, property: EdmProperty) -> Result<(), MetadataError> {
        self.add_member(EdmMember::Property(property))
    }

    pub fn add_navigation_property(
        &mut self,
        property: NavigationProperty,
    ) -> Result<(), MetadataError> {
        self.add_member(EdmMember::Navigation(property))
    }

    /// Mark an already declared property as part of the key.
    ///
    /// Fails once a base type with keys of its own is set.
    pub fn add_key_member(&mut self, name: &str, lookup: &dyn TypeLookup) -> Result<(), MetadataError> {
        self.core.ensure_mutable("add_key_member")?;
        if let Some(base) = self.core.base_type() {
            self.reject_keyed_base(base, lookup)?;
        }
        let is_property = self
            .members
            .try_get_value(name, false)
            .and_then(EdmMember::as_property)
            .is_some();
        if !is_property {
            return Err(MetadataError::ItemNotFound {
                identity: format!("{}.{}", self.core.identity(), name),
                space: self.core.data_space().to_string(),
            });
        }
        if !self.key_member_names.iter().any(|k| k == name) {
            self.key_member_names.push(name.to_string());
        }
        Ok(())
    }

    /// Key members declared on this level of the hierarchy.
    pub fn declared_key_member_names(&self) -> &[String] {
        &self.key_member_names
    }

    /// Effective key: declared here, else inherited from the nearest
    /// ancestor that declares one.
    pub fn key_member_names(&self, lookup: &dyn TypeLookup) -> Vec<String> {
        if !self.key_member_names.is_empty() {
            return self.key_member_names.clone();
        }
        for ancestor in ancestors(self.core.base_type(), lookup) {
            if let Some(entity) = lookup
                .find_named_type(ancestor.identity())
                .and_then(|t| t.as_entity())
            {
                if !entity.key_member_names.is_empty() {
                    return entity.key_member_names.clone();
                }
            }
        }
        Vec::new()
    }

    /// Members of every ancestor followed by the members declared here.
    pub fn all_members<'a>(&'a self, lookup: &'a dyn TypeLookup) -> Vec<&'a EdmMember> {
        let mut chain: Vec<&'a EntityType> = ancestors(self.core.base_type(), lookup)
            .iter()
            .filter_map(|name| lookup.find_named_type(name.identity()))
            .filter_map(|t| t.as_entity())
            .collect();
        chain.reverse();
        chain.push(self);
        chain.iter().flat_map(|t| t.members.iter()).collect()
    }

    pub fn set_abstract(&mut self, is_abstract: bool) -> Result<(), MetadataError> {
        self.core.set_abstract(is_abstract)
    }

    /// Assign the base type, rejecting cycles and keys declared on both levels.
    pub fn set_base_type(
        &mut self,
        base_type: Option<TypeName>,
        lookup: &dyn TypeLookup,
    ) -> Result<(), MetadataError> {
        if let Some(base) = base_type.as_ref() {
            if !self.key_member_names.is_empty() {
                self.reject_keyed_base(base, lookup)?;
            }
        }
        self.core.set_base_type(base_type, lookup)
    }

    fn reject_keyed_base(&self, base: &TypeName, lookup: &dyn TypeLookup) -> Result<(), MetadataError> {
        let base_keys = lookup
            .find_named_type(base.identity())
            .and_then(|t| t.as_entity())
            .map(|entity| entity.key_member_names(lookup))
            .unwrap_or_default();
        if base_keys.is_empty() {
            return Ok(());
        }
        Err(MetadataError::KeysOnMultipleLevels {
            type_name: self.core.identity().to_string(),
            base_type: base.identity().to_string(),
        })
    }

    pub fn collection_type(&self) -> Arc<CollectionType> {
        self.core
            .collection_type_with(|| EdmTypeRef::Named(self.type_name()))
    }

    /// Reference type pointing at this entity type.
    pub fn reference_type(&self) -> Arc<RefType> {
        Arc::clone(
            self.reference_type
                .get_or_init(|| Arc::new(RefType::new(self.type_name()))),
        )
    }

    pub fn is_subtype_of(&self, other: &str, lookup: &dyn TypeLookup) -> bool {
        self.core.is_subtype_of(other, lookup)
    }

    pub fn is_base_type_of(&self, other: &str, lookup: &dyn TypeLookup) -> bool {
        self.core.is_base_type_of(other, lookup)
    }

    pub fn is_assignable_from(&self, other: &str, lookup: &dyn TypeLookup) -> bool {
        self.core.is_assignable_from(other, lookup)
    }
}

impl MetadataItem for EntityType {
    fn identity(&self) -> &str {
        self.core.identity()
    }

    fn built_in_type_kind(&self) -> BuiltInTypeKind {
        BuiltInTypeKind::EntityType
    }

    fn is_read_only(&self) -> bool {
        self.core.state().is_read_only()
    }

    fn set_read_only(&mut self) {
        self.members.set_read_only();
        self.core.freeze();
    }
}

impl HasItemState for EntityType {
    fn item_state(&self) -> &ItemState {
        self.core.state()
    }

    fn item_state_mut(&mut self) -> &mut ItemState {
        self.core.state_mut()
    }
}

impl EdmType for EntityType {
    fn core(&self) -> &TypeCore {
        &self.core
    }
}

/// A complex type: keyless structural type used as a property value
#[derive(Debug, Clone)]
pub struct ComplexType {
    core: TypeCore,
    members: MetadataCollection<EdmMember>,
}

impl ComplexType {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>, data_space: DataSpace) -> Self {
        Self {
            core: TypeCore::new(name, namespace, data_space),
            members: MetadataCollection::new(),
        }
    }

    pub fn type_name(&self) -> TypeName {
        TypeName::new(
            NamedTypeKind::ComplexType,
            self.core.namespace(),
            self.core.name(),
            self.core.data_space(),
        )
    }

    pub fn members(&self) -> &MetadataCollection<EdmMember> {
        &self.members
    }

    pub fn properties(&self) -> impl Iterator<Item = &EdmProperty> {
        self.members.iter().filter_map(EdmMember::as_property)
    }

    pub fn add_property(&mut self, property: EdmProperty) -> Result<(), MetadataError> {
        add_member_to(&self.core, &mut self.members, EdmMember::Property(property))
    }

    pub fn core_mut(&mut self) -> &mut TypeCore {
        &mut self.core
    }

    pub fn collection_type(&self) -> Arc<CollectionType> {
        self.core
            .collection_type_with(|| EdmTypeRef::Named(self.type_name()))
    }
}

impl MetadataItem for ComplexType {
    fn identity(&self) -> &str {
        self.core.identity()
    }

    fn built_in_type_kind(&self) -> BuiltInTypeKind {
        BuiltInTypeKind::ComplexType
    }

    fn is_read_only(&self) -> bool {
        self.core.state().is_read_only()
    }

    fn set_read_only(&mut self) {
        self.members.set_read_only();
        self.core.freeze();
    }
}

impl HasItemState for ComplexType {
    fn item_state(&self) -> &ItemState {
        self.core.state()
    }

    fn item_state_mut(&mut self) -> &mut ItemState {
        self.core.state_mut()
    }
}

impl EdmType for ComplexType {
    fn core(&self) -> &TypeCore {
        &self.core
    }
}

/// Principal/dependent property pairing between two association ends
#[derive(Debug, Clone)]
pub struct ReferentialConstraint {
    from_role: String,
    to_role: String,
    from_properties: Vec<String>,
    to_properties: Vec<String>,
    state: ItemState,
}

impl ReferentialConstraint {
    pub fn new(
        from_role: impl Into<String>,
        to_role: impl Into<String>,
        from_properties: Vec<String>,
        to_properties: Vec<String>,
    ) -> Self {
        Self {
            from_role: from_role.into(),
            to_role: to_role.into(),
            from_properties,
            to_properties,
            state: ItemState::new(),
        }
    }

    /// Principal end name.
    pub fn from_role(&self) -> &str {
        &self.from_role
    }

    /// Dependent end name.
    pub fn to_role(&self) -> &str {
        &self.to_role
    }

    pub fn from_properties(&self) -> &[String] {
        &self.from_properties
    }

    pub fn to_properties(&self) -> &[String] {
        &self.to_properties
    }
}

impl MetadataItem for ReferentialConstraint {
    fn identity(&self) -> &str {
        self.state
            .identity_or_init(|| format!("{}_{}", self.from_role, self.to_role))
    }

    fn built_in_type_kind(&self) -> BuiltInTypeKind {
        BuiltInTypeKind::ReferentialConstraint
    }

    fn is_read_only(&self) -> bool {
        self.state.is_read_only()
    }

    fn set_read_only(&mut self) {
        self.state.freeze();
    }
}

/// A relationship between two entity types
#[derive(Debug, Clone)]
pub struct AssociationType {
    core: TypeCore,
    members: MetadataCollection<EdmMember>,
    referential_constraints: MetadataCollection<ReferentialConstraint>,
    is_foreign_key: bool,
}

impl AssociationType {
    pub fn new(name: impl Into<String>, namespace: impl Into<String>, data_space: DataSpace) -> Self {
        Self {
            core: TypeCore::new(name, namespace, data_space),
            members: MetadataCollection::new(),
            referential_constraints: MetadataCollection::new(),
            is_foreign_key: false,
        }
    }

    pub fn type_name(&self) -> TypeName {
        TypeName::new(
            NamedTypeKind::AssociationType,
            self.core.namespace(),
            self.core.name(),
            self.core.data_space(),
        )
    }

    pub fn ends(&self) -> impl Iterator<Item = &AssociationEndMember> {
        self.members.iter().filter_map(EdmMember::as_association_end)
    }

    pub fn end(&self, name: &str) -> Option<&AssociationEndMember> {
        self.members
            .try_get_value(name, false)
            .and_then(EdmMember::as_association_end)
    }

    /// The end that is not `name`.
    pub fn other_end(&self, name: &str) -> Option<&AssociationEndMember> {
        self.ends().find(|end| end.name() != name)
    }

    pub fn add_end(&mut self, end: AssociationEndMember) -> Result<(), MetadataError> {
        add_member_to(&self.core, &mut self.members, EdmMember::AssociationEnd(end))
    }

    /// Existing end with this name, or the one built by `create`.
    ///
    /// Ends may be reached first from the association itself or from a
    /// navigation property on either side; both paths get the same member.
    pub fn get_or_create_end(
        &mut self,
        name: &str,
        create: impl FnOnce() -> AssociationEndMember,
    ) -> Result<&AssociationEndMember, MetadataError> {
        if self.end(name).is_none() {
            self.add_end(create())?;
        }
        self.end(name).ok_or_else(|| {
            MetadataError::internal(format!(
                "end '{}' of association '{}' was not created",
                name,
                self.core.identity()
            ))
        })
    }

    pub fn referential_constraints(&self) -> &MetadataCollection<ReferentialConstraint> {
        &self.referential_constraints
    }

    pub fn add_referential_constraint(
        &mut self,
        constraint: ReferentialConstraint,
    ) -> Result<(), MetadataError> {
        self.core.ensure_mutable("add_referential_constraint")?;
        self.referential_constraints.add(constraint)
    }

    pub fn is_foreign_key(&self) -> bool {
        self.is_foreign_key
    }

    pub fn set_foreign_key(&mut self, is_foreign_key: bool) -> Result<(), MetadataError> {
        self.core.ensure_mutable("set_foreign_key")?;
        self.is_foreign_key = is_foreign_key;
        Ok(())
    }
}

impl MetadataItem for AssociationType {
    fn identity(&self) -> &str {
        self.core.identity()
    }

    fn built_in_type_kind(&self) -> BuiltInTypeKind {
        BuiltInTypeKind::AssociationType
    }

    fn is_read_only(&self) -> bool {
        self.core.state().is_read_only()
    }

    fn set_read_only(&mut self) {
        self.members.set_read_only();
        self.referential_constraints.set_read_only();
        self.core.freeze();
    }
}

impl HasItemState for AssociationType {
    fn item_state(&self) -> &ItemState {
        self.core.state()
    }

    fn item_state_mut(&mut self) -> &mut ItemState {
        self.core.state_mut()
    }
}

impl EdmType for AssociationType {
    fn core(&self) -> &TypeCore {
        &self.core
    }
}
