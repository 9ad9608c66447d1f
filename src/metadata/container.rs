//! Entity containers and the sets they hold.

use super::collection::MetadataCollection;
use super::function::EdmFunction;
use super::item::{BuiltInTypeKind, DataSpace, HasItemState, ItemState, MetadataItem};
use super::types::TypeName;
use crate::error::MetadataError;

/// A set of entities of one entity type (or its subtypes)
#[derive(Debug, Clone)]
pub struct EntitySet {
    name: String,
    entity_type: TypeName,
    schema: Option<String>,
    table: Option<String>,
    defining_query: Option<String>,
    state: ItemState,
}

impl EntitySet {
    pub fn new(name: impl Into<String>, entity_type: TypeName) -> Self {
        Self {
            name: name.into(),
            entity_type,
            schema: None,
            table: None,
            defining_query: None,
            state: ItemState::new(),
        }
    }

    /// Store schema and table backing this set (storage space only).
    pub fn with_store_location(mut self, schema: Option<String>, table: Option<String>) -> Self {
        self.schema = schema;
        self.table = table;
        self
    }

    pub fn with_defining_query(mut self, defining_query: Option<String>) -> Self {
        self.defining_query = defining_query;
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn entity_type(&self) -> &TypeName {
        &self.entity_type
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    pub fn table(&self) -> Option<&str> {
        self.table.as_deref()
    }

    pub fn defining_query(&self) -> Option<&str> {
        self.defining_query.as_deref()
    }
}

/// Binds one role of an association set to an entity set
#[derive(Debug, Clone)]
pub struct AssociationSetEnd {
    role: String,
    entity_set: String,
    state: ItemState,
}

impl AssociationSetEnd {
    pub fn new(role: impl Into<String>, entity_set: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            entity_set: entity_set.into(),
            state: ItemState::new(),
        }
    }

    pub fn role(&self) -> &str {
        &self.role
    }

    pub fn entity_set(&self) -> &str {
        &self.entity_set
    }
}

impl MetadataItem for AssociationSetEnd {
    fn identity(&self) -> &str {
        &self.role
    }

    fn built_in_type_kind(&self) -> BuiltInTypeKind {
        BuiltInTypeKind::AssociationSetEnd
    }

    fn is_read_only(&self) -> bool {
        self.state.is_read_only()
    }

    fn set_read_only(&mut self) {
        self.state.freeze();
    }
}

/// A set of relationship instances of one association type
#[derive(Debug, Clone)]
pub struct AssociationSet {
    name: String,
    association_type: TypeName,
    ends: MetadataCollection<AssociationSetEnd>,
    state: ItemState,
}

impl AssociationSet {
    pub fn new(name: impl Into<String>, association_type: TypeName) -> Self {
        Self {
            name: name.into(),
            association_type,
            ends: MetadataCollection::new(),
            state: ItemState::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn association_type(&self) -> &TypeName {
        &self.association_type
    }

    pub fn ends(&self) -> &MetadataCollection<AssociationSetEnd> {
        &self.ends
    }

    pub fn add_end(&mut self, end: AssociationSetEnd) -> Result<(), MetadataError> {
        self.state.ensure_mutable("AssociationSet::add_end", &self.name)?;
        self.ends.add(end)
    }
}

/// Entity set or association set; both share one name scope in a container
#[derive(Debug, Clone)]
pub enum EntitySetBase {
    EntitySet(EntitySet),
    AssociationSet(AssociationSet),
}

impl EntitySetBase {
    pub fn name(&self) -> &str {
        match self {
            EntitySetBase::EntitySet(set) => set.name(),
            EntitySetBase::AssociationSet(set) => set.name(),
        }
    }

    pub fn as_entity_set(&self) -> Option<&EntitySet> {
        match self {
            EntitySetBase::EntitySet(set) => Some(set),
            EntitySetBase::AssociationSet(_) => None,
        }
    }

    pub fn as_association_set(&self) -> Option<&AssociationSet> {
        match self {
            EntitySetBase::AssociationSet(set) => Some(set),
            EntitySetBase::EntitySet(_) => None,
        }
    }

    fn state(&self) -> &ItemState {
        match self {
            EntitySetBase::EntitySet(set) => &set.state,
            EntitySetBase::AssociationSet(set) => &set.state,
        }
    }

    fn state_mut(&mut self) -> &mut ItemState {
        match self {
            EntitySetBase::EntitySet(set) => &mut set.state,
            EntitySetBase::AssociationSet(set) => &mut set.state,
        }
    }
}

impl MetadataItem for EntitySetBase {
    fn identity(&self) -> &str {
        self.name()
    }

    fn built_in_type_kind(&self) -> BuiltInTypeKind {
        match self {
            EntitySetBase::EntitySet(_) => BuiltInTypeKind::EntitySet,
            EntitySetBase::AssociationSet(_) => BuiltInTypeKind::AssociationSet,
        }
    }

    fn is_read_only(&self) -> bool {
        self.state().is_read_only()
    }

    fn set_read_only(&mut self) {
        if let EntitySetBase::AssociationSet(set) = self {
            set.ends.set_read_only();
        }
        self.state_mut().freeze();
    }
}

impl HasItemState for EntitySetBase {
    fn item_state(&self) -> &ItemState {
        self.state()
    }

    fn item_state_mut(&mut self) -> &mut ItemState {
        self.state_mut()
    }
}

/// Named scope holding entity sets, association sets and function imports
#[derive(Debug, Clone)]
pub struct EntityContainer {
    name: String,
    data_space: DataSpace,
    base_entity_sets: MetadataCollection<EntitySetBase>,
    function_imports: MetadataCollection<EdmFunction>,
    state: ItemState,
}

impl EntityContainer {
    pub fn new(name: impl Into<String>, data_space: DataSpace) -> Self {
        Self {
            name: name.into(),
            data_space,
            base_entity_sets: MetadataCollection::new(),
            function_imports: MetadataCollection::new(),
            state: ItemState::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn data_space(&self) -> DataSpace {
        self.data_space
    }

    pub fn base_entity_sets(&self) -> &MetadataCollection<EntitySetBase> {
        &self.base_entity_sets
    }

    pub fn entity_sets(&self) -> impl Iterator<Item = &EntitySet> {
        self.base_entity_sets
            .iter()
            .filter_map(EntitySetBase::as_entity_set)
    }

    pub fn association_sets(&self) -> impl Iterator<Item = &AssociationSet> {
        self.base_entity_sets
            .iter()
            .filter_map(EntitySetBase::as_association_set)
    }

    pub fn function_imports(&self) -> &MetadataCollection<EdmFunction> {
        &self.function_imports
    }

    pub fn add_entity_set_base(&mut self, set: EntitySetBase) -> Result<(), MetadataError> {
        self.state.ensure_mutable("add_entity_set_base", &self.name)?;
        self.base_entity_sets.add(set)
    }

    pub fn add_function_import(&mut self, function: EdmFunction) -> Result<(), MetadataError> {
        self.state.ensure_mutable("add_function_import", &self.name)?;
        self.function_imports.add(function)
    }

    pub fn try_get_entity_set_by_name(&self, name: &str, ignore_case: bool) -> Option<&EntitySet> {
        self.base_entity_sets
            .try_get_value(name, ignore_case)
            .and_then(EntitySetBase::as_entity_set)
    }

    pub fn get_entity_set_by_name(
        &self,
        name: &str,
        ignore_case: bool,
    ) -> Result<&EntitySet, MetadataError> {
        self.base_entity_sets
            .get_value(name, ignore_case)?
            .as_entity_set()
            .ok_or_else(|| MetadataError::ItemNotFound {
                identity: format!("{}.{}", self.name, name),
                space: self.data_space.to_string(),
            })
    }

    pub fn try_get_relationship_set_by_name(
        &self,
        name: &str,
        ignore_case: bool,
    ) -> Option<&AssociationSet> {
        self.base_entity_sets
            .try_get_value(name, ignore_case)
            .and_then(EntitySetBase::as_association_set)
    }
}

impl MetadataItem for EntityContainer {
    fn identity(&self) -> &str {
        &self.name
    }

    fn built_in_type_kind(&self) -> BuiltInTypeKind {
        BuiltInTypeKind::EntityContainer
    }

    fn is_read_only(&self) -> bool {
        self.state.is_read_only()
    }

    fn set_read_only(&mut self) {
        self.base_entity_sets.set_read_only();
        self.function_imports.set_read_only();
        self.state.freeze();
    }
}

impl HasItemState for EntityContainer {
    fn item_state(&self) -> &ItemState {
        &self.state
    }

    fn item_state_mut(&mut self) -> &mut ItemState {
        &mut self.state
    }
}
