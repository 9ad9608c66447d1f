//! Mapping collections: conceptual to storage (CSSpace) and object to
//! conceptual (OCSpace).

use std::collections::{HashMap, HashSet};
use std::fmt::Write as _;
use std::sync::{Arc, Mutex, PoisonError};

use once_cell::sync::OnceCell;
use sha2::{Digest, Sha256};
use tracing::{debug, trace};

use super::object::ObjectView;
use super::{EdmItemCollection, ItemCollection, ObjectItemCollection, StoreItemCollection};
use crate::error::MetadataError;
use crate::metadata::{
    AssociationType, BuiltInTypeKind, DataSpace, EdmMember, EdmType, EdmTypeRef, EntityContainer,
    EnumType, GlobalItem, MetadataCollection, MetadataItem, PrimitiveType, PrimitiveTypeKind,
    TypeName,
};
use crate::som::{self, MappingDocument};
use crate::util::format_version;

/// A conceptual entity or association set stored in a store entity set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetMapping {
    pub set: String,
    pub store_set: String,
    pub is_association: bool,
}

/// A conceptual container paired with the storage container holding it.
#[derive(Debug, Clone)]
pub struct EntityContainerMapping {
    conceptual: Arc<EntityContainer>,
    storage: Arc<EntityContainer>,
    set_mappings: Vec<SetMapping>,
}

impl EntityContainerMapping {
    pub fn conceptual_container(&self) -> &Arc<EntityContainer> {
        &self.conceptual
    }

    pub fn storage_container(&self) -> &Arc<EntityContainer> {
        &self.storage
    }

    pub fn set_mappings(&self) -> &[SetMapping] {
        &self.set_mappings
    }

    pub fn find_set_mapping(&self, set: &str) -> Option<&SetMapping> {
        self.set_mappings.iter().find(|m| m.set == set)
    }
}

impl MetadataItem for EntityContainerMapping {
    fn identity(&self) -> &str {
        self.conceptual.name()
    }

    fn built_in_type_kind(&self) -> BuiltInTypeKind {
        BuiltInTypeKind::EntityContainerMapping
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn set_read_only(&mut self) {}
}

fn storage_error(message: String) -> MetadataError {
    MetadataError::StorageMapping { message }
}

/// Container mappings between a conceptual and a storage model.
#[derive(Debug)]
pub struct StorageMappingItemCollection {
    edm: Arc<EdmItemCollection>,
    store: Arc<StoreItemCollection>,
    mapping_version: Option<f64>,
    mappings: Vec<EntityContainerMapping>,
    hash: OnceCell<String>,
}

impl StorageMappingItemCollection {
    /// Resolve every container mapping in `documents` against both models.
    ///
    /// Documents must agree on one supported version. Every container and
    /// set named by a mapping must exist, and a conceptual container may be
    /// mapped only once.
    pub fn new(
        edm: Arc<EdmItemCollection>,
        store: Arc<StoreItemCollection>,
        documents: &[MappingDocument],
    ) -> Result<Self, MetadataError> {
        let mut mapping_version = None;
        for document in documents {
            if !som::is_supported_version(document.version) {
                return Err(MetadataError::UnsupportedSchemaVersion {
                    version: document.version,
                });
            }
            match mapping_version {
                Some(version) if version != document.version => {
                    return Err(storage_error(format!(
                        "Mapping documents declare both version {} and version {}",
                        format_version(version),
                        format_version(document.version)
                    )))
                }
                _ => mapping_version = Some(document.version),
            }
        }

        let mut mappings: Vec<EntityContainerMapping> = Vec::new();
        for element in documents.iter().flat_map(|d| &d.container_mappings) {
            if mappings
                .iter()
                .any(|m| m.conceptual.name() == element.conceptual_container)
            {
                return Err(storage_error(format!(
                    "The conceptual container '{}' is mapped more than once",
                    element.conceptual_container
                )));
            }
            let conceptual = edm
                .items()
                .get_entity_container(&element.conceptual_container, false)
                .map_err(|_| {
                    storage_error(format!(
                        "The conceptual container '{}' does not exist",
                        element.conceptual_container
                    ))
                })?;
            let storage = store
                .items()
                .get_entity_container(&element.storage_container, false)
                .map_err(|_| {
                    storage_error(format!(
                        "The storage container '{}' does not exist",
                        element.storage_container
                    ))
                })?;

            let mut set_mappings = Vec::new();
            for set in &element.entity_set_mappings {
                if conceptual.try_get_entity_set_by_name(&set.name, false).is_none() {
                    return Err(storage_error(format!(
                        "The entity set '{}' is not defined in container '{}'",
                        set.name,
                        conceptual.name()
                    )));
                }
                set_mappings.push(verify_store_set(&storage, &set.name, &set.store_entity_set, false)?);
            }
            for set in &element.association_set_mappings {
                if conceptual
                    .try_get_relationship_set_by_name(&set.name, false)
                    .is_none()
                {
                    return Err(storage_error(format!(
                        "The association set '{}' is not defined in container '{}'",
                        set.name,
                        conceptual.name()
                    )));
                }
                set_mappings.push(verify_store_set(&storage, &set.name, &set.store_entity_set, true)?);
            }
            trace!(
                conceptual = conceptual.name(),
                storage = storage.name(),
                sets = set_mappings.len(),
                "resolved container mapping"
            );
            mappings.push(EntityContainerMapping {
                conceptual: Arc::clone(conceptual),
                storage: Arc::clone(storage),
                set_mappings,
            });
        }

        debug!(
            containers = mappings.len(),
            version = ?mapping_version,
            "loaded storage mappings"
        );
        Ok(Self {
            edm,
            store,
            mapping_version,
            mappings,
            hash: OnceCell::new(),
        })
    }

    pub fn data_space(&self) -> DataSpace {
        DataSpace::CSSpace
    }

    pub fn edm_items(&self) -> &Arc<EdmItemCollection> {
        &self.edm
    }

    pub fn store_items(&self) -> &Arc<StoreItemCollection> {
        &self.store
    }

    /// Version declared by the mapping documents, `None` when there were none.
    pub fn mapping_version(&self) -> Option<f64> {
        self.mapping_version
    }

    pub fn container_mappings(&self) -> &[EntityContainerMapping] {
        &self.mappings
    }

    /// Mapping by the name of either of its containers.
    pub fn try_get_container_mapping(&self, container: &str, ignore_case: bool) -> Option<&EntityContainerMapping> {
        let matches = |name: &str| {
            if ignore_case {
                crate::util::eq_ci(name, container)
            } else {
                name == container
            }
        };
        self.mappings
            .iter()
            .find(|m| matches(m.conceptual.name()))
            .or_else(|| self.mappings.iter().find(|m| matches(m.storage.name())))
    }

    pub fn get_container_mapping(&self, container: &str, ignore_case: bool) -> Result<&EntityContainerMapping, MetadataError> {
        self.try_get_container_mapping(container, ignore_case)
            .ok_or_else(|| MetadataError::MappingNotFound {
                identity: container.to_string(),
            })
    }

    /// SHA-256 over a rendering of every mapping, as lowercase hex.
    ///
    /// Mappings render in container name order and sets in set name order,
    /// so document order does not change the hash.
    pub fn compute_mapping_hash(&self) -> &str {
        self.hash.get_or_init(|| {
            let mut rendered = String::new();
            let _ = writeln!(
                rendered,
                "version={}",
                self.mapping_version.map(format_version).unwrap_or_default()
            );
            let mut mappings: Vec<_> = self.mappings.iter().collect();
            mappings.sort_by(|a, b| a.conceptual.name().cmp(b.conceptual.name()));
            for mapping in mappings {
                let _ = writeln!(
                    rendered,
                    "container {}={}",
                    mapping.conceptual.name(),
                    mapping.storage.name()
                );
                let mut sets: Vec<_> = mapping.set_mappings.iter().collect();
                sets.sort_by(|a, b| a.set.cmp(&b.set));
                for set in sets {
                    let kind = if set.is_association { "association" } else { "entity" };
                    let _ = writeln!(rendered, "  {} {}={}", kind, set.set, set.store_set);
                }
            }
            hex::encode(Sha256::digest(rendered.as_bytes()))
        })
    }
}

fn verify_store_set(
    storage: &EntityContainer,
    set: &str,
    store_set: &str,
    is_association: bool,
) -> Result<SetMapping, MetadataError> {
    if storage.try_get_entity_set_by_name(store_set, false).is_none() {
        return Err(storage_error(format!(
            "The store entity set '{}' mapped from '{}' is not defined in container '{}'",
            store_set,
            set,
            storage.name()
        )));
    }
    Ok(SetMapping {
        set: set.to_string(),
        store_set: store_set.to_string(),
        is_association,
    })
}

/// How one conceptual member is carried by an object-space member.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MemberMappingKind {
    Scalar,
    Complex,
    Navigation,
    AssociationEnd,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectMemberMapping {
    pub kind: MemberMappingKind,
    pub edm_member: String,
    pub clr_member: String,
}

/// A conceptual type paired with the object-space type carrying it.
#[derive(Debug, Clone)]
pub struct ObjectTypeMapping {
    edm_type: GlobalItem,
    clr_type: GlobalItem,
    members: Vec<ObjectMemberMapping>,
}

impl ObjectTypeMapping {
    pub fn edm_type(&self) -> &GlobalItem {
        &self.edm_type
    }

    pub fn clr_type(&self) -> &GlobalItem {
        &self.clr_type
    }

    pub fn member_mappings(&self) -> &[ObjectMemberMapping] {
        &self.members
    }

    pub fn member_mapping(&self, edm_member: &str) -> Option<&ObjectMemberMapping> {
        self.members.iter().find(|m| m.edm_member == edm_member)
    }
}

impl MetadataItem for ObjectTypeMapping {
    fn identity(&self) -> &str {
        self.clr_type.identity()
    }

    fn built_in_type_kind(&self) -> BuiltInTypeKind {
        BuiltInTypeKind::ObjectTypeMapping
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn set_read_only(&mut self) {}
}

fn mapping_error(message: String) -> MetadataError {
    MetadataError::ObjectMapping { message }
}

#[derive(Debug, Default)]
struct MappingIndex {
    by_edm: HashMap<String, Arc<ObjectTypeMapping>>,
    by_clr: HashMap<String, Arc<ObjectTypeMapping>>,
}

/// Object to conceptual type mappings, built on first request by pairing
/// members by name.
#[derive(Debug)]
pub struct DefaultObjectMappingItemCollection {
    edm: Arc<EdmItemCollection>,
    objects: Arc<ObjectItemCollection>,
    index: Mutex<MappingIndex>,
}

impl DefaultObjectMappingItemCollection {
    pub fn new(edm: Arc<EdmItemCollection>, objects: Arc<ObjectItemCollection>) -> Self {
        Self {
            edm,
            objects,
            index: Mutex::new(MappingIndex::default()),
        }
    }

    pub fn data_space(&self) -> DataSpace {
        DataSpace::OCSpace
    }

    pub fn edm_items(&self) -> &Arc<EdmItemCollection> {
        &self.edm
    }

    pub fn object_items(&self) -> &Arc<ObjectItemCollection> {
        &self.objects
    }

    pub fn get_map(&self, identity: &str, space: DataSpace, ignore_case: bool) -> Result<Arc<ObjectTypeMapping>, MetadataError> {
        self.try_get_map(identity, space, ignore_case)?
            .ok_or_else(|| MetadataError::MappingNotFound {
                identity: identity.to_string(),
            })
    }

    /// Mapping for a conceptual (`CSpace`) or object (`OSpace`) type.
    ///
    /// `None` when the type or its counterpart does not exist. A pair that
    /// exists but does not line up is an error.
    pub fn try_get_map(
        &self,
        identity: &str,
        space: DataSpace,
        ignore_case: bool,
    ) -> Result<Option<Arc<ObjectTypeMapping>>, MetadataError> {
        let pair = match space {
            DataSpace::CSpace => self.pair_from_edm(identity, ignore_case)?,
            DataSpace::OSpace => self.pair_from_clr(identity, ignore_case),
            other => {
                return Err(MetadataError::InvalidDataSpace {
                    operation: "try_get_map",
                    identity: identity.to_string(),
                    expected: DataSpace::CSpace,
                    actual: other,
                })
            }
        };
        let Some((edm_type, clr_type)) = pair else {
            return Ok(None);
        };
        if let Some(cached) = self.cached(edm_type.identity()) {
            return Ok(Some(cached));
        }

        let built = self.objects.with_view(|objects| {
            let mut builder = MappingBuilder {
                edm: self.edm.items(),
                objects,
                cached: &self.index,
                built: Vec::new(),
                in_progress: HashSet::new(),
            };
            builder.load(&edm_type, &clr_type)?;
            Ok::<_, MetadataError>(builder.built)
        })?;

        let mut index = self.index.lock().unwrap_or_else(PoisonError::into_inner);
        for mapping in built {
            let mapping = Arc::new(mapping);
            let edm_identity = mapping.edm_type.identity().to_string();
            let clr_identity = mapping.clr_type.identity().to_string();
            let kept = Arc::clone(index.by_edm.entry(edm_identity).or_insert(mapping));
            index.by_clr.entry(clr_identity).or_insert(kept);
        }
        debug!(edm_type = edm_type.identity(), clr_type = clr_type.identity(), "built object mapping");
        Ok(index.by_edm.get(edm_type.identity()).cloned())
    }

    fn cached(&self, edm_identity: &str) -> Option<Arc<ObjectTypeMapping>> {
        self.index
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .by_edm
            .get(edm_identity)
            .cloned()
    }

    fn pair_from_edm(&self, identity: &str, ignore_case: bool) -> Result<Option<(GlobalItem, GlobalItem)>, MetadataError> {
        let Some(edm_type) = self.edm.items().try_get_global(identity, ignore_case).cloned() else {
            return Ok(None);
        };
        let clr_type = match &edm_type {
            GlobalItem::PrimitiveType(primitive) => self
                .objects
                .get_mapped_primitive_type(primitive.kind())
                .map(GlobalItem::PrimitiveType),
            _ => self.objects.try_get_o_space_type(&edm_type)?,
        };
        Ok(clr_type.map(|clr_type| (edm_type, clr_type)))
    }

    fn pair_from_clr(&self, identity: &str, ignore_case: bool) -> Option<(GlobalItem, GlobalItem)> {
        let (clr_type, edm_identity) = self.objects.with_view(|objects| {
            let clr_type = objects.items.try_get_global(identity, ignore_case)?.clone();
            let edm_identity = objects.c_identity(clr_type.identity()).to_string();
            Some((clr_type, edm_identity))
        })?;
        let edm_type = match &clr_type {
            GlobalItem::PrimitiveType(primitive) => self
                .edm
                .get_mapped_primitive_type(primitive.kind())
                .map(GlobalItem::PrimitiveType),
            _ => self.edm.items().try_get_global(&edm_identity, false).cloned(),
        }?;
        Some((edm_type, clr_type))
    }
}

/// Spatial subtypes compare as their root type.
fn normalize_spatial(kind: PrimitiveTypeKind) -> PrimitiveTypeKind {
    if kind.is_geography() {
        PrimitiveTypeKind::Geography
    } else if kind.is_geometry() {
        PrimitiveTypeKind::Geometry
    } else {
        kind
    }
}

/// Builds a type mapping along with the mappings of every type it reaches
/// through complex properties, navigation properties and association ends.
struct MappingBuilder<'a> {
    edm: &'a ItemCollection,
    objects: ObjectView<'a>,
    cached: &'a Mutex<MappingIndex>,
    built: Vec<ObjectTypeMapping>,
    in_progress: HashSet<String>,
}

impl MappingBuilder<'_> {
    fn is_known(&self, edm_identity: &str) -> bool {
        self.in_progress.contains(edm_identity)
            || self
                .cached
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .by_edm
                .contains_key(edm_identity)
    }

    /// Map the pair of types named by identity, unless already mapped.
    fn load_by_identity(&mut self, edm_identity: &str, clr_identity: &str) -> Result<(), MetadataError> {
        if self.is_known(edm_identity) {
            return Ok(());
        }
        let edm_type = self.edm.try_get_global(edm_identity, false).cloned();
        let clr_type = self.objects.items.try_get_global(clr_identity, false).cloned();
        match (edm_type, clr_type) {
            (Some(edm_type), Some(clr_type)) => self.load(&edm_type, &clr_type),
            _ => Err(mapping_error(format!(
                "No mapping between '{}' and '{}' can be built",
                edm_identity, clr_identity
            ))),
        }
    }

    fn load(&mut self, edm_type: &GlobalItem, clr_type: &GlobalItem) -> Result<(), MetadataError> {
        let edm_identity = edm_type.identity().to_string();
        if self.is_known(&edm_identity) {
            return Ok(());
        }
        let is_enum = |item: &GlobalItem| matches!(item, GlobalItem::EnumType(_));
        if is_enum(edm_type) != is_enum(clr_type) {
            return Err(mapping_error(format!(
                "The enum type '{}' cannot be mapped to the non-enum type '{}'",
                if is_enum(edm_type) { edm_type.identity() } else { clr_type.identity() },
                if is_enum(edm_type) { clr_type.identity() } else { edm_type.identity() },
            )));
        }
        let is_abstract = |item: &GlobalItem| {
            item.as_named_type()
                .is_some_and(|named| named.core().is_abstract())
        };
        if is_abstract(edm_type) != is_abstract(clr_type) {
            return Err(mapping_error(format!(
                "The abstractness of '{}' and '{}' differs",
                edm_type.identity(),
                clr_type.identity()
            )));
        }

        self.in_progress.insert(edm_identity.clone());
        let members = match (edm_type, clr_type) {
            (GlobalItem::PrimitiveType(c), GlobalItem::PrimitiveType(o)) => {
                if normalize_spatial(c.kind()) != normalize_spatial(o.kind()) {
                    return Err(mapping_error(format!(
                        "The primitive type '{}' cannot be mapped to '{}'",
                        c.identity(),
                        o.identity()
                    )));
                }
                Vec::new()
            }
            (GlobalItem::EnumType(c), GlobalItem::EnumType(o)) => {
                validate_enum_mapping(c, o)?;
                Vec::new()
            }
            (GlobalItem::EntityType(c), GlobalItem::EntityType(o)) => {
                match (c.base_type(), o.base_type()) {
                    (None, None) => {}
                    (Some(c_base), Some(o_base)) => {
                        if self.objects.c_identity(o_base.identity()) != c_base.identity() {
                            return Err(mapping_error(format!(
                                "The base type of '{}' does not map to the base type of '{}'",
                                o.identity(),
                                c.identity()
                            )));
                        }
                        self.load_by_identity(c_base.identity(), o_base.identity())?;
                    }
                    _ => {
                        return Err(mapping_error(format!(
                            "Only one of '{}' and '{}' has a base type",
                            c.identity(),
                            o.identity()
                        )))
                    }
                }
                self.load_structural(c.identity(), c.members(), o.identity(), o.members())?
            }
            (GlobalItem::ComplexType(c), GlobalItem::ComplexType(o)) => {
                self.load_structural(c.identity(), c.members(), o.identity(), o.members())?
            }
            (GlobalItem::AssociationType(c), GlobalItem::AssociationType(o)) => self.load_association(c, o)?,
            _ => {
                return Err(mapping_error(format!(
                    "The type '{}' cannot be mapped to '{}' of a different kind",
                    edm_type.identity(),
                    clr_type.identity()
                )))
            }
        };
        self.in_progress.remove(&edm_identity);
        trace!(edm_type = %edm_identity, clr_type = clr_type.identity(), "mapped type");
        self.built.push(ObjectTypeMapping {
            edm_type: edm_type.clone(),
            clr_type: clr_type.clone(),
            members,
        });
        Ok(())
    }

    fn load_structural(
        &mut self,
        edm_identity: &str,
        edm_members: &MetadataCollection<EdmMember>,
        clr_identity: &str,
        clr_members: &MetadataCollection<EdmMember>,
    ) -> Result<Vec<ObjectMemberMapping>, MetadataError> {
        if edm_members.len() != clr_members.len() {
            return Err(mapping_error(format!(
                "The number of members of '{}' and '{}' differs",
                edm_identity, clr_identity
            )));
        }
        if let Some(extra) = clr_members.iter().find(|m| !edm_members.contains(m.name())) {
            return Err(mapping_error(format!(
                "The member '{}' of '{}' has no counterpart in '{}'",
                extra.name(),
                clr_identity,
                edm_identity
            )));
        }

        let mut mappings = Vec::with_capacity(edm_members.len());
        for edm_member in edm_members.iter() {
            let clr_member = clr_members.try_get_value(edm_member.name(), false).ok_or_else(|| {
                mapping_error(format!(
                    "The member '{}' of '{}' has no counterpart in '{}'",
                    edm_member.name(),
                    edm_identity,
                    clr_identity
                ))
            })?;
            let kind = self.validate_members_match(edm_identity, edm_member, clr_identity, clr_member)?;
            if let (EdmMember::Navigation(c), EdmMember::Navigation(o)) = (edm_member, clr_member) {
                self.load_by_identity(c.relationship_type().identity(), o.relationship_type().identity())?;
            }
            mappings.push(ObjectMemberMapping {
                kind,
                edm_member: edm_member.name().to_string(),
                clr_member: clr_member.name().to_string(),
            });
        }
        Ok(mappings)
    }

    fn validate_members_match(
        &mut self,
        edm_identity: &str,
        edm_member: &EdmMember,
        clr_identity: &str,
        clr_member: &EdmMember,
    ) -> Result<MemberMappingKind, MetadataError> {
        let mismatch = || {
            mapping_error(format!(
                "The type of member '{}' of '{}' does not match member '{}' of '{}'",
                edm_member.name(),
                edm_identity,
                clr_member.name(),
                clr_identity
            ))
        };
        if edm_member.built_in_type_kind() != clr_member.built_in_type_kind() {
            return Err(mismatch());
        }
        let edm_type = member_target(edm_member.type_usage().edm_type());
        let clr_type = member_target(clr_member.type_usage().edm_type());

        match (edm_type, clr_type) {
            (MemberTarget::Primitive(c), MemberTarget::Primitive(o)) => {
                if normalize_spatial(c.kind()) != normalize_spatial(o.kind()) {
                    return Err(mismatch());
                }
                Ok(MemberMappingKind::Scalar)
            }
            (MemberTarget::Named(c), MemberTarget::Named(o)) if c.kind() == o.kind() => {
                if self.objects.c_identity(o.identity()) != c.identity() {
                    return Err(mismatch());
                }
                let (c, o) = (c.identity().to_string(), o.identity().to_string());
                self.load_by_identity(&c, &o)?;
                Ok(match edm_member {
                    EdmMember::AssociationEnd(_) => MemberMappingKind::AssociationEnd,
                    EdmMember::Navigation(_) => MemberMappingKind::Navigation,
                    EdmMember::Property(_) => {
                        if matches!(self.edm.try_get_global(&c, false), Some(GlobalItem::EnumType(_))) {
                            MemberMappingKind::Scalar
                        } else {
                            MemberMappingKind::Complex
                        }
                    }
                })
            }
            _ => Err(mismatch()),
        }
    }

    fn load_association(
        &mut self,
        edm: &AssociationType,
        clr: &AssociationType,
    ) -> Result<Vec<ObjectMemberMapping>, MetadataError> {
        let mut mappings = Vec::new();
        for edm_end in edm.ends() {
            let clr_end = clr.end(edm_end.name()).ok_or_else(|| {
                mapping_error(format!(
                    "The end '{}' of '{}' has no counterpart in '{}'",
                    edm_end.name(),
                    edm.identity(),
                    clr.identity()
                ))
            })?;
            if edm_end.multiplicity() != clr_end.multiplicity() {
                return Err(mapping_error(format!(
                    "The multiplicity of end '{}' of '{}' differs from '{}'",
                    edm_end.name(),
                    edm.identity(),
                    clr.identity()
                )));
            }
            match (edm_end.entity_type(), clr_end.entity_type()) {
                (Some(c), Some(o)) if self.objects.c_identity(o.identity()) == c.identity() => {
                    let (c, o) = (c.identity().to_string(), o.identity().to_string());
                    self.load_by_identity(&c, &o)?;
                }
                _ => {
                    return Err(mapping_error(format!(
                        "The type of end '{}' of '{}' does not match '{}'",
                        edm_end.name(),
                        edm.identity(),
                        clr.identity()
                    )))
                }
            }
            mappings.push(ObjectMemberMapping {
                kind: MemberMappingKind::AssociationEnd,
                edm_member: edm_end.name().to_string(),
                clr_member: clr_end.name().to_string(),
            });
        }
        Ok(mappings)
    }
}

/// What a member's type comes down to once collections and references are
/// looked through.
enum MemberTarget<'a> {
    Primitive(&'a PrimitiveType),
    Named(&'a TypeName),
    Other,
}

fn member_target(edm_type: &EdmTypeRef) -> MemberTarget<'_> {
    match edm_type {
        EdmTypeRef::Primitive(primitive) => MemberTarget::Primitive(primitive),
        EdmTypeRef::Named(name) => MemberTarget::Named(name),
        EdmTypeRef::Collection(collection) => member_target(collection.element_type().edm_type()),
        EdmTypeRef::Ref(reference) => MemberTarget::Named(reference.element_type()),
        _ => MemberTarget::Other,
    }
}

/// Underlying types must agree, and every conceptual member must exist in
/// the object-space enum with the same value.
fn validate_enum_mapping(edm: &EnumType, clr: &EnumType) -> Result<(), MetadataError> {
    if edm.underlying_type().kind() != clr.underlying_type().kind() {
        return Err(mapping_error(format!(
            "The underlying type '{}' of '{}' does not match the underlying type '{}' of '{}'",
            edm.underlying_type().name(),
            edm.identity(),
            clr.underlying_type().name(),
            clr.identity()
        )));
    }
    let sorted = |t: &EnumType| {
        let mut members: Vec<(i64, String)> = t
            .members()
            .iter()
            .map(|m| (m.value(), m.name().to_string()))
            .collect();
        members.sort();
        members
    };
    let clr_members = sorted(clr);
    let mut remaining = clr_members.iter();
    for member in sorted(edm) {
        if !remaining.any(|candidate| *candidate == member) {
            return Err(mapping_error(format!(
                "The enum type '{}' has no member '{}' with value {} as declared by '{}'",
                clr.identity(),
                member.1,
                member.0,
                edm.identity()
            )));
        }
    }
    Ok(())
}
