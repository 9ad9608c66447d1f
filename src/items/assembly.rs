//! CLR assemblies as seen by the object-space loader, and the loader itself.
//!
//! An assembly is a named set of type descriptors plus the names of the
//! assemblies it references. Descriptors say which conceptual type a CLR type
//! stands for; the loader turns them into frozen object-space items.

use std::collections::{HashMap, HashSet};
use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::{EdmItemCollection, ItemCollection};
use crate::error::{EdmSchemaError, ErrorCode, MetadataError};
use crate::metadata::{
    AssociationEndMember, AssociationType, ComplexType, DataSpace, EdmProperty, EdmTypeRef,
    EntityType, EnumMember, EnumType, FacetValues, GlobalItem, MetadataItem, NamedTypeKind,
    NamedTypeRef, NavigationProperty, RelationshipMultiplicity, TypeLookup, TypeName, TypeUsage,
};
use crate::provider::ClrPrimitiveTypes;
use crate::som::loader::read_document_text;
use crate::util::qualify;

/// Underlying type of an enum descriptor that does not name one.
const DEFAULT_ENUM_UNDERLYING_TYPE: &str = "System.Int32";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ClrTypeKind {
    Entity,
    Complex,
    Enum,
}

/// Scalar, complex or enum property of a CLR type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClrProperty {
    pub name: String,
    /// CLR primitive (`System.Int32`) or the full name of a complex or enum
    /// type loaded alongside.
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default = "default_true")]
    pub nullable: bool,
    #[serde(default)]
    pub is_key: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClrNavigation {
    pub name: String,
    /// Conceptual association the property navigates.
    pub relationship: String,
    pub from_role: String,
    pub to_role: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClrEnumMember {
    pub name: String,
    pub value: i64,
}

/// One CLR type with the conceptual type it maps to.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClrTypeDescriptor {
    pub namespace: String,
    pub name: String,
    pub kind: ClrTypeKind,
    /// Identity of the conceptual type this CLR type stands for.
    pub edm_type: String,
    #[serde(default)]
    pub base_type: Option<String>,
    #[serde(default)]
    pub is_abstract: bool,
    #[serde(default)]
    pub properties: Vec<ClrProperty>,
    #[serde(default)]
    pub navigation_properties: Vec<ClrNavigation>,
    #[serde(default)]
    pub members: Vec<ClrEnumMember>,
    #[serde(default)]
    pub underlying_type: Option<String>,
    #[serde(default)]
    pub is_flags: bool,
}

impl ClrTypeDescriptor {
    pub fn full_name(&self) -> String {
        qualify(&self.namespace, &self.name)
    }
}

/// A CLR assembly: its types and the assemblies it references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ClrAssembly {
    pub name: String,
    #[serde(default)]
    pub referenced: Vec<String>,
    /// Carries the marker that opts its references into implicit loading.
    #[serde(default)]
    pub has_schema_attribute: bool,
    #[serde(default)]
    pub types: Vec<ClrTypeDescriptor>,
}

impl ClrAssembly {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            referenced: Vec::new(),
            has_schema_attribute: false,
            types: Vec::new(),
        }
    }

    /// Read an assembly description from a JSON file.
    pub fn from_file(path: &Path) -> Result<Self, MetadataError> {
        let text = read_document_text(path)?;
        serde_json::from_str(&text).map_err(|source| MetadataError::DocumentParseError {
            path: path.to_path_buf(),
            source,
        })
    }

    pub fn find_type(&self, full_name: &str) -> Option<&ClrTypeDescriptor> {
        self.types.iter().find(|t| t.full_name() == full_name)
    }
}

/// A CLR type by declaring assembly and full name.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ClrTypeHandle {
    pub assembly: String,
    pub full_name: String,
}

impl ClrTypeHandle {
    pub fn new(assembly: impl Into<String>, full_name: impl Into<String>) -> Self {
        Self {
            assembly: assembly.into(),
            full_name: full_name.into(),
        }
    }
}

impl fmt::Display for ClrTypeHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}, {}", self.full_name, self.assembly)
    }
}

/// Finds assemblies by name.
pub trait AssemblyResolver: fmt::Debug + Send + Sync {
    fn resolve(&self, name: &str) -> Option<Arc<ClrAssembly>>;
}

/// Assemblies known up front, by name.
#[derive(Debug, Default)]
pub struct AssemblyCatalog {
    assemblies: HashMap<String, Arc<ClrAssembly>>,
}

impl AssemblyCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an assembly, replacing any earlier one of the same name.
    pub fn add(&mut self, assembly: ClrAssembly) -> Arc<ClrAssembly> {
        let assembly = Arc::new(assembly);
        self.assemblies
            .insert(assembly.name.clone(), Arc::clone(&assembly));
        assembly
    }

    pub fn len(&self) -> usize {
        self.assemblies.len()
    }

    pub fn is_empty(&self) -> bool {
        self.assemblies.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.assemblies.keys().map(String::as_str)
    }
}

impl AssemblyResolver for AssemblyCatalog {
    fn resolve(&self, name: &str) -> Option<Arc<ClrAssembly>> {
        self.assemblies.get(name).cloned()
    }
}

/// What was learned about one assembly.
#[derive(Debug, Clone)]
pub(crate) struct KnownAssemblyEntry {
    /// Object-space identities loaded from the assembly.
    pub types: Vec<String>,
    pub referenced_loaded: bool,
    cookie: u64,
    with_edm: bool,
}

/// Assemblies already scanned, so repeated lookups do not scan again.
///
/// Entries only count under the loader cookie they were recorded with, and
/// an entry recorded without a conceptual model does not satisfy a load that
/// has one.
#[derive(Debug, Clone, Default)]
pub(crate) struct KnownAssemblies {
    entries: HashMap<String, KnownAssemblyEntry>,
}

impl KnownAssemblies {
    pub fn get(&self, name: &str, cookie: u64, with_edm: bool) -> Option<&KnownAssemblyEntry> {
        self.entries
            .get(name)
            .filter(|entry| entry.cookie == cookie && (entry.with_edm || !with_edm))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    fn record(&mut self, name: &str, types: Vec<String>, referenced_loaded: bool, cookie: u64, with_edm: bool) {
        let entry = self
            .entries
            .entry(name.to_string())
            .or_insert_with(|| KnownAssemblyEntry {
                types: Vec::new(),
                referenced_loaded: false,
                cookie,
                with_edm,
            });
        if entry.cookie != cookie {
            entry.types.clear();
            entry.referenced_loaded = false;
        }
        for identity in types {
            if !entry.types.contains(&identity) {
                entry.types.push(identity);
            }
        }
        entry.referenced_loaded |= referenced_loaded;
        entry.cookie = cookie;
        entry.with_edm |= with_edm;
    }
}

/// A frozen object-space item ready to be registered.
#[derive(Debug, Clone)]
pub(crate) struct LoadedClrType {
    pub item: GlobalItem,
    /// Conceptual identity for entity, complex and enum types.
    pub edm_type: Option<String>,
    pub clr: Option<ClrTypeHandle>,
}

/// Everything a load reads but does not change.
pub(crate) struct AssemblyLoad<'a> {
    pub resolver: &'a dyn AssemblyResolver,
    pub edm: Option<&'a EdmItemCollection>,
    pub existing: &'a ItemCollection,
    /// Conceptual identity to the object-space type already mapped to it.
    pub oc_mapping: &'a HashMap<String, GlobalItem>,
    pub primitives: &'a ClrPrimitiveTypes,
    pub cookie: u64,
}

impl<'a> AssemblyLoad<'a> {
    /// Types of `assembly`, and with `load_referenced` of every assembly it
    /// references transitively, that are not registered yet.
    ///
    /// `known` is updated with every assembly visited; the caller publishes
    /// it only once the types are registered.
    pub fn load(
        &self,
        assembly: &Arc<ClrAssembly>,
        load_referenced: bool,
        known: &mut KnownAssemblies,
    ) -> Result<Vec<LoadedClrType>, MetadataError> {
        let with_edm = self.edm.is_some();
        let mut visited = Vec::new();
        let mut scan = Vec::new();
        self.collect(assembly, load_referenced, known, &mut visited, &mut scan);
        debug!(
            assembly = %assembly.name,
            load_referenced,
            scanned = scan.len(),
            "loading object-space types"
        );

        let loaded = ClrTypeBuilder::new(self, &scan).build()?;
        for name in &visited {
            // Types registered by an earlier generation still belong to the
            // assembly.
            let types = scan
                .iter()
                .filter(|a| &a.name == name)
                .flat_map(|a| a.types.iter().map(ClrTypeDescriptor::full_name))
                .filter(|identity| {
                    self.existing.contains(identity)
                        || loaded.iter().any(|t| t.item.identity() == identity)
                })
                .collect();
            known.record(name, types, load_referenced, self.cookie, with_edm);
        }
        Ok(loaded)
    }

    fn collect(
        &self,
        assembly: &Arc<ClrAssembly>,
        load_referenced: bool,
        known: &KnownAssemblies,
        visited: &mut Vec<String>,
        scan: &mut Vec<Arc<ClrAssembly>>,
    ) {
        if visited.contains(&assembly.name) {
            return;
        }
        visited.push(assembly.name.clone());
        match known.get(&assembly.name, self.cookie, self.edm.is_some()) {
            Some(entry) if !load_referenced || entry.referenced_loaded => return,
            // Types are in already; only its references still need a look.
            Some(_) => {}
            None => scan.push(Arc::clone(assembly)),
        }
        if !load_referenced {
            return;
        }
        for name in &assembly.referenced {
            match self.resolver.resolve(name) {
                Some(referenced) => self.collect(&referenced, true, known, visited, scan),
                None => trace!(assembly = %name, "referenced assembly not found"),
            }
        }
    }
}

#[derive(Debug)]
enum StagedClr {
    Entity(EntityType),
    Complex(ComplexType),
    Enum(EnumType),
    Association(AssociationType),
}

impl StagedClr {
    fn as_named(&self) -> NamedTypeRef<'_> {
        match self {
            StagedClr::Entity(t) => NamedTypeRef::Entity(t),
            StagedClr::Complex(t) => NamedTypeRef::Complex(t),
            StagedClr::Enum(t) => NamedTypeRef::Enum(t),
            StagedClr::Association(t) => NamedTypeRef::Association(t),
        }
    }

    fn freeze(self) -> GlobalItem {
        match self {
            StagedClr::Entity(mut t) => {
                t.set_read_only();
                GlobalItem::EntityType(Arc::new(t))
            }
            StagedClr::Complex(mut t) => {
                t.set_read_only();
                GlobalItem::ComplexType(Arc::new(t))
            }
            StagedClr::Enum(mut t) => {
                t.set_read_only();
                GlobalItem::EnumType(Arc::new(t))
            }
            StagedClr::Association(mut t) => {
                t.set_read_only();
                GlobalItem::AssociationType(Arc::new(t))
            }
        }
    }
}

#[derive(Debug)]
struct StagedType {
    item: StagedClr,
    edm_type: Option<String>,
    clr: Option<ClrTypeHandle>,
}

/// Builds object-space types from the descriptors of a batch of assemblies.
///
/// Types are staged mutable and built on demand, base types and property
/// types first; navigation properties are attached once every type exists.
struct ClrTypeBuilder<'a> {
    load: &'a AssemblyLoad<'a>,
    descriptors: HashMap<String, (&'a ClrTypeDescriptor, &'a str)>,
    order: Vec<String>,
    staged: Vec<StagedType>,
    index: HashMap<String, usize>,
    in_progress: HashSet<String>,
    errors: Vec<EdmSchemaError>,
}

impl TypeLookup for ClrTypeBuilder<'_> {
    fn find_named_type(&self, identity: &str) -> Option<NamedTypeRef<'_>> {
        match self.index.get(identity) {
            Some(&slot) => self.staged.get(slot).map(|t| t.item.as_named()),
            None => self.load.existing.find_named_type(identity),
        }
    }
}

impl<'a> ClrTypeBuilder<'a> {
    fn new(load: &'a AssemblyLoad<'a>, assemblies: &'a [Arc<ClrAssembly>]) -> Self {
        let mut descriptors = HashMap::new();
        let mut order = Vec::new();
        for assembly in assemblies {
            for descriptor in &assembly.types {
                let full_name = descriptor.full_name();
                if descriptors
                    .insert(full_name.clone(), (descriptor, assembly.name.as_str()))
                    .is_none()
                {
                    order.push(full_name);
                }
            }
        }
        Self {
            load,
            descriptors,
            order,
            staged: Vec::new(),
            index: HashMap::new(),
            in_progress: HashSet::new(),
            errors: Vec::new(),
        }
    }

    fn build(mut self) -> Result<Vec<LoadedClrType>, MetadataError> {
        let order = std::mem::take(&mut self.order);
        for full_name in &order {
            self.build_type(full_name)?;
        }
        for full_name in &order {
            self.attach_navigation_properties(full_name)?;
        }
        if !self.errors.is_empty() {
            return Err(MetadataError::Schema {
                errors: self.errors,
            });
        }
        Ok(self
            .staged
            .into_iter()
            .map(|staged| LoadedClrType {
                item: staged.item.freeze(),
                edm_type: staged.edm_type,
                clr: staged.clr,
            })
            .collect())
    }

    fn error(&mut self, code: ErrorCode, location: &str, message: String) {
        self.errors
            .push(EdmSchemaError::error(message, code).at(location));
    }

    fn stage(&mut self, staged: StagedType) -> TypeName {
        let name = staged.item.as_named().type_name();
        self.index
            .insert(name.identity().to_string(), self.staged.len());
        self.staged.push(staged);
        name
    }

    /// Object-space type for a CLR full name, building it if the batch
    /// declares it. `None` when it cannot be built; the reason is recorded.
    fn build_type(&mut self, full_name: &str) -> Result<Option<TypeName>, MetadataError> {
        if let Some(named) = self.find_named_type(full_name) {
            return Ok(Some(named.type_name()));
        }
        let Some(&(descriptor, assembly)) = self.descriptors.get(full_name) else {
            return Ok(None);
        };
        if !self.in_progress.insert(full_name.to_string()) {
            self.error(
                ErrorCode::CycleInTypeHierarchy,
                full_name,
                format!("Type '{}' is part of a cycle in its type hierarchy", full_name),
            );
            return Ok(None);
        }
        let item = match descriptor.kind {
            ClrTypeKind::Entity => self.build_entity(descriptor)?.map(StagedClr::Entity),
            ClrTypeKind::Complex => self.build_complex(descriptor)?.map(StagedClr::Complex),
            ClrTypeKind::Enum => self.build_enum(descriptor)?.map(StagedClr::Enum),
        };
        self.in_progress.remove(full_name);
        trace!(clr_type = full_name, built = item.is_some(), "staged object-space type");
        Ok(item.map(|item| {
            self.stage(StagedType {
                item,
                edm_type: Some(descriptor.edm_type.clone()),
                clr: Some(ClrTypeHandle::new(assembly, full_name)),
            })
        }))
    }

    fn build_entity(&mut self, descriptor: &ClrTypeDescriptor) -> Result<Option<EntityType>, MetadataError> {
        let full_name = descriptor.full_name();
        let base = match &descriptor.base_type {
            Some(base) => match self.build_type(base)? {
                Some(name) if name.kind() == NamedTypeKind::EntityType => Some(name),
                _ => {
                    self.error(
                        ErrorCode::InvalidPropertyType,
                        &full_name,
                        format!("Base type '{}' of '{}' is not a loaded entity type", base, full_name),
                    );
                    return Ok(None);
                }
            },
            None => None,
        };

        let mut entity = EntityType::new(&descriptor.name, &descriptor.namespace, DataSpace::OSpace);
        entity.set_abstract(descriptor.is_abstract)?;
        for property in &descriptor.properties {
            let Some(usage) = self.property_usage(&full_name, property)? else {
                continue;
            };
            entity.add_property(EdmProperty::new(&property.name, usage))?;
            if property.is_key {
                entity.add_key_member(&property.name, &*self)?;
            }
        }
        match entity.set_base_type(base, &*self) {
            Ok(()) => Ok(Some(entity)),
            Err(MetadataError::KeysOnMultipleLevels { type_name, base_type }) => {
                self.error(
                    ErrorCode::InvalidKey,
                    &full_name,
                    format!(
                        "Type '{}' declares a key although its base type '{}' already has one",
                        type_name, base_type
                    ),
                );
                Ok(None)
            }
            Err(MetadataError::CyclicBaseType { type_name, .. }) => {
                self.error(
                    ErrorCode::CycleInTypeHierarchy,
                    &full_name,
                    format!("Type '{}' is part of a cycle in its type hierarchy", type_name),
                );
                Ok(None)
            }
            Err(other) => Err(other),
        }
    }

    fn build_complex(&mut self, descriptor: &ClrTypeDescriptor) -> Result<Option<ComplexType>, MetadataError> {
        let full_name = descriptor.full_name();
        let mut complex = ComplexType::new(&descriptor.name, &descriptor.namespace, DataSpace::OSpace);
        for property in &descriptor.properties {
            if let Some(usage) = self.property_usage(&full_name, property)? {
                complex.add_property(EdmProperty::new(&property.name, usage))?;
            }
        }
        Ok(Some(complex))
    }

    fn build_enum(&mut self, descriptor: &ClrTypeDescriptor) -> Result<Option<EnumType>, MetadataError> {
        let full_name = descriptor.full_name();
        let underlying_name = descriptor
            .underlying_type
            .as_deref()
            .unwrap_or(DEFAULT_ENUM_UNDERLYING_TYPE);
        let underlying = match self.load.primitives.find(underlying_name) {
            Some(primitive) if primitive.kind().is_enum_underlying() => Arc::clone(primitive),
            _ => {
                self.error(
                    ErrorCode::InvalidEnumType,
                    &full_name,
                    format!(
                        "'{}' is not a valid underlying type for enum '{}'",
                        underlying_name, full_name
                    ),
                );
                return Ok(None);
            }
        };
        let mut enum_type = EnumType::new(
            &descriptor.name,
            &descriptor.namespace,
            DataSpace::OSpace,
            underlying,
            descriptor.is_flags,
        );
        for member in &descriptor.members {
            enum_type.add_member(EnumMember::new(&member.name, member.value))?;
        }
        Ok(Some(enum_type))
    }

    fn property_usage(
        &mut self,
        owner: &str,
        property: &ClrProperty,
    ) -> Result<Option<Arc<TypeUsage>>, MetadataError> {
        let edm_type = match self.load.primitives.find(&property.type_name) {
            Some(primitive) => EdmTypeRef::Primitive(Arc::clone(primitive)),
            None => match self.build_type(&property.type_name)? {
                Some(name) if matches!(name.kind(), NamedTypeKind::ComplexType | NamedTypeKind::EnumType) => {
                    EdmTypeRef::Named(name)
                }
                _ => {
                    self.error(
                        ErrorCode::InvalidPropertyType,
                        owner,
                        format!(
                            "Property '{}' of '{}' has type '{}', which is neither primitive nor a loaded complex or enum type",
                            property.name, owner, property.type_name
                        ),
                    );
                    return Ok(None);
                }
            },
        };
        Ok(Some(if property.nullable {
            TypeUsage::create(edm_type)
        } else {
            TypeUsage::create_with(edm_type, &FacetValues::new().nullable(false))
        }))
    }

    fn attach_navigation_properties(&mut self, full_name: &str) -> Result<(), MetadataError> {
        let Some(&(descriptor, _)) = self.descriptors.get(full_name) else {
            return Ok(());
        };
        if descriptor.navigation_properties.is_empty() || !self.index.contains_key(full_name) {
            return Ok(());
        }
        for navigation in &descriptor.navigation_properties {
            let Some(association) = self.object_association(full_name, &navigation.relationship)? else {
                continue;
            };
            let ends = self
                .find_named_type(association.identity())
                .and_then(|t| t.as_association())
                .map(|a| {
                    (
                        a.end(&navigation.from_role).is_some(),
                        a.end(&navigation.to_role)
                            .and_then(|end| end.entity_type().cloned().map(|t| (t, end.multiplicity()))),
                    )
                });
            let (target, multiplicity) = match ends {
                Some((true, Some(to_end))) => to_end,
                _ => {
                    self.error(
                        ErrorCode::BadNavigationProperty,
                        full_name,
                        format!(
                            "Navigation property '{}' of '{}' names roles '{}' and '{}' that '{}' does not declare",
                            navigation.name,
                            full_name,
                            navigation.from_role,
                            navigation.to_role,
                            association.identity()
                        ),
                    );
                    continue;
                }
            };
            let usage = match multiplicity {
                RelationshipMultiplicity::Many => {
                    let collection = self
                        .find_named_type(target.identity())
                        .and_then(|t| t.as_entity())
                        .map(EntityType::collection_type)
                        .ok_or_else(|| {
                            MetadataError::internal(format!(
                                "end type '{}' of '{}' is not staged",
                                target.identity(),
                                association.identity()
                            ))
                        })?;
                    TypeUsage::create(EdmTypeRef::Collection(collection))
                }
                RelationshipMultiplicity::One => TypeUsage::create_with(
                    EdmTypeRef::Named(target),
                    &FacetValues::new().nullable(false),
                ),
                RelationshipMultiplicity::ZeroOrOne => TypeUsage::create(EdmTypeRef::Named(target)),
            };
            let property = NavigationProperty::new(
                &navigation.name,
                usage,
                association,
                &navigation.from_role,
                &navigation.to_role,
            );
            let slot = self.index.get(full_name).copied();
            match slot.and_then(|slot| self.staged.get_mut(slot)) {
                Some(StagedType {
                    item: StagedClr::Entity(entity),
                    ..
                }) => entity.add_navigation_property(property)?,
                _ => {
                    return Err(MetadataError::internal(format!(
                        "'{}' declares navigation properties but is not an entity type",
                        full_name
                    )))
                }
            }
        }
        Ok(())
    }

    /// Object-space copy of a conceptual association, ends retargeted at the
    /// object-space types mapped to the conceptual end types.
    fn object_association(
        &mut self,
        owner: &str,
        relationship: &str,
    ) -> Result<Option<TypeName>, MetadataError> {
        if let Some(named) = self.find_named_type(relationship) {
            return Ok(Some(named.type_name()));
        }
        let Some(edm) = self.load.edm else {
            self.error(
                ErrorCode::InvalidAssociation,
                owner,
                format!(
                    "Relationship '{}' cannot be loaded without a conceptual model",
                    relationship
                ),
            );
            return Ok(None);
        };
        let Some(conceptual) = edm.items().try_get_item::<AssociationType>(relationship, false) else {
            self.error(
                ErrorCode::InvalidAssociation,
                owner,
                format!("Relationship '{}' is not defined in the conceptual model", relationship),
            );
            return Ok(None);
        };

        let c_name = conceptual.type_name();
        let mut association = AssociationType::new(c_name.name(), c_name.namespace(), DataSpace::OSpace);
        for end in conceptual.ends() {
            let mapped = end
                .entity_type()
                .and_then(|c_type| self.object_type_for(c_type.identity()));
            let Some(o_type) = mapped else {
                self.error(
                    ErrorCode::InvalidAssociation,
                    owner,
                    format!(
                        "No loaded CLR type maps to the type of end '{}' of '{}'",
                        end.name(),
                        relationship
                    ),
                );
                return Ok(None);
            };
            association.add_end(
                AssociationEndMember::new(end.name(), o_type, end.multiplicity())
                    .with_delete_behavior(end.delete_behavior()),
            )?;
        }
        for constraint in conceptual.referential_constraints() {
            association.add_referential_constraint(constraint.clone())?;
        }
        association.set_foreign_key(conceptual.is_foreign_key())?;

        Ok(Some(self.stage(StagedType {
            item: StagedClr::Association(association),
            edm_type: None,
            clr: None,
        })))
    }

    /// Entity type of this batch or of the collection mapped to a conceptual
    /// identity.
    fn object_type_for(&self, c_identity: &str) -> Option<TypeName> {
        let staged = self.staged.iter().find(|t| {
            t.edm_type.as_deref() == Some(c_identity) && matches!(t.item, StagedClr::Entity(_))
        });
        if let Some(staged) = staged {
            return Some(staged.item.as_named().type_name());
        }
        match self.load.oc_mapping.get(c_identity) {
            Some(GlobalItem::EntityType(entity)) => Some(entity.type_name()),
            _ => None,
        }
    }
}

fn default_true() -> bool {
    true
}
