//! Converter: schema object model to frozen metadata items.
//!
//! Conversion is a memoized depth-first walk over the schema elements of one
//! layer. Items are staged mutable, keyed by their schema element, and only
//! frozen and handed out once every phase has run:
//!
//! 1. every top-level element is converted, except navigation properties and
//!    functions whose referenced types are not staged yet;
//! 2. navigation properties are attached to the staged entity types;
//! 3. deferred functions are converted.

mod cache;
mod container;
mod facets;
mod function;

pub use cache::ConversionCache;
pub use facets::{explicit_facets, property_type_usage};

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::error::MetadataError;
use crate::metadata::facet::FacetValues;
use crate::metadata::{
    AssociationEndMember, AssociationType, ComplexType, DataSpace, Documentation, EdmFunction,
    EdmMember, EdmProperty, EdmTypeRef, EntityContainer, EntityType, EnumMember, EnumType,
    GlobalItem, HasItemState, MetadataItem, MetadataProperty, NamedTypeKind, NamedTypeRef,
    NavigationProperty, OperationAction, PropertyValue, ReferentialConstraint,
    RelationshipMultiplicity, TypeLookup, TypeName, TypeUsage,
};
use crate::som::{
    AnnotationElement, AssociationElement, ComplexTypeElement, DocumentationElement,
    ElementKey, EntityTypeElement, EnumTypeElement, NavigationPropertyElement, PropertyElement,
    SchemaElement, SchemaSet, SchemaTypeRef,
};
use crate::util::qualify;

/// System metadata property carrying a property's concurrency mode.
pub const CONCURRENCY_MODE: &str = "ConcurrencyMode";

/// System metadata property carrying a property's store generated pattern.
pub const STORE_GENERATED_PATTERN: &str = "StoreGeneratedPattern";

/// Underlying type of an enum that does not name one.
const DEFAULT_ENUM_UNDERLYING_TYPE: &str = "Int32";

/// First version whose referential constraints make foreign key associations.
const FOREIGN_KEY_VERSION: f64 = 2.0;

/// Destination of a conversion run.
///
/// Resolves types registered before the run (for example by an earlier
/// load into the same collection) and records the version of the converted
/// schemas once the run completes.
pub trait ConversionTarget: TypeLookup {
    fn data_space(&self) -> DataSpace;

    fn set_schema_version(&mut self, version: f64);
}

/// Output of a conversion run: frozen items in declaration order.
#[derive(Debug, Default)]
pub struct ConvertedSchema {
    pub items: Vec<GlobalItem>,
    pub version: Option<f64>,
}

/// Convert a validated schema set and record its version on `target`.
///
/// The schema set must already have passed validation without errors;
/// anything the algorithm cannot resolve is reported as an internal fault.
pub fn convert_schema<T: ConversionTarget>(
    schemas: &SchemaSet,
    target: &mut T,
) -> Result<Vec<GlobalItem>, MetadataError> {
    if schemas.data_space() != target.data_space() {
        return Err(MetadataError::internal(format!(
            "schemas of {} cannot be converted into a {} collection",
            schemas.data_space(),
            target.data_space()
        )));
    }
    let converted = Converter::new(schemas, &*target).run()?;
    if let Some(version) = converted.version {
        target.set_schema_version(version);
    }
    Ok(converted.items)
}

/// An item being built; mutable until the run completes.
#[derive(Debug)]
enum StagedItem {
    Entity(EntityType),
    Complex(ComplexType),
    Association(AssociationType),
    Enum(EnumType),
    Function(EdmFunction),
    Container(EntityContainer),
}

impl StagedItem {
    fn as_named(&self) -> Option<NamedTypeRef<'_>> {
        match self {
            StagedItem::Entity(t) => Some(NamedTypeRef::Entity(t)),
            StagedItem::Complex(t) => Some(NamedTypeRef::Complex(t)),
            StagedItem::Association(t) => Some(NamedTypeRef::Association(t)),
            StagedItem::Enum(t) => Some(NamedTypeRef::Enum(t)),
            StagedItem::Function(_) | StagedItem::Container(_) => None,
        }
    }

    fn identity(&self) -> &str {
        match self {
            StagedItem::Entity(t) => t.identity(),
            StagedItem::Complex(t) => t.identity(),
            StagedItem::Association(t) => t.identity(),
            StagedItem::Enum(t) => t.identity(),
            StagedItem::Function(f) => f.identity(),
            StagedItem::Container(c) => c.identity(),
        }
    }

    fn freeze(self) -> GlobalItem {
        match self {
            StagedItem::Entity(mut t) => {
                t.set_read_only();
                GlobalItem::EntityType(Arc::new(t))
            }
            StagedItem::Complex(mut t) => {
                t.set_read_only();
                GlobalItem::ComplexType(Arc::new(t))
            }
            StagedItem::Association(mut t) => {
                t.set_read_only();
                GlobalItem::AssociationType(Arc::new(t))
            }
            StagedItem::Enum(mut t) => {
                t.set_read_only();
                GlobalItem::EnumType(Arc::new(t))
            }
            StagedItem::Function(mut f) => {
                f.set_read_only();
                GlobalItem::Function(Arc::new(f))
            }
            StagedItem::Container(mut c) => {
                c.set_read_only();
                GlobalItem::EntityContainer(Arc::new(c))
            }
        }
    }
}

/// Converted items keyed by the schema element they came from.
#[derive(Debug, Default)]
struct Staging {
    items: HashMap<ElementKey, StagedItem>,
    by_identity: HashMap<String, ElementKey>,
    order: Vec<ElementKey>,
}

impl Staging {
    fn contains(&self, key: ElementKey) -> bool {
        self.items.contains_key(&key)
    }

    fn insert(&mut self, key: ElementKey, item: StagedItem) {
        if item.as_named().is_some() {
            self.by_identity.insert(item.identity().to_string(), key);
        }
        self.items.insert(key, item);
        self.order.push(key);
    }

    fn entity(&self, key: ElementKey) -> Result<&EntityType, MetadataError> {
        match self.items.get(&key) {
            Some(StagedItem::Entity(entity)) => Ok(entity),
            _ => Err(not_staged(key, "entity type")),
        }
    }

    fn entity_mut(&mut self, key: ElementKey) -> Result<&mut EntityType, MetadataError> {
        match self.items.get_mut(&key) {
            Some(StagedItem::Entity(entity)) => Ok(entity),
            _ => Err(not_staged(key, "entity type")),
        }
    }

    fn association_mut(&mut self, key: ElementKey) -> Result<&mut AssociationType, MetadataError> {
        match self.items.get_mut(&key) {
            Some(StagedItem::Association(association)) => Ok(association),
            _ => Err(not_staged(key, "association")),
        }
    }

    fn into_items(mut self) -> Vec<GlobalItem> {
        let mut items = Vec::with_capacity(self.order.len());
        for key in &self.order {
            if let Some(item) = self.items.remove(key) {
                items.push(item.freeze());
            }
        }
        items
    }
}

fn not_staged(key: ElementKey, expected: &str) -> MetadataError {
    MetadataError::internal(format!(
        "schema element {}:{} was expected to be a converted {}",
        key.document, key.element, expected
    ))
}

/// Type lookup over staged items, falling back to the destination collection.
struct StagingLookup<'a, L: ?Sized> {
    staging: &'a Staging,
    registered: &'a L,
}

impl<L: TypeLookup + ?Sized> TypeLookup for StagingLookup<'_, L> {
    fn find_named_type(&self, identity: &str) -> Option<NamedTypeRef<'_>> {
        if let Some(key) = self.staging.by_identity.get(identity) {
            if let Some(named) = self.staging.items.get(key).and_then(StagedItem::as_named) {
                return Some(named);
            }
        }
        self.registered.find_named_type(identity)
    }
}

/// One conversion run over a schema set.
pub struct Converter<'a, L: ?Sized> {
    schemas: &'a SchemaSet,
    registered: &'a L,
    data_space: DataSpace,
    cache: ConversionCache,
    staging: Staging,
    in_progress: HashSet<ElementKey>,
}

impl<'a, L: TypeLookup + ?Sized> Converter<'a, L> {
    pub fn new(schemas: &'a SchemaSet, registered: &'a L) -> Self {
        Self {
            schemas,
            registered,
            data_space: schemas.data_space(),
            cache: ConversionCache::new(),
            staging: Staging::default(),
            in_progress: HashSet::new(),
        }
    }

    /// Run every phase and freeze the result.
    pub fn run(mut self) -> Result<ConvertedSchema, MetadataError> {
        let schemas = self.schemas;
        let mut deferred = Vec::new();

        for key in schemas.keys() {
            if matches!(schemas.element(key), Some(SchemaElement::Function(_)))
                && !self.function_dependencies_staged(key)
            {
                trace!(document = key.document, element = key.element, "deferring function");
                deferred.push(key);
                continue;
            }
            self.load_element(key)?;
        }

        let mut navigation_count = 0;
        for key in schemas.keys() {
            if let Some(entity) = schemas.entity_type(key) {
                for navigation in &entity.navigation_properties {
                    self.load_navigation_property(key, navigation)?;
                    navigation_count += 1;
                }
            }
        }

        for key in &deferred {
            self.load_element(*key)?;
        }

        debug!(
            space = %self.data_space,
            items = self.staging.order.len(),
            navigation_properties = navigation_count,
            deferred_functions = deferred.len(),
            "converted schema set"
        );

        Ok(ConvertedSchema {
            items: self.staging.into_items(),
            version: schemas.version(),
        })
    }

    fn lookup(&self) -> StagingLookup<'_, L> {
        StagingLookup {
            staging: &self.staging,
            registered: self.registered,
        }
    }

    /// Build-or-fetch for one schema element.
    fn load_element(&mut self, key: ElementKey) -> Result<(), MetadataError> {
        if self.staging.contains(key) {
            return Ok(());
        }
        if !self.in_progress.insert(key) {
            return Err(MetadataError::internal(format!(
                "schema element '{}' refers back to itself while being converted",
                self.schemas.qualified_name(key).unwrap_or_default()
            )));
        }
        let schemas = self.schemas;
        let element = schemas
            .element(key)
            .ok_or_else(|| not_staged(key, "schema element"))?;
        let item = match element {
            SchemaElement::EntityType(entity) => StagedItem::Entity(self.convert_entity(key, entity)?),
            SchemaElement::ComplexType(complex) => {
                StagedItem::Complex(self.convert_complex(key, complex)?)
            }
            SchemaElement::Association(association) => {
                StagedItem::Association(self.convert_association(key, association)?)
            }
            SchemaElement::EnumType(enum_type) => StagedItem::Enum(self.convert_enum(key, enum_type)?),
            SchemaElement::Function(function) => {
                StagedItem::Function(self.convert_function(key, function)?)
            }
            SchemaElement::EntityContainer(container) => {
                StagedItem::Container(self.convert_container(key, container)?)
            }
        };
        self.in_progress.remove(&key);
        trace!(identity = item.identity(), "staged item");
        self.staging.insert(key, item);
        Ok(())
    }

    /// Name of the type declared by a schema element, without converting it.
    fn declared_type_name(&self, key: ElementKey) -> Result<TypeName, MetadataError> {
        let document = self
            .schemas
            .document(key.document)
            .ok_or_else(|| not_staged(key, "schema element"))?;
        let element = document
            .elements
            .get(key.element)
            .ok_or_else(|| not_staged(key, "schema element"))?;
        let kind = match element {
            SchemaElement::EntityType(_) => NamedTypeKind::EntityType,
            SchemaElement::ComplexType(_) => NamedTypeKind::ComplexType,
            SchemaElement::EnumType(_) => NamedTypeKind::EnumType,
            SchemaElement::Association(_) => NamedTypeKind::AssociationType,
            SchemaElement::Function(_) | SchemaElement::EntityContainer(_) => {
                return Err(not_staged(key, "type"));
            }
        };
        Ok(TypeName::new(
            kind,
            &document.namespace,
            element.name(),
            self.data_space,
        ))
    }

    fn resolve_element(&self, document: usize, name: &str) -> Result<ElementKey, MetadataError> {
        self.schemas
            .resolve_element(document, name)
            .ok_or_else(|| unresolved(name))
    }

    /// EdmType for a type reference written on a property.
    fn property_edm_type(
        &mut self,
        reference: &SchemaTypeRef,
    ) -> Result<EdmTypeRef, MetadataError> {
        match reference {
            SchemaTypeRef::Primitive(primitive) => Ok(EdmTypeRef::Primitive(Arc::clone(primitive))),
            SchemaTypeRef::Element(key) => Ok(EdmTypeRef::Named(self.declared_type_name(*key)?)),
            SchemaTypeRef::Collection(inner) => {
                let element = self.property_edm_type(inner)?;
                let lookup = StagingLookup {
                    staging: &self.staging,
                    registered: self.registered,
                };
                let usage = self.cache.collection_type_usage(element, &lookup);
                Ok(usage.edm_type().clone())
            }
        }
    }

    fn convert_property(
        &mut self,
        document: usize,
        property: &PropertyElement,
    ) -> Result<EdmProperty, MetadataError> {
        let schemas = self.schemas;
        let reference = schemas
            .resolve_type(document, &property.type_name)
            .ok_or_else(|| unresolved(&property.type_name))?;
        let edm_type = self.property_edm_type(&reference)?;
        let version = schemas
            .document(document)
            .map(|d| d.version)
            .unwrap_or_default();
        let usage = property_type_usage(
            &mut self.cache,
            edm_type,
            property,
            self.data_space,
            version,
        );

        let mut converted = EdmProperty::new(&property.name, usage);
        if let Some(mode) = &property.concurrency_mode {
            converted.add_metadata_property(MetadataProperty::system(
                CONCURRENCY_MODE,
                PropertyValue::Text(mode.clone()),
            ))?;
        }
        if let Some(pattern) = &property.store_generated_pattern {
            converted.add_metadata_property(MetadataProperty::system(
                STORE_GENERATED_PATTERN,
                PropertyValue::Text(pattern.clone()),
            ))?;
        }
        apply_other_content(
            &mut converted,
            property.documentation.as_ref(),
            &property.annotations,
        )?;
        Ok(converted)
    }

    /// Entity shell: properties, keys and base type. Navigation properties
    /// are attached later, once every entity type exists.
    fn convert_entity(
        &mut self,
        key: ElementKey,
        element: &EntityTypeElement,
    ) -> Result<EntityType, MetadataError> {
        let namespace = self.namespace_of(key)?;
        let mut entity = EntityType::new(&element.name, namespace, self.data_space);

        for property in &element.properties {
            let converted = self.convert_property(key.document, property)?;
            entity.add_property(converted)?;
        }
        for key_member in &element.key {
            entity.add_key_member(key_member, &self.lookup())?;
        }

        if let Some(base) = &element.base_type {
            let base_key = self.resolve_element(key.document, base)?;
            self.load_element(base_key)?;
            let base_name = self.declared_type_name(base_key)?;
            entity.set_base_type(Some(base_name), &self.lookup())?;
        }
        entity.set_abstract(element.is_abstract)?;
        apply_other_content(
            &mut entity,
            element.documentation.as_ref(),
            &element.annotations,
        )?;
        Ok(entity)
    }

    fn convert_complex(
        &mut self,
        key: ElementKey,
        element: &ComplexTypeElement,
    ) -> Result<ComplexType, MetadataError> {
        let namespace = self.namespace_of(key)?;
        let mut complex = ComplexType::new(&element.name, namespace, self.data_space);

        for property in &element.properties {
            let converted = self.convert_property(key.document, property)?;
            complex.add_property(converted)?;
        }
        if let Some(base) = &element.base_type {
            let base_key = self.resolve_element(key.document, base)?;
            self.load_element(base_key)?;
            let base_name = self.declared_type_name(base_key)?;
            complex
                .core_mut()
                .set_base_type(Some(base_name), &self.lookup())?;
        }
        complex.core_mut().set_abstract(element.is_abstract)?;
        apply_other_content(
            &mut complex,
            element.documentation.as_ref(),
            &element.annotations,
        )?;
        Ok(complex)
    }

    fn convert_enum(
        &mut self,
        key: ElementKey,
        element: &EnumTypeElement,
    ) -> Result<EnumType, MetadataError> {
        let namespace = self.namespace_of(key)?;
        let underlying_name = element
            .underlying_type
            .as_deref()
            .unwrap_or(DEFAULT_ENUM_UNDERLYING_TYPE);
        let underlying = self
            .schemas
            .resolve_primitive(key.document, underlying_name)
            .filter(|p| p.kind().is_enum_underlying())
            .ok_or_else(|| unresolved(underlying_name))?;
        let mut enum_type = EnumType::new(
            &element.name,
            namespace,
            self.data_space,
            underlying,
            element.is_flags,
        );

        // Members without a value continue from the previous member.
        let mut next_value = 0i64;
        for member in &element.members {
            let value = member.value.unwrap_or(next_value);
            next_value = value.saturating_add(1);
            enum_type.add_member(EnumMember::new(&member.name, value))?;
        }
        apply_other_content(
            &mut enum_type,
            element.documentation.as_ref(),
            &element.annotations,
        )?;
        Ok(enum_type)
    }

    fn convert_association(
        &mut self,
        key: ElementKey,
        element: &AssociationElement,
    ) -> Result<AssociationType, MetadataError> {
        let namespace = self.namespace_of(key)?;
        let mut association = AssociationType::new(&element.name, namespace, self.data_space);

        for end in &element.ends {
            let entity_key = self.resolve_element(key.document, &end.type_name)?;
            self.load_element(entity_key)?;
            let entity_name = self.declared_type_name(entity_key)?;
            let multiplicity = parse_multiplicity(&end.multiplicity)?;
            let delete_behavior = parse_delete_behavior(end.on_delete.as_deref())?;
            association.get_or_create_end(&end.role, || {
                AssociationEndMember::new(&end.role, entity_name, multiplicity)
                    .with_delete_behavior(delete_behavior)
            })?;
        }

        if let Some(constraint) = &element.referential_constraint {
            association.add_referential_constraint(ReferentialConstraint::new(
                &constraint.principal.role,
                &constraint.dependent.role,
                constraint.principal.property_refs.clone(),
                constraint.dependent.property_refs.clone(),
            ))?;
            let version = self
                .schemas
                .document(key.document)
                .map(|d| d.version)
                .unwrap_or_default();
            if self.data_space == DataSpace::CSpace && version >= FOREIGN_KEY_VERSION {
                association.set_foreign_key(true)?;
            }
        }
        apply_other_content(
            &mut association,
            element.documentation.as_ref(),
            &element.annotations,
        )?;
        Ok(association)
    }

    /// Attach one navigation property to a staged entity type.
    fn load_navigation_property(
        &mut self,
        entity_key: ElementKey,
        element: &NavigationPropertyElement,
    ) -> Result<(), MetadataError> {
        let schemas = self.schemas;
        let association_key = self.resolve_element(entity_key.document, &element.relationship)?;
        self.load_element(association_key)?;
        let association = schemas
            .association(association_key)
            .ok_or_else(|| not_staged(association_key, "association"))?;
        let end_of = |role: &str| {
            association
                .ends
                .iter()
                .find(|end| end.role == role)
                .ok_or_else(|| unresolved(&qualify(&association.name, role)))
        };
        let to_end = end_of(&element.to_role)?;
        let from_end = end_of(&element.from_role)?;

        let target_key = self.resolve_element(association_key.document, &to_end.type_name)?;
        self.load_element(target_key)?;
        let target_name = self.declared_type_name(target_key)?;
        let declaring_name = self.staging.entity(entity_key)?.type_name();
        let to_multiplicity = parse_multiplicity(&to_end.multiplicity)?;
        let from_multiplicity = parse_multiplicity(&from_end.multiplicity)?;

        let usage = match to_multiplicity {
            RelationshipMultiplicity::Many => {
                let lookup = StagingLookup {
                    staging: &self.staging,
                    registered: self.registered,
                };
                self.cache
                    .collection_type_usage(EdmTypeRef::Named(target_name.clone()), &lookup)
            }
            RelationshipMultiplicity::One => TypeUsage::create_with(
                EdmTypeRef::Named(target_name.clone()),
                &FacetValues::new().nullable(false),
            ),
            RelationshipMultiplicity::ZeroOrOne => {
                self.cache.type_usage(EdmTypeRef::Named(target_name.clone()))
            }
        };

        // Both ends may be reached first from here rather than from the
        // association; either way the association owns one member per role.
        let association_name = self.declared_type_name(association_key)?;
        let association_type = self.staging.association_mut(association_key)?;
        let to_delete = parse_delete_behavior(to_end.on_delete.as_deref())?;
        association_type.get_or_create_end(&to_end.role, || {
            AssociationEndMember::new(&to_end.role, target_name, to_multiplicity)
                .with_delete_behavior(to_delete)
        })?;
        let from_delete = parse_delete_behavior(from_end.on_delete.as_deref())?;
        association_type.get_or_create_end(&from_end.role, || {
            AssociationEndMember::new(&from_end.role, declaring_name, from_multiplicity)
                .with_delete_behavior(from_delete)
        })?;

        let mut member = EdmMember::Navigation(NavigationProperty::new(
            &element.name,
            usage,
            association_name,
            &element.from_role,
            &element.to_role,
        ));
        apply_other_content(
            &mut member,
            element.documentation.as_ref(),
            &element.annotations,
        )?;
        self.staging.entity_mut(entity_key)?.add_member(member)
    }

    fn namespace_of(&self, key: ElementKey) -> Result<String, MetadataError> {
        self.schemas
            .document(key.document)
            .map(|d| d.namespace.clone())
            .ok_or_else(|| not_staged(key, "schema element"))
    }
}

fn unresolved(name: &str) -> MetadataError {
    MetadataError::internal(format!(
        "'{}' could not be resolved although the schema passed validation",
        name
    ))
}

fn parse_multiplicity(text: &str) -> Result<RelationshipMultiplicity, MetadataError> {
    RelationshipMultiplicity::parse(text)
        .ok_or_else(|| MetadataError::internal(format!("unexpected multiplicity '{}'", text)))
}

fn parse_delete_behavior(action: Option<&str>) -> Result<OperationAction, MetadataError> {
    match action {
        None | Some("None") => Ok(OperationAction::None),
        Some("Cascade") => Ok(OperationAction::Cascade),
        Some(other) => Err(MetadataError::internal(format!(
            "unexpected delete action '{}'",
            other
        ))),
    }
}

/// Copy documentation and namespace-qualified annotations onto an item.
///
/// Annotations whose names carry no namespace were reported as warnings by
/// validation and are dropped here.
fn apply_other_content<I: HasItemState + ?Sized>(
    item: &mut I,
    documentation: Option<&DocumentationElement>,
    annotations: &[AnnotationElement],
) -> Result<(), MetadataError> {
    if let Some(documentation) = documentation {
        item.set_documentation(Documentation {
            summary: documentation.summary.clone(),
            long_description: documentation.long_description.clone(),
        })?;
    }
    for annotation in annotations {
        if !annotation.name.contains(':') {
            continue;
        }
        item.add_metadata_property(MetadataProperty::extended(
            &annotation.name,
            &annotation.value,
        ))?;
    }
    Ok(())
}
