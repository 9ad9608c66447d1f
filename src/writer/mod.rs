//! Schema output: a visitor over finished metadata and its XML rendition.
//!
//! [`write_schema`] walks the items of one namespace and drives a
//! [`SchemaWriter`]; the writer decides the output format. Every `*_header`
//! callback opens an element that a later [`SchemaWriter::write_end_element`]
//! closes; the other callbacks write complete elements.

mod csdl;

pub use csdl::{AnnotationSerializer, CsdlXmlWriter};

use crate::error::MetadataError;
use crate::items::ItemCollection;
use crate::metadata::{
    AssociationEndMember, AssociationSet, AssociationSetEnd, AssociationType, ComplexType, DataSpace,
    EdmFunction, EdmProperty, EdmType, EntityContainer, EntitySet, EntityType, EnumMember, EnumType,
    FunctionParameter, GlobalItem, MetadataItem, NavigationProperty, OperationAction, ReferentialConstraint,
};

pub trait SchemaWriter {
    fn write_schema_element_header(
        &mut self,
        namespace: &str,
        data_space: DataSpace,
        version: f64,
    ) -> Result<(), MetadataError>;

    fn write_entity_container_element_header(&mut self, container: &EntityContainer) -> Result<(), MetadataError>;

    fn write_entity_set_element_header(&mut self, set: &EntitySet) -> Result<(), MetadataError>;

    fn write_association_set_element_header(&mut self, set: &AssociationSet) -> Result<(), MetadataError>;

    fn write_association_set_end_element(&mut self, end: &AssociationSetEnd) -> Result<(), MetadataError>;

    fn write_entity_type_element_header(&mut self, entity: &EntityType) -> Result<(), MetadataError>;

    fn write_key_element(&mut self, key_members: &[String]) -> Result<(), MetadataError>;

    fn write_complex_type_element_header(&mut self, complex: &ComplexType) -> Result<(), MetadataError>;

    fn write_enum_type_element_header(&mut self, enum_type: &EnumType) -> Result<(), MetadataError>;

    fn write_enum_member_element(&mut self, member: &EnumMember) -> Result<(), MetadataError>;

    fn write_property_element_header(&mut self, property: &EdmProperty) -> Result<(), MetadataError>;

    fn write_navigation_property_element(&mut self, navigation: &NavigationProperty) -> Result<(), MetadataError>;

    fn write_association_type_element_header(&mut self, association: &AssociationType) -> Result<(), MetadataError>;

    fn write_association_end_element_header(&mut self, end: &AssociationEndMember) -> Result<(), MetadataError>;

    fn write_operation_action(&mut self, action: OperationAction) -> Result<(), MetadataError>;

    fn write_referential_constraint_element(
        &mut self,
        constraint: &ReferentialConstraint,
    ) -> Result<(), MetadataError>;

    fn write_function_element_header(&mut self, function: &EdmFunction) -> Result<(), MetadataError>;

    fn write_function_parameter_element(&mut self, parameter: &FunctionParameter) -> Result<(), MetadataError>;

    fn write_end_element(&mut self) -> Result<(), MetadataError>;
}

/// Write every item of `namespace` in `items`.
///
/// Types come first (enums, complex types, entity types, associations), then
/// functions, then the containers whose entity sets use types of the
/// namespace; each group is ordered by identity.
pub fn write_schema(
    items: &ItemCollection,
    namespace: &str,
    version: f64,
    writer: &mut dyn SchemaWriter,
) -> Result<(), MetadataError> {
    let mut in_namespace: Vec<&GlobalItem> = items
        .iter()
        .filter(|item| item.namespace_name() == Some(namespace))
        .filter(|item| !matches!(item, GlobalItem::PrimitiveType(_)))
        .filter(|item| match item {
            GlobalItem::Function(function) => !function.is_from_provider_manifest(),
            _ => true,
        })
        .collect();
    in_namespace.sort_by(|a, b| group(a).cmp(&group(b)).then_with(|| a.identity().cmp(b.identity())));

    let mut containers: Vec<&EntityContainer> = items
        .iter()
        .filter_map(|item| match item {
            GlobalItem::EntityContainer(container) => Some(container.as_ref()),
            _ => None,
        })
        .filter(|container| {
            container
                .entity_sets()
                .any(|set| set.entity_type().namespace() == namespace)
        })
        .collect();
    containers.sort_by(|a, b| a.name().cmp(b.name()));

    writer.write_schema_element_header(namespace, items.data_space(), version)?;
    for item in in_namespace {
        match item {
            GlobalItem::EnumType(enum_type) => write_enum_type(enum_type, writer)?,
            GlobalItem::ComplexType(complex) => {
                writer.write_complex_type_element_header(complex)?;
                for property in complex.properties() {
                    write_property(property, writer)?;
                }
                writer.write_end_element()?;
            }
            GlobalItem::EntityType(entity) => write_entity_type(entity, writer)?,
            GlobalItem::AssociationType(association) => write_association(association, writer)?,
            GlobalItem::Function(function) => write_function(function, writer)?,
            GlobalItem::PrimitiveType(_) | GlobalItem::EntityContainer(_) => {}
        }
    }
    for container in containers {
        write_container(container, writer)?;
    }
    writer.write_end_element()
}

fn group(item: &GlobalItem) -> u8 {
    match item {
        GlobalItem::PrimitiveType(_) => 0,
        GlobalItem::EnumType(_) => 1,
        GlobalItem::ComplexType(_) => 2,
        GlobalItem::EntityType(_) => 3,
        GlobalItem::AssociationType(_) => 4,
        GlobalItem::Function(_) => 5,
        GlobalItem::EntityContainer(_) => 6,
    }
}

fn write_enum_type(enum_type: &EnumType, writer: &mut dyn SchemaWriter) -> Result<(), MetadataError> {
    writer.write_enum_type_element_header(enum_type)?;
    for member in enum_type.members().iter() {
        writer.write_enum_member_element(member)?;
    }
    writer.write_end_element()
}

fn write_entity_type(entity: &EntityType, writer: &mut dyn SchemaWriter) -> Result<(), MetadataError> {
    writer.write_entity_type_element_header(entity)?;
    if entity.base_type().is_none() && !entity.declared_key_member_names().is_empty() {
        writer.write_key_element(entity.declared_key_member_names())?;
    }
    for property in entity.properties() {
        write_property(property, writer)?;
    }
    for navigation in entity.navigation_properties() {
        writer.write_navigation_property_element(navigation)?;
    }
    writer.write_end_element()
}

fn write_property(property: &EdmProperty, writer: &mut dyn SchemaWriter) -> Result<(), MetadataError> {
    writer.write_property_element_header(property)?;
    writer.write_end_element()
}

fn write_association(association: &AssociationType, writer: &mut dyn SchemaWriter) -> Result<(), MetadataError> {
    writer.write_association_type_element_header(association)?;
    for end in association.ends() {
        writer.write_association_end_element_header(end)?;
        if end.delete_behavior() != OperationAction::None {
            writer.write_operation_action(end.delete_behavior())?;
        }
        writer.write_end_element()?;
    }
    for constraint in association.referential_constraints().iter() {
        writer.write_referential_constraint_element(constraint)?;
    }
    writer.write_end_element()
}

fn write_function(function: &EdmFunction, writer: &mut dyn SchemaWriter) -> Result<(), MetadataError> {
    writer.write_function_element_header(function)?;
    for parameter in function.parameters().iter() {
        writer.write_function_parameter_element(parameter)?;
    }
    writer.write_end_element()
}

fn write_container(container: &EntityContainer, writer: &mut dyn SchemaWriter) -> Result<(), MetadataError> {
    writer.write_entity_container_element_header(container)?;
    for set in container.entity_sets() {
        writer.write_entity_set_element_header(set)?;
        writer.write_end_element()?;
    }
    for set in container.association_sets() {
        writer.write_association_set_element_header(set)?;
        for end in set.ends().iter() {
            writer.write_association_set_end_element(end)?;
        }
        writer.write_end_element()?;
    }
    for function in container.function_imports().iter() {
        write_function(function, writer)?;
    }
    writer.write_end_element()
}
