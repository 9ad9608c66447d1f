//! CSDL/SSDL XML output with quick-xml

use std::collections::HashMap;
use std::io::Write;

use quick_xml::events::{BytesDecl, BytesEnd, BytesStart, BytesText, Event};
use quick_xml::Writer;

use super::SchemaWriter;
use crate::error::MetadataError;
use crate::metadata::{
    AssociationEndMember, AssociationSet, AssociationSetEnd, AssociationType, ComplexType, DataSpace,
    EdmFunction, EdmProperty, EdmType, EntityContainer, EntitySet, EntityType, EnumMember, EnumType,
    FunctionParameter, HasItemState, MetadataProperty, NavigationProperty, OperationAction, PropertyKind,
    PropertyValue, ReferentialConstraint, TypeUsage,
};

const CSDL_NAMESPACES: [(f64, &str); 3] = [
    (1.0, "http://schemas.microsoft.com/ado/2006/04/edm"),
    (2.0, "http://schemas.microsoft.com/ado/2008/09/edm"),
    (3.0, "http://schemas.microsoft.com/ado/2009/11/edm"),
];

const SSDL_NAMESPACES: [(f64, &str); 3] = [
    (1.0, "http://schemas.microsoft.com/ado/2006/04/edm/ssdl"),
    (2.0, "http://schemas.microsoft.com/ado/2009/02/edm/ssdl"),
    (3.0, "http://schemas.microsoft.com/ado/2009/11/edm/ssdl"),
];

/// Facets never written as attributes.
const UNWRITTEN_FACETS: [&str; 2] = ["CollectionKind", "IsStrict"];

/// Turns an extended property value into attribute text.
pub trait AnnotationSerializer {
    fn serialize_value(&self, attribute_name: &str, value: &PropertyValue) -> String;
}

/// [`SchemaWriter`] producing conceptual (CSDL) or storage (SSDL) XML.
///
/// Extended properties become attributes in their own XML namespace; the
/// prefix for each namespace URI is assigned on first use and declared on
/// every element that carries it.
pub struct CsdlXmlWriter<W: Write> {
    writer: Writer<W>,
    open: Vec<String>,
    data_space: DataSpace,
    provider: Option<(String, String)>,
    serializers: HashMap<String, Box<dyn AnnotationSerializer>>,
    prefixes: HashMap<String, String>,
}

impl<W: Write> CsdlXmlWriter<W> {
    pub fn new(inner: W) -> Self {
        Self {
            writer: Writer::new_with_indent(inner, b' ', 2),
            open: Vec::new(),
            data_space: DataSpace::CSpace,
            provider: None,
            serializers: HashMap::new(),
            prefixes: HashMap::new(),
        }
    }

    /// Provider attributes written on storage schemas.
    pub fn with_provider(mut self, provider: impl Into<String>, manifest_token: impl Into<String>) -> Self {
        self.provider = Some((provider.into(), manifest_token.into()));
        self
    }

    /// Serializer used for extended properties named `attribute_name`.
    pub fn with_serializer(
        mut self,
        attribute_name: impl Into<String>,
        serializer: Box<dyn AnnotationSerializer>,
    ) -> Self {
        self.serializers.insert(attribute_name.into(), serializer);
        self
    }

    pub fn into_inner(self) -> W {
        self.writer.into_inner()
    }

    fn start(&mut self, element: BytesStart<'_>) -> Result<(), MetadataError> {
        self.open.push(String::from_utf8_lossy(element.name().as_ref()).into_owned());
        self.writer.write_event(Event::Start(element))?;
        Ok(())
    }

    fn empty(&mut self, element: BytesStart<'_>) -> Result<(), MetadataError> {
        self.writer.write_event(Event::Empty(element))?;
        Ok(())
    }

    fn push_extended_properties(&mut self, element: &mut BytesStart<'_>, properties: &[MetadataProperty]) {
        let mut declared: Vec<String> = Vec::new();
        for property in properties.iter().filter(|p| p.kind() == PropertyKind::Extended) {
            let Some((namespace_uri, attribute)) = split_extended_name(property.name()) else {
                continue;
            };
            let next = format!("p{}", self.prefixes.len() + 1);
            let prefix = self
                .prefixes
                .entry(namespace_uri.to_string())
                .or_insert(next)
                .clone();
            if !declared.contains(&prefix) {
                element.push_attribute((format!("xmlns:{}", prefix).as_str(), namespace_uri));
                declared.push(prefix.clone());
            }
            let value = match self.serializers.get(attribute) {
                Some(serializer) => serializer.serialize_value(attribute, property.value()),
                None => property.value().to_string(),
            };
            element.push_attribute((format!("{}:{}", prefix, attribute).as_str(), value.as_str()));
        }
    }

    fn write_property_refs(&mut self, names: &[String]) -> Result<(), MetadataError> {
        for name in names {
            let mut property_ref = BytesStart::new("PropertyRef");
            property_ref.push_attribute(("Name", name.as_str()));
            self.empty(property_ref)?;
        }
        Ok(())
    }

    fn is_store(&self) -> bool {
        self.data_space == DataSpace::SSpace
    }
}

/// Split `namespaceUri:attributeName` at the last colon; both parts must be
/// non-empty.
pub(crate) fn split_extended_name(name: &str) -> Option<(&str, &str)> {
    let position = name.rfind(':')?;
    if position < 1 || position + 1 >= name.len() {
        return None;
    }
    Some((&name[..position], &name[position + 1..]))
}

fn push_facets(element: &mut BytesStart<'_>, usage: &TypeUsage) {
    if !usage.is_nullable() {
        element.push_attribute(("Nullable", "false"));
    }
    for facet in usage.facets().iter() {
        let description = facet.description();
        if facet.name() == "Nullable"
            || UNWRITTEN_FACETS.contains(&facet.name())
            || description.is_constant()
            || facet.value().is_null()
            || facet.value() == description.default_value()
        {
            continue;
        }
        element.push_attribute((facet.name(), facet.value().to_string().as_str()));
    }
}

fn bool_text(value: bool) -> &'static str {
    if value {
        "true"
    } else {
        "false"
    }
}

impl<W: Write> SchemaWriter for CsdlXmlWriter<W> {
    fn write_schema_element_header(
        &mut self,
        namespace: &str,
        data_space: DataSpace,
        version: f64,
    ) -> Result<(), MetadataError> {
        self.data_space = data_space;
        let table = match data_space {
            DataSpace::SSpace => &SSDL_NAMESPACES,
            DataSpace::CSpace => &CSDL_NAMESPACES,
            other => {
                return Err(MetadataError::XmlGenerationError {
                    message: format!("cannot write a schema for data space {}", other),
                })
            }
        };
        let xmlns = table
            .iter()
            .find(|(v, _)| (*v - version).abs() < f64::EPSILON)
            .map(|(_, uri)| *uri)
            .ok_or(MetadataError::UnsupportedSchemaVersion { version })?;

        self.writer
            .write_event(Event::Decl(BytesDecl::new("1.0", Some("utf-8"), None)))?;
        let mut schema = BytesStart::new("Schema");
        schema.push_attribute(("Namespace", namespace));
        schema.push_attribute(("Alias", "Self"));
        if let (DataSpace::SSpace, Some((provider, token))) = (data_space, &self.provider) {
            schema.push_attribute(("Provider", provider.as_str()));
            schema.push_attribute(("ProviderManifestToken", token.as_str()));
        }
        schema.push_attribute(("xmlns", xmlns));
        self.start(schema)
    }

    fn write_entity_container_element_header(&mut self, container: &EntityContainer) -> Result<(), MetadataError> {
        let mut element = BytesStart::new("EntityContainer");
        element.push_attribute(("Name", container.name()));
        self.push_extended_properties(&mut element, container.metadata_properties());
        self.start(element)
    }

    fn write_entity_set_element_header(&mut self, set: &EntitySet) -> Result<(), MetadataError> {
        let mut element = BytesStart::new("EntitySet");
        element.push_attribute(("Name", set.name()));
        element.push_attribute(("EntityType", set.entity_type().identity()));
        if self.is_store() {
            if let Some(schema) = set.schema() {
                element.push_attribute(("Schema", schema));
            }
            if let Some(table) = set.table() {
                element.push_attribute(("Table", table));
            }
        }
        self.start(element)?;
        if let Some(query) = set.defining_query() {
            self.writer
                .write_event(Event::Start(BytesStart::new("DefiningQuery")))?;
            self.writer.write_event(Event::Text(BytesText::new(query)))?;
            self.writer
                .write_event(Event::End(BytesEnd::new("DefiningQuery")))?;
        }
        Ok(())
    }

    fn write_association_set_element_header(&mut self, set: &AssociationSet) -> Result<(), MetadataError> {
        let mut element = BytesStart::new("AssociationSet");
        element.push_attribute(("Name", set.name()));
        element.push_attribute(("Association", set.association_type().identity()));
        self.start(element)
    }

    fn write_association_set_end_element(&mut self, end: &AssociationSetEnd) -> Result<(), MetadataError> {
        let mut element = BytesStart::new("End");
        element.push_attribute(("Role", end.role()));
        element.push_attribute(("EntitySet", end.entity_set()));
        self.empty(element)
    }

    fn write_entity_type_element_header(&mut self, entity: &EntityType) -> Result<(), MetadataError> {
        let mut element = BytesStart::new("EntityType");
        element.push_attribute(("Name", entity.name()));
        if let Some(base) = entity.base_type() {
            element.push_attribute(("BaseType", base.identity()));
        }
        if entity.is_abstract() {
            element.push_attribute(("Abstract", "true"));
        }
        self.push_extended_properties(&mut element, entity.metadata_properties());
        self.start(element)
    }

    fn write_key_element(&mut self, key_members: &[String]) -> Result<(), MetadataError> {
        self.writer.write_event(Event::Start(BytesStart::new("Key")))?;
        self.write_property_refs(key_members)?;
        self.writer.write_event(Event::End(BytesEnd::new("Key")))?;
        Ok(())
    }

    fn write_complex_type_element_header(&mut self, complex: &ComplexType) -> Result<(), MetadataError> {
        let mut element = BytesStart::new("ComplexType");
        element.push_attribute(("Name", complex.name()));
        self.push_extended_properties(&mut element, complex.metadata_properties());
        self.start(element)
    }

    fn write_enum_type_element_header(&mut self, enum_type: &EnumType) -> Result<(), MetadataError> {
        let mut element = BytesStart::new("EnumType");
        element.push_attribute(("Name", enum_type.name()));
        element.push_attribute(("IsFlags", bool_text(enum_type.is_flags())));
        element.push_attribute(("UnderlyingType", enum_type.underlying_type().name()));
        self.push_extended_properties(&mut element, enum_type.metadata_properties());
        self.start(element)
    }

    fn write_enum_member_element(&mut self, member: &EnumMember) -> Result<(), MetadataError> {
        let mut element = BytesStart::new("Member");
        element.push_attribute(("Name", member.name()));
        element.push_attribute(("Value", member.value().to_string().as_str()));
        self.push_extended_properties(&mut element, member.metadata_properties());
        self.empty(element)
    }

    fn write_property_element_header(&mut self, property: &EdmProperty) -> Result<(), MetadataError> {
        let mut element = BytesStart::new("Property");
        element.push_attribute(("Name", property.name()));
        element.push_attribute(("Type", property.type_usage().edm_type().schema_name().as_str()));
        push_facets(&mut element, property.type_usage());
        self.push_extended_properties(&mut element, property.metadata_properties());
        self.start(element)
    }

    fn write_navigation_property_element(&mut self, navigation: &NavigationProperty) -> Result<(), MetadataError> {
        let mut element = BytesStart::new("NavigationProperty");
        element.push_attribute(("Name", navigation.name()));
        element.push_attribute(("Relationship", navigation.relationship_type().identity()));
        element.push_attribute(("FromRole", navigation.from_end_name()));
        element.push_attribute(("ToRole", navigation.to_end_name()));
        self.empty(element)
    }

    fn write_association_type_element_header(&mut self, association: &AssociationType) -> Result<(), MetadataError> {
        let mut element = BytesStart::new("Association");
        element.push_attribute(("Name", association.name()));
        self.push_extended_properties(&mut element, association.metadata_properties());
        self.start(element)
    }

    fn write_association_end_element_header(&mut self, end: &AssociationEndMember) -> Result<(), MetadataError> {
        let mut element = BytesStart::new("End");
        element.push_attribute(("Role", end.name()));
        if let Some(entity_type) = end.entity_type() {
            element.push_attribute(("Type", entity_type.identity()));
        }
        element.push_attribute(("Multiplicity", end.multiplicity().as_str()));
        self.start(element)
    }

    fn write_operation_action(&mut self, action: OperationAction) -> Result<(), MetadataError> {
        let mut element = BytesStart::new("OnDelete");
        element.push_attribute((
            "Action",
            match action {
                OperationAction::None => "None",
                OperationAction::Cascade => "Cascade",
            },
        ));
        self.empty(element)
    }

    fn write_referential_constraint_element(
        &mut self,
        constraint: &ReferentialConstraint,
    ) -> Result<(), MetadataError> {
        self.writer
            .write_event(Event::Start(BytesStart::new("ReferentialConstraint")))?;
        for (tag, role, properties) in [
            ("Principal", constraint.from_role(), constraint.from_properties()),
            ("Dependent", constraint.to_role(), constraint.to_properties()),
        ] {
            let mut element = BytesStart::new(tag);
            element.push_attribute(("Role", role));
            self.writer.write_event(Event::Start(element))?;
            self.write_property_refs(properties)?;
            self.writer.write_event(Event::End(BytesEnd::new(tag)))?;
        }
        self.writer
            .write_event(Event::End(BytesEnd::new("ReferentialConstraint")))?;
        Ok(())
    }

    fn write_function_element_header(&mut self, function: &EdmFunction) -> Result<(), MetadataError> {
        let tag = if function.is_function_import() {
            "FunctionImport"
        } else {
            "Function"
        };
        let mut element = BytesStart::new(tag);
        element.push_attribute(("Name", function.name()));
        if let Some(returns) = function.return_parameter() {
            element.push_attribute(("ReturnType", returns.type_usage().edm_type().schema_name().as_str()));
        }
        if let Some(entity_set) = function.entity_sets().first() {
            element.push_attribute(("EntitySet", entity_set.as_str()));
        }
        if self.is_store() {
            element.push_attribute(("Aggregate", bool_text(function.is_aggregate())));
            element.push_attribute(("BuiltIn", bool_text(function.is_built_in())));
            element.push_attribute(("NiladicFunction", bool_text(function.is_niladic())));
            element.push_attribute(("IsComposable", bool_text(function.is_composable())));
            if let Some(schema) = function.schema() {
                element.push_attribute(("Schema", schema));
            }
            if let Some(store_name) = function.store_function_name() {
                element.push_attribute(("StoreFunctionName", store_name));
            }
        }
        self.push_extended_properties(&mut element, function.metadata_properties());
        self.start(element)?;
        if let Some(command) = function.command_text() {
            self.writer
                .write_event(Event::Start(BytesStart::new("CommandText")))?;
            self.writer.write_event(Event::Text(BytesText::new(command)))?;
            self.writer
                .write_event(Event::End(BytesEnd::new("CommandText")))?;
        }
        Ok(())
    }

    fn write_function_parameter_element(&mut self, parameter: &FunctionParameter) -> Result<(), MetadataError> {
        let mut element = BytesStart::new("Parameter");
        element.push_attribute(("Name", parameter.name()));
        element.push_attribute(("Type", parameter.type_usage().edm_type().schema_name().as_str()));
        element.push_attribute(("Mode", parameter.mode().as_str()));
        self.empty(element)
    }

    fn write_end_element(&mut self) -> Result<(), MetadataError> {
        let name = self.open.pop().ok_or_else(|| MetadataError::XmlGenerationError {
            message: "end element written with no element open".to_string(),
        })?;
        self.writer.write_event(Event::End(BytesEnd::new(name)))?;
        Ok(())
    }
}
