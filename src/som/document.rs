//! Schema-object-model nodes, as produced by the external schema parser.
//!
//! Documents are JSON; every node is a plain value tree.

use serde::{Deserialize, Serialize};

/// Which layer a schema document describes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum SchemaLayer {
    Conceptual,
    Storage,
}

/// One schema document: a namespace and its elements
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SchemaDocument {
    pub namespace: String,
    #[serde(default)]
    pub alias: Option<String>,
    pub layer: SchemaLayer,
    #[serde(default = "default_version")]
    pub version: f64,
    #[serde(default)]
    pub provider: Option<String>,
    #[serde(default)]
    pub provider_manifest_token: Option<String>,
    #[serde(default)]
    pub elements: Vec<SchemaElement>,
    /// Path the document was read from; set by the loader.
    #[serde(skip)]
    pub location: Option<String>,
}

fn default_version() -> f64 {
    3.0
}

fn default_true() -> bool {
    true
}

impl SchemaDocument {
    pub fn new(namespace: impl Into<String>, layer: SchemaLayer, version: f64) -> Self {
        Self {
            namespace: namespace.into(),
            alias: None,
            layer,
            version,
            provider: None,
            provider_manifest_token: None,
            elements: Vec::new(),
            location: None,
        }
    }

    /// Location used when reporting errors against this document.
    pub fn display_location(&self) -> &str {
        self.location.as_deref().unwrap_or(&self.namespace)
    }
}

/// Free-text documentation attached to a node
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentationElement {
    #[serde(default)]
    pub summary: String,
    #[serde(default)]
    pub long_description: String,
}

/// Arbitrary extension content, named `namespaceUri:attributeName`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnnotationElement {
    pub name: String,
    pub value: String,
}

/// A top-level schema element
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind")]
pub enum SchemaElement {
    EntityType(EntityTypeElement),
    ComplexType(ComplexTypeElement),
    Association(AssociationElement),
    EnumType(EnumTypeElement),
    Function(FunctionElement),
    EntityContainer(EntityContainerElement),
}

impl SchemaElement {
    pub fn name(&self) -> &str {
        match self {
            SchemaElement::EntityType(e) => &e.name,
            SchemaElement::ComplexType(e) => &e.name,
            SchemaElement::Association(e) => &e.name,
            SchemaElement::EnumType(e) => &e.name,
            SchemaElement::Function(e) => &e.name,
            SchemaElement::EntityContainer(e) => &e.name,
        }
    }

    pub fn kind_name(&self) -> &'static str {
        match self {
            SchemaElement::EntityType(_) => "EntityType",
            SchemaElement::ComplexType(_) => "ComplexType",
            SchemaElement::Association(_) => "Association",
            SchemaElement::EnumType(_) => "EnumType",
            SchemaElement::Function(_) => "Function",
            SchemaElement::EntityContainer(_) => "EntityContainer",
        }
    }

    /// Containers are not namespace qualified; functions may be overloaded.
    pub fn is_qualified_type(&self) -> bool {
        !matches!(
            self,
            SchemaElement::EntityContainer(_) | SchemaElement::Function(_)
        )
    }
}

/// MaxLength as written: a number or the keyword `Max`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MaxLengthValue {
    Length(i32),
    Keyword(String),
}

impl MaxLengthValue {
    pub fn is_max(&self) -> bool {
        matches!(self, MaxLengthValue::Keyword(k) if k.eq_ignore_ascii_case("max"))
    }
}

/// Facets that may be written on a property, parameter or return type
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FacetElements {
    #[serde(default)]
    pub max_length: Option<MaxLengthValue>,
    #[serde(default)]
    pub fixed_length: Option<bool>,
    #[serde(default)]
    pub unicode: Option<bool>,
    #[serde(default)]
    pub precision: Option<u8>,
    #[serde(default)]
    pub scale: Option<u8>,
    #[serde(default)]
    pub srid: Option<i32>,
    #[serde(default)]
    pub collation: Option<String>,
}

impl FacetElements {
    pub fn is_empty(&self) -> bool {
        *self == FacetElements::default()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PropertyElement {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    #[serde(default = "default_true")]
    pub nullable: bool,
    #[serde(default)]
    pub default_value: Option<String>,
    #[serde(default, flatten)]
    pub facets: FacetElements,
    #[serde(default)]
    pub concurrency_mode: Option<String>,
    #[serde(default)]
    pub store_generated_pattern: Option<String>,
    /// Legacy collection kind (schema version 1.1 only).
    #[serde(default)]
    pub collection_kind: Option<String>,
    #[serde(default)]
    pub documentation: Option<DocumentationElement>,
    #[serde(default)]
    pub annotations: Vec<AnnotationElement>,
}

impl PropertyElement {
    pub fn new(name: impl Into<String>, type_name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            type_name: type_name.into(),
            nullable: true,
            default_value: None,
            facets: FacetElements::default(),
            concurrency_mode: None,
            store_generated_pattern: None,
            collection_kind: None,
            documentation: None,
            annotations: Vec::new(),
        }
    }

    pub fn not_null(mut self) -> Self {
        self.nullable = false;
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationPropertyElement {
    pub name: String,
    pub relationship: String,
    pub from_role: String,
    pub to_role: String,
    #[serde(default)]
    pub documentation: Option<DocumentationElement>,
    #[serde(default)]
    pub annotations: Vec<AnnotationElement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityTypeElement {
    pub name: String,
    #[serde(default)]
    pub base_type: Option<String>,
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    #[serde(default)]
    pub key: Vec<String>,
    #[serde(default)]
    pub properties: Vec<PropertyElement>,
    #[serde(default)]
    pub navigation_properties: Vec<NavigationPropertyElement>,
    #[serde(default)]
    pub documentation: Option<DocumentationElement>,
    #[serde(default)]
    pub annotations: Vec<AnnotationElement>,
}

impl EntityTypeElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            base_type: None,
            is_abstract: false,
            key: Vec::new(),
            properties: Vec::new(),
            navigation_properties: Vec::new(),
            documentation: None,
            annotations: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComplexTypeElement {
    pub name: String,
    #[serde(default)]
    pub base_type: Option<String>,
    #[serde(default, rename = "abstract")]
    pub is_abstract: bool,
    #[serde(default)]
    pub properties: Vec<PropertyElement>,
    #[serde(default)]
    pub documentation: Option<DocumentationElement>,
    #[serde(default)]
    pub annotations: Vec<AnnotationElement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociationEndElement {
    pub role: String,
    #[serde(rename = "type")]
    pub type_name: String,
    pub multiplicity: String,
    #[serde(default)]
    pub on_delete: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoleElement {
    pub role: String,
    #[serde(default)]
    pub property_refs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferentialConstraintElement {
    pub principal: RoleElement,
    pub dependent: RoleElement,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociationElement {
    pub name: String,
    #[serde(default)]
    pub ends: Vec<AssociationEndElement>,
    #[serde(default)]
    pub referential_constraint: Option<ReferentialConstraintElement>,
    #[serde(default)]
    pub documentation: Option<DocumentationElement>,
    #[serde(default)]
    pub annotations: Vec<AnnotationElement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnumMemberElement {
    pub name: String,
    #[serde(default)]
    pub value: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnumTypeElement {
    pub name: String,
    #[serde(default)]
    pub underlying_type: Option<String>,
    #[serde(default)]
    pub is_flags: bool,
    #[serde(default)]
    pub members: Vec<EnumMemberElement>,
    #[serde(default)]
    pub documentation: Option<DocumentationElement>,
    #[serde(default)]
    pub annotations: Vec<AnnotationElement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ParameterElement {
    pub name: String,
    #[serde(rename = "type")]
    pub type_name: String,
    /// `In`, `Out` or `InOut`; defaults to `In`.
    #[serde(default)]
    pub mode: Option<String>,
    #[serde(default, flatten)]
    pub facets: FacetElements,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionElement {
    pub name: String,
    #[serde(default)]
    pub return_type: Option<String>,
    #[serde(default)]
    pub return_facets: FacetElements,
    #[serde(default)]
    pub parameters: Vec<ParameterElement>,
    #[serde(default)]
    pub aggregate: bool,
    #[serde(default)]
    pub built_in: bool,
    #[serde(default)]
    pub niladic: bool,
    #[serde(default = "default_true")]
    pub is_composable: bool,
    #[serde(default)]
    pub command_text: Option<String>,
    #[serde(default)]
    pub store_function_name: Option<String>,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub documentation: Option<DocumentationElement>,
    #[serde(default)]
    pub annotations: Vec<AnnotationElement>,
}

impl FunctionElement {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            return_type: None,
            return_facets: FacetElements::default(),
            parameters: Vec::new(),
            aggregate: false,
            built_in: false,
            niladic: false,
            is_composable: true,
            command_text: None,
            store_function_name: None,
            schema: None,
            documentation: None,
            annotations: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntitySetElement {
    pub name: String,
    pub entity_type: String,
    #[serde(default)]
    pub schema: Option<String>,
    #[serde(default)]
    pub table: Option<String>,
    #[serde(default)]
    pub defining_query: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociationSetEndElement {
    pub role: String,
    pub entity_set: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssociationSetElement {
    pub name: String,
    pub association: String,
    #[serde(default)]
    pub ends: Vec<AssociationSetEndElement>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionImportElement {
    pub name: String,
    #[serde(default)]
    pub return_type: Option<String>,
    #[serde(default)]
    pub entity_set: Option<String>,
    #[serde(default)]
    pub parameters: Vec<ParameterElement>,
    #[serde(default)]
    pub is_composable: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityContainerElement {
    pub name: String,
    #[serde(default)]
    pub entity_sets: Vec<EntitySetElement>,
    #[serde(default)]
    pub association_sets: Vec<AssociationSetElement>,
    #[serde(default)]
    pub function_imports: Vec<FunctionImportElement>,
    #[serde(default)]
    pub documentation: Option<DocumentationElement>,
    #[serde(default)]
    pub annotations: Vec<AnnotationElement>,
}

/// Conceptual ↔ storage container pairing from a mapping document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EntityContainerMappingElement {
    pub conceptual_container: String,
    pub storage_container: String,
    #[serde(default)]
    pub entity_set_mappings: Vec<SetMappingElement>,
    #[serde(default)]
    pub association_set_mappings: Vec<SetMappingElement>,
}

/// A conceptual set stored in a store entity set
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetMappingElement {
    pub name: String,
    pub store_entity_set: String,
}

/// A mapping (conceptual ↔ storage) document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MappingDocument {
    #[serde(default = "default_version")]
    pub version: f64,
    #[serde(default)]
    pub container_mappings: Vec<EntityContainerMappingElement>,
    #[serde(skip)]
    pub location: Option<String>,
}
