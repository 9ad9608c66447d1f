//! Schema object model: the parsed, loosely typed input to conversion.
//!
//! Documents are produced by an external schema parser; this module
//! resolves names across a document set, validates it, and loads
//! documents from disk.

pub mod document;
pub mod loader;
pub mod resolve;
pub mod validate;

pub use document::{
    AnnotationElement, AssociationElement, AssociationEndElement, AssociationSetElement,
    AssociationSetEndElement, ComplexTypeElement, DocumentationElement, EntityContainerElement,
    EntityContainerMappingElement, EntitySetElement, EntityTypeElement, EnumMemberElement,
    EnumTypeElement, FacetElements, FunctionElement, FunctionImportElement, MappingDocument,
    MaxLengthValue, NavigationPropertyElement, ParameterElement, PropertyElement,
    ReferentialConstraintElement, RoleElement, SchemaDocument, SchemaElement, SchemaLayer,
    SetMappingElement,
};
pub use loader::{discover_artifacts, load_artifacts, ArtifactKind, LoadedArtifacts};
pub use resolve::{ElementKey, SchemaSet, SchemaTypeRef};
pub use validate::{is_valid_identifier, validate};

use crate::metadata::ParameterMode;

/// Schema versions this engine reads.
pub const SUPPORTED_SCHEMA_VERSIONS: [f64; 4] = [1.0, 1.1, 2.0, 3.0];

/// Highest schema version understood.
pub const MAXIMUM_SCHEMA_VERSION: f64 = 3.0;

/// Version with the legacy CollectionKind property facet.
pub const COLLECTION_KIND_VERSION: f64 = 1.1;

pub fn is_supported_version(version: f64) -> bool {
    SUPPORTED_SCHEMA_VERSIONS.contains(&version)
}

/// Parameter mode as written; absent means `In`.
pub fn parse_parameter_mode(mode: Option<&str>) -> Option<ParameterMode> {
    match mode {
        None | Some("In") => Some(ParameterMode::In),
        Some("Out") => Some(ParameterMode::Out),
        Some("InOut") => Some(ParameterMode::InOut),
        Some(_) => None,
    }
}
