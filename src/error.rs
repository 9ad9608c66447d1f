//! Error types for rust-edm

use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

use crate::metadata::DataSpace;
use crate::util::format_version;

/// Errors that can occur while building or querying metadata
#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("The operation '{operation}' cannot be performed because '{identity}' is read-only")]
    OperationOnReadOnlyItem {
        operation: &'static str,
        identity: String,
    },

    #[error("The operation '{operation}' cannot be performed because the collection is read-only")]
    OperationOnReadOnlyCollection { operation: &'static str },

    #[error("The item with identity '{identity}' already exists in the metadata collection")]
    DuplicateIdentity { identity: String },

    #[error("An item with an empty identity cannot be added to a metadata collection")]
    EmptyIdentity,

    #[error("More than one item in the metadata collection matches the identity '{identity}'")]
    AmbiguousIdentity { identity: String },

    #[error("The member with identity '{identity}' does not exist in the {space} metadata collection")]
    ItemNotFound { identity: String, space: String },

    #[error("The item '{identity}' is a {actual}, not a {expected}")]
    UnexpectedItemKind {
        identity: String,
        expected: &'static str,
        actual: &'static str,
    },

    #[error("Setting the base type of '{type_name}' to '{base_type}' would create a cycle in the type hierarchy")]
    CyclicBaseType {
        type_name: String,
        base_type: String,
    },

    #[error("Key members can only be declared on one level of an entity type hierarchy: '{type_name}' and its base '{base_type}' both declare keys")]
    KeysOnMultipleLevels {
        type_name: String,
        base_type: String,
    },

    #[error("Parameter '{parameter}' of function '{function}' has invalid mode '{mode}' for its position")]
    InvalidParameterMode {
        function: String,
        parameter: String,
        mode: String,
    },

    #[error("{}", join_schema_errors(.errors))]
    Schema { errors: Vec<EdmSchemaError> },

    #[error("The {collection} declares schema version {}, but the workspace already holds version {}", version(.actual), version(.expected))]
    SchemaVersionMismatch {
        collection: &'static str,
        expected: f64,
        actual: f64,
    },

    #[error("Schema version {} is not supported", self::version(.version))]
    UnsupportedSchemaVersion { version: f64 },

    #[error("The space '{space}' has no associated item collection")]
    ItemCollectionNotRegistered { space: DataSpace },

    #[error("An item collection for the space '{space}' is already registered")]
    ItemCollectionAlreadyRegistered { space: DataSpace },

    #[error("The operation '{operation}' requires a {expected} type, but '{identity}' belongs to {actual}")]
    InvalidDataSpace {
        operation: &'static str,
        identity: String,
        expected: DataSpace,
        actual: DataSpace,
    },

    #[error("Mapping for type '{identity}' was not found")]
    MappingNotFound { identity: String },

    #[error("The mapping for '{identity}' is not an object type mapping")]
    NotAnObjectTypeMapping { identity: String },

    #[error("Object mapping error: {message}")]
    ObjectMapping { message: String },

    #[error("Storage mapping error: {message}")]
    StorageMapping { message: String },

    #[error("The CLR type '{clr_type}' is mapped to the conceptual type '{edm_type}' more than once")]
    AmbiguousClrTypeMapping { clr_type: String, edm_type: String },

    #[error("Internal metadata consistency fault: {message}")]
    InternalFault { message: String },

    #[error("Failed to read metadata file: {path}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse schema document: {path}")]
    DocumentParseError {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Failed to parse project file: {path}")]
    ProjectParseError {
        path: PathBuf,
        #[source]
        source: roxmltree::Error,
    },

    #[error("Invalid project file format: {message}")]
    InvalidProjectFormat { message: String },

    #[error("XML generation error: {message}")]
    XmlGenerationError { message: String },
}

impl MetadataError {
    pub(crate) fn internal(message: impl Into<String>) -> Self {
        MetadataError::InternalFault {
            message: message.into(),
        }
    }

    pub(crate) fn not_found(identity: impl Into<String>, space: DataSpace) -> Self {
        MetadataError::ItemNotFound {
            identity: identity.into(),
            space: space.to_string(),
        }
    }
}

impl From<quick_xml::Error> for MetadataError {
    fn from(err: quick_xml::Error) -> Self {
        MetadataError::XmlGenerationError {
            message: err.to_string(),
        }
    }
}

impl From<std::io::Error> for MetadataError {
    fn from(err: std::io::Error) -> Self {
        MetadataError::XmlGenerationError {
            message: err.to_string(),
        }
    }
}

fn version(value: &f64) -> String {
    format_version(*value)
}

fn join_schema_errors(errors: &[EdmSchemaError]) -> String {
    let mut message = String::from("Schema specified is not valid. Errors:");
    for error in errors {
        message.push('\n');
        message.push_str(&error.to_string());
    }
    message
}

/// Severity of a recorded schema error
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    Warning,
    Error,
}

/// Stable numeric codes for recorded schema errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCode {
    InvalidName,
    AlreadyDefined,
    NotInNamespace,
    BadNavigationProperty,
    InvalidRoleInRelationship,
    InvalidMultiplicity,
    KeyMissingOnEntityType,
    InvalidKey,
    InvalidPropertyType,
    InvalidAssociation,
    InvalidEntitySet,
    InvalidReferentialConstraint,
    InvalidFunction,
    InvalidEnumType,
    InvalidSchemaVersion,
    InvalidAnnotation,
    DuplicatedFunctionOverloads,
    CycleInTypeHierarchy,
    InvalidMapping,
    ValidatorError,
}

impl ErrorCode {
    pub fn code(&self) -> i32 {
        match self {
            ErrorCode::InvalidName => 6,
            ErrorCode::AlreadyDefined => 19,
            ErrorCode::NotInNamespace => 40,
            ErrorCode::BadNavigationProperty => 74,
            ErrorCode::InvalidRoleInRelationship => 77,
            ErrorCode::InvalidMultiplicity => 92,
            ErrorCode::KeyMissingOnEntityType => 75,
            ErrorCode::InvalidKey => 110,
            ErrorCode::InvalidPropertyType => 117,
            ErrorCode::InvalidAssociation => 124,
            ErrorCode::InvalidEntitySet => 130,
            ErrorCode::InvalidReferentialConstraint => 133,
            ErrorCode::InvalidFunction => 150,
            ErrorCode::InvalidEnumType => 160,
            ErrorCode::InvalidSchemaVersion => 171,
            ErrorCode::InvalidAnnotation => 172,
            ErrorCode::DuplicatedFunctionOverloads => 174,
            ErrorCode::CycleInTypeHierarchy => 62,
            ErrorCode::InvalidMapping => 2001,
            ErrorCode::ValidatorError => 200,
        }
    }
}

/// A recorded, non-fatal user-data error produced while loading schemas
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EdmSchemaError {
    pub message: String,
    pub code: ErrorCode,
    pub severity: Severity,
    /// Document and element path the error was reported against, when known
    pub location: Option<String>,
}

impl EdmSchemaError {
    pub fn new(message: impl Into<String>, code: ErrorCode, severity: Severity) -> Self {
        Self {
            message: message.into(),
            code,
            severity,
            location: None,
        }
    }

    pub fn error(message: impl Into<String>, code: ErrorCode) -> Self {
        Self::new(message, code, Severity::Error)
    }

    pub fn warning(message: impl Into<String>, code: ErrorCode) -> Self {
        Self::new(message, code, Severity::Warning)
    }

    pub fn at(mut self, location: impl Into<String>) -> Self {
        self.location = Some(location.into());
        self
    }

    pub fn is_warning(&self) -> bool {
        self.severity == Severity::Warning
    }
}

impl fmt::Display for EdmSchemaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let severity = match self.severity {
            Severity::Warning => "warning",
            Severity::Error => "error",
        };
        match &self.location {
            Some(location) => write!(
                f,
                "{} ({}) : {} {:04}: {}",
                location,
                severity,
                severity,
                self.code.code(),
                self.message
            ),
            None => write!(f, "{} {:04}: {}", severity, self.code.code(), self.message),
        }
    }
}

/// True when every recorded error is a warning.
pub fn only_warnings(errors: &[EdmSchemaError]) -> bool {
    errors.iter().all(EdmSchemaError::is_warning)
}
