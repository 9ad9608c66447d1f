//! Structural validation of schema documents before conversion.
//!
//! Problems are recorded as [`EdmSchemaError`]s rather than returned as
//! failures, so one pass reports everything wrong with a document set.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use regex::Regex;

use super::document::{
    AnnotationElement, AssociationElement, ComplexTypeElement, EntityContainerElement,
    EntityTypeElement, EnumTypeElement, FunctionElement, ParameterElement, PropertyElement,
    SchemaElement,
};
use super::resolve::{ElementKey, SchemaSet, SchemaTypeRef};
use super::{is_supported_version, parse_parameter_mode};
use crate::error::{EdmSchemaError, ErrorCode};
use crate::metadata::{DataSpace, RelationshipMultiplicity};

static IDENTIFIER: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[\p{L}\p{Nl}_][\p{L}\p{Nl}\p{Nd}\p{Mn}\p{Mc}\p{Pc}\p{Cf}]*$")
        .expect("identifier pattern is valid")
});

/// True when `name` is a valid simple identifier.
pub fn is_valid_identifier(name: &str) -> bool {
    IDENTIFIER.is_match(name)
}

/// True when every dot-separated segment of `name` is an identifier.
pub fn is_valid_qualified_name(name: &str) -> bool {
    !name.is_empty() && name.split('.').all(is_valid_identifier)
}

/// Validate every document of a set; the result may contain warnings only.
pub fn validate(set: &SchemaSet) -> Vec<EdmSchemaError> {
    let mut validator = Validator {
        set,
        errors: Vec::new(),
    };
    validator.run();
    validator.errors
}

struct Validator<'a> {
    set: &'a SchemaSet,
    errors: Vec<EdmSchemaError>,
}

impl<'a> Validator<'a> {
    fn run(&mut self) {
        self.check_versions();
        for (index, document) in self.set.documents().iter().enumerate() {
            if !is_valid_qualified_name(&document.namespace) {
                self.error(
                    index,
                    ErrorCode::InvalidName,
                    format!("The namespace '{}' is not a valid name", document.namespace),
                );
            }
        }
        for key in self.set.duplicates().to_vec() {
            if let Some(name) = self.set.qualified_name(key) {
                self.error(
                    key.document,
                    ErrorCode::AlreadyDefined,
                    format!("'{}' is already defined", name),
                );
            }
        }
        let keys: Vec<ElementKey> = self.set.keys().collect();
        for key in keys {
            let Some(element) = self.set.element(key) else {
                continue;
            };
            if !is_valid_identifier(element.name()) {
                self.error(
                    key.document,
                    ErrorCode::InvalidName,
                    format!(
                        "The {} name '{}' is not a valid identifier",
                        element.kind_name(),
                        element.name()
                    ),
                );
            }
            match element {
                SchemaElement::EntityType(entity) => self.check_entity_type(key, entity),
                SchemaElement::ComplexType(complex) => self.check_complex_type(key, complex),
                SchemaElement::Association(association) => self.check_association(key, association),
                SchemaElement::EnumType(enum_type) => self.check_enum_type(key, enum_type),
                SchemaElement::Function(function) => self.check_function(key, function),
                SchemaElement::EntityContainer(container) => self.check_container(key, container),
            }
        }
        self.check_function_overloads();
    }

    fn error(&mut self, document: usize, code: ErrorCode, message: String) {
        let mut error = EdmSchemaError::error(message, code);
        if let Some(doc) = self.set.document(document) {
            error = error.at(doc.display_location());
        }
        self.errors.push(error);
    }

    fn warning(&mut self, document: usize, code: ErrorCode, message: String) {
        let mut warning = EdmSchemaError::warning(message, code);
        if let Some(doc) = self.set.document(document) {
            warning = warning.at(doc.display_location());
        }
        self.errors.push(warning);
    }

    fn check_versions(&mut self) {
        let Some(first) = self.set.version() else {
            return;
        };
        for (index, document) in self.set.documents().iter().enumerate() {
            if !is_supported_version(document.version) {
                self.error(
                    index,
                    ErrorCode::InvalidSchemaVersion,
                    format!("Schema version {} is not supported", document.version),
                );
            } else if document.version != first {
                self.error(
                    index,
                    ErrorCode::InvalidSchemaVersion,
                    format!(
                        "Schema version {} differs from version {} of the other documents",
                        document.version, first
                    ),
                );
            }
        }
    }

    fn check_annotations(&mut self, document: usize, owner: &str, annotations: &[AnnotationElement]) {
        for annotation in annotations {
            if !annotation.name.contains(':') {
                self.warning(
                    document,
                    ErrorCode::InvalidAnnotation,
                    format!(
                        "Annotation '{}' on '{}' is not qualified with a namespace and is ignored",
                        annotation.name, owner
                    ),
                );
            }
        }
    }

    fn check_properties(&mut self, key: ElementKey, owner: &str, properties: &[PropertyElement]) {
        let mut seen = HashSet::new();
        for property in properties {
            if !is_valid_identifier(&property.name) {
                self.error(
                    key.document,
                    ErrorCode::InvalidName,
                    format!("The property name '{}' on '{}' is not valid", property.name, owner),
                );
            }
            if !seen.insert(property.name.as_str()) {
                self.error(
                    key.document,
                    ErrorCode::AlreadyDefined,
                    format!("Property '{}' is already defined on '{}'", property.name, owner),
                );
            }
            self.check_property_type(key, owner, property);
            self.check_annotations(key.document, &property.name, &property.annotations);
        }
    }

    fn check_property_type(&mut self, key: ElementKey, owner: &str, property: &PropertyElement) {
        let Some(resolved) = self.set.resolve_type(key.document, &property.type_name) else {
            self.error(
                key.document,
                ErrorCode::NotInNamespace,
                format!(
                    "Type '{}' of property '{}.{}' is not defined",
                    property.type_name, owner, property.name
                ),
            );
            return;
        };
        let allowed = match &resolved {
            SchemaTypeRef::Primitive(_) => true,
            SchemaTypeRef::Element(target) => {
                self.set.data_space() == DataSpace::CSpace
                    && matches!(
                        self.set.element(*target),
                        Some(SchemaElement::ComplexType(_) | SchemaElement::EnumType(_))
                    )
            }
            SchemaTypeRef::Collection(_) => false,
        };
        if !allowed {
            self.error(
                key.document,
                ErrorCode::InvalidPropertyType,
                format!(
                    "Property '{}.{}' has type '{}', which a property may not use",
                    owner, property.name, property.type_name
                ),
            );
        }
    }

    /// Base type must resolve to the same kind and must not lead back here.
    fn check_base_type(&mut self, key: ElementKey, owner: &str, base_type: Option<&str>, entity: bool) {
        let Some(base_name) = base_type else {
            return;
        };
        let Some(base_key) = self.set.resolve_element(key.document, base_name) else {
            self.error(
                key.document,
                ErrorCode::NotInNamespace,
                format!("Base type '{}' of '{}' is not defined", base_name, owner),
            );
            return;
        };
        let same_kind = match self.set.element(base_key) {
            Some(SchemaElement::EntityType(_)) => entity,
            Some(SchemaElement::ComplexType(_)) => !entity,
            _ => false,
        };
        if !same_kind {
            self.error(
                key.document,
                ErrorCode::InvalidPropertyType,
                format!("Base type '{}' of '{}' is not of the same kind", base_name, owner),
            );
            return;
        }

        let mut seen = HashSet::from([key]);
        let mut current = Some(base_key);
        while let Some(ancestor) = current {
            if !seen.insert(ancestor) {
                self.error(
                    key.document,
                    ErrorCode::CycleInTypeHierarchy,
                    format!("The type hierarchy of '{}' contains a cycle", owner),
                );
                return;
            }
            current = self
                .base_type_name(ancestor)
                .and_then(|name| self.set.resolve_element(ancestor.document, name));
        }
    }

    fn base_type_name(&self, key: ElementKey) -> Option<&'a str> {
        match self.set.element(key)? {
            SchemaElement::EntityType(entity) => entity.base_type.as_deref(),
            SchemaElement::ComplexType(complex) => complex.base_type.as_deref(),
            _ => None,
        }
    }

    fn check_entity_type(&mut self, key: ElementKey, entity: &EntityTypeElement) {
        let owner = entity.name.as_str();
        self.check_base_type(key, owner, entity.base_type.as_deref(), true);
        self.check_properties(key, owner, &entity.properties);
        self.check_annotations(key.document, owner, &entity.annotations);

        if entity.base_type.is_none() && entity.key.is_empty() {
            self.error(
                key.document,
                ErrorCode::KeyMissingOnEntityType,
                format!("The entity type '{}' has no key defined", owner),
            );
        }
        if entity.base_type.is_some() && !entity.key.is_empty() {
            self.error(
                key.document,
                ErrorCode::InvalidKey,
                format!(
                    "Key is declared on derived entity type '{}'; only the root type may declare keys",
                    owner
                ),
            );
        }
        for key_name in &entity.key {
            match entity.properties.iter().find(|p| &p.name == key_name) {
                None => self.error(
                    key.document,
                    ErrorCode::InvalidKey,
                    format!("Key part '{}' is not a property of '{}'", key_name, owner),
                ),
                Some(property) if property.nullable => self.error(
                    key.document,
                    ErrorCode::InvalidKey,
                    format!("Key part '{}' of '{}' must not be nullable", key_name, owner),
                ),
                Some(_) => {}
            }
        }

        let mut member_names: HashSet<&str> = entity.properties.iter().map(|p| p.name.as_str()).collect();
        for navigation in &entity.navigation_properties {
            if !member_names.insert(navigation.name.as_str()) {
                self.error(
                    key.document,
                    ErrorCode::AlreadyDefined,
                    format!("Member '{}' is already defined on '{}'", navigation.name, owner),
                );
            }
            self.check_annotations(key.document, &navigation.name, &navigation.annotations);
            let association = self
                .set
                .resolve_element(key.document, &navigation.relationship)
                .and_then(|k| self.set.association(k));
            let Some(association) = association else {
                self.error(
                    key.document,
                    ErrorCode::BadNavigationProperty,
                    format!(
                        "Relationship '{}' of navigation property '{}.{}' is not an association",
                        navigation.relationship, owner, navigation.name
                    ),
                );
                continue;
            };
            let has_role = |role: &str| association.ends.iter().any(|end| end.role == role);
            if !has_role(&navigation.from_role) || !has_role(&navigation.to_role) {
                self.error(
                    key.document,
                    ErrorCode::InvalidRoleInRelationship,
                    format!(
                        "Navigation property '{}.{}' names a role that '{}' does not define",
                        owner, navigation.name, navigation.relationship
                    ),
                );
            } else if navigation.from_role == navigation.to_role {
                self.error(
                    key.document,
                    ErrorCode::BadNavigationProperty,
                    format!(
                        "Navigation property '{}.{}' uses role '{}' for both ends",
                        owner, navigation.name, navigation.from_role
                    ),
                );
            }
        }
    }

    fn check_complex_type(&mut self, key: ElementKey, complex: &ComplexTypeElement) {
        let owner = complex.name.as_str();
        self.check_base_type(key, owner, complex.base_type.as_deref(), false);
        self.check_properties(key, owner, &complex.properties);
        self.check_annotations(key.document, owner, &complex.annotations);
    }

    fn check_association(&mut self, key: ElementKey, association: &AssociationElement) {
        let owner = association.name.as_str();
        self.check_annotations(key.document, owner, &association.annotations);
        if association.ends.len() != 2 {
            self.error(
                key.document,
                ErrorCode::InvalidAssociation,
                format!(
                    "Association '{}' must have exactly two ends, found {}",
                    owner,
                    association.ends.len()
                ),
            );
        }
        let mut roles = HashSet::new();
        for end in &association.ends {
            if !roles.insert(end.role.as_str()) {
                self.error(
                    key.document,
                    ErrorCode::AlreadyDefined,
                    format!("Role '{}' is already defined on '{}'", end.role, owner),
                );
            }
            let is_entity = self
                .set
                .resolve_element(key.document, &end.type_name)
                .and_then(|k| self.set.entity_type(k))
                .is_some();
            if !is_entity {
                self.error(
                    key.document,
                    ErrorCode::NotInNamespace,
                    format!(
                        "Type '{}' of end '{}' in '{}' is not a defined entity type",
                        end.type_name, end.role, owner
                    ),
                );
            }
            if RelationshipMultiplicity::parse(&end.multiplicity).is_none() {
                self.error(
                    key.document,
                    ErrorCode::InvalidMultiplicity,
                    format!(
                        "Multiplicity '{}' of end '{}' in '{}' is not valid",
                        end.multiplicity, end.role, owner
                    ),
                );
            }
            if let Some(action) = end.on_delete.as_deref() {
                if action != "None" && action != "Cascade" {
                    self.error(
                        key.document,
                        ErrorCode::InvalidAssociation,
                        format!("OnDelete action '{}' of end '{}' is not valid", action, end.role),
                    );
                }
            }
        }

        let Some(constraint) = association.referential_constraint.as_ref() else {
            return;
        };
        for role in [&constraint.principal, &constraint.dependent] {
            let end = association.ends.iter().find(|end| end.role == role.role);
            let Some(end) = end else {
                self.error(
                    key.document,
                    ErrorCode::InvalidRoleInRelationship,
                    format!("Constraint role '{}' is not an end of '{}'", role.role, owner),
                );
                continue;
            };
            let entity = self
                .set
                .resolve_element(key.document, &end.type_name)
                .and_then(|k| self.set.entity_type(k));
            if let Some(entity) = entity {
                for property in &role.property_refs {
                    if !self.entity_has_property(key.document, entity, property) {
                        self.error(
                            key.document,
                            ErrorCode::InvalidReferentialConstraint,
                            format!(
                                "Property '{}' of constraint role '{}' is not declared on '{}'",
                                property, role.role, entity.name
                            ),
                        );
                    }
                }
            }
        }
        if constraint.principal.property_refs.len() != constraint.dependent.property_refs.len() {
            self.error(
                key.document,
                ErrorCode::InvalidReferentialConstraint,
                format!(
                    "The principal and dependent roles of '{}' list different numbers of properties",
                    owner
                ),
            );
        }
    }

    /// Property declared on the entity or one of its ancestors.
    fn entity_has_property(&self, document: usize, entity: &EntityTypeElement, name: &str) -> bool {
        let mut current = Some((document, entity));
        let mut guard = 0;
        while let Some((doc, candidate)) = current {
            if candidate.properties.iter().any(|p| p.name == name) {
                return true;
            }
            guard += 1;
            if guard > self.set.documents().len() * 64 + 64 {
                return false;
            }
            current = candidate
                .base_type
                .as_deref()
                .and_then(|base| self.set.resolve_element(doc, base))
                .and_then(|k| self.set.entity_type(k).map(|e| (k.document, e)));
        }
        false
    }

    fn check_enum_type(&mut self, key: ElementKey, enum_type: &EnumTypeElement) {
        let owner = enum_type.name.as_str();
        self.check_annotations(key.document, owner, &enum_type.annotations);
        let version = self.set.document(key.document).map(|d| d.version).unwrap_or(0.0);
        if self.set.data_space() != DataSpace::CSpace || version < 3.0 {
            self.error(
                key.document,
                ErrorCode::InvalidEnumType,
                format!("Enum type '{}' requires a conceptual schema of version 3.0", owner),
            );
            return;
        }
        let underlying_name = enum_type.underlying_type.as_deref().unwrap_or("Int32");
        let underlying = self.set.resolve_primitive(key.document, underlying_name);
        let Some(range) = underlying
            .as_ref()
            .filter(|t| t.kind().is_enum_underlying())
            .and_then(|t| t.kind().integral_range())
        else {
            self.error(
                key.document,
                ErrorCode::InvalidEnumType,
                format!(
                    "Underlying type '{}' of enum '{}' must be Byte, SByte, Int16, Int32 or Int64",
                    underlying_name, owner
                ),
            );
            return;
        };

        let mut names = HashSet::new();
        let mut next = 0i64;
        for member in &enum_type.members {
            if !names.insert(member.name.as_str()) {
                self.error(
                    key.document,
                    ErrorCode::AlreadyDefined,
                    format!("Member '{}' is already defined on '{}'", member.name, owner),
                );
            }
            let value = member.value.unwrap_or(next);
            if value < range.0 || value > range.1 {
                self.error(
                    key.document,
                    ErrorCode::InvalidEnumType,
                    format!(
                        "Value {} of member '{}.{}' is outside the range of '{}'",
                        value, owner, member.name, underlying_name
                    ),
                );
            }
            next = value.saturating_add(1);
        }
    }

    fn check_parameters(&mut self, key: ElementKey, owner: &str, parameters: &[ParameterElement]) {
        let mut seen = HashSet::new();
        for parameter in parameters {
            if !seen.insert(parameter.name.as_str()) {
                self.error(
                    key.document,
                    ErrorCode::AlreadyDefined,
                    format!("Parameter '{}' is already defined on '{}'", parameter.name, owner),
                );
            }
            if self.set.resolve_type(key.document, &parameter.type_name).is_none() {
                self.error(
                    key.document,
                    ErrorCode::NotInNamespace,
                    format!(
                        "Type '{}' of parameter '{}' of '{}' is not defined",
                        parameter.type_name, parameter.name, owner
                    ),
                );
            }
            if parse_parameter_mode(parameter.mode.as_deref()).is_none() {
                self.error(
                    key.document,
                    ErrorCode::InvalidFunction,
                    format!(
                        "Mode '{}' of parameter '{}' of '{}' is not In, Out or InOut",
                        parameter.mode.as_deref().unwrap_or_default(),
                        parameter.name,
                        owner
                    ),
                );
            }
        }
    }

    fn check_function(&mut self, key: ElementKey, function: &FunctionElement) {
        let owner = function.name.as_str();
        self.check_annotations(key.document, owner, &function.annotations);
        self.check_parameters(key, owner, &function.parameters);
        if let Some(return_type) = function.return_type.as_deref() {
            if self.set.resolve_type(key.document, return_type).is_none() {
                self.error(
                    key.document,
                    ErrorCode::NotInNamespace,
                    format!("Return type '{}' of function '{}' is not defined", return_type, owner),
                );
            }
        }
        if function.niladic && !function.parameters.is_empty() {
            self.error(
                key.document,
                ErrorCode::InvalidFunction,
                format!("Niladic function '{}' may not declare parameters", owner),
            );
        }
        if function.aggregate && function.parameters.len() != 1 {
            self.error(
                key.document,
                ErrorCode::InvalidFunction,
                format!("Aggregate function '{}' must take exactly one parameter", owner),
            );
        }
    }

    /// Two overloads may not share a parameter signature.
    fn check_function_overloads(&mut self) {
        let mut groups: Vec<&Vec<ElementKey>> = self
            .set
            .all_function_groups()
            .map(|(_, keys)| keys)
            .filter(|keys| keys.len() > 1)
            .collect();
        groups.sort();
        for keys in groups {
            let mut signatures = HashSet::new();
            for key in keys {
                let Some(function) = self.set.function(*key) else {
                    continue;
                };
                let signature: Vec<String> = function
                    .parameters
                    .iter()
                    .map(|p| {
                        format!(
                            "{} {}",
                            p.mode.as_deref().unwrap_or("In"),
                            self.set.normalize(key.document, &p.type_name)
                        )
                    })
                    .collect();
                if !signatures.insert(signature) {
                    self.error(
                        key.document,
                        ErrorCode::AlreadyDefined,
                        format!(
                            "An overload of '{}' with the same parameters is already defined",
                            function.name
                        ),
                    );
                }
            }
        }
    }

    fn check_container(&mut self, key: ElementKey, container: &EntityContainerElement) {
        let owner = container.name.as_str();
        self.check_annotations(key.document, owner, &container.annotations);
        let mut set_names = HashSet::new();

        for entity_set in &container.entity_sets {
            if !set_names.insert(entity_set.name.as_str()) {
                self.error(
                    key.document,
                    ErrorCode::AlreadyDefined,
                    format!("Set '{}' is already defined in '{}'", entity_set.name, owner),
                );
            }
            let is_entity = self
                .set
                .resolve_element(key.document, &entity_set.entity_type)
                .and_then(|k| self.set.entity_type(k))
                .is_some();
            if !is_entity {
                self.error(
                    key.document,
                    ErrorCode::InvalidEntitySet,
                    format!(
                        "Entity set '{}' refers to '{}', which is not a defined entity type",
                        entity_set.name, entity_set.entity_type
                    ),
                );
            }
        }

        for association_set in &container.association_sets {
            if !set_names.insert(association_set.name.as_str()) {
                self.error(
                    key.document,
                    ErrorCode::AlreadyDefined,
                    format!("Set '{}' is already defined in '{}'", association_set.name, owner),
                );
            }
            let association = self
                .set
                .resolve_element(key.document, &association_set.association)
                .and_then(|k| self.set.association(k));
            let Some(association) = association else {
                self.error(
                    key.document,
                    ErrorCode::InvalidEntitySet,
                    format!(
                        "Association set '{}' refers to '{}', which is not a defined association",
                        association_set.name, association_set.association
                    ),
                );
                continue;
            };
            for end in &association_set.ends {
                if !association.ends.iter().any(|e| e.role == end.role) {
                    self.error(
                        key.document,
                        ErrorCode::InvalidRoleInRelationship,
                        format!(
                            "Role '{}' of association set '{}' is not defined by '{}'",
                            end.role, association_set.name, association.name
                        ),
                    );
                }
                if !container.entity_sets.iter().any(|s| s.name == end.entity_set) {
                    self.error(
                        key.document,
                        ErrorCode::InvalidEntitySet,
                        format!(
                            "Entity set '{}' of association set '{}' is not defined in '{}'",
                            end.entity_set, association_set.name, owner
                        ),
                    );
                }
            }
        }

        let mut import_names = HashSet::new();
        for import in &container.function_imports {
            if !import_names.insert(import.name.as_str()) {
                self.error(
                    key.document,
                    ErrorCode::AlreadyDefined,
                    format!("Function import '{}' is already defined in '{}'", import.name, owner),
                );
            }
            self.check_parameters(key, &import.name, &import.parameters);
            if let Some(return_type) = import.return_type.as_deref() {
                if self.set.resolve_type(key.document, return_type).is_none() {
                    self.error(
                        key.document,
                        ErrorCode::NotInNamespace,
                        format!(
                            "Return type '{}' of function import '{}' is not defined",
                            return_type, import.name
                        ),
                    );
                }
            }
            if let Some(entity_set) = import.entity_set.as_deref() {
                if !container.entity_sets.iter().any(|s| s.name == entity_set) {
                    self.error(
                        key.document,
                        ErrorCode::InvalidEntitySet,
                        format!(
                            "Entity set '{}' of function import '{}' is not defined in '{}'",
                            entity_set, import.name, owner
                        ),
                    );
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifier_rules() {
        assert!(is_valid_identifier("Order"));
        assert!(is_valid_identifier("_private1"));
        assert!(is_valid_identifier("Ärger"));
        assert!(!is_valid_identifier("1Order"));
        assert!(!is_valid_identifier("Order Line"));
        assert!(is_valid_qualified_name("Company.Sales"));
        assert!(!is_valid_qualified_name("Company..Sales"));
    }
}
