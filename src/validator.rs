//! Structural checks over finished metadata items.
//!
//! Schema documents are validated before conversion; items built some other
//! way (object-space types read from assemblies) go through these checks
//! instead before they are registered.

use std::collections::HashSet;

use crate::error::{EdmSchemaError, ErrorCode};
use crate::metadata::{EdmType, EntityType, GlobalItem, MetadataItem, NamedTypeRef, TypeLookup};
use crate::som::is_valid_identifier;

/// Every problem found in `items`; `lookup` resolves base types that live
/// outside the batch.
pub fn validate(items: &[GlobalItem], lookup: &dyn TypeLookup) -> Vec<EdmSchemaError> {
    let batch = Batch {
        items,
        outside: lookup,
    };
    let mut errors = Vec::new();
    for item in items {
        check_names(item, &mut errors);
        if let GlobalItem::EntityType(entity) = item {
            check_entity(entity, &batch, &mut errors);
        }
    }
    errors
}

struct Batch<'a> {
    items: &'a [GlobalItem],
    outside: &'a dyn TypeLookup,
}

impl TypeLookup for Batch<'_> {
    fn find_named_type(&self, identity: &str) -> Option<NamedTypeRef<'_>> {
        self.items
            .iter()
            .find(|item| item.identity() == identity)
            .and_then(GlobalItem::as_named_type)
            .or_else(|| self.outside.find_named_type(identity))
    }
}

fn check_names(item: &GlobalItem, errors: &mut Vec<EdmSchemaError>) {
    if !is_valid_identifier(item.name()) {
        errors.push(
            EdmSchemaError::error(
                format!("'{}' is not a valid name", item.name()),
                ErrorCode::InvalidName,
            )
            .at(item.identity()),
        );
    }
    if item.namespace_name().is_some_and(str::is_empty) {
        errors.push(
            EdmSchemaError::error(
                format!("Type '{}' has no namespace", item.name()),
                ErrorCode::InvalidName,
            )
            .at(item.identity()),
        );
    }
}

fn check_entity(entity: &EntityType, lookup: &dyn TypeLookup, errors: &mut Vec<EdmSchemaError>) {
    let identity = entity.identity();
    let keys = entity.key_member_names(lookup);
    if entity.base_type().is_none() && keys.is_empty() {
        errors.push(
            EdmSchemaError::error(
                format!("Entity type '{}' has no key defined", identity),
                ErrorCode::KeyMissingOnEntityType,
            )
            .at(identity),
        );
    }

    let members = entity.all_members(lookup);
    for key in &keys {
        let property = members
            .iter()
            .find(|m| m.name() == key)
            .and_then(|m| m.as_property());
        if property.is_some_and(|p| p.is_nullable()) {
            errors.push(
                EdmSchemaError::error(
                    format!("Key property '{}' of '{}' must not be nullable", key, identity),
                    ErrorCode::InvalidKey,
                )
                .at(identity),
            );
        }
    }

    let mut seen = HashSet::new();
    for member in members {
        if !seen.insert(member.name()) {
            errors.push(
                EdmSchemaError::error(
                    format!(
                        "Member '{}' is declared more than once in the hierarchy of '{}'",
                        member.name(),
                        identity
                    ),
                    ErrorCode::AlreadyDefined,
                )
                .at(identity),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::metadata::{DataSpace, EdmProperty, EdmTypeRef, FacetValues, TypeUsage};
    use crate::provider::ClrPrimitiveTypes;

    struct NoTypes;

    impl TypeLookup for NoTypes {
        fn find_named_type(&self, _: &str) -> Option<crate::metadata::NamedTypeRef<'_>> {
            None
        }
    }

    fn int_usage(nullable: bool) -> Arc<TypeUsage> {
        let primitives = ClrPrimitiveTypes::new();
        let int = primitives.find("System.Int32").unwrap().clone();
        TypeUsage::create_with(
            EdmTypeRef::Primitive(int),
            &FacetValues::new().nullable(nullable),
        )
    }

    fn frozen(entity: EntityType) -> GlobalItem {
        let mut entity = entity;
        entity.set_read_only();
        GlobalItem::EntityType(Arc::new(entity))
    }

    #[test]
    fn test_root_entity_without_key_is_reported() {
        let entity = EntityType::new("Order", "Shop", DataSpace::OSpace);
        let errors = validate(&[frozen(entity)], &NoTypes);
        assert_eq!(errors.len(), 1);
        assert_eq!(errors[0].code, ErrorCode::KeyMissingOnEntityType);
    }

    #[test]
    fn test_nullable_key_is_reported() {
        let mut entity = EntityType::new("Order", "Shop", DataSpace::OSpace);
        entity.add_property(EdmProperty::new("Id", int_usage(true))).unwrap();
        entity.add_key_member("Id", &NoTypes).unwrap();
        let errors = validate(&[frozen(entity)], &NoTypes);
        assert!(errors.iter().any(|e| e.code == ErrorCode::InvalidKey));
    }

    #[test]
    fn test_valid_entity_passes() {
        let mut entity = EntityType::new("Order", "Shop", DataSpace::OSpace);
        entity.add_property(EdmProperty::new("Id", int_usage(false))).unwrap();
        entity.add_key_member("Id", &NoTypes).unwrap();
        assert!(validate(&[frozen(entity)], &NoTypes).is_empty());
    }
}
