//! Facet propagation from schema properties to type usages.

use std::sync::Arc;

use crate::metadata::facet::{
    collection_kind_description, FacetValue, FacetValues, FIXED_LENGTH, MAX_LENGTH, PRECISION,
    SCALE, SRID, UNICODE,
};
use crate::metadata::{DataSpace, EdmTypeRef, Facet, TypeUsage};
use crate::provider::resolve_max_length_sentinel;
use crate::som::{FacetElements, MaxLengthValue, PropertyElement, COLLECTION_KIND_VERSION};

use super::cache::ConversionCache;

/// Facet values written on a schema node.
///
/// `Collation` is a store-side hint with no description on canonical
/// types and is not carried.
pub fn explicit_facets(facets: &FacetElements) -> FacetValues {
    let mut values = FacetValues::new();
    if let Some(max_length) = &facets.max_length {
        let value = match max_length {
            MaxLengthValue::Length(length) => FacetValue::Int(*length),
            keyword if keyword.is_max() => FacetValue::Unbounded,
            MaxLengthValue::Keyword(_) => FacetValue::Null,
        };
        values.set(MAX_LENGTH, value);
    }
    if let Some(fixed) = facets.fixed_length {
        values.set(FIXED_LENGTH, FacetValue::Bool(fixed));
    }
    if let Some(unicode) = facets.unicode {
        values.set(UNICODE, FacetValue::Bool(unicode));
    }
    if let Some(precision) = facets.precision {
        values.set(PRECISION, FacetValue::Byte(precision));
    }
    if let Some(scale) = facets.scale {
        values.set(SCALE, FacetValue::Byte(scale));
    }
    if let Some(srid) = facets.srid {
        values.set(SRID, FacetValue::Int(srid));
    }
    values
}

/// Type usage for a property of a conceptual or store type.
///
/// Conceptual usages layer the type's default facets, then the facets
/// written on the property (constant facets are never overridden), then
/// Nullable and DefaultValue, then CollectionKind for version 1.1 schemas.
/// Store usages take the written facets as they are, except that an
/// unbounded MaxLength becomes the store type's declared maximum.
pub fn property_type_usage(
    cache: &mut ConversionCache,
    edm_type: EdmTypeRef,
    property: &PropertyElement,
    data_space: DataSpace,
    version: f64,
) -> Arc<TypeUsage> {
    let mut values = if edm_type.is_primitive() {
        explicit_facets(&property.facets)
    } else {
        FacetValues::new()
    };
    if !property.nullable {
        values = values.nullable(false);
    }
    if let Some(default_value) = &property.default_value {
        values = values.default_value(default_value.clone());
    }

    let collection_kind = property
        .collection_kind
        .as_ref()
        .filter(|_| data_space == DataSpace::CSpace && version == COLLECTION_KIND_VERSION);

    let usage = if values.is_empty() {
        cache.type_usage(edm_type)
    } else {
        TypeUsage::create_with(edm_type, &values)
    };
    let usage = match collection_kind {
        Some(kind) => usage.with_facets(vec![Facet::new(
            collection_kind_description(),
            FacetValue::Text(kind.clone()),
        )]),
        None => usage,
    };

    if data_space == DataSpace::SSpace {
        resolve_max_length_sentinel(&usage)
    } else {
        usage
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::facet::COLLECTION_KIND;
    use crate::metadata::PrimitiveTypeKind;
    use crate::provider::{EdmProviderManifest, ProviderManifest, SqlProviderManifest};

    fn string_property(max: MaxLengthValue) -> PropertyElement {
        let mut property = PropertyElement::new("Name", "String").not_null();
        property.facets.max_length = Some(max);
        property.facets.unicode = Some(false);
        property
    }

    #[test]
    fn test_conceptual_property_layers_facets() {
        let manifest = EdmProviderManifest::new().unwrap();
        let string = manifest.primitive_type(PrimitiveTypeKind::String).unwrap();
        let mut cache = ConversionCache::new();
        let usage = property_type_usage(
            &mut cache,
            EdmTypeRef::Primitive(string),
            &string_property(MaxLengthValue::Length(40)),
            DataSpace::CSpace,
            3.0,
        );
        assert_eq!(usage.max_length(), Some(&FacetValue::Int(40)));
        assert_eq!(usage.facet_value(UNICODE), Some(&FacetValue::Bool(false)));
        assert!(!usage.is_nullable());
    }

    #[test]
    fn test_store_property_replaces_max_sentinel() {
        let edm = Arc::new(EdmProviderManifest::new().unwrap());
        let sql = SqlProviderManifest::new("2008", edm).unwrap();
        let nvarchar = Arc::clone(sql.find_primitive_type("nvarchar").unwrap());
        let mut cache = ConversionCache::new();
        let usage = property_type_usage(
            &mut cache,
            EdmTypeRef::Primitive(nvarchar),
            &string_property(MaxLengthValue::Keyword("Max".to_string())),
            DataSpace::SSpace,
            3.0,
        );
        assert_eq!(usage.facet_value(MAX_LENGTH), Some(&FacetValue::Int(4000)));
        // Unicode is constant on nvarchar and keeps its declared value.
        assert_eq!(usage.facet_value(UNICODE), Some(&FacetValue::Bool(true)));
    }

    #[test]
    fn test_collection_kind_only_for_version_one_one() {
        let manifest = EdmProviderManifest::new().unwrap();
        let int32 = manifest.primitive_type(PrimitiveTypeKind::Int32).unwrap();
        let mut property = PropertyElement::new("Tags", "Int32");
        property.collection_kind = Some("Bag".to_string());
        let mut cache = ConversionCache::new();

        let legacy = property_type_usage(
            &mut cache,
            EdmTypeRef::Primitive(Arc::clone(&int32)),
            &property,
            DataSpace::CSpace,
            1.1,
        );
        assert_eq!(
            legacy.facet_value(COLLECTION_KIND),
            Some(&FacetValue::Text("Bag".to_string()))
        );

        let current = property_type_usage(
            &mut cache,
            EdmTypeRef::Primitive(int32),
            &property,
            DataSpace::CSpace,
            3.0,
        );
        assert!(current.facet(COLLECTION_KIND).is_none());
    }
}
