//! Provider manifests: the primitive types and built-in functions of the
//! canonical model, of a store, and of the object runtime.

mod clr;
mod edm;
mod sql;

pub use clr::ClrPrimitiveTypes;
pub use edm::{EdmProviderManifest, EDM_NAMESPACE};
pub use sql::{SqlProviderManifest, SQL_SERVER_NAMESPACE};

use std::fmt;
use std::sync::Arc;

use crate::error::MetadataError;
use crate::metadata::facet::{Facet, FacetDescription, FacetType, FacetValue, MAX_LENGTH};
use crate::metadata::{
    CollectionType, DataSpace, EdmFunction, EdmType, EdmTypeRef, PrimitiveType, TypeUsage,
};

/// Capability describing the primitive types and functions of one provider.
///
/// The canonical manifest answers in CSpace; store manifests answer in SSpace
/// and project their types onto canonical ones through
/// [`ProviderManifest::edm_type_usage`].
pub trait ProviderManifest: fmt::Debug + Send + Sync {
    /// Namespace every type and function of this manifest lives in.
    fn namespace_name(&self) -> &str;

    /// CSpace for the canonical manifest, SSpace for store manifests.
    fn data_space(&self) -> DataSpace;

    /// Version token the manifest was created for.
    fn manifest_token(&self) -> &str;

    fn store_types(&self) -> &[Arc<PrimitiveType>];

    fn store_functions(&self) -> &[Arc<EdmFunction>];

    /// Look up a primitive type by its unqualified name.
    fn find_primitive_type(&self, name: &str) -> Option<&Arc<PrimitiveType>> {
        self.store_types().iter().find(|t| t.name() == name)
    }

    fn facet_descriptions<'a>(&self, primitive: &'a PrimitiveType) -> &'a [Arc<FacetDescription>] {
        primitive.facet_descriptions()
    }

    /// Canonical (CSpace) usage corresponding to a usage of one of this
    /// manifest's types.
    fn edm_type_usage(&self, store_usage: &TypeUsage) -> Result<Arc<TypeUsage>, MetadataError>;
}

/// Carry every non-null facet of `source` that `target` also describes.
pub(crate) fn project_facets(
    source: &TypeUsage,
    target: &Arc<PrimitiveType>,
) -> Arc<TypeUsage> {
    let mut values = crate::metadata::FacetValues::new();
    for facet in source.facets() {
        if facet.value().is_null() {
            continue;
        }
        values.set(facet.name(), facet.value().clone());
    }
    TypeUsage::create_with(EdmTypeRef::Primitive(Arc::clone(target)), &values)
}

/// Substitute an unbounded MaxLength with the description's upper bound.
///
/// Only String and Binary store usages carry the sentinel.
pub fn resolve_max_length_sentinel(usage: &Arc<TypeUsage>) -> Arc<TypeUsage> {
    let Some(facet) = usage.facet(MAX_LENGTH) else {
        return Arc::clone(usage);
    };
    if !facet.is_unbounded() || facet.description().facet_type() != FacetType::Int32 {
        return Arc::clone(usage);
    }
    match facet.description().max_value() {
        Some(max) => usage.with_facets(vec![Facet::new(
            Arc::clone(facet.description()),
            FacetValue::Int(max),
        )]),
        None => Arc::clone(usage),
    }
}

/// Conceptual usage of a store usage, looking through collections.
///
/// Usages that are already conceptual come back unchanged.
pub fn model_type_usage(
    manifest: &dyn ProviderManifest,
    usage: &Arc<TypeUsage>,
) -> Result<Arc<TypeUsage>, MetadataError> {
    match usage.edm_type() {
        EdmTypeRef::Primitive(primitive) if primitive.data_space() == DataSpace::SSpace => {
            manifest.edm_type_usage(usage)
        }
        EdmTypeRef::Collection(collection) => {
            let element = model_type_usage(manifest, collection.element_type())?;
            if Arc::ptr_eq(&element, collection.element_type()) {
                return Ok(Arc::clone(usage));
            }
            let collection = match element.edm_type() {
                // Element facets do not survive the projection of a collection.
                EdmTypeRef::Primitive(primitive) => primitive.collection_type(),
                _ => Arc::new(CollectionType::new(element)),
            };
            Ok(TypeUsage::create(EdmTypeRef::Collection(collection)))
        }
        _ => Ok(Arc::clone(usage)),
    }
}

/// Description helpers shared by the manifests.
pub(crate) mod descriptions {
    use std::sync::Arc;

    use crate::metadata::facet::{
        FacetDescription, FacetType, FacetValue, FIXED_LENGTH, IS_STRICT, MAX_LENGTH, PRECISION,
        SCALE, SRID, UNICODE,
    };

    pub fn max_length(min: i32, max: i32, default: FacetValue) -> Arc<FacetDescription> {
        Arc::new(FacetDescription::new(
            MAX_LENGTH,
            FacetType::Int32,
            Some(min),
            Some(max),
            default,
        ))
    }

    pub fn constant_max_length(value: i32) -> Arc<FacetDescription> {
        Arc::new(FacetDescription::constant(
            MAX_LENGTH,
            FacetType::Int32,
            FacetValue::Int(value),
        ))
    }

    pub fn flag(name: &str, default: FacetValue) -> Arc<FacetDescription> {
        Arc::new(FacetDescription::new(name, FacetType::Boolean, None, None, default))
    }

    pub fn constant_flag(name: &str, value: bool) -> Arc<FacetDescription> {
        Arc::new(FacetDescription::constant(
            name,
            FacetType::Boolean,
            FacetValue::Bool(value),
        ))
    }

    pub fn unicode(default: FacetValue) -> Arc<FacetDescription> {
        flag(UNICODE, default)
    }

    pub fn fixed_length(default: FacetValue) -> Arc<FacetDescription> {
        flag(FIXED_LENGTH, default)
    }

    pub fn precision(min: i32, max: i32, default: FacetValue) -> Arc<FacetDescription> {
        Arc::new(FacetDescription::new(
            PRECISION,
            FacetType::Byte,
            Some(min),
            Some(max),
            default,
        ))
    }

    pub fn scale(min: i32, max: i32, default: FacetValue) -> Arc<FacetDescription> {
        Arc::new(FacetDescription::new(
            SCALE,
            FacetType::Byte,
            Some(min),
            Some(max),
            default,
        ))
    }

    pub fn constant_byte(name: &str, value: u8) -> Arc<FacetDescription> {
        Arc::new(FacetDescription::constant(
            name,
            FacetType::Byte,
            FacetValue::Byte(value),
        ))
    }

    pub fn srid(default: i32) -> Arc<FacetDescription> {
        Arc::new(FacetDescription::new(
            SRID,
            FacetType::Int32,
            Some(0),
            Some(i32::MAX),
            FacetValue::Int(default),
        ))
    }

    pub fn is_strict() -> Arc<FacetDescription> {
        constant_flag(IS_STRICT, false)
    }
}
