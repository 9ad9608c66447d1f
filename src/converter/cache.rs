//! Memoized type usages shared across one conversion run.

use std::collections::HashMap;
use std::sync::Arc;

use crate::metadata::{CollectionType, EdmTypeRef, NamedTypeRef, TypeLookup, TypeUsage};
use crate::som::ElementKey;

/// Type usages handed out during a conversion.
///
/// Repeated conversions of the same type get the same `Arc<TypeUsage>`
/// instead of a fresh allocation each time.
#[derive(Debug, Default)]
pub struct ConversionCache {
    null_facet_usages: HashMap<String, Arc<TypeUsage>>,
    collection_usages: HashMap<String, Arc<TypeUsage>>,
    function_returns: HashMap<ElementKey, Arc<TypeUsage>>,
}

impl ConversionCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Usage of `edm_type` with every facet at its default.
    pub fn type_usage(&mut self, edm_type: EdmTypeRef) -> Arc<TypeUsage> {
        Arc::clone(
            self.null_facet_usages
                .entry(edm_type.identity().to_string())
                .or_insert_with(|| TypeUsage::create(edm_type)),
        )
    }

    /// Usage of `Collection(element)` with default facets on both levels.
    ///
    /// Named element types hand out their own memoized collection type, so
    /// every usage built here for one element type wraps the same instance.
    pub fn collection_type_usage(
        &mut self,
        element: EdmTypeRef,
        lookup: &dyn TypeLookup,
    ) -> Arc<TypeUsage> {
        if let Some(existing) = self.collection_usages.get(element.identity()) {
            return Arc::clone(existing);
        }
        let key = element.identity().to_string();
        let memoized = element
            .as_named()
            .and_then(|name| lookup.find_named_type(name.identity()))
            .and_then(|named| match named {
                NamedTypeRef::Entity(t) => Some(t.collection_type()),
                NamedTypeRef::Complex(t) => Some(t.collection_type()),
                NamedTypeRef::Enum(t) => Some(t.collection_type()),
                NamedTypeRef::Association(_) => None,
            });
        let collection = match (&element, memoized) {
            (_, Some(collection)) => collection,
            (EdmTypeRef::Primitive(primitive), None) => primitive.collection_type(),
            (_, None) => Arc::new(CollectionType::new(self.type_usage(element.clone()))),
        };
        let usage = TypeUsage::create(EdmTypeRef::Collection(collection));
        self.collection_usages.insert(key, Arc::clone(&usage));
        usage
    }

    /// Return usage pinned to a model function's schema node, so every
    /// lookup of that function sees the identical instance.
    pub fn function_return_usage(
        &mut self,
        function: ElementKey,
        create: impl FnOnce(&mut Self) -> Arc<TypeUsage>,
    ) -> Arc<TypeUsage> {
        if let Some(existing) = self.function_returns.get(&function) {
            return Arc::clone(existing);
        }
        let usage = create(self);
        self.function_returns.insert(function, Arc::clone(&usage));
        usage
    }
}
