//! TypeUsage: an EdmType reference plus the facets applied to it.

use std::sync::Arc;

use once_cell::sync::OnceCell;

use super::collection::MetadataCollection;
use super::facet::{
    default_facet, general_facet_descriptions, is_identity_facet, Facet, FacetDescription,
    FacetValue, FacetValues, MAX_LENGTH, NULLABLE, PRECISION, SCALE,
};
use super::item::{BuiltInTypeKind, MetadataItem};
use super::types::EdmTypeRef;

/// The use of an EdmType with a specific facet set.
///
/// Facets are materialized at construction from the type's facet
/// descriptions and are frozen from then on.
#[derive(Debug)]
pub struct TypeUsage {
    edm_type: EdmTypeRef,
    facets: MetadataCollection<Facet>,
    identity: OnceCell<String>,
}

impl TypeUsage {
    /// Usage with every facet at its default.
    pub fn create(edm_type: EdmTypeRef) -> Arc<TypeUsage> {
        Self::create_with(edm_type, &FacetValues::new())
    }

    /// Usage with default facets overridden by `values`.
    ///
    /// Values for facets the type does not describe are ignored, as are
    /// overrides of constant facets.
    pub fn create_with(edm_type: EdmTypeRef, values: &FacetValues) -> Arc<TypeUsage> {
        let facets = facet_descriptions(&edm_type)
            .iter()
            .map(|description| match values.get(description.name()) {
                Some(value) if !description.is_constant() => {
                    Facet::new(Arc::clone(description), value.clone())
                }
                _ => default_facet(description),
            })
            .collect();
        Self::from_facets(edm_type, facets)
    }

    /// Usage with exactly the given facets; a later facet of the same name
    /// replaces an earlier one.
    pub fn from_facets(edm_type: EdmTypeRef, facets: Vec<Facet>) -> Arc<TypeUsage> {
        let mut merged: Vec<Facet> = Vec::with_capacity(facets.len());
        for facet in facets {
            match merged.iter_mut().find(|f| f.name() == facet.name()) {
                Some(existing) => *existing = facet,
                None => merged.push(facet),
            }
        }
        let mut collection = MetadataCollection::with_capacity(merged.len());
        for facet in merged {
            let added = collection.add(facet);
            debug_assert!(added.is_ok(), "facet names are unique after the merge: {:?}", added);
        }
        collection.set_read_only();
        Arc::new(TypeUsage {
            edm_type,
            facets: collection,
            identity: OnceCell::new(),
        })
    }

    /// Copy of this usage with the known facets replaced from `values`.
    pub fn shallow_copy(&self, values: &FacetValues) -> Arc<TypeUsage> {
        let facets = self
            .facets
            .iter()
            .map(|facet| match values.get(facet.name()) {
                Some(value) if !facet.description().is_constant() => {
                    Facet::new(Arc::clone(facet.description()), value.clone())
                }
                _ => facet.clone(),
            })
            .collect();
        Self::from_facets(self.edm_type.clone(), facets)
    }

    /// Copy of this usage with `extra` added, replacing same-named facets.
    pub fn with_facets(&self, extra: Vec<Facet>) -> Arc<TypeUsage> {
        let mut facets: Vec<Facet> = self.facets.iter().cloned().collect();
        facets.extend(extra);
        Self::from_facets(self.edm_type.clone(), facets)
    }

    pub fn edm_type(&self) -> &EdmTypeRef {
        &self.edm_type
    }

    pub fn facets(&self) -> &MetadataCollection<Facet> {
        &self.facets
    }

    pub fn facet(&self, name: &str) -> Option<&Facet> {
        self.facets.try_get_value(name, false)
    }

    pub fn facet_value(&self, name: &str) -> Option<&FacetValue> {
        self.facet(name).map(Facet::value)
    }

    pub fn is_nullable(&self) -> bool {
        self.facet_value(NULLABLE)
            .and_then(FacetValue::as_bool)
            .unwrap_or(true)
    }

    /// Declared max length; `Some(FacetValue::Unbounded)` for "Max".
    pub fn max_length(&self) -> Option<&FacetValue> {
        self.facet_value(MAX_LENGTH).filter(|v| !v.is_null())
    }

    pub fn precision(&self) -> Option<u8> {
        self.facet_value(PRECISION).and_then(FacetValue::as_byte)
    }

    pub fn scale(&self) -> Option<u8> {
        self.facet_value(SCALE).and_then(FacetValue::as_byte)
    }
}

fn facet_descriptions(edm_type: &EdmTypeRef) -> Vec<Arc<FacetDescription>> {
    let mut descriptions = match edm_type {
        EdmTypeRef::Primitive(primitive) => primitive.facet_descriptions().to_vec(),
        _ => Vec::new(),
    };
    descriptions.extend(general_facet_descriptions());
    descriptions
}

impl MetadataItem for TypeUsage {
    /// Type identity followed by the identity-relevant facets in name order,
    /// e.g. `Edm.String(DefaultValue=,MaxLength=50,Nullable=False)`.
    fn identity(&self) -> &str {
        self.identity.get_or_init(|| {
            let mut relevant: Vec<&Facet> = self
                .facets
                .iter()
                .filter(|facet| is_identity_facet(facet.name()))
                .collect();
            relevant.sort_by(|a, b| a.name().cmp(b.name()));

            let mut identity = self.edm_type.identity().to_string();
            if !relevant.is_empty() {
                let rendered: Vec<String> = relevant
                    .iter()
                    .map(|facet| format!("{}={}", facet.name(), facet.value()))
                    .collect();
                identity.push('(');
                identity.push_str(&rendered.join(","));
                identity.push(')');
            }
            identity
        })
    }

    fn built_in_type_kind(&self) -> BuiltInTypeKind {
        BuiltInTypeKind::TypeUsage
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn set_read_only(&mut self) {}
}
