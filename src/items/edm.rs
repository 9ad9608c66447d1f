//! Conceptual (CSpace) item collection.

use std::sync::Arc;

use tracing::debug;

use super::{load_schema_items, raise_on_errors, ItemCollection};
use crate::converter::ConversionTarget;
use crate::error::{EdmSchemaError, MetadataError};
use crate::metadata::{
    DataSpace, EdmFunction, GlobalItem, NamedTypeRef, PrimitiveType, PrimitiveTypeKind, TypeLookup,
};
use crate::provider::{EdmProviderManifest, ProviderManifest};
use crate::som::SchemaDocument;

/// Conceptual model items, seeded with the canonical primitive types and
/// functions.
#[derive(Debug)]
pub struct EdmItemCollection {
    items: ItemCollection,
    manifest: Arc<EdmProviderManifest>,
    edm_version: Option<f64>,
    errors: Vec<EdmSchemaError>,
}

impl EdmItemCollection {
    pub fn new(manifest: Arc<EdmProviderManifest>) -> Result<Self, MetadataError> {
        let mut items = ItemCollection::new(DataSpace::CSpace);
        for primitive in manifest.store_types() {
            items.add_internal(GlobalItem::PrimitiveType(Arc::clone(primitive)))?;
        }
        for function in manifest.store_functions() {
            items.add_internal(GlobalItem::Function(Arc::clone(function)))?;
        }
        Ok(Self {
            items,
            manifest,
            edm_version: None,
            errors: Vec::new(),
        })
    }

    /// Collection holding the canonical items plus everything converted from
    /// `documents`.
    pub fn from_documents(
        documents: Vec<SchemaDocument>,
        manifest: Arc<EdmProviderManifest>,
        throw_on_error: bool,
    ) -> Result<Self, MetadataError> {
        let mut collection = Self::new(manifest)?;
        collection.load_items(documents, throw_on_error)?;
        Ok(collection)
    }

    /// Convert `documents` and add the results.
    ///
    /// Errors recorded during the load are returned and also kept on the
    /// collection; with `throw_on_error` any non-warning error fails the
    /// whole load instead and nothing is added.
    pub fn load_items(
        &mut self,
        documents: Vec<SchemaDocument>,
        throw_on_error: bool,
    ) -> Result<Vec<EdmSchemaError>, MetadataError> {
        let manifest: Arc<dyn ProviderManifest> = Arc::clone(&self.manifest) as Arc<dyn ProviderManifest>;
        let loaded = load_schema_items(self, documents, manifest)?;
        raise_on_errors(&loaded.errors, throw_on_error)?;
        let count = loaded.items.len();
        for item in loaded.items {
            self.items.add_internal(item)?;
        }
        debug!(items = count, version = ?self.edm_version, "loaded conceptual items");
        self.errors.extend(loaded.errors.iter().cloned());
        Ok(loaded.errors)
    }

    pub fn items(&self) -> &ItemCollection {
        &self.items
    }

    /// Version of the loaded conceptual schemas, `None` until one is loaded.
    pub fn edm_version(&self) -> Option<f64> {
        self.edm_version
    }

    /// Non-fatal errors recorded by every load so far.
    pub fn errors(&self) -> &[EdmSchemaError] {
        &self.errors
    }

    pub fn manifest(&self) -> &Arc<EdmProviderManifest> {
        &self.manifest
    }

    /// Canonical primitive types available at `version`, defaulting to the
    /// loaded schema version. Spatial types need version 3.0.
    pub fn get_primitive_types(&self, version: Option<f64>) -> Vec<Arc<PrimitiveType>> {
        let version = version
            .or(self.edm_version)
            .unwrap_or(crate::som::MAXIMUM_SCHEMA_VERSION);
        self.manifest.primitive_types_for_version(version)
    }

    pub fn get_mapped_primitive_type(&self, kind: PrimitiveTypeKind) -> Option<Arc<PrimitiveType>> {
        self.manifest.primitive_type(kind).ok()
    }

    pub fn get_functions(&self, full_name: &str, ignore_case: bool) -> Vec<Arc<EdmFunction>> {
        self.items.get_functions(full_name, ignore_case)
    }
}

impl TypeLookup for EdmItemCollection {
    fn find_named_type(&self, identity: &str) -> Option<NamedTypeRef<'_>> {
        self.items.find_named_type(identity)
    }
}

impl ConversionTarget for EdmItemCollection {
    fn data_space(&self) -> DataSpace {
        DataSpace::CSpace
    }

    fn set_schema_version(&mut self, version: f64) {
        self.edm_version = Some(version);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorCode;
    use crate::metadata::{EntityType, MetadataItem};

    fn manifest() -> Arc<EdmProviderManifest> {
        Arc::new(EdmProviderManifest::new().unwrap())
    }

    fn document(json: &str) -> SchemaDocument {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_new_collection_holds_canonical_items() {
        let collection = EdmItemCollection::new(manifest()).unwrap();
        assert!(collection.items().contains("Edm.Int32"));
        assert!(!collection.get_functions("Edm.Abs", false).is_empty());
        assert_eq!(collection.edm_version(), None);
    }

    #[test]
    fn test_spatial_types_hidden_below_version_three() {
        let collection = EdmItemCollection::new(manifest()).unwrap();
        let old = collection.get_primitive_types(Some(2.0));
        assert!(old.iter().all(|t| !t.kind().is_spatial()));
        let current = collection.get_primitive_types(Some(3.0));
        assert!(current.iter().any(|t| t.kind().is_spatial()));
    }

    #[test]
    fn test_load_records_version_and_items() {
        let mut collection = EdmItemCollection::new(manifest()).unwrap();
        let errors = collection
            .load_items(
                vec![document(
                    r#"{
                        "namespace": "Shop",
                        "layer": "Conceptual",
                        "version": 2.0,
                        "elements": [{
                            "kind": "EntityType",
                            "name": "Order",
                            "key": ["Id"],
                            "properties": [{ "name": "Id", "type": "Int32", "nullable": false }]
                        }]
                    }"#,
                )],
                true,
            )
            .unwrap();
        assert!(errors.is_empty());
        assert_eq!(collection.edm_version(), Some(2.0));
        let order = collection.items().get_item::<EntityType>("Shop.Order", false).unwrap();
        assert!(order.is_read_only());
    }

    #[test]
    fn test_invalid_schema_fails_when_asked_to_throw() {
        let invalid = r#"{
            "namespace": "Shop",
            "layer": "Conceptual",
            "elements": [{ "kind": "EntityType", "name": "Keyless" }]
        }"#;
        let mut collection = EdmItemCollection::new(manifest()).unwrap();
        let err = collection.load_items(vec![document(invalid)], true).unwrap_err();
        assert!(matches!(err, MetadataError::Schema { .. }));

        let errors = collection.load_items(vec![document(invalid)], false).unwrap();
        assert!(errors.iter().any(|e| e.code == ErrorCode::KeyMissingOnEntityType));
        assert!(!collection.items().contains("Shop.Keyless"));
    }
}
