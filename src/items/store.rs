//! Storage (SSpace) item collection.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use tracing::{debug, trace};

use super::{load_schema_items, raise_on_errors, ItemCollection};
use crate::converter::ConversionTarget;
use crate::error::{EdmSchemaError, MetadataError};
use crate::metadata::{
    DataSpace, EdmFunction, FunctionAttributes, FunctionParameter, FunctionPayload, GlobalItem,
    MetadataCollection, MetadataItem, NamedTypeRef, TypeLookup,
};
use crate::provider::{model_type_usage, EdmProviderManifest, ProviderManifest, SqlProviderManifest};
use crate::som::SchemaDocument;

/// Manifest token assumed when no storage document names one.
pub const DEFAULT_MANIFEST_TOKEN: &str = "2008";

/// Store model items, seeded with the provider's types and functions.
#[derive(Debug)]
pub struct StoreItemCollection {
    items: ItemCollection,
    manifest: Arc<dyn ProviderManifest>,
    schema_version: Option<f64>,
    errors: Vec<EdmSchemaError>,
    /// Store function identity to its conceptual projection.
    c_type_functions: Mutex<HashMap<String, Arc<EdmFunction>>>,
}

impl StoreItemCollection {
    pub fn new(manifest: Arc<dyn ProviderManifest>) -> Result<Self, MetadataError> {
        if manifest.data_space() != DataSpace::SSpace {
            return Err(MetadataError::InvalidDataSpace {
                operation: "StoreItemCollection::new",
                identity: manifest.namespace_name().to_string(),
                expected: DataSpace::SSpace,
                actual: manifest.data_space(),
            });
        }
        let mut items = ItemCollection::new(DataSpace::SSpace);
        for primitive in manifest.store_types() {
            items.add_internal(GlobalItem::PrimitiveType(Arc::clone(primitive)))?;
        }
        for function in manifest.store_functions() {
            items.add_internal(GlobalItem::Function(Arc::clone(function)))?;
        }
        Ok(Self {
            items,
            manifest,
            schema_version: None,
            errors: Vec::new(),
            c_type_functions: Mutex::new(HashMap::new()),
        })
    }

    /// Collection over the SQL Server manifest named by the documents'
    /// manifest token.
    pub fn from_documents(
        documents: Vec<SchemaDocument>,
        edm: Arc<EdmProviderManifest>,
        throw_on_error: bool,
    ) -> Result<Self, MetadataError> {
        let token = documents
            .iter()
            .find_map(|d| d.provider_manifest_token.clone())
            .unwrap_or_else(|| DEFAULT_MANIFEST_TOKEN.to_string());
        let manifest = Arc::new(SqlProviderManifest::new(token, edm)?);
        let mut collection = Self::new(manifest)?;
        collection.load_items(documents, throw_on_error)?;
        Ok(collection)
    }

    /// Convert storage documents and add the results.
    ///
    /// Store functions whose conceptual signature collides with an earlier
    /// one are left out and reported as recorded errors.
    pub fn load_items(
        &mut self,
        documents: Vec<SchemaDocument>,
        throw_on_error: bool,
    ) -> Result<Vec<EdmSchemaError>, MetadataError> {
        let manifest = Arc::clone(&self.manifest);
        let loaded = load_schema_items(self, documents, manifest)?;
        raise_on_errors(&loaded.errors, throw_on_error)?;
        let count = loaded.items.len();
        for item in loaded.items {
            self.items.add_internal(item)?;
        }
        debug!(items = count, version = ?self.schema_version, "loaded store items");
        self.errors.extend(loaded.errors.iter().cloned());
        Ok(loaded.errors)
    }

    pub fn items(&self) -> &ItemCollection {
        &self.items
    }

    pub fn manifest(&self) -> &Arc<dyn ProviderManifest> {
        &self.manifest
    }

    pub fn schema_version(&self) -> Option<f64> {
        self.schema_version
    }

    pub fn errors(&self) -> &[EdmSchemaError] {
        &self.errors
    }

    /// Conceptual projections of every overload of a store function.
    pub fn get_c_type_functions(
        &self,
        full_name: &str,
        ignore_case: bool,
    ) -> Result<Vec<Arc<EdmFunction>>, MetadataError> {
        self.items
            .get_functions(full_name, ignore_case)
            .iter()
            .map(|function| self.convert_to_c_type_function(function))
            .collect()
    }

    /// The store function with conceptual parameter and return types.
    ///
    /// Manifest functions are returned as they are. Others are projected
    /// once and memoized; racing callers may both project but only the first
    /// result is kept.
    pub fn convert_to_c_type_function(
        &self,
        function: &Arc<EdmFunction>,
    ) -> Result<Arc<EdmFunction>, MetadataError> {
        if function.is_from_provider_manifest() {
            return Ok(Arc::clone(function));
        }
        if let Some(cached) = self.cached_projection(function.identity()) {
            return Ok(cached);
        }

        let projected = Arc::new(self.project(function)?);
        trace!(
            store = function.identity(),
            conceptual = projected.identity(),
            "projected store function"
        );
        let mut cache = self
            .c_type_functions
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        Ok(Arc::clone(
            cache
                .entry(function.identity().to_string())
                .or_insert(projected),
        ))
    }

    fn cached_projection(&self, identity: &str) -> Option<Arc<EdmFunction>> {
        self.c_type_functions
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(identity)
            .cloned()
    }

    fn project(&self, function: &EdmFunction) -> Result<EdmFunction, MetadataError> {
        let convert = |parameters: &MetadataCollection<FunctionParameter>| {
            parameters
                .iter()
                .map(|p| {
                    Ok(FunctionParameter::new(
                        p.name(),
                        model_type_usage(self.manifest.as_ref(), p.type_usage())?,
                        p.mode(),
                    ))
                })
                .collect::<Result<Vec<_>, MetadataError>>()
        };
        let payload = FunctionPayload {
            return_parameters: convert(function.return_parameters())?,
            parameters: convert(function.parameters())?,
            attributes: function.attributes() | FunctionAttributes::IS_CACHED_STORE_FUNCTION,
            ..function.to_payload()
        };
        let mut projected = EdmFunction::new(
            function.name(),
            function.namespace_name(),
            DataSpace::CSpace,
            payload,
        )?;
        projected.set_read_only();
        Ok(projected)
    }
}

impl TypeLookup for StoreItemCollection {
    fn find_named_type(&self, identity: &str) -> Option<NamedTypeRef<'_>> {
        self.items.find_named_type(identity)
    }
}

impl ConversionTarget for StoreItemCollection {
    fn data_space(&self) -> DataSpace {
        DataSpace::SSpace
    }

    fn set_schema_version(&mut self, version: f64) {
        self.schema_version = Some(version);
    }
}
