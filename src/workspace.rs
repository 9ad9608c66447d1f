//! The metadata workspace: one item collection per data space behind a
//! space-agnostic query surface.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError};

use once_cell::sync::OnceCell;
use tracing::{debug, info};
use uuid::Uuid;

use crate::error::MetadataError;
use crate::items::{
    AssemblyResolver, ClrTypeHandle, DefaultObjectMappingItemCollection, EdmItemCollection,
    ItemCollection, ObjectItemCollection, StorageMappingItemCollection, StoreItemCollection,
};
use crate::metadata::{
    CollectionType, DataSpace, EdmFunction, EdmTypeRef, EntityContainer, GlobalItem,
    GlobalItemType, MetadataItem, PrimitiveType, TypeUsage,
};
use crate::provider::EdmProviderManifest;
use crate::som::{self, LoadedArtifacts};
use crate::util::qualify;

/// Highest conceptual schema version the workspace understands.
pub const MAXIMUM_EDM_VERSION_SUPPORTED: f64 = som::MAXIMUM_SCHEMA_VERSION;

pub type ConceptualLoader = Box<dyn Fn() -> Result<EdmItemCollection, MetadataError> + Send + Sync>;
pub type StorageLoader = Box<dyn Fn() -> Result<StoreItemCollection, MetadataError> + Send + Sync>;
pub type MappingLoader = Box<
    dyn Fn(&Arc<EdmItemCollection>, &Arc<StoreItemCollection>) -> Result<StorageMappingItemCollection, MetadataError>
        + Send
        + Sync,
>;

/// Deferred constructors for the spaces a workspace loads on first use.
#[derive(Default)]
pub struct WorkspaceLoaders {
    pub conceptual: Option<ConceptualLoader>,
    pub storage: Option<StorageLoader>,
    pub mapping: Option<MappingLoader>,
}

/// Any item collection a workspace can hold.
#[derive(Debug, Clone)]
pub enum SpaceCollection {
    Edm(Arc<EdmItemCollection>),
    Store(Arc<StoreItemCollection>),
    Object(Arc<ObjectItemCollection>),
    StorageMapping(Arc<StorageMappingItemCollection>),
    ObjectMapping(Arc<DefaultObjectMappingItemCollection>),
}

impl SpaceCollection {
    pub fn data_space(&self) -> DataSpace {
        match self {
            SpaceCollection::Edm(_) => DataSpace::CSpace,
            SpaceCollection::Store(_) => DataSpace::SSpace,
            SpaceCollection::Object(_) => DataSpace::OSpace,
            SpaceCollection::StorageMapping(_) => DataSpace::CSSpace,
            SpaceCollection::ObjectMapping(_) => DataSpace::OCSpace,
        }
    }

    fn kind_name(&self) -> &'static str {
        match self {
            SpaceCollection::Edm(_) => "EdmItemCollection",
            SpaceCollection::Store(_) => "StoreItemCollection",
            SpaceCollection::Object(_) => "ObjectItemCollection",
            SpaceCollection::StorageMapping(_) => "StorageMappingItemCollection",
            SpaceCollection::ObjectMapping(_) => "DefaultObjectMappingItemCollection",
        }
    }

    /// Schema version the collection was loaded from, if it has one.
    fn schema_version(&self) -> Option<f64> {
        match self {
            SpaceCollection::Edm(c) => c.edm_version(),
            SpaceCollection::Store(c) => c.schema_version(),
            SpaceCollection::StorageMapping(c) => c.mapping_version(),
            SpaceCollection::Object(_) | SpaceCollection::ObjectMapping(_) => None,
        }
    }
}

/// Metadata of every data space, loaded eagerly, registered, or loaded on
/// first access through [`WorkspaceLoaders`].
///
/// Conceptual, storage and mapping collections must agree on one schema
/// version; the first collection to declare one fixes it.
pub struct MetadataWorkspace {
    id: Uuid,
    edm: OnceCell<Arc<EdmItemCollection>>,
    store: OnceCell<Arc<StoreItemCollection>>,
    mapping: OnceCell<Arc<StorageMappingItemCollection>>,
    objects: Arc<ObjectItemCollection>,
    oc_mapping: OnceCell<Arc<DefaultObjectMappingItemCollection>>,
    loaders: WorkspaceLoaders,
    schema_version: Mutex<Option<f64>>,
}

impl std::fmt::Debug for MetadataWorkspace {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataWorkspace")
            .field("id", &self.id)
            .field("edm", &self.edm.get().is_some())
            .field("store", &self.store.get().is_some())
            .field("mapping", &self.mapping.get().is_some())
            .field("oc_mapping", &self.oc_mapping.get().is_some())
            .field("schema_version", &self.schema_version())
            .finish()
    }
}

impl MetadataWorkspace {
    /// Workspace with only object space, resolving assemblies through
    /// `resolver`.
    pub fn new(resolver: Arc<dyn AssemblyResolver>) -> Result<Self, MetadataError> {
        Self::with_loaders(resolver, WorkspaceLoaders::default())
    }

    /// Workspace whose conceptual, storage and mapping collections load on
    /// first access.
    pub fn with_loaders(resolver: Arc<dyn AssemblyResolver>, loaders: WorkspaceLoaders) -> Result<Self, MetadataError> {
        let workspace = Self {
            id: Uuid::new_v4(),
            edm: OnceCell::new(),
            store: OnceCell::new(),
            mapping: OnceCell::new(),
            objects: Arc::new(ObjectItemCollection::new(resolver)?),
            oc_mapping: OnceCell::new(),
            loaders,
            schema_version: Mutex::new(None),
        };
        debug!(workspace = %workspace.id, "created metadata workspace");
        Ok(workspace)
    }

    /// Workspace over every metadata artifact found under `paths`.
    pub fn from_paths(
        paths: &[PathBuf],
        resolver: Arc<dyn AssemblyResolver>,
        throw_on_error: bool,
    ) -> Result<Self, MetadataError> {
        let found = som::discover_artifacts(paths);
        let artifacts = som::load_artifacts(&found)?;
        Self::from_artifacts(artifacts, resolver, throw_on_error)
    }

    /// Workspace over already parsed documents, split by layer.
    ///
    /// Conceptual and storage collections are built when documents for them
    /// exist; the storage mapping needs both.
    pub fn from_artifacts(
        artifacts: LoadedArtifacts,
        resolver: Arc<dyn AssemblyResolver>,
        throw_on_error: bool,
    ) -> Result<Self, MetadataError> {
        let workspace = Self::new(resolver)?;
        let edm_manifest = Arc::new(EdmProviderManifest::new()?);
        let LoadedArtifacts {
            conceptual,
            storage,
            mapping,
        } = artifacts;

        let edm = if conceptual.is_empty() {
            None
        } else {
            let edm = Arc::new(EdmItemCollection::from_documents(
                conceptual,
                Arc::clone(&edm_manifest),
                throw_on_error,
            )?);
            workspace.register_item_collection(SpaceCollection::Edm(Arc::clone(&edm)))?;
            Some(edm)
        };
        let store = if storage.is_empty() {
            None
        } else {
            let store = Arc::new(StoreItemCollection::from_documents(
                storage,
                edm_manifest,
                throw_on_error,
            )?);
            workspace.register_item_collection(SpaceCollection::Store(Arc::clone(&store)))?;
            Some(store)
        };
        if let (Some(edm), Some(store)) = (edm, store) {
            let mapping = StorageMappingItemCollection::new(edm, store, &mapping)?;
            workspace.register_item_collection(SpaceCollection::StorageMapping(Arc::new(mapping)))?;
        }
        Ok(workspace)
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn maximum_edm_version_supported() -> f64 {
        MAXIMUM_EDM_VERSION_SUPPORTED
    }

    /// Schema version fixed by the collections registered so far.
    pub fn schema_version(&self) -> Option<f64> {
        *self.schema_version.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn check_schema_version(&self, collection: &SpaceCollection) -> Result<(), MetadataError> {
        let Some(version) = collection.schema_version() else {
            return Ok(());
        };
        let mut current = self
            .schema_version
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        match *current {
            None => {
                *current = Some(version);
                Ok(())
            }
            Some(expected) if expected == version => Ok(()),
            Some(expected) => Err(MetadataError::SchemaVersionMismatch {
                collection: collection.kind_name(),
                expected,
                actual: version,
            }),
        }
    }

    /// Add a collection for a space that has none yet.
    pub fn register_item_collection(&self, collection: SpaceCollection) -> Result<(), MetadataError> {
        let space = collection.data_space();
        self.check_schema_version(&collection)?;
        let registered = match &collection {
            SpaceCollection::Edm(c) => self.edm.set(Arc::clone(c)).is_ok(),
            SpaceCollection::Store(c) => self.store.set(Arc::clone(c)).is_ok(),
            SpaceCollection::StorageMapping(c) => self.mapping.set(Arc::clone(c)).is_ok(),
            SpaceCollection::ObjectMapping(c) => self.oc_mapping.set(Arc::clone(c)).is_ok(),
            SpaceCollection::Object(_) => false,
        };
        if !registered {
            return Err(MetadataError::ItemCollectionAlreadyRegistered { space });
        }
        info!(workspace = %self.id, space = %space, "registered item collection");
        Ok(())
    }

    pub fn edm_collection(&self) -> Result<Option<Arc<EdmItemCollection>>, MetadataError> {
        if let Some(edm) = self.edm.get() {
            return Ok(Some(Arc::clone(edm)));
        }
        let Some(loader) = &self.loaders.conceptual else {
            return Ok(None);
        };
        let loaded = Arc::new(loader()?);
        self.check_schema_version(&SpaceCollection::Edm(Arc::clone(&loaded)))?;
        debug!(workspace = %self.id, "loaded conceptual items on first access");
        Ok(Some(Arc::clone(self.edm.get_or_init(|| loaded))))
    }

    pub fn store_collection(&self) -> Result<Option<Arc<StoreItemCollection>>, MetadataError> {
        if let Some(store) = self.store.get() {
            return Ok(Some(Arc::clone(store)));
        }
        let Some(loader) = &self.loaders.storage else {
            return Ok(None);
        };
        let loaded = Arc::new(loader()?);
        self.check_schema_version(&SpaceCollection::Store(Arc::clone(&loaded)))?;
        debug!(workspace = %self.id, "loaded store items on first access");
        Ok(Some(Arc::clone(self.store.get_or_init(|| loaded))))
    }

    pub fn mapping_collection(&self) -> Result<Option<Arc<StorageMappingItemCollection>>, MetadataError> {
        if let Some(mapping) = self.mapping.get() {
            return Ok(Some(Arc::clone(mapping)));
        }
        let Some(loader) = &self.loaders.mapping else {
            return Ok(None);
        };
        let (Some(edm), Some(store)) = (self.edm_collection()?, self.store_collection()?) else {
            return Ok(None);
        };
        let loaded = Arc::new(loader(&edm, &store)?);
        self.check_schema_version(&SpaceCollection::StorageMapping(Arc::clone(&loaded)))?;
        debug!(workspace = %self.id, "loaded storage mapping on first access");
        Ok(Some(Arc::clone(self.mapping.get_or_init(|| loaded))))
    }

    /// The object mapping, derived from conceptual and object space once a
    /// conceptual model exists.
    pub fn oc_mapping_collection(&self) -> Result<Option<Arc<DefaultObjectMappingItemCollection>>, MetadataError> {
        if let Some(oc) = self.oc_mapping.get() {
            return Ok(Some(Arc::clone(oc)));
        }
        let Some(edm) = self.edm_collection()? else {
            return Ok(None);
        };
        let derived = self.oc_mapping.get_or_init(|| {
            Arc::new(DefaultObjectMappingItemCollection::new(
                edm,
                Arc::clone(&self.objects),
            ))
        });
        Ok(Some(Arc::clone(derived)))
    }

    pub fn try_get_item_collection(&self, space: DataSpace) -> Result<Option<SpaceCollection>, MetadataError> {
        Ok(match space {
            DataSpace::CSpace => self.edm_collection()?.map(SpaceCollection::Edm),
            DataSpace::SSpace => self.store_collection()?.map(SpaceCollection::Store),
            DataSpace::OSpace => Some(SpaceCollection::Object(Arc::clone(&self.objects))),
            DataSpace::CSSpace => self.mapping_collection()?.map(SpaceCollection::StorageMapping),
            DataSpace::OCSpace => self.oc_mapping_collection()?.map(SpaceCollection::ObjectMapping),
        })
    }

    pub fn get_item_collection(&self, space: DataSpace) -> Result<SpaceCollection, MetadataError> {
        self.try_get_item_collection(space)?
            .ok_or(MetadataError::ItemCollectionNotRegistered { space })
    }

    pub fn object_items(&self) -> &Arc<ObjectItemCollection> {
        &self.objects
    }

    /// Run `f` against the global items of `space`.
    ///
    /// `Ok(None)` when the space has no collection and `required` is off.
    fn with_items<R>(
        &self,
        space: DataSpace,
        required: bool,
        f: impl FnOnce(&ItemCollection) -> R,
    ) -> Result<Option<R>, MetadataError> {
        let missing = || {
            if required {
                Err(MetadataError::ItemCollectionNotRegistered { space })
            } else {
                Ok(None)
            }
        };
        match space {
            DataSpace::CSpace => match self.edm_collection()? {
                Some(edm) => Ok(Some(f(edm.items()))),
                None => missing(),
            },
            DataSpace::SSpace => match self.store_collection()? {
                Some(store) => Ok(Some(f(store.items()))),
                None => missing(),
            },
            DataSpace::OSpace => Ok(Some(self.objects.with_items(f))),
            DataSpace::CSSpace | DataSpace::OCSpace => missing(),
        }
    }

    /// Every global item of `space`, in load order.
    pub fn all_items(&self, space: DataSpace) -> Result<Vec<GlobalItem>, MetadataError> {
        self.with_items(space, true, |items| items.iter().cloned().collect())?
            .ok_or(MetadataError::ItemCollectionNotRegistered { space })
    }

    pub fn get_item<T: GlobalItemType>(&self, identity: &str, space: DataSpace) -> Result<Arc<T>, MetadataError> {
        self.with_items(space, true, |items| items.get_item::<T>(identity, false).cloned())?
            .unwrap_or_else(|| Err(MetadataError::ItemCollectionNotRegistered { space }))
    }

    pub fn try_get_item<T: GlobalItemType>(
        &self,
        identity: &str,
        space: DataSpace,
        ignore_case: bool,
    ) -> Result<Option<Arc<T>>, MetadataError> {
        Ok(self
            .with_items(space, false, |items| items.try_get_item::<T>(identity, ignore_case).cloned())?
            .flatten())
    }

    pub fn get_items<T: GlobalItemType>(&self, space: DataSpace) -> Result<Arc<Vec<Arc<T>>>, MetadataError> {
        self.with_items(space, true, |items| items.get_items::<T>())?
            .ok_or(MetadataError::ItemCollectionNotRegistered { space })
    }

    pub fn try_get_type(
        &self,
        name: &str,
        namespace: &str,
        space: DataSpace,
        ignore_case: bool,
    ) -> Result<Option<GlobalItem>, MetadataError> {
        Ok(self
            .with_items(space, false, |items| items.try_get_type(name, namespace, ignore_case).cloned())?
            .flatten())
    }

    pub fn get_type(&self, name: &str, namespace: &str, space: DataSpace, ignore_case: bool) -> Result<GlobalItem, MetadataError> {
        self.with_items(space, true, |items| items.get_type(name, namespace, ignore_case).cloned())?
            .unwrap_or_else(|| Err(MetadataError::ItemCollectionNotRegistered { space }))
    }

    pub fn try_get_entity_container(
        &self,
        name: &str,
        space: DataSpace,
        ignore_case: bool,
    ) -> Result<Option<Arc<EntityContainer>>, MetadataError> {
        Ok(self
            .with_items(space, false, |items| items.try_get_entity_container(name, ignore_case).cloned())?
            .flatten())
    }

    pub fn get_entity_container(&self, name: &str, space: DataSpace, ignore_case: bool) -> Result<Arc<EntityContainer>, MetadataError> {
        self.with_items(space, true, |items| items.get_entity_container(name, ignore_case).cloned())?
            .unwrap_or_else(|| Err(MetadataError::ItemCollectionNotRegistered { space }))
    }

    /// Every overload of `namespace.name`; empty when the space has no
    /// collection.
    pub fn get_functions(
        &self,
        name: &str,
        namespace: &str,
        space: DataSpace,
        ignore_case: bool,
    ) -> Result<Vec<Arc<EdmFunction>>, MetadataError> {
        let full_name = qualify(namespace, name);
        Ok(self
            .with_items(space, false, |items| items.get_functions(&full_name, ignore_case))?
            .unwrap_or_default())
    }

    pub fn get_primitive_types(&self, space: DataSpace) -> Result<Vec<Arc<PrimitiveType>>, MetadataError> {
        match space {
            DataSpace::CSpace => Ok(self
                .edm_collection()?
                .ok_or(MetadataError::ItemCollectionNotRegistered { space })?
                .get_primitive_types(None)),
            DataSpace::SSpace => Ok(self
                .store_collection()?
                .ok_or(MetadataError::ItemCollectionNotRegistered { space })?
                .manifest()
                .store_types()
                .to_vec()),
            DataSpace::OSpace => Ok(self.objects.get_primitive_types()),
            other => Err(MetadataError::InvalidDataSpace {
                operation: "get_primitive_types",
                identity: String::new(),
                expected: DataSpace::CSpace,
                actual: other,
            }),
        }
    }

    /// Hash of the storage mapping, `None` without one.
    pub fn get_mapping_hash(&self) -> Result<Option<String>, MetadataError> {
        Ok(self
            .mapping_collection()?
            .map(|mapping| mapping.compute_mapping_hash().to_string()))
    }

    fn require_space(operation: &'static str, item: &GlobalItem, expected: DataSpace) -> Result<(), MetadataError> {
        if item.data_space() != expected {
            return Err(MetadataError::InvalidDataSpace {
                operation,
                identity: item.identity().to_string(),
                expected,
                actual: item.data_space(),
            });
        }
        Ok(())
    }

    /// Object-space type mapped to a conceptual type.
    pub fn try_get_object_space_type(&self, edm_type: &GlobalItem) -> Result<Option<GlobalItem>, MetadataError> {
        Self::require_space("try_get_object_space_type", edm_type, DataSpace::CSpace)?;
        let Some(oc) = self.oc_mapping_collection()? else {
            return Ok(None);
        };
        Ok(oc
            .try_get_map(edm_type.identity(), DataSpace::CSpace, false)?
            .map(|mapping| mapping.clr_type().clone()))
    }

    pub fn get_object_space_type(&self, edm_type: &GlobalItem) -> Result<GlobalItem, MetadataError> {
        self.try_get_object_space_type(edm_type)?
            .ok_or_else(|| MetadataError::MappingNotFound {
                identity: edm_type.identity().to_string(),
            })
    }

    /// Conceptual type an object-space type is mapped to.
    pub fn try_get_edm_space_type(&self, clr_type: &GlobalItem) -> Result<Option<GlobalItem>, MetadataError> {
        Self::require_space("try_get_edm_space_type", clr_type, DataSpace::OSpace)?;
        let Some(oc) = self.oc_mapping_collection()? else {
            return Ok(None);
        };
        Ok(oc
            .try_get_map(clr_type.identity(), DataSpace::OSpace, false)?
            .map(|mapping| mapping.edm_type().clone()))
    }

    pub fn get_edm_space_type(&self, clr_type: &GlobalItem) -> Result<GlobalItem, MetadataError> {
        self.try_get_edm_space_type(clr_type)?
            .ok_or_else(|| MetadataError::MappingNotFound {
                identity: clr_type.identity().to_string(),
            })
    }

    /// Object-space counterpart of a conceptual type usage, facets kept.
    pub fn get_o_space_type_usage(&self, edm_usage: &Arc<TypeUsage>) -> Result<Arc<TypeUsage>, MetadataError> {
        let edm_type = self.o_space_type_ref(edm_usage.edm_type())?;
        Ok(TypeUsage::from_facets(
            edm_type,
            edm_usage.facets().iter().cloned().collect(),
        ))
    }

    fn o_space_type_ref(&self, edm_type: &EdmTypeRef) -> Result<EdmTypeRef, MetadataError> {
        match edm_type {
            EdmTypeRef::Primitive(primitive) => self
                .objects
                .get_mapped_primitive_type(primitive.kind())
                .map(EdmTypeRef::Primitive)
                .ok_or_else(|| MetadataError::MappingNotFound {
                    identity: primitive.identity().to_string(),
                }),
            EdmTypeRef::Named(name) => {
                let edm_item = self
                    .with_items(DataSpace::CSpace, true, |items| {
                        items.try_get_global(name.identity(), false).cloned()
                    })?
                    .flatten()
                    .ok_or_else(|| MetadataError::not_found(name.identity(), DataSpace::CSpace))?;
                let clr_item = self.get_object_space_type(&edm_item)?;
                clr_item
                    .as_named_type()
                    .map(|named| EdmTypeRef::Named(named.type_name()))
                    .ok_or_else(|| MetadataError::internal(format!("'{}' is not a named type", clr_item.identity())))
            }
            EdmTypeRef::Collection(collection) => {
                let element = self.get_o_space_type_usage(collection.element_type())?;
                Ok(EdmTypeRef::Collection(Arc::new(CollectionType::new(element))))
            }
            other => Err(MetadataError::MappingNotFound {
                identity: other.identity().to_string(),
            }),
        }
    }

    /// Load an assembly the resolver knows by name.
    pub fn load_from_assembly(&self, name: &str) -> Result<bool, MetadataError> {
        let edm = self.edm_collection()?;
        self.objects.load_from_assembly(name, edm.as_deref())
    }

    /// Load what a CLR type needs on first use; see
    /// [`ObjectItemCollection::implicit_load_assembly_for_type`].
    pub fn implicit_load_assembly_for_type(
        &self,
        clr_type: &ClrTypeHandle,
        calling_assembly: Option<&str>,
    ) -> Result<bool, MetadataError> {
        let edm = self.edm_collection()?;
        self.objects
            .implicit_load_assembly_for_type(clr_type, calling_assembly, edm.as_deref())
    }

    /// Make sure a conceptual entity type has an object-space counterpart,
    /// loading from the calling assembly and its references if needed.
    pub fn implicit_load_from_entity_type(&self, edm_identity: &str, calling_assembly: &str) -> Result<bool, MetadataError> {
        let Some(edm) = self.edm_collection()? else {
            return Err(MetadataError::ItemCollectionNotRegistered {
                space: DataSpace::CSpace,
            });
        };
        let edm_type = edm
            .items()
            .try_get_global(edm_identity, false)
            .cloned()
            .ok_or_else(|| MetadataError::not_found(edm_identity, DataSpace::CSpace))?;
        if self.objects.try_get_o_space_type(&edm_type)?.is_some() {
            return Ok(true);
        }
        self.objects
            .implicit_load_all_referenced_assemblies(calling_assembly, Some(edm.as_ref()))?;
        Ok(self.objects.try_get_o_space_type(&edm_type)?.is_some())
    }
}
