//! Object (OSpace) item collection, filled from CLR assemblies.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard};

use tracing::{debug, trace, warn};

use super::assembly::{AssemblyLoad, AssemblyResolver, ClrAssembly, ClrTypeHandle, KnownAssemblies, LoadedClrType};
use super::{EdmItemCollection, ItemCollection};
use crate::error::{only_warnings, MetadataError};
use crate::metadata::{
    DataSpace, GlobalItem, GlobalItemType, MetadataItem, PrimitiveType, PrimitiveTypeKind,
};
use crate::provider::ClrPrimitiveTypes;
use crate::validator;

#[derive(Debug)]
struct ObjectItems {
    items: ItemCollection,
    /// Conceptual identity to the object-space type mapped to it.
    oc_mapping: HashMap<String, GlobalItem>,
    /// Object-space identity to the conceptual identity it maps to.
    c_identities: HashMap<String, String>,
    clr_types: HashMap<String, ClrTypeHandle>,
}

/// Object-space items and their conceptual pairing under one read lock.
#[derive(Clone, Copy)]
pub(crate) struct ObjectView<'a> {
    pub items: &'a ItemCollection,
    c_identities: &'a HashMap<String, String>,
}

impl<'a> ObjectView<'a> {
    /// Conceptual identity for an object-space type. Types not loaded from a
    /// CLR type (associations) share their conceptual identity.
    pub fn c_identity<'b>(&'b self, o_identity: &'b str) -> &'b str {
        self.c_identities
            .get(o_identity)
            .map(String::as_str)
            .unwrap_or(o_identity)
    }
}

#[derive(Debug, Default)]
struct LoaderState {
    known: KnownAssemblies,
    cookie: u64,
}

/// Object-space items and the cache of assemblies already scanned.
///
/// Items are only ever appended. Loads are serialized; readers take the items
/// lock for the duration of one lookup.
#[derive(Debug)]
pub struct ObjectItemCollection {
    items: RwLock<ObjectItems>,
    primitives: Arc<ClrPrimitiveTypes>,
    resolver: Arc<dyn AssemblyResolver>,
    loader: Mutex<LoaderState>,
}

impl ObjectItemCollection {
    pub fn new(resolver: Arc<dyn AssemblyResolver>) -> Result<Self, MetadataError> {
        let primitives = Arc::new(ClrPrimitiveTypes::new());
        let mut items = ItemCollection::new(DataSpace::OSpace);
        for primitive in primitives.all() {
            items.add_internal(GlobalItem::PrimitiveType(Arc::clone(primitive)))?;
        }
        Ok(Self {
            items: RwLock::new(ObjectItems {
                items,
                oc_mapping: HashMap::new(),
                c_identities: HashMap::new(),
                clr_types: HashMap::new(),
            }),
            primitives,
            resolver,
            loader: Mutex::new(LoaderState::default()),
        })
    }

    fn read(&self) -> RwLockReadGuard<'_, ObjectItems> {
        self.items.read().unwrap_or_else(PoisonError::into_inner)
    }

    /// Run `f` against the current items.
    pub fn with_items<R>(&self, f: impl FnOnce(&ItemCollection) -> R) -> R {
        f(&self.read().items)
    }

    pub(crate) fn with_view<R>(&self, f: impl FnOnce(ObjectView<'_>) -> R) -> R {
        let current = self.read();
        f(ObjectView {
            items: &current.items,
            c_identities: &current.c_identities,
        })
    }

    pub fn len(&self) -> usize {
        self.read().items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.read().items.is_empty()
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.read().items.contains(identity)
    }

    pub fn try_get_item<T: GlobalItemType>(&self, identity: &str, ignore_case: bool) -> Option<Arc<T>> {
        self.read().items.try_get_item::<T>(identity, ignore_case).cloned()
    }

    pub fn get_item<T: GlobalItemType>(&self, identity: &str, ignore_case: bool) -> Result<Arc<T>, MetadataError> {
        self.read().items.get_item::<T>(identity, ignore_case).cloned()
    }

    pub fn get_items<T: GlobalItemType>(&self) -> Arc<Vec<Arc<T>>> {
        self.read().items.get_items::<T>()
    }

    pub fn try_get_type(&self, name: &str, namespace: &str, ignore_case: bool) -> Option<GlobalItem> {
        self.read().items.try_get_type(name, namespace, ignore_case).cloned()
    }

    /// Current loader generation. Known-assembly entries from an older
    /// generation are ignored.
    pub fn loader_cookie(&self) -> u64 {
        self.loader.lock().unwrap_or_else(PoisonError::into_inner).cookie
    }

    /// Start a new loader generation so that every assembly is scanned again
    /// on its next load.
    pub fn invalidate_loader_cookie(&self) -> u64 {
        let mut loader = self.loader.lock().unwrap_or_else(PoisonError::into_inner);
        loader.cookie += 1;
        debug!(cookie = loader.cookie, "invalidated assembly loader cookie");
        loader.cookie
    }

    pub fn is_known_assembly(&self, name: &str) -> bool {
        let loader = self.loader.lock().unwrap_or_else(PoisonError::into_inner);
        loader.known.contains(name)
    }

    /// Load the object-space types of `assembly`, and with `load_referenced`
    /// of the assemblies it references.
    ///
    /// Assemblies scanned before under the current cookie are not scanned
    /// again. Returns whether the assembly holds any object-space types.
    pub fn load_assembly(
        &self,
        assembly: &Arc<ClrAssembly>,
        load_referenced: bool,
        edm: Option<&EdmItemCollection>,
    ) -> Result<bool, MetadataError> {
        let mut loader = self.loader.lock().unwrap_or_else(PoisonError::into_inner);
        let cookie = loader.cookie;
        let with_edm = edm.is_some();
        if let Some(entry) = loader.known.get(&assembly.name, cookie, with_edm) {
            if !load_referenced || entry.referenced_loaded {
                trace!(assembly = %assembly.name, "assembly already loaded");
                return Ok(!entry.types.is_empty());
            }
        }

        let mut known = loader.known.clone();
        let loaded = {
            let current = self.read();
            let load = AssemblyLoad {
                resolver: self.resolver.as_ref(),
                edm,
                existing: &current.items,
                oc_mapping: &current.oc_mapping,
                primitives: &self.primitives,
                cookie,
            };
            load.load(assembly, load_referenced, &mut known)?
        };
        self.add_loaded_types(loaded)?;
        loader.known = known;

        Ok(loader
            .known
            .get(&assembly.name, cookie, with_edm)
            .is_some_and(|entry| !entry.types.is_empty()))
    }

    /// Load an assembly the resolver knows by name, without its references.
    pub fn load_from_assembly(&self, name: &str, edm: Option<&EdmItemCollection>) -> Result<bool, MetadataError> {
        let assembly = self.resolve(name)?;
        self.load_assembly(&assembly, false, edm)
    }

    /// Load the metadata a CLR type needs on first use.
    ///
    /// The declaring assembly is tried first. When that does not register the
    /// type, the calling assembly is loaded; its references follow only when
    /// it or one of them carries the schema attribute. Returns whether the
    /// type is registered afterwards.
    pub fn implicit_load_assembly_for_type(
        &self,
        clr_type: &ClrTypeHandle,
        calling_assembly: Option<&str>,
        edm: Option<&EdmItemCollection>,
    ) -> Result<bool, MetadataError> {
        if self.contains(&clr_type.full_name) {
            return Ok(true);
        }
        debug!(clr_type = %clr_type, "implicitly loading assembly for type");
        if let Some(declaring) = self.resolver.resolve(&clr_type.assembly) {
            self.load_assembly(&declaring, false, edm)?;
            if self.contains(&clr_type.full_name) {
                return Ok(true);
            }
        }
        if let Some(calling) = calling_assembly {
            self.implicit_load_all_referenced_assemblies(calling, edm)?;
        }
        Ok(self.contains(&clr_type.full_name))
    }

    /// Load an assembly, and its references too when it or one of them
    /// carries the schema attribute.
    pub fn implicit_load_all_referenced_assemblies(
        &self,
        name: &str,
        edm: Option<&EdmItemCollection>,
    ) -> Result<(), MetadataError> {
        let assembly = self.resolve(name)?;
        let opted_in = assembly.has_schema_attribute
            || assembly
                .referenced
                .iter()
                .filter_map(|r| self.resolver.resolve(r))
                .any(|r| r.has_schema_attribute);
        trace!(assembly = %name, load_referenced = opted_in, "implicit load of calling assembly");
        self.load_assembly(&assembly, opted_in, edm)?;
        Ok(())
    }

    fn resolve(&self, name: &str) -> Result<Arc<ClrAssembly>, MetadataError> {
        self.resolver.resolve(name).ok_or_else(|| MetadataError::ObjectMapping {
            message: format!("Assembly '{}' could not be resolved", name),
        })
    }

    /// Register a batch of loaded types; either all of them go in or none.
    fn add_loaded_types(&self, loaded: Vec<LoadedClrType>) -> Result<(), MetadataError> {
        if loaded.is_empty() {
            return Ok(());
        }
        let mut current = self.items.write().unwrap_or_else(PoisonError::into_inner);

        let batch: Vec<GlobalItem> = loaded.iter().map(|t| t.item.clone()).collect();
        let errors = validator::validate(&batch, &current.items);
        if !only_warnings(&errors) {
            warn!(errors = errors.len(), "object-space types failed validation");
            return Err(MetadataError::Schema { errors });
        }

        let mut mapped: HashMap<&str, &LoadedClrType> = HashMap::new();
        for loaded_type in &loaded {
            let Some(edm_type) = loaded_type.edm_type.as_deref() else {
                continue;
            };
            let clash = current
                .oc_mapping
                .get(edm_type)
                .map(|existing| existing.identity().to_string())
                .or_else(|| mapped.get(edm_type).map(|t| t.item.identity().to_string()));
            if let Some(existing) = clash {
                warn!(
                    edm_type,
                    existing = %existing,
                    clr_type = loaded_type.item.identity(),
                    "conceptual type mapped by more than one CLR type"
                );
                return Err(MetadataError::AmbiguousClrTypeMapping {
                    clr_type: loaded_type.item.identity().to_string(),
                    edm_type: edm_type.to_string(),
                });
            }
            mapped.insert(edm_type, loaded_type);
        }

        if !current.items.atomic_add_range(batch)? {
            return Err(MetadataError::internal(
                "an object-space type was registered twice",
            ));
        }
        for loaded_type in &loaded {
            let identity = loaded_type.item.identity().to_string();
            if let Some(edm_type) = &loaded_type.edm_type {
                current
                    .oc_mapping
                    .insert(edm_type.clone(), loaded_type.item.clone());
                current.c_identities.insert(identity.clone(), edm_type.clone());
            }
            if let Some(clr) = &loaded_type.clr {
                current.clr_types.insert(identity, clr.clone());
            }
        }
        debug!(types = loaded.len(), total = current.items.len(), "registered object-space types");
        Ok(())
    }

    /// Object-space type paired with a conceptual type.
    ///
    /// Entity, complex and enum types pair through the loaded CLR types;
    /// anything else pairs by identity.
    pub fn try_get_o_space_type(&self, c_type: &GlobalItem) -> Result<Option<GlobalItem>, MetadataError> {
        if c_type.data_space() != DataSpace::CSpace {
            return Err(MetadataError::InvalidDataSpace {
                operation: "try_get_o_space_type",
                identity: c_type.identity().to_string(),
                expected: DataSpace::CSpace,
                actual: c_type.data_space(),
            });
        }
        let current = self.read();
        Ok(match c_type {
            GlobalItem::EntityType(_) | GlobalItem::ComplexType(_) | GlobalItem::EnumType(_) => {
                current.oc_mapping.get(c_type.identity()).cloned()
            }
            _ => current.items.try_get_global(c_type.identity(), false).cloned(),
        })
    }

    /// Conceptual identity an object-space type was loaded for.
    pub fn try_get_mapping_c_space_type_identity(&self, o_identity: &str) -> Option<String> {
        self.read().c_identities.get(o_identity).cloned()
    }

    /// CLR type an object-space type was built from.
    pub fn try_get_clr_type(&self, o_identity: &str) -> Option<ClrTypeHandle> {
        self.read().clr_types.get(o_identity).cloned()
    }

    pub fn get_mapped_primitive_type(&self, kind: PrimitiveTypeKind) -> Option<Arc<PrimitiveType>> {
        self.primitives.for_kind(kind).cloned()
    }

    pub fn get_primitive_types(&self) -> Vec<Arc<PrimitiveType>> {
        self.primitives.all().to_vec()
    }

    pub fn primitives(&self) -> &Arc<ClrPrimitiveTypes> {
        &self.primitives
    }
}
