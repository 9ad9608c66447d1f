//! ItemCollection: the frozen global items of one data space.

use std::any::{Any, TypeId};
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex, PoisonError};

use once_cell::sync::OnceCell;

use crate::error::MetadataError;
use crate::metadata::{
    build_identity, DataSpace, EdmFunction, EntityContainer, GlobalItem, GlobalItemType,
    MetadataCollection, MetadataItem, NamedTypeRef, ParameterMode, PrimitiveType,
    PrimitiveTypeKind, TypeLookup, TypeUsage,
};
use crate::util::{fold_case, qualify};

/// Typed views handed out by [`ItemCollection::get_items`].
///
/// Dropped wholesale whenever the item count moves; items are only ever
/// appended, so a count check is enough to spot a stale view.
#[derive(Default)]
struct TypedViews {
    item_count: usize,
    views: HashMap<TypeId, Arc<dyn Any + Send + Sync>>,
}

/// Frozen global items of one data space, addressable by identity.
pub struct ItemCollection {
    data_space: DataSpace,
    items: MetadataCollection<GlobalItem>,
    typed_views: Mutex<TypedViews>,
    /// Folded full function name to every overload, in load order.
    function_table: OnceCell<HashMap<String, Vec<Arc<EdmFunction>>>>,
}

impl std::fmt::Debug for ItemCollection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ItemCollection")
            .field("data_space", &self.data_space)
            .field("items", &self.items.len())
            .finish()
    }
}

impl ItemCollection {
    pub fn new(data_space: DataSpace) -> Self {
        Self {
            data_space,
            items: MetadataCollection::new(),
            typed_views: Mutex::new(TypedViews::default()),
            function_table: OnceCell::new(),
        }
    }

    pub fn data_space(&self) -> DataSpace {
        self.data_space
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, GlobalItem> {
        self.items.iter()
    }

    /// Admit a frozen item of this collection's space.
    ///
    /// Freezing is the loader's job; an unfrozen or foreign item here is a
    /// loader bug.
    pub fn add_internal(&mut self, item: GlobalItem) -> Result<(), MetadataError> {
        self.check_admissible(&item)?;
        self.items.add(item)?;
        self.function_table = OnceCell::new();
        Ok(())
    }

    /// Add every item or none of them.
    ///
    /// Returns `false`, leaving the collection untouched, when any identity
    /// is already present or repeats within `items`.
    pub fn atomic_add_range(&mut self, items: Vec<GlobalItem>) -> Result<bool, MetadataError> {
        let mut incoming = HashSet::with_capacity(items.len());
        for item in &items {
            self.check_admissible(item)?;
            if self.items.contains(item.identity()) || !incoming.insert(item.identity()) {
                return Ok(false);
            }
        }
        drop(incoming);
        for item in items {
            self.items.add(item)?;
        }
        self.function_table = OnceCell::new();
        Ok(true)
    }

    fn check_admissible(&self, item: &GlobalItem) -> Result<(), MetadataError> {
        if !item.is_read_only() {
            return Err(MetadataError::internal(format!(
                "'{}' must be frozen before it is added to an item collection",
                item.identity()
            )));
        }
        if item.data_space() != self.data_space {
            return Err(MetadataError::InvalidDataSpace {
                operation: "ItemCollection::add_internal",
                identity: item.identity().to_string(),
                expected: self.data_space,
                actual: item.data_space(),
            });
        }
        Ok(())
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.items.contains(identity)
    }

    /// Item of any kind by identity; `None` when absent or, ignoring case,
    /// ambiguous.
    pub fn try_get_global(&self, identity: &str, ignore_case: bool) -> Option<&GlobalItem> {
        self.items.try_get_value(identity, ignore_case)
    }

    pub fn try_get_item<T: GlobalItemType>(
        &self,
        identity: &str,
        ignore_case: bool,
    ) -> Option<&Arc<T>> {
        self.try_get_global(identity, ignore_case)
            .and_then(GlobalItem::downcast::<T>)
    }

    /// Item by identity. Absent identities and items of another kind are
    /// both reported as not found.
    pub fn get_item<T: GlobalItemType>(
        &self,
        identity: &str,
        ignore_case: bool,
    ) -> Result<&Arc<T>, MetadataError> {
        let item = self
            .items
            .get_value(identity, ignore_case)
            .map_err(|err| match err {
                MetadataError::ItemNotFound { .. } => {
                    MetadataError::not_found(identity, self.data_space)
                }
                other => other,
            })?;
        item.downcast::<T>()
            .ok_or_else(|| MetadataError::not_found(identity, self.data_space))
    }

    /// Every item of kind `T`, in load order.
    pub fn get_items<T: GlobalItemType>(&self) -> Arc<Vec<Arc<T>>> {
        let mut cache = self
            .typed_views
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        if cache.item_count != self.items.len() {
            cache.views.clear();
            cache.item_count = self.items.len();
        }
        if let Some(view) = cache.views.get(&TypeId::of::<T>()) {
            if let Ok(view) = Arc::clone(view).downcast::<Vec<Arc<T>>>() {
                return view;
            }
        }
        let view: Arc<Vec<Arc<T>>> = Arc::new(
            self.items
                .iter()
                .filter_map(|item| item.downcast::<T>().cloned())
                .collect(),
        );
        cache
            .views
            .insert(TypeId::of::<T>(), Arc::clone(&view) as Arc<dyn Any + Send + Sync>);
        view
    }

    /// A type (primitive, enum, entity, complex or association) by name and
    /// namespace.
    pub fn try_get_type(&self, name: &str, namespace: &str, ignore_case: bool) -> Option<&GlobalItem> {
        self.try_get_global(&qualify(namespace, name), ignore_case)
            .filter(|item| item.is_edm_type() && !matches!(item, GlobalItem::Function(_)))
    }

    pub fn get_type(
        &self,
        name: &str,
        namespace: &str,
        ignore_case: bool,
    ) -> Result<&GlobalItem, MetadataError> {
        self.try_get_type(name, namespace, ignore_case)
            .ok_or_else(|| MetadataError::not_found(qualify(namespace, name), self.data_space))
    }

    /// Every overload of a function by full name.
    ///
    /// Case-sensitive queries filter the case-insensitive table instead of
    /// keeping a second index.
    pub fn get_functions(&self, full_name: &str, ignore_case: bool) -> Vec<Arc<EdmFunction>> {
        let Some(overloads) = self.function_table().get(&fold_case(full_name)) else {
            return Vec::new();
        };
        if ignore_case {
            return overloads.clone();
        }
        overloads
            .iter()
            .filter(|function| function.full_name() == full_name)
            .cloned()
            .collect()
    }

    /// The overload whose parameters are all `In` and of exactly these types.
    pub fn try_get_function(
        &self,
        full_name: &str,
        parameter_types: &[Arc<TypeUsage>],
        ignore_case: bool,
    ) -> Option<&Arc<EdmFunction>> {
        let identity = build_identity(
            full_name,
            parameter_types
                .iter()
                .map(|usage| (ParameterMode::In, usage.edm_type().identity())),
        );
        self.try_get_item::<EdmFunction>(&identity, ignore_case)
    }

    fn function_table(&self) -> &HashMap<String, Vec<Arc<EdmFunction>>> {
        self.function_table.get_or_init(|| {
            let mut table: HashMap<String, Vec<Arc<EdmFunction>>> = HashMap::new();
            for item in self.items.iter() {
                if let GlobalItem::Function(function) = item {
                    table
                        .entry(fold_case(&function.full_name()))
                        .or_default()
                        .push(Arc::clone(function));
                }
            }
            table
        })
    }

    pub fn try_get_entity_container(
        &self,
        name: &str,
        ignore_case: bool,
    ) -> Option<&Arc<EntityContainer>> {
        self.try_get_item::<EntityContainer>(name, ignore_case)
    }

    pub fn get_entity_container(
        &self,
        name: &str,
        ignore_case: bool,
    ) -> Result<&Arc<EntityContainer>, MetadataError> {
        self.try_get_entity_container(name, ignore_case)
            .ok_or_else(|| MetadataError::not_found(name, self.data_space))
    }

    /// Primitive type of this space for a canonical kind, by kind lookup
    /// over the registered primitive types.
    pub fn find_primitive_type(&self, kind: PrimitiveTypeKind) -> Option<Arc<PrimitiveType>> {
        self.get_items::<PrimitiveType>()
            .iter()
            .find(|primitive| primitive.kind() == kind)
            .cloned()
    }
}

impl TypeLookup for ItemCollection {
    fn find_named_type(&self, identity: &str) -> Option<NamedTypeRef<'_>> {
        self.items
            .try_get_value(identity, false)
            .and_then(GlobalItem::as_named_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::{EdmTypeRef, EntityType, FunctionParameter, FunctionPayload};
    use crate::provider::EdmProviderManifest;

    fn frozen_entity(namespace: &str, name: &str) -> GlobalItem {
        let mut entity = EntityType::new(name, namespace, DataSpace::CSpace);
        entity.set_read_only();
        GlobalItem::EntityType(Arc::new(entity))
    }

    fn frozen_function(name: &str, parameter: Arc<TypeUsage>) -> GlobalItem {
        let mut function = EdmFunction::new(
            name,
            "Model",
            DataSpace::CSpace,
            FunctionPayload {
                parameters: vec![FunctionParameter::new("p", parameter, ParameterMode::In)],
                ..FunctionPayload::default()
            },
        )
        .unwrap();
        function.set_read_only();
        GlobalItem::Function(Arc::new(function))
    }

    #[test]
    fn test_add_requires_frozen_item_of_same_space() {
        let mut items = ItemCollection::new(DataSpace::CSpace);
        let open = GlobalItem::EntityType(Arc::new(EntityType::new("A", "M", DataSpace::CSpace)));
        assert!(matches!(
            items.add_internal(open),
            Err(MetadataError::InternalFault { .. })
        ));

        let mut store = EntityType::new("A", "M", DataSpace::SSpace);
        store.set_read_only();
        assert!(matches!(
            items.add_internal(GlobalItem::EntityType(Arc::new(store))),
            Err(MetadataError::InvalidDataSpace { .. })
        ));
        assert!(items.is_empty());
    }

    #[test]
    fn test_typed_view_refreshes_after_append() {
        let mut items = ItemCollection::new(DataSpace::CSpace);
        items.add_internal(frozen_entity("M", "A")).unwrap();
        let first = items.get_items::<EntityType>();
        assert!(Arc::ptr_eq(&first, &items.get_items::<EntityType>()));

        items.add_internal(frozen_entity("M", "B")).unwrap();
        let second = items.get_items::<EntityType>();
        assert_eq!(second.len(), 2);
        assert!(!Arc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_atomic_add_range_is_all_or_nothing() {
        let mut items = ItemCollection::new(DataSpace::CSpace);
        items.add_internal(frozen_entity("M", "A")).unwrap();
        let added = items
            .atomic_add_range(vec![frozen_entity("M", "B"), frozen_entity("M", "A")])
            .unwrap();
        assert!(!added);
        assert_eq!(items.len(), 1);
        assert!(items
            .atomic_add_range(vec![frozen_entity("M", "B"), frozen_entity("M", "C")])
            .unwrap());
        assert_eq!(items.len(), 3);
    }

    #[test]
    fn test_function_lookup_filters_case_at_query_time() {
        let manifest = EdmProviderManifest::new().unwrap();
        let int32 = TypeUsage::create(EdmTypeRef::Primitive(
            manifest.primitive_type(PrimitiveTypeKind::Int32).unwrap(),
        ));
        let string = TypeUsage::create(EdmTypeRef::Primitive(
            manifest.primitive_type(PrimitiveTypeKind::String).unwrap(),
        ));
        let mut items = ItemCollection::new(DataSpace::CSpace);
        items.add_internal(frozen_function("Score", Arc::clone(&int32))).unwrap();
        items.add_internal(frozen_function("Score", string)).unwrap();
        items.add_internal(frozen_function("SCORE", Arc::clone(&int32))).unwrap();

        assert_eq!(items.get_functions("Model.Score", false).len(), 2);
        assert_eq!(items.get_functions("model.score", true).len(), 3);
        assert!(items.get_functions("Model.Other", true).is_empty());

        let found = items.try_get_function("Model.Score", &[int32], false).unwrap();
        assert_eq!(found.identity(), "Model.Score(in Edm.Int32)");
    }

    #[test]
    fn test_type_lookup_skips_functions_and_containers() {
        let mut items = ItemCollection::new(DataSpace::CSpace);
        items.add_internal(frozen_entity("M", "Order")).unwrap();
        assert!(items.try_get_type("order", "m", true).is_some());
        assert!(items.try_get_type("order", "m", false).is_none());
        assert!(matches!(
            items.get_item::<EdmFunction>("M.Order", false),
            Err(MetadataError::ItemNotFound { .. })
        ));
    }
}
