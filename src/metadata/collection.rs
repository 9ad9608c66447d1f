//! Identity-indexed ordered collection used for every member list and item registry.
//!
//! Small collections are scanned linearly. Once a collection holds more than
//! [`USE_DICTIONARY_CROSSOVER`] items, lookups build dictionaries lazily:
//!
//! - a case-sensitive map from identity to index, kept up to date by `add`
//! - a case-insensitive map from folded identity to index (or an ambiguity
//!   marker), dropped by every `add` and rebuilt on the next query

use std::collections::HashMap;
use std::ops::Index;

use once_cell::sync::OnceCell;

use super::item::MetadataItem;
use crate::error::MetadataError;
use crate::util::{eq_ci, fold_case};

/// Item count above which lookups switch from linear scans to dictionaries.
pub const USE_DICTIONARY_CROSSOVER: usize = 8;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FoldedSlot {
    Index(usize),
    Ambiguous,
}

/// Ordered collection of metadata items keyed by identity
#[derive(Debug, Clone)]
pub struct MetadataCollection<T> {
    items: Vec<T>,
    case_sensitive: OnceCell<HashMap<String, usize>>,
    case_insensitive: OnceCell<HashMap<String, FoldedSlot>>,
    read_only: bool,
}

impl<T> Default for MetadataCollection<T> {
    fn default() -> Self {
        Self {
            items: Vec::new(),
            case_sensitive: OnceCell::new(),
            case_insensitive: OnceCell::new(),
            read_only: false,
        }
    }
}

impl<T> MetadataCollection<T> {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            items: Vec::with_capacity(capacity),
            ..Self::default()
        }
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn is_read_only(&self) -> bool {
        self.read_only
    }

    pub fn as_slice(&self) -> &[T] {
        &self.items
    }

    pub fn iter(&self) -> std::slice::Iter<'_, T> {
        self.items.iter()
    }

    pub fn get(&self, index: usize) -> Option<&T> {
        self.items.get(index)
    }

    pub fn first(&self) -> Option<&T> {
        self.items.first()
    }

    pub fn last(&self) -> Option<&T> {
        self.items.last()
    }

    /// Reopens a frozen collection.
    ///
    /// Only design-time tooling that edits a model in place should call this.
    #[doc(hidden)]
    pub fn reset_read_only(&mut self) {
        self.read_only = false;
    }

    fn ensure_mutable(&self, operation: &'static str) -> Result<(), MetadataError> {
        if self.read_only {
            return Err(MetadataError::OperationOnReadOnlyCollection { operation });
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn has_case_sensitive_index(&self) -> bool {
        self.case_sensitive.get().is_some()
    }

    #[cfg(test)]
    pub(crate) fn has_case_insensitive_index(&self) -> bool {
        self.case_insensitive.get().is_some()
    }
}

impl<T: MetadataItem> MetadataCollection<T> {
    /// Build a collection from items, failing on the first duplicate identity.
    pub fn try_from_items(items: impl IntoIterator<Item = T>) -> Result<Self, MetadataError> {
        let iter = items.into_iter();
        let mut collection = Self::with_capacity(iter.size_hint().0);
        for item in iter {
            collection.add(item)?;
        }
        Ok(collection)
    }

    /// Append an item.
    ///
    /// Fails when the collection is frozen, when the identity is empty, or when
    /// an item with the same (case-sensitive) identity is already present.
    pub fn add(&mut self, item: T) -> Result<(), MetadataError> {
        self.ensure_mutable("add")?;
        let identity = item.identity();
        if identity.is_empty() {
            return Err(MetadataError::EmptyIdentity);
        }
        if self.contains(identity) {
            return Err(MetadataError::DuplicateIdentity {
                identity: identity.to_string(),
            });
        }
        let identity = identity.to_string();
        let index = self.items.len();
        self.items.push(item);
        if let Some(map) = self.case_sensitive.get_mut() {
            map.insert(identity, index);
        }
        self.case_insensitive = OnceCell::new();
        Ok(())
    }

    /// Append every item; stops at the first failure.
    pub fn add_range(&mut self, items: impl IntoIterator<Item = T>) -> Result<(), MetadataError> {
        for item in items {
            self.add(item)?;
        }
        Ok(())
    }

    /// Replace the item at `index`, keeping the identity indexes consistent.
    pub fn set(&mut self, index: usize, item: T) -> Result<(), MetadataError> {
        self.ensure_mutable("set")?;
        if item.identity().is_empty() {
            return Err(MetadataError::EmptyIdentity);
        }
        let slot = self.items.get_mut(index).ok_or_else(|| {
            MetadataError::internal(format!("collection index {} is out of range", index))
        })?;
        let old_identity = slot.identity().to_string();
        *slot = item;
        self.handle_identity_change(index, &old_identity);
        Ok(())
    }

    /// Mutable access to an item of a mutable collection.
    ///
    /// Callers that change the item's identity must follow up with
    /// [`MetadataCollection::handle_identity_change`].
    pub fn get_mut(&mut self, index: usize) -> Result<Option<&mut T>, MetadataError> {
        self.ensure_mutable("get_mut")?;
        Ok(self.items.get_mut(index))
    }

    /// Mutable access by case-sensitive identity.
    pub fn get_value_mut(&mut self, identity: &str) -> Result<Option<&mut T>, MetadataError> {
        self.ensure_mutable("get_value_mut")?;
        match self.index_of(identity) {
            Some(index) => Ok(self.items.get_mut(index)),
            None => Ok(None),
        }
    }

    /// Re-key the item at `index` after its identity changed from `old_identity`.
    ///
    /// If the new identity collides with another entry the case-sensitive
    /// dictionary is dropped and rebuilt from the list on the next lookup.
    pub fn handle_identity_change(&mut self, index: usize, old_identity: &str) {
        let Some(item) = self.items.get(index) else {
            return;
        };
        let new_identity = item.identity().to_string();
        if let Some(map) = self.case_sensitive.get_mut() {
            if map.get(old_identity) == Some(&index) {
                map.remove(old_identity);
            }
            if map.contains_key(&new_identity) {
                self.case_sensitive = OnceCell::new();
            } else {
                map.insert(new_identity, index);
            }
        }
        self.case_insensitive = OnceCell::new();
    }

    /// Freeze every item and the collection itself.
    pub fn set_read_only(&mut self) {
        for item in self.items.iter_mut() {
            item.set_read_only();
        }
        self.read_only = true;
        self.items.shrink_to_fit();
        if self.items.len() <= USE_DICTIONARY_CROSSOVER {
            self.case_sensitive = OnceCell::new();
            self.case_insensitive = OnceCell::new();
        }
    }

    pub fn contains(&self, identity: &str) -> bool {
        self.index_of(identity).is_some()
    }

    /// Position of the item with exactly this identity.
    pub fn index_of(&self, identity: &str) -> Option<usize> {
        if self.items.len() > USE_DICTIONARY_CROSSOVER {
            self.case_sensitive_map().get(identity).copied()
        } else {
            self.items.iter().position(|item| item.identity() == identity)
        }
    }

    /// Position of the single item matching `identity` ignoring case.
    ///
    /// Several matches are an error when `throw_on_multiple` is set and
    /// otherwise report no match.
    pub fn find_case_insensitive(
        &self,
        identity: &str,
        throw_on_multiple: bool,
    ) -> Result<Option<usize>, MetadataError> {
        let slot = if self.items.len() > USE_DICTIONARY_CROSSOVER {
            self.case_insensitive_map().get(&fold_case(identity)).copied()
        } else {
            let mut found = None;
            for (index, item) in self.items.iter().enumerate() {
                if eq_ci(item.identity(), identity) {
                    if found.is_some() {
                        found = Some(FoldedSlot::Ambiguous);
                        break;
                    }
                    found = Some(FoldedSlot::Index(index));
                }
            }
            found
        };

        match slot {
            Some(FoldedSlot::Index(index)) => Ok(Some(index)),
            Some(FoldedSlot::Ambiguous) if throw_on_multiple => {
                Err(MetadataError::AmbiguousIdentity {
                    identity: identity.to_string(),
                })
            }
            Some(FoldedSlot::Ambiguous) | None => Ok(None),
        }
    }

    /// Lenient lookup: absent or ambiguous identities yield `None`.
    pub fn try_get_value(&self, identity: &str, ignore_case: bool) -> Option<&T> {
        let index = if ignore_case {
            self.find_case_insensitive(identity, false).ok().flatten()
        } else {
            self.index_of(identity)
        };
        index.and_then(|i| self.items.get(i))
    }

    /// Strict lookup: absent identities are `ItemNotFound`, ambiguous ones
    /// `AmbiguousIdentity`.
    pub fn get_value(&self, identity: &str, ignore_case: bool) -> Result<&T, MetadataError> {
        let index = if ignore_case {
            self.find_case_insensitive(identity, true)?
        } else {
            self.index_of(identity)
        };
        index
            .and_then(|i| self.items.get(i))
            .ok_or_else(|| MetadataError::ItemNotFound {
                identity: identity.to_string(),
                space: "member".to_string(),
            })
    }

    fn case_sensitive_map(&self) -> &HashMap<String, usize> {
        self.case_sensitive.get_or_init(|| {
            let mut map = HashMap::with_capacity(self.items.len());
            for (index, item) in self.items.iter().enumerate() {
                map.entry(item.identity().to_string()).or_insert(index);
            }
            map
        })
    }

    fn case_insensitive_map(&self) -> &HashMap<String, FoldedSlot> {
        self.case_insensitive.get_or_init(|| {
            let mut map: HashMap<String, FoldedSlot> = HashMap::with_capacity(self.items.len());
            for (index, item) in self.items.iter().enumerate() {
                map.entry(fold_case(item.identity()))
                    .and_modify(|slot| *slot = FoldedSlot::Ambiguous)
                    .or_insert(FoldedSlot::Index(index));
            }
            map
        })
    }
}

impl<T> Index<usize> for MetadataCollection<T> {
    type Output = T;

    fn index(&self, index: usize) -> &T {
        &self.items[index]
    }
}

impl<'a, T> IntoIterator for &'a MetadataCollection<T> {
    type Item = &'a T;
    type IntoIter = std::slice::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.items.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::item::{MetadataProperty, PropertyValue};

    fn prop(name: &str) -> MetadataProperty {
        MetadataProperty::system(name, PropertyValue::Integer(0))
    }

    fn filled(count: usize) -> MetadataCollection<MetadataProperty> {
        let mut collection = MetadataCollection::new();
        for i in 0..count {
            collection.add(prop(&format!("Item{}", i))).unwrap();
        }
        collection
    }

    #[test]
    fn test_dictionary_only_above_crossover() {
        let small = filled(USE_DICTIONARY_CROSSOVER);
        assert!(small.contains("Item3"));
        assert!(!small.has_case_sensitive_index());

        let large = filled(USE_DICTIONARY_CROSSOVER + 1);
        assert!(large.contains("Item3"));
        assert!(large.has_case_sensitive_index());
    }

    #[test]
    fn test_add_keeps_built_dictionary_current() {
        let mut collection = filled(USE_DICTIONARY_CROSSOVER + 1);
        assert!(collection.contains("Item0"));
        collection.add(prop("Late")).unwrap();
        assert_eq!(collection.index_of("Late"), Some(USE_DICTIONARY_CROSSOVER + 1));
    }

    #[test]
    fn test_add_invalidates_case_insensitive_index() {
        let mut collection = filled(USE_DICTIONARY_CROSSOVER + 1);
        assert!(collection.try_get_value("ITEM1", true).is_some());
        assert!(collection.has_case_insensitive_index());
        collection.add(prop("item1")).unwrap();
        assert!(!collection.has_case_insensitive_index());
        assert!(collection.try_get_value("ITEM1", true).is_none());
    }

    #[test]
    fn test_freeze_drops_dictionaries_for_small_collections() {
        let mut collection = filled(4);
        collection.set_read_only();
        assert!(!collection.has_case_sensitive_index());
        assert!(collection.iter().all(|p| p.is_read_only()));
    }

    #[test]
    fn test_set_handles_identity_collision() {
        let mut collection = filled(USE_DICTIONARY_CROSSOVER + 2);
        assert!(collection.contains("Item0"));
        collection.set(0, prop("Item5")).unwrap();
        assert!(!collection.has_case_sensitive_index());
        assert!(!collection.contains("Item0"));
        assert_eq!(collection.index_of("Item5"), Some(0));
    }

    #[test]
    fn test_duplicate_add_leaves_collection_unchanged() {
        let mut collection = filled(3);
        let err = collection.add(prop("Item1")).unwrap_err();
        assert!(matches!(err, MetadataError::DuplicateIdentity { .. }));
        assert_eq!(collection.len(), 3);
        assert_eq!(collection.index_of("Item2"), Some(2));
    }

    #[test]
    fn test_frozen_collection_rejects_add() {
        let mut collection = filled(2);
        collection.set_read_only();
        let err = collection.add(prop("Late")).unwrap_err();
        assert!(matches!(err, MetadataError::OperationOnReadOnlyCollection { .. }));
        assert_eq!(collection.len(), 2);
    }

    #[test]
    fn test_lookup_agrees_on_both_sides_of_crossover() {
        for count in [USE_DICTIONARY_CROSSOVER, USE_DICTIONARY_CROSSOVER + 1] {
            let collection = filled(count);
            for i in 0..count {
                let identity = format!("Item{}", i);
                assert_eq!(collection.index_of(&identity), Some(i));
                assert_eq!(
                    collection.find_case_insensitive(&identity.to_uppercase(), true).unwrap(),
                    Some(i)
                );
            }
            assert_eq!(collection.index_of("item0"), None);
            assert_eq!(collection.find_case_insensitive("Missing", true).unwrap(), None);
        }
    }

    #[test]
    fn test_case_insensitive_ambiguity_is_never_resolved_arbitrarily() {
        for count in [2, USE_DICTIONARY_CROSSOVER + 1] {
            let mut collection = filled(count);
            collection.add(prop("ITEM1")).unwrap();

            let err = collection.find_case_insensitive("item1", true).unwrap_err();
            assert!(matches!(err, MetadataError::AmbiguousIdentity { .. }));
            assert_eq!(collection.find_case_insensitive("item1", false).unwrap(), None);
            assert!(collection.try_get_value("item1", true).is_none());
            assert!(collection.get_value("item1", true).is_err());

            // Exact lookups still see both
            assert_eq!(collection.index_of("Item1"), Some(1));
            assert_eq!(collection.index_of("ITEM1"), Some(count));
        }
    }

    #[test]
    fn test_final_sigma_matches_on_both_sides_of_crossover() {
        for count in [USE_DICTIONARY_CROSSOVER, USE_DICTIONARY_CROSSOVER + 1] {
            let mut collection = filled(count - 1);
            collection.add(prop("ΟΔΟΣ")).unwrap();
            assert_eq!(collection.len(), count);

            let found = collection.try_get_value("οδοσ", true);
            assert_eq!(found.map(|p| p.identity()), Some("ΟΔΟΣ"), "lookup among {} items", count);
        }
    }

    #[test]
    fn test_set_rekeys_renamed_item() {
        let mut collection = filled(USE_DICTIONARY_CROSSOVER + 2);
        assert!(collection.contains("Item0"));
        collection.set(0, prop("Renamed")).unwrap();
        assert!(collection.has_case_sensitive_index());
        assert_eq!(collection.index_of("Renamed"), Some(0));
        assert_eq!(collection.index_of("Item0"), None);
    }
}
