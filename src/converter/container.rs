//! Entity containers: entity sets, association sets and function imports.

use super::{apply_other_content, not_staged, unresolved, Converter, StagedItem};
use crate::error::MetadataError;
use crate::metadata::{
    ancestors, AssociationSet, AssociationSetEnd, EntityContainer, EntitySet, EntitySetBase,
    TypeLookup, TypeName,
};
use crate::som::{AssociationSetElement, ElementKey, EntityContainerElement};

impl<'a, L: TypeLookup + ?Sized> Converter<'a, L> {
    pub(super) fn convert_container(
        &mut self,
        key: ElementKey,
        element: &EntityContainerElement,
    ) -> Result<EntityContainer, MetadataError> {
        let mut container = EntityContainer::new(&element.name, self.data_space);

        let mut entity_sets: Vec<(String, TypeName)> = Vec::with_capacity(element.entity_sets.len());
        for set in &element.entity_sets {
            let type_key = self.resolve_element(key.document, &set.entity_type)?;
            self.load_element(type_key)?;
            let type_name = self.declared_type_name(type_key)?;
            entity_sets.push((set.name.clone(), type_name.clone()));
            container.add_entity_set_base(EntitySetBase::EntitySet(
                EntitySet::new(&set.name, type_name)
                    .with_store_location(set.schema.clone(), set.table.clone())
                    .with_defining_query(set.defining_query.clone()),
            ))?;
        }

        for set in &element.association_sets {
            let association_set = self.convert_association_set(key, set, &entity_sets)?;
            container.add_entity_set_base(EntitySetBase::AssociationSet(association_set))?;
        }

        for import in &element.function_imports {
            let function = self.convert_function_import(key.document, &element.name, import)?;
            container.add_function_import(function)?;
        }

        apply_other_content(
            &mut container,
            element.documentation.as_ref(),
            &element.annotations,
        )?;
        Ok(container)
    }

    /// Association set with one end per association end, in the
    /// association's order. Ends the schema leaves out are bound to the one
    /// entity set of the container able to hold the end's type.
    fn convert_association_set(
        &mut self,
        container_key: ElementKey,
        element: &AssociationSetElement,
        entity_sets: &[(String, TypeName)],
    ) -> Result<AssociationSet, MetadataError> {
        let association_key = self.resolve_element(container_key.document, &element.association)?;
        self.load_element(association_key)?;
        let association_name = self.declared_type_name(association_key)?;

        let ends: Vec<(String, Option<TypeName>)> = match self.staging.items.get(&association_key) {
            Some(StagedItem::Association(association)) => association
                .ends()
                .map(|end| (end.name().to_string(), end.entity_type().cloned()))
                .collect(),
            _ => return Err(not_staged(association_key, "association")),
        };

        let mut association_set = AssociationSet::new(&element.name, association_name);
        for (role, end_type) in ends {
            let listed = element.ends.iter().find(|end| end.role == role);
            let entity_set = match (listed, end_type) {
                (Some(listed), _) => listed.entity_set.clone(),
                (None, Some(end_type)) => self.infer_end_set(&end_type, entity_sets).ok_or_else(|| {
                    unresolved(&format!("{}.{}", element.name, role))
                })?,
                (None, None) => return Err(unresolved(&format!("{}.{}", element.name, role))),
            };
            association_set.add_end(AssociationSetEnd::new(role, entity_set))?;
        }
        Ok(association_set)
    }

    fn infer_end_set(&self, end_type: &TypeName, entity_sets: &[(String, TypeName)]) -> Option<String> {
        let lookup = self.lookup();
        let chain = ancestors(Some(end_type), &lookup);
        let mut candidates = entity_sets.iter().filter(|(_, set_type)| {
            chain
                .iter()
                .any(|ancestor| ancestor.identity() == set_type.identity())
        });
        let first = candidates.next()?;
        // Ambiguous when more than one set could hold the end.
        match candidates.next() {
            Some(_) => None,
            None => Some(first.0.clone()),
        }
    }
}
