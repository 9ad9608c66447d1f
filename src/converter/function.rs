//! Functions and function imports.

use std::sync::Arc;

use super::{apply_other_content, unresolved, Converter, StagingLookup};
use crate::error::MetadataError;
use crate::metadata::{
    DataSpace, EdmFunction, EdmTypeRef, FunctionAttributes, FunctionParameter, FunctionPayload,
    ParameterMode, TypeLookup, TypeUsage,
};
use crate::provider::resolve_max_length_sentinel;
use crate::som::{
    parse_parameter_mode, ElementKey, FacetElements, FunctionElement, FunctionImportElement,
    ParameterElement, SchemaTypeRef,
};

use super::facets::explicit_facets;

/// Name given to a function's return parameter.
pub const RETURN_PARAMETER_NAME: &str = "ReturnType";

impl<'a, L: TypeLookup + ?Sized> Converter<'a, L> {
    /// True when every schema type a function mentions is already staged.
    pub(super) fn function_dependencies_staged(&self, key: ElementKey) -> bool {
        let Some(function) = self.schemas.function(key) else {
            return true;
        };
        let written = function
            .return_type
            .iter()
            .chain(function.parameters.iter().map(|p| &p.type_name));
        for type_name in written {
            let Some(reference) = self.schemas.resolve_type(key.document, type_name) else {
                // Left for conversion to report.
                return true;
            };
            if let Some(element) = element_of(&reference) {
                if !self.staging.contains(element) {
                    return false;
                }
            }
        }
        true
    }

    pub(super) fn convert_function(
        &mut self,
        key: ElementKey,
        element: &FunctionElement,
    ) -> Result<EdmFunction, MetadataError> {
        let namespace = self.namespace_of(key)?;
        let mut return_parameters = Vec::new();
        if let Some(return_type) = &element.return_type {
            let usage = self.function_type_usage(key.document, return_type, &element.return_facets)?;
            // Model functions hand out the same return usage on every lookup.
            let usage = if self.data_space == DataSpace::CSpace {
                self.cache.function_return_usage(key, |_| usage)
            } else {
                usage
            };
            return_parameters.push(FunctionParameter::new(
                RETURN_PARAMETER_NAME,
                usage,
                ParameterMode::ReturnValue,
            ));
        }
        let parameters = self.convert_parameters(key.document, &element.parameters)?;

        let mut attributes = FunctionAttributes::empty();
        attributes.set(FunctionAttributes::AGGREGATE, element.aggregate);
        attributes.set(FunctionAttributes::BUILT_IN, element.built_in);
        attributes.set(FunctionAttributes::NILADIC, element.niladic);
        attributes.set(FunctionAttributes::IS_COMPOSABLE, element.is_composable);

        let mut function = EdmFunction::new(
            &element.name,
            namespace,
            self.data_space,
            FunctionPayload {
                return_parameters,
                parameters,
                entity_sets: Vec::new(),
                attributes,
                command_text: element.command_text.clone(),
                store_function_name: element.store_function_name.clone(),
                schema: element.schema.clone(),
            },
        )?;
        apply_other_content(
            &mut function,
            element.documentation.as_ref(),
            &element.annotations,
        )?;
        Ok(function)
    }

    /// Function import declared in a container; its namespace is the
    /// container name.
    pub(super) fn convert_function_import(
        &mut self,
        document: usize,
        container_name: &str,
        element: &FunctionImportElement,
    ) -> Result<EdmFunction, MetadataError> {
        let mut return_parameters = Vec::new();
        let mut entity_sets = Vec::new();
        if let Some(return_type) = &element.return_type {
            let usage = self.function_type_usage(document, return_type, &FacetElements::default())?;
            return_parameters.push(FunctionParameter::new(
                RETURN_PARAMETER_NAME,
                usage,
                ParameterMode::ReturnValue,
            ));
            if let Some(entity_set) = &element.entity_set {
                entity_sets.push(entity_set.clone());
            }
        }
        let parameters = self.convert_parameters(document, &element.parameters)?;

        let mut attributes = FunctionAttributes::IS_FUNCTION_IMPORT;
        attributes.set(FunctionAttributes::IS_COMPOSABLE, element.is_composable);

        EdmFunction::new(
            &element.name,
            container_name,
            self.data_space,
            FunctionPayload {
                return_parameters,
                parameters,
                entity_sets,
                attributes,
                ..FunctionPayload::default()
            },
        )
    }

    fn convert_parameters(
        &mut self,
        document: usize,
        parameters: &[ParameterElement],
    ) -> Result<Vec<FunctionParameter>, MetadataError> {
        let mut converted = Vec::with_capacity(parameters.len());
        for parameter in parameters {
            let mode = parse_parameter_mode(parameter.mode.as_deref()).ok_or_else(|| {
                MetadataError::internal(format!(
                    "parameter '{}' has unexpected mode '{}'",
                    parameter.name,
                    parameter.mode.as_deref().unwrap_or_default()
                ))
            })?;
            let usage = self.function_type_usage(document, &parameter.type_name, &parameter.facets)?;
            converted.push(FunctionParameter::new(&parameter.name, usage, mode));
        }
        Ok(converted)
    }

    /// Usage for a parameter or return type.
    ///
    /// Primitive types with facets written on the node get their own usage;
    /// everything else comes from the shared null-facet caches. Referenced
    /// schema types are converted first if they are not staged yet.
    fn function_type_usage(
        &mut self,
        document: usize,
        type_name: &str,
        facets: &FacetElements,
    ) -> Result<Arc<TypeUsage>, MetadataError> {
        let reference = self
            .schemas
            .resolve_type(document, type_name)
            .ok_or_else(|| unresolved(type_name))?;
        if let Some(element) = element_of(&reference) {
            self.load_element(element)?;
        }

        match &reference {
            SchemaTypeRef::Collection(inner) => {
                let element = self.property_edm_type(inner)?;
                let lookup = StagingLookup {
                    staging: &self.staging,
                    registered: self.registered,
                };
                Ok(self.cache.collection_type_usage(element, &lookup))
            }
            SchemaTypeRef::Primitive(primitive) if !facets.is_empty() => {
                let usage = TypeUsage::create_with(
                    EdmTypeRef::Primitive(Arc::clone(primitive)),
                    &explicit_facets(facets),
                );
                Ok(if self.data_space == DataSpace::SSpace {
                    resolve_max_length_sentinel(&usage)
                } else {
                    usage
                })
            }
            other => {
                let edm_type = self.property_edm_type(other)?;
                Ok(self.cache.type_usage(edm_type))
            }
        }
    }
}

/// Schema element a type reference ends in, looking through collections.
fn element_of(reference: &SchemaTypeRef) -> Option<ElementKey> {
    match reference {
        SchemaTypeRef::Collection(inner) => element_of(inner),
        other => other.as_element(),
    }
}
