//! Item collections: the frozen items of each data space.
//!
//! Every collection wraps an [`ItemCollection`]; the space-specific types add
//! loading (from schema documents, provider manifests or assemblies) and the
//! lookups that only make sense in their space.

mod assembly;
mod collection;
mod edm;
mod mapping;
mod object;
mod store;

pub use collection::ItemCollection;
pub use edm::EdmItemCollection;
pub use mapping::{
    DefaultObjectMappingItemCollection, EntityContainerMapping, MemberMappingKind, ObjectMemberMapping,
    ObjectTypeMapping, SetMapping, StorageMappingItemCollection,
};
pub use assembly::{
    AssemblyCatalog, AssemblyResolver, ClrAssembly, ClrEnumMember, ClrNavigation, ClrProperty,
    ClrTypeDescriptor, ClrTypeHandle, ClrTypeKind,
};
pub use object::ObjectItemCollection;
pub use store::StoreItemCollection;

use std::collections::HashSet;
use std::sync::Arc;

use tracing::{debug, warn};

use crate::converter::{convert_schema, ConversionTarget};
use crate::error::{only_warnings, EdmSchemaError, ErrorCode, MetadataError};
use crate::metadata::{build_identity, DataSpace, GlobalItem, MetadataItem, TypeUsage};
use crate::provider::{model_type_usage, ProviderManifest};
use crate::som::{self, SchemaDocument, SchemaSet};

/// Items produced by one load, with every error recorded along the way.
#[derive(Debug, Default)]
pub(crate) struct LoadedItems {
    pub items: Vec<GlobalItem>,
    pub errors: Vec<EdmSchemaError>,
}

/// Parse, validate and convert schema documents for `target`.
///
/// Conversion only runs when validation recorded nothing worse than
/// warnings. Store functions whose conceptual signature repeats one already
/// loaded are dropped with a recorded error; the first one wins.
pub(crate) fn load_schema_items<T: ConversionTarget>(
    target: &mut T,
    documents: Vec<SchemaDocument>,
    manifest: Arc<dyn ProviderManifest>,
) -> Result<LoadedItems, MetadataError> {
    if documents.is_empty() {
        return Ok(LoadedItems::default());
    }
    let schemas = SchemaSet::new(documents, Arc::clone(&manifest));
    let mut errors = som::validate(&schemas);
    if !only_warnings(&errors) {
        debug!(
            space = %target.data_space(),
            errors = errors.len(),
            "schema validation failed, skipping conversion"
        );
        return Ok(LoadedItems {
            items: Vec::new(),
            errors,
        });
    }

    let converted = convert_schema(&schemas, target)?;
    let items = if target.data_space() == DataSpace::SSpace {
        drop_duplicate_store_overloads(converted, manifest.as_ref(), &mut errors)?
    } else {
        converted
    };
    debug!(
        space = %target.data_space(),
        items = items.len(),
        errors = errors.len(),
        "converted schema documents"
    );
    Ok(LoadedItems { items, errors })
}

/// Drop store functions that project onto an already seen conceptual
/// signature.
fn drop_duplicate_store_overloads(
    items: Vec<GlobalItem>,
    manifest: &dyn ProviderManifest,
    errors: &mut Vec<EdmSchemaError>,
) -> Result<Vec<GlobalItem>, MetadataError> {
    let mut seen = HashSet::new();
    let mut kept = Vec::with_capacity(items.len());
    for item in items {
        if let GlobalItem::Function(function) = &item {
            let mut parameters: Vec<(_, Arc<TypeUsage>)> =
                Vec::with_capacity(function.parameters().len());
            for parameter in function.parameters() {
                parameters.push((
                    parameter.mode(),
                    model_type_usage(manifest, parameter.type_usage())?,
                ));
            }
            let c_identity = build_identity(
                &function.full_name(),
                parameters
                    .iter()
                    .map(|(mode, usage)| (*mode, usage.edm_type().identity())),
            );
            if !seen.insert(c_identity.clone()) {
                warn!(
                    function = function.identity(),
                    conceptual = %c_identity,
                    "dropping store function with a duplicate conceptual signature"
                );
                errors.push(EdmSchemaError::error(
                    format!(
                        "The function '{}' has an overload that maps to the same conceptual signature '{}'",
                        function.full_name(),
                        c_identity
                    ),
                    ErrorCode::DuplicatedFunctionOverloads,
                ));
                continue;
            }
        }
        kept.push(item);
    }
    Ok(kept)
}

/// Fail with every recorded error once anything worse than a warning was
/// seen and the caller asked for it.
pub(crate) fn raise_on_errors(
    errors: &[EdmSchemaError],
    throw_on_error: bool,
) -> Result<(), MetadataError> {
    if throw_on_error && !only_warnings(errors) {
        return Err(MetadataError::Schema {
            errors: errors.to_vec(),
        });
    }
    Ok(())
}
