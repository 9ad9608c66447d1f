//! The canonical (Edm) provider manifest.

use std::collections::HashMap;
use std::sync::Arc;

use super::descriptions;
use super::ProviderManifest;
use crate::error::MetadataError;
use crate::metadata::facet::{FacetDescription, FacetValue};
use crate::metadata::{
    DataSpace, EdmFunction, EdmType, EdmTypeRef, FunctionAttributes, FunctionParameter, FunctionPayload,
    MetadataItem, ParameterMode, PrimitiveType, PrimitiveTypeKind, TypeUsage,
};

pub const EDM_NAMESPACE: &str = "Edm";

/// Highest precision accepted for Decimal and the date/time kinds.
const MAXIMUM_PRECISION: i32 = u8::MAX as i32;

const DEFAULT_GEOGRAPHY_SRID: i32 = 4326;
const DEFAULT_GEOMETRY_SRID: i32 = 0;

/// Registry of the canonical primitive types and functions.
///
/// Built once by the caller and shared (usually as `Arc<EdmProviderManifest>`)
/// between every item collection of a workspace.
#[derive(Debug)]
pub struct EdmProviderManifest {
    types: Vec<Arc<PrimitiveType>>,
    by_kind: HashMap<PrimitiveTypeKind, Arc<PrimitiveType>>,
    functions: Vec<Arc<EdmFunction>>,
}

impl EdmProviderManifest {
    pub fn new() -> Result<Self, MetadataError> {
        let types: Vec<Arc<PrimitiveType>> = PrimitiveTypeKind::ALL
            .iter()
            .map(|kind| {
                Arc::new(PrimitiveType::new(
                    kind.name(),
                    EDM_NAMESPACE,
                    DataSpace::CSpace,
                    *kind,
                    canonical_facets(*kind),
                ))
            })
            .collect();
        let by_kind = types.iter().map(|t| (t.kind(), Arc::clone(t))).collect();
        let mut manifest = Self {
            types,
            by_kind,
            functions: Vec::new(),
        };
        manifest.functions = manifest.canonical_functions()?;
        Ok(manifest)
    }

    /// Canonical primitive type of the given kind.
    pub fn primitive_type(&self, kind: PrimitiveTypeKind) -> Result<Arc<PrimitiveType>, MetadataError> {
        self.by_kind.get(&kind).cloned().ok_or_else(|| {
            MetadataError::internal(format!("no canonical primitive type for {}", kind))
        })
    }

    /// Canonical types available to a model of the given schema version.
    ///
    /// Spatial types appeared in version 3.0.
    pub fn primitive_types_for_version(&self, version: f64) -> Vec<Arc<PrimitiveType>> {
        self.types
            .iter()
            .filter(|t| version >= 3.0 || !t.kind().is_spatial())
            .cloned()
            .collect()
    }

    fn usage(&self, kind: PrimitiveTypeKind) -> Result<Arc<TypeUsage>, MetadataError> {
        Ok(TypeUsage::create(EdmTypeRef::Primitive(self.primitive_type(kind)?)))
    }

    fn collection_usage(&self, kind: PrimitiveTypeKind) -> Result<Arc<TypeUsage>, MetadataError> {
        let element = self.primitive_type(kind)?;
        Ok(TypeUsage::create(EdmTypeRef::Collection(element.collection_type())))
    }

    fn canonical_functions(&self) -> Result<Vec<Arc<EdmFunction>>, MetadataError> {
        use PrimitiveTypeKind::{DateTime, Decimal, Double, Int32, String as Text};

        let scalar = FunctionAttributes::BUILT_IN
            | FunctionAttributes::IS_FROM_PROVIDER_MANIFEST
            | FunctionAttributes::IS_COMPOSABLE;
        let aggregate = scalar | FunctionAttributes::AGGREGATE;
        let niladic = scalar | FunctionAttributes::NILADIC;

        let mut specs: Vec<(&str, Vec<Arc<TypeUsage>>, Arc<TypeUsage>, FunctionAttributes)> = vec![
            ("Length", vec![self.usage(Text)?], self.usage(Int32)?, scalar),
            ("Trim", vec![self.usage(Text)?], self.usage(Text)?, scalar),
            (
                "Concat",
                vec![self.usage(Text)?, self.usage(Text)?],
                self.usage(Text)?,
                scalar,
            ),
            ("CurrentDateTime", vec![], self.usage(DateTime)?, niladic),
        ];
        for kind in [Int32, Decimal, Double] {
            specs.push(("Abs", vec![self.usage(kind)?], self.usage(kind)?, scalar));
        }
        for kind in [Int32, Decimal] {
            specs.push(("Count", vec![self.collection_usage(kind)?], self.usage(Int32)?, aggregate));
            specs.push(("Max", vec![self.collection_usage(kind)?], self.usage(kind)?, aggregate));
            specs.push(("Min", vec![self.collection_usage(kind)?], self.usage(kind)?, aggregate));
            specs.push(("Sum", vec![self.collection_usage(kind)?], self.usage(kind)?, aggregate));
        }

        let mut functions = Vec::with_capacity(specs.len());
        for (name, parameters, returns, attributes) in specs {
            let parameters = parameters
                .into_iter()
                .enumerate()
                .map(|(index, usage)| {
                    FunctionParameter::new(format!("arg{}", index + 1), usage, ParameterMode::In)
                })
                .collect();
            let mut function = EdmFunction::new(
                name,
                EDM_NAMESPACE,
                DataSpace::CSpace,
                FunctionPayload {
                    return_parameters: vec![FunctionParameter::new(
                        "ReturnType",
                        returns,
                        ParameterMode::ReturnValue,
                    )],
                    parameters,
                    attributes,
                    ..FunctionPayload::default()
                },
            )?;
            function.set_read_only();
            functions.push(Arc::new(function));
        }
        Ok(functions)
    }
}

impl ProviderManifest for EdmProviderManifest {
    fn namespace_name(&self) -> &str {
        EDM_NAMESPACE
    }

    fn data_space(&self) -> DataSpace {
        DataSpace::CSpace
    }

    fn manifest_token(&self) -> &str {
        "3.0"
    }

    fn store_types(&self) -> &[Arc<PrimitiveType>] {
        &self.types
    }

    fn store_functions(&self) -> &[Arc<EdmFunction>] {
        &self.functions
    }

    fn edm_type_usage(&self, store_usage: &TypeUsage) -> Result<Arc<TypeUsage>, MetadataError> {
        match store_usage.edm_type() {
            EdmTypeRef::Primitive(primitive) if primitive.data_space() == DataSpace::CSpace => {
                Ok(super::project_facets(store_usage, primitive))
            }
            other => Err(MetadataError::InvalidDataSpace {
                operation: "EdmProviderManifest::edm_type_usage",
                identity: other.identity().to_string(),
                expected: DataSpace::CSpace,
                actual: other.data_space(),
            }),
        }
    }
}

fn canonical_facets(kind: PrimitiveTypeKind) -> Vec<Arc<FacetDescription>> {
    use descriptions::*;

    match kind {
        PrimitiveTypeKind::String => vec![
            max_length(0, i32::MAX, FacetValue::Null),
            unicode(FacetValue::Null),
            fixed_length(FacetValue::Null),
        ],
        PrimitiveTypeKind::Binary => vec![
            max_length(0, i32::MAX, FacetValue::Null),
            fixed_length(FacetValue::Null),
        ],
        PrimitiveTypeKind::Decimal => vec![
            precision(1, MAXIMUM_PRECISION, FacetValue::Null),
            scale(0, MAXIMUM_PRECISION, FacetValue::Null),
        ],
        PrimitiveTypeKind::DateTime | PrimitiveTypeKind::Time | PrimitiveTypeKind::DateTimeOffset => {
            vec![precision(0, MAXIMUM_PRECISION, FacetValue::Null)]
        }
        kind if kind.is_geography() => vec![srid(DEFAULT_GEOGRAPHY_SRID), is_strict()],
        kind if kind.is_geometry() => vec![srid(DEFAULT_GEOMETRY_SRID), is_strict()],
        _ => Vec::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::facet::{MAX_LENGTH, SRID};

    #[test]
    fn test_every_kind_registered() {
        let manifest = EdmProviderManifest::new().unwrap();
        assert_eq!(manifest.store_types().len(), PrimitiveTypeKind::ALL.len());
        let string = manifest.primitive_type(PrimitiveTypeKind::String).unwrap();
        assert_eq!(string.identity(), "Edm.String");
        assert!(string.facet_description(MAX_LENGTH).is_some());
        let point = manifest.primitive_type(PrimitiveTypeKind::GeographyPoint).unwrap();
        assert_eq!(
            point.facet_description(SRID).unwrap().default_value(),
            &FacetValue::Int(4326)
        );
    }

    #[test]
    fn test_spatial_types_hidden_before_version_three() {
        let manifest = EdmProviderManifest::new().unwrap();
        assert!(manifest
            .primitive_types_for_version(2.0)
            .iter()
            .all(|t| !t.kind().is_spatial()));
        assert_eq!(
            manifest.primitive_types_for_version(3.0).len(),
            PrimitiveTypeKind::ALL.len()
        );
    }

    #[test]
    fn test_canonical_functions() {
        let manifest = EdmProviderManifest::new().unwrap();
        let identities: Vec<&str> = manifest.store_functions().iter().map(|f| f.identity()).collect();
        assert!(identities.contains(&"Edm.Length(in Edm.String)"));
        assert!(identities.contains(&"Edm.CurrentDateTime()"));
        let count = manifest
            .store_functions()
            .iter()
            .find(|f| f.name() == "Count")
            .unwrap();
        assert!(count.is_aggregate());
        assert!(count.is_from_provider_manifest());
        assert!(count.is_read_only());
    }
}
