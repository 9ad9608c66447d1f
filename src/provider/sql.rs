//! SQL Server flavored store provider manifest.

use std::sync::Arc;

use super::descriptions::*;
use super::{project_facets, EdmProviderManifest, ProviderManifest};
use crate::error::MetadataError;
use crate::metadata::facet::{FacetDescription, FacetValue, FIXED_LENGTH, PRECISION, SCALE, UNICODE};
use crate::metadata::{
    DataSpace, EdmFunction, EdmType, EdmTypeRef, FunctionAttributes, FunctionParameter,
    FunctionPayload, MetadataItem, ParameterMode, PrimitiveType, PrimitiveTypeKind, TypeUsage,
};

pub const SQL_SERVER_NAMESPACE: &str = "SqlServer";

const MAX_NON_UNICODE_LENGTH: i32 = 8000;
const MAX_UNICODE_LENGTH: i32 = 4000;
const MAX_DECIMAL_PRECISION: i32 = 38;
const MAX_FRACTIONAL_SECONDS: i32 = 7;

/// Store manifest for a SQL Server style database.
///
/// Each store type maps onto one canonical kind; [`ProviderManifest::edm_type_usage`]
/// projects store usages onto the canonical types of the shared
/// [`EdmProviderManifest`].
#[derive(Debug)]
pub struct SqlProviderManifest {
    token: String,
    edm: Arc<EdmProviderManifest>,
    types: Vec<Arc<PrimitiveType>>,
    functions: Vec<Arc<EdmFunction>>,
}

impl SqlProviderManifest {
    pub fn new(token: impl Into<String>, edm: Arc<EdmProviderManifest>) -> Result<Self, MetadataError> {
        let types: Vec<Arc<PrimitiveType>> = store_type_table()
            .into_iter()
            .map(|(name, kind, facets)| {
                Arc::new(PrimitiveType::new(
                    name,
                    SQL_SERVER_NAMESPACE,
                    DataSpace::SSpace,
                    kind,
                    facets,
                ))
            })
            .collect();
        let mut manifest = Self {
            token: token.into(),
            edm,
            types,
            functions: Vec::new(),
        };
        manifest.functions = manifest.store_function_table()?;
        Ok(manifest)
    }

    /// The canonical manifest this store projects onto.
    pub fn edm_manifest(&self) -> &Arc<EdmProviderManifest> {
        &self.edm
    }

    fn store_type(&self, name: &str) -> Result<Arc<PrimitiveType>, MetadataError> {
        self.find_primitive_type(name)
            .cloned()
            .ok_or_else(|| MetadataError::not_found(name, DataSpace::SSpace))
    }

    fn usage(&self, name: &str) -> Result<Arc<TypeUsage>, MetadataError> {
        Ok(TypeUsage::create(EdmTypeRef::Primitive(self.store_type(name)?)))
    }

    fn store_function_table(&self) -> Result<Vec<Arc<EdmFunction>>, MetadataError> {
        let scalar = FunctionAttributes::BUILT_IN
            | FunctionAttributes::IS_FROM_PROVIDER_MANIFEST
            | FunctionAttributes::IS_COMPOSABLE;

        let count_argument = {
            let int = self.store_type("int")?;
            TypeUsage::create(EdmTypeRef::Collection(int.collection_type()))
        };
        let specs: Vec<(&str, Vec<Arc<TypeUsage>>, Arc<TypeUsage>, FunctionAttributes)> = vec![
            ("LEN", vec![self.usage("nvarchar")?], self.usage("int")?, scalar),
            ("LEN", vec![self.usage("varchar")?], self.usage("int")?, scalar),
            ("ABS", vec![self.usage("int")?], self.usage("int")?, scalar),
            ("ABS", vec![self.usage("bigint")?], self.usage("bigint")?, scalar),
            ("ABS", vec![self.usage("decimal")?], self.usage("decimal")?, scalar),
            ("UPPER", vec![self.usage("nvarchar")?], self.usage("nvarchar")?, scalar),
            (
                "GETDATE",
                vec![],
                self.usage("datetime")?,
                scalar | FunctionAttributes::NILADIC,
            ),
            (
                "COUNT",
                vec![count_argument],
                self.usage("int")?,
                scalar | FunctionAttributes::AGGREGATE,
            ),
        ];

        let mut functions = Vec::with_capacity(specs.len());
        for (name, parameters, returns, attributes) in specs {
            let mut function = EdmFunction::new(
                name,
                SQL_SERVER_NAMESPACE,
                DataSpace::SSpace,
                FunctionPayload {
                    return_parameters: vec![FunctionParameter::new(
                        "ReturnType",
                        returns,
                        ParameterMode::ReturnValue,
                    )],
                    parameters: parameters
                        .into_iter()
                        .enumerate()
                        .map(|(i, usage)| {
                            FunctionParameter::new(format!("arg{}", i + 1), usage, ParameterMode::In)
                        })
                        .collect(),
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

impl ProviderManifest for SqlProviderManifest {
    fn namespace_name(&self) -> &str {
        SQL_SERVER_NAMESPACE
    }

    fn data_space(&self) -> DataSpace {
        DataSpace::SSpace
    }

    fn manifest_token(&self) -> &str {
        &self.token
    }

    fn store_types(&self) -> &[Arc<PrimitiveType>] {
        &self.types
    }

    fn store_functions(&self) -> &[Arc<EdmFunction>] {
        &self.functions
    }

    /// Store types match case-insensitively, the way the server treats them.
    fn find_primitive_type(&self, name: &str) -> Option<&Arc<PrimitiveType>> {
        self.types
            .iter()
            .find(|t| t.name().eq_ignore_ascii_case(name))
    }

    fn edm_type_usage(&self, store_usage: &TypeUsage) -> Result<Arc<TypeUsage>, MetadataError> {
        match store_usage.edm_type() {
            EdmTypeRef::Primitive(store) if store.data_space() == DataSpace::SSpace => {
                let canonical = self.edm.primitive_type(store.kind())?;
                Ok(project_facets(store_usage, &canonical))
            }
            EdmTypeRef::Primitive(canonical) => Ok(project_facets(store_usage, canonical)),
            other => Err(MetadataError::InvalidDataSpace {
                operation: "SqlProviderManifest::edm_type_usage",
                identity: other.identity().to_string(),
                expected: DataSpace::SSpace,
                actual: other.data_space(),
            }),
        }
    }
}

type StoreTypeRow = (&'static str, PrimitiveTypeKind, Vec<Arc<FacetDescription>>);

fn store_type_table() -> Vec<StoreTypeRow> {
    use PrimitiveTypeKind as K;

    let ansi = |fixed: bool| {
        vec![
            max_length(1, MAX_NON_UNICODE_LENGTH, FacetValue::Int(MAX_NON_UNICODE_LENGTH)),
            constant_flag(UNICODE, false),
            constant_flag(FIXED_LENGTH, fixed),
        ]
    };
    let national = |fixed: bool| {
        vec![
            max_length(1, MAX_UNICODE_LENGTH, FacetValue::Int(MAX_UNICODE_LENGTH)),
            constant_flag(UNICODE, true),
            constant_flag(FIXED_LENGTH, fixed),
        ]
    };
    let binary = |fixed: bool| {
        vec![
            max_length(1, MAX_NON_UNICODE_LENGTH, FacetValue::Int(MAX_NON_UNICODE_LENGTH)),
            constant_flag(FIXED_LENGTH, fixed),
        ]
    };
    let fractional = || {
        vec![precision(
            0,
            MAX_FRACTIONAL_SECONDS,
            FacetValue::Byte(MAX_FRACTIONAL_SECONDS as u8),
        )]
    };
    let decimal = || {
        vec![
            precision(1, MAX_DECIMAL_PRECISION, FacetValue::Byte(18)),
            scale(0, MAX_DECIMAL_PRECISION, FacetValue::Byte(0)),
        ]
    };
    let money = |p: u8| vec![constant_byte(PRECISION, p), constant_byte(SCALE, 4)];

    vec![
        ("bit", K::Boolean, vec![]),
        ("tinyint", K::Byte, vec![]),
        ("smallint", K::Int16, vec![]),
        ("int", K::Int32, vec![]),
        ("bigint", K::Int64, vec![]),
        ("float", K::Double, vec![]),
        ("real", K::Single, vec![]),
        ("decimal", K::Decimal, decimal()),
        ("numeric", K::Decimal, decimal()),
        ("money", K::Decimal, money(19)),
        ("smallmoney", K::Decimal, money(10)),
        ("datetime", K::DateTime, vec![]),
        ("datetime2", K::DateTime, fractional()),
        ("date", K::DateTime, vec![]),
        ("time", K::Time, fractional()),
        ("datetimeoffset", K::DateTimeOffset, fractional()),
        ("smalldatetime", K::DateTime, vec![]),
        ("char", K::String, ansi(true)),
        ("varchar", K::String, ansi(false)),
        ("nchar", K::String, national(true)),
        ("nvarchar", K::String, national(false)),
        (
            "text",
            K::String,
            vec![
                constant_max_length(i32::MAX),
                constant_flag(UNICODE, false),
                constant_flag(FIXED_LENGTH, false),
            ],
        ),
        (
            "ntext",
            K::String,
            vec![
                constant_max_length(i32::MAX / 2),
                constant_flag(UNICODE, true),
                constant_flag(FIXED_LENGTH, false),
            ],
        ),
        ("binary", K::Binary, binary(true)),
        ("varbinary", K::Binary, binary(false)),
        (
            "image",
            K::Binary,
            vec![
                constant_max_length(i32::MAX),
                constant_flag(FIXED_LENGTH, false),
            ],
        ),
        ("uniqueidentifier", K::Guid, vec![]),
        (
            "xml",
            K::String,
            vec![
                constant_flag(UNICODE, true),
                constant_flag(FIXED_LENGTH, false),
            ],
        ),
        ("geography", K::Geography, vec![srid(4326), is_strict()]),
        ("geometry", K::Geometry, vec![srid(0), is_strict()]),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::facet::{FacetValues, MAX_LENGTH};

    fn manifest() -> SqlProviderManifest {
        SqlProviderManifest::new("2008", Arc::new(EdmProviderManifest::new().unwrap())).unwrap()
    }

    #[test]
    fn test_store_types_found_ignoring_case() {
        let manifest = manifest();
        let nvarchar = manifest.find_primitive_type("NVARCHAR").unwrap();
        assert_eq!(nvarchar.identity(), "SqlServer.nvarchar");
        assert_eq!(nvarchar.kind(), PrimitiveTypeKind::String);
        assert_eq!(manifest.store_types().len(), 30);
    }

    #[test]
    fn test_edm_type_usage_projects_facets() {
        let manifest = manifest();
        let nvarchar = Arc::clone(manifest.find_primitive_type("nvarchar").unwrap());
        let store = TypeUsage::create_with(
            EdmTypeRef::Primitive(nvarchar),
            &FacetValues::new().max_length(50).nullable(false),
        );
        let model = manifest.edm_type_usage(&store).unwrap();
        assert_eq!(model.edm_type().identity(), "Edm.String");
        assert_eq!(model.max_length(), Some(&FacetValue::Int(50)));
        assert_eq!(model.facet_value(UNICODE), Some(&FacetValue::Bool(true)));
        assert!(!model.is_nullable());
        assert!(model.facet(MAX_LENGTH).is_some());
    }

    #[test]
    fn test_store_functions_flagged_from_manifest() {
        let manifest = manifest();
        let len: Vec<&Arc<EdmFunction>> = manifest
            .store_functions()
            .iter()
            .filter(|f| f.name() == "LEN")
            .collect();
        assert_eq!(len.len(), 2);
        assert!(len.iter().all(|f| f.is_from_provider_manifest()));
        assert_eq!(len[0].identity(), "SqlServer.LEN(in SqlServer.nvarchar)");
    }
}
