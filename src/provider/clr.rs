//! Object-space primitive types: the runtime types backing canonical kinds.

use std::collections::HashMap;
use std::sync::Arc;

use crate::metadata::{DataSpace, EdmType, MetadataItem, PrimitiveType, PrimitiveTypeKind};

const SYSTEM_NAMESPACE: &str = "System";
const SPATIAL_NAMESPACE: &str = "System.Data.Entity.Spatial";

/// Registry of object-space primitive types keyed by canonical kind
#[derive(Debug)]
pub struct ClrPrimitiveTypes {
    types: Vec<Arc<PrimitiveType>>,
    by_kind: HashMap<PrimitiveTypeKind, Arc<PrimitiveType>>,
}

impl ClrPrimitiveTypes {
    pub fn new() -> Self {
        use PrimitiveTypeKind as K;

        let table = [
            (K::Binary, SYSTEM_NAMESPACE, "Byte[]"),
            (K::Boolean, SYSTEM_NAMESPACE, "Boolean"),
            (K::Byte, SYSTEM_NAMESPACE, "Byte"),
            (K::DateTime, SYSTEM_NAMESPACE, "DateTime"),
            (K::Decimal, SYSTEM_NAMESPACE, "Decimal"),
            (K::Double, SYSTEM_NAMESPACE, "Double"),
            (K::Guid, SYSTEM_NAMESPACE, "Guid"),
            (K::Single, SYSTEM_NAMESPACE, "Single"),
            (K::SByte, SYSTEM_NAMESPACE, "SByte"),
            (K::Int16, SYSTEM_NAMESPACE, "Int16"),
            (K::Int32, SYSTEM_NAMESPACE, "Int32"),
            (K::Int64, SYSTEM_NAMESPACE, "Int64"),
            (K::String, SYSTEM_NAMESPACE, "String"),
            (K::Time, SYSTEM_NAMESPACE, "TimeSpan"),
            (K::DateTimeOffset, SYSTEM_NAMESPACE, "DateTimeOffset"),
            (K::Geometry, SPATIAL_NAMESPACE, "DbGeometry"),
            (K::Geography, SPATIAL_NAMESPACE, "DbGeography"),
        ];

        let types: Vec<Arc<PrimitiveType>> = table
            .iter()
            .map(|(kind, namespace, name)| {
                Arc::new(PrimitiveType::new(
                    *name,
                    *namespace,
                    DataSpace::OSpace,
                    *kind,
                    Vec::new(),
                ))
            })
            .collect();
        let by_kind = types.iter().map(|t| (t.kind(), Arc::clone(t))).collect();
        Self { types, by_kind }
    }

    pub fn all(&self) -> &[Arc<PrimitiveType>] {
        &self.types
    }

    /// Runtime type for a canonical kind. Spatial subkinds share the
    /// runtime type of their family.
    pub fn for_kind(&self, kind: PrimitiveTypeKind) -> Option<&Arc<PrimitiveType>> {
        let kind = if kind.is_geography() {
            PrimitiveTypeKind::Geography
        } else if kind.is_geometry() {
            PrimitiveTypeKind::Geometry
        } else {
            kind
        };
        self.by_kind.get(&kind)
    }

    /// Look up by qualified runtime name, e.g. `System.Int32`.
    pub fn find(&self, full_name: &str) -> Option<&Arc<PrimitiveType>> {
        self.types.iter().find(|t| t.identity() == full_name)
    }

    /// Look up by unqualified runtime name, e.g. `Int32`.
    pub fn find_by_name(&self, name: &str) -> Option<&Arc<PrimitiveType>> {
        self.types.iter().find(|t| t.name() == name)
    }
}

impl Default for ClrPrimitiveTypes {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_spatial_subkinds_share_family_type() {
        let clr = ClrPrimitiveTypes::new();
        let point = clr.for_kind(PrimitiveTypeKind::GeographyPoint).unwrap();
        assert_eq!(point.identity(), "System.Data.Entity.Spatial.DbGeography");
        assert_eq!(
            clr.find("System.Int32").unwrap().kind(),
            PrimitiveTypeKind::Int32
        );
    }
}
