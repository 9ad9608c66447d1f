//! Facets: named, typed attributes of a type usage.

use std::fmt;
use std::sync::Arc;

use once_cell::sync::Lazy;

use super::item::{BuiltInTypeKind, MetadataItem};

pub const NULLABLE: &str = "Nullable";
pub const DEFAULT_VALUE: &str = "DefaultValue";
pub const MAX_LENGTH: &str = "MaxLength";
pub const FIXED_LENGTH: &str = "FixedLength";
pub const UNICODE: &str = "Unicode";
pub const PRECISION: &str = "Precision";
pub const SCALE: &str = "Scale";
pub const SRID: &str = "SRID";
pub const IS_STRICT: &str = "IsStrict";
pub const COLLATION: &str = "Collation";
pub const COLLECTION_KIND: &str = "CollectionKind";

/// Facets whose values take part in a type usage's identity, in name order.
pub const IDENTITY_FACETS: [&str; 8] = [
    DEFAULT_VALUE,
    FIXED_LENGTH,
    MAX_LENGTH,
    NULLABLE,
    PRECISION,
    SRID,
    SCALE,
    UNICODE,
];

pub fn is_identity_facet(name: &str) -> bool {
    IDENTITY_FACETS.binary_search(&name).is_ok()
}

/// Value held by a facet
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum FacetValue {
    Null,
    Bool(bool),
    Int(i32),
    Byte(u8),
    /// "Max": no declared upper bound
    Unbounded,
    Text(String),
}

impl FacetValue {
    pub fn is_null(&self) -> bool {
        matches!(self, FacetValue::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            FacetValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_int(&self) -> Option<i32> {
        match self {
            FacetValue::Int(value) => Some(*value),
            FacetValue::Byte(value) => Some(i32::from(*value)),
            _ => None,
        }
    }

    pub fn as_byte(&self) -> Option<u8> {
        match self {
            FacetValue::Byte(value) => Some(*value),
            FacetValue::Int(value) => u8::try_from(*value).ok(),
            _ => None,
        }
    }
}

impl fmt::Display for FacetValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FacetValue::Null => Ok(()),
            FacetValue::Bool(true) => f.write_str("True"),
            FacetValue::Bool(false) => f.write_str("False"),
            FacetValue::Int(value) => write!(f, "{}", value),
            FacetValue::Byte(value) => write!(f, "{}", value),
            FacetValue::Unbounded => f.write_str("Max"),
            FacetValue::Text(text) => f.write_str(text),
        }
    }
}

/// Value domain of a facet
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FacetType {
    Boolean,
    Int32,
    Byte,
    String,
    /// Values typed by the owning type (DefaultValue)
    Any,
    CollectionKind,
}

/// Declares a facet: name, type, bounds, default and whether it is constant
#[derive(Debug, Clone, PartialEq)]
pub struct FacetDescription {
    name: String,
    facet_type: FacetType,
    min_value: Option<i32>,
    max_value: Option<i32>,
    default_value: FacetValue,
    is_constant: bool,
}

impl FacetDescription {
    pub fn new(
        name: impl Into<String>,
        facet_type: FacetType,
        min_value: Option<i32>,
        max_value: Option<i32>,
        default_value: FacetValue,
    ) -> Self {
        Self {
            name: name.into(),
            facet_type,
            min_value,
            max_value,
            default_value,
            is_constant: false,
        }
    }

    /// A facet whose value is fixed by the provider and may not be overridden.
    pub fn constant(name: impl Into<String>, facet_type: FacetType, value: FacetValue) -> Self {
        Self {
            name: name.into(),
            facet_type,
            min_value: None,
            max_value: None,
            default_value: value,
            is_constant: true,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn facet_type(&self) -> FacetType {
        self.facet_type
    }

    pub fn min_value(&self) -> Option<i32> {
        self.min_value
    }

    pub fn max_value(&self) -> Option<i32> {
        self.max_value
    }

    pub fn default_value(&self) -> &FacetValue {
        &self.default_value
    }

    pub fn is_constant(&self) -> bool {
        self.is_constant
    }

    /// Whether `value` lies within the declared bounds.
    pub fn accepts(&self, value: &FacetValue) -> bool {
        if self.is_constant {
            return *value == self.default_value;
        }
        match (self.facet_type, value) {
            (_, FacetValue::Null) => true,
            (FacetType::Boolean, FacetValue::Bool(_)) => true,
            (FacetType::Int32 | FacetType::Byte, FacetValue::Unbounded) => true,
            (FacetType::Int32 | FacetType::Byte, v) => match v.as_int() {
                Some(n) => {
                    self.min_value.map_or(true, |min| n >= min)
                        && self.max_value.map_or(true, |max| n <= max)
                }
                None => false,
            },
            (FacetType::String | FacetType::Any | FacetType::CollectionKind, _) => true,
            _ => false,
        }
    }
}

/// Create the facet carrying a description's default value.
pub fn default_facet(description: &Arc<FacetDescription>) -> Facet {
    Facet::new(Arc::clone(description), description.default_value.clone())
}

static NULLABLE_DESCRIPTION: Lazy<Arc<FacetDescription>> = Lazy::new(|| {
    Arc::new(FacetDescription::new(
        NULLABLE,
        FacetType::Boolean,
        None,
        None,
        FacetValue::Bool(true),
    ))
});

static DEFAULT_VALUE_DESCRIPTION: Lazy<Arc<FacetDescription>> = Lazy::new(|| {
    Arc::new(FacetDescription::new(
        DEFAULT_VALUE,
        FacetType::Any,
        None,
        None,
        FacetValue::Null,
    ))
});

static COLLECTION_KIND_DESCRIPTION: Lazy<Arc<FacetDescription>> = Lazy::new(|| {
    Arc::new(FacetDescription::new(
        COLLECTION_KIND,
        FacetType::CollectionKind,
        None,
        None,
        FacetValue::Null,
    ))
});

/// Nullable and DefaultValue: facets every type accepts.
pub fn general_facet_descriptions() -> [Arc<FacetDescription>; 2] {
    [
        Arc::clone(&NULLABLE_DESCRIPTION),
        Arc::clone(&DEFAULT_VALUE_DESCRIPTION),
    ]
}

pub fn nullable_description() -> Arc<FacetDescription> {
    Arc::clone(&NULLABLE_DESCRIPTION)
}

pub fn default_value_description() -> Arc<FacetDescription> {
    Arc::clone(&DEFAULT_VALUE_DESCRIPTION)
}

pub fn collection_kind_description() -> Arc<FacetDescription> {
    Arc::clone(&COLLECTION_KIND_DESCRIPTION)
}

/// A facet value bound to its description
#[derive(Debug, Clone, PartialEq)]
pub struct Facet {
    description: Arc<FacetDescription>,
    value: FacetValue,
}

impl Facet {
    pub fn new(description: Arc<FacetDescription>, value: FacetValue) -> Self {
        Self { description, value }
    }

    pub fn name(&self) -> &str {
        self.description.name()
    }

    pub fn value(&self) -> &FacetValue {
        &self.value
    }

    pub fn description(&self) -> &Arc<FacetDescription> {
        &self.description
    }

    pub fn is_unbounded(&self) -> bool {
        self.value == FacetValue::Unbounded
    }
}

impl MetadataItem for Facet {
    fn identity(&self) -> &str {
        self.description.name()
    }

    fn built_in_type_kind(&self) -> BuiltInTypeKind {
        BuiltInTypeKind::Facet
    }

    fn is_read_only(&self) -> bool {
        true
    }

    fn set_read_only(&mut self) {}
}

/// Ordered facet overrides applied on top of a type's default facets
#[derive(Debug, Clone, Default, PartialEq)]
pub struct FacetValues {
    values: Vec<(String, FacetValue)>,
}

impl FacetValues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a value; a later value for the same name replaces the earlier one.
    pub fn set(&mut self, name: &str, value: FacetValue) -> &mut Self {
        match self.values.iter_mut().find(|(n, _)| n == name) {
            Some(entry) => entry.1 = value,
            None => self.values.push((name.to_string(), value)),
        }
        self
    }

    pub fn nullable(mut self, nullable: bool) -> Self {
        self.set(NULLABLE, FacetValue::Bool(nullable));
        self
    }

    pub fn max_length(mut self, max_length: i32) -> Self {
        self.set(MAX_LENGTH, FacetValue::Int(max_length));
        self
    }

    pub fn max_length_unbounded(mut self) -> Self {
        self.set(MAX_LENGTH, FacetValue::Unbounded);
        self
    }

    pub fn fixed_length(mut self, fixed: bool) -> Self {
        self.set(FIXED_LENGTH, FacetValue::Bool(fixed));
        self
    }

    pub fn unicode(mut self, unicode: bool) -> Self {
        self.set(UNICODE, FacetValue::Bool(unicode));
        self
    }

    pub fn precision(mut self, precision: u8) -> Self {
        self.set(PRECISION, FacetValue::Byte(precision));
        self
    }

    pub fn scale(mut self, scale: u8) -> Self {
        self.set(SCALE, FacetValue::Byte(scale));
        self
    }

    pub fn srid(mut self, srid: i32) -> Self {
        self.set(SRID, FacetValue::Int(srid));
        self
    }

    pub fn default_value(mut self, value: impl Into<String>) -> Self {
        self.set(DEFAULT_VALUE, FacetValue::Text(value.into()));
        self
    }

    pub fn get(&self, name: &str) -> Option<&FacetValue> {
        self.values.iter().find(|(n, _)| n == name).map(|(_, v)| v)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &FacetValue)> {
        self.values.iter().map(|(n, v)| (n.as_str(), v))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_facets_sorted() {
        let mut sorted = IDENTITY_FACETS;
        sorted.sort();
        assert_eq!(sorted, IDENTITY_FACETS);
        assert!(is_identity_facet("MaxLength"));
        assert!(!is_identity_facet("Collation"));
    }

    #[test]
    fn test_description_bounds() {
        let max_length = FacetDescription::new(
            MAX_LENGTH,
            FacetType::Int32,
            Some(1),
            Some(4000),
            FacetValue::Int(4000),
        );
        assert!(max_length.accepts(&FacetValue::Int(10)));
        assert!(!max_length.accepts(&FacetValue::Int(0)));
        assert!(!max_length.accepts(&FacetValue::Int(4001)));
        assert!(max_length.accepts(&FacetValue::Unbounded));

        let unicode = FacetDescription::constant(UNICODE, FacetType::Boolean, FacetValue::Bool(true));
        assert!(unicode.accepts(&FacetValue::Bool(true)));
        assert!(!unicode.accepts(&FacetValue::Bool(false)));
    }

    #[test]
    fn test_facet_values_last_write_wins() {
        let values = FacetValues::new().nullable(true).max_length(10).nullable(false);
        assert_eq!(values.get(NULLABLE), Some(&FacetValue::Bool(false)));
        assert_eq!(values.iter().count(), 2);
    }

    #[test]
    fn test_value_display() {
        assert_eq!(FacetValue::Bool(false).to_string(), "False");
        assert_eq!(FacetValue::Unbounded.to_string(), "Max");
        assert_eq!(FacetValue::Null.to_string(), "");
    }
}
