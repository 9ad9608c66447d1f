//! EdmFunction and function parameters.

use std::fmt;
use std::sync::Arc;

use bitflags::bitflags;

use super::collection::MetadataCollection;
use super::item::{BuiltInTypeKind, DataSpace, HasItemState, ItemState, MetadataItem};
use super::type_usage::TypeUsage;
use crate::error::MetadataError;
use crate::util::qualify;

bitflags! {
    /// Boolean attributes of a function, packed.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct FunctionAttributes: u16 {
        const AGGREGATE = 1 << 0;
        const BUILT_IN = 1 << 1;
        const NILADIC = 1 << 2;
        const IS_COMPOSABLE = 1 << 3;
        const IS_FROM_PROVIDER_MANIFEST = 1 << 4;
        const IS_CACHED_STORE_FUNCTION = 1 << 5;
        const IS_FUNCTION_IMPORT = 1 << 6;
    }
}

impl Default for FunctionAttributes {
    fn default() -> Self {
        FunctionAttributes::IS_COMPOSABLE
    }
}

/// Direction of a function parameter
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterMode {
    In,
    Out,
    InOut,
    ReturnValue,
}

impl ParameterMode {
    /// Rendering used inside function identities.
    pub fn as_str(&self) -> &'static str {
        match self {
            ParameterMode::In => "in",
            ParameterMode::Out => "out",
            ParameterMode::InOut => "inout",
            ParameterMode::ReturnValue => "return",
        }
    }
}

impl fmt::Display for ParameterMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A named, typed function parameter
#[derive(Debug, Clone)]
pub struct FunctionParameter {
    name: String,
    type_usage: Arc<TypeUsage>,
    mode: ParameterMode,
    state: ItemState,
}

impl FunctionParameter {
    pub fn new(name: impl Into<String>, type_usage: Arc<TypeUsage>, mode: ParameterMode) -> Self {
        Self {
            name: name.into(),
            type_usage,
            mode,
            state: ItemState::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn type_usage(&self) -> &Arc<TypeUsage> {
        &self.type_usage
    }

    pub fn mode(&self) -> ParameterMode {
        self.mode
    }
}

impl MetadataItem for FunctionParameter {
    fn identity(&self) -> &str {
        &self.name
    }

    fn built_in_type_kind(&self) -> BuiltInTypeKind {
        BuiltInTypeKind::FunctionParameter
    }

    fn is_read_only(&self) -> bool {
        self.state.is_read_only()
    }

    fn set_read_only(&mut self) {
        self.state.freeze();
    }
}

/// Canonical overload signature: `Name(mode Type,mode Type,...)`.
///
/// Only input/output parameters take part; return parameters never do.
pub fn build_identity<'a>(
    function_name: &str,
    parameters: impl IntoIterator<Item = (ParameterMode, &'a str)>,
) -> String {
    let mut identity = String::with_capacity(function_name.len() + 16);
    identity.push_str(function_name);
    identity.push('(');
    for (index, (mode, type_name)) in parameters.into_iter().enumerate() {
        if index > 0 {
            identity.push(',');
        }
        identity.push_str(mode.as_str());
        identity.push(' ');
        identity.push_str(type_name);
    }
    identity.push(')');
    identity
}

/// Everything about a function other than its name, namespace and space
#[derive(Debug, Clone, Default)]
pub struct FunctionPayload {
    pub return_parameters: Vec<FunctionParameter>,
    pub parameters: Vec<FunctionParameter>,
    /// Entity set names bound to the return parameters, in the same order.
    pub entity_sets: Vec<String>,
    pub attributes: FunctionAttributes,
    pub command_text: Option<String>,
    pub store_function_name: Option<String>,
    pub schema: Option<String>,
}

/// A model, store or canonical function, or a container function import
#[derive(Debug, Clone)]
pub struct EdmFunction {
    name: String,
    namespace: String,
    data_space: DataSpace,
    return_parameters: MetadataCollection<FunctionParameter>,
    parameters: MetadataCollection<FunctionParameter>,
    entity_sets: Vec<String>,
    attributes: FunctionAttributes,
    command_text: Option<String>,
    store_function_name: Option<String>,
    schema: Option<String>,
    state: ItemState,
}

impl EdmFunction {
    /// Build a function, rejecting parameters whose mode does not fit their list.
    pub fn new(
        name: impl Into<String>,
        namespace: impl Into<String>,
        data_space: DataSpace,
        payload: FunctionPayload,
    ) -> Result<Self, MetadataError> {
        let name = name.into();
        let namespace = namespace.into();
        let full_name = qualify(&namespace, &name);

        for parameter in &payload.return_parameters {
            if parameter.mode() != ParameterMode::ReturnValue {
                return Err(invalid_mode(&full_name, parameter));
            }
        }
        for parameter in &payload.parameters {
            if parameter.mode() == ParameterMode::ReturnValue {
                return Err(invalid_mode(&full_name, parameter));
            }
        }
        if !payload.entity_sets.is_empty()
            && payload.entity_sets.len() != payload.return_parameters.len()
        {
            return Err(MetadataError::internal(format!(
                "function '{}' binds {} entity sets to {} return parameters",
                full_name,
                payload.entity_sets.len(),
                payload.return_parameters.len()
            )));
        }

        Ok(Self {
            name,
            namespace,
            data_space,
            return_parameters: MetadataCollection::try_from_items(payload.return_parameters)?,
            parameters: MetadataCollection::try_from_items(payload.parameters)?,
            entity_sets: payload.entity_sets,
            attributes: payload.attributes,
            command_text: payload.command_text,
            store_function_name: payload.store_function_name,
            schema: payload.schema,
            state: ItemState::new(),
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace_name(&self) -> &str {
        &self.namespace
    }

    /// `Namespace.Name`, without the signature.
    pub fn full_name(&self) -> String {
        qualify(&self.namespace, &self.name)
    }

    pub fn data_space(&self) -> DataSpace {
        self.data_space
    }

    pub fn parameters(&self) -> &MetadataCollection<FunctionParameter> {
        &self.parameters
    }

    pub fn return_parameters(&self) -> &MetadataCollection<FunctionParameter> {
        &self.return_parameters
    }

    pub fn return_parameter(&self) -> Option<&FunctionParameter> {
        self.return_parameters.first()
    }

    pub fn entity_sets(&self) -> &[String] {
        &self.entity_sets
    }

    pub fn attributes(&self) -> FunctionAttributes {
        self.attributes
    }

    pub fn is_aggregate(&self) -> bool {
        self.attributes.contains(FunctionAttributes::AGGREGATE)
    }

    pub fn is_built_in(&self) -> bool {
        self.attributes.contains(FunctionAttributes::BUILT_IN)
    }

    pub fn is_niladic(&self) -> bool {
        self.attributes.contains(FunctionAttributes::NILADIC)
    }

    pub fn is_composable(&self) -> bool {
        self.attributes.contains(FunctionAttributes::IS_COMPOSABLE)
    }

    pub fn is_from_provider_manifest(&self) -> bool {
        self.attributes
            .contains(FunctionAttributes::IS_FROM_PROVIDER_MANIFEST)
    }

    pub fn is_cached_store_function(&self) -> bool {
        self.attributes
            .contains(FunctionAttributes::IS_CACHED_STORE_FUNCTION)
    }

    pub fn is_function_import(&self) -> bool {
        self.attributes.contains(FunctionAttributes::IS_FUNCTION_IMPORT)
    }

    pub fn command_text(&self) -> Option<&str> {
        self.command_text.as_deref()
    }

    /// Name the store knows the function by, when it differs from `name`.
    pub fn store_function_name(&self) -> Option<&str> {
        self.store_function_name.as_deref()
    }

    pub fn schema(&self) -> Option<&str> {
        self.schema.as_deref()
    }

    /// Copy of the payload, for deriving a function in another space.
    pub fn to_payload(&self) -> FunctionPayload {
        FunctionPayload {
            return_parameters: self.return_parameters.iter().cloned().collect(),
            parameters: self.parameters.iter().cloned().collect(),
            entity_sets: self.entity_sets.clone(),
            attributes: self.attributes,
            command_text: self.command_text.clone(),
            store_function_name: self.store_function_name.clone(),
            schema: self.schema.clone(),
        }
    }
}

fn invalid_mode(function: &str, parameter: &FunctionParameter) -> MetadataError {
    MetadataError::InvalidParameterMode {
        function: function.to_string(),
        parameter: parameter.name().to_string(),
        mode: parameter.mode().to_string(),
    }
}

impl MetadataItem for EdmFunction {
    fn identity(&self) -> &str {
        self.state.identity_or_init(|| {
            build_identity(
                &qualify(&self.namespace, &self.name),
                self.parameters
                    .iter()
                    .map(|p| (p.mode(), p.type_usage().edm_type().identity())),
            )
        })
    }

    fn built_in_type_kind(&self) -> BuiltInTypeKind {
        BuiltInTypeKind::EdmFunction
    }

    fn is_read_only(&self) -> bool {
        self.state.is_read_only()
    }

    fn set_read_only(&mut self) {
        self.return_parameters.set_read_only();
        self.parameters.set_read_only();
        self.state.freeze();
    }
}

impl HasItemState for EdmFunction {
    fn item_state(&self) -> &ItemState {
        &self.state
    }

    fn item_state_mut(&mut self) -> &mut ItemState {
        &mut self.state
    }
}
