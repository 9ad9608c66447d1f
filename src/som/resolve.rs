//! Name resolution over a set of schema documents of one layer.

use std::collections::HashMap;
use std::sync::Arc;

use super::document::{
    AssociationElement, EntityTypeElement, FunctionElement, SchemaDocument, SchemaElement,
};
use crate::metadata::{DataSpace, PrimitiveType};
use crate::provider::ProviderManifest;
use crate::util::qualify;

/// Stable address of a schema element: document index and element index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ElementKey {
    pub document: usize,
    pub element: usize,
}

/// What a type name written in a schema refers to
#[derive(Debug, Clone)]
pub enum SchemaTypeRef {
    Primitive(Arc<PrimitiveType>),
    Element(ElementKey),
    Collection(Box<SchemaTypeRef>),
}

impl SchemaTypeRef {
    pub fn as_element(&self) -> Option<ElementKey> {
        match self {
            SchemaTypeRef::Element(key) => Some(*key),
            _ => None,
        }
    }

    pub fn is_collection(&self) -> bool {
        matches!(self, SchemaTypeRef::Collection(_))
    }
}

/// Documents of one layer plus the manifest supplying their primitive types.
///
/// Element names are indexed once at construction; duplicates keep the first
/// element and are reported by validation.
#[derive(Debug)]
pub struct SchemaSet {
    documents: Vec<SchemaDocument>,
    manifest: Arc<dyn ProviderManifest>,
    types: HashMap<String, ElementKey>,
    functions: HashMap<String, Vec<ElementKey>>,
    containers: HashMap<String, ElementKey>,
    duplicates: Vec<ElementKey>,
}

impl SchemaSet {
    pub fn new(documents: Vec<SchemaDocument>, manifest: Arc<dyn ProviderManifest>) -> Self {
        let mut types = HashMap::new();
        let mut functions: HashMap<String, Vec<ElementKey>> = HashMap::new();
        let mut containers = HashMap::new();
        let mut duplicates = Vec::new();

        for (document_index, document) in documents.iter().enumerate() {
            for (element_index, element) in document.elements.iter().enumerate() {
                let key = ElementKey {
                    document: document_index,
                    element: element_index,
                };
                match element {
                    SchemaElement::Function(function) => {
                        functions
                            .entry(qualify(&document.namespace, &function.name))
                            .or_default()
                            .push(key);
                    }
                    SchemaElement::EntityContainer(container) => {
                        if containers.contains_key(&container.name) {
                            duplicates.push(key);
                        } else {
                            containers.insert(container.name.clone(), key);
                        }
                    }
                    _ => {
                        let full_name = qualify(&document.namespace, element.name());
                        if types.contains_key(&full_name) {
                            duplicates.push(key);
                        } else {
                            types.insert(full_name, key);
                        }
                    }
                }
            }
        }

        Self {
            documents,
            manifest,
            types,
            functions,
            containers,
            duplicates,
        }
    }

    pub fn documents(&self) -> &[SchemaDocument] {
        &self.documents
    }

    pub fn document(&self, index: usize) -> Option<&SchemaDocument> {
        self.documents.get(index)
    }

    pub fn manifest(&self) -> &Arc<dyn ProviderManifest> {
        &self.manifest
    }

    /// CSpace when the manifest is the canonical one, SSpace otherwise.
    pub fn data_space(&self) -> DataSpace {
        self.manifest.data_space()
    }

    /// Version declared by the documents; the first document decides.
    pub fn version(&self) -> Option<f64> {
        self.documents.first().map(|d| d.version)
    }

    pub fn is_empty(&self) -> bool {
        self.documents.iter().all(|d| d.elements.is_empty())
    }

    /// Every element key, in document then declaration order.
    pub fn keys(&self) -> impl Iterator<Item = ElementKey> + '_ {
        self.documents
            .iter()
            .enumerate()
            .flat_map(|(document, d)| {
                (0..d.elements.len()).map(move |element| ElementKey { document, element })
            })
    }

    pub fn element(&self, key: ElementKey) -> Option<&SchemaElement> {
        self.documents.get(key.document)?.elements.get(key.element)
    }

    /// Elements that repeat an earlier element's name.
    pub fn duplicates(&self) -> &[ElementKey] {
        &self.duplicates
    }

    pub fn entity_type(&self, key: ElementKey) -> Option<&EntityTypeElement> {
        match self.element(key)? {
            SchemaElement::EntityType(entity) => Some(entity),
            _ => None,
        }
    }

    pub fn association(&self, key: ElementKey) -> Option<&AssociationElement> {
        match self.element(key)? {
            SchemaElement::Association(association) => Some(association),
            _ => None,
        }
    }

    pub fn function(&self, key: ElementKey) -> Option<&FunctionElement> {
        match self.element(key)? {
            SchemaElement::Function(function) => Some(function),
            _ => None,
        }
    }

    /// `Namespace.Name` of an element; containers are not qualified.
    pub fn qualified_name(&self, key: ElementKey) -> Option<String> {
        let document = self.documents.get(key.document)?;
        let element = document.elements.get(key.element)?;
        Some(match element {
            SchemaElement::EntityContainer(container) => container.name.clone(),
            other => qualify(&document.namespace, other.name()),
        })
    }

    /// Rewrite an alias or `Self` prefix to the document's namespace.
    pub fn normalize(&self, document: usize, name: &str) -> String {
        let Some(doc) = self.documents.get(document) else {
            return name.to_string();
        };
        if let Some((prefix, rest)) = name.rsplit_once('.') {
            let is_alias = doc.alias.as_deref() == Some(prefix);
            if prefix == "Self" || is_alias {
                return qualify(&doc.namespace, rest);
            }
        }
        name.to_string()
    }

    /// Element a qualified name written in `document` refers to.
    pub fn resolve_element(&self, document: usize, name: &str) -> Option<ElementKey> {
        let normalized = self.normalize(document, name);
        if let Some(key) = self.types.get(&normalized) {
            return Some(*key);
        }
        // Unqualified names fall back to the writing document's namespace.
        if !normalized.contains('.') {
            let doc = self.documents.get(document)?;
            return self.types.get(&qualify(&doc.namespace, &normalized)).copied();
        }
        None
    }

    /// Resolve a type reference as written on a property, parameter or return.
    pub fn resolve_type(&self, document: usize, name: &str) -> Option<SchemaTypeRef> {
        let trimmed = name.trim();
        if let Some(inner) = trimmed
            .strip_prefix("Collection(")
            .and_then(|rest| rest.strip_suffix(')'))
        {
            return self
                .resolve_type(document, inner)
                .map(|element| SchemaTypeRef::Collection(Box::new(element)));
        }
        if let Some(primitive) = self.resolve_primitive(document, trimmed) {
            return Some(SchemaTypeRef::Primitive(primitive));
        }
        self.resolve_element(document, trimmed)
            .map(SchemaTypeRef::Element)
    }

    /// Primitive type from the manifest, honoring the schema version gate on
    /// spatial types in the conceptual layer.
    pub fn resolve_primitive(&self, document: usize, name: &str) -> Option<Arc<PrimitiveType>> {
        let namespace = self.manifest.namespace_name();
        let unqualified = match name.rsplit_once('.') {
            Some((prefix, rest)) if prefix == namespace => rest,
            Some(_) => return None,
            None => name,
        };
        let primitive = self.manifest.find_primitive_type(unqualified)?;
        if self.data_space() == DataSpace::CSpace && primitive.kind().is_spatial() {
            let version = self.documents.get(document).map(|d| d.version)?;
            if version < 3.0 {
                return None;
            }
        }
        Some(Arc::clone(primitive))
    }

    /// Every overload of a function, by qualified or alias-qualified name.
    pub fn function_overloads(&self, document: usize, name: &str) -> &[ElementKey] {
        let normalized = self.normalize(document, name);
        self.functions
            .get(&normalized)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    pub fn all_function_groups(&self) -> impl Iterator<Item = (&String, &Vec<ElementKey>)> {
        self.functions.iter()
    }

    pub fn container(&self, name: &str) -> Option<ElementKey> {
        self.containers.get(name).copied()
    }
}
