//! Metadata codec registry and the declarative field-spec reader.
//!
//! The protocol engine never interprets payload schemas itself. Each payload
//! format is handled by a registered codec:
//! - a **reader** turns a payload sub-document into a [`Metadata`] object
//! - a **writer** serializes a [`Metadata`] object back into an XML fragment
//!
//! The registry is an explicit value handed to the client at construction;
//! [`MetadataRegistry::with_dublin_core`] builds the stock instance most
//! harvesters want. Registration is a configuration-time operation — once the
//! registry is shared with running sessions it is read-only.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised by codecs and the registry.
///
/// These indicate a caller configuration defect, never a transient server
/// condition, and are not retried.
#[derive(Error, Debug)]
pub enum CodecError {
    /// No codec is registered for the requested metadata prefix
    #[error("no codec registered for metadata prefix '{0}'")]
    UnknownFormat(String),

    /// A field's query path uses a namespace prefix the codec never bound
    #[error("field '{field}': unbound namespace prefix '{prefix}' in query path")]
    UnboundPrefix { field: String, prefix: String },
}

// ============================================================================
// Metadata Object
// ============================================================================

/// Extraction rule for one field of a payload.
///
/// Each kind carries its own coercion; the set is closed so a codec's field
/// specification is checked exhaustively when it is written, not at read
/// time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum FieldKind {
    /// Single text value; empty string when the path matches nothing
    Text,

    /// All matching text values, in document order
    TextList,

    /// Single value kept as raw bytes
    Raw,

    /// All matching values kept as raw bytes
    RawList,
}

/// A decoded field value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Text(String),
    TextList(Vec<String>),
    Raw(Vec<u8>),
    RawList(Vec<Vec<u8>>),
}

/// Decoded payload metadata: a flat map of named field values.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Metadata {
    fields: HashMap<String, FieldValue>,
}

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, name: impl Into<String>, value: FieldValue) {
        self.fields.insert(name.into(), value);
    }

    pub fn get(&self, name: &str) -> Option<&FieldValue> {
        self.fields.get(name)
    }

    /// First text value of a field, if it has one.
    pub fn text(&self, name: &str) -> Option<&str> {
        match self.fields.get(name)? {
            FieldValue::Text(s) => Some(s),
            FieldValue::TextList(v) => v.first().map(String::as_str),
            _ => None,
        }
    }

    /// All text values of a list field.
    pub fn text_list(&self, name: &str) -> Option<&[String]> {
        match self.fields.get(name)? {
            FieldValue::TextList(v) => Some(v),
            _ => None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

// ============================================================================
// Codec Traits
// ============================================================================

/// Turns a payload sub-document into a [`Metadata`] object.
///
/// The node handed in is the envelope's payload container; query paths in
/// field specifications are relative to it.
pub trait MetadataReader: Send + Sync {
    fn read(&self, payload: roxmltree::Node<'_, '_>) -> Result<Metadata, CodecError>;
}

/// Serializes a [`Metadata`] object as an XML fragment.
///
/// Writers append to `out`; the engine does not validate the fragment.
pub trait MetadataWriter: Send + Sync {
    fn write(&self, out: &mut String, metadata: &Metadata) -> Result<(), CodecError>;
}

// ============================================================================
// Registry
// ============================================================================

/// Registry mapping a metadata prefix to its reader/writer pair.
///
/// Later registrations under the same prefix replace earlier ones. The
/// registry is meant to be fully populated before harvesting starts and
/// shared read-only afterwards.
#[derive(Default)]
pub struct MetadataRegistry {
    readers: HashMap<String, Box<dyn MetadataReader>>,
    writers: HashMap<String, Box<dyn MetadataWriter>>,
}

impl MetadataRegistry {
    /// An empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// The stock registry: Dublin Core (`oai_dc`) reader pre-registered.
    pub fn with_dublin_core() -> Self {
        let mut registry = Self::new();
        registry.register_reader("oai_dc", Box::new(dublin_core_reader()));
        registry
    }

    pub fn register_reader(&mut self, prefix: impl Into<String>, reader: Box<dyn MetadataReader>) {
        self.readers.insert(prefix.into(), reader);
    }

    pub fn register_writer(&mut self, prefix: impl Into<String>, writer: Box<dyn MetadataWriter>) {
        self.writers.insert(prefix.into(), writer);
    }

    pub fn has_reader(&self, prefix: &str) -> bool {
        self.readers.contains_key(prefix)
    }

    pub fn has_writer(&self, prefix: &str) -> bool {
        self.writers.contains_key(prefix)
    }

    /// Decodes a payload node with the reader registered for `prefix`.
    ///
    /// # Errors
    ///
    /// [`CodecError::UnknownFormat`] when no reader is registered.
    pub fn read(
        &self,
        prefix: &str,
        payload: roxmltree::Node<'_, '_>,
    ) -> Result<Metadata, CodecError> {
        self.readers
            .get(prefix)
            .ok_or_else(|| CodecError::UnknownFormat(prefix.to_string()))?
            .read(payload)
    }

    /// Serializes `metadata` with the writer registered for `prefix`.
    ///
    /// # Errors
    ///
    /// [`CodecError::UnknownFormat`] when no writer is registered.
    pub fn write(
        &self,
        prefix: &str,
        out: &mut String,
        metadata: &Metadata,
    ) -> Result<(), CodecError> {
        self.writers
            .get(prefix)
            .ok_or_else(|| CodecError::UnknownFormat(prefix.to_string()))?
            .write(out, metadata)
    }
}

impl std::fmt::Debug for MetadataRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MetadataRegistry")
            .field("readers", &self.readers.keys().collect::<Vec<_>>())
            .field("writers", &self.writers.keys().collect::<Vec<_>>())
            .finish()
    }
}

// ============================================================================
// Field-Spec Reader
// ============================================================================

/// One entry of a declarative field specification.
#[derive(Debug, Clone, PartialEq)]
pub struct FieldSpec {
    pub name: String,
    pub kind: FieldKind,
    /// Slash-separated path of prefixed element names relative to the
    /// payload node, e.g. `oai_dc:dc/dc:title`
    pub path: String,
}

impl FieldSpec {
    pub fn new(name: impl Into<String>, kind: FieldKind, path: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            kind,
            path: path.into(),
        }
    }
}

/// Default reader implementation driven by a field specification.
///
/// Evaluates each field's query path against the payload sub-document,
/// resolving namespace prefixes through the codec's own binding table, and
/// coerces matches per the field's [`FieldKind`].
pub struct FieldReader {
    fields: Vec<FieldSpec>,
    namespaces: HashMap<String, String>,
}

impl FieldReader {
    pub fn new(fields: Vec<FieldSpec>, namespaces: HashMap<String, String>) -> Self {
        Self { fields, namespaces }
    }

    /// Walks one query path from the payload node down, returning matches in
    /// document order.
    fn evaluate<'a, 'input>(
        &self,
        payload: roxmltree::Node<'a, 'input>,
        field: &FieldSpec,
    ) -> Result<Vec<roxmltree::Node<'a, 'input>>, CodecError> {
        let mut current = vec![payload];
        for step in field.path.split('/') {
            let (prefix, local) = match step.split_once(':') {
                Some((p, l)) => (Some(p), l),
                None => (None, step),
            };
            let uri = match prefix {
                Some(p) => Some(
                    self.namespaces
                        .get(p)
                        .ok_or_else(|| CodecError::UnboundPrefix {
                            field: field.name.clone(),
                            prefix: p.to_string(),
                        })?
                        .as_str(),
                ),
                None => None,
            };
            let mut next = Vec::new();
            for node in current {
                for child in node.children().filter(|c| c.is_element()) {
                    let tag = child.tag_name();
                    if tag.name() == local && tag.namespace() == uri {
                        next.push(child);
                    }
                }
            }
            current = next;
        }
        Ok(current)
    }
}

impl MetadataReader for FieldReader {
    fn read(&self, payload: roxmltree::Node<'_, '_>) -> Result<Metadata, CodecError> {
        let mut metadata = Metadata::new();
        for field in &self.fields {
            let nodes = self.evaluate(payload, field)?;
            let texts = || {
                nodes
                    .iter()
                    .map(|n| n.text().unwrap_or("").to_string())
                    .collect::<Vec<_>>()
            };
            let value = match field.kind {
                FieldKind::Text => {
                    FieldValue::Text(texts().into_iter().next().unwrap_or_default())
                }
                FieldKind::TextList => FieldValue::TextList(texts()),
                FieldKind::Raw => FieldValue::Raw(
                    texts().into_iter().next().unwrap_or_default().into_bytes(),
                ),
                FieldKind::RawList => {
                    FieldValue::RawList(texts().into_iter().map(String::into_bytes).collect())
                }
            };
            metadata.insert(field.name.clone(), value);
        }
        Ok(metadata)
    }
}

/// The stock Dublin Core (`oai_dc`) reader.
pub fn dublin_core_reader() -> FieldReader {
    const ELEMENTS: [&str; 15] = [
        "title",
        "creator",
        "subject",
        "description",
        "publisher",
        "contributor",
        "date",
        "type",
        "format",
        "identifier",
        "source",
        "language",
        "relation",
        "coverage",
        "rights",
    ];
    let fields = ELEMENTS
        .iter()
        .map(|name| {
            FieldSpec::new(
                *name,
                FieldKind::TextList,
                format!("oai_dc:dc/dc:{name}"),
            )
        })
        .collect();
    let namespaces = HashMap::from([
        (
            "oai_dc".to_string(),
            "http://www.openarchives.org/OAI/2.0/oai_dc/".to_string(),
        ),
        ("dc".to_string(), "http://purl.org/dc/elements/1.1/".to_string()),
    ]);
    FieldReader::new(fields, namespaces)
}

// ============================================================================
// Tests
// ============================================================================
