//! OAI-PMH metadata harvesting client.
//!
//! The engine runs every verb call through the same cycle — argument
//! normalization, retrying transport, response classification, result
//! building — and streams multi-page listings lazily behind continuation
//! tokens. Payload formats stay pluggable through a metadata codec registry,
//! so the engine itself never interprets a payload schema.

pub mod archive;
pub mod datestamp;
pub mod error;
pub mod harvest;
pub mod metadata;
pub mod model;

// Re-export common types for convenience
pub use archive::ArchiveReader;
pub use datestamp::{Datestamp, Granularity};
pub use error::HarvestError;
pub use harvest::{
    Client, DelegateTransport, FileTransport, HttpTransport, ListArguments, ProtocolError,
    ResumptionStream, RetryPolicy, Transport, TransportError, TransportResponse, Verb,
};
pub use metadata::{
    dublin_core_reader, CodecError, FieldKind, FieldReader, FieldSpec, FieldValue, Metadata,
    MetadataReader, MetadataRegistry, MetadataWriter,
};
pub use model::{Header, Identify, MetadataFormat, Record, Set};
