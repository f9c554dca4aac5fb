//! Top-level error type for the harvesting engine.
//!
//! Each concern keeps its own error enum next to its module; this aggregate
//! is what the client-facing operations return. The taxonomy separates
//! conditions that are retried (transport), conditions that are the server's
//! final answer (protocol errors), and caller defects (arguments, codecs),
//! so callers can branch on the failure class without string matching.

use thiserror::Error;

use crate::datestamp::DatestampError;
use crate::harvest::response::ProtocolError;
use crate::harvest::transport::TransportError;
use crate::metadata::CodecError;

/// Any failure an engine operation can surface.
#[derive(Error, Debug)]
pub enum HarvestError {
    /// Illegal verb/argument combination, rejected before any request is sent
    #[error("illegal arguments: {0}")]
    BadArgument(String),

    /// Transport failure after the retry policy ran its course
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Response body is not a well-formed protocol document
    #[error("response is not a well-formed protocol document: {detail}")]
    MalformedResponse { detail: String },

    /// Classified protocol error reported by the server
    #[error(transparent)]
    Protocol(#[from] ProtocolError),

    /// Codec configuration defect (unregistered format, bad field spec)
    #[error(transparent)]
    Codec(#[from] CodecError),

    /// The server reports a datestamp granularity outside the protocol's two
    /// standard patterns
    #[error("unsupported datestamp granularity reported by server: '{0}'")]
    UnsupportedGranularity(String),

    /// Internal-consistency fault; indicates a noncompliant server or an
    /// engine bug, never silently ignored
    #[error("protocol invariant violated: {0}")]
    InvariantViolation(String),

    /// A datestamp in the response could not be decoded
    #[error(transparent)]
    Datestamp(#[from] DatestampError),

    /// Local I/O failure while replaying archived responses
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}
