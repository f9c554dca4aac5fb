//! Domain value objects produced by the harvesting engine.
//!
//! These are the normalized shapes every verb resolves to, independent of
//! which repository or payload dialect they were harvested from. All of them
//! serialize, so harvested data can be stored or shipped downstream as-is.

use serde::{Deserialize, Serialize};

use crate::datestamp::Datestamp;
use crate::metadata::Metadata;

/// Descriptive header of a harvested item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Header {
    /// Repository-scoped item identifier
    pub identifier: String,

    /// When the item was created or last changed, at the repository's
    /// granularity
    pub datestamp: Datestamp,

    /// Sets the item belongs to (zero or more set specs)
    pub set_specs: Vec<String>,

    /// Whether the repository reports the item as deleted
    pub deleted: bool,

    /// Metadata format of the item.
    ///
    /// Falls back to the prefix the request asked for when the envelope does
    /// not carry a per-item format.
    pub format: String,
}

/// A harvested record: header plus optional decoded payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Record {
    pub header: Header,

    /// Decoded metadata payload.
    ///
    /// `None` exactly when the envelope carried no payload section, which is
    /// how repositories represent deleted records.
    pub metadata: Option<Metadata>,

    /// Text content of the record's about section, when one is present.
    pub about: Option<String>,
}

/// A set a repository organizes its items into.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Set {
    /// Colon-separated hierarchical set spec
    pub spec: String,

    /// Human-readable set name
    pub name: String,

    /// Set description placeholder; repositories rarely populate it and the
    /// engine does not decode it
    pub description: Option<String>,
}

/// Repository self-description returned by the harvesting-status verb.
///
/// Immutable once built; granularity negotiation reads the `granularity`
/// field.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Identify {
    pub repository_name: String,
    pub base_url: String,
    pub protocol_version: String,
    pub admin_emails: Vec<String>,
    pub earliest_datestamp: Datestamp,
    /// Deleted-record policy: `no`, `transient`, or `persistent`
    pub deleted_record: String,
    /// Raw granularity pattern as reported, e.g. `YYYY-MM-DD`
    pub granularity: String,
    /// Compression encodings the repository supports
    pub compression: Vec<String>,
}

/// One metadata format a repository can disseminate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MetadataFormat {
    /// Format prefix used in requests, e.g. `oai_dc`
    pub prefix: String,

    /// Schema URI for the format
    pub schema: String,

    /// XML namespace URI of the payload
    pub namespace: String,
}
