//! Response classification: raw bytes → parsed envelope or protocol error.
//!
//! Every round trip lands here exactly once. A body that does not parse is a
//! malformed response; a parsed envelope carrying an error element becomes
//! the classified error for its code; anything else is handed to the verb's
//! result builder.

use thiserror::Error;

use crate::error::HarvestError;

/// Namespace of the protocol envelope.
pub(crate) const OAI_NS: &str = "http://www.openarchives.org/OAI/2.0/";

/// Protocol-level errors reported by the server.
///
/// One variant per code in the protocol's fixed vocabulary, plus
/// [`ProtocolError::Unknown`] for anything outside it — unknown codes are
/// surfaced verbatim, never coerced into a known one. These are the server's
/// final answer to a well-formed request and are never retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    #[error("badArgument: {0}")]
    BadArgument(String),

    #[error("badResumptionToken: {0}")]
    BadResumptionToken(String),

    #[error("badVerb: {0}")]
    BadVerb(String),

    #[error("cannotDisseminateFormat: {0}")]
    CannotDisseminateFormat(String),

    #[error("idDoesNotExist: {0}")]
    IdDoesNotExist(String),

    #[error("noRecordsMatch: {0}")]
    NoRecordsMatch(String),

    #[error("noMetadataFormats: {0}")]
    NoMetadataFormats(String),

    #[error("noSetHierarchy: {0}")]
    NoSetHierarchy(String),

    #[error("unknown error code '{code}' from server: {message}")]
    Unknown { code: String, message: String },
}

impl ProtocolError {
    pub(crate) fn from_wire(code: &str, message: String) -> Self {
        match code {
            "badArgument" => ProtocolError::BadArgument(message),
            "badResumptionToken" => ProtocolError::BadResumptionToken(message),
            "badVerb" => ProtocolError::BadVerb(message),
            "cannotDisseminateFormat" => ProtocolError::CannotDisseminateFormat(message),
            "idDoesNotExist" => ProtocolError::IdDoesNotExist(message),
            "noRecordsMatch" => ProtocolError::NoRecordsMatch(message),
            "noMetadataFormats" => ProtocolError::NoMetadataFormats(message),
            "noSetHierarchy" => ProtocolError::NoSetHierarchy(message),
            _ => ProtocolError::Unknown {
                code: code.to_string(),
                message,
            },
        }
    }

    /// The wire code this error was classified from.
    pub fn code(&self) -> &str {
        match self {
            ProtocolError::BadArgument(_) => "badArgument",
            ProtocolError::BadResumptionToken(_) => "badResumptionToken",
            ProtocolError::BadVerb(_) => "badVerb",
            ProtocolError::CannotDisseminateFormat(_) => "cannotDisseminateFormat",
            ProtocolError::IdDoesNotExist(_) => "idDoesNotExist",
            ProtocolError::NoRecordsMatch(_) => "noRecordsMatch",
            ProtocolError::NoMetadataFormats(_) => "noMetadataFormats",
            ProtocolError::NoSetHierarchy(_) => "noSetHierarchy",
            ProtocolError::Unknown { code, .. } => code,
        }
    }
}

/// Parses a response body and classifies it.
///
/// Returns the parsed document on success. If the envelope carries error
/// elements, the first one wins and is raised as its classified
/// [`ProtocolError`].
///
/// # Errors
///
/// [`HarvestError::MalformedResponse`] when the body is not well-formed XML;
/// [`HarvestError::Protocol`] for an error-bearing envelope.
pub(crate) fn classify(body: &str) -> Result<roxmltree::Document<'_>, HarvestError> {
    let doc = roxmltree::Document::parse(body).map_err(|e| HarvestError::MalformedResponse {
        detail: e.to_string(),
    })?;

    let root = doc.root_element();
    if let Some(error_node) = root
        .children()
        .find(|n| n.is_element() && n.has_tag_name((OAI_NS, "error")))
    {
        let code = error_node.attribute("code").unwrap_or("");
        let message = error_node.text().unwrap_or("").trim().to_string();
        return Err(ProtocolError::from_wire(code, message).into());
    }

    Ok(doc)
}

// ============================================================================
// Query Helpers
// ============================================================================
//
// Small namespace-aware lookups shared by the verb result builders. Paths in
// codec field specifications use their own evaluator (see crate::metadata);
// builders only ever need direct children.

pub(crate) fn children<'a, 'input>(
    node: roxmltree::Node<'a, 'input>,
    local: &str,
) -> Vec<roxmltree::Node<'a, 'input>> {
    node.children()
        .filter(|c| c.is_element() && c.has_tag_name((OAI_NS, local)))
        .collect()
}

pub(crate) fn child<'a, 'input>(
    node: roxmltree::Node<'a, 'input>,
    local: &str,
) -> Option<roxmltree::Node<'a, 'input>> {
    node.children()
        .find(|c| c.is_element() && c.has_tag_name((OAI_NS, local)))
}

/// Text of a direct child element, or `None` when the child is absent.
pub(crate) fn child_text(node: roxmltree::Node<'_, '_>, local: &str) -> Option<String> {
    child(node, local).map(|c| c.text().unwrap_or("").to_string())
}

/// Texts of all matching direct children, in document order.
pub(crate) fn child_texts(node: roxmltree::Node<'_, '_>, local: &str) -> Vec<String> {
    children(node, local)
        .into_iter()
        .map(|c| c.text().unwrap_or("").to_string())
        .collect()
}

// ============================================================================
// Tests
// ============================================================================
