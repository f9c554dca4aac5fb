//! Per-verb result builders.
//!
//! Each builder is a pure function over an already-classified envelope: no
//! I/O, no retries, just extraction into the domain value objects. Listing
//! builders additionally pull the continuation token, normalizing the empty
//! string to "no token".

use crate::datestamp;
use crate::error::HarvestError;
use crate::harvest::response::{child, child_text, child_texts, children};
use crate::metadata::MetadataRegistry;
use crate::model::{Header, Identify, MetadataFormat, Record, Set};

/// A page of items plus the continuation token, if any.
pub(crate) type Page<T> = (Vec<T>, Option<String>);

/// Continuation token of a listing response; empty string means none.
fn resumption_token(root: roxmltree::Node<'_, '_>) -> Option<String> {
    root.children()
        .filter(|n| n.is_element())
        .find_map(|section| child_text(section, "resumptionToken"))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

fn build_header(
    header_node: roxmltree::Node<'_, '_>,
    fallback_prefix: &str,
) -> Result<Header, HarvestError> {
    let identifier = child_text(header_node, "identifier").unwrap_or_default();
    let datestamp = datestamp::decode(&child_text(header_node, "datestamp").unwrap_or_default())?;
    let format = child_text(header_node, "format")
        .filter(|f| !f.is_empty())
        .unwrap_or_else(|| fallback_prefix.to_string());
    let set_specs = child_texts(header_node, "setSpec");
    let deleted = header_node.attribute("status") == Some("deleted");
    Ok(Header {
        identifier,
        datestamp,
        set_specs,
        deleted,
        format,
    })
}

fn build_record(
    record_node: roxmltree::Node<'_, '_>,
    requested_prefix: &str,
    registry: &MetadataRegistry,
) -> Result<Record, HarvestError> {
    let header_node = child(record_node, "header").ok_or(HarvestError::MalformedResponse {
        detail: "record without header".to_string(),
    })?;
    let header = build_header(header_node, requested_prefix)?;

    // An absent payload section is how deleted records arrive; the header
    // still carries the deleted flag and datestamp.
    let metadata = match child(record_node, "metadata") {
        Some(metadata_node) => Some(registry.read(&header.format, metadata_node)?),
        None => None,
    };

    let about_texts = child_texts(record_node, "about");
    let about = if about_texts.is_empty() {
        None
    } else {
        Some(about_texts.join("\n"))
    };

    Ok(Record {
        header,
        metadata,
        about,
    })
}

/// Records plus token from any record-bearing response.
pub(crate) fn build_record_page(
    doc: &roxmltree::Document<'_>,
    requested_prefix: &str,
    registry: &MetadataRegistry,
) -> Result<Page<Record>, HarvestError> {
    let root = doc.root_element();
    let mut records = Vec::new();
    for section in root.children().filter(|n| n.is_element()) {
        for record_node in children(section, "record") {
            records.push(build_record(record_node, requested_prefix, registry)?);
        }
    }
    Ok((records, resumption_token(root)))
}

/// Exactly one record from a single-item fetch.
///
/// # Errors
///
/// [`HarvestError::InvariantViolation`] if the response carries a
/// continuation token — a single-item fetch must not paginate, and silently
/// dropping the token would hide a noncompliant server.
pub(crate) fn build_single_record(
    doc: &roxmltree::Document<'_>,
    requested_prefix: &str,
    registry: &MetadataRegistry,
) -> Result<Record, HarvestError> {
    let (mut records, token) = build_record_page(doc, requested_prefix, registry)?;
    if token.is_some() {
        return Err(HarvestError::InvariantViolation(
            "single-record response carries a continuation token".to_string(),
        ));
    }
    match records.len() {
        1 => Ok(records.remove(0)),
        n => Err(HarvestError::MalformedResponse {
            detail: format!("expected one record in single-record response, found {n}"),
        }),
    }
}

/// Headers plus token from a header-listing response.
pub(crate) fn build_header_page(doc: &roxmltree::Document<'_>) -> Result<Page<Header>, HarvestError> {
    let root = doc.root_element();
    let mut headers = Vec::new();
    if let Some(section) = child(root, "ListIdentifiers") {
        for header_node in children(section, "header") {
            // Header listings carry no requested prefix to fall back to.
            headers.push(build_header(header_node, "")?);
        }
    }
    Ok((headers, resumption_token(root)))
}

/// Sets plus token from a set-listing response.
pub(crate) fn build_set_page(doc: &roxmltree::Document<'_>) -> Result<Page<Set>, HarvestError> {
    let root = doc.root_element();
    let mut sets = Vec::new();
    if let Some(section) = child(root, "ListSets") {
        for set_node in children(section, "set") {
            sets.push(Set {
                spec: child_text(set_node, "setSpec").unwrap_or_default(),
                name: child_text(set_node, "setName").unwrap_or_default(),
                description: None,
            });
        }
    }
    Ok((sets, resumption_token(root)))
}

/// The repository self-description.
pub(crate) fn build_identify(doc: &roxmltree::Document<'_>) -> Result<Identify, HarvestError> {
    let root = doc.root_element();
    let identify_node = child(root, "Identify").ok_or(HarvestError::MalformedResponse {
        detail: "missing Identify section".to_string(),
    })?;

    let earliest =
        datestamp::decode(&child_text(identify_node, "earliestDatestamp").unwrap_or_default())?;

    Ok(Identify {
        repository_name: child_text(identify_node, "repositoryName").unwrap_or_default(),
        base_url: child_text(identify_node, "baseURL").unwrap_or_default(),
        protocol_version: child_text(identify_node, "protocolVersion").unwrap_or_default(),
        admin_emails: child_texts(identify_node, "adminEmail"),
        earliest_datestamp: earliest,
        deleted_record: child_text(identify_node, "deletedRecord").unwrap_or_default(),
        granularity: child_text(identify_node, "granularity").unwrap_or_default(),
        compression: child_texts(identify_node, "compression"),
    })
}

/// The format descriptors a repository can disseminate.
pub(crate) fn build_metadata_formats(
    doc: &roxmltree::Document<'_>,
) -> Result<Vec<MetadataFormat>, HarvestError> {
    let root = doc.root_element();
    let mut formats = Vec::new();
    if let Some(section) = child(root, "ListMetadataFormats") {
        for format_node in children(section, "metadataFormat") {
            formats.push(MetadataFormat {
                prefix: child_text(format_node, "metadataPrefix").unwrap_or_default(),
                schema: child_text(format_node, "schema").unwrap_or_default(),
                namespace: child_text(format_node, "metadataNamespace").unwrap_or_default(),
            });
        }
    }
    Ok(formats)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::datestamp::Datestamp;
    use crate::harvest::response::classify;

    fn envelope(inner: &str) -> String {
        format!(
            r#"<?xml version="1.0"?>
<OAI-PMH xmlns="http://www.openarchives.org/OAI/2.0/">
  <responseDate>2006-04-12T13:05:59Z</responseDate>
  {inner}
</OAI-PMH>"#
        )
    }

    const DC_METADATA: &str = r#"<metadata>
      <oai_dc:dc xmlns:oai_dc="http://www.openarchives.org/OAI/2.0/oai_dc/"
                 xmlns:dc="http://purl.org/dc/elements/1.1/">
        <dc:title>On Harvesting</dc:title>
      </oai_dc:dc>
    </metadata>"#;

    #[test]
    fn test_identify_extraction() {
        let body = envelope(
            r#"<Identify>
              <repositoryName>Example Archive</repositoryName>
              <baseURL>http://example.org/oai</baseURL>
              <protocolVersion>2.0</protocolVersion>
              <adminEmail>admin@example.org</adminEmail>
              <adminEmail>backup@example.org</adminEmail>
              <earliestDatestamp>1998-01-01</earliestDatestamp>
              <deletedRecord>persistent</deletedRecord>
              <granularity>YYYY-MM-DD</granularity>
              <compression>gzip</compression>
            </Identify>"#,
        );
        let doc = classify(&body).unwrap();
        let identify = build_identify(&doc).unwrap();

        assert_eq!(identify.repository_name, "Example Archive");
        assert_eq!(identify.protocol_version, "2.0");
        assert_eq!(identify.admin_emails.len(), 2);
        assert_eq!(identify.granularity, "YYYY-MM-DD");
        assert_eq!(identify.compression, vec!["gzip".to_string()]);
        assert!(matches!(identify.earliest_datestamp, Datestamp::Day(_)));
    }

    #[test]
    fn test_record_page_with_live_and_deleted_records() {
        let body = envelope(&format!(
            r#"<ListRecords>
              <record>
                <header>
                  <identifier>oai:example:1</identifier>
                  <datestamp>2006-04-12T13:05:59Z</datestamp>
                  <setSpec>physics</setSpec>
                  <setSpec>physics:hep</setSpec>
                </header>
                {DC_METADATA}
              </record>
              <record>
                <header status="deleted">
                  <identifier>oai:example:2</identifier>
                  <datestamp>2006-04-13T09:00:00Z</datestamp>
                </header>
              </record>
              <resumptionToken>page-2</resumptionToken>
            </ListRecords>"#
        ));
        let doc = classify(&body).unwrap();
        let registry = MetadataRegistry::with_dublin_core();
        let (records, token) = build_record_page(&doc, "oai_dc", &registry).unwrap();

        assert_eq!(token.as_deref(), Some("page-2"));
        assert_eq!(records.len(), 2);

        let live = &records[0];
        assert_eq!(live.header.identifier, "oai:example:1");
        assert_eq!(live.header.set_specs, vec!["physics", "physics:hep"]);
        assert!(!live.header.deleted);
        assert_eq!(live.header.format, "oai_dc");
        let metadata = live.metadata.as_ref().unwrap();
        assert_eq!(metadata.text("title"), Some("On Harvesting"));

        let deleted = &records[1];
        assert!(deleted.header.deleted);
        assert!(deleted.metadata.is_none());
    }

    #[test]
    fn test_empty_token_normalizes_to_none() {
        let body = envelope(
            r#"<ListRecords>
              <resumptionToken>  </resumptionToken>
            </ListRecords>"#,
        );
        let doc = classify(&body).unwrap();
        let registry = MetadataRegistry::new();
        let (records, token) = build_record_page(&doc, "oai_dc", &registry).unwrap();
        assert!(records.is_empty());
        assert!(token.is_none());
    }

    #[test]
    fn test_single_record_rejects_token() {
        let body = envelope(&format!(
            r#"<GetRecord>
              <record>
                <header>
                  <identifier>oai:example:1</identifier>
                  <datestamp>2006-04-12T13:05:59Z</datestamp>
                </header>
                {DC_METADATA}
              </record>
              <resumptionToken>should-not-be-here</resumptionToken>
            </GetRecord>"#
        ));
        let doc = classify(&body).unwrap();
        let registry = MetadataRegistry::with_dublin_core();
        let err = build_single_record(&doc, "oai_dc", &registry).unwrap_err();
        assert!(matches!(err, HarvestError::InvariantViolation(_)));
    }

    #[test]
    fn test_per_record_format_overrides_requested_prefix() {
        let body = envelope(&format!(
            r#"<GetRecord>
              <record>
                <header>
                  <identifier>oai:example:1</identifier>
                  <datestamp>2006-04-12T13:05:59Z</datestamp>
                  <format>oai_dc</format>
                </header>
                {DC_METADATA}
              </record>
            </GetRecord>"#
        ));
        let doc = classify(&body).unwrap();
        let registry = MetadataRegistry::with_dublin_core();
        // Requested prefix has no registered codec, but the record names its
        // own format, which does.
        let record = build_single_record(&doc, "something_else", &registry).unwrap();
        assert_eq!(record.header.format, "oai_dc");
        assert!(record.metadata.is_some());
    }

    #[test]
    fn test_header_page_extraction() {
        let body = envelope(
            r#"<ListIdentifiers>
              <header>
                <identifier>oai:example:1</identifier>
                <datestamp>2006-04-12</datestamp>
                <setSpec>physics</setSpec>
              </header>
              <header status="deleted">
                <identifier>oai:example:2</identifier>
                <datestamp>2006-04-13</datestamp>
              </header>
              <resumptionToken>more</resumptionToken>
            </ListIdentifiers>"#,
        );
        let doc = classify(&body).unwrap();
        let (headers, token) = build_header_page(&doc).unwrap();

        assert_eq!(token.as_deref(), Some("more"));
        assert_eq!(headers.len(), 2);
        assert_eq!(headers[0].identifier, "oai:example:1");
        assert!(headers[1].deleted);
        assert_eq!(headers[0].format, "");
    }

    #[test]
    fn test_set_page_extraction() {
        let body = envelope(
            r#"<ListSets>
              <set>
                <setSpec>physics</setSpec>
                <setName>Physics</setName>
              </set>
              <set>
                <setSpec>physics:hep</setSpec>
                <setName>High Energy Physics</setName>
              </set>
            </ListSets>"#,
        );
        let doc = classify(&body).unwrap();
        let (sets, token) = build_set_page(&doc).unwrap();

        assert!(token.is_none());
        assert_eq!(sets.len(), 2);
        assert_eq!(sets[1].spec, "physics:hep");
        assert_eq!(sets[1].name, "High Energy Physics");
        assert!(sets[1].description.is_none());
    }

    #[test]
    fn test_metadata_format_extraction() {
        let body = envelope(
            r#"<ListMetadataFormats>
              <metadataFormat>
                <metadataPrefix>oai_dc</metadataPrefix>
                <schema>http://www.openarchives.org/OAI/2.0/oai_dc.xsd</schema>
                <metadataNamespace>http://www.openarchives.org/OAI/2.0/oai_dc/</metadataNamespace>
              </metadataFormat>
            </ListMetadataFormats>"#,
        );
        let doc = classify(&body).unwrap();
        let formats = build_metadata_formats(&doc).unwrap();
        assert_eq!(formats.len(), 1);
        assert_eq!(formats[0].prefix, "oai_dc");
        assert!(formats[0].schema.ends_with("oai_dc.xsd"));
    }

    #[test]
    fn test_about_section_is_carried() {
        let body = envelope(&format!(
            r#"<GetRecord>
              <record>
                <header>
                  <identifier>oai:example:1</identifier>
                  <datestamp>2006-04-12T13:05:59Z</datestamp>
                </header>
                {DC_METADATA}
                <about>rights statement</about>
              </record>
            </GetRecord>"#
        ));
        let doc = classify(&body).unwrap();
        let registry = MetadataRegistry::with_dublin_core();
        let record = build_single_record(&doc, "oai_dc", &registry).unwrap();
        assert_eq!(record.about.as_deref(), Some("rights statement"));
    }

    #[test]
    fn test_undecodable_datestamp_surfaces() {
        let body = envelope(
            r#"<ListIdentifiers>
              <header>
                <identifier>oai:example:1</identifier>
                <datestamp>last tuesday</datestamp>
              </header>
            </ListIdentifiers>"#,
        );
        let doc = classify(&body).unwrap();
        let err = build_header_page(&doc).unwrap_err();
        assert!(matches!(err, HarvestError::Datestamp(_)));
    }
}
