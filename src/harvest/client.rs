//! The harvesting client: one operation per protocol verb.
//!
//! Every verb call runs the same cycle: normalize arguments → send with
//! retry → classify the response → build the verb's result. Single-object
//! verbs resolve directly; listing verbs hand back a [`ResumptionStream`]
//! that re-enters the cycle at each page boundary.

use std::sync::{Arc, OnceLock};

use tracing::{debug, info};

use crate::datestamp::Granularity;
use crate::error::HarvestError;
use crate::harvest::builders;
use crate::harvest::response::classify;
use crate::harvest::retry::{send_with_retry, RetryPolicy};
use crate::harvest::sequence::ResumptionStream;
use crate::harvest::transport::Transport;
use crate::harvest::verb::{normalize, CallArguments, ListArguments, Verb};
use crate::metadata::MetadataRegistry;
use crate::model::{Header, Identify, MetadataFormat, Record, Set};

/// A harvesting session against one repository.
///
/// The transport and codec registry are injected at construction; the
/// registry is shared read-only with every page fetch and can be shared
/// across concurrent sessions. One client is one logical thread of control —
/// nothing here runs in parallel internally.
pub struct Client {
    transport: Box<dyn Transport>,
    registry: Arc<MetadataRegistry>,
    retry: RetryPolicy,
    /// Granularity learned from the repository, set at most once.
    negotiated: OnceLock<Granularity>,
}

impl Client {
    pub fn new(transport: impl Transport + 'static, registry: MetadataRegistry) -> Self {
        Self {
            transport: Box::new(transport),
            registry: Arc::new(registry),
            retry: RetryPolicy::default(),
            negotiated: OnceLock::new(),
        }
    }

    /// Overrides the default wait-and-retry policy.
    #[must_use]
    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn registry(&self) -> &MetadataRegistry {
        &self.registry
    }

    /// Granularity used for encoding date filters.
    ///
    /// Defaults to [`Granularity::Second`] until negotiated; a day-only
    /// repository may reject second-encoded filters, so callers using
    /// `from`/`until` should negotiate first.
    pub fn granularity(&self) -> Granularity {
        self.negotiated.get().copied().unwrap_or(Granularity::Second)
    }

    /// Learns the repository's datestamp granularity from its
    /// self-description and caches it for the life of the client.
    ///
    /// # Errors
    ///
    /// [`HarvestError::UnsupportedGranularity`] when the repository reports
    /// a pattern outside the protocol's two standard ones.
    pub async fn negotiate_granularity(&self) -> Result<Granularity, HarvestError> {
        if let Some(granularity) = self.negotiated.get() {
            return Ok(*granularity);
        }
        let identify = self.identify().await?;
        let granularity = Granularity::from_wire(&identify.granularity)
            .ok_or_else(|| HarvestError::UnsupportedGranularity(identify.granularity.clone()))?;
        let _ = self.negotiated.set(granularity);
        info!(granularity = %identify.granularity, "granularity negotiated");
        Ok(granularity)
    }

    /// One classified round trip: send with retry, return the body text.
    pub(crate) async fn roundtrip(&self, params: &[(String, String)]) -> Result<String, HarvestError> {
        debug!(?params, "issuing request");
        let body = send_with_retry(self.transport.as_ref(), params, &self.retry).await?;
        Ok(String::from_utf8_lossy(&body).into_owned())
    }

    async fn call(&self, verb: Verb, args: CallArguments) -> Result<String, HarvestError> {
        let params = normalize(verb, &args, self.granularity())?;
        self.roundtrip(&params).await
    }

    /// Fetches the repository self-description.
    pub async fn identify(&self) -> Result<Identify, HarvestError> {
        let body = self.call(Verb::Identify, CallArguments::default()).await?;
        let doc = classify(&body)?;
        builders::build_identify(&doc)
    }

    /// Fetches a single record.
    pub async fn get_record(
        &self,
        identifier: &str,
        metadata_prefix: &str,
    ) -> Result<Record, HarvestError> {
        let args = CallArguments {
            identifier: Some(identifier.to_string()),
            metadata_prefix: Some(metadata_prefix.to_string()),
            ..CallArguments::default()
        };
        let body = self.call(Verb::GetRecord, args).await?;
        let doc = classify(&body)?;
        builders::build_single_record(&doc, metadata_prefix, &self.registry)
    }

    /// Lists the metadata formats the repository can disseminate, optionally
    /// restricted to those available for one item.
    pub async fn list_metadata_formats(
        &self,
        identifier: Option<&str>,
    ) -> Result<Vec<MetadataFormat>, HarvestError> {
        let args = CallArguments {
            identifier: identifier.map(str::to_string),
            ..CallArguments::default()
        };
        let body = self.call(Verb::ListMetadataFormats, args).await?;
        let doc = classify(&body)?;
        builders::build_metadata_formats(&doc)
    }

    /// Lazily lists item headers matching the arguments.
    ///
    /// Argument legality is checked up front; page fetches happen as the
    /// stream is pulled.
    pub fn list_identifiers(
        &self,
        args: ListArguments,
    ) -> Result<ResumptionStream<'_, Header>, HarvestError> {
        let params = normalize(Verb::ListIdentifiers, &args.into_call(), self.granularity())?;
        let build = Box::new(move |body: &str| {
            let doc = classify(body)?;
            builders::build_header_page(&doc)
        });
        Ok(ResumptionStream::new(
            self,
            Verb::ListIdentifiers,
            params,
            build,
        ))
    }

    /// Lazily lists full records matching the arguments, decoding payloads
    /// through the codec registry.
    pub fn list_records(
        &self,
        args: ListArguments,
    ) -> Result<ResumptionStream<'_, Record>, HarvestError> {
        let requested_prefix = args.metadata_prefix.clone();
        let params = normalize(Verb::ListRecords, &args.into_call(), self.granularity())?;
        let registry = Arc::clone(&self.registry);
        let build = Box::new(move |body: &str| {
            let doc = classify(body)?;
            builders::build_record_page(&doc, &requested_prefix, &registry)
        });
        Ok(ResumptionStream::new(self, Verb::ListRecords, params, build))
    }

    /// Lazily lists the repository's sets.
    pub fn list_sets(&self) -> Result<ResumptionStream<'_, Set>, HarvestError> {
        let params = normalize(Verb::ListSets, &CallArguments::default(), self.granularity())?;
        let build = Box::new(move |body: &str| {
            let doc = classify(body)?;
            builders::build_set_page(&doc)
        });
        Ok(ResumptionStream::new(self, Verb::ListSets, params, build))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::harvest::response::ProtocolError;
    use crate::harvest::transport::{DelegateTransport, TransportError, TransportResponse};
    use std::collections::VecDeque;
    use std::sync::Mutex;

    /// Delegate transport that plays back scripted bodies and records every
    /// request it sees.
    struct Script {
        bodies: Mutex<VecDeque<TransportResponse>>,
        seen: Arc<Mutex<Vec<Vec<(String, String)>>>>,
    }

    fn scripted_client(
        bodies: Vec<TransportResponse>,
    ) -> (Client, Arc<Mutex<Vec<Vec<(String, String)>>>>) {
        let script = Script {
            bodies: Mutex::new(bodies.into()),
            seen: Arc::new(Mutex::new(Vec::new())),
        };
        let seen = Arc::clone(&script.seen);
        let transport = DelegateTransport::new(move |params: &[(String, String)]| {
            script.seen.lock().unwrap().push(params.to_vec());
            script
                .bodies
                .lock()
                .unwrap()
                .pop_front()
                .ok_or_else(|| {
                    // An Io error propagates without retry sleeps.
                    TransportError::Io(std::io::Error::other("script exhausted"))
                })
        });
        let client = Client::new(transport, MetadataRegistry::with_dublin_core());
        (client, seen)
    }

    fn envelope(inner: &str) -> TransportResponse {
        TransportResponse::ok(format!(
            r#"<?xml version="1.0"?>
<OAI-PMH xmlns="http://www.openarchives.org/OAI/2.0/">
  <responseDate>2006-04-12T13:05:59Z</responseDate>
  {inner}
</OAI-PMH>"#
        ))
    }

    fn identify_body(granularity: &str) -> TransportResponse {
        envelope(&format!(
            r#"<Identify>
              <repositoryName>Example Archive</repositoryName>
              <baseURL>http://example.org/oai</baseURL>
              <protocolVersion>2.0</protocolVersion>
              <adminEmail>admin@example.org</adminEmail>
              <earliestDatestamp>1998-01-01</earliestDatestamp>
              <deletedRecord>no</deletedRecord>
              <granularity>{granularity}</granularity>
            </Identify>"#
        ))
    }

    fn header_page(identifiers: &[&str], token: Option<&str>) -> TransportResponse {
        let headers: String = identifiers
            .iter()
            .map(|id| {
                format!(
                    "<header><identifier>{id}</identifier>\
                     <datestamp>2006-04-12</datestamp></header>"
                )
            })
            .collect();
        let token = token
            .map(|t| format!("<resumptionToken>{t}</resumptionToken>"))
            .unwrap_or_default();
        envelope(&format!("<ListIdentifiers>{headers}{token}</ListIdentifiers>"))
    }

    async fn collect_identifiers(
        stream: &mut ResumptionStream<'_, Header>,
    ) -> Result<Vec<String>, HarvestError> {
        let mut out = Vec::new();
        while let Some(item) = stream.next().await {
            out.push(item?.identifier);
        }
        Ok(out)
    }

    #[tokio::test]
    async fn test_pagination_across_three_pages() {
        let (client, seen) = scripted_client(vec![
            header_page(&["a", "b"], Some("T1")),
            header_page(&["c"], Some("T2")),
            header_page(&[], None),
        ]);

        let mut stream = client
            .list_identifiers(ListArguments::new("oai_dc"))
            .unwrap();
        let ids = collect_identifiers(&mut stream).await.unwrap();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert!(!stream.has_more());

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 3);
        // Continuation requests carry only the verb and the token.
        assert_eq!(
            seen[1],
            vec![
                ("verb".to_string(), "ListIdentifiers".to_string()),
                ("resumptionToken".to_string(), "T1".to_string()),
            ]
        );
        assert_eq!(seen[2][1].1, "T2");
    }

    #[tokio::test]
    async fn test_repeated_token_with_empty_page_terminates() {
        let (client, seen) = scripted_client(vec![
            header_page(&["a"], Some("T1")),
            header_page(&[], Some("T1")),
        ]);

        let mut stream = client
            .list_identifiers(ListArguments::new("oai_dc"))
            .unwrap();
        let ids = collect_identifiers(&mut stream).await.unwrap();
        assert_eq!(ids, vec!["a"]);
        // The empty page ends the harvest despite its token; no third fetch.
        assert_eq!(seen.lock().unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_mid_sequence_protocol_error_aborts_stream() {
        let (client, _) = scripted_client(vec![
            header_page(&["a"], Some("T1")),
            envelope(r#"<error code="badResumptionToken">expired</error>"#),
        ]);

        let mut stream = client
            .list_identifiers(ListArguments::new("oai_dc"))
            .unwrap();
        assert_eq!(
            stream.next().await.unwrap().unwrap().identifier,
            "a".to_string()
        );
        let err = stream.next().await.unwrap().unwrap_err();
        assert!(matches!(
            err,
            HarvestError::Protocol(ProtocolError::BadResumptionToken(_))
        ));
        // The failure terminated the sequence.
        assert!(stream.next().await.is_none());
        assert!(!stream.has_more());
    }

    #[tokio::test]
    async fn test_negotiated_granularity_drives_date_encoding() {
        let (client, seen) = scripted_client(vec![
            identify_body("YYYY-MM-DD"),
            header_page(&[], None),
        ]);

        let granularity = client.negotiate_granularity().await.unwrap();
        assert_eq!(granularity, Granularity::Day);
        assert_eq!(client.granularity(), Granularity::Day);

        let args = ListArguments::new("oai_dc").with_from(
            chrono::TimeZone::with_ymd_and_hms(&chrono::Utc, 2006, 1, 1, 12, 30, 0).unwrap(),
        );
        let mut stream = client.list_identifiers(args).unwrap();
        while let Some(item) = stream.next().await {
            item.unwrap();
        }

        let seen = seen.lock().unwrap();
        let list_request = &seen[1];
        assert!(list_request.contains(&("from".to_string(), "2006-01-01".to_string())));
    }

    #[tokio::test]
    async fn test_negotiation_is_cached() {
        let (client, seen) = scripted_client(vec![identify_body("YYYY-MM-DDThh:mm:ssZ")]);

        assert_eq!(
            client.negotiate_granularity().await.unwrap(),
            Granularity::Second
        );
        assert_eq!(
            client.negotiate_granularity().await.unwrap(),
            Granularity::Second
        );
        // Second call answered from the cache, not the wire.
        assert_eq!(seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_nonstandard_granularity_is_rejected() {
        let (client, _) = scripted_client(vec![identify_body("YYYY")]);
        let err = client.negotiate_granularity().await.unwrap_err();
        assert!(matches!(
            err,
            HarvestError::UnsupportedGranularity(pattern) if pattern == "YYYY"
        ));
    }

    #[tokio::test]
    async fn test_get_record_end_to_end() {
        let (client, seen) = scripted_client(vec![envelope(
            r#"<GetRecord>
              <record>
                <header>
                  <identifier>oai:example:1</identifier>
                  <datestamp>2006-04-12T13:05:59Z</datestamp>
                </header>
                <metadata>
                  <oai_dc:dc xmlns:oai_dc="http://www.openarchives.org/OAI/2.0/oai_dc/"
                             xmlns:dc="http://purl.org/dc/elements/1.1/">
                    <dc:title>On Harvesting</dc:title>
                  </oai_dc:dc>
                </metadata>
              </record>
            </GetRecord>"#,
        )]);

        let record = client.get_record("oai:example:1", "oai_dc").await.unwrap();
        assert_eq!(record.header.identifier, "oai:example:1");
        assert_eq!(
            record.metadata.unwrap().text("title"),
            Some("On Harvesting")
        );

        let seen = seen.lock().unwrap();
        assert!(seen[0].contains(&("identifier".to_string(), "oai:example:1".to_string())));
        assert!(seen[0].contains(&("metadataPrefix".to_string(), "oai_dc".to_string())));
    }

    #[tokio::test]
    async fn test_list_metadata_formats_end_to_end() {
        let (client, _) = scripted_client(vec![envelope(
            r#"<ListMetadataFormats>
              <metadataFormat>
                <metadataPrefix>oai_dc</metadataPrefix>
                <schema>http://www.openarchives.org/OAI/2.0/oai_dc.xsd</schema>
                <metadataNamespace>http://www.openarchives.org/OAI/2.0/oai_dc/</metadataNamespace>
              </metadataFormat>
            </ListMetadataFormats>"#,
        )]);

        let formats = client.list_metadata_formats(None).await.unwrap();
        assert_eq!(formats.len(), 1);
        assert_eq!(formats[0].prefix, "oai_dc");
    }

    #[tokio::test]
    async fn test_no_records_match_via_404_envelope() {
        let mut response = envelope(r#"<error code="noRecordsMatch"></error>"#);
        response.status = 404;
        let (client, _) = scripted_client(vec![response]);

        let mut stream = client
            .list_records(ListArguments::new("oai_dc"))
            .unwrap();
        let err = stream.next().await.unwrap().unwrap_err();
        assert!(matches!(
            err,
            HarvestError::Protocol(ProtocolError::NoRecordsMatch(_))
        ));
    }

    #[tokio::test]
    async fn test_list_sets_end_to_end() {
        let (client, _) = scripted_client(vec![envelope(
            r#"<ListSets>
              <set><setSpec>physics</setSpec><setName>Physics</setName></set>
            </ListSets>"#,
        )]);

        let sets = client.list_sets().unwrap().try_collect().await.unwrap();
        assert_eq!(sets.len(), 1);
        assert_eq!(sets[0].spec, "physics");
    }

    #[tokio::test]
    async fn test_listing_is_lazy_until_first_pull() {
        let (client, seen) = scripted_client(vec![header_page(&["a"], None)]);

        let mut stream = client
            .list_identifiers(ListArguments::new("oai_dc"))
            .unwrap();
        // Constructing the stream validates arguments but touches no wire.
        assert!(seen.lock().unwrap().is_empty());
        assert!(stream.has_more());

        stream.next().await.unwrap().unwrap();
        assert_eq!(seen.lock().unwrap().len(), 1);
    }
}
