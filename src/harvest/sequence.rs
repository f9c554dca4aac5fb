//! Continuation-token pagination as a pull-based stream.
//!
//! A listing verb resolves to a [`ResumptionStream`]: items come out one at
//! a time, and the next page is fetched only once the current page is fully
//! consumed — never more than one page of lookahead, and no network activity
//! at all once the consumer stops pulling.

use std::collections::VecDeque;

use tracing::debug;

use crate::error::HarvestError;
use crate::harvest::client::Client;
use crate::harvest::verb::{token_request, Verb};

/// Classifies a page body into items plus the continuation token.
pub(crate) type PageBuilder<I> =
    Box<dyn Fn(&str) -> Result<(Vec<I>, Option<String>), HarvestError> + Send + Sync>;

/// Lazy, forward-only sequence of items spanning one or more pages.
///
/// The stream stops when a page comes back empty **or** without a
/// continuation token; both conditions are checked so a server that repeats
/// a token alongside an empty page cannot loop the harvest forever. A failed
/// page fetch is yielded once as an error and terminates the stream — a
/// partial harvest is never passed off as a complete one.
pub struct ResumptionStream<'c, I> {
    client: &'c Client,
    verb: Verb,
    /// Wire parameters of the next round trip; `None` once the sequence is
    /// exhausted (or failed).
    next_request: Option<Vec<(String, String)>>,
    buffer: VecDeque<I>,
    build: PageBuilder<I>,
}

impl<'c, I> ResumptionStream<'c, I> {
    pub(crate) fn new(
        client: &'c Client,
        verb: Verb,
        first_request: Vec<(String, String)>,
        build: PageBuilder<I>,
    ) -> Self {
        Self {
            client,
            verb,
            next_request: Some(first_request),
            buffer: VecDeque::new(),
            build,
        }
    }

    /// Whether another pull can still produce an item.
    ///
    /// `true` means buffered items remain or a page fetch is still pending;
    /// it does not promise the pending page is non-empty.
    pub fn has_more(&self) -> bool {
        !self.buffer.is_empty() || self.next_request.is_some()
    }

    /// Pulls the next item, fetching the next page at page boundaries.
    ///
    /// Transport and protocol failures surface here, at the point of
    /// iteration, and end the stream.
    pub async fn next(&mut self) -> Option<Result<I, HarvestError>> {
        loop {
            if let Some(item) = self.buffer.pop_front() {
                return Some(Ok(item));
            }
            let params = self.next_request.take()?;

            let body = match self.client.roundtrip(&params).await {
                Ok(body) => body,
                Err(e) => return Some(Err(e)),
            };
            let (items, token) = match (self.build)(&body) {
                Ok(page) => page,
                Err(e) => return Some(Err(e)),
            };

            debug!(
                verb = self.verb.wire_name(),
                items = items.len(),
                continued = token.is_some(),
                "page fetched"
            );

            // Continue only when this page produced items AND handed back a
            // token; an empty page ends the harvest even if a token came
            // with it.
            if !items.is_empty() {
                if let Some(token) = token {
                    self.next_request = Some(token_request(self.verb, &token));
                }
            }
            self.buffer.extend(items);

            if self.buffer.is_empty() && self.next_request.is_none() {
                return None;
            }
        }
    }

    /// Drains the stream, failing on the first error.
    pub async fn try_collect(mut self) -> Result<Vec<I>, HarvestError> {
        let mut items = Vec::new();
        while let Some(item) = self.next().await {
            items.push(item?);
        }
        Ok(items)
    }
}

// Stream behavior is exercised end-to-end through the client against a
// scripted delegate transport; see the tests in crate::harvest::client.
