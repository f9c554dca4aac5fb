//! Protocol verbs, the per-verb argument legality table, and wire
//! normalization.
//!
//! The verb set is closed, so dispatch and legality are checked exhaustively
//! at compile time instead of resolved by name at runtime.

use chrono::{DateTime, Utc};

use crate::datestamp::{self, Granularity};
use crate::error::HarvestError;

/// The protocol's fixed operations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    Identify,
    GetRecord,
    ListIdentifiers,
    ListRecords,
    ListSets,
    ListMetadataFormats,
}

impl Verb {
    /// Protocol spelling used on the wire.
    pub fn wire_name(self) -> &'static str {
        match self {
            Verb::Identify => "Identify",
            Verb::GetRecord => "GetRecord",
            Verb::ListIdentifiers => "ListIdentifiers",
            Verb::ListRecords => "ListRecords",
            Verb::ListSets => "ListSets",
            Verb::ListMetadataFormats => "ListMetadataFormats",
        }
    }

    fn allowed(self) -> &'static [ArgKey] {
        use ArgKey::*;
        match self {
            Verb::Identify => &[],
            Verb::GetRecord => &[Identifier, MetadataPrefix],
            Verb::ListIdentifiers | Verb::ListRecords => {
                &[MetadataPrefix, Set, From, Until, ResumptionToken]
            }
            Verb::ListSets => &[ResumptionToken],
            Verb::ListMetadataFormats => &[Identifier],
        }
    }

    fn required(self) -> &'static [ArgKey] {
        use ArgKey::*;
        match self {
            Verb::GetRecord => &[Identifier, MetadataPrefix],
            Verb::ListIdentifiers | Verb::ListRecords => &[MetadataPrefix],
            _ => &[],
        }
    }
}

/// Argument slots a verb call can carry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ArgKey {
    Identifier,
    MetadataPrefix,
    Set,
    From,
    Until,
    ResumptionToken,
}

impl ArgKey {
    fn wire_name(self) -> &'static str {
        match self {
            ArgKey::Identifier => "identifier",
            ArgKey::MetadataPrefix => "metadataPrefix",
            ArgKey::Set => "set",
            ArgKey::From => "from",
            ArgKey::Until => "until",
            ArgKey::ResumptionToken => "resumptionToken",
        }
    }
}

/// Raw arguments of one verb call, before wire encoding.
///
/// The public client surface builds these from typed per-verb parameters;
/// the legality table below is what rejects combinations a verb does not
/// accept.
#[derive(Debug, Clone, Default)]
pub(crate) struct CallArguments {
    pub identifier: Option<String>,
    pub metadata_prefix: Option<String>,
    pub set: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
    pub resumption_token: Option<String>,
}

impl CallArguments {
    fn present(&self) -> Vec<ArgKey> {
        let mut keys = Vec::new();
        if self.identifier.is_some() {
            keys.push(ArgKey::Identifier);
        }
        if self.metadata_prefix.is_some() {
            keys.push(ArgKey::MetadataPrefix);
        }
        if self.set.is_some() {
            keys.push(ArgKey::Set);
        }
        if self.from.is_some() {
            keys.push(ArgKey::From);
        }
        if self.until.is_some() {
            keys.push(ArgKey::Until);
        }
        if self.resumption_token.is_some() {
            keys.push(ArgKey::ResumptionToken);
        }
        keys
    }
}

/// Typed arguments for the listing verbs.
#[derive(Debug, Clone)]
pub struct ListArguments {
    pub metadata_prefix: String,
    pub set: Option<String>,
    pub from: Option<DateTime<Utc>>,
    pub until: Option<DateTime<Utc>>,
}

impl ListArguments {
    pub fn new(metadata_prefix: impl Into<String>) -> Self {
        Self {
            metadata_prefix: metadata_prefix.into(),
            set: None,
            from: None,
            until: None,
        }
    }

    /// Restricts the harvest to one set.
    pub fn with_set(mut self, set: impl Into<String>) -> Self {
        self.set = Some(set.into());
        self
    }

    /// Lower datestamp bound, inclusive.
    pub fn with_from(mut self, from: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self
    }

    /// Upper datestamp bound, inclusive.
    pub fn with_until(mut self, until: DateTime<Utc>) -> Self {
        self.until = Some(until);
        self
    }

    pub(crate) fn into_call(self) -> CallArguments {
        CallArguments {
            metadata_prefix: Some(self.metadata_prefix),
            set: self.set,
            from: self.from,
            until: self.until,
            ..CallArguments::default()
        }
    }
}

/// Checks the fixed per-verb legality rules.
///
/// # Errors
///
/// [`HarvestError::BadArgument`] naming the verb and the offending or
/// missing argument. Runs before any encoding, so nothing touches the wire
/// for an illegal call.
pub(crate) fn check_arguments(verb: Verb, args: &CallArguments) -> Result<(), HarvestError> {
    let present = args.present();
    for key in &present {
        if !verb.allowed().contains(key) {
            return Err(HarvestError::BadArgument(format!(
                "{} does not accept '{}'",
                verb.wire_name(),
                key.wire_name()
            )));
        }
    }
    for key in verb.required() {
        if !present.contains(key) {
            return Err(HarvestError::BadArgument(format!(
                "{} requires '{}'",
                verb.wire_name(),
                key.wire_name()
            )));
        }
    }
    Ok(())
}

/// The wire form of a continuation request: the token replaces every other
/// argument, because the server remembers the original query bound to it.
pub(crate) fn token_request(verb: Verb, token: &str) -> Vec<(String, String)> {
    vec![
        ("verb".to_string(), verb.wire_name().to_string()),
        ("resumptionToken".to_string(), token.to_string()),
    ]
}

/// Converts a verb call into wire-ready key/value pairs.
///
/// Legality is checked first, date bounds are encoded at the negotiated
/// granularity, and a present continuation token collapses the request down
/// to itself. Pure; the caller's arguments are not mutated.
pub(crate) fn normalize(
    verb: Verb,
    args: &CallArguments,
    granularity: Granularity,
) -> Result<Vec<(String, String)>, HarvestError> {
    check_arguments(verb, args)?;

    if let Some(token) = &args.resumption_token {
        return Ok(token_request(verb, token));
    }

    let mut params = vec![("verb".to_string(), verb.wire_name().to_string())];
    if let Some(identifier) = &args.identifier {
        params.push(("identifier".to_string(), identifier.clone()));
    }
    if let Some(prefix) = &args.metadata_prefix {
        params.push(("metadataPrefix".to_string(), prefix.clone()));
    }
    if let Some(set) = &args.set {
        params.push(("set".to_string(), set.clone()));
    }
    if let Some(from) = &args.from {
        params.push(("from".to_string(), datestamp::encode(from, granularity)));
    }
    if let Some(until) = &args.until {
        params.push(("until".to_string(), datestamp::encode(until, granularity)));
    }
    Ok(params)
}

// ============================================================================
// Tests
// ============================================================================
