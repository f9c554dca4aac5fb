//! Harvest module - the protocol engine.
//!
//! This module provides the core machinery of a harvesting session:
//! - **Verbs**: closed operation set and argument rules via [`Verb`] and
//!   [`ListArguments`]
//! - **Transport**: the wire seam via [`Transport`] and its implementations
//! - **Retry**: bounded wait-and-retry via [`RetryPolicy`]
//! - **Pagination**: continuation-token streaming via [`ResumptionStream`]
//! - **Client**: one operation per verb via [`Client`]

pub(crate) mod builders;
pub mod client;
pub mod response;
pub mod retry;
pub mod sequence;
pub mod transport;
pub mod verb;

// Re-export commonly used types
pub use client::Client;
pub use response::ProtocolError;
pub use retry::{RetryPolicy, WAIT_DEFAULT, WAIT_MAX};
pub use sequence::ResumptionStream;
pub use transport::{
    DelegateTransport, FileTransport, HttpTransport, Transport, TransportError, TransportResponse,
};
pub use verb::{ListArguments, Verb};
