//! Transport seam between the engine and the outside world.
//!
//! The engine only ever sees [`Transport`]: one request out, one raw response
//! back. Everything about connections, authentication, and compression stays
//! behind this trait. Three implementations ship:
//! - [`HttpTransport`] — live harvesting over HTTP
//! - [`FileTransport`] — replays one captured response document
//! - [`DelegateTransport`] — hands requests to an in-process function, which
//!   is both the server-side delegate and the test harness

use std::collections::HashMap;
use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

/// Errors raised at the transport layer.
#[derive(Error, Debug)]
pub enum TransportError {
    /// The connection could not be established or broke mid-response.
    /// Retried against the attempt budget.
    #[error("connection failed: {0}")]
    Connect(String),

    /// A status code the protocol engine does not accept. Never retried.
    #[error("unexpected HTTP status {status}")]
    UnexpectedStatus { status: u16 },

    /// The bounded retry budget ran out
    #[error("retry budget exhausted after {attempts} attempts")]
    RetryExhausted { attempts: u32 },

    /// Local I/O failure (file transport)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// One raw wire response.
#[derive(Debug, Clone)]
pub struct TransportResponse {
    pub status: u16,

    /// Response headers with lowercase names
    pub headers: HashMap<String, String>,

    pub body: Vec<u8>,
}

impl TransportResponse {
    /// A plain 200 response carrying `body`, for delegates and tests.
    pub fn ok(body: impl Into<Vec<u8>>) -> Self {
        Self {
            status: 200,
            headers: HashMap::new(),
            body: body.into(),
        }
    }
}

/// Executes one wire round trip for a normalized set of request parameters.
///
/// Implementations must be `Send + Sync`; a transport is shared by every
/// page fetch of a harvesting session.
#[async_trait]
pub trait Transport: Send + Sync {
    /// # Errors
    ///
    /// [`TransportError::Connect`] for connectivity failures; status-code
    /// handling is the retry wrapper's job, so non-2xx responses are returned
    /// as ordinary [`TransportResponse`] values, not errors.
    async fn execute(
        &self,
        params: &[(String, String)],
    ) -> Result<TransportResponse, TransportError>;
}

// ============================================================================
// HTTP Transport
// ============================================================================

/// Live HTTP transport.
///
/// Requests go out form-encoded via POST by default; some repositories only
/// speak GET, which [`HttpTransport::with_get_method`] switches to.
/// Credentials attach as an opaque basic-auth header. Extra parameters are
/// merged into every request, after the engine's own.
pub struct HttpTransport {
    base_url: String,
    http: reqwest::Client,
    credentials: Option<(String, String)>,
    use_get: bool,
    extra_parameters: Vec<(String, String)>,
}

impl HttpTransport {
    /// # Errors
    ///
    /// [`TransportError::Connect`] if the underlying HTTP client cannot be
    /// built (TLS backend initialization).
    pub fn new(base_url: impl Into<String>) -> Result<Self, TransportError> {
        let http = reqwest::Client::builder()
            .user_agent(concat!("oai-harvester/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| TransportError::Connect(e.to_string()))?;
        Ok(Self {
            base_url: base_url.into(),
            http,
            credentials: None,
            use_get: false,
            extra_parameters: Vec::new(),
        })
    }

    /// Attaches basic-auth credentials to every request.
    pub fn with_credentials(
        mut self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        self.credentials = Some((username.into(), password.into()));
        self
    }

    /// Sends requests as GET with query parameters instead of a POST form.
    pub fn with_get_method(mut self, use_get: bool) -> Self {
        self.use_get = use_get;
        self
    }

    /// Adds a parameter sent with every request, e.g. an API key.
    pub fn with_extra_parameter(
        mut self,
        key: impl Into<String>,
        value: impl Into<String>,
    ) -> Self {
        self.extra_parameters.push((key.into(), value.into()));
        self
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn execute(
        &self,
        params: &[(String, String)],
    ) -> Result<TransportResponse, TransportError> {
        let mut form: Vec<(String, String)> = params.to_vec();
        form.extend(self.extra_parameters.iter().cloned());

        let request = if self.use_get {
            self.http.get(&self.base_url).query(&form)
        } else {
            self.http.post(&self.base_url).form(&form)
        };
        let request = match &self.credentials {
            Some((user, pass)) => request.basic_auth(user, Some(pass)),
            None => request,
        };

        let response = request
            .send()
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_ascii_lowercase(), v.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| TransportError::Connect(e.to_string()))?
            .to_vec();

        Ok(TransportResponse {
            status,
            headers,
            body,
        })
    }
}

// ============================================================================
// File Transport
// ============================================================================

/// Replays a single captured response document.
///
/// Every request resolves to the same file's bytes, which is what offline
/// reprocessing of one saved response needs. For whole directories of
/// captures, see [`crate::archive`].
pub struct FileTransport {
    path: PathBuf,
}

impl FileTransport {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl Transport for FileTransport {
    async fn execute(
        &self,
        _params: &[(String, String)],
    ) -> Result<TransportResponse, TransportError> {
        let body = tokio::fs::read(&self.path).await?;
        Ok(TransportResponse::ok(body))
    }
}

// ============================================================================
// Delegate Transport
// ============================================================================

/// Routes requests to an in-process handler function.
///
/// This is the symmetric server-side counterpart of the HTTP transport: a
/// server implementation (or a test fixture) answers the same normalized
/// request the wire would carry, without a network in between.
pub struct DelegateTransport<F> {
    handler: F,
}

impl<F> DelegateTransport<F>
where
    F: Fn(&[(String, String)]) -> Result<TransportResponse, TransportError> + Send + Sync,
{
    pub fn new(handler: F) -> Self {
        Self { handler }
    }
}

#[async_trait]
impl<F> Transport for DelegateTransport<F>
where
    F: Fn(&[(String, String)]) -> Result<TransportResponse, TransportError> + Send + Sync,
{
    async fn execute(
        &self,
        params: &[(String, String)],
    ) -> Result<TransportResponse, TransportError> {
        (self.handler)(params)
    }
}

// ============================================================================
// Tests
// ============================================================================
