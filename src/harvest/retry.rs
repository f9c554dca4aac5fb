//! Wait-and-retry policy around the transport.
//!
//! This is the only place in the engine that sleeps. Server errors and
//! connectivity failures share one bounded attempt budget; each wait is
//! either the server's `Retry-After` hint or a fixed default. Everything
//! else — malformed bodies, protocol errors, client errors — passes through
//! untouched, because retrying a request the server answered definitively
//! cannot help.

use std::time::Duration;

use tracing::{debug, warn};

use crate::harvest::transport::{Transport, TransportError};

/// Default wait between attempts when the server gives no hint: four minutes.
pub const WAIT_DEFAULT: Duration = Duration::from_secs(240);

/// Default bound on attempts before giving up.
pub const WAIT_MAX: u32 = 64;

/// Configuration for the retry loop.
///
/// The wait is fixed per attempt, not an escalating backoff; repositories
/// that want a different pace say so through `Retry-After`.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    /// Maximum number of wire attempts
    pub max_attempts: u32,

    /// Wait between attempts when the response carries no `Retry-After` hint
    pub default_wait: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: WAIT_MAX,
            default_wait: WAIT_DEFAULT,
        }
    }
}

impl RetryPolicy {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    #[must_use]
    pub fn with_default_wait(mut self, default_wait: Duration) -> Self {
        self.default_wait = default_wait;
        self
    }
}

/// Parses a `Retry-After` header value.
///
/// Integer delay-seconds only; HTTP-date values fall back to the default
/// wait.
pub(crate) fn parse_retry_after(value: &str) -> Option<Duration> {
    value.trim().parse::<u64>().ok().map(Duration::from_secs)
}

/// Executes one logical request, retrying per policy, and returns the raw
/// response body.
///
/// - 2xx: body returned immediately.
/// - 5xx: wait (`Retry-After` hint or default) and retry.
/// - 404: some repositories answer "no matching records" as a 404 whose body
///   is a valid protocol-error envelope. A body containing the protocol root
///   element is forwarded as success so classification can surface the real
///   error; anything else is a transport failure.
/// - other non-2xx: propagated immediately, a malformed request will not
///   succeed on retry.
/// - connectivity failures: wait the default and retry, against the same
///   attempt budget.
///
/// # Errors
///
/// [`TransportError::RetryExhausted`] once the attempt budget is spent;
/// otherwise the terminal transport error.
pub(crate) async fn send_with_retry(
    transport: &dyn Transport,
    params: &[(String, String)],
    policy: &RetryPolicy,
) -> Result<Vec<u8>, TransportError> {
    for attempt in 1..=policy.max_attempts {
        match transport.execute(params).await {
            Ok(response) => match response.status {
                200..=299 => return Ok(response.body),
                status if status >= 500 => {
                    let wait = response
                        .headers
                        .get("retry-after")
                        .and_then(|v| parse_retry_after(v))
                        .unwrap_or(policy.default_wait);
                    warn!(
                        status,
                        attempt,
                        wait_secs = wait.as_secs(),
                        "server error, waiting before retry"
                    );
                    tokio::time::sleep(wait).await;
                }
                404 => {
                    let body = String::from_utf8_lossy(&response.body);
                    if body.contains("<OAI-PMH") {
                        debug!("404 carried a protocol envelope, forwarding as response");
                        return Ok(response.body);
                    }
                    return Err(TransportError::UnexpectedStatus { status: 404 });
                }
                status => return Err(TransportError::UnexpectedStatus { status }),
            },
            Err(TransportError::Connect(reason)) => {
                warn!(%reason, attempt, "connection failure, waiting before retry");
                tokio::time::sleep(policy.default_wait).await;
            }
            Err(other) => return Err(other),
        }
    }
    Err(TransportError::RetryExhausted {
        attempts: policy.max_attempts,
    })
}

// ============================================================================
// Tests
// ============================================================================
