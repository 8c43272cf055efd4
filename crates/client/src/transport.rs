//! Transport seam: performs one HTTP GET and hands back the raw body.
//!
//! [`HttpTransport`] is the production implementation on top of
//! `reqwest` (gzip decoding handled by the client). Tests substitute their
//! own [`Transport`] to script responses.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use ps_domain::config::ClientConfig;
use ps_domain::error::{Error, Result};
use ps_domain::trace::TraceEvent;
use ps_protocol::Operation;
use reqwest::Client;

/// One fully-encoded request, ready to send.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub operation: Operation,
    pub channel: Option<String>,
    pub url: String,
    pub headers: Vec<(String, String)>,
    /// `None` leaves the request open as long as the service holds it.
    pub timeout: Option<Duration>,
}

/// Abstraction over the HTTP stack.
///
/// Implementations must return the decoded (un-gzipped) body for 2xx
/// responses and an error for everything else.
#[async_trait]
pub trait Transport: Send + Sync {
    async fn perform_request(&self, request: &HttpRequest) -> Result<Vec<u8>>;
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// reqwest implementation
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// `reqwest`-backed transport.
///
/// Created once per client; the underlying `reqwest::Client` keeps a
/// connection pool shared by every channel worker.
#[derive(Debug, Clone)]
pub struct HttpTransport {
    http: Client,
}

impl HttpTransport {
    pub fn new(cfg: &ClientConfig) -> Result<Self> {
        let http = Client::builder()
            .user_agent(cfg.user_agent.clone())
            .gzip(true)
            .build()
            .map_err(|e| Error::Http(e.to_string()))?;
        Ok(Self { http })
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn perform_request(&self, request: &HttpRequest) -> Result<Vec<u8>> {
        let mut rb = self.http.get(&request.url);
        for (name, value) in &request.headers {
            rb = rb.header(name.as_str(), value.as_str());
        }
        if let Some(timeout) = request.timeout {
            rb = rb.timeout(timeout);
        }

        let start = Instant::now();
        let result = rb.send().await;
        let duration_ms = start.elapsed().as_millis() as u64;

        let resp = match result {
            Ok(resp) => resp,
            Err(e) => {
                emit_completed(request, false, duration_ms);
                return Err(from_reqwest(e));
            }
        };

        let status = resp.status();
        let ok = status.is_success();
        emit_completed(request, ok, duration_ms);

        if !ok {
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Http(format!(
                "{} returned {}: {body}",
                request.operation,
                status.as_u16()
            )));
        }

        let bytes = resp.bytes().await.map_err(from_reqwest)?;
        Ok(bytes.to_vec())
    }
}

fn emit_completed(request: &HttpRequest, ok: bool, duration_ms: u64) {
    TraceEvent::RequestCompleted {
        operation: request.operation.to_string(),
        channel: request.channel.clone(),
        ok,
        duration_ms,
    }
    .emit();
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Error conversion helper
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Convert a `reqwest::Error` into a domain `Error`.
///
/// Timeout errors become `Error::Timeout`; everything else becomes
/// `Error::Http`.
pub fn from_reqwest(e: reqwest::Error) -> Error {
    if e.is_timeout() {
        Error::Timeout(e.to_string())
    } else {
        Error::Http(e.to_string())
    }
}
