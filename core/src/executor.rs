//! Execution of synthesized requests against the target API.
//!
//! # Design
//! `Transport` is the I/O seam: it turns an `HttpRequest` into an
//! `HttpResponse` and nothing more. `RequestExecutor` owns the status and
//! body policy on top of it, so the policy is testable with a canned
//! transport and the real network path is `UreqTransport`.

use std::time::Duration;

use serde_json::Value;
use tracing::{debug, warn};
use ureq::typestate::WithBody;

use crate::error::TransportError;
use crate::http::{HttpMethod, HttpRequest, HttpResponse};

/// Message returned to the user for any execution failure.
pub const EXECUTION_FAILED: &str = "An error occurred during the API request.";

/// Executes an `HttpRequest` and returns the response as data.
///
/// Implementations report non-2xx statuses as a normal `HttpResponse`; only
/// failures to complete the exchange are `Err`.
pub trait Transport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

impl<F> Transport for F
where
    F: Fn(&HttpRequest) -> Result<HttpResponse, TransportError>,
{
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        self(request)
    }
}

/// Blocking transport backed by a `ureq` agent.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    /// `timeout` bounds the whole exchange; `None` waits indefinitely.
    pub fn new(timeout: Option<Duration>) -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .timeout_global(timeout)
            .build()
            .new_agent();
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new(None)
    }
}

impl Transport for UreqTransport {
    fn send(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        let url = request.full_url();
        let body = match (&request.body, request.method.carries_body()) {
            (Some(body), true) => {
                Some(serde_json::to_vec(body).map_err(|e| TransportError::Decode(e.to_string()))?)
            }
            _ => None,
        };

        let agent = &self.agent;
        let headers = &request.headers;
        let result = match request.method {
            HttpMethod::Get => with_headers(agent.get(&url), headers).call(),
            HttpMethod::Delete => with_headers(agent.delete(&url), headers).call(),
            HttpMethod::Post => send_body(with_headers(agent.post(&url), headers), body.as_deref()),
            HttpMethod::Put => send_body(with_headers(agent.put(&url), headers), body.as_deref()),
            HttpMethod::Patch => send_body(with_headers(agent.patch(&url), headers), body.as_deref()),
        };

        let mut response = result?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .body_mut()
            .read_to_string()
            .map_err(|e| TransportError::Decode(e.to_string()))?;

        Ok(HttpResponse { status, headers, body })
    }
}

fn with_headers<B>(
    mut builder: ureq::RequestBuilder<B>,
    headers: &[(String, String)],
) -> ureq::RequestBuilder<B> {
    for (name, value) in headers {
        builder = builder.header(name.as_str(), value.as_str());
    }
    builder
}

fn send_body(
    builder: ureq::RequestBuilder<WithBody>,
    body: Option<&[u8]>,
) -> Result<ureq::http::Response<ureq::Body>, ureq::Error> {
    match body {
        Some(bytes) => builder.content_type("application/json").send(bytes),
        None => builder.send_empty(),
    }
}

/// Result of executing a synthesized request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExecutionOutcome {
    /// The response body, parsed and re-encoded as compact JSON.
    Success(String),
    /// User-facing failure message.
    Failure(String),
}

/// Runs requests through a `Transport` and normalizes the result.
#[derive(Debug, Clone, Default)]
pub struct RequestExecutor<T = UreqTransport> {
    transport: T,
}

impl<T: Transport> RequestExecutor<T> {
    pub fn new(transport: T) -> Self {
        Self { transport }
    }

    /// Non-2xx statuses, transport failures and non-JSON bodies all collapse
    /// into `EXECUTION_FAILED`; the underlying cause is only logged.
    pub fn execute(&self, request: &HttpRequest) -> ExecutionOutcome {
        debug!(method = %request.method, url = %request.full_url(), "executing API request");
        match self.fetch_json(request) {
            Ok(body) => ExecutionOutcome::Success(body),
            Err(err) => {
                warn!(url = %request.full_url(), error = %err, "API request failed");
                ExecutionOutcome::Failure(EXECUTION_FAILED.to_string())
            }
        }
    }

    fn fetch_json(&self, request: &HttpRequest) -> Result<String, TransportError> {
        let response = self.transport.send(request)?;
        check_status(&response)?;
        let value: Value = serde_json::from_str(&response.body)
            .map_err(|e| TransportError::Decode(e.to_string()))?;
        serde_json::to_string(&value).map_err(|e| TransportError::Decode(e.to_string()))
    }
}

/// Map non-success status codes to `TransportError::Status`.
fn check_status(response: &HttpResponse) -> Result<(), TransportError> {
    if response.is_success() {
        return Ok(());
    }
    Err(TransportError::Status {
        status: response.status,
        body: response.body.clone(),
    })
}
