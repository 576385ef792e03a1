//! Blocking reqwest transport.
//!
//! Automatic redirects are disabled on the client so the hop limit and the
//! retry classification stay under our control. The client's pool keeps one
//! keep-alive connection per (scheme, host, port) and opens a fresh one when
//! a request goes to a different destination.
//!
//! The timeout bounds connecting and waiting for the response head. Download
//! bodies are read through [`std::io::Read`], where it applies to each read,
//! so only a stalled transfer is aborted, never a slow but steady one. JSON
//! bodies are small and keep the timeout as a deadline for the whole body.

use std::io::Read;
use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{CONTENT_TYPE, LOCATION};
use reqwest::redirect::Policy;
use reqwest::{StatusCode, Url};
use serde_json::Value;

use super::retry::RetryPolicy;
use super::{HttpTransport, Method};
use crate::error::{MirrorError, MirrorResult};

/// Default per-request timeout in seconds.
pub const DEFAULT_TIMEOUT_SECS: u64 = 30;

/// Maximum number of redirects followed for one download.
pub const MAX_REDIRECTS: usize = 5;

/// HTTP transport backed by `reqwest::blocking`.
#[derive(Debug)]
pub struct ReqwestTransport {
    client: Client,
    timeout: Duration,
    retry: RetryPolicy,
}

impl ReqwestTransport {
    /// Create a transport with the default timeout and retry policy.
    pub fn new() -> MirrorResult<Self> {
        Self::with_settings(
            Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            RetryPolicy::default(),
        )
    }

    /// Create a transport with a custom timeout and retry policy.
    pub fn with_settings(timeout: Duration, retry: RetryPolicy) -> MirrorResult<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .connect_timeout(timeout)
            .redirect(Policy::none())
            .build()
            .map_err(|e| {
                MirrorError::InvalidConfig(format!("failed to create HTTP client: {}", e))
            })?;

        Ok(Self {
            client,
            timeout,
            retry,
        })
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        self.retry
    }

    /// One GET attempt, following up to [`MAX_REDIRECTS`] redirects.
    fn fetch_once(&self, url: &str) -> MirrorResult<Vec<u8>> {
        let mut current = parse_url(url)?;
        let mut hops = 0;

        loop {
            let response = self
                .client
                .get(current.clone())
                .send()
                .map_err(|source| MirrorError::Http {
                    url: current.to_string(),
                    source,
                })?;
            let status = response.status();

            if is_redirect(status) {
                if hops >= MAX_REDIRECTS {
                    return Err(MirrorError::TooManyRedirects {
                        url: url.to_string(),
                    });
                }
                let location = response
                    .headers()
                    .get(LOCATION)
                    .and_then(|v| v.to_str().ok())
                    .ok_or_else(|| MirrorError::MissingLocation {
                        url: current.to_string(),
                    })?;
                // Url::join inherits scheme and host for relative locations.
                let next = current
                    .join(location)
                    .map_err(|e| MirrorError::InvalidUrl {
                        url: location.to_string(),
                        reason: e.to_string(),
                    })?;
                tracing::debug!(from = %current, to = %next, "Following redirect");
                current = next;
                hops += 1;
                continue;
            }

            if status != StatusCode::OK {
                return Err(MirrorError::Remote {
                    url: current.to_string(),
                    status: status.as_u16(),
                });
            }

            let mut response = response;
            let mut body = Vec::new();
            response
                .read_to_end(&mut body)
                .map_err(|source| MirrorError::Body {
                    url: current.to_string(),
                    source,
                })?;
            return Ok(body);
        }
    }

    /// One JSON request attempt.
    fn request_json_once(
        &self,
        method: Method,
        url: &Url,
        body: Option<&[u8]>,
        headers: &[(&str, String)],
    ) -> MirrorResult<Value> {
        let mut request = match method {
            Method::Get => self.client.get(url.clone()),
            Method::Post => self.client.post(url.clone()),
        };
        for (name, value) in headers {
            request = request.header(*name, value.as_str());
        }
        if let Some(body) = body {
            request = request
                .header(CONTENT_TYPE, "application/json")
                .body(body.to_vec());
        }

        let response = request.send().map_err(|source| MirrorError::Http {
            url: url.to_string(),
            source,
        })?;

        let status = response.status();
        if status != StatusCode::OK {
            return Err(MirrorError::Remote {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        let bytes = response.bytes().map_err(|source| MirrorError::Http {
            url: url.to_string(),
            source,
        })?;
        serde_json::from_slice(&bytes).map_err(|e| MirrorError::Decode {
            endpoint: url.to_string(),
            reason: e.to_string(),
        })
    }
}

impl HttpTransport for ReqwestTransport {
    fn fetch(&self, url: &str) -> MirrorResult<Vec<u8>> {
        self.retry.run(url, || self.fetch_once(url))
    }

    fn request_json(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        headers: &[(&str, String)],
    ) -> MirrorResult<Value> {
        let parsed = parse_url(url)?;
        let body = body
            .map(serde_json::to_vec)
            .transpose()
            .map_err(|e| MirrorError::Decode {
                endpoint: url.to_string(),
                reason: e.to_string(),
            })?;
        self.retry.run(url, || {
            self.request_json_once(method, &parsed, body.as_deref(), headers)
        })
    }
}

fn is_redirect(status: StatusCode) -> bool {
    matches!(status.as_u16(), 301 | 302 | 303 | 307 | 308)
}

fn parse_url(url: &str) -> MirrorResult<Url> {
    Url::parse(url).map_err(|e| MirrorError::InvalidUrl {
        url: url.to_string(),
        reason: e.to_string(),
    })
}
