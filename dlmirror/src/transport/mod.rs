//! HTTP transport with manual redirects and bounded retry.
//!
//! The [`HttpTransport`] trait is the seam every other component talks to,
//! so the sync pipeline can be driven by an in-memory transport in tests.
//!
//! # Failure policy
//!
//! ```text
//! 200                      -> body
//! 301/302/303/307/308      -> follow Location (max 5 hops), else TooManyRedirects
//! any other status         -> Remote error, never retried
//! connect/reset/timeout    -> retried, up to 25 attempts in total
//! ```

mod http;
mod retry;

#[cfg(test)]
pub(crate) mod mock;

pub use http::{ReqwestTransport, DEFAULT_TIMEOUT_SECS, MAX_REDIRECTS};
pub use retry::{RetryPolicy, DEFAULT_MAX_ATTEMPTS};

use serde_json::Value;

use crate::error::MirrorResult;

/// HTTP method used for JSON API calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Method {
    Get,
    Post,
}

/// Blocking HTTP operations needed by the mirror.
pub trait HttpTransport {
    /// Download the body of `url`, following redirects.
    fn fetch(&self, url: &str) -> MirrorResult<Vec<u8>>;

    /// Send a JSON request and decode the JSON response.
    ///
    /// `body` is sent with `Content-Type: application/json` when present.
    fn request_json(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        headers: &[(&str, String)],
    ) -> MirrorResult<Value>;
}

impl<T: HttpTransport + ?Sized> HttpTransport for &T {
    fn fetch(&self, url: &str) -> MirrorResult<Vec<u8>> {
        (**self).fetch(url)
    }

    fn request_json(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        headers: &[(&str, String)],
    ) -> MirrorResult<Value> {
        (**self).request_json(method, url, body, headers)
    }
}
