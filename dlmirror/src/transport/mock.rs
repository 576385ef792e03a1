//! In-memory transport for unit tests.

use std::cell::RefCell;
use std::collections::HashMap;

use serde_json::Value;

use super::{HttpTransport, Method};
use crate::error::{MirrorError, MirrorResult};

/// A retriable error built from a real reqwest failure.
pub fn transient_error() -> MirrorError {
    let source = reqwest::blocking::Client::new()
        .get("http://")
        .send()
        .unwrap_err();
    MirrorError::Http {
        url: "http://".to_string(),
        source,
    }
}

/// One recorded JSON call.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    pub method: Method,
    pub url: String,
    pub body: Option<Value>,
    pub headers: Vec<(String, String)>,
}

/// Mock transport serving canned files and JSON replies.
///
/// JSON replies are keyed by URL; when several replies are queued for the
/// same URL they are returned in order and the last one repeats.
#[derive(Default)]
pub struct MockTransport {
    files: HashMap<String, Vec<u8>>,
    json: RefCell<HashMap<String, Vec<Value>>>,
    fetched: RefCell<Vec<String>>,
    calls: RefCell<Vec<RecordedCall>>,
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_file(mut self, url: &str, data: &[u8]) -> Self {
        self.files.insert(url.to_string(), data.to_vec());
        self
    }

    pub fn with_json(self, url: &str, value: Value) -> Self {
        self.json
            .borrow_mut()
            .entry(url.to_string())
            .or_default()
            .push(value);
        self
    }

    /// URLs passed to `fetch`, in call order.
    pub fn fetched(&self) -> Vec<String> {
        self.fetched.borrow().clone()
    }

    /// JSON calls, in call order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.borrow().clone()
    }

    pub fn calls_to(&self, suffix: &str) -> Vec<RecordedCall> {
        self.calls()
            .into_iter()
            .filter(|c| c.url.ends_with(suffix))
            .collect()
    }

    pub fn network_calls(&self) -> usize {
        self.fetched.borrow().len() + self.calls.borrow().len()
    }
}

impl HttpTransport for MockTransport {
    fn fetch(&self, url: &str) -> MirrorResult<Vec<u8>> {
        self.fetched.borrow_mut().push(url.to_string());
        self.files.get(url).cloned().ok_or(MirrorError::Remote {
            url: url.to_string(),
            status: 404,
        })
    }

    fn request_json(
        &self,
        method: Method,
        url: &str,
        body: Option<&Value>,
        headers: &[(&str, String)],
    ) -> MirrorResult<Value> {
        self.calls.borrow_mut().push(RecordedCall {
            method,
            url: url.to_string(),
            body: body.cloned(),
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.clone()))
                .collect(),
        });

        let mut json = self.json.borrow_mut();
        let replies = json.get_mut(url).ok_or(MirrorError::Remote {
            url: url.to_string(),
            status: 404,
        })?;
        if replies.len() > 1 {
            Ok(replies.remove(0))
        } else {
            Ok(replies[0].clone())
        }
    }
}
