//! Typed client for the four DLAPI endpoints.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde_json::Value;

use super::types::{BatchRequest, DownloadLink, PublicInfo, UpdateRequest};
use crate::error::{MirrorError, MirrorResult};
use crate::layout::{PackageType, Platform};
use crate::transport::{HttpTransport, Method};
use crate::version::GameVersion;

/// Header carrying the shared secret.
pub const SHARED_KEY_HEADER: &str = "DLAPI-Shared-Key";

pub const PUBLIC_INFO_ENDPOINT: &str = "api/publicinfo";
pub const UPDATE_ENDPOINT: &str = "api/v1/update";
pub const BATCH_ENDPOINT: &str = "api/v1/batch";
pub const RELEASE_INFO_ENDPOINT: &str = "api/v1/release_info";

/// JSON client for a DLAPI server.
///
/// Retries come from the transport; a non-200 answer means the endpoint
/// rejected the request and is returned as is.
#[derive(Debug)]
pub struct DlapiClient<T> {
    transport: T,
    base_url: String,
    shared_key: Option<String>,
}

impl<T: HttpTransport> DlapiClient<T> {
    /// Create a client. `base_url` gets a trailing `/` if it lacks one.
    pub fn new(transport: T, base_url: impl Into<String>, shared_key: Option<String>) -> Self {
        let mut base_url = base_url.into();
        if !base_url.ends_with('/') {
            base_url.push('/');
        }
        Self {
            transport,
            base_url,
            shared_key: shared_key.filter(|k| !k.is_empty()),
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Full URL of an endpoint.
    pub fn endpoint_url(&self, endpoint: &str) -> String {
        format!("{}{}", self.base_url, endpoint.trim_start_matches('/'))
    }

    /// Call an endpoint: GET without a body, POST with one.
    pub fn call(&self, endpoint: &str, body: Option<Value>) -> MirrorResult<Value> {
        let url = self.endpoint_url(endpoint);
        let mut headers = Vec::new();
        if let Some(key) = &self.shared_key {
            headers.push((SHARED_KEY_HEADER, encode_shared_key(key)));
        }
        let method = if body.is_some() {
            Method::Post
        } else {
            Method::Get
        };
        tracing::debug!(%url, ?method, "Calling DLAPI");
        self.transport
            .request_json(method, &url, body.as_ref(), &headers)
    }

    fn call_typed<R: DeserializeOwned>(&self, endpoint: &str, body: Option<Value>) -> MirrorResult<R> {
        let value = self.call(endpoint, body)?;
        serde_json::from_value(value).map_err(|e| MirrorError::Decode {
            endpoint: endpoint.to_string(),
            reason: e.to_string(),
        })
    }

    pub fn public_info(&self) -> MirrorResult<PublicInfo> {
        self.call_typed(PUBLIC_INFO_ENDPOINT, None)
    }

    /// Update links needed to go from `from` to the latest version.
    pub fn update(&self, from: GameVersion, platform: Platform) -> MirrorResult<Vec<DownloadLink>> {
        let request = UpdateRequest {
            version: from.to_string(),
            platform: platform.api_id(),
        };
        let links: Vec<DownloadLink> = self.call_typed(UPDATE_ENDPOINT, Some(to_body(&request)?))?;
        if let Some(bad) = links.iter().find(|l| l.version.is_none()) {
            return Err(MirrorError::Decode {
                endpoint: UPDATE_ENDPOINT.to_string(),
                reason: format!("link {} has no version", bad.url),
            });
        }
        Ok(links)
    }

    /// Batch links of one package type, minus the `exclude`d package ids.
    pub fn batch(
        &self,
        package_type: PackageType,
        platform: Platform,
        exclude: &[u32],
    ) -> MirrorResult<Vec<DownloadLink>> {
        let request = BatchRequest {
            package_type: package_type.id(),
            platform: platform.api_id(),
            exclude: exclude.to_vec(),
        };
        let links: Vec<DownloadLink> = self.call_typed(BATCH_ENDPOINT, Some(to_body(&request)?))?;
        if let Some(bad) = links.iter().find(|l| l.package_id.is_none()) {
            return Err(MirrorError::Decode {
                endpoint: BATCH_ENDPOINT.to_string(),
                reason: format!("link {} has no packageId", bad.url),
            });
        }
        Ok(links)
    }

    pub fn release_info(&self) -> MirrorResult<BTreeMap<String, String>> {
        self.call_typed(RELEASE_INFO_ENDPOINT, None)
    }
}

/// Percent-encode the shared key, leaving `/` as is.
///
/// Servers compare the header with the raw key, and keys are often base64.
/// A literal `%` encodes to `%25`, so every `%2F` left in the output stands
/// for a `/`.
fn encode_shared_key(key: &str) -> String {
    urlencoding::encode(key).replace("%2F", "/")
}

fn to_body<S: serde::Serialize>(request: &S) -> MirrorResult<Value> {
    serde_json::to_value(request).map_err(|e| MirrorError::Decode {
        endpoint: "request".to_string(),
        reason: e.to_string(),
    })
}
