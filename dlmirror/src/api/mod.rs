//! DLAPI client.
//!
//! Thin typed wrapper over [`HttpTransport`](crate::transport::HttpTransport)
//! for `api/publicinfo`, `api/v1/update`, `api/v1/batch` and
//! `api/v1/release_info`.

mod client;
mod types;

pub use client::{
    DlapiClient, BATCH_ENDPOINT, PUBLIC_INFO_ENDPOINT, RELEASE_INFO_ENDPOINT, SHARED_KEY_HEADER,
    UPDATE_ENDPOINT,
};
pub use types::{
    format_expiry, BatchRequest, Checksums, DownloadLink, PublicInfo, UpdateRequest,
};
