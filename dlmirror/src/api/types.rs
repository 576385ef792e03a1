//! DLAPI request and response types.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{MirrorError, MirrorResult};
use crate::version::{GameVersion, ProtocolVersion};

/// Response of `api/publicinfo`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublicInfo {
    /// Latest game version the server distributes, as `MAJ.MIN`.
    pub game_version: String,
    pub dlapi_version: ProtocolVersion,
    /// Lifetime of issued download links in seconds, 0 for unlimited.
    #[serde(default)]
    pub serve_time_limit: u64,
    /// Free-form application specific data.
    #[serde(default)]
    pub application: Option<BTreeMap<String, Value>>,
}

impl PublicInfo {
    pub fn target_version(&self) -> MirrorResult<GameVersion> {
        self.game_version.parse()
    }

    /// Refuse to talk to servers speaking an incompatible protocol.
    pub fn ensure_protocol(&self, required: ProtocolVersion) -> MirrorResult<()> {
        if self.dlapi_version.is_compatible_with(required) {
            Ok(())
        } else {
            Err(MirrorError::ProtocolVersionMismatch {
                found: self.dlapi_version,
                required,
            })
        }
    }

    /// Absolute expiry (epoch seconds) of links issued at `now`.
    pub fn link_expiry(&self, now: i64) -> Option<i64> {
        match self.serve_time_limit {
            0 => None,
            limit => Some(now.saturating_add(i64::try_from(limit).unwrap_or(i64::MAX))),
        }
    }
}

/// Integrity pair for one remote file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Checksums {
    pub md5: String,
    pub sha256: String,
}

/// One remote file reference returned by `v1/update` or `v1/batch`.
///
/// Update links carry the `version` they belong to, batch links the
/// `packageId`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DownloadLink {
    pub url: String,
    /// Advisory size, recorded in manifests but not enforced.
    pub size: u64,
    pub checksums: Checksums,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
    #[serde(
        rename = "packageId",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    pub package_id: Option<u32>,
}

/// Request body of `v1/update`.
#[derive(Debug, Clone, Serialize)]
pub struct UpdateRequest {
    pub version: String,
    pub platform: u8,
}

/// Request body of `v1/batch`.
#[derive(Debug, Clone, Serialize)]
pub struct BatchRequest {
    pub package_type: u8,
    pub platform: u8,
    pub exclude: Vec<u32>,
}

/// Human readable rendering of a link lifetime in seconds.
pub fn format_expiry(seconds: u64) -> String {
    if seconds == 0 {
        return "no expiration".to_string();
    }

    let hours = seconds / 3600;
    let minutes = seconds / 60 % 60;
    let secs = seconds % 60;

    let mut parts = Vec::new();
    for (value, unit) in [(hours, "hour"), (minutes, "minute"), (secs, "second")] {
        match value {
            0 => {}
            1 => parts.push(format!("1 {}", unit)),
            n => parts.push(format!("{} {}s", n, unit)),
        }
    }
    parts.join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_public_info_decode() {
        let info: PublicInfo = serde_json::from_value(json!({
            "publicApi": true,
            "gameVersion": "59.4",
            "dlapiVersion": {"major": 1, "minor": 2},
            "serveTimeLimit": 3600,
            "application": {"name": "mirror"}
        }))
        .unwrap();

        assert_eq!(info.target_version().unwrap(), GameVersion::new(59, 4));
        assert!(info.ensure_protocol(ProtocolVersion::new(1, 1)).is_ok());
        assert_eq!(info.link_expiry(1000), Some(4600));
    }

    #[test]
    fn test_public_info_minimal_and_unlimited() {
        let info: PublicInfo = serde_json::from_value(json!({
            "gameVersion": "59.4",
            "dlapiVersion": {"major": 1, "minor": 1},
            "serveTimeLimit": 0,
            "application": null
        }))
        .unwrap();
        assert_eq!(info.link_expiry(1000), None);
        assert!(info.application.is_none());
    }

    #[test]
    fn test_protocol_mismatch() {
        let info: PublicInfo = serde_json::from_value(json!({
            "gameVersion": "59.4",
            "dlapiVersion": {"major": 1, "minor": 0},
        }))
        .unwrap();
        let err = info.ensure_protocol(ProtocolVersion::new(1, 1)).unwrap_err();
        assert!(matches!(err, MirrorError::ProtocolVersionMismatch { .. }));
    }

    #[test]
    fn test_batch_link_decode() {
        let link: DownloadLink = serde_json::from_value(json!({
            "url": "https://cdn/x.zip",
            "size": 10,
            "checksums": {"md5": "a", "sha256": "b"},
            "packageId": 7
        }))
        .unwrap();
        assert_eq!(link.package_id, Some(7));
        assert_eq!(link.version, None);

        let back = serde_json::to_value(&link).unwrap();
        assert!(back.get("version").is_none());
        assert_eq!(back["packageId"], 7);
    }

    #[test]
    fn test_format_expiry() {
        assert_eq!(format_expiry(0), "no expiration");
        assert_eq!(format_expiry(1), "1 second");
        assert_eq!(format_expiry(3600), "1 hour");
        assert_eq!(format_expiry(7322), "2 hours 2 minutes 2 seconds");
        assert_eq!(format_expiry(61), "1 minute 1 second");
    }
}
