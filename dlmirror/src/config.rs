//! Configuration for a mirror run.

use std::path::PathBuf;
use std::time::Duration;

use crate::error::{MirrorError, MirrorResult};
use crate::layout::Platform;
use crate::transport::{RetryPolicy, DEFAULT_MAX_ATTEMPTS, DEFAULT_TIMEOUT_SECS};
use crate::version::{GameVersion, ProtocolVersion, VersionParsePolicy};

/// Oldest client version update archives are requested from.
pub const DEFAULT_BASE_VERSION: GameVersion = GameVersion::new(59, 0);

/// Lowest DLAPI protocol this mirror speaks.
pub const REQUIRED_PROTOCOL: ProtocolVersion = ProtocolVersion::new(1, 1);

/// Configuration for a mirror run.
#[derive(Debug, Clone)]
pub struct MirrorConfig {
    /// Root of the mirror tree.
    pub root: PathBuf,

    /// DLAPI base URL, always with a scheme and a trailing `/`.
    pub mirror_url: String,

    /// Optional shared secret sent with every API call.
    pub shared_key: Option<String>,

    /// Platforms to mirror, in processing order.
    pub platforms: Vec<Platform>,

    /// Version update archives are requested from on an empty mirror.
    pub base_version: GameVersion,

    /// Protocol the server must be compatible with.
    pub required_protocol: ProtocolVersion,

    /// Per request HTTP timeout.
    pub timeout: Duration,

    /// Attempts per request for transient failures.
    pub max_attempts: u32,

    /// Pause between attempts.
    pub retry_delay: Duration,

    /// Handling of malformed version names on disk.
    pub version_policy: VersionParsePolicy,
}

impl Default for MirrorConfig {
    fn default() -> Self {
        Self {
            root: PathBuf::from("."),
            mirror_url: String::new(),
            shared_key: None,
            platforms: Platform::ALL.to_vec(),
            base_version: DEFAULT_BASE_VERSION,
            required_protocol: REQUIRED_PROTOCOL,
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            retry_delay: Duration::ZERO,
            version_policy: VersionParsePolicy::default(),
        }
    }
}

impl MirrorConfig {
    /// Create a configuration for mirroring `mirror_url` into `root`.
    pub fn new(root: impl Into<PathBuf>, mirror_url: &str) -> Self {
        Self {
            root: root.into(),
            mirror_url: normalize_mirror_url(mirror_url),
            ..Default::default()
        }
    }

    pub fn with_shared_key(mut self, key: Option<String>) -> Self {
        self.shared_key = key.filter(|k| !k.is_empty());
        self
    }

    /// Set the platforms to mirror.
    pub fn with_platforms(mut self, platforms: Vec<Platform>) -> Self {
        self.platforms = platforms;
        self
    }

    pub fn with_base_version(mut self, version: GameVersion) -> Self {
        self.base_version = version;
        self
    }

    /// Set the HTTP timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    pub fn with_retry_delay(mut self, delay: Duration) -> Self {
        self.retry_delay = delay;
        self
    }

    pub fn with_version_policy(mut self, policy: VersionParsePolicy) -> Self {
        self.version_policy = policy;
        self
    }

    /// Retry policy derived from the attempt count and delay.
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, self.retry_delay)
    }

    /// Check the configuration before any work is done.
    pub fn validate(&self) -> MirrorResult<()> {
        if self.platforms.is_empty() {
            return Err(MirrorError::InvalidConfig("nothing to download".to_string()));
        }
        if self.mirror_url.is_empty() {
            return Err(MirrorError::InvalidConfig("mirror URL is empty".to_string()));
        }
        reqwest::Url::parse(&self.mirror_url).map_err(|e| MirrorError::InvalidUrl {
            url: self.mirror_url.clone(),
            reason: e.to_string(),
        })?;
        if self.max_attempts == 0 {
            return Err(MirrorError::InvalidConfig(
                "max attempts must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// Add `https://` when no scheme is given and ensure a trailing `/`.
pub fn normalize_mirror_url(url: &str) -> String {
    let url = url.trim();
    if url.is_empty() {
        return String::new();
    }
    let mut normalized = if url.starts_with("http://") || url.starts_with("https://") {
        url.to_string()
    } else {
        format!("https://{}", url)
    };
    if !normalized.ends_with('/') {
        normalized.push('/');
    }
    normalized
}
