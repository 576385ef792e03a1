//! Game and protocol version numbers.
//!
//! Versions are always compared as integer pairs. `"9.0"` sorts before
//! `"10.0"`, which a string comparison would get wrong.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{MirrorError, MirrorResult};

/// A two-part game client version such as `59.4`.
///
/// Ordering is derived from the field order, so `(major, minor)` pairs
/// compare numerically.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct GameVersion {
    pub major: u32,
    pub minor: u32,
}

impl GameVersion {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl fmt::Display for GameVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

impl FromStr for GameVersion {
    type Err = MirrorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let invalid = || MirrorError::InvalidVersion(s.to_string());
        let (major, minor) = s.split_once('.').ok_or_else(invalid)?;
        Ok(Self {
            major: major.parse().map_err(|_| invalid())?,
            minor: minor.parse().map_err(|_| invalid())?,
        })
    }
}

/// Generation of the on-disk layout, stored in `generation.json`.
///
/// A tree without the file is generation 1.0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Generation {
    pub major: u32,
    pub minor: u32,
}

impl Generation {
    /// Trees written before `generation.json` existed.
    pub const INITIAL: Generation = Generation::new(1, 0);

    /// Hashed manifests, extracted micro entries and decrypted databases.
    pub const CURRENT: Generation = Generation::new(1, 1);

    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }
}

impl Default for Generation {
    fn default() -> Self {
        Self::INITIAL
    }
}

impl fmt::Display for Generation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// DLAPI protocol version advertised in `publicinfo`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ProtocolVersion {
    pub major: u32,
    pub minor: u32,
}

impl ProtocolVersion {
    pub const fn new(major: u32, minor: u32) -> Self {
        Self { major, minor }
    }

    /// A server is compatible when the major version matches exactly and the
    /// minor version is at least the required one.
    pub fn is_compatible_with(&self, required: ProtocolVersion) -> bool {
        self.major == required.major && self.minor >= required.minor
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.major, self.minor)
    }
}

/// What to do with version names that fail to parse.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VersionParsePolicy {
    /// Log and ignore the entry.
    #[default]
    Skip,
    /// Fail with [`MirrorError::InvalidVersion`].
    Fail,
}

impl VersionParsePolicy {
    /// Parse every name, applying the policy to malformed ones.
    ///
    /// The result is sorted ascending.
    pub fn parse_all<'a, I>(&self, names: I) -> MirrorResult<Vec<GameVersion>>
    where
        I: IntoIterator<Item = &'a str>,
    {
        let mut versions = Vec::new();
        for name in names {
            match name.parse::<GameVersion>() {
                Ok(v) => versions.push(v),
                Err(e) => match self {
                    Self::Skip => tracing::warn!(name, "Skipping malformed version name"),
                    Self::Fail => return Err(e),
                },
            }
        }
        versions.sort();
        Ok(versions)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_parse_and_display() {
        let v: GameVersion = "59.4".parse().unwrap();
        assert_eq!(v, GameVersion::new(59, 4));
        assert_eq!(v.to_string(), "59.4");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in ["", "59", "59.", ".4", "59.4.1", "a.b", "-1.0"] {
            assert!(bad.parse::<GameVersion>().is_err(), "{bad} should fail");
        }
    }

    #[test]
    fn test_numeric_not_lexicographic() {
        let nine: GameVersion = "9.9".parse().unwrap();
        let ten: GameVersion = "10.0".parse().unwrap();
        assert!(nine < ten);
        assert!("9.9" > "10.0");
    }

    #[test]
    fn test_generation_order_and_json() {
        assert!(Generation::INITIAL < Generation::CURRENT);
        assert!(Generation::new(2, 0) > Generation::CURRENT);
        assert_eq!(
            serde_json::to_string(&Generation::CURRENT).unwrap(),
            r#"{"major":1,"minor":1}"#
        );
        assert_eq!(Generation::default().to_string(), "1.0");
    }

    #[test]
    fn test_protocol_gate() {
        let required = ProtocolVersion::new(1, 1);
        assert!(ProtocolVersion::new(1, 1).is_compatible_with(required));
        assert!(ProtocolVersion::new(1, 5).is_compatible_with(required));
        assert!(!ProtocolVersion::new(1, 0).is_compatible_with(required));
        assert!(!ProtocolVersion::new(2, 1).is_compatible_with(required));
    }

    #[test]
    fn test_parse_policy_skip() {
        let versions = VersionParsePolicy::Skip
            .parse_all(["10.0", "junk", "9.2", "59.4"])
            .unwrap();
        assert_eq!(
            versions,
            vec![
                GameVersion::new(9, 2),
                GameVersion::new(10, 0),
                GameVersion::new(59, 4)
            ]
        );
    }

    #[test]
    fn test_parse_policy_fail() {
        let result = VersionParsePolicy::Fail.parse_all(["10.0", "junk"]);
        assert!(matches!(result, Err(MirrorError::InvalidVersion(name)) if name == "junk"));
    }

    proptest! {
        #[test]
        fn prop_ordering_matches_integer_pairs(a in 0u32..1000, b in 0u32..1000, c in 0u32..1000, d in 0u32..1000) {
            let left = GameVersion::new(a, b);
            let right = GameVersion::new(c, d);
            prop_assert_eq!(left < right, a < c || (a == c && b < d));
        }

        #[test]
        fn prop_display_roundtrips(a in 0u32..100_000, b in 0u32..100_000) {
            let v = GameVersion::new(a, b);
            prop_assert_eq!(v.to_string().parse::<GameVersion>().unwrap(), v);
        }
    }
}
