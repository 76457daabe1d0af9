//! Version range constraints declared by manifest conditions.

use std::fmt;
use std::str::FromStr;

use semver::{Version, VersionReq};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// A version range such as `>=8.7.0, <9.0.0` or `^7.16.0 || ^8.0.0`.
///
/// Each `||`-separated alternative is a comma-separated comparator set;
/// a version satisfies the range when it satisfies any alternative.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VersionRange {
    raw: String,
    alternatives: Vec<VersionReq>,
}

impl VersionRange {
    /// Parse a range constraint.
    pub fn parse(input: &str) -> Result<Self, String> {
        let raw = input.trim();
        if raw.is_empty() {
            return Err("empty version constraint".to_string());
        }

        let mut alternatives = Vec::new();
        for part in raw.split("||") {
            let part = part.trim();
            if part.is_empty() {
                return Err(format!("empty alternative in constraint '{}'", raw));
            }
            let req = VersionReq::parse(part)
                .map_err(|e| format!("invalid constraint '{}': {}", part, e))?;
            alternatives.push(req);
        }

        Ok(Self {
            raw: raw.to_string(),
            alternatives,
        })
    }

    /// Check whether a version falls inside this range.
    pub fn matches(&self, version: &Version) -> bool {
        self.alternatives.iter().any(|req| req.matches(version))
    }

    /// The constraint as written in the manifest.
    pub fn as_str(&self) -> &str {
        &self.raw
    }
}

impl fmt::Display for VersionRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw)
    }
}

impl FromStr for VersionRange {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for VersionRange {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.raw)
    }
}

impl<'de> Deserialize<'de> for VersionRange {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

/// Parse an asserted version, accepting `v` prefixes and partial versions.
///
/// `8.9` becomes `8.9.0` and `8` becomes `8.0.0`; pre-release and build
/// suffixes are kept as-is.
pub fn parse_version_lenient(input: &str) -> Result<Version, String> {
    let trimmed = input.trim();
    let trimmed = trimmed.strip_prefix('v').unwrap_or(trimmed);

    if let Ok(version) = Version::parse(trimmed) {
        return Ok(version);
    }

    // Split off any suffix so "8.9-SNAPSHOT" pads the numeric core only
    let split_at = trimmed.find(['-', '+']).unwrap_or(trimmed.len());
    let (core, suffix) = trimmed.split_at(split_at);
    let parts: Vec<&str> = core.split('.').collect();
    if parts.is_empty() || parts.len() > 3 || parts.iter().any(|p| p.is_empty()) {
        return Err(format!("'{}' is not a valid version", input));
    }

    let mut padded = parts.join(".");
    for _ in parts.len()..3 {
        padded.push_str(".0");
    }
    padded.push_str(suffix);

    Version::parse(&padded).map_err(|e| format!("'{}' is not a valid version: {}", input, e))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(s: &str) -> Version {
        Version::parse(s).unwrap()
    }

    #[test]
    fn bounded_range() {
        let range = VersionRange::parse(">=8.7.0, <9.0.0").unwrap();
        assert!(range.matches(&v("8.7.0")));
        assert!(range.matches(&v("8.9.2")));
        assert!(!range.matches(&v("9.1.0")));
        assert!(!range.matches(&v("8.6.9")));
    }

    #[test]
    fn alternatives_match_any() {
        let range = VersionRange::parse("^7.16.0 || ^8.0.0").unwrap();
        assert!(range.matches(&v("7.17.3")));
        assert!(range.matches(&v("8.11.0")));
        assert!(!range.matches(&v("7.15.0")));
        assert!(!range.matches(&v("9.0.0")));
    }

    #[test]
    fn wildcard_and_tilde() {
        assert!(VersionRange::parse("8.*").unwrap().matches(&v("8.3.1")));
        assert!(VersionRange::parse("~8.9").unwrap().matches(&v("8.9.7")));
        assert!(!VersionRange::parse("~8.9").unwrap().matches(&v("8.10.0")));
    }

    #[test]
    fn rejects_invalid_syntax() {
        assert!(VersionRange::parse("").is_err());
        assert!(VersionRange::parse("not-a-range").is_err());
        assert!(VersionRange::parse("^8.0.0 ||").is_err());
        assert!(VersionRange::parse(">>8").is_err());
    }

    #[test]
    fn keeps_raw_text() {
        let range = VersionRange::parse("  ^8.7.0 ").unwrap();
        assert_eq!(range.as_str(), "^8.7.0");
        assert_eq!(range.to_string(), "^8.7.0");
    }

    #[test]
    fn lenient_versions() {
        assert_eq!(parse_version_lenient("8.9.2").unwrap(), v("8.9.2"));
        assert_eq!(parse_version_lenient("v8.9.2").unwrap(), v("8.9.2"));
        assert_eq!(parse_version_lenient("8.9").unwrap(), v("8.9.0"));
        assert_eq!(parse_version_lenient("8").unwrap(), v("8.0.0"));
        assert_eq!(
            parse_version_lenient("8.10-SNAPSHOT").unwrap(),
            v("8.10.0-SNAPSHOT")
        );
        assert!(parse_version_lenient("eight").is_err());
        assert!(parse_version_lenient("8..1").is_err());
        assert!(parse_version_lenient("1.2.3.4").is_err());
    }
}
