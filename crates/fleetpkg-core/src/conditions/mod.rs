//! Condition evaluation
//!
//! Checks caller-supplied `key=value` assertions against the version
//! ranges a manifest declares under `conditions`. Only assertions whose key
//! the manifest declares are evaluated; the rest are reported as ignored.
//! Declared conditions without an assertion are unverified, and
//! [`Strictness`] decides what that means.

mod assertion;
mod range;

use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{ConditionViolation, InstallError, Result};
use crate::manifest::Manifest;

pub use assertion::{Assertion, parse_assertions};
pub use range::{VersionRange, parse_version_lenient};

/// How to treat declared conditions that no assertion covers.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Strictness {
    /// Unverified conditions are neither failures nor logged
    #[default]
    Lenient,
    /// Unverified conditions are logged as warnings
    Warn,
    /// Unverified conditions fail evaluation
    Strict,
}

impl fmt::Display for Strictness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Strictness::Lenient => write!(f, "lenient"),
            Strictness::Warn => write!(f, "warn"),
            Strictness::Strict => write!(f, "strict"),
        }
    }
}

impl FromStr for Strictness {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "lenient" => Ok(Strictness::Lenient),
            "warn" => Ok(Strictness::Warn),
            "strict" => Ok(Strictness::Strict),
            other => Err(format!(
                "unknown strictness '{}', expected lenient, warn or strict",
                other
            )),
        }
    }
}

/// A declared condition an assertion satisfied.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SatisfiedCondition {
    pub key: String,
    pub constraint: String,
    pub value: String,
}

/// Outcome of a successful evaluation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ConditionReport {
    /// Declared conditions backed by a passing assertion
    pub satisfied: Vec<SatisfiedCondition>,
    /// Declared conditions with no assertion
    pub unverified: Vec<String>,
    /// Asserted keys the manifest does not declare
    pub ignored: Vec<String>,
}

impl ConditionReport {
    /// True when every declared condition was checked.
    pub fn is_complete(&self) -> bool {
        self.unverified.is_empty()
    }
}

/// Evaluate assertions against the manifest's declared conditions.
///
/// Every unmet key is collected before returning, so a
/// [`InstallError::ConditionFailure`] lists all unmet keys at once.
pub fn evaluate(
    manifest: &Manifest,
    assertions: &[Assertion],
    strictness: Strictness,
) -> Result<ConditionReport> {
    let mut report = ConditionReport::default();
    let mut violations = Vec::new();

    for (key, range) in manifest.conditions() {
        let mut matched = false;
        let mut failures: Vec<(&str, String)> = Vec::new();
        for assertion in assertions.iter().filter(|a| &a.key == key) {
            matched = true;
            match check(range, &assertion.value) {
                Ok(()) => {
                    debug!(
                        key = %key,
                        value = %assertion.value,
                        constraint = %range,
                        "condition satisfied"
                    );
                    report.satisfied.push(SatisfiedCondition {
                        key: key.clone(),
                        constraint: range.to_string(),
                        value: assertion.value.clone(),
                    });
                }
                Err(reason) => failures.push((assertion.value.as_str(), reason)),
            }
        }

        // One violation per key, however many assertions named it
        if !failures.is_empty() {
            let (values, reasons): (Vec<&str>, Vec<String>) = failures.into_iter().unzip();
            violations.push(ConditionViolation {
                key: key.clone(),
                constraint: range.to_string(),
                actual: Some(values.join(", ")),
                reason: reasons.join("; "),
            });
        }

        if matched {
            continue;
        }
        match strictness {
            Strictness::Lenient => report.unverified.push(key.clone()),
            Strictness::Warn => {
                warn!(
                    key = %key,
                    constraint = %range,
                    "condition not verified: no assertion supplied"
                );
                report.unverified.push(key.clone());
            }
            Strictness::Strict => violations.push(ConditionViolation {
                key: key.clone(),
                constraint: range.to_string(),
                actual: None,
                reason: "no assertion supplied".to_string(),
            }),
        }
    }

    let ignored: BTreeSet<&str> = assertions
        .iter()
        .filter(|a| manifest.condition(&a.key).is_none())
        .map(|a| a.key.as_str())
        .collect();
    for key in &ignored {
        debug!(key = %key, "assertion does not match any declared condition");
    }
    report.ignored = ignored.into_iter().map(str::to_string).collect();

    if violations.is_empty() {
        Ok(report)
    } else {
        Err(InstallError::ConditionFailure(violations))
    }
}

fn check(range: &VersionRange, value: &str) -> Result<(), String> {
    let version = parse_version_lenient(value)?;
    if range.matches(&version) {
        Ok(())
    } else {
        Err(format!("version {} does not satisfy {}", version, range))
    }
}
