//! Install request and result types.

use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::conditions::{Assertion, ConditionReport, Strictness};
use crate::manifest::Manifest;
use crate::source::{InstallSource, SourceRequest};

/// Everything one install or condition check needs. Owned exclusively by
/// the invocation that runs it.
#[derive(Debug, Clone)]
pub struct InstallRequest {
    /// Explicit archive/directory input
    pub source: SourceRequest,
    /// Start point for package root discovery and base for relative paths
    pub working_dir: PathBuf,
    /// Facts about the target environment
    pub assertions: Vec<Assertion>,
    /// Treatment of declared conditions no assertion covers
    pub strictness: Strictness,
    /// Ask the remote side to skip re-validating package contents
    pub skip_validation: bool,
    /// Deadline for the remote install call
    pub timeout: Option<Duration>,
}

impl InstallRequest {
    /// Create a request that discovers the package from `working_dir`.
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            source: SourceRequest::discover(),
            working_dir: working_dir.into(),
            assertions: Vec::new(),
            strictness: Strictness::default(),
            skip_validation: false,
            timeout: None,
        }
    }

    /// Set the explicit archive path
    pub fn with_archive(mut self, path: impl Into<PathBuf>) -> Self {
        self.source.archive = Some(path.into());
        self
    }

    /// Set the explicit package directory
    pub fn with_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.source.directory = Some(path.into());
        self
    }

    /// Use an already resolved source
    pub fn with_source(mut self, source: InstallSource) -> Self {
        self.source = source.into();
        self
    }

    /// Add one condition assertion
    pub fn with_assertion(mut self, assertion: Assertion) -> Self {
        self.assertions.push(assertion);
        self
    }

    /// Add several condition assertions
    pub fn with_assertions<I>(mut self, assertions: I) -> Self
    where
        I: IntoIterator<Item = Assertion>,
    {
        self.assertions.extend(assertions);
        self
    }

    pub fn with_strictness(mut self, strictness: Strictness) -> Self {
        self.strictness = strictness;
        self
    }

    pub fn with_skip_validation(mut self, skip: bool) -> Self {
        self.skip_validation = skip;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

/// Result of a condition-only check.
#[derive(Debug, Clone, Serialize)]
pub struct CheckReport {
    #[serde(serialize_with = "serialize_source")]
    pub source: InstallSource,
    pub manifest: Manifest,
    pub conditions: ConditionReport,
}

/// How the gateway received the package.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum InstallMethod {
    /// Raw archive bytes were uploaded
    ArchiveUpload,
    /// The pre-built artifact for a package directory was referenced
    DirectoryArtifact,
}

/// Outcome of a completed install.
#[derive(Debug, Clone, Serialize)]
pub struct InstallResult {
    #[serde(serialize_with = "serialize_source")]
    pub source: InstallSource,
    /// The manifest loaded before installing
    pub manifest: Manifest,
    /// The manifest the gateway accepted. `FleetClient` returns the
    /// submitted manifest and logs a warning when Kibana names another package.
    pub installed: Manifest,
    pub method: InstallMethod,
    /// Condition report when assertions gated the install
    pub conditions: Option<ConditionReport>,
}

fn serialize_source<S: serde::Serializer>(
    source: &InstallSource,
    serializer: S,
) -> Result<S::Ok, S::Error> {
    use serde::ser::SerializeStruct;

    let mut state = serializer.serialize_struct("InstallSource", 2)?;
    state.serialize_field("kind", source.kind())?;
    state.serialize_field("path", &source.path().display().to_string())?;
    state.end()
}
