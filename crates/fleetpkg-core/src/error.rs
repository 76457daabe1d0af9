//! Error taxonomy for package installation.
//!
//! Every step of an install fails fast with one of these kinds and the
//! orchestrator returns it unchanged, so callers can tell which step
//! stopped the run via [`InstallError::step`].

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Result alias used throughout the core.
pub type Result<T, E = InstallError> = std::result::Result<T, E>;

/// The step of an install run that produced an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallStep {
    /// Input parsing before any step runs (bad assertions, bad config).
    Setup,
    /// Choosing the archive or directory to install.
    Resolve,
    /// Reading and validating the package manifest.
    LoadManifest,
    /// Evaluating condition assertions against the manifest.
    Validate,
    /// The remote install call.
    Install,
}

impl fmt::Display for InstallStep {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InstallStep::Setup => write!(f, "setup"),
            InstallStep::Resolve => write!(f, "resolve"),
            InstallStep::LoadManifest => write!(f, "load-manifest"),
            InstallStep::Validate => write!(f, "validate"),
            InstallStep::Install => write!(f, "install"),
        }
    }
}

/// A manifest condition that was not met.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConditionViolation {
    /// Flattened condition key, e.g. `kibana.version`
    pub key: String,
    /// The constraint declared in the manifest
    pub constraint: String,
    /// The asserted value, if one was supplied
    pub actual: Option<String>,
    /// Why the condition failed
    pub reason: String,
}

impl fmt::Display for ConditionViolation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.actual {
            Some(actual) => write!(
                f,
                "{} (required {}, got {}): {}",
                self.key, self.constraint, actual, self.reason
            ),
            None => write!(
                f,
                "{} (required {}): {}",
                self.key, self.constraint, self.reason
            ),
        }
    }
}

#[derive(Error, Debug)]
pub enum InstallError {
    #[error("package root not found (searched upward from {})", .start.display())]
    SourceNotFound { start: PathBuf },

    #[error("manifest not found in {}: {reason}", .path.display())]
    ManifestMissing { path: PathBuf, reason: String },

    #[error("{}", malformed_message(.path, .field.as_deref(), .reason))]
    ManifestMalformed {
        path: PathBuf,
        field: Option<String>,
        reason: String,
    },

    #[error("unmet package conditions: {}", violation_list(.0))]
    ConditionFailure(Vec<ConditionViolation>),

    #[error("invalid condition assertion '{input}': {reason}")]
    InvalidAssertion { input: String, reason: String },

    #[error("remote rejected the package (HTTP {status}): {message}")]
    RemoteRejected { status: u16, message: String },

    #[error("authentication with the management plane failed (HTTP {status})")]
    Unauthorized { status: u16 },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("installation cancelled")]
    Cancelled,

    #[error("installation timed out after {}s", .after.as_secs())]
    Timeout { after: Duration },

    #[error("configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl InstallError {
    /// The step that produced this error.
    pub fn step(&self) -> InstallStep {
        match self {
            InstallError::InvalidAssertion { .. } | InstallError::Config(_) => InstallStep::Setup,
            InstallError::SourceNotFound { .. } => InstallStep::Resolve,
            InstallError::ManifestMissing { .. } | InstallError::ManifestMalformed { .. } => {
                InstallStep::LoadManifest
            }
            InstallError::ConditionFailure(_) => InstallStep::Validate,
            InstallError::RemoteRejected { .. }
            | InstallError::Unauthorized { .. }
            | InstallError::Transport(_)
            | InstallError::Cancelled
            | InstallError::Timeout { .. }
            | InstallError::Io(_) => InstallStep::Install,
        }
    }

    /// Keys of every failed condition, empty for other kinds.
    pub fn failed_condition_keys(&self) -> Vec<&str> {
        match self {
            InstallError::ConditionFailure(violations) => {
                violations.iter().map(|v| v.key.as_str()).collect()
            }
            _ => Vec::new(),
        }
    }

    pub(crate) fn malformed(
        path: impl Into<PathBuf>,
        field: Option<&str>,
        reason: impl Into<String>,
    ) -> Self {
        InstallError::ManifestMalformed {
            path: path.into(),
            field: field.map(str::to_string),
            reason: reason.into(),
        }
    }
}

impl From<reqwest::Error> for InstallError {
    fn from(err: reqwest::Error) -> Self {
        InstallError::Transport(err.to_string())
    }
}

fn malformed_message(path: &std::path::Path, field: Option<&str>, reason: &str) -> String {
    match field {
        Some(field) => format!(
            "malformed manifest {}: field '{}': {}",
            path.display(),
            field,
            reason
        ),
        None => format!("malformed manifest {}: {}", path.display(), reason),
    }
}

fn violation_list(violations: &[ConditionViolation]) -> String {
    violations
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}
