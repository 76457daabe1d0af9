//! Source specification types.

use std::fmt;
use std::path::{Path, PathBuf};

/// Where the package artifact comes from. Resolved once per install.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InstallSource {
    /// A built package zip archive
    Archive(PathBuf),
    /// A package root directory containing a manifest
    Directory(PathBuf),
}

impl InstallSource {
    /// Path of the archive or directory.
    pub fn path(&self) -> &Path {
        match self {
            Self::Archive(path) | Self::Directory(path) => path,
        }
    }

    /// Check if this is an archive source.
    pub fn is_archive(&self) -> bool {
        matches!(self, Self::Archive(_))
    }

    /// Check if this is a directory source.
    pub fn is_directory(&self) -> bool {
        matches!(self, Self::Directory(_))
    }

    /// Short label for logs and reports.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Archive(_) => "archive",
            Self::Directory(_) => "directory",
        }
    }
}

impl fmt::Display for InstallSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.kind(), self.path().display())
    }
}

/// Caller input for source resolution.
///
/// Empty paths count as not supplied. When both are supplied the archive
/// wins.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SourceRequest {
    /// Explicit zip archive path (`--zip`)
    pub archive: Option<PathBuf>,
    /// Explicit package root directory (`--root`)
    pub directory: Option<PathBuf>,
}

impl SourceRequest {
    /// No explicit input; the package root is discovered.
    pub fn discover() -> Self {
        Self::default()
    }

    pub fn archive(path: impl Into<PathBuf>) -> Self {
        Self {
            archive: Some(path.into()),
            directory: None,
        }
    }

    pub fn directory(path: impl Into<PathBuf>) -> Self {
        Self {
            archive: None,
            directory: Some(path.into()),
        }
    }

    /// Set the explicit archive path
    pub fn with_archive(mut self, path: impl Into<PathBuf>) -> Self {
        self.archive = Some(path.into());
        self
    }

    /// Set the explicit directory path
    pub fn with_directory(mut self, path: impl Into<PathBuf>) -> Self {
        self.directory = Some(path.into());
        self
    }
}

impl From<InstallSource> for SourceRequest {
    fn from(source: InstallSource) -> Self {
        match source {
            InstallSource::Archive(path) => Self::archive(path),
            InstallSource::Directory(path) => Self::directory(path),
        }
    }
}
