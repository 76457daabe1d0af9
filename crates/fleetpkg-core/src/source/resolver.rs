//! Source resolver implementation.

use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};

use crate::error::{InstallError, Result};
use crate::manifest::find_manifest_file;

use super::spec::{InstallSource, SourceRequest};

/// Resolve the install source for a request.
///
/// Precedence is fixed: explicit archive, then explicit directory, then
/// upward discovery from `working_dir`. Relative explicit paths are taken
/// relative to `working_dir`. The archive's contents are not inspected here.
pub fn resolve(request: &SourceRequest, working_dir: &Path) -> Result<InstallSource> {
    let archive = non_empty(request.archive.as_deref());
    let directory = non_empty(request.directory.as_deref());

    if let Some(archive) = archive {
        if let Some(directory) = directory {
            warn!(
                archive = %archive.display(),
                directory = %directory.display(),
                "both an archive and a package directory were given; installing the archive"
            );
        }
        let path = absolutize(archive, working_dir);
        info!(path = %path.display(), "using package archive");
        return Ok(InstallSource::Archive(path));
    }

    if let Some(directory) = directory {
        let path = absolutize(directory, working_dir);
        info!(path = %path.display(), "using package directory");
        return Ok(InstallSource::Directory(path));
    }

    let root = find_package_root(working_dir).ok_or_else(|| InstallError::SourceNotFound {
        start: working_dir.to_path_buf(),
    })?;
    info!(path = %root.display(), "discovered package root");
    Ok(InstallSource::Directory(root))
}

/// Walk upward from `start` and return the first directory that holds a
/// manifest file at its top level.
pub fn find_package_root(start: &Path) -> Option<PathBuf> {
    start.ancestors().find_map(|dir| {
        debug!(dir = %dir.display(), "probing for package manifest");
        find_manifest_file(dir).map(|_| dir.to_path_buf())
    })
}

fn non_empty(path: Option<&Path>) -> Option<&Path> {
    path.filter(|p| !p.as_os_str().is_empty())
}

fn absolutize(path: &Path, working_dir: &Path) -> PathBuf {
    if path.is_absolute() {
        path.to_path_buf()
    } else {
        working_dir.join(path)
    }
}
