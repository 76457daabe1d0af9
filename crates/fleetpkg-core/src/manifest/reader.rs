//! Manifest reader for package directories and zip archives.

use std::fs::File;
use std::io::{Cursor, Read, Seek};
use std::path::Path;

use tracing::debug;

use crate::error::{InstallError, Result};
use crate::source::InstallSource;

use super::{Manifest, ManifestFormat, find_manifest_file};

/// Upper bound on manifest size; anything larger is not a manifest.
const MAX_MANIFEST_BYTES: u64 = 1024 * 1024;

/// Load the manifest for a resolved install source.
pub fn load(source: &InstallSource) -> Result<Manifest> {
    match source {
        InstallSource::Archive(path) => load_from_archive(path),
        InstallSource::Directory(path) => load_from_dir(path),
    }
}

/// Read the manifest file located directly under `dir`.
pub fn load_from_dir(dir: &Path) -> Result<Manifest> {
    if !dir.is_dir() {
        return Err(InstallError::ManifestMissing {
            path: dir.to_path_buf(),
            reason: "package directory does not exist".to_string(),
        });
    }

    let (path, format) = find_manifest_file(dir).ok_or_else(|| InstallError::ManifestMissing {
        path: dir.to_path_buf(),
        reason: format!("no {} in package directory", expected_names()),
    })?;

    debug!(path = %path.display(), "reading package manifest");
    let content = std::fs::read(&path).map_err(|e| InstallError::ManifestMissing {
        path: path.clone(),
        reason: format!("failed to read manifest: {e}"),
    })?;

    Manifest::parse(&content, format, &path)
}

/// Read the manifest entry from a zip archive on disk without extracting it.
pub fn load_from_archive(path: &Path) -> Result<Manifest> {
    let file = File::open(path).map_err(|e| InstallError::ManifestMissing {
        path: path.to_path_buf(),
        reason: if e.kind() == std::io::ErrorKind::NotFound {
            "archive does not exist".to_string()
        } else {
            format!("failed to open archive: {e}")
        },
    })?;

    read_zip_manifest(file, path)
}

/// Read the manifest entry from an in-memory zip archive.
///
/// `label` identifies the archive in error messages.
pub fn load_from_archive_bytes(bytes: &[u8], label: &Path) -> Result<Manifest> {
    read_zip_manifest(Cursor::new(bytes), label)
}

fn read_zip_manifest<R: Read + Seek>(reader: R, label: &Path) -> Result<Manifest> {
    let mut archive = zip::ZipArchive::new(reader).map_err(|e| {
        InstallError::malformed(label, None, format!("not a valid zip archive: {e}"))
    })?;

    let names: Vec<String> = archive.file_names().map(str::to_string).collect();
    let (entry_name, format) = select_manifest_entry(&names, label)?;
    let entry_path = label.join(&entry_name);
    debug!(entry = %entry_name, archive = %label.display(), "reading manifest entry");

    let entry = archive.by_name(&entry_name).map_err(|e| {
        InstallError::malformed(&entry_path, None, format!("failed to read zip entry: {e}"))
    })?;

    let mut content = Vec::new();
    entry
        .take(MAX_MANIFEST_BYTES + 1)
        .read_to_end(&mut content)
        .map_err(|e| {
            InstallError::malformed(&entry_path, None, format!("failed to read zip entry: {e}"))
        })?;
    if content.len() as u64 > MAX_MANIFEST_BYTES {
        return Err(InstallError::malformed(
            &entry_path,
            None,
            format!("manifest exceeds {} bytes", MAX_MANIFEST_BYTES),
        ));
    }

    Manifest::parse(&content, format, &entry_path)
}

/// Pick the manifest entry: at the archive root, or inside one top-level
/// directory (`nginx-1.2.0/manifest.toml`). Root entries win; TOML wins
/// over JSON at the same depth.
fn select_manifest_entry(names: &[String], label: &Path) -> Result<(String, ManifestFormat)> {
    let mut candidates: Vec<(usize, usize, &str, ManifestFormat)> = names
        .iter()
        .filter_map(|name| {
            let mut parts = name.split('/');
            let (depth, file) = match (parts.next(), parts.next(), parts.next()) {
                (Some(file), None, None) => (0, file),
                (Some(dir), Some(file), None) if !dir.is_empty() => (1, file),
                _ => return None,
            };
            let format = ManifestFormat::from_file_name(file)?;
            let rank = ManifestFormat::ALL.iter().position(|f| *f == format)?;
            Some((depth, rank, name.as_str(), format))
        })
        .collect();
    candidates.sort();

    let Some(&(depth, rank, name, format)) = candidates.first() else {
        return Err(InstallError::ManifestMissing {
            path: label.to_path_buf(),
            reason: format!("archive contains no {}", expected_names()),
        });
    };

    let ambiguous = candidates
        .iter()
        .skip(1)
        .any(|&(d, r, _, _)| d == depth && r == rank);
    if ambiguous {
        return Err(InstallError::malformed(
            label,
            None,
            "archive contains more than one package root",
        ));
    }

    Ok((name.to_string(), format))
}

fn expected_names() -> String {
    ManifestFormat::ALL
        .iter()
        .map(|f| f.file_name())
        .collect::<Vec<_>>()
        .join(" or ")
}
