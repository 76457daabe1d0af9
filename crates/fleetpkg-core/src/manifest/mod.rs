//! Package manifest loading.
//!
//! A package describes itself with a manifest file at its top level
//! (`manifest.toml`, or `manifest.json`). Directories are read directly;
//! zip archives are opened and only the manifest entry is streamed out.

pub mod reader;
pub mod schema;

use std::path::{Path, PathBuf};

pub use reader::{load, load_from_archive, load_from_archive_bytes, load_from_dir};
pub use schema::Manifest;

/// Supported manifest encodings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ManifestFormat {
    Toml,
    Json,
}

impl ManifestFormat {
    /// Probe order when looking for a manifest in a directory or archive.
    pub const ALL: [ManifestFormat; 2] = [ManifestFormat::Toml, ManifestFormat::Json];

    pub fn file_name(self) -> &'static str {
        match self {
            ManifestFormat::Toml => "manifest.toml",
            ManifestFormat::Json => "manifest.json",
        }
    }

    /// Detect the format from a file or entry name.
    pub fn from_file_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.file_name() == name)
    }
}

/// Find the manifest file directly under `dir`, if any.
pub fn find_manifest_file(dir: &Path) -> Option<(PathBuf, ManifestFormat)> {
    ManifestFormat::ALL.into_iter().find_map(|format| {
        let candidate = dir.join(format.file_name());
        candidate.is_file().then_some((candidate, format))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn format_from_file_name() {
        assert_eq!(
            ManifestFormat::from_file_name("manifest.toml"),
            Some(ManifestFormat::Toml)
        );
        assert_eq!(
            ManifestFormat::from_file_name("manifest.json"),
            Some(ManifestFormat::Json)
        );
        assert_eq!(ManifestFormat::from_file_name("manifest.yml"), None);
    }

    #[test]
    fn find_manifest_prefers_toml() {
        let temp = tempfile::TempDir::new().expect("Failed to create temp dir");
        std::fs::write(temp.path().join("manifest.json"), "{}").unwrap();
        assert_eq!(
            find_manifest_file(temp.path()).map(|(_, f)| f),
            Some(ManifestFormat::Json)
        );

        std::fs::write(temp.path().join("manifest.toml"), "").unwrap();
        assert_eq!(
            find_manifest_file(temp.path()).map(|(_, f)| f),
            Some(ManifestFormat::Toml)
        );
    }

    #[test]
    fn find_manifest_ignores_directories() {
        let temp = tempfile::TempDir::new().expect("Failed to create temp dir");
        std::fs::create_dir(temp.path().join("manifest.toml")).unwrap();
        assert!(find_manifest_file(temp.path()).is_none());
    }
}
