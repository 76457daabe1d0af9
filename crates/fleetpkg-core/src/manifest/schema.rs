//! Manifest schema
//!
//! Defines the structure of `manifest.toml` / `manifest.json` files at the
//! top level of a package. Only `name` and `version` are required; unknown
//! fields are ignored so full package manifests load unchanged.

use std::collections::BTreeMap;
use std::path::Path;

use semver::Version;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::conditions::VersionRange;
use crate::error::{InstallError, Result};

use super::ManifestFormat;

/// A package's self-description. Immutable once loaded.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Manifest {
    name: String,
    version: Version,
    #[serde(skip_serializing_if = "Option::is_none")]
    title: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<String>,
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    package_type: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    format_version: Option<String>,
    conditions: BTreeMap<String, VersionRange>,
}

/// Wire shape before validation. Every field is untyped here so missing or
/// mistyped fields can be reported by name instead of as a generic serde
/// error.
#[derive(Debug, Deserialize)]
struct RawManifest {
    #[serde(default)]
    name: Option<Value>,
    #[serde(default)]
    version: Option<Value>,
    #[serde(default)]
    title: Option<Value>,
    #[serde(default)]
    description: Option<Value>,
    #[serde(default, rename = "type")]
    package_type: Option<Value>,
    #[serde(default)]
    format_version: Option<Value>,
    #[serde(default)]
    conditions: Option<Value>,
}

impl Manifest {
    /// Parse manifest content. `path` is only used for error messages.
    pub fn parse(content: &[u8], format: ManifestFormat, path: &Path) -> Result<Self> {
        let raw: RawManifest = match format {
            ManifestFormat::Toml => {
                let text = std::str::from_utf8(content)
                    .map_err(|e| InstallError::malformed(path, None, format!("not UTF-8: {e}")))?;
                toml::from_str(text)
                    .map_err(|e| InstallError::malformed(path, None, e.to_string()))?
            }
            ManifestFormat::Json => serde_json::from_slice(content)
                .map_err(|e| InstallError::malformed(path, None, e.to_string()))?,
        };

        Self::from_raw(raw, path)
    }

    /// Parse a TOML manifest from a string.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        Self::parse(
            content.as_bytes(),
            ManifestFormat::Toml,
            Path::new(ManifestFormat::Toml.file_name()),
        )
    }

    /// Parse a JSON manifest from a string.
    pub fn from_json_str(content: &str) -> Result<Self> {
        Self::parse(
            content.as_bytes(),
            ManifestFormat::Json,
            Path::new(ManifestFormat::Json.file_name()),
        )
    }

    fn from_raw(raw: RawManifest, path: &Path) -> Result<Self> {
        let name = required_string(path, "name", raw.name)?;
        if name.trim().is_empty() {
            return Err(InstallError::malformed(path, Some("name"), "must not be empty"));
        }

        let version = required_string(path, "version", raw.version)?;
        let version = Version::parse(version.trim()).map_err(|e| {
            InstallError::malformed(
                path,
                Some("version"),
                format!("'{}' is not a semantic version: {}", version, e),
            )
        })?;

        let mut conditions = BTreeMap::new();
        match raw.conditions {
            None | Some(Value::Null) => {}
            Some(Value::Object(table)) => {
                for (key, value) in table {
                    flatten_condition(path, key, value, &mut conditions)?;
                }
            }
            Some(_) => {
                return Err(InstallError::malformed(
                    path,
                    Some("conditions"),
                    "expected a table of condition constraints",
                ));
            }
        }

        Ok(Self {
            name,
            version,
            title: optional_string(path, "title", raw.title)?,
            description: optional_string(path, "description", raw.description)?,
            package_type: optional_string(path, "type", raw.package_type)?,
            format_version: optional_string(path, "format_version", raw.format_version)?,
            conditions,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn version(&self) -> &Version {
        &self.version
    }

    pub fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    /// Title when present, falling back to the machine name
    pub fn display_name(&self) -> &str {
        self.title.as_deref().unwrap_or(&self.name)
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Package kind (`integration`, `input`, ...)
    pub fn package_type(&self) -> Option<&str> {
        self.package_type.as_deref()
    }

    pub fn format_version(&self) -> Option<&str> {
        self.format_version.as_deref()
    }

    /// Declared conditions keyed by flattened dotted key.
    pub fn conditions(&self) -> &BTreeMap<String, VersionRange> {
        &self.conditions
    }

    pub fn condition(&self, key: &str) -> Option<&VersionRange> {
        self.conditions.get(key)
    }

    /// `name-version`, the conventional artifact identifier.
    pub fn identifier(&self) -> String {
        format!("{}-{}", self.name, self.version)
    }
}

fn required_string(path: &Path, field: &str, value: Option<Value>) -> Result<String> {
    optional_string(path, field, value)?
        .ok_or_else(|| InstallError::malformed(path, Some(field), "missing required field"))
}

fn optional_string(path: &Path, field: &str, value: Option<Value>) -> Result<Option<String>> {
    match value {
        None | Some(Value::Null) => Ok(None),
        Some(Value::String(s)) => Ok(Some(s)),
        Some(other) => Err(InstallError::malformed(
            path,
            Some(field),
            format!("expected a string, got {}", value_kind(&other)),
        )),
    }
}

fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "a table",
    }
}

fn flatten_condition(
    path: &Path,
    key: String,
    value: Value,
    out: &mut BTreeMap<String, VersionRange>,
) -> Result<()> {
    let field = format!("conditions.{key}");
    match value {
        Value::String(constraint) => {
            let range = VersionRange::parse(&constraint)
                .map_err(|reason| InstallError::malformed(path, Some(field.as_str()), reason))?;
            if out.insert(key, range).is_some() {
                return Err(InstallError::malformed(
                    path,
                    Some(field.as_str()),
                    "condition declared more than once",
                ));
            }
            Ok(())
        }
        Value::Object(table) => {
            for (child, value) in table {
                flatten_condition(path, format!("{key}.{child}"), value, out)?;
            }
            Ok(())
        }
        _ => Err(InstallError::malformed(
            path,
            Some(field.as_str()),
            "expected a version constraint string",
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_minimal_manifest() {
        let manifest = Manifest::from_toml_str(
            r#"
name = "nginx"
version = "1.2.0"
"#,
        )
        .unwrap();

        assert_eq!(manifest.name(), "nginx");
        assert_eq!(manifest.version(), &Version::new(1, 2, 0));
        assert!(manifest.conditions().is_empty());
        assert_eq!(manifest.display_name(), "nginx");
        assert_eq!(manifest.identifier(), "nginx-1.2.0");
    }

    #[test]
    fn test_parse_full_manifest() {
        let manifest = Manifest::from_toml_str(
            r#"
format_version = "3.0.0"
name = "nginx"
title = "Nginx"
version = "1.15.0"
description = "Collect logs and metrics from Nginx HTTP servers."
type = "integration"
owner = { github = "elastic/obs-infraobs-integrations" }

[conditions]
"elastic.stack" = ">=8.0.0"

[conditions.kibana]
version = "^8.7.0"
"#,
        )
        .unwrap();

        assert_eq!(manifest.display_name(), "Nginx");
        assert_eq!(manifest.package_type(), Some("integration"));
        assert_eq!(manifest.format_version(), Some("3.0.0"));
        assert_eq!(manifest.conditions().len(), 2);
        assert_eq!(manifest.condition("kibana.version").unwrap().as_str(), "^8.7.0");
        assert_eq!(
            manifest.condition("elastic.stack").unwrap().as_str(),
            ">=8.0.0"
        );
    }

    #[test]
    fn test_parse_json_manifest() {
        let manifest = Manifest::from_json_str(
            r#"{
                "name": "system",
                "version": "1.38.0",
                "conditions": { "kibana": { "version": "^7.16.0 || ^8.0.0" } }
            }"#,
        )
        .unwrap();

        assert_eq!(manifest.name(), "system");
        assert!(manifest.condition("kibana.version").is_some());
    }

    #[test]
    fn test_missing_version_names_field() {
        let err = Manifest::from_toml_str(r#"name = "nginx""#).unwrap_err();
        match err {
            InstallError::ManifestMalformed { field, .. } => {
                assert_eq!(field.as_deref(), Some("version"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    fn malformed_field(err: InstallError) -> Option<String> {
        match err {
            InstallError::ManifestMalformed { field, .. } => field,
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_mistyped_version_names_field() {
        let toml_err = Manifest::from_toml_str("name = \"nginx\"\nversion = 1\n").unwrap_err();
        assert_eq!(malformed_field(toml_err).as_deref(), Some("version"));

        let json_err = Manifest::from_json_str(r#"{"name": "nginx", "version": 1}"#).unwrap_err();
        assert_eq!(malformed_field(json_err).as_deref(), Some("version"));
    }

    #[test]
    fn test_mistyped_optional_field_names_field() {
        let err = Manifest::from_toml_str(
            "name = \"nginx\"\nversion = \"1.0.0\"\ntitle = [\"Nginx\"]\n",
        )
        .unwrap_err();
        assert_eq!(malformed_field(err).as_deref(), Some("title"));

        let err = Manifest::from_json_str(r#"{"name": 7, "version": "1.0.0"}"#).unwrap_err();
        assert_eq!(malformed_field(err).as_deref(), Some("name"));
    }

    #[test]
    fn test_missing_name_names_field() {
        let err = Manifest::from_toml_str(r#"version = "1.0.0""#).unwrap_err();
        assert!(err.to_string().contains("'name'"), "{err}");
    }

    #[test]
    fn test_empty_name_rejected() {
        let err = Manifest::from_toml_str("name = \"  \"\nversion = \"1.0.0\"").unwrap_err();
        assert!(err.to_string().contains("must not be empty"), "{err}");
    }

    #[test]
    fn test_unparsable_version() {
        let err = Manifest::from_toml_str("name = \"nginx\"\nversion = \"1.x\"").unwrap_err();
        match err {
            InstallError::ManifestMalformed { field, reason, .. } => {
                assert_eq!(field.as_deref(), Some("version"));
                assert!(reason.contains("1.x"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_invalid_condition_names_key() {
        let err = Manifest::from_toml_str(
            r#"
name = "nginx"
version = "1.0.0"
[conditions.kibana]
version = "not a range"
"#,
        )
        .unwrap_err();

        match err {
            InstallError::ManifestMalformed { field, .. } => {
                assert_eq!(field.as_deref(), Some("conditions.kibana.version"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_non_string_condition_rejected() {
        let err = Manifest::from_toml_str(
            "name = \"nginx\"\nversion = \"1.0.0\"\n[conditions]\n\"kibana.version\" = 8\n",
        )
        .unwrap_err();
        assert!(err.to_string().contains("conditions.kibana.version"), "{err}");
    }

    #[test]
    fn test_duplicate_flattened_condition_rejected() {
        let err = Manifest::from_json_str(
            r#"{
                "name": "nginx",
                "version": "1.0.0",
                "conditions": {
                    "kibana.version": "^8.0.0",
                    "kibana": { "version": "^8.7.0" }
                }
            }"#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("more than once"), "{err}");
    }

    #[test]
    fn test_invalid_toml_is_malformed() {
        let err = Manifest::from_toml_str("name = ").unwrap_err();
        assert!(matches!(err, InstallError::ManifestMalformed { field: None, .. }));
    }
}
