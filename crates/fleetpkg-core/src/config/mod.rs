//! Configuration for the management plane connection
//!
//! Read once at startup and shared read-only afterwards. Sources, later
//! wins:
//! - built-in defaults
//! - `config.toml` in the user config directory (or an explicit path)
//! - `FLEETPKG_*` environment variables

pub mod parser;
pub mod paths;

use std::fmt;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::conditions::Strictness;
use crate::error::{InstallError, Result};

pub use parser::{parse_config_file, parse_config_str};
pub use paths::{CONFIG_FILE_NAME, default_config_path};

/// Kibana address used when nothing else is configured
pub const DEFAULT_KIBANA_HOST: &str = "http://localhost:5601";

pub const ENV_KIBANA_HOST: &str = "FLEETPKG_KIBANA_HOST";
pub const ENV_USERNAME: &str = "FLEETPKG_USERNAME";
pub const ENV_PASSWORD: &str = "FLEETPKG_PASSWORD";
pub const ENV_API_KEY: &str = "FLEETPKG_API_KEY";
pub const ENV_TIMEOUT_SECS: &str = "FLEETPKG_TIMEOUT_SECS";
pub const ENV_STRICTNESS: &str = "FLEETPKG_STRICTNESS";
pub const ENV_INSECURE_SKIP_VERIFY: &str = "FLEETPKG_INSECURE_SKIP_VERIFY";

/// On-disk shape of `config.toml`. Every key is optional.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigFile {
    #[serde(default)]
    pub kibana_host: Option<String>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub timeout_secs: Option<u64>,
    #[serde(default)]
    pub strictness: Option<Strictness>,
    #[serde(default)]
    pub insecure_skip_verify: Option<bool>,
}

/// How requests authenticate against Kibana.
#[derive(Clone, PartialEq, Eq)]
pub enum Credentials {
    None,
    Basic { username: String, password: String },
    ApiKey(String),
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Credentials::None => write!(f, "None"),
            Credentials::Basic { username, .. } => f
                .debug_struct("Basic")
                .field("username", username)
                .field("password", &"<redacted>")
                .finish(),
            Credentials::ApiKey(_) => write!(f, "ApiKey(<redacted>)"),
        }
    }
}

/// Resolved, validated configuration.
#[derive(Debug, Clone)]
pub struct FleetConfig {
    /// Kibana base URL
    pub kibana_host: Url,
    pub credentials: Credentials,
    /// Deadline for the remote install call; `None` waits indefinitely
    pub timeout: Option<Duration>,
    /// Default strictness for unverified conditions
    pub strictness: Strictness,
    /// Accept invalid TLS certificates (self-signed local stacks)
    pub insecure_skip_verify: bool,
}

impl Default for FleetConfig {
    fn default() -> Self {
        Self {
            kibana_host: Url::parse(DEFAULT_KIBANA_HOST).expect("default Kibana host is valid"),
            credentials: Credentials::None,
            timeout: None,
            strictness: Strictness::default(),
            insecure_skip_verify: false,
        }
    }
}

impl FleetConfig {
    /// Load from the config file and the process environment.
    ///
    /// With `explicit_path` the file must exist; the default location is
    /// optional.
    pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
        let file = load_config_file(explicit_path)?;
        Self::from_sources(file, |key| std::env::var(key).ok())
    }

    /// Merge a parsed file with environment lookups and validate.
    pub fn from_sources<F>(file: Option<ConfigFile>, env: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let file = file.unwrap_or_default();
        let env = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let host = env(ENV_KIBANA_HOST)
            .or(file.kibana_host.clone())
            .unwrap_or_else(|| DEFAULT_KIBANA_HOST.to_string());
        let kibana_host = parse_host(&host)?;

        let username = env(ENV_USERNAME).or(file.username.clone());
        let password = env(ENV_PASSWORD).or(file.password.clone());
        let api_key = env(ENV_API_KEY).or(file.api_key.clone());
        let credentials = match (username, password, api_key) {
            (None, None, None) => Credentials::None,
            (None, None, Some(key)) => Credentials::ApiKey(key),
            (Some(username), Some(password), None) => Credentials::Basic { username, password },
            (_, _, Some(_)) => {
                return Err(InstallError::Config(
                    "set either an API key or username/password, not both".to_string(),
                ));
            }
            (Some(_), None, None) => {
                return Err(InstallError::Config("username set without password".to_string()));
            }
            (None, Some(_), None) => {
                return Err(InstallError::Config("password set without username".to_string()));
            }
        };

        let timeout_secs = match env(ENV_TIMEOUT_SECS) {
            Some(raw) => Some(raw.trim().parse::<u64>().map_err(|_| {
                InstallError::Config(format!(
                    "{ENV_TIMEOUT_SECS} must be a whole number of seconds, got '{raw}'"
                ))
            })?),
            None => file.timeout_secs,
        };

        let strictness = strictness_from_sources(&file, &env)?;

        let insecure_skip_verify = match env(ENV_INSECURE_SKIP_VERIFY) {
            Some(raw) => parse_bool(ENV_INSECURE_SKIP_VERIFY, &raw)?,
            None => file.insecure_skip_verify.unwrap_or(false),
        };

        Ok(Self {
            kibana_host,
            credentials,
            timeout: timeout_secs.filter(|s| *s > 0).map(Duration::from_secs),
            strictness,
            insecure_skip_verify,
        })
    }
}

/// Read the config file: the explicit path, which must exist, or the
/// default location when present.
pub fn load_config_file(explicit_path: Option<&Path>) -> Result<Option<ConfigFile>> {
    match explicit_path {
        Some(path) => parse_config_file(path).map(Some).map_err(config_error),
        None => match default_config_path() {
            Some(path) if path.is_file() => {
                parse_config_file(&path).map(Some).map_err(config_error)
            }
            _ => Ok(None),
        },
    }
}

/// Resolve only the strictness setting.
///
/// Check-only runs use this so host and credential settings they never use
/// cannot fail them.
pub fn load_strictness(explicit_path: Option<&Path>) -> Result<Strictness> {
    let file = load_config_file(explicit_path)?.unwrap_or_default();
    strictness_from_sources(&file, |key: &str| {
        std::env::var(key).ok().filter(|v| !v.trim().is_empty())
    })
}

fn strictness_from_sources<F>(file: &ConfigFile, env: F) -> Result<Strictness>
where
    F: Fn(&str) -> Option<String>,
{
    match env(ENV_STRICTNESS) {
        Some(raw) => raw.parse::<Strictness>().map_err(InstallError::Config),
        None => Ok(file.strictness.unwrap_or_default()),
    }
}

fn parse_host(raw: &str) -> Result<Url> {
    let url = Url::parse(raw.trim())
        .map_err(|e| InstallError::Config(format!("invalid Kibana host '{}': {}", raw, e)))?;
    match url.scheme() {
        "http" | "https" => {}
        other => {
            return Err(InstallError::Config(format!(
                "Kibana host must use http or https, got '{}'",
                other
            )));
        }
    }
    if url.cannot_be_a_base() || url.host_str().is_none() {
        return Err(InstallError::Config(format!(
            "Kibana host '{}' has no host name",
            raw
        )));
    }
    Ok(url)
}

fn parse_bool(key: &str, raw: &str) -> Result<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" => Ok(true),
        "0" | "false" | "no" => Ok(false),
        _ => Err(InstallError::Config(format!(
            "{key} must be true or false, got '{raw}'"
        ))),
    }
}

fn config_error(err: anyhow::Error) -> InstallError {
    InstallError::Config(format!("{:#}", err))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_without_sources() {
        let config = FleetConfig::from_sources(None, env_of(&[])).unwrap();
        assert_eq!(config.kibana_host.as_str(), "http://localhost:5601/");
        assert_eq!(config.credentials, Credentials::None);
        assert_eq!(config.timeout, None);
        assert_eq!(config.strictness, Strictness::Lenient);
        assert!(!config.insecure_skip_verify);
    }

    #[test]
    fn environment_overrides_file() {
        let file = ConfigFile {
            kibana_host: Some("https://file.example.com:5601".to_string()),
            timeout_secs: Some(30),
            strictness: Some(Strictness::Warn),
            ..Default::default()
        };
        let config = FleetConfig::from_sources(
            Some(file),
            env_of(&[
                (ENV_KIBANA_HOST, "https://env.example.com"),
                (ENV_STRICTNESS, "strict"),
            ]),
        )
        .unwrap();

        assert_eq!(config.kibana_host.host_str(), Some("env.example.com"));
        assert_eq!(config.timeout, Some(Duration::from_secs(30)));
        assert_eq!(config.strictness, Strictness::Strict);
    }

    #[test]
    fn basic_credentials() {
        let config = FleetConfig::from_sources(
            None,
            env_of(&[(ENV_USERNAME, "elastic"), (ENV_PASSWORD, "changeme")]),
        )
        .unwrap();
        assert_eq!(
            config.credentials,
            Credentials::Basic {
                username: "elastic".to_string(),
                password: "changeme".to_string()
            }
        );
        assert!(!format!("{:?}", config.credentials).contains("changeme"));
    }

    #[test]
    fn api_key_credentials() {
        let config =
            FleetConfig::from_sources(None, env_of(&[(ENV_API_KEY, "c2VjcmV0")])).unwrap();
        assert_eq!(config.credentials, Credentials::ApiKey("c2VjcmV0".to_string()));
        assert_eq!(format!("{:?}", config.credentials), "ApiKey(<redacted>)");
    }

    #[test]
    fn conflicting_credentials_rejected() {
        let err = FleetConfig::from_sources(
            None,
            env_of(&[
                (ENV_USERNAME, "elastic"),
                (ENV_PASSWORD, "changeme"),
                (ENV_API_KEY, "key"),
            ]),
        )
        .unwrap_err();
        assert!(matches!(err, InstallError::Config(_)));
    }

    #[test]
    fn username_without_password_rejected() {
        let err =
            FleetConfig::from_sources(None, env_of(&[(ENV_USERNAME, "elastic")])).unwrap_err();
        assert!(err.to_string().contains("without password"));
    }

    #[test]
    fn invalid_host_rejected() {
        for host in ["ftp://kibana:21", "not a url", "mailto:ops@example.com"] {
            let result = FleetConfig::from_sources(None, env_of(&[(ENV_KIBANA_HOST, host)]));
            assert!(result.is_err(), "host {host} should be rejected");
        }
    }

    #[test]
    fn invalid_timeout_rejected() {
        let err =
            FleetConfig::from_sources(None, env_of(&[(ENV_TIMEOUT_SECS, "soon")])).unwrap_err();
        assert!(err.to_string().contains(ENV_TIMEOUT_SECS));
    }

    #[test]
    fn zero_timeout_means_no_deadline() {
        let config =
            FleetConfig::from_sources(None, env_of(&[(ENV_TIMEOUT_SECS, "0")])).unwrap();
        assert_eq!(config.timeout, None);
    }

    #[test]
    fn blank_environment_values_are_ignored() {
        let file = ConfigFile {
            username: Some("elastic".to_string()),
            password: Some("changeme".to_string()),
            ..Default::default()
        };
        let config =
            FleetConfig::from_sources(Some(file), env_of(&[(ENV_USERNAME, "  ")])).unwrap();
        assert!(matches!(config.credentials, Credentials::Basic { .. }));
    }

    #[test]
    fn insecure_flag_parsing() {
        let config = FleetConfig::from_sources(
            None,
            env_of(&[(ENV_INSECURE_SKIP_VERIFY, "TRUE")]),
        )
        .unwrap();
        assert!(config.insecure_skip_verify);

        assert!(
            FleetConfig::from_sources(None, env_of(&[(ENV_INSECURE_SKIP_VERIFY, "maybe")]))
                .is_err()
        );
    }

    #[test]
    fn load_explicit_file() {
        let temp = tempfile::TempDir::new().expect("Failed to create temp dir");
        let path = temp.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "kibana_host = \"https://kibana.internal:5601\"\n").unwrap();

        let file = parse_config_file(&path).unwrap();
        let config = FleetConfig::from_sources(Some(file), env_of(&[])).unwrap();
        assert_eq!(config.kibana_host.host_str(), Some("kibana.internal"));
    }

    #[test]
    fn strictness_resolves_despite_partial_credentials() {
        let temp = tempfile::TempDir::new().expect("Failed to create temp dir");
        let path = temp.path().join(CONFIG_FILE_NAME);
        std::fs::write(&path, "username = \"elastic\"\nstrictness = \"warn\"\n").unwrap();

        let file = load_config_file(Some(&path)).unwrap().expect("file was loaded");
        assert!(FleetConfig::from_sources(Some(file.clone()), env_of(&[])).is_err());
        assert_eq!(
            strictness_from_sources(&file, env_of(&[])).unwrap(),
            Strictness::Warn
        );
        assert_eq!(
            strictness_from_sources(&file, env_of(&[(ENV_STRICTNESS, "strict")])).unwrap(),
            Strictness::Strict
        );
    }

    #[test]
    fn load_missing_explicit_file_fails() {
        let err = FleetConfig::load(Some(Path::new("/nonexistent/fleetpkg.toml"))).unwrap_err();
        assert!(matches!(err, InstallError::Config(_)));
        assert!(err.to_string().contains("Failed to read config file"));
    }
}
