//! Kibana Fleet package installer over HTTP.
//!
//! Archives are uploaded to `POST /api/fleet/epm/packages` as
//! `application/zip`. Package directories are installed by identity via
//! `POST /api/fleet/epm/packages/{name}/{version}`, which makes Kibana
//! install the artifact already built for that version.

use std::path::Path;

use async_trait::async_trait;
use reqwest::header::{AUTHORIZATION, CONTENT_TYPE};
use reqwest::{RequestBuilder, StatusCode};
use serde::Deserialize;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::{Credentials, FleetConfig};
use crate::error::{InstallError, Result};
use crate::manifest::{self, Manifest};

use super::RemoteGateway;

const PACKAGES_PATH: [&str; 4] = ["api", "fleet", "epm", "packages"];
const XSRF_HEADER: &str = "kbn-xsrf";
const API_VERSION_HEADER: &str = "elastic-api-version";
const API_VERSION: &str = "2023-10-31";

/// Error body Kibana returns for failed API calls
#[derive(Debug, Deserialize)]
struct KibanaError {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Success body of the EPM install endpoints
#[derive(Debug, Default, Deserialize)]
struct InstallResponse {
    #[serde(default, rename = "_meta")]
    meta: Option<InstallMeta>,
}

#[derive(Debug, Default, Deserialize)]
struct InstallMeta {
    #[serde(default)]
    name: Option<String>,
}

/// Fleet API client. Holds only read-only connection settings.
#[derive(Debug, Clone)]
pub struct FleetClient {
    http: reqwest::Client,
    base: Url,
    credentials: Credentials,
}

impl FleetClient {
    /// Build a client from resolved configuration.
    pub fn new(config: &FleetConfig) -> Result<Self> {
        let http = reqwest::Client::builder()
            .danger_accept_invalid_certs(config.insecure_skip_verify)
            .user_agent(concat!("fleetpkg/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| InstallError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            http,
            base: config.kibana_host.clone(),
            credentials: config.credentials.clone(),
        })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Build an endpoint URL under the Kibana base path.
    fn endpoint(&self, extra: &[&str], skip_validation: bool) -> Result<Url> {
        let mut url = self.base.clone();
        url.path_segments_mut()
            .map_err(|_| {
                InstallError::Config(format!("Kibana host '{}' cannot be a base URL", self.base))
            })?
            .pop_if_empty()
            .extend(PACKAGES_PATH)
            .extend(extra);

        if skip_validation {
            url.query_pairs_mut().append_pair("skipValidation", "true");
        }
        Ok(url)
    }

    fn authorize(&self, request: RequestBuilder) -> RequestBuilder {
        let request = request
            .header(XSRF_HEADER, "fleetpkg")
            .header(API_VERSION_HEADER, API_VERSION);

        match &self.credentials {
            Credentials::None => request,
            Credentials::Basic { username, password } => {
                request.basic_auth(username, Some(password))
            }
            Credentials::ApiKey(key) => request.header(AUTHORIZATION, format!("ApiKey {key}")),
        }
    }

    /// Send a request and map the response status onto the error taxonomy.
    /// Returns the success body.
    async fn send(&self, request: RequestBuilder) -> Result<String> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response.text().await?);
        }

        let body = response.text().await.unwrap_or_default();
        debug!(status = status.as_u16(), body = %body, "Fleet API request failed");

        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            return Err(InstallError::Unauthorized {
                status: status.as_u16(),
            });
        }

        Err(InstallError::RemoteRejected {
            status: status.as_u16(),
            message: rejection_message(status, &body),
        })
    }
}

#[async_trait]
impl RemoteGateway for FleetClient {
    async fn install_archive(&self, archive: Vec<u8>, skip_validation: bool) -> Result<Manifest> {
        let manifest = manifest::load_from_archive_bytes(&archive, Path::new("<upload>"))?;
        let url = self.endpoint(&[], skip_validation)?;
        info!(
            package = %manifest.identifier(),
            bytes = archive.len(),
            "uploading package archive to Fleet"
        );

        let request = self
            .authorize(self.http.post(url))
            .header(CONTENT_TYPE, "application/zip")
            .body(archive);
        let body = self.send(request).await?;
        check_reported_package(&manifest, &body);
        Ok(manifest)
    }

    async fn install_from_directory(
        &self,
        path: &Path,
        skip_validation: bool,
    ) -> Result<Manifest> {
        let manifest = manifest::load_from_dir(path)?;
        let version = manifest.version().to_string();
        let url = self.endpoint(&[manifest.name(), version.as_str()], skip_validation)?;
        info!(package = %manifest.identifier(), "installing built package through Fleet");

        let request = self
            .authorize(self.http.post(url))
            .json(&serde_json::json!({ "force": true }));
        let body = self.send(request).await?;
        check_reported_package(&manifest, &body);
        Ok(manifest)
    }
}

/// Package name Kibana reports in `_meta.name`, if the body carries one.
fn reported_package_name(body: &str) -> Option<String> {
    serde_json::from_str::<InstallResponse>(body)
        .ok()
        .and_then(|response| response.meta)
        .and_then(|meta| meta.name)
}

/// Kibana installs whatever the artifact contains; warn when that is not
/// the package whose manifest was submitted.
fn check_reported_package(manifest: &Manifest, body: &str) {
    match reported_package_name(body) {
        Some(name) if name != manifest.name() => warn!(
            submitted = %manifest.identifier(),
            reported = %name,
            "Fleet reported a different package than the one submitted"
        ),
        Some(_) => debug!(package = %manifest.identifier(), "Fleet confirmed package"),
        None => debug!("Fleet response carried no package metadata"),
    }
}

fn rejection_message(status: StatusCode, body: &str) -> String {
    if let Ok(err) = serde_json::from_str::<KibanaError>(body) {
        if let Some(message) = err.message.or(err.error) {
            return message;
        }
    }

    let body = body.trim();
    if body.is_empty() {
        status
            .canonical_reason()
            .unwrap_or("request failed")
            .to_string()
    } else {
        body.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client(host: &str) -> FleetClient {
        let config = FleetConfig {
            kibana_host: Url::parse(host).unwrap(),
            ..Default::default()
        };
        FleetClient::new(&config).unwrap()
    }

    #[test]
    fn endpoint_without_base_path() {
        let url = client("http://localhost:5601").endpoint(&[], false).unwrap();
        assert_eq!(url.as_str(), "http://localhost:5601/api/fleet/epm/packages");
    }

    #[test]
    fn endpoint_keeps_base_path() {
        let url = client("https://example.com/kibana/")
            .endpoint(&["nginx", "1.2.0"], false)
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://example.com/kibana/api/fleet/epm/packages/nginx/1.2.0"
        );
    }

    #[test]
    fn endpoint_passes_skip_validation() {
        let url = client("http://localhost:5601").endpoint(&[], true).unwrap();
        assert_eq!(url.query(), Some("skipValidation=true"));
    }

    #[test]
    fn reported_package_name_reads_meta() {
        let body = r#"{"items":[],"_meta":{"install_source":"upload","name":"nginx"}}"#;
        assert_eq!(reported_package_name(body).as_deref(), Some("nginx"));
        assert_eq!(reported_package_name(r#"{"items":[]}"#), None);
        assert_eq!(reported_package_name(""), None);
    }

    #[test]
    fn rejection_message_prefers_kibana_message() {
        let body = r#"{"statusCode":400,"error":"Bad Request","message":"Package is invalid"}"#;
        assert_eq!(
            rejection_message(StatusCode::BAD_REQUEST, body),
            "Package is invalid"
        );
    }

    #[test]
    fn rejection_message_falls_back_to_body_or_reason() {
        assert_eq!(
            rejection_message(StatusCode::BAD_GATEWAY, "upstream down"),
            "upstream down"
        );
        assert_eq!(rejection_message(StatusCode::CONFLICT, ""), "Conflict");
    }
}
