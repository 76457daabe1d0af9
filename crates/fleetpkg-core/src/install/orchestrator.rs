//! Install orchestration: resolve, load manifest, validate, install, report.
//!
//! The steps run strictly in sequence and the first failure ends the run.
//! Nothing is rolled back locally because the gateway accepts or rejects
//! the whole artifact.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::info;

use crate::conditions::{self, ConditionReport};
use crate::error::{InstallError, Result};
use crate::gateway::RemoteGateway;
use crate::manifest::{self, Manifest};
use crate::source::{self, InstallSource};

use super::request::{CheckReport, InstallMethod, InstallRequest, InstallResult};

/// Run resolve, load-manifest and validate without contacting the
/// management plane.
///
/// Validation only runs for a non-empty assertion set; without assertions
/// the report is empty whatever the strictness.
pub fn check_conditions(request: &InstallRequest) -> Result<CheckReport> {
    let (source, manifest) = resolve_and_load(request)?;

    let conditions = if request.assertions.is_empty() {
        ConditionReport::default()
    } else {
        info!(package = %manifest.identifier(), "checking package conditions");
        conditions::evaluate(&manifest, &request.assertions, request.strictness)?
    };

    Ok(CheckReport {
        source,
        manifest,
        conditions,
    })
}

/// Install a package through `gateway`.
///
/// When the request carries assertions they gate the install: a
/// [`InstallError::ConditionFailure`] ends the run before the gateway is
/// called. `cancel` and `request.timeout` abort the remote call.
pub async fn install(
    gateway: &dyn RemoteGateway,
    request: &InstallRequest,
    cancel: &CancellationToken,
) -> Result<InstallResult> {
    let (source, manifest) = resolve_and_load(request)?;

    let conditions = if request.assertions.is_empty() {
        None
    } else {
        info!(package = %manifest.identifier(), "validating package conditions");
        Some(conditions::evaluate(
            &manifest,
            &request.assertions,
            request.strictness,
        )?)
    };

    if cancel.is_cancelled() {
        return Err(InstallError::Cancelled);
    }

    info!(
        package = %manifest.identifier(),
        source = %source,
        skip_validation = request.skip_validation,
        "installing package"
    );
    let (installed, method) = run_cancellable(
        call_gateway(gateway, &source, request.skip_validation),
        cancel,
        request.timeout,
    )
    .await?;

    info!(package = %manifest.identifier(), "package installed");

    Ok(InstallResult {
        source,
        manifest,
        installed,
        method,
        conditions,
    })
}

/// Load the manifest of the resolved source without validating or
/// installing it.
pub fn load_manifest(request: &InstallRequest) -> Result<(InstallSource, Manifest)> {
    resolve_and_load(request)
}

fn resolve_and_load(request: &InstallRequest) -> Result<(InstallSource, Manifest)> {
    let source = source::resolve(&request.source, &request.working_dir)?;
    let manifest = manifest::load(&source)?;
    info!(
        package = %manifest.identifier(),
        conditions = manifest.conditions().len(),
        "loaded package manifest"
    );
    Ok((source, manifest))
}

async fn call_gateway(
    gateway: &dyn RemoteGateway,
    source: &InstallSource,
    skip_validation: bool,
) -> Result<(Manifest, InstallMethod)> {
    match source {
        InstallSource::Archive(path) => {
            let bytes = tokio::fs::read(path).await?;
            let installed = gateway.install_archive(bytes, skip_validation).await?;
            Ok((installed, InstallMethod::ArchiveUpload))
        }
        InstallSource::Directory(path) => {
            let installed = gateway.install_from_directory(path, skip_validation).await?;
            Ok((installed, InstallMethod::DirectoryArtifact))
        }
    }
}

/// Await `call` unless the token fires or the deadline passes first.
async fn run_cancellable<F, T>(
    call: F,
    cancel: &CancellationToken,
    timeout: Option<Duration>,
) -> Result<T>
where
    F: Future<Output = Result<T>>,
{
    let bounded = async {
        match timeout {
            Some(after) => tokio::time::timeout(after, call)
                .await
                .map_err(|_| InstallError::Timeout { after })?,
            None => call.await,
        }
    };

    tokio::select! {
        biased;
        _ = cancel.cancelled() => Err(InstallError::Cancelled),
        result = bounded => result,
    }
}
