//! Remote management plane boundary.
//!
//! The orchestrator only talks to Kibana through [`RemoteGateway`]. The
//! gateway treats an install as all-or-nothing: it either accepts the whole
//! artifact or rejects it, and errors come back unchanged.

pub mod fleet;

use std::path::Path;

use async_trait::async_trait;

use crate::error::Result;
use crate::manifest::Manifest;

pub use fleet::FleetClient;

/// Performs the install call against the management plane.
///
/// `skip_validation` asks the remote side to skip its own re-validation of
/// the package contents; implementations pass it through untouched.
#[async_trait]
pub trait RemoteGateway: Send + Sync {
    /// Upload a built package archive.
    async fn install_archive(&self, archive: Vec<u8>, skip_validation: bool) -> Result<Manifest>;

    /// Install the pre-built artifact of the package rooted at `path`.
    async fn install_from_directory(&self, path: &Path, skip_validation: bool)
    -> Result<Manifest>;
}
