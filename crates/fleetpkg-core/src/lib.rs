//! fleetpkg Core Library
//!
//! Installs Elastic integration packages into a Kibana Fleet deployment:
//! resolves where the package comes from, reads its manifest, checks its
//! declared conditions against the target environment and hands the
//! artifact to the management plane.

pub mod conditions;
pub mod config;
pub mod error;
pub mod gateway;
pub mod install;
pub mod manifest;
pub mod source;

/// Re-exports of commonly used types
pub mod prelude {
    // Errors
    pub use crate::error::{ConditionViolation, InstallError, InstallStep, Result};

    // Configuration
    pub use crate::config::{Credentials, FleetConfig};

    // Sources and manifests
    pub use crate::manifest::{Manifest, ManifestFormat};
    pub use crate::source::{InstallSource, SourceRequest};

    // Conditions
    pub use crate::conditions::{Assertion, ConditionReport, Strictness, VersionRange};

    // Install
    pub use crate::gateway::{FleetClient, RemoteGateway};
    pub use crate::install::{
        CheckReport, InstallMethod, InstallRequest, InstallResult, check_conditions, install,
    };
}
