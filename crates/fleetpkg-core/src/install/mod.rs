//! Package installation.
//!
//! Two operations share the same front half:
//! - [`check_conditions`] resolves the source, loads the manifest and
//!   evaluates assertions, never contacting the management plane
//! - [`install`] does the same (evaluating only when assertions are given)
//!   and then hands the artifact to a [`RemoteGateway`](crate::gateway::RemoteGateway)

mod orchestrator;
mod request;

pub use orchestrator::{check_conditions, install, load_manifest};
pub use request::{CheckReport, InstallMethod, InstallRequest, InstallResult};
