//! Source resolution for package installs.
//!
//! Decides which artifact an install uses:
//! - an explicit zip archive (`--zip`), which always wins
//! - an explicit package directory (`--root`)
//! - otherwise the nearest ancestor of the working directory that holds
//!   a manifest file

mod resolver;
mod spec;

pub use resolver::{find_package_root, resolve};
pub use spec::{InstallSource, SourceRequest};
