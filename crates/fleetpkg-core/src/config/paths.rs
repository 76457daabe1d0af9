//! Config path resolution helpers.

use std::path::{Path, PathBuf};

/// File name of the configuration file inside the config directory.
pub const CONFIG_FILE_NAME: &str = "config.toml";

/// `$XDG_CONFIG_HOME/fleetpkg/config.toml`, or the platform equivalent.
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| config_path_in(&dir))
}

pub fn config_path_in(config_dir: &Path) -> PathBuf {
    config_dir.join("fleetpkg").join(CONFIG_FILE_NAME)
}
