//! Default locations for the config file and data directory
//!
//! - Config: `$STREAK_CONFIG`, else `$XDG_CONFIG_HOME/streak/config.toml`,
//!   else `~/.config/streak/config.toml`
//! - Data: `$XDG_DATA_HOME/streak`, else `~/.local/share/streak`.
//!   `STREAK_DATA_DIR` is applied by the command line on top of this.

use std::path::PathBuf;

/// Environment variable overriding the config file path
pub const STREAK_CONFIG_ENV: &str = "STREAK_CONFIG";

const APP_DIR: &str = "streak";

fn env_path(var: &str) -> Option<PathBuf> {
    std::env::var_os(var)
        .filter(|v| !v.is_empty())
        .map(PathBuf::from)
}

/// Where the config file is looked up when no path is given
pub fn default_config_path() -> PathBuf {
    if let Some(path) = env_path(STREAK_CONFIG_ENV) {
        return path;
    }
    let base = env_path("XDG_CONFIG_HOME")
        .or_else(|| env_path("HOME").map(|home| home.join(".config")))
        .unwrap_or_else(|| PathBuf::from("/tmp"));
    base.join(APP_DIR).join("config.toml")
}

/// The data directory used when the config does not name one
pub fn data_dir_without_env() -> PathBuf {
    env_path("XDG_DATA_HOME")
        .or_else(|| env_path("HOME").map(|home| home.join(".local").join("share")))
        .map(|base| base.join(APP_DIR))
        .unwrap_or_else(|| PathBuf::from("/tmp").join(APP_DIR).join("data"))
}
