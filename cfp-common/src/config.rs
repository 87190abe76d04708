//! Configuration loading and database path resolution

use std::path::PathBuf;

/// Database path resolution priority order:
/// 1. Command-line argument (highest priority)
/// 2. Environment variable
/// 3. OS-dependent compiled default (fallback)
pub fn resolve_db_path(cli_arg: Option<PathBuf>, env_var_name: &str) -> PathBuf {
    // Priority 1: Command-line argument
    if let Some(path) = cli_arg {
        return path;
    }

    // Priority 2: Environment variable
    if let Ok(path) = std::env::var(env_var_name) {
        return PathBuf::from(path);
    }

    // Priority 3: OS-dependent default
    default_db_path()
}

/// Get OS-dependent default database path
fn default_db_path() -> PathBuf {
    dirs::data_local_dir()
        .map(|d| d.join("cfp").join("cfp.db"))
        .unwrap_or_else(|| PathBuf::from("./cfp.db"))
}
