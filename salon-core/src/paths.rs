// ABOUTME: Standard locations for salon's config file and data directory
// ABOUTME: ~/.config/salon for config and ~/.local/share/salon for data, logs, and the Matrix store

use directories::BaseDirs;
use std::path::PathBuf;

fn home_dir() -> Option<PathBuf> {
    BaseDirs::new().map(|d| d.home_dir().to_path_buf())
}

/// ~/.config/salon/
pub fn config_dir() -> PathBuf {
    home_dir()
        .map(|h| h.join(".config").join("salon"))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// ~/.config/salon/config.toml
pub fn config_file() -> PathBuf {
    config_dir().join("config.toml")
}

/// ~/.local/share/salon/, or ./data when no home directory is known
pub fn data_dir() -> PathBuf {
    home_dir()
        .map(|h| h.join(".local").join("share").join("salon"))
        .unwrap_or_else(|| PathBuf::from("./data"))
}

/// Expand a leading `~` to the home directory
pub fn expand_tilde(path: &str) -> String {
    let rest = match path.strip_prefix('~') {
        Some(rest) if rest.is_empty() || rest.starts_with('/') => rest.trim_start_matches('/'),
        _ => return path.to_string(),
    };
    match home_dir() {
        Some(home) if rest.is_empty() => home.to_string_lossy().to_string(),
        Some(home) => home.join(rest).to_string_lossy().to_string(),
        None => {
            tracing::warn!(path = %path, "Could not determine home directory, leaving path as is");
            path.to_string()
        }
    }
}
