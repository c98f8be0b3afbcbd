use std::path::PathBuf;

/// Environment variable that relocates the sift home directory.
pub const HOME_ENV: &str = "SIFT_HOME";

/// The sift home directory: `$SIFT_HOME`, else `~/.sift`, else `./.sift`.
pub fn sift_home() -> PathBuf {
    if let Some(override_path) = std::env::var_os(HOME_ENV).filter(|v| !v.is_empty()) {
        return PathBuf::from(override_path);
    }
    match dirs::home_dir() {
        Some(home) => home.join(".sift"),
        None => PathBuf::from(".sift"),
    }
}

/// `<home>/logs`
pub fn logs_dir() -> PathBuf {
    sift_home().join("logs")
}

/// `<home>/config.toml`
pub fn config_path() -> PathBuf {
    sift_home().join("config.toml")
}
