#![allow(clippy::module_name_repetitions)]
//! Data directory resolution.
//!
//! The data directory defaults to `data/` relative to the working
//! directory and can be moved with the `DATA_DIR` environment variable.

use std::path::{Path, PathBuf};

/// Default data directory when `DATA_DIR` is unset.
pub const DEFAULT_DATA_DIR: &str = "data";

/// Returns the data directory, honoring `DATA_DIR`.
#[must_use]
pub fn data_dir() -> PathBuf {
    std::env::var("DATA_DIR")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .map_or_else(|| PathBuf::from(DEFAULT_DATA_DIR), PathBuf::from)
}

/// Ensures a directory exists, creating it if necessary.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be created.
pub async fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !tokio::fs::try_exists(path).await.unwrap_or(false) {
        tokio::fs::create_dir_all(path).await?;
    }
    Ok(())
}
