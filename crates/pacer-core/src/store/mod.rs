mod document;
mod handle;
pub mod persist;

pub use document::{StoreDocument, DOCUMENT_FILE};
pub use handle::StoreHandle;
pub use persist::{PersistOptions, PERSIST_VERSION_KEY};

use std::path::PathBuf;

use crate::error::{Result, StoreError};

/// Returns `~/.config/pacer[-dev]/` based on PACER_ENV.
///
/// Set PACER_ENV=dev to use the development data directory.
///
/// # Errors
/// Returns an error if creating the directory fails.
pub fn data_dir() -> Result<PathBuf> {
    let base_dir = dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".config");

    let env = std::env::var("PACER_ENV").unwrap_or_else(|_| "production".to_string());

    let dir = if env == "dev" {
        base_dir.join("pacer-dev")
    } else {
        base_dir.join("pacer")
    };

    std::fs::create_dir_all(&dir).map_err(|source| StoreError::DataDir {
        path: dir.clone(),
        source,
    })?;
    Ok(dir)
}
