pub mod settings;
pub mod timer;

use std::path::PathBuf;

use pacer_core::StoreDocument;

/// Store document from `--store PATH`, or the per-user default.
fn open_document(store: Option<PathBuf>) -> Result<StoreDocument, Box<dyn std::error::Error>> {
    match store {
        Some(path) => Ok(StoreDocument::open(path)),
        None => Ok(StoreDocument::at_default_location()?),
    }
}
