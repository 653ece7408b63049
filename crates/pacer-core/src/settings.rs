//! Application settings, persisted independently of the timer.

use serde::{Deserialize, Serialize};
use tokio::sync::watch;

use crate::store::{persist, PersistOptions, StoreDocument, StoreHandle};

pub const SETTINGS_STORE: &str = "settingsState";
pub const SETTINGS_SCHEMA_VERSION: u32 = 1;

fn default_theme() -> String {
    "zinc-light".to_string()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SettingsState {
    #[serde(default = "default_theme")]
    pub theme: String,
}

impl Default for SettingsState {
    fn default() -> Self {
        Self {
            theme: default_theme(),
        }
    }
}

/// Persisted settings store backed by `document`. Must be called within
/// a tokio runtime. No migration hook: a version-mismatched blob is
/// discarded and the defaults stand.
pub fn settings_store(
    document: StoreDocument,
) -> (StoreHandle<SettingsState>, watch::Receiver<bool>) {
    persist::wrap(
        SettingsState::default(),
        document,
        PersistOptions::new(SETTINGS_STORE, SETTINGS_SCHEMA_VERSION),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_theme_is_zinc_light() {
        assert_eq!(SettingsState::default().theme, "zinc-light");
    }

    #[test]
    fn empty_blob_fills_the_default_theme() {
        let state: SettingsState = serde_json::from_str("{}").unwrap();
        assert_eq!(state.theme, "zinc-light");
    }

    #[tokio::test]
    async fn theme_round_trips_through_the_document() {
        let dir = tempfile::tempdir().unwrap();
        let document = StoreDocument::open(dir.path().join("store.json"));

        let (store, _ready) = settings_store(document.clone());
        store.update(|s| s.theme = "slate-dark".to_string());
        store.flush().await;

        let (reloaded, mut ready) = settings_store(document);
        ready.wait_for(|settled| *settled).await.unwrap();
        assert_eq!(reloaded.get().theme, "slate-dark");
    }
}
