use std::path::PathBuf;

use clap::Subcommand;
use pacer_core::settings::settings_store;

#[derive(Subcommand)]
pub enum SettingsAction {
    /// Show or set the UI theme
    Theme {
        /// New theme name; omit to print the current one
        value: Option<String>,
    },
    /// Print all settings as JSON
    Show,
}

pub async fn run(
    action: SettingsAction,
    store: Option<PathBuf>,
) -> Result<(), Box<dyn std::error::Error>> {
    let document = super::open_document(store)?;
    let (settings, mut ready) = settings_store(document);
    let _ = ready.wait_for(|settled| *settled).await;

    match action {
        SettingsAction::Theme { value: Some(theme) } => {
            let state = settings.update(|s| s.theme = theme);
            println!("{}", serde_json::to_string_pretty(&state)?);
        }
        SettingsAction::Theme { value: None } => {
            println!("{}", settings.read(|s| s.theme.clone()));
        }
        SettingsAction::Show => {
            println!("{}", serde_json::to_string_pretty(&settings.get())?);
        }
    }

    settings.flush().await;
    Ok(())
}
