use anyhow::Result;
use watchlist_core::domain::optimistic::{Notification, ToggleAction, WatchToggle};

use crate::client::ApiClient;

/// Sends the toggle's action and settles the optimistic state with the server's answer.
///
/// Returns the success message; a rejected or failed request rolls the toggle back and becomes
/// an error carrying the user-facing message.
pub async fn run(api: &ApiClient, toggle: &mut WatchToggle, company: &str) -> Result<String> {
    let Some(action) = toggle.begin() else {
        anyhow::bail!("{} is already being updated", toggle.symbol());
    };
    tracing::debug!(?action, label = toggle.label(), "watchlist toggle pending");

    let symbol = toggle.symbol().to_string();
    let result = match action {
        ToggleAction::Add => api.add(&symbol, company).await,
        ToggleAction::Remove => api.remove(&symbol).await,
    };

    let notification = match result {
        Ok(outcome) => toggle.settle(&outcome),
        Err(err) => {
            tracing::warn!(error = %err, "watchlist request failed");
            toggle.abort()
        }
    };
    match notification {
        Notification::Success(msg) => Ok(msg),
        Notification::Error(msg) => anyhow::bail!(msg),
    }
}
