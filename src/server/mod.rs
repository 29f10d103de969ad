pub mod api;
pub mod view;

use std::sync::Arc;

use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use crate::config::Config;
use crate::dashboard::{spawn_auto_refresh, Dashboard, RefreshOutcome};
use crate::slack::SlackClient;

/// Load the initial snapshot, start the auto refresh timer and serve the
/// dashboard until the listener fails.
pub async fn start(config: Arc<Config>) -> Result<()> {
    let client = SlackClient::new(config.api_base.clone(), config.slack_bot_token.clone())
        .context("Failed to build Slack client")?;
    let dashboard = Arc::new(Dashboard::new(config.clone(), Arc::new(client)));

    match dashboard.refresh_current().await {
        RefreshOutcome::Updated { records } => {
            info!(records, range = %dashboard.selected_range().label(), "initial load complete")
        }
        RefreshOutcome::Failed { message, fatal: true } => {
            bail!("Slack rejected the configuration: {}", message)
        }
        RefreshOutcome::Failed { message, .. } => {
            warn!(error = %message, "initial load failed, serving without data")
        }
        RefreshOutcome::InFlight => {}
    }

    let _refresher = spawn_auto_refresh(dashboard.clone());

    api::serve(dashboard).await
}
