//! Aliases command: derive the alias mapping from the gateway's model set.

use std::collections::BTreeSet;

use crate::core::alias::build_aliases;
use crate::core::http::build_client;
use crate::error::{ChansyncError, Result};
use crate::gateway::GatewayClient;
use crate::storage::Settings;

/// Execute the `aliases` command.
pub async fn execute(settings: &Settings) -> Result<()> {
    let (gateway_url, token) = settings.gateway()?;
    let client = build_client(settings.timeout)?;
    let gateway = GatewayClient::new(client, gateway_url, token, settings.gateway_user.as_deref());

    let page = gateway
        .list_channels(1, 10_000)
        .await?
        .into_result()?
        .ok_or_else(|| ChansyncError::ParseResponse("channel list missing data".to_string()))?;

    let models: BTreeSet<String> = page
        .items
        .iter()
        .flat_map(|channel| channel.models.split(','))
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(ToString::to_string)
        .collect();

    let names: Vec<String> = models.into_iter().collect();
    let aliases = build_aliases(&names);

    let rendered = serde_json::to_string_pretty(&aliases).map_err(anyhow::Error::from)?;
    println!("{rendered}");
    Ok(())
}
