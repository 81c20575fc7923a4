//! Sync command: consolidate verified offers into channels and reconcile
//! them against the gateway.
//!
//! Matching is by channel name. A name that exists with a different model
//! list gets a models-only update; a missing name is created; an identical
//! one is left alone. Channels on the gateway that the consolidation no
//! longer produces are reported as extra (and deleted with `--prune --yes`).

use std::collections::HashMap;

use crate::cli::args::SyncArgs;
use crate::core::consolidate::consolidate;
use crate::core::http::build_client;
use crate::error::{ChansyncError, Result};
use crate::gateway::{GatewayClient, UpdateChannelRequest};
use crate::storage::{Settings, Store};

/// Page size used to fetch the full existing channel list.
const LIST_PAGE_SIZE: u32 = 10_000;

/// Execute the `sync` command.
pub async fn execute(args: &SyncArgs, settings: &Settings) -> Result<()> {
    let store = Store::open(&settings.db_path)?;

    let offers = store.list_offers()?;
    let providers = store.providers_by_id()?;
    let groups = store.groups_by_id()?;
    let statuses = store.latest_statuses()?;

    let requests = consolidate(&offers, &providers, &groups, &statuses);
    if requests.is_empty() {
        println!("consolidation produced no channels; import and probe offers first");
        return Ok(());
    }

    if args.dry_run {
        println!("would sync {} channels:", requests.len());
        for request in &requests {
            println!(
                "  {:<24} priority {:<4} {} models",
                request.name,
                request.priority,
                request.models.split(',').count()
            );
        }
        return Ok(());
    }

    let (gateway_url, token) = settings.gateway()?;
    let client = build_client(settings.timeout)?;
    let gateway = GatewayClient::new(client, gateway_url, token, settings.gateway_user.as_deref());

    let existing = gateway
        .list_channels(1, LIST_PAGE_SIZE)
        .await?
        .into_result()?
        .ok_or_else(|| ChansyncError::ParseResponse("channel list missing data".to_string()))?;
    let existing_by_name: HashMap<&str, &crate::gateway::Channel> = existing
        .items
        .iter()
        .map(|c| (c.name.as_str(), c))
        .collect();

    let mut added = 0usize;
    let mut updated = 0usize;
    let mut unchanged = 0usize;
    let mut errors = 0usize;
    let mut synced_names: Vec<String> = Vec::new();

    for request in &requests {
        synced_names.push(request.name.clone());
        if let Some(channel) = existing_by_name.get(request.name.as_str()) {
            if normalize_models(&request.models) == normalize_models(&channel.models) {
                unchanged += 1;
                continue;
            }
            let update = UpdateChannelRequest {
                id: channel.id,
                models: Some(request.models.clone()),
                ..UpdateChannelRequest::default()
            };
            match gateway.update_channel(&update).await.and_then(|r| r.into_result()) {
                Ok(_) => updated += 1,
                Err(e) => {
                    errors += 1;
                    tracing::error!(channel = %request.name, error = %e, "channel update failed");
                    eprintln!("update '{}' failed: {e}", request.name);
                }
            }
        } else {
            match gateway.add_channel(request).await.and_then(|r| r.into_result()) {
                Ok(_) => added += 1,
                Err(e) => {
                    errors += 1;
                    tracing::error!(channel = %request.name, error = %e, "channel create failed");
                    eprintln!("create '{}' failed: {e}", request.name);
                }
            }
        }
    }

    let extras: Vec<&crate::gateway::Channel> = existing
        .items
        .iter()
        .filter(|c| !synced_names.iter().any(|name| name == &c.name))
        .collect();

    println!("added {added}, updated {updated}, unchanged {unchanged} channels");
    if errors > 0 {
        println!("{errors} channel operations failed; see logs");
    }

    if extras.is_empty() {
        return Ok(());
    }

    if args.prune {
        if !args.yes {
            return Err(ChansyncError::Config(
                "pass --yes to confirm pruning extra channels".to_string(),
            ));
        }
        let ids: Vec<i64> = extras.iter().map(|c| c.id).collect();
        let deleted = gateway
            .delete_channels(&ids)
            .await?
            .into_result()?
            .unwrap_or_default();
        println!("pruned {deleted} extra channels");
    } else {
        let names: Vec<&str> = extras.iter().map(|c| c.name.as_str()).collect();
        println!("extra channels not covered by this sync: {}", names.join(", "));
    }
    Ok(())
}

/// Order-insensitive canonical form of a comma-joined model list.
fn normalize_models(models: &str) -> String {
    let mut parts: Vec<&str> = models
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect();
    parts.sort_unstable();
    parts.join(",")
}
