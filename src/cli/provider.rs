//! Provider and price group management commands.

use crate::cli::args::{GroupCommand, ProviderCommand};
use crate::core::models::PriceSchema;
use crate::error::{ChansyncError, Result};
use crate::storage::{Settings, Store};
use crate::util::format::mask_key;

/// Execute a `provider` subcommand.
pub fn execute_provider(command: &ProviderCommand, settings: &Settings) -> Result<()> {
    let store = Store::open(&settings.db_path)?;

    match command {
        ProviderCommand::Add {
            name,
            url,
            ratio,
            schema,
        } => {
            let schema = PriceSchema::from_cli_name(schema)?;
            let id = store.add_provider(name, url, *ratio, schema)?;
            tracing::info!(provider = %name, id, "provider added");
            println!("added provider '{name}' (id {id})");
            Ok(())
        }

        ProviderCommand::List => {
            let providers = store.list_providers()?;
            if providers.is_empty() {
                println!("no providers registered");
                return Ok(());
            }
            println!("{:<6}{:<16}{:<12}{:<14}url", "id", "name", "ratio", "schema");
            for provider in providers {
                println!(
                    "{:<6}{:<16}{:<12}{:<14}{}",
                    provider.id,
                    provider.name,
                    provider.ratio,
                    provider.schema.cli_name(),
                    provider.base_url
                );
            }
            Ok(())
        }

        ProviderCommand::Remove { name, yes } => {
            if !yes {
                return Err(ChansyncError::Config(format!(
                    "removing provider '{name}' deletes its price groups; pass --yes to confirm"
                )));
            }
            if store.remove_provider(name)? {
                println!("removed provider '{name}'");
                Ok(())
            } else {
                Err(ChansyncError::UnknownProvider(name.clone()))
            }
        }
    }
}

/// Execute a `group` subcommand.
pub fn execute_group(command: &GroupCommand, settings: &Settings) -> Result<()> {
    let store = Store::open(&settings.db_path)?;

    match command {
        GroupCommand::Add {
            name,
            provider,
            ratio,
            key,
        } => {
            let provider = store
                .provider_by_name(provider)?
                .ok_or_else(|| ChansyncError::UnknownProvider(provider.clone()))?;
            let id = store.add_group(provider.id, name, *ratio, key)?;
            tracing::info!(group = %name, provider = %provider.name, id, "group added");
            println!("added group '{name}' under '{}' (id {id})", provider.name);
            Ok(())
        }

        GroupCommand::List { provider } => {
            let groups = match provider {
                Some(provider_name) => {
                    let provider = store
                        .provider_by_name(provider_name)?
                        .ok_or_else(|| ChansyncError::UnknownProvider(provider_name.clone()))?;
                    store.groups_for_provider(provider.id)?
                }
                None => store.list_groups()?,
            };
            if groups.is_empty() {
                println!("no groups registered");
                return Ok(());
            }
            let providers = store.providers_by_id()?;
            println!(
                "{:<6}{:<16}{:<16}{:<12}key",
                "id", "name", "provider", "ratio"
            );
            for group in groups {
                let provider_name = providers
                    .get(&group.provider_id)
                    .map_or("?", |p| p.name.as_str());
                println!(
                    "{:<6}{:<16}{:<16}{:<12}{}",
                    group.id,
                    group.name,
                    provider_name,
                    group.ratio,
                    mask_key(&group.access_key)
                );
            }
            Ok(())
        }

        GroupCommand::Remove {
            name,
            provider,
            yes,
        } => {
            if !yes {
                return Err(ChansyncError::Config(format!(
                    "pass --yes to confirm removing group '{name}'"
                )));
            }
            let provider = store
                .provider_by_name(provider)?
                .ok_or_else(|| ChansyncError::UnknownProvider(provider.clone()))?;
            let group = store
                .group_by_name(provider.id, name)?
                .ok_or_else(|| ChansyncError::UnknownGroup(name.clone()))?;
            store.remove_group(group.id)?;
            println!("removed group '{name}'");
            Ok(())
        }
    }
}
