//! Offers listing with computed prices and latest probe status.

use crate::cli::args::OffersArgs;
use crate::core::pricing::final_price;
use crate::error::Result;
use crate::storage::{Settings, Store};

/// Execute the `offers` command.
pub fn execute(args: &OffersArgs, settings: &Settings) -> Result<()> {
    let store = Store::open(&settings.db_path)?;

    let offers = store.list_offers()?;
    let providers = store.providers_by_id()?;
    let groups = store.groups_by_id()?;
    let statuses = store.latest_statuses()?;

    let filtered: Vec<_> = offers
        .iter()
        .filter(|offer| {
            args.model
                .as_deref()
                .is_none_or(|filter| offer.name.contains(filter))
        })
        .collect();

    if filtered.is_empty() {
        println!("no offers stored; run 'chansync import' first");
        return Ok(());
    }

    println!(
        "{:<40}{:<14}{:<14}{:<12}{:<10}provider/group",
        "model", "quota", "final price", "status", ""
    );
    for offer in filtered {
        let provider = providers.get(&offer.provider_id);
        let group = groups.get(&offer.group_id);
        let price = match (provider, group) {
            (Some(provider), Some(group)) => final_price(offer, provider, group).to_string(),
            _ => "unresolved".to_string(),
        };
        let origin = match (provider, group) {
            (Some(provider), Some(group)) => format!("{}/{}", provider.name, group.name),
            _ => "?".to_string(),
        };
        let status = statuses.get(&offer.id).copied().unwrap_or_default();
        println!(
            "{:<40}{:<14}{:<14}{:<12}{:<10}{origin}",
            offer.name,
            offer.quota_kind.label(),
            price,
            status.label(),
            ""
        );
    }
    Ok(())
}
