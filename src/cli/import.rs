//! Import command: fetch pricing feeds, normalize, and upsert offers.
//!
//! Feeds for independent providers are fetched concurrently; normalization
//! and storage run per provider/group pair. A failure in one provider or
//! group is reported and does not stop the others.

use futures::future::join_all;

use crate::cli::args::ImportArgs;
use crate::core::http::{build_client, fetch_text};
use crate::core::normalize::normalize;
use crate::error::{ChansyncError, Result};
use crate::storage::{Settings, Store};

/// Execute the `import` command.
pub async fn execute(args: &ImportArgs, settings: &Settings) -> Result<()> {
    let store = Store::open(&settings.db_path)?;

    let providers = match &args.provider {
        Some(name) => {
            let provider = store
                .provider_by_name(name)?
                .ok_or_else(|| ChansyncError::UnknownProvider(name.clone()))?;
            vec![provider]
        }
        None => store.list_providers()?,
    };
    if providers.is_empty() {
        println!("no providers registered; add one with 'chansync provider add'");
        return Ok(());
    }

    let client = build_client(settings.timeout)?;

    // Feeds are independent; fetch them all at once.
    let bodies = join_all(
        providers
            .iter()
            .map(|provider| {
                let client = &client;
                let url = provider.pricing_url();
                async move { fetch_text(client, &url).await }
            }),
    )
    .await;

    let mut imported = 0usize;
    let mut failures = 0usize;

    for (provider, body) in providers.iter().zip(bodies) {
        let body = match body {
            Ok(body) => body,
            Err(e) => {
                failures += 1;
                tracing::error!(provider = %provider.name, error = %e, "pricing fetch failed");
                eprintln!("provider '{}': fetch failed: {e}", provider.name);
                continue;
            }
        };

        let groups = match store.groups_for_provider(provider.id) {
            Ok(groups) => groups,
            Err(e) => {
                failures += 1;
                tracing::error!(provider = %provider.name, error = %e, "group lookup failed");
                continue;
            }
        };
        if groups.is_empty() {
            tracing::warn!(provider = %provider.name, "provider has no price groups");
            continue;
        }

        for group in &groups {
            let offers = normalize(&body, provider, group);
            tracing::info!(
                provider = %provider.name,
                group = %group.name,
                offers = offers.len(),
                "normalized pricing feed"
            );

            let mut stored = 0usize;
            let mut group_failed = false;
            for offer in &offers {
                match store.upsert_offer(offer) {
                    Ok(_) => stored += 1,
                    Err(e) => {
                        // Storage failure is fatal for this provider/group;
                        // the remaining pairs still run.
                        failures += 1;
                        group_failed = true;
                        tracing::error!(
                            provider = %provider.name,
                            group = %group.name,
                            model = %offer.name,
                            error = %e,
                            "offer upsert failed"
                        );
                        break;
                    }
                }
            }
            if !group_failed {
                imported += stored;
            }
        }
    }

    println!("imported {imported} offers from {} providers", providers.len());
    if failures > 0 {
        println!("{failures} provider/group imports failed; see logs");
    }
    Ok(())
}
