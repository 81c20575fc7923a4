//! Probe command: run availability checks and append results.

use crate::cli::args::ProbeArgs;
use crate::core::http::build_client;
use crate::core::probe::{PROBE_CONCURRENCY, ProbeJob, probe_batch};
use crate::error::Result;
use crate::storage::{Settings, Store};

/// Execute the `probe` command.
pub async fn execute(args: &ProbeArgs, settings: &Settings) -> Result<()> {
    let store = Store::open(&settings.db_path)?;

    let offers = store.list_offers()?;
    let providers = store.providers_by_id()?;
    let groups = store.groups_by_id()?;

    let mut jobs = Vec::new();
    for offer in offers {
        if args
            .model
            .as_deref()
            .is_some_and(|filter| !offer.name.contains(filter))
        {
            continue;
        }
        // Offers with dangling references cannot be probed; they are also
        // invisible to the consolidator.
        let (Some(provider), Some(group)) =
            (providers.get(&offer.provider_id), groups.get(&offer.group_id))
        else {
            tracing::warn!(model = %offer.name, "skipping offer with unresolved references");
            continue;
        };
        jobs.push(ProbeJob {
            offer,
            provider: provider.clone(),
            group: group.clone(),
        });
    }

    if jobs.is_empty() {
        println!("nothing to probe");
        return Ok(());
    }

    let total = jobs.len();
    println!("probing {total} offers ({PROBE_CONCURRENCY} concurrent)");

    let client = build_client(settings.timeout)?;
    let mut store_errors = 0usize;
    let summary = probe_batch(&client, jobs, |done, total, offer_id, outcome| {
        if let Err(e) = store.append_test_result(
            offer_id,
            outcome.status,
            outcome.error.as_deref(),
            outcome.kind.tag(),
        ) {
            store_errors += 1;
            tracing::error!(offer_id, error = %e, "failed to record probe result");
        }
        println!("[{done}/{total}] offer {offer_id}: {}", outcome.status.label());
    })
    .await;

    println!(
        "probe finished: {} success, {} failed, {} skipped",
        summary.success, summary.failed, summary.skipped
    );
    if store_errors > 0 {
        println!("{store_errors} results could not be recorded; see logs");
    }
    Ok(())
}
