//! Availability probing.
//!
//! Sends one minimal request per offer to verify the model actually answers
//! under the group's credential. Each probe is isolated: a failure is
//! captured into the outcome, never propagated, so one bad offer cannot
//! abort a batch. The batch runner bounds fan-out with a counting semaphore
//! and publishes a monotonically increasing completed/total counter.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use reqwest::Client;
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::json;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::core::models::{ModelOffer, PriceGroup, ProbeStatus, QuotaKind, UpstreamProvider};
use crate::core::pricing::final_price;

/// Maximum simultaneous in-flight probes.
pub const PROBE_CONCURRENCY: usize = 5;

/// Offers above this effective price are never probed.
pub const PRICE_SKIP_THRESHOLD: Decimal = Decimal::ONE_HUNDRED;

// =============================================================================
// Probe Outcome
// =============================================================================

/// How an offer was (or was not) probed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProbeKind {
    /// Minimal chat completion request.
    Chat,
    /// Embedding request expecting a non-empty vector.
    Embedding,
    /// No request made.
    Skip,
}

impl ProbeKind {
    /// Tag recorded on the test-result row.
    #[must_use]
    pub const fn tag(self) -> &'static str {
        match self {
            Self::Chat => "chat",
            Self::Embedding => "embedding",
            Self::Skip => "skip",
        }
    }
}

/// Result of probing one offer. Never an error.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOutcome {
    pub status: ProbeStatus,
    pub error: Option<String>,
    pub kind: ProbeKind,
}

impl ProbeOutcome {
    fn success(kind: ProbeKind) -> Self {
        Self {
            status: ProbeStatus::Success,
            error: None,
            kind,
        }
    }

    fn failed(kind: ProbeKind, message: impl Into<String>) -> Self {
        Self {
            status: ProbeStatus::Failed,
            error: Some(message.into()),
            kind,
        }
    }

    fn skipped(message: impl Into<String>) -> Self {
        Self {
            status: ProbeStatus::Skipped,
            error: Some(message.into()),
            kind: ProbeKind::Skip,
        }
    }
}

/// Embedding-style models are detected by substring, matching how upstream
/// vendors name them.
#[must_use]
pub fn is_embedding_model(name: &str) -> bool {
    name.to_lowercase().contains("embedding")
}

// =============================================================================
// Single Probe
// =============================================================================

/// Probe one offer.
///
/// Offers above [`PRICE_SKIP_THRESHOLD`] or not metered are marked skipped
/// without any network call. Embedding-named models get an embedding
/// request; everything else gets a minimal chat completion.
pub async fn probe_offer(
    client: &Client,
    offer: &ModelOffer,
    provider: &UpstreamProvider,
    group: &PriceGroup,
) -> ProbeOutcome {
    let price = final_price(offer, provider, group);
    if price > PRICE_SKIP_THRESHOLD {
        return ProbeOutcome::skipped(format!(
            "price {price} exceeds threshold {PRICE_SKIP_THRESHOLD}"
        ));
    }
    if offer.quota_kind != QuotaKind::Metered {
        return ProbeOutcome::skipped(format!(
            "quota kind {} is not probed",
            offer.quota_kind.label()
        ));
    }

    if is_embedding_model(&offer.name) {
        probe_embedding(client, offer, provider, group).await
    } else {
        probe_chat(client, offer, provider, group).await
    }
}

async fn probe_chat(
    client: &Client,
    offer: &ModelOffer,
    provider: &UpstreamProvider,
    group: &PriceGroup,
) -> ProbeOutcome {
    let url = format!(
        "{}/v1/chat/completions",
        provider.base_url.trim_end_matches('/')
    );
    let body = json!({
        "model": offer.name,
        "messages": [{"role": "user", "content": "Hello"}],
        "max_tokens": 10,
    });

    let response = client
        .post(&url)
        .bearer_auth(&group.access_key)
        .json(&body)
        .send()
        .await;

    match response {
        Ok(response) if response.status().is_success() => ProbeOutcome::success(ProbeKind::Chat),
        Ok(response) => {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            ProbeOutcome::failed(ProbeKind::Chat, format!("HTTP {status}: {text}"))
        }
        Err(e) => ProbeOutcome::failed(ProbeKind::Chat, e.to_string()),
    }
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    #[serde(default)]
    data: Vec<EmbeddingData>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingData {
    #[serde(default)]
    embedding: Vec<f32>,
}

async fn probe_embedding(
    client: &Client,
    offer: &ModelOffer,
    provider: &UpstreamProvider,
    group: &PriceGroup,
) -> ProbeOutcome {
    let url = format!("{}/v1/embeddings", provider.base_url.trim_end_matches('/'));
    let body = json!({
        "model": offer.name,
        "input": "Hello world",
    });

    let response = client
        .post(&url)
        .bearer_auth(&group.access_key)
        .json(&body)
        .send()
        .await;

    match response {
        Ok(response) if response.status().is_success() => {
            match response.json::<EmbeddingResponse>().await {
                Ok(parsed)
                    if parsed
                        .data
                        .first()
                        .is_some_and(|d| !d.embedding.is_empty()) =>
                {
                    ProbeOutcome::success(ProbeKind::Embedding)
                }
                Ok(_) => ProbeOutcome::failed(ProbeKind::Embedding, "invalid embedding response"),
                Err(e) => ProbeOutcome::failed(ProbeKind::Embedding, e.to_string()),
            }
        }
        Ok(response) => {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();
            ProbeOutcome::failed(ProbeKind::Embedding, format!("HTTP {status}: {text}"))
        }
        Err(e) => ProbeOutcome::failed(ProbeKind::Embedding, e.to_string()),
    }
}

// =============================================================================
// Batch Runner
// =============================================================================

/// One unit of probe work with its resolved references.
#[derive(Debug, Clone)]
pub struct ProbeJob {
    pub offer: ModelOffer,
    pub provider: UpstreamProvider,
    pub group: PriceGroup,
}

/// Aggregate counts for a finished batch.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ProbeSummary {
    pub total: usize,
    pub success: usize,
    pub failed: usize,
    pub skipped: usize,
}

/// Run a batch of probes with bounded concurrency.
///
/// At most [`PROBE_CONCURRENCY`] probes are in flight at once; the rest
/// queue on the semaphore. `on_complete(done, total, offer_id, outcome)` is
/// invoked once per offer as results arrive (completion order, not submit
/// order). The call returns only after every dispatched probe has finished;
/// there is no mid-batch cancellation.
pub async fn probe_batch<F>(client: &Client, jobs: Vec<ProbeJob>, mut on_complete: F) -> ProbeSummary
where
    F: FnMut(usize, usize, i64, &ProbeOutcome),
{
    let total = jobs.len();
    let semaphore = Arc::new(Semaphore::new(PROBE_CONCURRENCY));
    let completed = Arc::new(AtomicUsize::new(0));
    let mut set: JoinSet<(i64, ProbeOutcome)> = JoinSet::new();

    for job in jobs {
        let client = client.clone();
        let semaphore = Arc::clone(&semaphore);
        let completed = Arc::clone(&completed);
        set.spawn(async move {
            // Semaphore is never closed while the set is alive.
            let _permit = semaphore.acquire_owned().await.expect("semaphore closed");
            let outcome = probe_offer(&client, &job.offer, &job.provider, &job.group).await;
            let done = completed.fetch_add(1, Ordering::SeqCst) + 1;
            tracing::debug!(
                model = %job.offer.name,
                status = outcome.status.label(),
                done,
                total,
                "probe finished"
            );
            (job.offer.id, outcome)
        });
    }

    let mut summary = ProbeSummary {
        total,
        ..ProbeSummary::default()
    };
    while let Some(joined) = set.join_next().await {
        let Ok((offer_id, outcome)) = joined else {
            // A panicked probe task counts as nothing; the offer simply has
            // no new result row.
            continue;
        };
        match outcome.status {
            ProbeStatus::Success => summary.success += 1,
            ProbeStatus::Failed => summary.failed += 1,
            ProbeStatus::Skipped => summary.skipped += 1,
            ProbeStatus::Untested => {}
        }
        on_complete(
            completed.load(Ordering::SeqCst).min(total),
            total,
            offer_id,
            &outcome,
        );
    }
    summary
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::PriceSchema;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn provider() -> UpstreamProvider {
        UpstreamProvider {
            id: 1,
            name: "ez".into(),
            // Nothing listens here; skip paths must return before any dial.
            base_url: "http://127.0.0.1:9".into(),
            ratio: 1.0,
            schema: PriceSchema::FlatArray,
            created_at: Utc::now(),
        }
    }

    fn group(ratio: f64) -> PriceGroup {
        PriceGroup {
            id: 1,
            provider_id: 1,
            name: "default".into(),
            ratio,
            access_key: "sk-test".into(),
            created_at: Utc::now(),
        }
    }

    fn offer(name: &str, kind: QuotaKind, price: Decimal, ratio: f64) -> ModelOffer {
        ModelOffer {
            id: 1,
            name: name.into(),
            ratio,
            price,
            completion_ratio: 1.0,
            quota_kind: kind,
            provider_id: 1,
            group_id: 1,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn embedding_detection_is_case_insensitive() {
        assert!(is_embedding_model("text-embedding-3-small"));
        assert!(is_embedding_model("Text-EMBEDDING-ada"));
        assert!(!is_embedding_model("gpt-4o"));
    }

    #[tokio::test]
    async fn expensive_offer_is_skipped_without_network() {
        let client = Client::new();
        let o = offer("gpt-4", QuotaKind::PerRequest, dec!(101), 1.0);
        let outcome = probe_offer(&client, &o, &provider(), &group(1.0)).await;

        assert_eq!(outcome.status, ProbeStatus::Skipped);
        assert_eq!(outcome.kind, ProbeKind::Skip);
        assert!(outcome.error.unwrap().contains("threshold"));
    }

    #[tokio::test]
    async fn non_metered_offer_is_skipped() {
        let client = Client::new();
        let o = offer("mj-fast", QuotaKind::PerRequest, dec!(0.3), 1.0);
        let outcome = probe_offer(&client, &o, &provider(), &group(1.0)).await;

        assert_eq!(outcome.status, ProbeStatus::Skipped);
        assert!(outcome.error.unwrap().contains("per-request"));

        let o = offer("dead", QuotaKind::Unsupported, Decimal::ZERO, 1.0);
        let outcome = probe_offer(&client, &o, &provider(), &group(1.0)).await;
        assert_eq!(outcome.status, ProbeStatus::Skipped);
    }

    #[tokio::test]
    async fn unreachable_upstream_yields_failed_not_error() {
        let client = Client::new();
        let o = offer("gpt-4", QuotaKind::Metered, Decimal::ZERO, 1.0);
        let outcome = probe_offer(&client, &o, &provider(), &group(1.0)).await;

        assert_eq!(outcome.status, ProbeStatus::Failed);
        assert_eq!(outcome.kind, ProbeKind::Chat);
        assert!(outcome.error.is_some());
    }

    #[tokio::test]
    async fn batch_reports_each_offer_exactly_once() {
        let client = Client::new();
        let jobs: Vec<ProbeJob> = (0..8)
            .map(|i| ProbeJob {
                offer: ModelOffer {
                    id: i,
                    ..offer("mj-fast", QuotaKind::PerRequest, dec!(1), 1.0)
                },
                provider: provider(),
                group: group(1.0),
            })
            .collect();

        let mut seen = Vec::new();
        let summary = probe_batch(&client, jobs, |done, total, offer_id, outcome| {
            assert_eq!(total, 8);
            assert_eq!(outcome.status, ProbeStatus::Skipped);
            seen.push((done, offer_id));
        })
        .await;

        assert_eq!(summary.total, 8);
        assert_eq!(summary.skipped, 8);
        assert_eq!(summary.success, 0);
        assert_eq!(seen.len(), 8);
        // Every offer id reported exactly once.
        let mut ids: Vec<i64> = seen.iter().map(|(_, id)| *id).collect();
        ids.sort_unstable();
        assert_eq!(ids, (0..8).collect::<Vec<_>>());
    }

    #[tokio::test]
    async fn empty_batch_completes_immediately() {
        let client = Client::new();
        let summary = probe_batch(&client, Vec::new(), |_, _, _, _| {
            panic!("no completions expected");
        })
        .await;
        assert_eq!(summary, ProbeSummary::default());
    }
}
