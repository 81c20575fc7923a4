//! Channel consolidation.
//!
//! Groups verified offers by model name across all providers and price
//! groups, ranks them by effective price, and buckets the ranked offers
//! into gateway channel definitions with priority tiers. Pure over its
//! input snapshot; any well-formed (even empty) offer set produces a
//! result, never an error.

use std::collections::HashMap;

use rust_decimal::Decimal;

use crate::core::models::{
    ChannelRequest, ModelOffer, PriceGroup, ProbeStatus, UpstreamProvider,
};
use crate::core::pricing::final_price;

/// Highest priority tier assigned to the cheapest offer of a model.
pub const MAX_PRIORITY: i64 = 100;

/// Bucket key: one channel per (provider, group, priority) combination.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct ChannelKey {
    provider_id: i64,
    group_id: i64,
    priority: i64,
}

/// Channel metadata taken from the first offer seen for a (provider, group)
/// pair. All offers sharing that pair are assumed to share one credential
/// and base URL; this is not separately validated.
#[derive(Debug, Clone)]
struct ChannelMeta {
    base_url: String,
    access_key: String,
    group_name: String,
}

/// Consolidate verified offers into channel requests.
///
/// Offers whose latest probe is not [`ProbeStatus::Success`] or whose
/// provider/group references do not resolve are excluded up front. Within
/// each model group, offers sort ascending by (final price, provider id,
/// group id); rank N gets priority `max(1, 100 - N)`. Buckets sharing a
/// (provider, group, priority) key merge into one channel. The emitted list
/// is ordered by priority descending, then name ascending.
#[must_use]
pub fn consolidate(
    offers: &[ModelOffer],
    providers: &HashMap<i64, UpstreamProvider>,
    groups: &HashMap<i64, PriceGroup>,
    latest_status: &HashMap<i64, ProbeStatus>,
) -> Vec<ChannelRequest> {
    let valid: Vec<&ModelOffer> = offers
        .iter()
        .filter(|o| {
            latest_status.get(&o.id).copied().unwrap_or_default() == ProbeStatus::Success
                && providers.contains_key(&o.provider_id)
                && groups.contains_key(&o.group_id)
        })
        .collect();
    if valid.is_empty() {
        return Vec::new();
    }

    let mut by_model: HashMap<&str, Vec<&ModelOffer>> = HashMap::new();
    for offer in valid {
        by_model.entry(offer.name.as_str()).or_default().push(offer);
    }

    let mut buckets: HashMap<ChannelKey, Vec<&ModelOffer>> = HashMap::new();
    let mut meta_cache: HashMap<(i64, i64), ChannelMeta> = HashMap::new();

    for model_offers in by_model.values_mut() {
        model_offers.sort_by(|a, b| {
            let price_a = priced(a, providers, groups);
            let price_b = priced(b, providers, groups);
            price_a
                .cmp(&price_b)
                .then(a.provider_id.cmp(&b.provider_id))
                .then(a.group_id.cmp(&b.group_id))
        });

        for (rank, offer) in model_offers.iter().enumerate() {
            // Rank 0 (cheapest) gets priority 100; each later rank loses one
            // point, floored at 1.
            let priority = (MAX_PRIORITY - rank as i64).max(1);
            let key = ChannelKey {
                provider_id: offer.provider_id,
                group_id: offer.group_id,
                priority,
            };

            meta_cache
                .entry((offer.provider_id, offer.group_id))
                .or_insert_with(|| {
                    let provider = &providers[&offer.provider_id];
                    let group = &groups[&offer.group_id];
                    ChannelMeta {
                        base_url: provider.base_url.clone(),
                        access_key: group.access_key.clone(),
                        group_name: group.name.clone(),
                    }
                });

            buckets.entry(key).or_default().push(*offer);
        }
    }

    let mut result: Vec<ChannelRequest> = buckets
        .into_iter()
        .map(|(key, bucket)| {
            let meta = &meta_cache[&(key.provider_id, key.group_id)];
            let models: Vec<&str> = bucket.iter().map(|o| o.name.as_str()).collect();
            ChannelRequest {
                name: format!("{}-P{}", meta.group_name, key.priority),
                channel_type: 1,
                key: meta.access_key.clone(),
                base_url: meta.base_url.clone(),
                models: models.join(","),
                model_mapping: "{}".to_string(),
                groups: vec!["default".to_string()],
                priority: key.priority,
                weight: 1,
            }
        })
        .collect();

    result.sort_by(|a, b| b.priority.cmp(&a.priority).then_with(|| a.name.cmp(&b.name)));
    result
}

fn priced(
    offer: &ModelOffer,
    providers: &HashMap<i64, UpstreamProvider>,
    groups: &HashMap<i64, PriceGroup>,
) -> Decimal {
    final_price(offer, &providers[&offer.provider_id], &groups[&offer.group_id])
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::{PriceSchema, QuotaKind};
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn provider(id: i64, name: &str) -> UpstreamProvider {
        UpstreamProvider {
            id,
            name: name.into(),
            base_url: format!("https://{name}.example.com"),
            ratio: 1.0,
            schema: PriceSchema::FlatArray,
            created_at: Utc::now(),
        }
    }

    fn group(id: i64, provider_id: i64, name: &str) -> PriceGroup {
        PriceGroup {
            id,
            provider_id,
            name: name.into(),
            ratio: 1.0,
            access_key: format!("sk-{name}"),
            created_at: Utc::now(),
        }
    }

    fn per_request_offer(
        id: i64,
        name: &str,
        price: Decimal,
        provider_id: i64,
        group_id: i64,
    ) -> ModelOffer {
        ModelOffer {
            id,
            name: name.into(),
            ratio: 1.0,
            price,
            completion_ratio: 1.0,
            quota_kind: QuotaKind::PerRequest,
            provider_id,
            group_id,
            created_at: Utc::now(),
        }
    }

    struct Fixture {
        providers: HashMap<i64, UpstreamProvider>,
        groups: HashMap<i64, PriceGroup>,
        latest: HashMap<i64, ProbeStatus>,
    }

    impl Fixture {
        fn new() -> Self {
            let mut providers = HashMap::new();
            providers.insert(100, provider(100, "cheap"));
            providers.insert(200, provider(200, "spendy"));
            let mut groups = HashMap::new();
            groups.insert(1, group(1, 100, "alpha"));
            groups.insert(2, group(2, 200, "beta"));
            Self {
                providers,
                groups,
                latest: HashMap::new(),
            }
        }

        fn verified(&mut self, offer_id: i64) {
            self.latest.insert(offer_id, ProbeStatus::Success);
        }
    }

    #[test]
    fn empty_input_yields_empty_output() {
        let fx = Fixture::new();
        assert!(consolidate(&[], &fx.providers, &fx.groups, &fx.latest).is_empty());
    }

    #[test]
    fn cheaper_offer_gets_strictly_higher_priority() {
        let mut fx = Fixture::new();
        let offers = vec![
            per_request_offer(1, "gpt-4", dec!(10), 100, 1),
            per_request_offer(2, "gpt-4", dec!(20), 200, 2),
        ];
        fx.verified(1);
        fx.verified(2);

        let channels = consolidate(&offers, &fx.providers, &fx.groups, &fx.latest);
        assert_eq!(channels.len(), 2);

        // Cheapest channel first in the emitted list.
        assert_eq!(channels[0].name, "alpha-P100");
        assert_eq!(channels[0].priority, 100);
        assert_eq!(channels[0].base_url, "https://cheap.example.com");
        assert_eq!(channels[0].key, "sk-alpha");
        assert_eq!(channels[1].name, "beta-P99");
        assert_eq!(channels[1].priority, 99);
    }

    #[test]
    fn same_ranking_across_models_merges_into_shared_buckets() {
        let mut fx = Fixture::new();
        // Two models, each offered by both providers at the same price order.
        let offers = vec![
            per_request_offer(1, "gpt-4", dec!(1), 100, 1),
            per_request_offer(2, "gpt-4", dec!(2), 200, 2),
            per_request_offer(3, "claude-3", dec!(1), 100, 1),
            per_request_offer(4, "claude-3", dec!(2), 200, 2),
        ];
        for id in 1..=4 {
            fx.verified(id);
        }

        let channels = consolidate(&offers, &fx.providers, &fx.groups, &fx.latest);
        assert_eq!(channels.len(), 2);

        let mut top_models: Vec<&str> = channels[0].models.split(',').collect();
        top_models.sort_unstable();
        assert_eq!(top_models, vec!["claude-3", "gpt-4"]);
        assert_eq!(channels[0].priority, 100);
        assert_eq!(channels[1].priority, 99);
    }

    #[test]
    fn identical_price_breaks_ties_by_provider_then_group_id() {
        let mut fx = Fixture::new();
        let offers = vec![
            per_request_offer(1, "gpt-4", dec!(5), 200, 2),
            per_request_offer(2, "gpt-4", dec!(5), 100, 1),
        ];
        fx.verified(1);
        fx.verified(2);

        let channels = consolidate(&offers, &fx.providers, &fx.groups, &fx.latest);
        // Lower provider id wins rank 0 on a price tie.
        assert_eq!(channels[0].name, "alpha-P100");
        assert_eq!(channels[1].name, "beta-P99");
    }

    #[test]
    fn priority_never_drops_below_one() {
        let mut fx = Fixture::new();
        let mut offers = Vec::new();
        // 150 competing offers for one model, all under one provider/group so
        // the deep ranks are exercised.
        for i in 0..150 {
            offers.push(per_request_offer(i, "gpt-4", Decimal::from(i), 100, 1));
            fx.verified(i);
        }

        let channels = consolidate(&offers, &fx.providers, &fx.groups, &fx.latest);
        assert!(channels.iter().all(|c| c.priority >= 1));
        // Ranks 99..149 all floor at priority 1 and share one bucket.
        let floor = channels.iter().find(|c| c.priority == 1).unwrap();
        assert_eq!(floor.models.split(',').count(), 51);
    }

    #[test]
    fn unverified_offers_are_excluded() {
        let mut fx = Fixture::new();
        let offers = vec![
            per_request_offer(1, "gpt-4", dec!(1), 100, 1),
            per_request_offer(2, "gpt-4", dec!(2), 200, 2),
        ];
        fx.verified(1);
        fx.latest.insert(2, ProbeStatus::Failed);

        let channels = consolidate(&offers, &fx.providers, &fx.groups, &fx.latest);
        assert_eq!(channels.len(), 1);
        assert_eq!(channels[0].models, "gpt-4");
    }

    #[test]
    fn offers_with_unresolved_references_are_excluded() {
        let mut fx = Fixture::new();
        let offers = vec![
            per_request_offer(1, "gpt-4", dec!(1), 999, 1),
            per_request_offer(2, "gpt-4", dec!(2), 100, 999),
        ];
        fx.verified(1);
        fx.verified(2);

        assert!(consolidate(&offers, &fx.providers, &fx.groups, &fx.latest).is_empty());
    }

    #[test]
    fn untested_offers_are_excluded() {
        let mut fx = Fixture::new();
        let offers = vec![per_request_offer(1, "gpt-4", dec!(1), 100, 1)];
        // No probe record at all for offer 1.
        assert!(consolidate(&offers, &fx.providers, &fx.groups, &fx.latest).is_empty());
        fx.verified(1);
        assert_eq!(
            consolidate(&offers, &fx.providers, &fx.groups, &fx.latest).len(),
            1
        );
    }

    #[test]
    fn emitted_channels_carry_default_group_and_empty_mapping() {
        let mut fx = Fixture::new();
        let offers = vec![per_request_offer(1, "gpt-4", dec!(1), 100, 1)];
        fx.verified(1);

        let channels = consolidate(&offers, &fx.providers, &fx.groups, &fx.latest);
        assert_eq!(channels[0].groups, vec!["default".to_string()]);
        assert_eq!(channels[0].model_mapping, "{}");
        assert_eq!(channels[0].weight, 1);
        assert_eq!(channels[0].channel_type, 1);
    }
}
