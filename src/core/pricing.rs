//! Effective cost functions over a model offer.
//!
//! Ratios stay double-precision in storage, but every price that feeds the
//! ranking comparison is computed in `Decimal` so the four-to-five factor
//! chain cannot accumulate binary floating-point error.

use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;

use crate::core::models::{ModelOffer, PriceGroup, QuotaKind, UpstreamProvider};

/// Convert a stored ratio to an exact decimal factor.
///
/// Non-finite ratios collapse to zero, keeping the comparison key total.
#[must_use]
pub fn ratio_to_decimal(value: f64) -> Decimal {
    Decimal::from_f64(value).unwrap_or(Decimal::ZERO)
}

/// Completion price of a metered offer.
///
/// The operand order and the trailing `* 2` are a fixed contract with the
/// upstream billing pages; downstream ranking depends on the exact resulting
/// order, not just approximate magnitude.
#[must_use]
pub fn completion_price(
    offer: &ModelOffer,
    provider: &UpstreamProvider,
    group: &PriceGroup,
) -> Decimal {
    ratio_to_decimal(provider.ratio)
        * ratio_to_decimal(group.ratio)
        * ratio_to_decimal(offer.ratio)
        * ratio_to_decimal(offer.completion_ratio)
        * Decimal::TWO
}

/// Effective price used as the ranking key.
///
/// Per-request offers are priced as `price * group_ratio`; everything else
/// uses the completion price.
#[must_use]
pub fn final_price(offer: &ModelOffer, provider: &UpstreamProvider, group: &PriceGroup) -> Decimal {
    if offer.quota_kind == QuotaKind::PerRequest {
        offer.price * ratio_to_decimal(group.ratio)
    } else {
        completion_price(offer, provider, group)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::models::PriceSchema;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn provider(ratio: f64) -> UpstreamProvider {
        UpstreamProvider {
            id: 1,
            name: "ez".into(),
            base_url: "https://up.example.com".into(),
            ratio,
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

    fn offer(ratio: f64, price: Decimal, completion_ratio: f64, kind: QuotaKind) -> ModelOffer {
        ModelOffer {
            id: 1,
            name: "gpt-4".into(),
            ratio,
            price,
            completion_ratio,
            quota_kind: kind,
            provider_id: 1,
            group_id: 1,
            created_at: Utc::now(),
        }
    }

    #[test]
    fn completion_price_multiplies_all_factors_times_two() {
        let p = provider(1.5);
        let g = group(0.5);
        let o = offer(2.0, Decimal::ZERO, 4.0, QuotaKind::Metered);

        // 1.5 * 0.5 * 2 * 4 * 2 = 12
        assert_eq!(completion_price(&o, &p, &g), dec!(12));
    }

    #[test]
    fn per_request_final_price_is_price_times_group_ratio() {
        let p = provider(3.0);
        let g = group(0.8);
        let o = offer(99.0, dec!(10), 99.0, QuotaKind::PerRequest);

        // Provider and model ratios are irrelevant for per-request billing.
        assert_eq!(final_price(&o, &p, &g), dec!(8.0));
    }

    #[test]
    fn metered_final_price_falls_through_to_completion_price() {
        let p = provider(1.0);
        let g = group(1.0);
        let o = offer(1.0, dec!(50), 1.0, QuotaKind::Metered);

        // Stored price is ignored for metered offers.
        assert_eq!(final_price(&o, &p, &g), dec!(2));
    }

    #[test]
    fn unsupported_offers_use_the_metered_formula() {
        let p = provider(1.0);
        let g = group(1.0);
        let o = offer(3.0, dec!(7), 1.0, QuotaKind::Unsupported);

        assert_eq!(final_price(&o, &p, &g), dec!(6));
    }

    #[test]
    fn per_request_price_is_exact_across_repeated_computation() {
        let p = provider(1.0);
        let g = group(0.1);
        let o = offer(1.0, dec!(0.3), 1.0, QuotaKind::PerRequest);

        let first = final_price(&o, &p, &g);
        for _ in 0..1000 {
            assert_eq!(final_price(&o, &p, &g), first);
        }
        assert_eq!(first, dec!(0.03));
    }

    #[test]
    fn non_finite_ratio_collapses_to_zero() {
        assert_eq!(ratio_to_decimal(f64::NAN), Decimal::ZERO);
        assert_eq!(ratio_to_decimal(f64::INFINITY), Decimal::ZERO);
    }
}
