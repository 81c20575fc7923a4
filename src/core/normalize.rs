//! Price feed normalization.
//!
//! Turns one of four vendor-specific pricing payloads into a uniform
//! sequence of [`NormalizedOffer`] records for a (provider, group) pair.
//! Parsing is tolerant: a record with a missing or mistyped field is dropped
//! silently, and an absent top-level section yields an empty sequence. No
//! I/O happens here; callers hand in the already-fetched body.

use rust_decimal::Decimal;
use rust_decimal::prelude::FromPrimitive;
use serde_json::Value;

use crate::core::models::{NormalizedOffer, PriceGroup, PriceSchema, QuotaKind, UpstreamProvider};

/// Normalize a raw pricing payload into canonical offers.
///
/// Dispatches on the provider's declared schema. Never fails: unparseable
/// input produces an empty vector.
#[must_use]
pub fn normalize(
    raw_json: &str,
    provider: &UpstreamProvider,
    group: &PriceGroup,
) -> Vec<NormalizedOffer> {
    let Ok(root) = serde_json::from_str::<Value>(raw_json) else {
        return Vec::new();
    };

    match provider.schema {
        PriceSchema::FlatArray => from_flat_array(&root, provider, group),
        PriceSchema::GroupedTable => from_grouped_table(&root, provider, group),
        PriceSchema::ColumnMaps => from_column_maps(&root, provider, group),
        PriceSchema::GroupPriceTable => from_group_price_table(&root, provider, group),
    }
}

/// Flat `data` array: one record per model with a verbatim quota-type code.
fn from_flat_array(
    root: &Value,
    provider: &UpstreamProvider,
    group: &PriceGroup,
) -> Vec<NormalizedOffer> {
    let Some(data) = root.get("data").and_then(Value::as_array) else {
        return Vec::new();
    };

    let mut offers = Vec::new();
    for item in data {
        let Some(name) = item.get("model_name").and_then(Value::as_str) else {
            continue;
        };
        let (Some(ratio), Some(completion_ratio), Some(quota_type), Some(price)) = (
            item.get("model_ratio").and_then(Value::as_f64),
            item.get("completion_ratio").and_then(Value::as_f64),
            item.get("quota_type").and_then(Value::as_i64),
            item.get("model_price").and_then(as_decimal),
        ) else {
            continue;
        };

        offers.push(NormalizedOffer {
            name: name.to_string(),
            ratio,
            price,
            completion_ratio,
            quota_kind: QuotaKind::from_code(quota_type),
            provider_id: provider.id,
            group_id: group.id,
        });
    }
    offers
}

/// Grouped price table: `data.model_info[].price_info[group]["default"]`.
///
/// Only entries carrying the current group's key are extracted. This
/// vendor's quota code is inverted relative to the flat schema: source 1 is
/// metered, everything else is per-request.
fn from_grouped_table(
    root: &Value,
    provider: &UpstreamProvider,
    group: &PriceGroup,
) -> Vec<NormalizedOffer> {
    let Some(model_info) = root
        .get("data")
        .and_then(|d| d.get("model_info"))
        .and_then(Value::as_array)
    else {
        return Vec::new();
    };

    let mut offers = Vec::new();
    for model in model_info {
        let Some(name) = model.get("model_name").and_then(Value::as_str) else {
            continue;
        };
        let Some(tier) = model
            .get("price_info")
            .and_then(|p| p.get(&group.name))
            .and_then(|g| g.get("default"))
        else {
            continue;
        };
        let (Some(quota_type), Some(price), Some(ratio), Some(completion_ratio)) = (
            tier.get("quota_type").and_then(Value::as_i64),
            tier.get("model_price").and_then(as_decimal),
            tier.get("model_ratio").and_then(Value::as_f64),
            tier.get("model_completion_ratio").and_then(Value::as_f64),
        ) else {
            continue;
        };

        offers.push(NormalizedOffer {
            name: name.to_string(),
            ratio,
            price,
            completion_ratio,
            quota_kind: if quota_type == 1 {
                QuotaKind::Metered
            } else {
                QuotaKind::PerRequest
            },
            provider_id: provider.id,
            group_id: group.id,
        });
    }
    offers
}

/// Column-oriented maps: `ModelRatio` / `CompletionRatio` / `ModelFixedPrice`
/// keyed by model name.
///
/// The completion-ratio map drives iteration; a model absent from the ratio
/// map defaults its ratio to 1.0. Price is never populated for this vendor
/// and quota is always metered. The fixed-price map is only consulted for
/// completeness of the top-level shape.
fn from_column_maps(
    root: &Value,
    provider: &UpstreamProvider,
    group: &PriceGroup,
) -> Vec<NormalizedOffer> {
    let Some(data) = root.get("data") else {
        return Vec::new();
    };
    let (Some(ratio_map), Some(completion_map), Some(_price_map)) = (
        data.get("ModelRatio").and_then(Value::as_object),
        data.get("CompletionRatio").and_then(Value::as_object),
        data.get("ModelFixedPrice").and_then(Value::as_object),
    ) else {
        return Vec::new();
    };

    let mut offers = Vec::new();
    for (name, completion) in completion_map {
        let Some(completion_ratio) = completion.as_f64() else {
            continue;
        };
        let ratio = ratio_map.get(name).and_then(Value::as_f64).unwrap_or(1.0);

        offers.push(NormalizedOffer {
            name: name.clone(),
            ratio,
            price: Decimal::ZERO,
            completion_ratio,
            quota_kind: QuotaKind::Metered,
            provider_id: provider.id,
            group_id: group.id,
        });
    }
    offers
}

/// Group/price-type table: `data.model_group[group]` holding a group ratio
/// and a `ModelPrice` table of `{priceType, price}` entries, with completion
/// ratios in a separate flat map.
///
/// A metered entry's price value is reinterpreted as the model ratio and the
/// stored price becomes zero; a per-request entry stores the price and the
/// ratio is irrelevant.
fn from_group_price_table(
    root: &Value,
    provider: &UpstreamProvider,
    group: &PriceGroup,
) -> Vec<NormalizedOffer> {
    let Some(data) = root.get("data") else {
        return Vec::new();
    };
    let completion_map = data.get("model_completion_ratio");
    let Some(group_node) = data.get("model_group").and_then(|g| g.get(&group.name)) else {
        return Vec::new();
    };
    if group_node.get("GroupRatio").and_then(Value::as_f64).is_none() {
        return Vec::new();
    }
    let Some(price_table) = group_node.get("ModelPrice").and_then(Value::as_object) else {
        return Vec::new();
    };

    let mut offers = Vec::new();
    for (name, entry) in price_table {
        let Some(price_type) = entry.get("priceType").and_then(Value::as_i64) else {
            continue;
        };
        let Some(price) = entry.get("price").and_then(as_decimal) else {
            continue;
        };
        let completion_ratio = completion_map
            .and_then(|m| m.get(name))
            .and_then(Value::as_f64)
            .unwrap_or(1.0);

        let quota_kind = match price_type {
            0 => QuotaKind::Metered,
            1 => QuotaKind::PerRequest,
            _ => QuotaKind::Unsupported,
        };

        offers.push(NormalizedOffer {
            name: name.clone(),
            ratio: if price_type == 0 {
                decimal_to_f64(price)
            } else {
                1.0
            },
            price: if price_type == 1 { price } else { Decimal::ZERO },
            completion_ratio,
            quota_kind,
            provider_id: provider.id,
            group_id: group.id,
        });
    }
    offers
}

/// Read a JSON number as an exact decimal.
///
/// Integer and float representations are both accepted; non-numeric values
/// yield None so the record is skipped.
fn as_decimal(value: &Value) -> Option<Decimal> {
    if let Some(int) = value.as_i64() {
        return Some(Decimal::from(int));
    }
    value.as_f64().and_then(Decimal::from_f64)
}

fn decimal_to_f64(value: Decimal) -> f64 {
    use rust_decimal::prelude::ToPrimitive;
    value.to_f64().unwrap_or(0.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use rust_decimal_macros::dec;

    fn provider(schema: PriceSchema) -> UpstreamProvider {
        UpstreamProvider {
            id: 10,
            name: "vendor".into(),
            base_url: "https://up.example.com".into(),
            ratio: 1.0,
            schema,
            created_at: Utc::now(),
        }
    }

    fn group(name: &str) -> PriceGroup {
        PriceGroup {
            id: 20,
            provider_id: 10,
            name: name.into(),
            ratio: 1.0,
            access_key: "sk-test".into(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn flat_array_extracts_records_verbatim() {
        let json = r#"{"data":[
            {"model_name":"gpt-4","model_ratio":15.0,"model_price":0,"completion_ratio":2.0,"quota_type":0},
            {"model_name":"mj-fast","model_ratio":1.0,"model_price":0.3,"completion_ratio":1.0,"quota_type":1},
            {"model_name":"dead-model","model_ratio":1.0,"model_price":0,"completion_ratio":1.0,"quota_type":999}
        ]}"#;
        let offers = normalize(json, &provider(PriceSchema::FlatArray), &group("default"));

        assert_eq!(offers.len(), 3);
        assert_eq!(offers[0].name, "gpt-4");
        assert_eq!(offers[0].quota_kind, QuotaKind::Metered);
        assert_eq!(offers[1].quota_kind, QuotaKind::PerRequest);
        assert_eq!(offers[1].price, dec!(0.3));
        assert_eq!(offers[2].quota_kind, QuotaKind::Unsupported);
    }

    #[test]
    fn flat_array_drops_records_with_missing_fields() {
        let json = r#"{"data":[
            {"model_name":"no-ratio","model_price":0,"completion_ratio":1.0,"quota_type":0},
            {"model_ratio":1.0,"model_price":0,"completion_ratio":1.0,"quota_type":0},
            {"model_name":"ok","model_ratio":1.0,"model_price":0,"completion_ratio":1.0,"quota_type":0}
        ]}"#;
        let offers = normalize(json, &provider(PriceSchema::FlatArray), &group("default"));

        assert_eq!(offers.len(), 1);
        assert_eq!(offers[0].name, "ok");
    }

    #[test]
    fn grouped_table_filters_by_group_name_and_inverts_quota() {
        let json = r#"{"data":{"model_info":[
            {"model_name":"gpt-4","price_info":{"vip":{"default":
                {"quota_type":1,"model_price":0,"model_ratio":15.0,"model_completion_ratio":2.0}}}},
            {"model_name":"gpt-4o","price_info":{"vip":{"default":
                {"quota_type":0,"model_price":0.5,"model_ratio":1.0,"model_completion_ratio":1.0}}}},
            {"model_name":"other-tier-only","price_info":{"svip":{"default":
                {"quota_type":1,"model_price":0,"model_ratio":1.0,"model_completion_ratio":1.0}}}}
        ]}}"#;
        let offers = normalize(json, &provider(PriceSchema::GroupedTable), &group("vip"));

        assert_eq!(offers.len(), 2);
        // Source code 1 means metered for this vendor.
        assert_eq!(offers[0].quota_kind, QuotaKind::Metered);
        assert_eq!(offers[1].quota_kind, QuotaKind::PerRequest);
        assert_eq!(offers[1].price, dec!(0.5));
    }

    #[test]
    fn column_maps_default_missing_ratio_to_one() {
        let json = r#"{"data":{
            "ModelRatio":{"gpt-4":15.0},
            "CompletionRatio":{"gpt-4":2.0,"text-embedding-3-small":1.0},
            "ModelFixedPrice":{"gpt-4":0.0}
        }}"#;
        let mut offers = normalize(json, &provider(PriceSchema::ColumnMaps), &group("default"));
        offers.sort_by(|a, b| a.name.cmp(&b.name));

        assert_eq!(offers.len(), 2);
        assert_eq!(offers[0].name, "gpt-4");
        assert!((offers[0].ratio - 15.0).abs() < f64::EPSILON);
        assert_eq!(offers[1].name, "text-embedding-3-small");
        assert!((offers[1].ratio - 1.0).abs() < f64::EPSILON);
        assert!(offers.iter().all(|o| o.quota_kind == QuotaKind::Metered));
        assert!(offers.iter().all(|o| o.price == Decimal::ZERO));
    }

    #[test]
    fn group_price_table_reinterprets_metered_price_as_ratio() {
        let json = r#"{"data":{
            "model_completion_ratio":{"gpt-4":4.0},
            "model_group":{"vip":{
                "GroupRatio":0.5,
                "ModelPrice":{
                    "gpt-4":{"priceType":0,"price":15.0},
                    "mj-fast":{"priceType":1,"price":0.36},
                    "legacy":{"priceType":9,"price":1.0}
                }
            }}
        }}"#;
        let mut offers = normalize(json, &provider(PriceSchema::GroupPriceTable), &group("vip"));
        offers.sort_by(|a, b| a.name.cmp(&b.name));

        assert_eq!(offers.len(), 3);

        let gpt4 = &offers[0];
        assert_eq!(gpt4.name, "gpt-4");
        assert_eq!(gpt4.quota_kind, QuotaKind::Metered);
        assert!((gpt4.ratio - 15.0).abs() < f64::EPSILON);
        assert_eq!(gpt4.price, Decimal::ZERO);
        assert!((gpt4.completion_ratio - 4.0).abs() < f64::EPSILON);

        let legacy = &offers[1];
        assert_eq!(legacy.quota_kind, QuotaKind::Unsupported);

        let mj = &offers[2];
        assert_eq!(mj.quota_kind, QuotaKind::PerRequest);
        assert_eq!(mj.price, dec!(0.36));
        // Completion ratio defaults to 1 when absent from the flat map.
        assert!((mj.completion_ratio - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn group_price_table_without_matching_group_is_empty() {
        let json = r#"{"data":{"model_group":{"svip":{"GroupRatio":1.0,"ModelPrice":{}}}}}"#;
        let offers = normalize(json, &provider(PriceSchema::GroupPriceTable), &group("vip"));
        assert!(offers.is_empty());
    }

    #[test]
    fn absent_top_level_sections_yield_empty() {
        for schema in PriceSchema::ALL {
            assert!(normalize("{}", &provider(*schema), &group("vip")).is_empty());
            assert!(normalize(r#"{"data":null}"#, &provider(*schema), &group("vip")).is_empty());
        }
    }

    #[test]
    fn invalid_json_yields_empty() {
        assert!(normalize("not json", &provider(PriceSchema::FlatArray), &group("x")).is_empty());
    }

    #[test]
    fn offers_carry_owning_ids() {
        let json = r#"{"data":[
            {"model_name":"gpt-4","model_ratio":1.0,"model_price":0,"completion_ratio":1.0,"quota_type":0}
        ]}"#;
        let offers = normalize(json, &provider(PriceSchema::FlatArray), &group("default"));
        assert_eq!(offers[0].provider_id, 10);
        assert_eq!(offers[0].group_id, 20);
    }
}
