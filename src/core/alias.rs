//! Request-time alias derivation.
//!
//! Maps date-free base names to the newest dated snapshot so callers can
//! address a model family without pinning a release date. An explicit
//! unversioned entry in the input always suppresses the alias for its base
//! name.

use std::collections::{BTreeMap, HashSet};
use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

static DASHED_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+)-(\d{4}-\d{2}-\d{2})$").unwrap());
static COMPACT_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(.+)-(\d{8})$").unwrap());

/// Split a trailing date suffix from a model name.
///
/// Accepts `-YYYY-MM-DD` (tried first) and `-YYYYMMDD`, both validated as
/// real calendar dates. Returns None when no valid suffix is present.
#[must_use]
pub fn split_dated(name: &str) -> Option<(&str, NaiveDate)> {
    for (pattern, format) in [(&DASHED_DATE, "%Y-%m-%d"), (&COMPACT_DATE, "%Y%m%d")] {
        if let Some(caps) = pattern.captures(name)
            && let (Some(base), Some(suffix)) = (caps.get(1), caps.get(2))
            && let Ok(date) = NaiveDate::parse_from_str(suffix.as_str(), format)
        {
            return Some((base.as_str(), date));
        }
    }
    None
}

/// Build the alias mapping for a set of model names.
///
/// Each eligible base name maps to exactly one full dated name: the
/// candidate with the most recent date (first seen wins ties). Base names
/// present verbatim in the input produce no alias.
#[must_use]
pub fn build_aliases<S: AsRef<str>>(model_names: &[S]) -> BTreeMap<String, String> {
    let existing: HashSet<&str> = model_names.iter().map(AsRef::as_ref).collect();
    let mut candidates: BTreeMap<String, (String, NaiveDate)> = BTreeMap::new();

    for name in model_names {
        let name = name.as_ref();
        let Some((base, date)) = split_dated(name) else {
            continue;
        };
        if existing.contains(base) {
            continue;
        }
        match candidates.get(base) {
            Some((_, current)) if date <= *current => {}
            _ => {
                candidates.insert(base.to_string(), (name.to_string(), date));
            }
        }
    }

    candidates
        .into_iter()
        .map(|(base, (full, _))| (base, full))
        .collect()
}
