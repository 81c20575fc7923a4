//! Core reconciliation pipeline: normalization, pricing, probing,
//! consolidation, and alias derivation.

pub mod alias;
pub mod consolidate;
pub mod http;
pub mod logging;
pub mod models;
pub mod normalize;
pub mod pricing;
pub mod probe;
