//! Filter normalization.
//!
//! Resolves sparse extractor output into a `CanonicalQuery`. Normalization is
//! total: values that cannot be coerced to the expected type are dropped.

use phonefinder_model::{CanonicalQuery, Field, Predicate, RawFilters, Scalar};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One price tier: queries with `price_max <= up_to` get a band of `gap`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceTier {
    pub up_to: u64,
    pub gap: u64,
}

/// Default price band applied when only an upper price bound is given.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceBands {
    /// Tiers in ascending `up_to` order
    pub tiers: Vec<PriceTier>,
    /// Gap used above the last tier
    pub fallback_gap: u64,
}

impl Default for PriceBands {
    fn default() -> Self {
        Self {
            tiers: vec![
                PriceTier {
                    up_to: 15_000,
                    gap: 3_000,
                },
                PriceTier {
                    up_to: 40_000,
                    gap: 7_000,
                },
            ],
            fallback_gap: 15_000,
        }
    }
}

impl PriceBands {
    pub fn gap_for(&self, price_max: u64) -> u64 {
        self.tiers
            .iter()
            .find(|tier| price_max <= tier.up_to)
            .map(|tier| tier.gap)
            .unwrap_or(self.fallback_gap)
    }

    /// Lower bound of the default band under `price_max`, floored at zero.
    pub fn lower_bound(&self, price_max: u64) -> u64 {
        price_max.saturating_sub(self.gap_for(price_max))
    }
}

/// Configuration for the normalizer.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NormalizeConfig {
    pub price_bands: PriceBands,
}

/// Normalize raw filters into a canonical predicate set.
pub fn normalize(raw: &RawFilters, config: &NormalizeConfig) -> CanonicalQuery {
    let mut query = CanonicalQuery::new();

    if let Some(price) = price_predicate(raw, &config.price_bands) {
        query.insert(Field::Price, price);
    }

    if let Some(ram) = exact_or_range(&raw.ram, &raw.ram_min, &raw.ram_max) {
        query.insert(Field::Ram, ram);
    }
    if let Some(storage) = exact_or_range(&raw.storage, &raw.storage_min, &raw.storage_max) {
        query.insert(Field::Storage, storage);
    }

    if let Some(brand) = raw.brand.as_ref().and_then(text) {
        query.insert(Field::Brand, Predicate::Contains(vec![brand]));
    }
    if let Some(name) = raw.name.as_ref().and_then(text) {
        query.insert(Field::Name, Predicate::Contains(vec![name]));
    }

    // A zero threshold constrains nothing and is treated as absent
    if let Some(rating) = raw.rating_min.as_ref().and_then(number).filter(|r| *r > 0.0) {
        query.insert(Field::Rating, Predicate::at_least(Scalar::Float(rating)));
    }
    if let Some(reviews) = raw.reviews_min.as_ref().and_then(count).filter(|n| *n > 0) {
        query.insert(Field::Reviews, Predicate::at_least(Scalar::Int(reviews)));
    }
    if let Some(bought) = raw.popularity_min.as_ref().and_then(count).filter(|n| *n > 0) {
        query.insert(Field::Popularity, Predicate::at_least(Scalar::Int(bought)));
    }
    if let Some(in_stock) = raw.is_in_stock.as_ref().and_then(flag) {
        query.insert(Field::InStock, Predicate::Exact(Scalar::Bool(in_stock)));
    }

    let terms = free_text_terms(raw);
    if !terms.is_empty() {
        query.insert(Field::FullName, Predicate::Contains(terms));
    }

    query
}

fn price_predicate(raw: &RawFilters, bands: &PriceBands) -> Option<Predicate> {
    let min = raw.price_min.as_ref().and_then(count);
    let max = raw.price_max.as_ref().and_then(count);

    match (min, max) {
        (min, Some(max)) => {
            let min = min.unwrap_or_else(|| bands.lower_bound(max)).min(max);
            Some(Predicate::between(Scalar::Int(min), Scalar::Int(max)))
        }
        (Some(min), None) => Some(Predicate::at_least(Scalar::Int(min))),
        (None, None) => None,
    }
}

fn exact_or_range(
    exact: &Option<Value>,
    min: &Option<Value>,
    max: &Option<Value>,
) -> Option<Predicate> {
    if let Some(value) = exact.as_ref().and_then(count) {
        return Some(Predicate::Exact(Scalar::Int(value)));
    }

    let min = min.as_ref().and_then(count);
    let max = max.as_ref().and_then(count);
    if min.is_none() && max.is_none() {
        return None;
    }

    // Inverted bounds collapse onto the upper bound
    let min = match (min, max) {
        (Some(lo), Some(hi)) => Some(lo.min(hi)),
        _ => min,
    };

    Some(Predicate::Range {
        min: min.map(Scalar::Int),
        max: max.map(Scalar::Int),
    })
}

/// Collect free-text terms in field order, dropping case-insensitive duplicates.
fn free_text_terms(raw: &RawFilters) -> Vec<String> {
    let mut terms: Vec<String> = Vec::new();

    for value in [&raw.search_term, &raw.has_feature, &raw.camera_quality]
        .into_iter()
        .flatten()
    {
        for term in texts(value) {
            let lowered = term.to_lowercase();
            if !terms.iter().any(|t| t.to_lowercase() == lowered) {
                terms.push(term);
            }
        }
    }

    terms
}

/// Coerce to a finite, non-negative number.
fn number(value: &Value) -> Option<f64> {
    let n = match value {
        Value::Number(n) => n.as_f64(),
        Value::String(s) => parse_numeric_text(s),
        _ => None,
    }?;

    (n.is_finite() && n >= 0.0).then_some(n)
}

fn count(value: &Value) -> Option<u64> {
    number(value).map(|n| n.round() as u64)
}

/// Parse strings like "15,000", "₹ 12000", "8GB" or "5K+".
fn parse_numeric_text(text: &str) -> Option<f64> {
    let mut s: String = text
        .trim()
        .to_lowercase()
        .chars()
        .filter(|c| !c.is_whitespace() && *c != ',' && *c != '_')
        .collect();

    for prefix in ["₹", "inr", "rs.", "rs"] {
        if let Some(rest) = s.strip_prefix(prefix) {
            s = rest.to_string();
            break;
        }
    }

    let s = s.trim_end_matches('+');
    let (digits, multiplier) = if let Some(digits) = s.strip_suffix('k') {
        (digits, 1_000.0)
    } else if let Some(digits) = s.strip_suffix("gb") {
        (digits, 1.0)
    } else {
        (s, 1.0)
    };

    digits.parse::<f64>().ok().map(|n| n * multiplier)
}

fn flag(value: &Value) -> Option<bool> {
    match value {
        Value::Bool(b) => Some(*b),
        Value::String(s) => match s.trim().to_lowercase().as_str() {
            "true" | "yes" => Some(true),
            "false" | "no" => Some(false),
            _ => None,
        },
        _ => None,
    }
}

fn text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        _ => None,
    }
}

/// Like `text`, but also accepts an array of strings.
fn texts(value: &Value) -> Vec<String> {
    match value {
        Value::Array(items) => items.iter().filter_map(text).collect(),
        other => text(other).into_iter().collect(),
    }
}
