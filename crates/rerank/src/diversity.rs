//! Brand diversity for ranked results.
//!
//! Without a per-brand cap a single dominant brand can fill the whole result
//! page. Selection keeps the best `per_brand_cap` candidates of each brand,
//! restores global result order and truncates to `total`.

use std::collections::HashMap;

use phonefinder_model::ScoredCandidate;
use serde::{Deserialize, Serialize};

use crate::rank_order;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DiversityConfig {
    /// Maximum results sharing one brand
    pub per_brand_cap: usize,
    /// Maximum results overall
    pub total: usize,
}

impl Default for DiversityConfig {
    fn default() -> Self {
        Self {
            per_brand_cap: 4,
            total: 8,
        }
    }
}

/// Cap results per brand, re-sort, and truncate.
///
/// `ranked` is expected in result order; within a brand, the earliest
/// candidates are the ones kept. Never pads: fewer survivors than `total`
/// are returned as they are.
pub fn diversify(ranked: Vec<ScoredCandidate>, config: &DiversityConfig) -> Vec<ScoredCandidate> {
    let mut taken: HashMap<String, usize> = HashMap::new();

    let mut kept: Vec<ScoredCandidate> = ranked
        .into_iter()
        .filter(|hit| {
            let count = taken.entry(hit.record.brand.clone()).or_insert(0);
            if *count < config.per_brand_cap {
                *count += 1;
                true
            } else {
                false
            }
        })
        .collect();

    kept.sort_by(rank_order);
    kept.truncate(config.total);

    kept
}
