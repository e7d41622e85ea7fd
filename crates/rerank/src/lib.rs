//! Scoring and ranking for phone candidates.
//!
//! Takes the candidates a catalog store returned for a query and applies a
//! fixed linear weighting over catalog attributes:
//!
//! ```text
//! score = 4·bought + 3·reviews + 2·ratingFloat + 1·ram + 1·storage
//! ```
//!
//! Results are ordered by score descending, then price ascending. The
//! `diversity` module then caps how many results a single brand may take.

pub mod diversity;

pub use diversity::{diversify, DiversityConfig};

use std::cmp::Ordering;

use phonefinder_model::{CatalogRecord, ScoredCandidate};
use serde::{Deserialize, Serialize};

/// Configuration for the scorer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RerankConfig {
    /// Weight for purchase count
    pub bought_weight: f64,
    /// Weight for review count
    pub reviews_weight: f64,
    /// Weight for average rating
    pub rating_weight: f64,
    /// Weight for RAM in GB
    pub ram_weight: f64,
    /// Weight for storage in GB
    pub storage_weight: f64,
}

impl Default for RerankConfig {
    fn default() -> Self {
        Self {
            bought_weight: 4.0,
            reviews_weight: 3.0,
            rating_weight: 2.0,
            ram_weight: 1.0,
            storage_weight: 1.0,
        }
    }
}

/// A catalog attribute that contributes to the score.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreSignal {
    Bought,
    Reviews,
    Rating,
    Ram,
    Storage,
}

impl ScoreSignal {
    pub fn label(&self) -> &'static str {
        match self {
            Self::Bought => "Purchases",
            Self::Reviews => "Reviews",
            Self::Rating => "Rating",
            Self::Ram => "RAM (GB)",
            Self::Storage => "Storage (GB)",
        }
    }
}

/// One weighted term of a candidate's score.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ScoreTerm {
    pub signal: ScoreSignal,
    /// Attribute value; missing attributes count as 0
    pub value: f64,
    pub weight: f64,
}

impl ScoreTerm {
    pub fn contribution(&self) -> f64 {
        self.value * self.weight
    }
}

/// Break a record's score down into its weighted terms.
pub fn score_terms(record: &CatalogRecord, config: &RerankConfig) -> [ScoreTerm; 5] {
    let count = |value: Option<u64>| value.unwrap_or(0) as f64;

    [
        ScoreTerm {
            signal: ScoreSignal::Bought,
            value: count(record.bought),
            weight: config.bought_weight,
        },
        ScoreTerm {
            signal: ScoreSignal::Reviews,
            value: count(record.reviews),
            weight: config.reviews_weight,
        },
        ScoreTerm {
            signal: ScoreSignal::Rating,
            value: record.rating_float.unwrap_or(0.0),
            weight: config.rating_weight,
        },
        ScoreTerm {
            signal: ScoreSignal::Ram,
            value: count(record.ram),
            weight: config.ram_weight,
        },
        ScoreTerm {
            signal: ScoreSignal::Storage,
            value: count(record.storage),
            weight: config.storage_weight,
        },
    ]
}

/// Compute the relevance score of a single record.
pub fn score(record: &CatalogRecord, config: &RerankConfig) -> f64 {
    score_terms(record, config)
        .iter()
        .map(ScoreTerm::contribution)
        .sum()
}

/// Result order: score descending, then price ascending.
pub fn rank_order(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
    b.score
        .total_cmp(&a.score)
        .then_with(|| a.record.price.cmp(&b.record.price))
}

/// Score every candidate and sort them into result order.
pub fn rank(candidates: Vec<CatalogRecord>, config: &RerankConfig) -> Vec<ScoredCandidate> {
    let mut hits: Vec<ScoredCandidate> = candidates
        .into_iter()
        .map(|record| ScoredCandidate {
            score: score(&record, config),
            record,
        })
        .collect();

    hits.sort_by(rank_order);

    hits
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_score_formula() {
        let record = CatalogRecord::new("Xiaomi", "Redmi 13", 12999)
            .with_memory(8, 128)
            .with_popularity(4.5, 200, 1000);
        let config = RerankConfig::default();

        assert_eq!(score(&record, &config), 4000.0 + 600.0 + 9.0 + 8.0 + 128.0);
    }

    #[test]
    fn test_missing_attributes_score_zero() {
        let record = CatalogRecord::new("Xiaomi", "Redmi A4", 8499).with_memory(4, 64);
        assert_eq!(score(&record, &RerankConfig::default()), 68.0);
    }

    #[test]
    fn test_rank_orders_by_score_then_price() {
        let candidates = vec![
            CatalogRecord::new("Realme", "Narzo 70", 13999).with_memory(8, 128),
            CatalogRecord::new("Samsung", "Galaxy M15", 12999).with_memory(8, 128),
            CatalogRecord::new("Xiaomi", "Redmi 13", 11999)
                .with_memory(8, 128)
                .with_popularity(4.0, 10, 5),
        ];

        let ranked = rank(candidates, &RerankConfig::default());
        let names: Vec<_> = ranked.iter().map(|h| h.record.name.as_str()).collect();
        assert_eq!(names, vec!["Redmi 13", "Galaxy M15", "Narzo 70"]);
        assert_eq!(ranked[1].score, ranked[2].score);
    }

    #[test]
    fn test_breakdown_sums_to_score() {
        let record = CatalogRecord::new("Apple", "iPhone 15", 69999)
            .with_memory(6, 256)
            .with_popularity(4.6, 5000, 2000);
        let config = RerankConfig {
            ram_weight: 0.0,
            ..Default::default()
        };

        let terms = score_terms(&record, &config);
        let total: f64 = terms.iter().map(ScoreTerm::contribution).sum();
        assert_eq!(total, score(&record, &config));
        assert_eq!(terms[3].signal, ScoreSignal::Ram);
        assert_eq!(terms[3].contribution(), 0.0);
    }
}
