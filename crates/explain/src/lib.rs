//! Explanation generation for phone searches.
//!
//! Converts canonical queries, outcomes and score breakdowns into
//! human-readable text suitable for the CLI and chat responses.

use phonefinder_model::{
    CanonicalQuery, Field, OutcomeReason, Predicate, Scalar, ScoredCandidate, SearchOutcome,
};
use phonefinder_rerank::{score_terms, RerankConfig};
use serde::{Deserialize, Serialize};

/// A structured explanation for a ranked phone.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Explanation {
    /// Short summary (1 line)
    pub summary: String,

    /// Which signal drove the score
    pub detail: String,

    /// One item per weighted score term
    pub evidence: Vec<EvidenceItem>,
}

/// A piece of evidence supporting a score.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvidenceItem {
    /// Type of evidence
    pub kind: String,

    /// The specific value or match
    pub value: String,

    /// Optional context
    #[serde(skip_serializing_if = "Option::is_none")]
    pub context: Option<String>,
}

/// Describe every predicate of a query, in field order.
pub fn describe_query(query: &CanonicalQuery) -> Vec<String> {
    query
        .iter()
        .map(|(field, predicate)| describe_predicate(field, predicate))
        .collect()
}

/// Describe one predicate as a short phrase.
pub fn describe_predicate(field: Field, predicate: &Predicate) -> String {
    let label = field.label();

    match predicate {
        Predicate::Exact(Scalar::Bool(in_stock)) if field == Field::InStock => {
            let phrase = if *in_stock { "in stock" } else { "out of stock" };
            phrase.to_string()
        }
        Predicate::Exact(value) => format!("{} exactly {}", label, format_value(field, value)),
        Predicate::Range {
            min: Some(lo),
            max: Some(hi),
        } => format!(
            "{} between {} and {}",
            label,
            format_value(field, lo),
            format_value(field, hi)
        ),
        Predicate::Range {
            min: Some(lo),
            max: None,
        } => format!("{} at least {}", label, format_value(field, lo)),
        Predicate::Range {
            min: None,
            max: Some(hi),
        } => format!("{} at most {}", label, format_value(field, hi)),
        Predicate::Range {
            min: None,
            max: None,
        } => format!("any {}", label),
        Predicate::Contains(terms) => format!(
            "{} mentions {}",
            label,
            terms
                .iter()
                .map(|t| format!("\"{}\"", t))
                .collect::<Vec<_>>()
                .join(" or ")
        ),
    }
}

fn format_value(field: Field, value: &Scalar) -> String {
    match (field, value) {
        (Field::Price, Scalar::Int(amount)) => format_rupees(*amount),
        (Field::Ram | Field::Storage, Scalar::Int(gb)) => format!("{} GB", gb),
        _ => value.to_string(),
    }
}

/// Format a rupee amount with Indian digit grouping (₹1,20,000).
pub fn format_rupees(amount: u64) -> String {
    let digits = amount.to_string();
    if digits.len() <= 3 {
        return format!("₹{}", digits);
    }

    let (head, tail) = digits.split_at(digits.len() - 3);
    let mut groups = Vec::new();
    let mut rest = head;
    while rest.len() > 2 {
        let (front, pair) = rest.split_at(rest.len() - 2);
        groups.push(pair);
        rest = front;
    }
    groups.push(rest);
    groups.reverse();

    format!("₹{},{}", groups.join(","), tail)
}

/// Generate a one-line message for a search outcome.
pub fn summarize_outcome(outcome: &SearchOutcome) -> String {
    match outcome.reason() {
        OutcomeReason::NoActionableCriteria => {
            "No actionable search criteria found. Try mentioning a budget, brand or feature."
                .to_string()
        }
        OutcomeReason::NoMatches => "No phones matched these criteria.".to_string(),
        OutcomeReason::Matched => {
            let n = outcome.candidates().len();
            format!("Found {} phone{}.", n, if n == 1 { "" } else { "s" })
        }
    }
}

/// Render a ranked phone as a one-line card.
pub fn summarize_candidate(hit: &ScoredCandidate) -> String {
    let record = &hit.record;
    let mut parts = vec![
        format!("{} {}", record.brand.to_uppercase(), record.name),
        format_rupees(record.price),
    ];

    match (record.ram, record.storage) {
        (Some(ram), Some(storage)) => parts.push(format!("{} GB / {} GB", ram, storage)),
        (Some(ram), None) => parts.push(format!("{} GB RAM", ram)),
        (None, Some(storage)) => parts.push(format!("{} GB storage", storage)),
        (None, None) => {}
    }
    if let Some(rating) = record.rating_float {
        let reviews = record.reviews.unwrap_or(0);
        parts.push(format!("{:.1}★ ({} reviews)", rating, reviews));
    }
    if let Some(bought) = record.bought {
        parts.push(format!("{} bought", bought));
    }
    if !record.is_in_stock {
        parts.push("out of stock".to_string());
    }

    parts.join(" | ")
}

/// Explain how a candidate's score came about.
pub fn explain_hit(hit: &ScoredCandidate, config: &RerankConfig) -> Explanation {
    let terms = score_terms(&hit.record, config);

    let leading = terms
        .iter()
        .filter(|t| t.contribution() > 0.0)
        .max_by(|a, b| a.contribution().total_cmp(&b.contribution()));

    let detail = match leading {
        Some(term) if hit.score > 0.0 => format!(
            "Driven mostly by {} ({:.0}% of the score).",
            term.signal.label().to_lowercase(),
            term.contribution() / hit.score * 100.0
        ),
        _ => "No popularity or spec signals recorded; ordered by price.".to_string(),
    };

    let evidence = terms
        .iter()
        .filter(|t| t.weight != 0.0)
        .map(|t| EvidenceItem {
            kind: t.signal.label().to_string(),
            value: format!("{} × {}", t.value, t.weight),
            context: Some(format!("= {:.1}", t.contribution())),
        })
        .collect();

    Explanation {
        summary: format!("Score {:.1}", hit.score),
        detail,
        evidence,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phonefinder_model::CatalogRecord;

    #[test]
    fn test_format_rupees() {
        assert_eq!(format_rupees(999), "₹999");
        assert_eq!(format_rupees(15000), "₹15,000");
        assert_eq!(format_rupees(120000), "₹1,20,000");
        assert_eq!(format_rupees(12345678), "₹1,23,45,678");
    }

    #[test]
    fn test_describe_price_band() {
        let predicate = Predicate::between(Scalar::Int(12000), Scalar::Int(15000));
        assert_eq!(
            describe_predicate(Field::Price, &predicate),
            "price between ₹12,000 and ₹15,000"
        );
    }

    #[test]
    fn test_describe_query() {
        let mut query = CanonicalQuery::new();
        query.insert(Field::Ram, Predicate::Exact(Scalar::Int(8)));
        query.insert(Field::InStock, Predicate::Exact(Scalar::Bool(true)));
        query.insert(
            Field::FullName,
            Predicate::Contains(vec!["5G".into(), "50MP".into()]),
        );

        assert_eq!(
            describe_query(&query),
            vec![
                "RAM exactly 8 GB".to_string(),
                "in stock".to_string(),
                "full name mentions \"5G\" or \"50MP\"".to_string(),
            ]
        );
    }

    #[test]
    fn test_outcome_messages_are_distinct() {
        let none = summarize_outcome(&SearchOutcome::NoActionableCriteria);
        let empty = summarize_outcome(&SearchOutcome::Ranked(Vec::new()));
        assert_ne!(none, empty);
        assert!(none.contains("No actionable"));
    }

    #[test]
    fn test_explain_hit_names_leading_signal() {
        let hit = ScoredCandidate {
            record: CatalogRecord::new("Xiaomi", "Redmi 13", 12999)
                .with_memory(8, 128)
                .with_popularity(4.5, 200, 1000),
            score: 4745.0,
        };
        let explanation = explain_hit(&hit, &RerankConfig::default());
        assert!(explanation.detail.contains("purchases"));
        assert_eq!(explanation.evidence.len(), 5);
    }

    #[test]
    fn test_summarize_candidate() {
        let hit = ScoredCandidate {
            record: CatalogRecord::new("Samsung", "Galaxy M15", 12999).with_memory(6, 128),
            score: 134.0,
        };
        assert_eq!(summarize_candidate(&hit), "SAMSUNG Galaxy M15 | ₹12,999 | 6 GB / 128 GB");
    }
}
