//! In-memory catalog store.

use std::path::Path;

use phonefinder_model::{CatalogRecord, Field, Scalar};
use phonefinder_query::{Clause, StoreQuery};
use regex::{Regex, RegexBuilder};

use crate::{BackendError, CatalogStore};

/// A catalog held entirely in memory, e.g. loaded from a JSON export.
#[derive(Debug, Clone, Default)]
pub struct MemoryCatalog {
    records: Vec<CatalogRecord>,
}

impl MemoryCatalog {
    pub fn new(records: Vec<CatalogRecord>) -> Self {
        Self { records }
    }

    /// Load a catalog from a JSON array of records.
    pub fn from_json_file(path: &Path) -> Result<Self, BackendError> {
        let load_error = |message: String| BackendError::Load {
            path: path.to_path_buf(),
            message,
        };

        let raw = std::fs::read_to_string(path).map_err(|e| load_error(e.to_string()))?;
        let records: Vec<CatalogRecord> =
            serde_json::from_str(&raw).map_err(|e| load_error(e.to_string()))?;

        Ok(Self::new(records))
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

/// A clause ready to evaluate, with its pattern compiled.
enum Filter<'a> {
    Eq(Field, &'a Scalar),
    Range(Field, Option<f64>, Option<f64>),
    Pattern(Field, Regex),
}

impl<'a> Filter<'a> {
    fn compile(clause: &'a Clause) -> Result<Self, BackendError> {
        Ok(match clause {
            Clause::Eq { field, value } => Self::Eq(*field, value),
            Clause::Range { field, gte, lte } => Self::Range(
                *field,
                gte.and_then(|v| v.as_f64()),
                lte.and_then(|v| v.as_f64()),
            ),
            Clause::Pattern { field, pattern } => {
                let regex = RegexBuilder::new(pattern)
                    .case_insensitive(true)
                    .build()
                    .map_err(|e| BackendError::QueryFailed(e.to_string()))?;
                Self::Pattern(*field, regex)
            }
        })
    }

    /// A record missing the attribute never matches.
    fn matches(&self, record: &CatalogRecord) -> bool {
        match self {
            Self::Eq(Field::InStock, Scalar::Bool(expected)) => record.is_in_stock == *expected,
            Self::Eq(field, value) => match (numeric(record, *field), value.as_f64()) {
                (Some(actual), Some(expected)) => actual == expected,
                _ => false,
            },
            Self::Range(field, lo, hi) => numeric(record, *field).is_some_and(|v| {
                lo.map_or(true, |lo| v >= lo) && hi.map_or(true, |hi| v <= hi)
            }),
            Self::Pattern(field, regex) => text(record, *field).is_some_and(|t| regex.is_match(t)),
        }
    }
}

fn numeric(record: &CatalogRecord, field: Field) -> Option<f64> {
    match field {
        Field::Price => Some(record.price as f64),
        Field::Ram => record.ram.map(|v| v as f64),
        Field::Storage => record.storage.map(|v| v as f64),
        Field::Rating => record.rating_float,
        Field::Reviews => record.reviews.map(|v| v as f64),
        Field::Popularity => record.bought.map(|v| v as f64),
        Field::Brand | Field::Name | Field::InStock | Field::FullName => None,
    }
}

fn text(record: &CatalogRecord, field: Field) -> Option<&str> {
    match field {
        Field::Brand => Some(&record.brand),
        Field::Name => Some(&record.name),
        Field::FullName => Some(record.display_name()),
        _ => None,
    }
}

impl CatalogStore for MemoryCatalog {
    async fn query(&self, query: &StoreQuery) -> Result<Vec<CatalogRecord>, BackendError> {
        let filters = query
            .clauses
            .iter()
            .map(Filter::compile)
            .collect::<Result<Vec<_>, _>>()?;

        let matched: Vec<CatalogRecord> = self
            .records
            .iter()
            .filter(|record| filters.iter().all(|f| f.matches(record)))
            .cloned()
            .collect();

        tracing::debug!(
            clauses = query.clauses.len(),
            matched = matched.len(),
            "Evaluated in-memory catalog query"
        );

        Ok(matched)
    }

    async fn health_check(&self) -> Result<(), BackendError> {
        Ok(())
    }

    fn name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use phonefinder_model::RawFilters;
    use phonefinder_query::{normalize, translate, NormalizeConfig};
    use serde_json::json;

    fn catalog() -> MemoryCatalog {
        MemoryCatalog::new(vec![
            CatalogRecord::new("Samsung", "Galaxy M15", 12999)
                .with_memory(6, 128)
                .with_full_name("Samsung Galaxy M15 5G (6GB RAM, 128GB) 50MP Triple Camera"),
            CatalogRecord::new("Xiaomi", "Redmi 13", 13999).with_memory(8, 128),
            CatalogRecord::new("Apple", "iPhone 15", 69999).with_memory(6, 256),
            CatalogRecord {
                is_in_stock: false,
                ..CatalogRecord::new("Realme", "Narzo 70", 14499)
            },
        ])
    }

    async fn run(filters: serde_json::Value) -> Vec<String> {
        let canonical = normalize(&RawFilters::from_value(filters), &NormalizeConfig::default());
        catalog()
            .query(&translate(&canonical))
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.name)
            .collect()
    }

    #[tokio::test]
    async fn test_price_band() {
        assert_eq!(
            run(json!({ "price_max": 15000 })).await,
            vec!["Galaxy M15", "Redmi 13", "Narzo 70"]
        );
    }

    #[tokio::test]
    async fn test_exact_and_missing_attributes() {
        assert_eq!(run(json!({ "ram": 8 })).await, vec!["Redmi 13"]);
        // Narzo 70 has no RAM recorded
        assert_eq!(run(json!({ "ram_max": 6 })).await, vec!["Galaxy M15", "iPhone 15"]);
    }

    #[tokio::test]
    async fn test_case_insensitive_substring() {
        assert_eq!(
            run(json!({ "camera_quality": "50mp", "search_term": "iphone" })).await,
            vec!["Galaxy M15", "iPhone 15"]
        );
        assert_eq!(run(json!({ "brand": "xiao" })).await, vec!["Redmi 13"]);
    }

    #[tokio::test]
    async fn test_stock_filter() {
        assert_eq!(run(json!({ "is_in_stock": false })).await, vec!["Narzo 70"]);
    }

    #[tokio::test]
    async fn test_load_missing_file() {
        let err = MemoryCatalog::from_json_file(Path::new("/nonexistent/catalog.json")).unwrap_err();
        assert!(matches!(err, BackendError::Load { .. }));
    }
}
