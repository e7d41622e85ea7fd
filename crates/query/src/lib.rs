//! Query normalization, translation and dialect generation.
//!
//! Turns extractor output into something a catalog store can execute:
//! - `normalize`: `RawFilters` to a non-contradictory `CanonicalQuery`
//! - `translate`: `CanonicalQuery` to a structured `StoreQuery`
//! - `QueryDialect`: `StoreQuery` to backend-specific syntax (Manticore SQL)

pub mod normalize;

pub use normalize::{normalize, NormalizeConfig, PriceBands, PriceTier};

use phonefinder_model::{CanonicalQuery, Field, Predicate, Scalar};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum QueryError {
    #[error("Query has no clauses")]
    EmptyQuery,
}

/// A single store-side filter clause. Clauses are AND-combined.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Clause {
    /// Field equals value
    Eq { field: Field, value: Scalar },

    /// Inclusive bounds; `None` leaves that side open
    Range {
        field: Field,
        gte: Option<Scalar>,
        lte: Option<Scalar>,
    },

    /// Case-insensitive regular expression match
    Pattern { field: Field, pattern: String },
}

impl Clause {
    pub fn field(&self) -> Field {
        match self {
            Self::Eq { field, .. } | Self::Range { field, .. } | Self::Pattern { field, .. } => {
                *field
            }
        }
    }
}

/// A store query in backend-neutral form.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct StoreQuery {
    pub clauses: Vec<Clause>,
}

impl StoreQuery {
    pub fn is_empty(&self) -> bool {
        self.clauses.is_empty()
    }
}

/// Map each canonical predicate to its store clause.
pub fn translate(query: &CanonicalQuery) -> StoreQuery {
    let clauses = query
        .iter()
        .map(|(field, predicate)| match predicate {
            Predicate::Exact(value) => Clause::Eq {
                field,
                value: *value,
            },
            Predicate::Range { min, max } => Clause::Range {
                field,
                gte: *min,
                lte: *max,
            },
            Predicate::Contains(terms) => Clause::Pattern {
                field,
                pattern: alternation(terms),
            },
        })
        .collect();

    StoreQuery { clauses }
}

/// Build a pattern matching any of the terms literally.
pub fn alternation(terms: &[String]) -> String {
    terms
        .iter()
        .map(|term| regex::escape(term))
        .collect::<Vec<_>>()
        .join("|")
}

/// Trait for rendering store queries in backend-specific syntax.
pub trait QueryDialect {
    /// The output type (usually String or a structured query)
    type Output;

    /// Render a StoreQuery in this dialect
    fn render(&self, query: &StoreQuery) -> Result<Self::Output, QueryError>;
}

/// Manticore SQL dialect generator.
#[derive(Debug, Clone)]
pub struct ManticoreDialect {
    pub table: String,
    /// Maximum candidates to fetch
    pub limit: usize,
}

impl Default for ManticoreDialect {
    fn default() -> Self {
        Self {
            table: "phones".to_string(),
            limit: 1000,
        }
    }
}

impl ManticoreDialect {
    /// Column name of a field in the phones table.
    pub fn column(field: Field) -> &'static str {
        match field {
            Field::Price => "price",
            Field::Ram => "ram",
            Field::Storage => "storage",
            Field::Brand => "brand",
            Field::Name => "name",
            Field::Rating => "rating_float",
            Field::Reviews => "reviews",
            Field::Popularity => "bought",
            Field::InStock => "is_in_stock",
            Field::FullName => "full_name",
        }
    }

    fn condition(clause: &Clause) -> Option<String> {
        let column = Self::column(clause.field());

        match clause {
            Clause::Eq { value, .. } => Some(format!("{} = {}", column, literal(value))),
            Clause::Range { gte, lte, .. } => {
                let mut bounds = Vec::new();
                if let Some(lo) = gte {
                    bounds.push(format!("{} >= {}", column, literal(lo)));
                }
                if let Some(hi) = lte {
                    bounds.push(format!("{} <= {}", column, literal(hi)));
                }
                (!bounds.is_empty()).then(|| bounds.join(" AND "))
            }
            Clause::Pattern { pattern, .. } => Some(format!(
                "REGEX({}, '{}')",
                column,
                escape_string(&format!("(?i){}", pattern))
            )),
        }
    }
}

impl QueryDialect for ManticoreDialect {
    type Output = String;

    fn render(&self, query: &StoreQuery) -> Result<String, QueryError> {
        let conditions: Vec<String> = query.clauses.iter().filter_map(Self::condition).collect();
        if conditions.is_empty() {
            return Err(QueryError::EmptyQuery);
        }

        Ok(format!(
            "SELECT * FROM {} WHERE {} LIMIT {} OPTION max_matches={}",
            self.table,
            conditions.join(" AND "),
            self.limit,
            self.limit
        ))
    }
}

fn literal(value: &Scalar) -> String {
    match value {
        Scalar::Int(v) => v.to_string(),
        Scalar::Float(v) => v.to_string(),
        Scalar::Bool(v) => u8::from(*v).to_string(),
    }
}

/// Escape a value for a single-quoted Manticore string literal.
fn escape_string(value: &str) -> String {
    value.replace('\\', "\\\\").replace('\'', "\\'")
}
