//! Core domain model for the phone finder.
//!
//! This crate defines the fundamental types used throughout the system:
//! - `RawFilters`: Sparse, unvalidated criteria from the filter extractor
//! - `CanonicalQuery`: The normalized predicate set actually searched
//! - `CatalogRecord`: A phone as held by the catalog store
//! - `ScoredCandidate`: A catalog record with its ranking score
//! - `ResolutionRecord`: What gets appended to the conversation log
//! - `SearchOutcome`: Ranked results or the "no actionable criteria" signal

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

/// Filters as handed over by the extractor.
///
/// Every field keeps the extractor's raw JSON value; type coercion happens
/// during normalization, where anything unusable is treated as absent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RawFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_min: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub price_max: Option<Value>,

    /// Exact RAM in GB; wins over `ram_min`/`ram_max`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ram: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ram_min: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ram_max: Option<Value>,

    /// Exact storage in GB; wins over `storage_min`/`storage_max`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_min: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage_max: Option<Value>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub brand: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating_min: Option<Value>,
    /// Also read from `isInStock`, see `RawFilters::from_value`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_in_stock: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviews_min: Option<Value>,

    // Free-text terms, OR-combined against the full display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search_term: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub has_feature: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub camera_quality: Option<Value>,

    /// Minimum purchase count (`bought`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub popularity_min: Option<Value>,
}

impl RawFilters {
    /// Build filters from arbitrary extractor output.
    ///
    /// Never fails: anything that is not a usable JSON object yields empty
    /// filters, which the pipeline reports as "no actionable criteria".
    pub fn from_value(value: Value) -> Self {
        let Value::Object(mut map) = value else {
            return Self::default();
        };

        // `isInStock` fills `is_in_stock` only when the latter is absent or null
        if let Some(camel) = map.remove("isInStock") {
            let slot = map.entry("is_in_stock").or_insert(Value::Null);
            if slot.is_null() {
                *slot = camel;
            }
        }

        serde_json::from_value(Value::Object(map)).unwrap_or_default()
    }

    /// Parse filters from a JSON document, with the same leniency as `from_value`.
    pub fn from_json_str(text: &str) -> Self {
        serde_json::from_str::<Value>(text)
            .map(Self::from_value)
            .unwrap_or_default()
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }
}

/// A catalog attribute that a predicate can constrain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Field {
    Price,
    Ram,
    Storage,
    Brand,
    Name,
    Rating,
    Reviews,
    Popularity,
    InStock,
    FullName,
}

impl Field {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Price => "price",
            Self::Ram => "ram",
            Self::Storage => "storage",
            Self::Brand => "brand",
            Self::Name => "name",
            Self::Rating => "rating",
            Self::Reviews => "reviews",
            Self::Popularity => "popularity",
            Self::InStock => "in_stock",
            Self::FullName => "full_name",
        }
    }

    /// Get a human-readable label for this field.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Price => "price",
            Self::Ram => "RAM",
            Self::Storage => "storage",
            Self::Brand => "brand",
            Self::Name => "model name",
            Self::Rating => "rating",
            Self::Reviews => "review count",
            Self::Popularity => "purchases",
            Self::InStock => "stock",
            Self::FullName => "full name",
        }
    }
}

impl fmt::Display for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single typed value inside a predicate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
    Int(u64),
    Float(f64),
    Bool(bool),
}

impl Scalar {
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Int(v) => Some(*v as f64),
            Self::Float(v) => Some(*v),
            Self::Bool(_) => None,
        }
    }
}

impl fmt::Display for Scalar {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Int(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Bool(v) => write!(f, "{}", v),
        }
    }
}

/// A constraint on one catalog attribute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "op", content = "value", rename_all = "snake_case")]
pub enum Predicate {
    /// Field equals the value
    Exact(Scalar),

    /// Field lies within the bounds (inclusive; a missing bound is open)
    Range {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<Scalar>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<Scalar>,
    },

    /// Field contains any of the terms, case-insensitively
    Contains(Vec<String>),
}

impl Predicate {
    pub fn at_least(min: Scalar) -> Self {
        Self::Range {
            min: Some(min),
            max: None,
        }
    }

    pub fn between(min: Scalar, max: Scalar) -> Self {
        Self::Range {
            min: Some(min),
            max: Some(max),
        }
    }
}

/// The normalized, non-contradictory predicate set derived from `RawFilters`.
///
/// Holds at most one predicate per field.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CanonicalQuery {
    predicates: BTreeMap<Field, Predicate>,
}

impl CanonicalQuery {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the predicate for a field, returning the one it replaced.
    pub fn insert(&mut self, field: Field, predicate: Predicate) -> Option<Predicate> {
        self.predicates.insert(field, predicate)
    }

    pub fn get(&self, field: Field) -> Option<&Predicate> {
        self.predicates.get(&field)
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }

    pub fn len(&self) -> usize {
        self.predicates.len()
    }

    /// Iterate predicates in field order.
    pub fn iter(&self) -> impl Iterator<Item = (Field, &Predicate)> {
        self.predicates.iter().map(|(field, predicate)| (*field, predicate))
    }
}

/// A phone as held by the catalog store.
///
/// Owned by the catalog; the search core only reads it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogRecord {
    /// Catalog identifier
    #[serde(default)]
    pub id: String,

    pub brand: String,

    /// Model name (e.g. "Redmi 13 5G")
    pub name: String,

    /// Full display name, including marketing features
    #[serde(default)]
    pub full_name: String,

    /// Price in whole rupees
    pub price: u64,

    /// RAM in GB
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ram: Option<u64>,

    /// Storage in GB
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<u64>,

    /// Average rating, 0 to 5
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating_float: Option<f64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reviews: Option<u64>,

    /// Recent purchase count, used as a popularity proxy
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub bought: Option<u64>,

    #[serde(default)]
    pub is_in_stock: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub product_url: Option<String>,
}

impl CatalogRecord {
    /// Create a minimal record for testing.
    pub fn new(brand: impl Into<String>, name: impl Into<String>, price: u64) -> Self {
        let brand = brand.into();
        let name = name.into();
        Self {
            id: String::new(),
            full_name: format!("{} {}", brand, name),
            brand,
            name,
            price,
            ram: None,
            storage: None,
            rating_float: None,
            reviews: None,
            bought: None,
            is_in_stock: true,
            product_url: None,
        }
    }

    pub fn with_memory(mut self, ram: u64, storage: u64) -> Self {
        self.ram = Some(ram);
        self.storage = Some(storage);
        self
    }

    pub fn with_popularity(mut self, rating: f64, reviews: u64, bought: u64) -> Self {
        self.rating_float = Some(rating);
        self.reviews = Some(reviews);
        self.bought = Some(bought);
        self
    }

    pub fn with_full_name(mut self, full_name: impl Into<String>) -> Self {
        self.full_name = full_name.into();
        self
    }

    /// The name to show users: the full name when the catalog has one.
    pub fn display_name(&self) -> &str {
        if self.full_name.trim().is_empty() {
            &self.name
        } else {
            &self.full_name
        }
    }
}

/// A catalog record with its ranking score, alive for one search only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    #[serde(flatten)]
    pub record: CatalogRecord,

    pub score: f64,
}

/// Opaque reference to the conversation a search belongs to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ConversationId(String);

impl ConversationId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ConversationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ConversationId {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}

impl From<String> for ConversationId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

/// The canonical query a search actually used, filed against its conversation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolutionRecord {
    pub conversation_id: ConversationId,

    /// Serialized `CanonicalQuery`
    pub canonical_query: Value,

    /// The user's original message, when the caller has one
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_message: Option<String>,
}

impl ResolutionRecord {
    pub fn new(
        conversation_id: ConversationId,
        query: &CanonicalQuery,
        user_message: Option<String>,
    ) -> Result<Self, serde_json::Error> {
        Ok(Self {
            conversation_id,
            canonical_query: serde_json::to_value(query)?,
            user_message,
        })
    }
}

/// Why a search produced the results it did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum OutcomeReason {
    /// At least one phone matched
    Matched,
    /// The query ran but matched nothing
    NoMatches,
    /// The filters reduced to zero predicates; no query was run
    NoActionableCriteria,
}

/// Result of one search invocation.
#[derive(Debug, Clone, PartialEq)]
pub enum SearchOutcome {
    NoActionableCriteria,
    /// Final ordered results, possibly empty
    Ranked(Vec<ScoredCandidate>),
}

impl SearchOutcome {
    pub fn reason(&self) -> OutcomeReason {
        match self {
            Self::NoActionableCriteria => OutcomeReason::NoActionableCriteria,
            Self::Ranked(hits) if hits.is_empty() => OutcomeReason::NoMatches,
            Self::Ranked(_) => OutcomeReason::Matched,
        }
    }

    pub fn candidates(&self) -> &[ScoredCandidate] {
        match self {
            Self::NoActionableCriteria => &[],
            Self::Ranked(hits) => hits,
        }
    }

    pub fn into_candidates(self) -> Vec<ScoredCandidate> {
        match self {
            Self::NoActionableCriteria => Vec::new(),
            Self::Ranked(hits) => hits,
        }
    }
}

#[derive(Serialize)]
struct OutcomeBody<'a> {
    reason: OutcomeReason,
    phones: &'a [ScoredCandidate],
}

impl Serialize for SearchOutcome {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        OutcomeBody {
            reason: self.reason(),
            phones: self.candidates(),
        }
        .serialize(serializer)
    }
}
