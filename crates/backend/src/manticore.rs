//! Manticore Search catalog store.
//!
//! Filters run in Manticore; candidates come back whole and are scored by
//! the core.

use phonefinder_model::CatalogRecord;
use phonefinder_query::{ManticoreDialect, QueryDialect, StoreQuery};
use serde::Deserialize;
use serde_json::Value;

use crate::{BackendError, CatalogStore};

/// Manticore Search backend configuration.
#[derive(Debug, Clone)]
pub struct ManticoreConfig {
    /// Base URL for Manticore HTTP API
    pub base_url: String,
    /// Table/index name
    pub table_name: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Maximum candidates fetched per query
    pub candidate_limit: usize,
}

impl Default for ManticoreConfig {
    fn default() -> Self {
        Self {
            base_url: "http://127.0.0.1:9308".to_string(),
            table_name: "phones".to_string(),
            timeout_secs: 30,
            candidate_limit: 1000,
        }
    }
}

/// Manticore Search catalog.
pub struct ManticoreCatalog {
    config: ManticoreConfig,
    dialect: ManticoreDialect,
    client: reqwest::Client,
}

/// A row of the phones table as Manticore returns it.
#[derive(Debug, Deserialize)]
struct PhoneRow {
    #[serde(default)]
    brand: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    full_name: String,
    #[serde(default)]
    price: u64,
    ram: Option<u64>,
    storage: Option<u64>,
    rating_float: Option<f64>,
    reviews: Option<u64>,
    bought: Option<u64>,
    #[serde(default)]
    is_in_stock: Value,
    product_url: Option<String>,
}

impl ManticoreCatalog {
    /// Create a new Manticore catalog.
    pub fn new(config: ManticoreConfig) -> Result<Self, BackendError> {
        let client = reqwest::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| BackendError::Connection(e.to_string()))?;

        let dialect = ManticoreDialect {
            table: config.table_name.clone(),
            limit: config.candidate_limit,
        };

        Ok(Self {
            config,
            dialect,
            client,
        })
    }

    /// Build SQL query for Manticore.
    fn build_query(&self, query: &StoreQuery) -> Result<String, BackendError> {
        self.dialect
            .render(query)
            .map_err(|e| BackendError::QueryFailed(e.to_string()))
    }

    /// A full page means Manticore may have dropped matches past the limit,
    /// leaving ranking with a partial candidate set.
    fn limit_reached(&self, returned: usize) -> bool {
        returned >= self.config.candidate_limit
    }

    /// Parse Manticore response into records.
    fn parse_response(&self, response: Value) -> Result<Vec<CatalogRecord>, BackendError> {
        let hits = response
            .get("hits")
            .and_then(|h| h.get("hits"))
            .and_then(|h| h.as_array())
            .ok_or_else(|| BackendError::ParseError("Missing hits array".to_string()))?;

        let mut results = Vec::with_capacity(hits.len());

        for hit in hits {
            let source = hit
                .get("_source")
                .ok_or_else(|| BackendError::ParseError("Missing _source".to_string()))?;

            let row: PhoneRow = serde_json::from_value(source.clone())
                .map_err(|e| BackendError::ParseError(e.to_string()))?;

            let id = match hit.get("_id") {
                Some(Value::String(s)) => s.clone(),
                Some(Value::Number(n)) => n.to_string(),
                _ => String::new(),
            };

            results.push(CatalogRecord {
                id,
                brand: row.brand,
                name: row.name,
                full_name: row.full_name,
                price: row.price,
                ram: row.ram,
                storage: row.storage,
                rating_float: row.rating_float,
                reviews: row.reviews,
                bought: row.bought,
                is_in_stock: match row.is_in_stock {
                    Value::Bool(b) => b,
                    Value::Number(n) => n.as_u64().unwrap_or(0) != 0,
                    _ => false,
                },
                product_url: row.product_url.filter(|url| !url.is_empty()),
            });
        }

        Ok(results)
    }
}

impl CatalogStore for ManticoreCatalog {
    async fn query(&self, query: &StoreQuery) -> Result<Vec<CatalogRecord>, BackendError> {
        let sql = self.build_query(query)?;

        tracing::debug!(sql = %sql, "Executing Manticore query");

        let response = self
            .client
            .post(format!("{}/sql", self.config.base_url))
            .form(&[("query", sql.as_str())])
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BackendError::Timeout {
                        after_ms: self.config.timeout_secs * 1000,
                    }
                } else {
                    BackendError::Connection(e.to_string())
                }
            })?;

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::QueryFailed(format!(
                "HTTP {}: {}",
                status, body
            )));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| BackendError::ParseError(e.to_string()))?;

        let records = self.parse_response(json)?;

        if self.limit_reached(records.len()) {
            tracing::warn!(
                candidate_limit = self.config.candidate_limit,
                "Manticore returned a full page of candidates; ranking may miss matches beyond the limit"
            );
        }

        Ok(records)
    }

    async fn health_check(&self) -> Result<(), BackendError> {
        let response = self
            .client
            .post(format!("{}/cli", self.config.base_url))
            .body("SHOW STATUS")
            .send()
            .await
            .map_err(|e| BackendError::Connection(e.to_string()))?;

        if response.status().is_success() {
            Ok(())
        } else {
            Err(BackendError::Unavailable)
        }
    }

    fn name(&self) -> &'static str {
        "manticore"
    }
}
