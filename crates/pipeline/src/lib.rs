//! Search pipeline for the phone finder.
//!
//! One search runs: normalize → translate → store query → score →
//! diversify. The canonical query is recorded against the conversation
//! concurrently with retrieval; recording never fails or holds up a search
//! beyond its timeout.
//!
//! The pipeline keeps no state between searches, so one instance can serve
//! concurrent requests.

pub mod config;
pub mod recorder;

pub use config::{ConfigError, PipelineConfig};

use phonefinder_backend::{BackendError, CatalogStore, ConversationLog};
use phonefinder_model::{CanonicalQuery, CatalogRecord, ConversationId, RawFilters, SearchOutcome};
use phonefinder_query::{normalize, translate, StoreQuery};
use phonefinder_rerank::{diversify, rank};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Catalog retrieval failed: {0}")]
    Retrieval(#[from] BackendError),
}

/// Input for one search.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub conversation_id: ConversationId,
    /// The user's original message, stored with the resolution record
    pub message: Option<String>,
    pub filters: RawFilters,
}

impl SearchRequest {
    pub fn new(conversation_id: impl Into<ConversationId>, filters: RawFilters) -> Self {
        Self {
            conversation_id: conversation_id.into(),
            message: None,
            filters,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

pub struct SearchPipeline<S, L> {
    store: S,
    log: L,
    config: PipelineConfig,
}

impl<S: CatalogStore, L: ConversationLog> SearchPipeline<S, L> {
    pub fn new(store: S, log: L, config: PipelineConfig) -> Self {
        Self { store, log, config }
    }

    pub fn config(&self) -> &PipelineConfig {
        &self.config
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn log(&self) -> &L {
        &self.log
    }

    /// Normalize raw filters with this pipeline's settings.
    pub fn resolve(&self, filters: &RawFilters) -> CanonicalQuery {
        normalize(filters, &self.config.normalize)
    }

    /// Run one search.
    ///
    /// Filters that reduce to no predicates short-circuit to
    /// `SearchOutcome::NoActionableCriteria` without touching the store or
    /// the conversation log.
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchOutcome, SearchError> {
        let canonical = self.resolve(&request.filters);

        if canonical.is_empty() {
            tracing::info!(
                conversation_id = %request.conversation_id,
                "No actionable search criteria"
            );
            return Ok(SearchOutcome::NoActionableCriteria);
        }

        let store_query = translate(&canonical);

        tracing::debug!(
            conversation_id = %request.conversation_id,
            predicates = canonical.len(),
            "Resolved search criteria"
        );

        let (candidates, ()) = tokio::join!(
            self.retrieve(&store_query),
            recorder::record(
                &self.log,
                &request.conversation_id,
                &canonical,
                request.message.as_deref(),
                self.config.record_timeout(),
            ),
        );
        let candidates = candidates?;
        let retrieved = candidates.len();

        let ranked = rank(candidates, &self.config.scoring);
        let selected = diversify(ranked, &self.config.diversity);

        tracing::info!(
            conversation_id = %request.conversation_id,
            store = self.store.name(),
            retrieved,
            returned = selected.len(),
            "Search completed"
        );

        Ok(SearchOutcome::Ranked(selected))
    }

    async fn retrieve(&self, query: &StoreQuery) -> Result<Vec<CatalogRecord>, BackendError> {
        let timeout = self.config.store_timeout();

        tokio::time::timeout(timeout, self.store.query(query))
            .await
            .map_err(|_| BackendError::Timeout {
                after_ms: timeout.as_millis() as u64,
            })?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    use phonefinder_backend::{LogError, MemoryCatalog, MemoryConversationLog};
    use phonefinder_model::{OutcomeReason, ResolutionRecord};
    use serde_json::json;

    /// Wraps a store and counts the queries it receives.
    struct CountingStore {
        inner: MemoryCatalog,
        calls: AtomicUsize,
    }

    impl CountingStore {
        fn new(records: Vec<CatalogRecord>) -> Self {
            Self {
                inner: MemoryCatalog::new(records),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    impl CatalogStore for CountingStore {
        async fn query(&self, query: &StoreQuery) -> Result<Vec<CatalogRecord>, BackendError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.inner.query(query).await
        }

        async fn health_check(&self) -> Result<(), BackendError> {
            Ok(())
        }

        fn name(&self) -> &'static str {
            "counting"
        }
    }

    struct FailingStore;

    impl CatalogStore for FailingStore {
        async fn query(&self, _query: &StoreQuery) -> Result<Vec<CatalogRecord>, BackendError> {
            Err(BackendError::Connection("connection refused".to_string()))
        }

        async fn health_check(&self) -> Result<(), BackendError> {
            Err(BackendError::Unavailable)
        }

        fn name(&self) -> &'static str {
            "failing"
        }
    }

    struct StalledStore;

    impl CatalogStore for StalledStore {
        async fn query(&self, _query: &StoreQuery) -> Result<Vec<CatalogRecord>, BackendError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(Vec::new())
        }

        async fn health_check(&self) -> Result<(), BackendError> {
            Ok(())
        }

        fn name(&self) -> &'static str {
            "stalled"
        }
    }

    struct BrokenLog;

    impl ConversationLog for BrokenLog {
        async fn append(&self, _record: &ResolutionRecord) -> Result<(), LogError> {
            Err(LogError::Unavailable)
        }
    }

    struct StalledLog;

    impl ConversationLog for StalledLog {
        async fn append(&self, _record: &ResolutionRecord) -> Result<(), LogError> {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        }
    }

    /// 20 phones in the ₹12,000–₹15,000 band across three brands, plus two outside it.
    fn catalog() -> Vec<CatalogRecord> {
        let mut records = Vec::new();
        for (brand, count) in [("Samsung", 10u64), ("Xiaomi", 6), ("Realme", 4)] {
            for i in 0..count {
                records.push(
                    CatalogRecord::new(brand, format!("{} {}", brand, i), 12_000 + i * 300)
                        .with_memory(8, 128)
                        .with_popularity(4.0, 100 * (count - i), 50 * (i % 3)),
                );
            }
        }
        records.push(CatalogRecord::new("Apple", "iPhone 15", 69_999).with_popularity(4.6, 9000, 5000));
        records.push(CatalogRecord::new("Nokia", "105", 1_299).with_popularity(3.9, 8000, 4000));
        records
    }

    fn pipeline<S: CatalogStore, L: ConversationLog>(store: S, log: L) -> SearchPipeline<S, L> {
        SearchPipeline::new(store, log, PipelineConfig::default())
    }

    fn request(filters: serde_json::Value) -> SearchRequest {
        SearchRequest::new("conv-1", RawFilters::from_value(filters))
    }

    #[tokio::test]
    async fn test_budget_search_is_banded_capped_and_ordered() {
        let pipeline = pipeline(CountingStore::new(catalog()), MemoryConversationLog::new());

        let outcome = pipeline
            .search(&request(json!({ "price_max": 15000 })).with_message("phones under 15000"))
            .await
            .unwrap();
        assert_eq!(outcome.reason(), OutcomeReason::Matched);

        let hits = outcome.candidates();
        assert!(!hits.is_empty() && hits.len() <= 8);

        let mut per_brand: HashMap<&str, usize> = HashMap::new();
        for hit in hits {
            assert!((12_000..=15_000).contains(&hit.record.price));
            *per_brand.entry(hit.record.brand.as_str()).or_insert(0) += 1;
        }
        assert!(per_brand.values().all(|&n| n <= 4));
        assert_eq!(per_brand.len(), 3);

        for pair in hits.windows(2) {
            let (a, b) = (&pair[0], &pair[1]);
            assert!(a.score > b.score || (a.score == b.score && a.record.price <= b.record.price));
        }

        let records = pipeline.log().records();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].conversation_id.as_str(), "conv-1");
        assert_eq!(records[0].user_message.as_deref(), Some("phones under 15000"));
        assert_eq!(
            records[0].canonical_query["price"],
            json!({ "op": "range", "value": { "min": 12000, "max": 15000 } })
        );
        assert_eq!(pipeline.store().calls(), 1);
    }

    #[tokio::test]
    async fn test_empty_filters_short_circuit() {
        let pipeline = pipeline(CountingStore::new(catalog()), MemoryConversationLog::new());

        let outcome = pipeline.search(&request(json!({}))).await.unwrap();

        assert_eq!(outcome, SearchOutcome::NoActionableCriteria);
        assert_eq!(pipeline.store().calls(), 0);
        assert!(pipeline.log().records().is_empty());
    }

    #[tokio::test]
    async fn test_unusable_filters_short_circuit() {
        let pipeline = pipeline(CountingStore::new(catalog()), MemoryConversationLog::new());

        let outcome = pipeline
            .search(&request(json!({ "price_max": "cheap", "brand": "" })))
            .await
            .unwrap();

        assert_eq!(outcome.reason(), OutcomeReason::NoActionableCriteria);
        assert_eq!(pipeline.store().calls(), 0);
    }

    #[tokio::test]
    async fn test_zero_matches_is_success_and_still_recorded() {
        let pipeline = pipeline(CountingStore::new(catalog()), MemoryConversationLog::new());

        let outcome = pipeline.search(&request(json!({ "brand": "Motorola" }))).await.unwrap();

        assert_eq!(outcome, SearchOutcome::Ranked(Vec::new()));
        assert_eq!(outcome.reason(), OutcomeReason::NoMatches);
        assert_eq!(pipeline.log().records().len(), 1);
    }

    #[tokio::test]
    async fn test_retrieval_failure_propagates() {
        let pipeline = pipeline(FailingStore, MemoryConversationLog::new());

        let result = pipeline.search(&request(json!({ "ram": 8 }))).await;

        assert!(matches!(
            result,
            Err(SearchError::Retrieval(BackendError::Connection(_)))
        ));
        assert_eq!(pipeline.log().records().len(), 1);
    }

    #[tokio::test]
    async fn test_store_timeout_is_retrieval_failure() {
        let config = PipelineConfig {
            store_timeout_ms: 20,
            ..Default::default()
        };
        let pipeline = SearchPipeline::new(StalledStore, MemoryConversationLog::new(), config);

        let result = pipeline.search(&request(json!({ "ram": 8 }))).await;

        assert!(matches!(
            result,
            Err(SearchError::Retrieval(BackendError::Timeout { after_ms: 20 }))
        ));
    }

    #[tokio::test]
    async fn test_recording_failure_is_swallowed() {
        let pipeline = pipeline(CountingStore::new(catalog()), BrokenLog);

        let outcome = pipeline.search(&request(json!({ "brand": "xiaomi" }))).await.unwrap();

        assert_eq!(outcome.candidates().len(), 4);
    }

    #[tokio::test]
    async fn test_slow_recording_is_cut_off() {
        let config = PipelineConfig {
            record_timeout_ms: 20,
            ..Default::default()
        };
        let pipeline = SearchPipeline::new(CountingStore::new(catalog()), StalledLog, config);

        let started = std::time::Instant::now();
        let outcome = pipeline.search(&request(json!({ "brand": "realme" }))).await.unwrap();

        assert_eq!(outcome.candidates().len(), 4);
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_custom_diversity_settings() {
        let mut config = PipelineConfig::default();
        config.diversity.per_brand_cap = 1;
        let pipeline = SearchPipeline::new(
            CountingStore::new(catalog()),
            MemoryConversationLog::new(),
            config,
        );

        let outcome = pipeline.search(&request(json!({ "price_min": 1000 }))).await.unwrap();
        let brands: Vec<_> = outcome.candidates().iter().map(|h| h.record.brand.as_str()).collect();

        assert_eq!(brands.len(), 5);
        assert_eq!(brands[0], "Apple");
    }
}
