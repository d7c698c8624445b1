//! Search stage orchestration: cached, governed, fallback-chained queries.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, instrument, warn};

use prospector_shared::{
    FallbackChain, Governor, RankedUrl, Result, SearchConfig, SearchHit, ServiceClass,
};
use prospector_storage::{CacheSession, Namespace, query_key};

use crate::providers::{SearchRequest, SearchResponse};
use crate::ranker::rank_and_deduplicate;
use crate::strategy::{GeneratedQuery, company_queries, person_queries};

/// Ranked output of the company search phase.
#[derive(Debug, Default)]
pub struct SearchOutcome {
    pub urls: Vec<RankedUrl>,
    /// Page content the primary provider scraped inline (URL -> markdown).
    pub inline_content: HashMap<String, String>,
    /// At least one query exhausted its provider chain.
    pub degraded: bool,
}

/// Raw hits from a person search; ranking happens in the person pipeline.
#[derive(Debug, Default)]
pub struct PersonSearchOutcome {
    pub hits: Vec<SearchHit>,
    pub inline_content: HashMap<String, String>,
    pub degraded: bool,
}

/// Issues queries through the provider chain with per-query caching.
pub struct SearchStage {
    chain: FallbackChain<SearchRequest, SearchResponse>,
    cache: Arc<CacheSession>,
    governor: Arc<Governor>,
    config: SearchConfig,
    cache_ttl: Duration,
}

impl SearchStage {
    pub fn new(
        chain: FallbackChain<SearchRequest, SearchResponse>,
        cache: Arc<CacheSession>,
        governor: Arc<Governor>,
        config: SearchConfig,
        cache_ttl: Duration,
    ) -> Self {
        Self {
            chain,
            cache,
            governor,
            config,
            cache_ttl,
        }
    }

    /// Run all company queries, then merge, dedupe, rank, and truncate.
    /// A failed query degrades the outcome instead of failing the stage.
    #[instrument(skip_all, fields(company = %search_name))]
    pub async fn search_company(&self, search_name: &str) -> SearchOutcome {
        let queries = company_queries(search_name, self.config.max_queries_per_company);

        let results = join_all(queries.iter().map(|q| self.run_query(q))).await;

        let mut all_hits: Vec<SearchHit> = Vec::new();
        let mut inline_content = HashMap::new();
        let mut degraded = false;
        for (query, result) in queries.iter().zip(results) {
            match result {
                Ok(resp) => {
                    all_hits.extend(resp.hits);
                    inline_content.extend(resp.inline_content);
                }
                Err(e) => {
                    warn!(purpose = query.purpose, error = %e, "search query failed");
                    degraded = true;
                }
            }
        }

        let urls = rank_and_deduplicate(&all_hits, search_name, self.config.max_urls);
        debug!(
            candidates = all_hits.len(),
            ranked = urls.len(),
            inline = inline_content.len(),
            "company search complete"
        );
        SearchOutcome {
            urls,
            inline_content,
            degraded,
        }
    }

    /// Run the capped person queries and return the raw hits.
    #[instrument(skip_all, fields(person = %person_name))]
    pub async fn search_person(
        &self,
        person_name: &str,
        company_name: &str,
        company_domain: Option<&str>,
    ) -> PersonSearchOutcome {
        let queries = person_queries(person_name, company_name, company_domain)
            .into_iter()
            .take(self.config.max_person_queries)
            .collect::<Vec<_>>();

        let results = join_all(queries.iter().map(|q| self.run_query(q))).await;

        let mut outcome = PersonSearchOutcome::default();
        for (query, result) in queries.iter().zip(results) {
            match result {
                Ok(resp) => {
                    outcome.hits.extend(resp.hits);
                    outcome.inline_content.extend(resp.inline_content);
                }
                Err(e) => {
                    warn!(purpose = query.purpose, error = %e, "person query failed");
                    outcome.degraded = true;
                }
            }
        }
        outcome
    }

    /// Run a single ad-hoc query (team page discovery uses this).
    pub async fn search_one(&self, query: &GeneratedQuery) -> Result<SearchResponse> {
        self.run_query(query).await
    }

    /// Cache-checked, governed execution of one query. The per-key lock
    /// collapses concurrent identical queries into a single fetch.
    async fn run_query(&self, query: &GeneratedQuery) -> Result<SearchResponse> {
        let key = query_key(&query.query);
        let _guard = self.cache.key_lock(Namespace::Search, &key).await;

        if let Some(payload) = self.cache.get(Namespace::Search, &key).await? {
            if let Ok(hits) = serde_json::from_str::<Vec<SearchHit>>(&payload) {
                debug!(purpose = query.purpose, "search cache hit");
                return Ok(SearchResponse {
                    hits,
                    inline_content: HashMap::new(),
                });
            }
        }

        let _permit = self.governor.acquire(ServiceClass::Search).await;
        let request = SearchRequest {
            query: query.query.clone(),
            purpose: query.purpose.to_string(),
            num_results: self.config.max_search_results,
        };
        let response = self.chain.execute(&request).await?;

        if !response.hits.is_empty() {
            let payload = serde_json::to_string(&response.hits)
                .map_err(|e| prospector_shared::ProspectorError::parse(e.to_string()))?;
            self.cache
                .put(Namespace::Search, &key, &payload, self.cache_ttl)
                .await?;
        }
        Ok(response)
    }
}
