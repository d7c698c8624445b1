//! Scrape stage orchestration: cached, governed, per-URL fallback.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use futures::future::join_all;
use tracing::{debug, instrument, warn};

use prospector_shared::{
    FallbackChain, Governor, RankedUrl, ScrapeConfig, ScrapedPage, ServiceClass,
};
use prospector_storage::{CacheSession, Namespace, url_key};

use crate::extract::{score_content_quality, truncate_content};
use crate::providers::{ScrapeRequest, ScrapeResponse};

/// Quality assigned to content the search provider delivered inline;
/// it skips extraction so the usual heuristics do not apply.
const INLINE_CONTENT_QUALITY: f64 = 50.0;

/// Fetches ranked URLs through the provider chain with per-URL caching.
/// URL-level failures degrade to failed pages, never stage errors.
pub struct ScrapeStage {
    chain: FallbackChain<ScrapeRequest, ScrapeResponse>,
    cache: Arc<CacheSession>,
    governor: Arc<Governor>,
    config: ScrapeConfig,
    cache_ttl: Duration,
}

impl ScrapeStage {
    pub fn new(
        chain: FallbackChain<ScrapeRequest, ScrapeResponse>,
        cache: Arc<CacheSession>,
        governor: Arc<Governor>,
        config: ScrapeConfig,
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

    /// Scrape every ranked URL concurrently, preserving input order.
    /// Inline content from the search phase short-circuits the fetch.
    #[instrument(skip_all, fields(company = %company_name, urls = urls.len()))]
    pub async fn scrape_urls(
        &self,
        urls: &[RankedUrl],
        company_name: &str,
        inline_content: &HashMap<String, String>,
    ) -> Vec<ScrapedPage> {
        let pages = join_all(urls.iter().map(|ranked| {
            self.scrape_one(
                &ranked.url,
                &ranked.title,
                company_name,
                inline_content.get(&ranked.url).map(String::as_str),
            )
        }))
        .await;

        let succeeded = pages.iter().filter(|p| p.has_content()).count();
        debug!(succeeded, total = pages.len(), "scrape phase complete");
        pages
    }

    /// Scrape a single URL outside a ranked batch (team pages, person
    /// profile pages).
    pub async fn scrape_page(&self, url: &str, title: &str, company_name: &str) -> ScrapedPage {
        self.scrape_one(url, title, company_name, None).await
    }

    async fn scrape_one(
        &self,
        url: &str,
        title: &str,
        company_name: &str,
        inline: Option<&str>,
    ) -> ScrapedPage {
        let key = url_key(url);
        let _guard = self.cache.key_lock(Namespace::Scrape, &key).await;

        if let Some(content) = inline {
            let page = self.assemble(url, title, company_name, content, Some(INLINE_CONTENT_QUALITY));
            self.store(&key, &page).await;
            return page;
        }

        match self.cache.get(Namespace::Scrape, &key).await {
            Ok(Some(payload)) => {
                if let Ok(page) = serde_json::from_str::<ScrapedPage>(&payload) {
                    debug!(%url, "scrape cache hit");
                    return page;
                }
            }
            Ok(None) => {}
            Err(e) => warn!(%url, error = %e, "scrape cache read failed"),
        }

        let _permit = self.governor.acquire(ServiceClass::Scrape).await;
        let request = ScrapeRequest {
            url: url.to_string(),
        };
        match self.chain.execute(&request).await {
            Ok(resp) => {
                let page = self.assemble(url, title, company_name, &resp.content, None);
                self.store(&key, &page).await;
                page
            }
            Err(e) => {
                warn!(%url, error = %e, "scrape failed on all providers");
                ScrapedPage::failed(url, e.to_string())
            }
        }
    }

    fn assemble(
        &self,
        url: &str,
        title: &str,
        company_name: &str,
        content: &str,
        fixed_quality: Option<f64>,
    ) -> ScrapedPage {
        let content = truncate_content(content, self.config.content_max_chars);
        let quality_score =
            fixed_quality.unwrap_or_else(|| score_content_quality(&content, company_name));
        ScrapedPage {
            url: url.to_string(),
            title: title.to_string(),
            content_length: content.len(),
            content,
            quality_score,
            error: None,
        }
    }

    async fn store(&self, key: &str, page: &ScrapedPage) {
        let Ok(payload) = serde_json::to_string(page) else {
            return;
        };
        if let Err(e) = self
            .cache
            .put(Namespace::Scrape, key, &payload, self.cache_ttl)
            .await
        {
            warn!(url = %page.url, error = %e, "scrape cache write failed");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{DirectFetchProvider, ReaderProvider};
    use prospector_shared::LimitsConfig;
    use prospector_storage::Storage;
    use uuid::Uuid;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn test_cache() -> Arc<CacheSession> {
        let tmp = std::env::temp_dir().join(format!("prospector_test_{}.db", Uuid::now_v7()));
        let storage = Arc::new(Storage::open(&tmp).await.expect("open test db"));
        Arc::new(CacheSession::new(storage, false))
    }

    fn test_stage(
        chain: FallbackChain<ScrapeRequest, ScrapeResponse>,
        cache: Arc<CacheSession>,
    ) -> ScrapeStage {
        ScrapeStage::new(
            chain,
            cache,
            Arc::new(Governor::new(&LimitsConfig::default())),
            ScrapeConfig::default(),
            Duration::from_secs(3600),
        )
    }

    fn direct_chain(timeout: Duration) -> FallbackChain<ScrapeRequest, ScrapeResponse> {
        FallbackChain::new("scrape").with(Box::new(
            DirectFetchProvider::new(timeout, 1).expect("provider"),
        ))
    }

    fn ranked(url: &str, title: &str) -> RankedUrl {
        RankedUrl {
            url: url.to_string(),
            title: title.to_string(),
            domain: String::new(),
            quality_score: 50,
            source_queries: vec![],
        }
    }

    #[tokio::test]
    async fn scrapes_and_caches_pages() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/about"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string(
                        "<html><body><main><p>Ridge Capital is a direct lender focused on \
                         senior secured term loans for middle market borrowers.</p></main></body></html>",
                    ),
            )
            .expect(1)
            .mount(&server)
            .await;

        let stage = test_stage(direct_chain(Duration::from_secs(5)), test_cache().await);
        let url = format!("{}/about", server.uri());
        let urls = vec![ranked(&url, "About Ridge")];

        let first = stage.scrape_urls(&urls, "Ridge Capital", &HashMap::new()).await;
        assert_eq!(first.len(), 1);
        assert!(first[0].has_content());
        assert!(first[0].content.contains("direct lender"));
        assert!(first[0].quality_score > 0.0);

        // Second pass must come from cache; wiremock's expect(1) enforces it.
        let second = stage.scrape_urls(&urls, "Ridge Capital", &HashMap::new()).await;
        assert_eq!(second[0].content, first[0].content);
    }

    #[tokio::test]
    async fn inline_content_skips_the_network() {
        let stage = test_stage(direct_chain(Duration::from_secs(5)), test_cache().await);
        let url = "https://ridgecapital.com/funds";
        let mut inline = HashMap::new();
        inline.insert(
            url.to_string(),
            "Ridge Capital Fund IV closed at $2 billion.".to_string(),
        );

        let pages = stage
            .scrape_urls(&[ranked(url, "Funds")], "Ridge Capital", &inline)
            .await;
        assert!(pages[0].content.contains("$2 billion"));
        assert_eq!(pages[0].quality_score, INLINE_CONTENT_QUALITY);
    }

    #[tokio::test]
    async fn failed_url_yields_failed_page_not_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let reader = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(451))
            .mount(&reader)
            .await;

        let chain = direct_chain(Duration::from_secs(5)).with(Box::new(
            ReaderProvider::with_endpoint(format!("{}/", reader.uri()), Duration::from_secs(5))
                .expect("provider"),
        ));
        let stage = test_stage(chain, test_cache().await);

        let pages = stage
            .scrape_urls(
                &[ranked(&server.uri(), "Blocked")],
                "Ridge Capital",
                &HashMap::new(),
            )
            .await;
        assert!(!pages[0].has_content());
        let error = pages[0].error.as_deref().unwrap_or_default();
        assert!(error.contains("direct"));
        assert!(error.contains("reader"));
    }

    #[tokio::test]
    async fn reader_serves_when_direct_extraction_fails() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string("<html><body><script>app()</script></body></html>"),
            )
            .mount(&server)
            .await;

        let reader = MockServer::start().await;
        let body = "Ridge Capital provides unitranche facilities. ".repeat(5);
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body))
            .mount(&reader)
            .await;

        let chain = direct_chain(Duration::from_secs(5)).with(Box::new(
            ReaderProvider::with_endpoint(format!("{}/", reader.uri()), Duration::from_secs(5))
                .expect("provider"),
        ));
        let stage = test_stage(chain, test_cache().await);

        let page = stage
            .scrape_page(&server.uri(), "SPA page", "Ridge Capital")
            .await;
        assert!(page.has_content());
        assert!(page.content.contains("unitranche"));
    }
}
