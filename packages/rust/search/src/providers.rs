//! Search providers behind the stage's fallback chain.
//!
//! [`PrimarySearchClient`] talks to the keyed search API and asks for
//! inline markdown per result, letting the scrape stage skip those URLs
//! entirely. [`FreeSearchClient`] scrapes the keyless HTML endpoint and
//! is paced to avoid rate limits.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use scraper::{Html, Selector};
use serde::Deserialize;
use tracing::{debug, warn};
use url::Url;

use prospector_shared::{
    Pacer, ProspectorError, Provider, ProviderFailure, Result, SearchHit, backoff_delay,
};

/// Production endpoint of the keyed search API.
pub const PRIMARY_SEARCH_URL: &str = "https://api.firecrawl.dev/v2/search";

/// Production endpoint of the keyless HTML fallback.
pub const FREE_SEARCH_URL: &str = "https://html.duckduckgo.com/html/";

/// Inline content shorter than this is treated as boilerplate and dropped.
const MIN_INLINE_CONTENT_CHARS: usize = 50;

/// Retries against the keyless provider on 429 before giving up.
const FREE_MAX_RETRIES: u32 = 2;

/// One query dispatched to a provider.
#[derive(Debug, Clone)]
pub struct SearchRequest {
    pub query: String,
    /// Purpose tag stamped onto every hit this query produces.
    pub purpose: String,
    pub num_results: usize,
}

/// Hits plus any page content the provider scraped inline (URL -> markdown).
#[derive(Debug, Clone, Default)]
pub struct SearchResponse {
    pub hits: Vec<SearchHit>,
    pub inline_content: HashMap<String, String>,
}

// ---------------------------------------------------------------------------
// Primary provider
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct PrimaryApiResponse {
    #[serde(default)]
    success: bool,
    #[serde(default)]
    warning: Option<String>,
    #[serde(default)]
    data: PrimaryData,
}

/// The API nests results under `web`; older responses are a flat list.
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum PrimaryData {
    Nested {
        #[serde(default)]
        web: Vec<PrimaryResult>,
    },
    Flat(Vec<PrimaryResult>),
}

impl Default for PrimaryData {
    fn default() -> Self {
        PrimaryData::Nested { web: Vec::new() }
    }
}

impl PrimaryData {
    fn into_results(self) -> Vec<PrimaryResult> {
        match self {
            PrimaryData::Nested { web } => web,
            PrimaryData::Flat(list) => list,
        }
    }
}

#[derive(Debug, Deserialize)]
struct PrimaryResult {
    #[serde(default)]
    url: String,
    #[serde(default)]
    title: String,
    #[serde(default)]
    description: String,
    #[serde(default)]
    markdown: String,
}

/// Keyed search API client with integrated inline scraping.
pub struct PrimarySearchClient {
    client: Client,
    endpoint: String,
    api_key: String,
}

impl PrimarySearchClient {
    pub fn new(api_key: String, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProspectorError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: PRIMARY_SEARCH_URL.to_string(),
            api_key,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }
}

#[async_trait]
impl Provider<SearchRequest, SearchResponse> for PrimarySearchClient {
    fn name(&self) -> &str {
        "primary"
    }

    async fn attempt(
        &self,
        req: &SearchRequest,
    ) -> std::result::Result<SearchResponse, ProviderFailure> {
        let payload = serde_json::json!({
            "query": req.query,
            "limit": req.num_results,
            "scrapeOptions": {
                "formats": ["markdown"],
                "onlyMainContent": true,
            },
        });

        let response = self
            .client
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| ProviderFailure::qualifying(format!("request failed: {e}")))?;

        let status = response.status();
        match status {
            StatusCode::PAYMENT_REQUIRED | StatusCode::UNAUTHORIZED => {
                // Credits or credentials will not heal mid-run.
                return Err(ProviderFailure::outage(format!("HTTP {status}")));
            }
            s if !s.is_success() => {
                return Err(ProviderFailure::qualifying(format!("HTTP {s}")));
            }
            _ => {}
        }

        let body: PrimaryApiResponse = response
            .json()
            .await
            .map_err(|e| ProviderFailure::qualifying(format!("invalid response body: {e}")))?;

        if !body.success {
            let warning = body.warning.unwrap_or_else(|| "unknown error".into());
            return Err(ProviderFailure::qualifying(warning));
        }

        let mut hits = Vec::new();
        let mut inline_content = HashMap::new();
        for (i, item) in body.data.into_results().into_iter().enumerate() {
            if item.url.is_empty() {
                continue;
            }
            if item.markdown.len() > MIN_INLINE_CONTENT_CHARS {
                inline_content.insert(item.url.clone(), item.markdown);
            }
            hits.push(SearchHit {
                url: item.url,
                title: item.title,
                snippet: item.description,
                query_purpose: req.purpose.clone(),
                position: i + 1,
            });
        }

        debug!(
            query = %req.query,
            hits = hits.len(),
            inline = inline_content.len(),
            "primary search complete"
        );
        Ok(SearchResponse {
            hits,
            inline_content,
        })
    }
}

// ---------------------------------------------------------------------------
// Free provider
// ---------------------------------------------------------------------------

/// Keyless HTML-endpoint search client, serialized through a pacer.
pub struct FreeSearchClient {
    client: Client,
    endpoint: String,
    pacer: Pacer,
    min_interval: Duration,
}

impl FreeSearchClient {
    pub fn new(min_interval: Duration, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ProspectorError::Network(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            client,
            endpoint: FREE_SEARCH_URL.to_string(),
            pacer: Pacer::new(min_interval),
            min_interval,
        })
    }

    pub fn with_endpoint(mut self, endpoint: impl Into<String>) -> Self {
        self.endpoint = endpoint.into();
        self
    }

    /// The endpoint wraps result links in a redirect; unwrap the target.
    fn resolve_redirect(href: &str) -> Option<String> {
        if href.is_empty() {
            return None;
        }
        let absolute = if href.starts_with("//") {
            format!("https:{href}")
        } else {
            href.to_string()
        };
        let parsed = Url::parse(&absolute).ok()?;
        if let Some((_, target)) = parsed.query_pairs().find(|(k, _)| k == "uddg") {
            return Some(target.into_owned());
        }
        if absolute.starts_with("http://") || absolute.starts_with("https://") {
            return Some(absolute);
        }
        None
    }

    fn parse_results(html: &str, req: &SearchRequest) -> Vec<SearchHit> {
        let document = Html::parse_document(html);
        let result_sel = Selector::parse("div.result").unwrap();
        let link_sel = Selector::parse("a.result__a").unwrap();
        let snippet_sel = Selector::parse(".result__snippet").unwrap();

        let mut hits = Vec::new();
        for element in document.select(&result_sel) {
            let Some(link) = element.select(&link_sel).next() else {
                continue;
            };
            let Some(url) =
                Self::resolve_redirect(link.value().attr("href").unwrap_or_default())
            else {
                continue;
            };

            let title = link.text().collect::<String>().trim().to_string();
            let snippet = element
                .select(&snippet_sel)
                .next()
                .map(|s| s.text().collect::<String>().trim().to_string())
                .unwrap_or_default();

            hits.push(SearchHit {
                url,
                title,
                snippet,
                query_purpose: req.purpose.clone(),
                position: hits.len() + 1,
            });
            if hits.len() >= req.num_results {
                break;
            }
        }
        hits
    }
}

#[async_trait]
impl Provider<SearchRequest, SearchResponse> for FreeSearchClient {
    fn name(&self) -> &str {
        "free"
    }

    async fn attempt(
        &self,
        req: &SearchRequest,
    ) -> std::result::Result<SearchResponse, ProviderFailure> {
        for attempt in 0..=FREE_MAX_RETRIES {
            self.pacer.wait().await;

            let response = self
                .client
                .get(&self.endpoint)
                .query(&[("q", req.query.as_str())])
                .send()
                .await
                .map_err(|e| ProviderFailure::qualifying(format!("request failed: {e}")))?;

            let status = response.status();
            if status == StatusCode::TOO_MANY_REQUESTS {
                if attempt < FREE_MAX_RETRIES {
                    let wait = backoff_delay(self.min_interval, attempt + 1);
                    warn!(query = %req.query, attempt, ?wait, "rate limited, backing off");
                    tokio::time::sleep(wait).await;
                    continue;
                }
                return Err(ProviderFailure::qualifying("rate limited (HTTP 429)"));
            }
            if !status.is_success() {
                return Err(ProviderFailure::qualifying(format!("HTTP {status}")));
            }

            let html = response
                .text()
                .await
                .map_err(|e| ProviderFailure::qualifying(format!("body read failed: {e}")))?;

            let hits = Self::parse_results(&html, req);
            debug!(query = %req.query, hits = hits.len(), "free search complete");
            return Ok(SearchResponse {
                hits,
                inline_content: HashMap::new(),
            });
        }

        Err(ProviderFailure::qualifying("max retries exceeded"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(query: &str) -> SearchRequest {
        SearchRequest {
            query: query.into(),
            purpose: "core_strategy".into(),
            num_results: 10,
        }
    }

    #[tokio::test]
    async fn primary_parses_nested_results_and_inline_content() {
        let server = MockServer::start().await;
        let long_markdown = "Apex Credit is a direct lender. ".repeat(5);
        Mock::given(method("POST"))
            .and(path("/v2/search"))
            .and(header("authorization", "Bearer test-key"))
            .and(body_partial_json(serde_json::json!({"query": "apex"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": true,
                "data": {
                    "web": [
                        {
                            "url": "https://apex.example/credit",
                            "title": "Apex Credit",
                            "description": "Direct lending strategies",
                            "markdown": long_markdown,
                        },
                        {
                            "url": "https://news.example/apex",
                            "title": "Apex raises fund",
                            "description": "News",
                            "markdown": "tiny",
                        }
                    ]
                }
            })))
            .expect(1)
            .mount(&server)
            .await;

        let client = PrimarySearchClient::new("test-key".into(), Duration::from_secs(5))
            .expect("client")
            .with_endpoint(format!("{}/v2/search", server.uri()));

        let resp = client.attempt(&request("apex")).await.expect("search");
        assert_eq!(resp.hits.len(), 2);
        assert_eq!(resp.hits[0].position, 1);
        assert_eq!(resp.hits[0].query_purpose, "core_strategy");
        // Only the long markdown survives the boilerplate filter.
        assert_eq!(resp.inline_content.len(), 1);
        assert!(resp.inline_content.contains_key("https://apex.example/credit"));
    }

    #[tokio::test]
    async fn primary_payment_failure_is_an_outage() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(402))
            .mount(&server)
            .await;

        let client = PrimarySearchClient::new("k".into(), Duration::from_secs(5))
            .expect("client")
            .with_endpoint(server.uri());

        let err = client.attempt(&request("apex")).await.unwrap_err();
        assert!(matches!(err, ProviderFailure::Outage(_)));
    }

    #[tokio::test]
    async fn primary_unsuccessful_body_is_qualifying() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "success": false,
                "warning": "quota exceeded"
            })))
            .mount(&server)
            .await;

        let client = PrimarySearchClient::new("k".into(), Duration::from_secs(5))
            .expect("client")
            .with_endpoint(server.uri());

        match client.attempt(&request("apex")).await.unwrap_err() {
            ProviderFailure::Qualifying(msg) => assert!(msg.contains("quota")),
            other => panic!("unexpected: {other:?}"),
        }
    }

    #[tokio::test]
    async fn free_parses_html_and_unwraps_redirects() {
        let server = MockServer::start().await;
        let html = r##"<html><body>
            <div class="result">
                <a class="result__a" href="//duckduckgo.com/l/?uddg=https%3A%2F%2Fapex.example%2Fteam">Apex Team</a>
                <a class="result__snippet">Meet the Apex private credit team</a>
            </div>
            <div class="result">
                <a class="result__a" href="https://news.example/apex-fund">Apex Fund II</a>
                <a class="result__snippet">Fund closing announcement</a>
            </div>
        </body></html>"##;
        Mock::given(method("GET"))
            .and(path("/"))
            .and(query_param("q", "apex team"))
            .respond_with(ResponseTemplate::new(200).set_body_string(html))
            .mount(&server)
            .await;

        let client = FreeSearchClient::new(Duration::from_millis(0), Duration::from_secs(5))
            .expect("client")
            .with_endpoint(format!("{}/", server.uri()));

        let resp = client.attempt(&request("apex team")).await.expect("search");
        assert_eq!(resp.hits.len(), 2);
        assert_eq!(resp.hits[0].url, "https://apex.example/team");
        assert_eq!(resp.hits[1].url, "https://news.example/apex-fund");
        assert!(resp.inline_content.is_empty());
    }

    #[tokio::test]
    async fn free_gives_up_after_retries_on_429() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(429))
            .expect(3)
            .mount(&server)
            .await;

        let client = FreeSearchClient::new(Duration::from_millis(1), Duration::from_secs(5))
            .expect("client")
            .with_endpoint(format!("{}/", server.uri()));

        match client.attempt(&request("apex")).await.unwrap_err() {
            ProviderFailure::Qualifying(msg) => assert!(msg.contains("rate limited")),
            other => panic!("unexpected: {other:?}"),
        }
    }
}
