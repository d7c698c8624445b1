//! Content acquisition providers: direct fetch with local extraction,
//! and a hosted reader service as fallback.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use prospector_shared::{Provider, ProviderFailure, Result};

use crate::extract::extract_text;
use crate::fetch::{build_client, fetch_url};

/// Default reader endpoint. The target URL is appended verbatim.
pub const READER_URL: &str = "https://r.jina.ai/";

/// Extractions below this length are treated as failures so the chain
/// can try the next provider.
const MIN_EXTRACTED_CHARS: usize = 50;

/// Reader responses must clear this bar to count as real content.
const MIN_READER_CHARS: usize = 100;

#[derive(Debug, Clone)]
pub struct ScrapeRequest {
    pub url: String,
}

#[derive(Debug, Clone)]
pub struct ScrapeResponse {
    pub content: String,
}

// ------- direct fetch -------

/// Fetches the page itself and extracts text locally.
pub struct DirectFetchProvider {
    client: Client,
    max_attempts: u32,
}

impl DirectFetchProvider {
    pub fn new(timeout: Duration, max_attempts: u32) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            max_attempts,
        })
    }
}

#[async_trait]
impl Provider<ScrapeRequest, ScrapeResponse> for DirectFetchProvider {
    fn name(&self) -> &'static str {
        "direct"
    }

    async fn attempt(
        &self,
        request: &ScrapeRequest,
    ) -> std::result::Result<ScrapeResponse, ProviderFailure> {
        let html = fetch_url(&self.client, &request.url, self.max_attempts)
            .await
            .map_err(ProviderFailure::Qualifying)?;

        let content = extract_text(&html);
        if content.len() < MIN_EXTRACTED_CHARS {
            return Err(ProviderFailure::Qualifying(
                "no extractable content".into(),
            ));
        }
        debug!(url = %request.url, chars = content.len(), "direct extraction succeeded");
        Ok(ScrapeResponse { content })
    }
}

// ------- reader service -------

/// Proxies through a hosted reader that renders the page and returns
/// plain text. Used when direct extraction fails.
pub struct ReaderProvider {
    client: Client,
    endpoint: String,
}

impl ReaderProvider {
    pub fn new(timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            endpoint: READER_URL.to_string(),
        })
    }

    pub fn with_endpoint(endpoint: impl Into<String>, timeout: Duration) -> Result<Self> {
        Ok(Self {
            client: build_client(timeout)?,
            endpoint: endpoint.into(),
        })
    }
}

#[async_trait]
impl Provider<ScrapeRequest, ScrapeResponse> for ReaderProvider {
    fn name(&self) -> &'static str {
        "reader"
    }

    async fn attempt(
        &self,
        request: &ScrapeRequest,
    ) -> std::result::Result<ScrapeResponse, ProviderFailure> {
        let target = format!("{}{}", self.endpoint, request.url);
        let response = self
            .client
            .get(&target)
            .header("Accept", "text/plain")
            .header("X-Return-Format", "text")
            .send()
            .await
            .map_err(|e| ProviderFailure::Qualifying(format!("reader request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(ProviderFailure::Qualifying(format!(
                "reader returned HTTP {status}"
            )));
        }

        let content = response
            .text()
            .await
            .map_err(|e| ProviderFailure::Qualifying(format!("reader body read failed: {e}")))?;
        if content.len() <= MIN_READER_CHARS {
            return Err(ProviderFailure::Qualifying(
                "reader returned too little content".into(),
            ));
        }
        Ok(ScrapeResponse { content })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[tokio::test]
    async fn direct_provider_extracts_page_text() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string(
                        "<html><body><main><p>Summit Credit provides senior secured \
                         loans to sponsor-backed middle market companies.</p></main></body></html>",
                    ),
            )
            .mount(&server)
            .await;

        let provider = DirectFetchProvider::new(Duration::from_secs(5), 1).expect("provider");
        let resp = provider
            .attempt(&ScrapeRequest { url: server.uri() })
            .await
            .expect("content");
        assert!(resp.content.contains("senior secured"));
    }

    #[tokio::test]
    async fn direct_provider_qualifies_on_empty_page() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string("<html><body></body></html>"),
            )
            .mount(&server)
            .await;

        let provider = DirectFetchProvider::new(Duration::from_secs(5), 1).expect("provider");
        let err = provider
            .attempt(&ScrapeRequest { url: server.uri() })
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderFailure::Qualifying(_)));
    }

    #[tokio::test]
    async fn reader_provider_requires_plain_text_headers() {
        let server = MockServer::start().await;
        let body = "Summit Credit Partners is a direct lender. ".repeat(5);
        Mock::given(method("GET"))
            .and(header("Accept", "text/plain"))
            .and(header("X-Return-Format", "text"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body.clone()))
            .expect(1)
            .mount(&server)
            .await;

        let provider =
            ReaderProvider::with_endpoint(format!("{}/", server.uri()), Duration::from_secs(5))
                .expect("provider");
        let resp = provider
            .attempt(&ScrapeRequest {
                url: "https://example.com/about".into(),
            })
            .await
            .expect("content");
        assert_eq!(resp.content, body);
    }

    #[tokio::test]
    async fn reader_provider_rejects_thin_responses() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("short"))
            .mount(&server)
            .await;

        let provider =
            ReaderProvider::with_endpoint(format!("{}/", server.uri()), Duration::from_secs(5))
                .expect("provider");
        let err = provider
            .attempt(&ScrapeRequest {
                url: "https://example.com".into(),
            })
            .await
            .unwrap_err();
        assert!(matches!(err, ProviderFailure::Qualifying(_)));
    }
}
