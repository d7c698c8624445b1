//! Direct HTTP fetching with browser-profile headers and retry.

use std::time::Duration;

use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, StatusCode};
use tracing::debug;

use prospector_shared::{ProspectorError, Result};

/// Realistic user agents, rotated across retry attempts to reduce
/// block-rate.
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:126.0) Gecko/20100101 Firefox/126.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.5 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/125.0.0.0 Safari/537.36",
];

/// Build a shared fetch client. Headers vary per attempt, so only the
/// transport settings live here.
pub fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .timeout(timeout)
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .map_err(|e| ProspectorError::Network(format!("failed to build HTTP client: {e}")))
}

/// Full browser-profile header set for one attempt.
pub fn browser_headers(attempt: u32) -> HeaderMap {
    let ua = USER_AGENTS[attempt as usize % USER_AGENTS.len()];
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_static(ua));
    headers.insert(
        "Accept",
        HeaderValue::from_static(
            "text/html,application/xhtml+xml,application/xml;q=0.9,image/webp,*/*;q=0.8",
        ),
    );
    headers.insert("Accept-Language", HeaderValue::from_static("en-US,en;q=0.9"));
    headers.insert("Cache-Control", HeaderValue::from_static("no-cache"));
    headers.insert("Pragma", HeaderValue::from_static("no-cache"));
    headers.insert("Sec-Fetch-Dest", HeaderValue::from_static("document"));
    headers.insert("Sec-Fetch-Mode", HeaderValue::from_static("navigate"));
    headers.insert("Sec-Fetch-Site", HeaderValue::from_static("none"));
    headers.insert("Sec-Fetch-User", HeaderValue::from_static("?1"));
    headers.insert(
        "Upgrade-Insecure-Requests",
        HeaderValue::from_static("1"),
    );
    headers
}

/// Fetch a URL, retrying transient failures (429, 503, timeouts) with
/// linear backoff and a fresh header profile each attempt. Returns the
/// body text, or the last error message.
pub async fn fetch_url(
    client: &Client,
    url: &str,
    max_attempts: u32,
) -> std::result::Result<String, String> {
    let max_attempts = max_attempts.max(1);
    let mut last_error = String::from("no attempts made");

    for attempt in 0..max_attempts {
        if attempt > 0 {
            tokio::time::sleep(Duration::from_secs(2 * attempt as u64)).await;
        }

        let response = match client
            .get(url)
            .headers(browser_headers(attempt))
            .send()
            .await
        {
            Ok(resp) => resp,
            Err(e) if e.is_timeout() => {
                last_error = "timeout".into();
                continue;
            }
            Err(e) if e.is_redirect() => return Err("too many redirects".into()),
            Err(e) => {
                last_error = e.to_string();
                continue;
            }
        };

        let status = response.status();
        if matches!(
            status,
            StatusCode::TOO_MANY_REQUESTS | StatusCode::SERVICE_UNAVAILABLE
        ) && attempt + 1 < max_attempts
        {
            debug!(%url, %status, attempt, "transient status, retrying");
            last_error = format!("HTTP {status} (retrying)");
            continue;
        }
        if status.as_u16() >= 400 {
            return Err(format!("HTTP {status}"));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        let is_text = content_type.contains("text/html")
            || content_type.contains("text/plain")
            || content_type.contains("application/json");
        if !content_type.is_empty() && !is_text {
            return Err(format!("non-text content: {content_type}"));
        }

        return response
            .text()
            .await
            .map_err(|e| format!("body read failed: {e}"));
    }

    Err(last_error)
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::method;
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn headers_rotate_user_agent_by_attempt() {
        let first = browser_headers(0);
        let second = browser_headers(1);
        let wrapped = browser_headers(USER_AGENTS.len() as u32);
        assert_ne!(first.get(USER_AGENT), second.get(USER_AGENT));
        assert_eq!(first.get(USER_AGENT), wrapped.get(USER_AGENT));
        assert!(first.contains_key("Sec-Fetch-Mode"));
    }

    #[tokio::test]
    async fn retries_transient_status_then_succeeds() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .insert_header("content-type", "text/html")
                    .set_body_string("<html><body>ok</body></html>"),
            )
            .mount(&server)
            .await;

        let client = build_client(Duration::from_secs(5)).expect("client");
        let body = fetch_url(&client, &server.uri(), 3).await.expect("fetch");
        assert!(body.contains("ok"));
    }

    #[tokio::test]
    async fn hard_status_fails_without_retry() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let client = build_client(Duration::from_secs(5)).expect("client");
        let err = fetch_url(&client, &server.uri(), 3).await.unwrap_err();
        assert_eq!(err, "HTTP 404 Not Found");
    }

    #[tokio::test]
    async fn rejects_binary_content_types() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw("%PDF".as_bytes().to_vec(), "application/pdf"),
            )
            .mount(&server)
            .await;

        let client = build_client(Duration::from_secs(5)).expect("client");
        let err = fetch_url(&client, &server.uri(), 1).await.unwrap_err();
        assert!(err.contains("non-text content"));
    }
}
