use crate::config::HttpConfig;
use crate::error::ScrapeError;
use crate::utils::pacing::Pacer;
use crate::utils::retry::{retry_with, RetryPolicy};
use reqwest::StatusCode;
use tracing::debug;

const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 \
     (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

/// Shared HTTP access for the site adapters: timeout, retry and pacing
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
    retry: RetryPolicy,
    pacer: Pacer,
}

impl HttpFetcher {
    pub fn new(config: &HttpConfig) -> Result<Self, ScrapeError> {
        let client = reqwest::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()
            .map_err(ScrapeError::Client)?;

        Ok(Self {
            client,
            retry: RetryPolicy::with_retries(config.max_retries),
            pacer: Pacer::new(config.min_delay, config.max_delay),
        })
    }

    pub fn with_retry_policy(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    /// GET a page as text, retrying transport errors and 5xx responses
    pub async fn get_text(&self, url: &str) -> Result<String, ScrapeError> {
        retry_with(
            &self.retry,
            &format!("GET {}", url),
            ScrapeError::is_transient,
            || self.get_once(url),
        )
        .await
    }

    /// Sleep for a random delay before hitting the site again
    pub async fn pause(&self) {
        self.pacer.pause().await;
    }

    async fn get_once(&self, url: &str) -> Result<String, ScrapeError> {
        debug!("GET {}", url);
        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|source| ScrapeError::Http {
                url: url.to_string(),
                source,
            })?;

        let status = response.status();
        if status == StatusCode::FORBIDDEN {
            return Err(ScrapeError::Blocked {
                url: url.to_string(),
            });
        }
        if !status.is_success() {
            return Err(ScrapeError::Status {
                url: url.to_string(),
                status,
            });
        }

        response.text().await.map_err(|source| ScrapeError::Http {
            url: url.to_string(),
            source,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn fetcher() -> HttpFetcher {
        HttpFetcher::new(&HttpConfig::immediate())
            .unwrap()
            .with_retry_policy(RetryPolicy {
                max_retries: 2,
                initial_delay: Duration::from_millis(1),
                max_delay: Duration::from_millis(2),
                multiplier: 2.0,
            })
    }

    #[tokio::test]
    async fn test_get_text_ok() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/card"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>ok</html>"))
            .mount(&server)
            .await;

        let body = fetcher()
            .get_text(&format!("{}/card", server.uri()))
            .await
            .unwrap();
        assert_eq!(body, "<html>ok</html>");
    }

    #[tokio::test]
    async fn test_forbidden_is_blocked_and_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/horse"))
            .respond_with(ResponseTemplate::new(403))
            .expect(1)
            .mount(&server)
            .await;

        let err = fetcher()
            .get_text(&format!("{}/horse", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, ScrapeError::Blocked { .. }));
    }

    #[tokio::test]
    async fn test_server_errors_are_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/flaky"))
            .respond_with(ResponseTemplate::new(503))
            .expect(3)
            .mount(&server)
            .await;

        let err = fetcher()
            .get_text(&format!("{}/flaky", server.uri()))
            .await
            .unwrap_err();
        assert!(matches!(err, ScrapeError::Status { status, .. } if status.as_u16() == 503));
    }

    #[tokio::test]
    async fn test_not_found_is_not_retried() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let err = fetcher()
            .get_text(&format!("{}/missing", server.uri()))
            .await
            .unwrap_err();
        assert!(!err.is_transient());
    }
}
