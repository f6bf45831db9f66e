use crate::error::Result;
use rand::Rng;
use reqwest::header::{HeaderMap, HeaderName, HeaderValue, USER_AGENT};
use reqwest::{Client, ClientBuilder, Response};
use serde::de::DeserializeOwned;
use std::time::Duration;
use tokio::time::sleep;

/// User agents to rotate through to avoid bot detection
const USER_AGENTS: &[&str] = &[
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64; rv:121.0) Gecko/20100101 Firefox/121.0",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
    "Mozilla/5.0 (Macintosh; Intel Mac OS X 10_15_7) AppleWebKit/605.1.15 (KHTML, like Gecko) Version/17.2 Safari/605.1.15",
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36",
];

/// Configuration for the shared HTTP client
#[derive(Clone, Debug)]
pub struct HttpClientConfig {
    pub timeout: Duration,
    /// Extra attempts on retryable statuses and network errors. Zero disables retries.
    pub max_retries: usize,
    pub initial_retry_delay_ms: u64,
    pub max_retry_delay_ms: u64,
    pub enable_cookies: bool,
    pub enable_gzip: bool,
}

impl Default for HttpClientConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(30),
            max_retries: 0,
            initial_retry_delay_ms: 500,
            max_retry_delay_ms: 8000,
            enable_cookies: true,
            enable_gzip: true,
        }
    }
}

/// Shared outbound client handed to every source and extractor.
///
/// Cloning is cheap: the underlying reqwest client is reference counted and
/// owns the connection pool.
#[derive(Clone, Debug)]
pub struct EnhancedHttpClient {
    client: Client,
    config: HttpClientConfig,
}

impl EnhancedHttpClient {
    pub fn new() -> std::result::Result<Self, reqwest::Error> {
        Self::with_config(HttpClientConfig::default())
    }

    pub fn with_config(config: HttpClientConfig) -> std::result::Result<Self, reqwest::Error> {
        let mut headers = HeaderMap::new();
        headers.insert(
            "Accept",
            HeaderValue::from_static(
                "text/html,application/xhtml+xml,application/xml;q=0.9,image/avif,image/webp,*/*;q=0.8",
            ),
        );
        headers.insert("Accept-Language", HeaderValue::from_static("en-US,en;q=0.9"));
        headers.insert("DNT", HeaderValue::from_static("1"));
        headers.insert("Upgrade-Insecure-Requests", HeaderValue::from_static("1"));

        let client = ClientBuilder::new()
            .timeout(config.timeout)
            .user_agent(Self::random_user_agent())
            .cookie_store(config.enable_cookies)
            .gzip(config.enable_gzip)
            .brotli(config.enable_gzip)
            .tcp_keepalive(Some(Duration::from_secs(60)))
            .pool_idle_timeout(Some(Duration::from_secs(90)))
            .default_headers(headers)
            .build()?;

        Ok(Self { client, config })
    }

    /// Same connection pool and cookies, but every request is attempted once.
    pub fn without_retries(&self) -> Self {
        let mut config = self.config.clone();
        config.max_retries = 0;
        Self {
            client: self.client.clone(),
            config,
        }
    }

    pub fn max_retries(&self) -> usize {
        self.config.max_retries
    }

    fn random_user_agent() -> &'static str {
        let mut rng = rand::thread_rng();
        USER_AGENTS[rng.gen_range(0..USER_AGENTS.len())]
    }

    /// Exponential backoff with ±25% jitter
    fn calculate_retry_delay(&self, attempt: usize) -> Duration {
        let base_delay = self.config.initial_retry_delay_ms;
        let max_delay = self.config.max_retry_delay_ms;
        let delay_ms = base_delay
            .saturating_mul(2u64.saturating_pow(attempt as u32))
            .min(max_delay);

        let jitter = rand::thread_rng().gen_range(0.75..=1.25);
        Duration::from_millis((delay_ms as f64 * jitter) as u64)
    }

    fn is_retryable_status(status: reqwest::StatusCode) -> bool {
        matches!(
            status.as_u16(),
            429 | 500 | 502 | 503 | 504 | 520 | 521 | 522 | 523 | 524 | 525 | 526 | 527
        )
    }

    pub async fn get_with_retry(&self, url: &str) -> std::result::Result<Response, reqwest::Error> {
        self.get_with_retry_and_headers(url, None).await
    }

    pub async fn get_with_retry_and_headers(
        &self,
        url: &str,
        extra_headers: Option<&HeaderMap>,
    ) -> std::result::Result<Response, reqwest::Error> {
        let mut attempt = 0;

        loop {
            let mut request = self
                .client
                .get(url)
                .header(USER_AGENT, Self::random_user_agent());
            if let Some(headers) = extra_headers {
                request = request.headers(headers.clone());
            }

            match request.send().await {
                Ok(response) => {
                    let status = response.status();
                    if Self::is_retryable_status(status) && attempt < self.config.max_retries {
                        log::warn!(
                            "Received retryable status {} for {}, attempt {}/{}",
                            status,
                            url,
                            attempt + 1,
                            self.config.max_retries + 1
                        );
                        sleep(self.calculate_retry_delay(attempt)).await;
                        attempt += 1;
                        continue;
                    }
                    return Ok(response);
                }
                Err(e) => {
                    let should_retry = e.is_timeout() || e.is_connect() || e.is_request();
                    if should_retry && attempt < self.config.max_retries {
                        log::warn!(
                            "Request failed for {}, attempt {}/{}: {}",
                            url,
                            attempt + 1,
                            self.config.max_retries + 1,
                            e
                        );
                        sleep(self.calculate_retry_delay(attempt)).await;
                        attempt += 1;
                        continue;
                    }
                    return Err(e);
                }
            }
        }
    }

    /// Fetch a URL and return the body; non-success statuses are errors.
    pub async fn get_text(&self, url: &str) -> Result<String> {
        let response = self.get_with_retry(url).await?.error_for_status()?;
        Ok(response.text().await?)
    }

    pub async fn get_text_with_headers(&self, url: &str, headers: &HeaderMap) -> Result<String> {
        let response = self
            .get_with_retry_and_headers(url, Some(headers))
            .await?
            .error_for_status()?;
        Ok(response.text().await?)
    }

    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        headers: Option<&HeaderMap>,
    ) -> Result<T> {
        let response = self
            .get_with_retry_and_headers(url, headers)
            .await?
            .error_for_status()?;
        let body = response.text().await?;
        Ok(serde_json::from_str(&body)?)
    }

    /// Fetch a URL and return the final URL after redirects along with the body.
    pub async fn get_following_redirects(
        &self,
        url: &str,
        headers: &HeaderMap,
    ) -> Result<(String, String)> {
        let response = self
            .get_with_retry_and_headers(url, Some(headers))
            .await?
            .error_for_status()?;
        let final_url = response.url().to_string();
        Ok((final_url, response.text().await?))
    }

    pub async fn post_form_text(
        &self,
        url: &str,
        form: &[(&str, &str)],
        headers: &HeaderMap,
    ) -> Result<String> {
        let response = self
            .client
            .post(url)
            .header(USER_AGENT, Self::random_user_agent())
            .headers(headers.clone())
            .form(form)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.text().await?)
    }

    pub async fn post_json_text(
        &self,
        url: &str,
        body: &serde_json::Value,
        headers: &HeaderMap,
    ) -> Result<String> {
        let response = self
            .client
            .post(url)
            .header(USER_AGENT, Self::random_user_agent())
            .headers(headers.clone())
            .json(body)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.text().await?)
    }

    pub fn client(&self) -> &Client {
        &self.client
    }
}

/// Build a header map from name/value pairs, skipping anything that is not a
/// valid header.
pub fn header_map(pairs: &[(&str, &str)]) -> HeaderMap {
    let mut headers = HeaderMap::new();
    for (name, value) in pairs {
        match (
            HeaderName::from_bytes(name.as_bytes()),
            HeaderValue::from_str(value),
        ) {
            (Ok(name), Ok(value)) => {
                headers.insert(name, value);
            }
            _ => log::debug!("Skipping invalid header {}: {}", name, value),
        }
    }
    headers
}

/// Referer-only header map, the most common hint hosters need.
pub fn referer_headers(referer: &str) -> HeaderMap {
    header_map(&[("Referer", referer)])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_client_creation() {
        assert!(EnhancedHttpClient::new().is_ok());
    }

    #[test]
    fn test_random_user_agent() {
        let ua = EnhancedHttpClient::random_user_agent();
        assert!(USER_AGENTS.contains(&ua));
    }

    #[tokio::test]
    async fn test_retry_delay_calculation() {
        let client = EnhancedHttpClient::with_config(HttpClientConfig::default()).unwrap();

        let delay0 = client.calculate_retry_delay(0);
        let delay3 = client.calculate_retry_delay(3);

        assert!(delay0.as_millis() >= 375 && delay0.as_millis() <= 625);
        assert!(delay3 > delay0);
        assert!(client.calculate_retry_delay(20).as_millis() <= 10_000);
    }

    #[test]
    fn test_retryable_status() {
        assert!(EnhancedHttpClient::is_retryable_status(reqwest::StatusCode::TOO_MANY_REQUESTS));
        assert!(EnhancedHttpClient::is_retryable_status(reqwest::StatusCode::BAD_GATEWAY));
        assert!(!EnhancedHttpClient::is_retryable_status(reqwest::StatusCode::NOT_FOUND));
        assert!(!EnhancedHttpClient::is_retryable_status(reqwest::StatusCode::FORBIDDEN));
    }

    #[test]
    fn test_without_retries_keeps_other_settings() {
        let config = HttpClientConfig {
            max_retries: 3,
            initial_retry_delay_ms: 10,
            ..HttpClientConfig::default()
        };
        let client = EnhancedHttpClient::with_config(config).unwrap();
        let single = client.without_retries();

        assert_eq!(client.max_retries(), 3);
        assert_eq!(single.max_retries(), 0);
        assert_eq!(single.config.initial_retry_delay_ms, 10);
    }

    #[test]
    fn test_header_map_skips_invalid() {
        let headers = header_map(&[("Referer", "https://example.com/"), ("Bad Name", "x")]);
        assert_eq!(headers.len(), 1);
        assert_eq!(headers["Referer"], "https://example.com/");
    }
}
