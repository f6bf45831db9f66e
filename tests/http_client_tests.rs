use rust_anime_scraper::http_client::{referer_headers, EnhancedHttpClient, HttpClientConfig};
use rust_anime_scraper::SourceError;
use std::time::Duration;
use wiremock::matchers::{body_string_contains, header, header_exists, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn retrying_client(max_retries: usize) -> EnhancedHttpClient {
    let config = HttpClientConfig {
        timeout: Duration::from_secs(5),
        max_retries,
        initial_retry_delay_ms: 10,
        max_retry_delay_ms: 50,
        enable_cookies: true,
        enable_gzip: true,
    };
    EnhancedHttpClient::with_config(config).expect("Failed to create client")
}

#[tokio::test]
async fn test_http_client_creation() {
    let client = EnhancedHttpClient::new();
    assert!(client.is_ok(), "Failed to create HTTP client");
}

#[tokio::test]
async fn test_no_retries_by_default() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/busy"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;

    let client = EnhancedHttpClient::new().expect("Failed to create client");
    let result = client.get_text(&format!("{}/busy", server.uri())).await;
    assert!(matches!(result, Err(SourceError::Http(_))));
}

#[tokio::test]
async fn test_retry_on_rate_limit_when_configured() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/limited"))
        .respond_with(ResponseTemplate::new(429))
        .expect(3)
        .mount(&server)
        .await;

    let client = retrying_client(2);
    let response = client
        .get_with_retry(&format!("{}/limited", server.uri()))
        .await
        .expect("request failed");

    // The last retryable response is handed back once attempts run out
    assert_eq!(response.status().as_u16(), 429);
}

#[tokio::test]
async fn test_headers_included() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/embed"))
        .and(header("Referer", "https://site.example/"))
        .and(header_exists("Accept-Language"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let client = EnhancedHttpClient::new().expect("Failed to create client");
    let body = client
        .get_text_with_headers(
            &format!("{}/embed", server.uri()),
            &referer_headers("https://site.example/"),
        )
        .await
        .expect("request failed");
    assert_eq!(body, "ok");
}

#[tokio::test]
async fn test_redirects_report_final_url() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/go"))
        .respond_with(
            ResponseTemplate::new(302).insert_header("Location", format!("{}/player", server.uri())),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/player"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<video></video>"))
        .mount(&server)
        .await;

    let client = EnhancedHttpClient::new().expect("Failed to create client");
    let (final_url, body) = client
        .get_following_redirects(&format!("{}/go", server.uri()), &referer_headers("https://a/"))
        .await
        .expect("request failed");
    assert_eq!(final_url, format!("{}/player", server.uri()));
    assert_eq!(body, "<video></video>");
}

#[tokio::test]
async fn test_post_form() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/ajax"))
        .and(body_string_contains("action=player"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{\"ok\":true}"))
        .expect(1)
        .mount(&server)
        .await;

    let client = EnhancedHttpClient::new().expect("Failed to create client");
    let body = client
        .post_form_text(
            &format!("{}/ajax", server.uri()),
            &[("action", "player"), ("nume", "1")],
            &referer_headers("https://site.example/"),
        )
        .await
        .expect("request failed");
    assert!(body.contains("ok"));
}

#[tokio::test]
async fn test_bad_json_is_a_json_error() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>not json</html>"))
        .mount(&server)
        .await;

    let client = EnhancedHttpClient::new().expect("Failed to create client");
    let result: Result<serde_json::Value, _> =
        client.get_json(&format!("{}/api", server.uri()), None).await;
    assert!(matches!(result, Err(SourceError::Json(_))));
}

#[tokio::test]
async fn test_timeout_configuration() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/slow"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_millis(500)))
        .mount(&server)
        .await;

    let config = HttpClientConfig {
        timeout: Duration::from_millis(50),
        ..HttpClientConfig::default()
    };
    let client = EnhancedHttpClient::with_config(config).expect("Failed to create client");

    let result = client.get_text(&format!("{}/slow", server.uri())).await;
    assert!(result.is_err(), "Should timeout on slow endpoint");
}
