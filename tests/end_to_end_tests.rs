/// End-to-end integration tests
/// Tests the complete workflow from configuration to resolved streams

use rust_anime_scraper::config::Config;
use rust_anime_scraper::helpers::encode_base64;
use rust_anime_scraper::metrics::MetricsTracker;
use rust_anime_scraper::models::{EpisodeRef, MirrorCandidate};
use rust_anime_scraper::preferences::{InMemoryPreferences, PreferenceStore};
use rust_anime_scraper::sources::einfach::Einfach;
use rust_anime_scraper::{SourceContext, SourceError, SourceRegistry};
use std::sync::Arc;
use std::time::Duration;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

const CONFIG: &str = r#"
[http]
timeout_secs = 5
max_retries = 0

[preferences.latanime]
preferred_quality = "720"
"#;

fn iframe(src: &str) -> String {
    encode_base64(&format!(r#"<iframe src="{}" allowfullscreen></iframe>"#, src))
}

#[tokio::test]
async fn test_complete_workflow_with_real_extractors() {
    let server = MockServer::start().await;
    let uri = server.uri();

    let episode_page = format!(
        r#"<div class="lserv"><ul>
            <li><a data-em="{}">Voe</a></li>
            <li><a data-em="{}">Mixdrop</a></li>
            <li><a data-em="{}">Hydrax</a></li>
        </ul></div>"#,
        iframe(&format!("{}/e/voe1", uri)),
        iframe(&format!("{}/e/mix1", uri)),
        iframe("https://hydrax.example/e/3"),
    );
    Mock::given(method("GET"))
        .and(path("/episode/show-1/"))
        .respond_with(ResponseTemplate::new(200).set_body_string(episode_page))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/e/voe1"))
        .respond_with(ResponseTemplate::new(200).set_body_string(format!(
            "<script>var sources = {{'hls': '{}/hls/master.m3u8', 'video_height': 1080}};</script>",
            uri
        )))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/hls/master.m3u8"))
        .respond_with(ResponseTemplate::new(200).set_body_string(
            "#EXTM3U\n\
             #EXT-X-STREAM-INF:BANDWIDTH=1200000,RESOLUTION=1280x720\n\
             720/index.m3u8\n\
             #EXT-X-STREAM-INF:BANDWIDTH=2500000,RESOLUTION=1920x1080\n\
             1080/index.m3u8\n",
        ))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/e/mix1"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    // 1. Configuration
    let config = Config::from_toml_str(CONFIG).expect("config should parse");
    let client = config.http.create_http_client().expect("Failed to create client");
    let store = Arc::new(InMemoryPreferences::new());
    config.seed_preferences(store.as_ref());

    // 2. Registry
    let ctx = SourceContext::new(client, store);
    let mut registry = SourceRegistry::empty();
    registry.register(Arc::new(Einfach::with_base_url(&ctx, &uri)));

    // 3. Resolution
    let episode = EpisodeRef {
        number: 1.0,
        name: "S1 EP 1 - Pilot".to_string(),
        url: "/episode/show-1/".to_string(),
        date_upload: None,
    };
    let videos = registry
        .get("einfach")
        .expect("einfach registered")
        .fetch_videos(&episode)
        .await
        .expect("video fetch failed");

    let qualities: Vec<&str> = videos.iter().map(|v| v.quality.as_str()).collect();
    assert_eq!(qualities, vec!["Voe: 720p", "Voe: 1080p"]);
    assert_eq!(videos[1].url, format!("{}/hls/1080/index.m3u8", uri));

    // 4. Metrics
    let voe = ctx.metrics.get_metrics("Voe").expect("voe tracked");
    assert_eq!(voe.successful_resolutions, 1);
    assert_eq!(voe.streams_resolved, 2);
    let mixdrop = ctx.metrics.get_metrics("MixDrop").expect("mixdrop tracked");
    assert_eq!(mixdrop.failed_resolutions, 1);
    assert_eq!(ctx.metrics.get_all_metrics().len(), 2);

    println!("✓ Resolved {} stream(s)", videos.len());
}

#[tokio::test]
async fn test_mirror_resolution_never_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/e/busy"))
        .respond_with(ResponseTemplate::new(503))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/listing"))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let config = Config::from_toml_str(
        r#"
        [http]
        max_retries = 2
        initial_retry_delay_ms = 10
        max_retry_delay_ms = 20
        "#,
    )
    .expect("config should parse");
    let ctx = SourceContext::new(
        config.http.create_http_client().expect("Failed to create client"),
        Arc::new(InMemoryPreferences::new()),
    );

    // Sources keep the configured retries
    assert!(ctx
        .client
        .get_text(&format!("{}/listing", server.uri()))
        .await
        .is_err());

    let dispatcher = ctx.dispatcher();
    let videos = dispatcher
        .resolve_all(vec![MirrorCandidate::new(
            "Voe",
            format!("{}/e/busy", server.uri()),
        )])
        .await;
    assert!(videos.is_empty());

    let voe = ctx.metrics.get_metrics("Voe").expect("voe tracked");
    assert_eq!(voe.failed_resolutions, 1);
}

#[tokio::test]
async fn test_config_seeds_source_preferences() {
    let config = Config::from_toml_str(CONFIG).expect("config should parse");
    let store = Arc::new(InMemoryPreferences::new());
    config.seed_preferences(store.as_ref());

    let ctx = SourceContext::new(
        config.http.create_http_client().expect("Failed to create client"),
        store.clone(),
    );
    assert_eq!(
        ctx.preferences("latanime").get("preferred_quality").as_deref(),
        Some("720")
    );
    assert_eq!(store.get("source_zoro/preferred_quality"), None);
}

#[tokio::test]
async fn test_unknown_source_is_reported() {
    let config = Config::default();
    let ctx = SourceContext::new(
        config.http.create_http_client().expect("Failed to create client"),
        Arc::new(InMemoryPreferences::new()),
    );
    let registry = SourceRegistry::new(&ctx);
    assert!(matches!(
        registry.get("crunchyroll"),
        Err(SourceError::UnknownSource(_))
    ));
}

#[tokio::test]
async fn test_metrics_aggregation() {
    let metrics = MetricsTracker::new();

    for i in 0..5 {
        if i % 2 == 0 {
            metrics.record_success("Voe", Duration::from_millis(100 + i * 10), 2);
        } else {
            metrics.record_failure("Voe", format!("Test error {}", i));
        }
    }

    let voe = metrics.get_metrics("Voe").unwrap();
    assert_eq!(voe.total_resolutions, 5, "Should have 5 resolutions");
    assert_eq!(voe.successful_resolutions, 3, "Should have 3 successes");
    assert_eq!(voe.failed_resolutions, 2, "Should have 2 failures");
    assert_eq!(voe.success_rate(), 60.0, "Success rate should be 60%");
    assert_eq!(voe.streams_resolved, 6);

    println!("✓ Metrics aggregation working");
    println!("  Success rate: {:.1}%", voe.success_rate());
}

#[tokio::test]
async fn test_timeout_failures_are_counted() {
    let metrics = MetricsTracker::new();
    metrics.record_failure("Okru", "operation timed out".to_string());
    metrics.record_failure("Okru", "Request timeout after 30s".to_string());
    metrics.record_failure("Okru", "Parse error: no data-options".to_string());

    let okru = metrics.get_metrics("Okru").unwrap();
    assert_eq!(okru.timeout_count, 2);
    assert_eq!(okru.last_error.as_deref(), Some("Parse error: no data-options"));
}
