//! The real reqwest transport and Tavily searcher against local wiremock
//! servers, including one full resolver run over HTTP.

use std::sync::Arc;
use std::time::Duration;

use profile_resolver::discovery::{discover, NoopSearcher, TavilySearcher};
use profile_resolver::testing::circle_png;
use profile_resolver::transport::{HttpTransport, ReqwestTransport, TransportError};
use profile_resolver::{CompanyQuery, Resolver, ResolverConfig};
use tavily_client::TavilyClient;
use wiremock::matchers::{body_partial_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn transport(config: &ResolverConfig) -> ReqwestTransport {
    ReqwestTransport::new(config).unwrap()
}

#[tokio::test]
async fn transport_returns_status_type_and_body() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/company"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_raw("<html>Acme</html>", "text/html; charset=utf-8"),
        )
        .mount(&server)
        .await;

    let resp = transport(&ResolverConfig::default())
        .get(&format!("{}/company", server.uri()))
        .await
        .unwrap();

    assert_eq!(resp.status, 200);
    assert_eq!(resp.content_type.as_deref(), Some("text/html; charset=utf-8"));
    assert_eq!(resp.text(), "<html>Acme</html>");
}

#[tokio::test]
async fn transport_passes_error_statuses_through() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(404))
        .mount(&server)
        .await;

    let resp = transport(&ResolverConfig::default())
        .get(&format!("{}/missing", server.uri()))
        .await
        .unwrap();

    assert_eq!(resp.status, 404);
    assert!(!resp.is_success());
}

#[tokio::test]
async fn transport_times_out_slow_servers() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .mount(&server)
        .await;
    let config = ResolverConfig {
        fetch_timeout_ms: 100,
        ..ResolverConfig::default()
    };

    let err = transport(&config).get(&server.uri()).await.unwrap_err();

    assert!(matches!(err, TransportError::Timeout), "got {err:?}");
    assert!(err.is_transient());
}

#[tokio::test]
async fn transport_rejects_oversized_bodies() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200).set_body_string("x".repeat(4096)))
        .mount(&server)
        .await;
    let config = ResolverConfig {
        max_content_bytes: 1024,
        ..ResolverConfig::default()
    };

    let err = transport(&config).get(&server.uri()).await.unwrap_err();

    assert!(matches!(err, TransportError::TooLarge(_)), "got {err:?}");
}

#[tokio::test]
async fn tavily_discovery_keeps_profile_results() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .and(body_partial_json(serde_json::json!({
            "query": "Acme",
            "include_domains": ["linkedin.com"],
            "max_results": 5
        })))
        .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
            "query": "Acme",
            "results": [
                { "url": "https://www.linkedin.com/company/acme", "title": "Acme | LinkedIn", "content": "", "score": 0.9 },
                { "url": "https://www.linkedin.com/in/jane-doe", "title": "Jane", "content": "", "score": 0.5 },
                { "url": "https://acme.com", "title": "Acme", "content": "", "score": 0.4 }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let client = TavilyClient::new("tvly-test").unwrap().with_base_url(&server.uri());
    let searcher = TavilySearcher::new(client);
    let urls = discover(
        &searcher,
        "Acme",
        &["linkedin.com".to_string()],
        5,
        Duration::from_secs(5),
    )
    .await;

    assert_eq!(
        urls,
        vec![
            "https://www.linkedin.com/company/acme",
            "https://www.linkedin.com/in/jane-doe",
        ],
        "known profile hosts are kept even on ambiguous paths"
    );
}

#[tokio::test]
async fn tavily_errors_degrade_to_no_candidates() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/search"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream down"))
        .mount(&server)
        .await;

    let client = TavilyClient::new("tvly-test").unwrap().with_base_url(&server.uri());
    let urls = discover(
        &TavilySearcher::new(client),
        "Acme",
        &[],
        5,
        Duration::from_secs(5),
    )
    .await;

    assert!(urls.is_empty());
}

#[tokio::test]
async fn full_run_over_http_matches_the_served_logo() {
    let server = MockServer::start().await;
    let logo = circle_png(64, 64);
    Mock::given(method("GET"))
        .and(path("/acme"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "text/html")
                .set_body_string(
                    r#"<html><body><header><a class="navbar-brand" href="/"><img src="/brand.png"></a></header>
                       <p>Acme builds widgets.</p></body></html>"#,
                ),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/brand.png"))
        .respond_with(
            ResponseTemplate::new(200)
                .insert_header("content-type", "image/png")
                .set_body_bytes(logo.clone()),
        )
        .mount(&server)
        .await;

    let config = ResolverConfig::default();
    let resolver = Resolver::new(
        config.clone(),
        Arc::new(NoopSearcher),
        Arc::new(transport(&config)),
    );
    let seed = format!("{}/acme", server.uri());
    let query = CompanyQuery::new("Acme").with_seed_url(seed.clone()).with_logo(logo);

    let outcome = resolver.resolve(&query).await;

    let selected = outcome.selected.unwrap();
    assert_eq!(selected.url, seed);
    assert_eq!(
        selected.logo_url.as_deref(),
        Some(format!("{}/brand.png", server.uri()).as_str())
    );
    assert!(selected.similarity_score.unwrap() >= 0.95);
}
