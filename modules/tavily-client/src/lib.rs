pub mod error;
pub mod types;

pub use error::{Result, TavilyError};
pub use types::{SearchRequest, SearchResponse, SearchResult};

use std::time::Duration;

const BASE_URL: &str = "https://api.tavily.com";

pub struct TavilyClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl TavilyClient {
    pub fn new(api_key: impl Into<String>) -> Result<Self> {
        Self::with_timeout(api_key, Duration::from_secs(30))
    }

    pub fn with_timeout(api_key: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key: api_key.into(),
            base_url: BASE_URL.to_string(),
        })
    }

    /// Point the client at a different host (self-hosted proxy, test server).
    pub fn with_base_url(mut self, base_url: &str) -> Self {
        self.base_url = base_url.trim_end_matches('/').to_string();
        self
    }

    /// Run a web search. Results come back in Tavily's relevance order.
    pub async fn search(&self, request: &SearchRequest) -> Result<SearchResponse> {
        tracing::info!(
            query = %request.query,
            max_results = request.max_results,
            domains = request.include_domains.len(),
            "Tavily search"
        );

        let url = format!("{}/search", self.base_url);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(&self.api_key)
            .json(request)
            .send()
            .await?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(TavilyError::Api {
                status: status.as_u16(),
                message: body,
            });
        }

        let body = resp.text().await?;
        let response: SearchResponse = serde_json::from_str(&body)?;
        tracing::info!(
            query = %request.query,
            count = response.results.len(),
            "Tavily search complete"
        );
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    #[test]
    fn request_omits_empty_domain_filter() {
        let request = SearchRequest::new("Acme Corp");
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"query": "Acme Corp", "max_results": 5})
        );
    }

    #[test]
    fn request_builder_sets_domains() {
        let request = SearchRequest::new("Acme Corp")
            .max_results(3)
            .include_domains(["linkedin.com", "crunchbase.com"]);
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["include_domains"][1], "crunchbase.com");
        assert_eq!(json["max_results"], 3);
    }

    #[tokio::test]
    async fn search_parses_results_in_order() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .and(header("authorization", "Bearer tvly-test"))
            .and(body_partial_json(serde_json::json!({
                "query": "Acme Corp",
                "include_domains": ["linkedin.com"]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "query": "Acme Corp",
                "results": [
                    {"url": "https://www.linkedin.com/company/acme", "title": "Acme | LinkedIn", "content": "Acme makes anvils", "score": 0.91},
                    {"url": "https://www.linkedin.com/company/acme-labs", "title": "Acme Labs", "content": "", "score": 0.42}
                ],
                "response_time": 1.2
            })))
            .mount(&server)
            .await;

        let client = TavilyClient::new("tvly-test").unwrap().with_base_url(&server.uri());
        let response = client
            .search(&SearchRequest::new("Acme Corp").include_domains(["linkedin.com"]))
            .await
            .unwrap();

        let urls: Vec<_> = response.results.iter().map(|r| r.url.as_str()).collect();
        assert_eq!(
            urls,
            vec![
                "https://www.linkedin.com/company/acme",
                "https://www.linkedin.com/company/acme-labs"
            ]
        );
    }

    #[tokio::test]
    async fn search_maps_api_errors() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(401).set_body_string("invalid api key"))
            .mount(&server)
            .await;

        let client = TavilyClient::new("bad").unwrap().with_base_url(&server.uri());
        let err = client
            .search(&SearchRequest::new("Acme Corp"))
            .await
            .unwrap_err();

        match err {
            TavilyError::Api { status, message } => {
                assert_eq!(status, 401);
                assert_eq!(message, "invalid api key");
            }
            other => panic!("expected Api error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn search_reports_timeouts() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/search"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!({"results": []}))
                    .set_delay(Duration::from_millis(500)),
            )
            .mount(&server)
            .await;

        let client = TavilyClient::with_timeout("tvly-test", Duration::from_millis(50))
            .unwrap()
            .with_base_url(&server.uri());
        let err = client
            .search(&SearchRequest::new("Acme Corp"))
            .await
            .unwrap_err();
        assert!(matches!(err, TavilyError::Timeout(_)), "got {err:?}");
    }
}
