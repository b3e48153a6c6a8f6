// Candidate discovery through a web-search backend.

use std::collections::HashSet;
use std::time::Duration;

use anyhow::Result;
use async_trait::async_trait;
use tavily_client::{SearchRequest, TavilyClient};
use tracing::{info, warn};

use crate::classify::{classify, normalize_url};
use crate::error::ResolverError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SearchQuery {
    pub query: String,
    /// Restrict results to these hosts (business-profile sites).
    pub include_domains: Vec<String>,
    pub max_results: u32,
}

#[async_trait]
pub trait WebSearcher: Send + Sync {
    /// Result URLs in the backend's relevance order.
    async fn search(&self, query: &SearchQuery) -> Result<Vec<String>>;
}

/// Searcher for when no search API key is configured. Always finds nothing.
pub struct NoopSearcher;

#[async_trait]
impl WebSearcher for NoopSearcher {
    async fn search(&self, _query: &SearchQuery) -> Result<Vec<String>> {
        Ok(Vec::new())
    }
}

pub struct TavilySearcher {
    client: TavilyClient,
}

impl TavilySearcher {
    pub fn new(client: TavilyClient) -> Self {
        Self { client }
    }
}

#[async_trait]
impl WebSearcher for TavilySearcher {
    async fn search(&self, query: &SearchQuery) -> Result<Vec<String>> {
        let request = SearchRequest::new(query.query.clone())
            .max_results(query.max_results)
            .include_domains(query.include_domains.iter().cloned());
        let response = self.client.search(&request).await?;
        Ok(response.results.into_iter().map(|r| r.url).collect())
    }
}

/// Search for profile pages of `company_name`. Fails with
/// `DiscoveryUnavailable` when the backend errors or exceeds `timeout`.
pub async fn try_discover(
    searcher: &dyn WebSearcher,
    company_name: &str,
    profile_domains: &[String],
    max_results: u32,
    timeout: Duration,
) -> crate::error::Result<Vec<String>> {
    let query = SearchQuery {
        query: company_name.trim().to_string(),
        include_domains: profile_domains.to_vec(),
        max_results,
    };
    info!(query = %query.query, domains = ?query.include_domains, "Discovering candidates");

    let raw = match tokio::time::timeout(timeout, searcher.search(&query)).await {
        Ok(Ok(urls)) => urls,
        Ok(Err(e)) => return Err(ResolverError::DiscoveryUnavailable(e.to_string())),
        Err(_) => {
            return Err(ResolverError::DiscoveryUnavailable(format!(
                "search timed out after {}ms",
                timeout.as_millis()
            )))
        }
    };

    let found = profile_urls(raw);
    info!(found = found.len(), "Discovery complete");
    Ok(found)
}

/// Like [`try_discover`], but an unavailable backend just means no candidates.
pub async fn discover(
    searcher: &dyn WebSearcher,
    company_name: &str,
    profile_domains: &[String],
    max_results: u32,
    timeout: Duration,
) -> Vec<String> {
    match try_discover(searcher, company_name, profile_domains, max_results, timeout).await {
        Ok(urls) => urls,
        Err(e) => {
            warn!(error = %e, "Discovery failed, continuing without search results");
            Vec::new()
        }
    }
}

/// Keep profile-page URLs only, first occurrence wins.
fn profile_urls(raw: Vec<String>) -> Vec<String> {
    let mut seen = HashSet::new();
    raw.into_iter()
        .map(|u| u.trim().to_string())
        .filter(|u| classify(u).0.is_profile())
        .filter(|u| normalize_url(u).is_some_and(|key| seen.insert(key)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockSearcher;

    fn domains() -> Vec<String> {
        vec!["linkedin.com".to_string()]
    }

    #[tokio::test]
    async fn keeps_profile_urls_in_order_without_duplicates() {
        let searcher = MockSearcher::new().on_search(
            "Acme",
            vec![
                "https://www.linkedin.com/company/acme/",
                "https://acme.com/about",
                "not a url",
                "https://WWW.LinkedIn.com/company/acme?trk=public",
                "https://www.crunchbase.com/organization/acme",
            ],
        );
        let urls = discover(&searcher, "Acme", &domains(), 5, Duration::from_secs(1)).await;
        assert_eq!(
            urls,
            vec![
                "https://www.linkedin.com/company/acme/",
                "https://www.crunchbase.com/organization/acme",
            ]
        );
    }

    #[tokio::test]
    async fn passes_query_constraints_to_backend() {
        let searcher = MockSearcher::new();
        discover(&searcher, "  Acme Widgets ", &domains(), 3, Duration::from_secs(1)).await;
        let seen = searcher.queries();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].query, "Acme Widgets");
        assert_eq!(seen[0].include_domains, domains());
        assert_eq!(seen[0].max_results, 3);
    }

    #[tokio::test]
    async fn backend_failure_is_unavailable() {
        let searcher = MockSearcher::new().failing("quota exceeded");
        let err = try_discover(&searcher, "Acme", &domains(), 5, Duration::from_secs(1))
            .await
            .unwrap_err();
        assert!(matches!(err, ResolverError::DiscoveryUnavailable(_)));
        assert!(discover(&searcher, "Acme", &domains(), 5, Duration::from_secs(1))
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn slow_backend_times_out() {
        let searcher = MockSearcher::new()
            .on_search("Acme", vec!["https://www.linkedin.com/company/acme"])
            .with_delay(Duration::from_secs(5));
        let err = try_discover(&searcher, "Acme", &domains(), 5, Duration::from_millis(20))
            .await
            .unwrap_err();
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn noop_finds_nothing() {
        let urls = discover(&NoopSearcher, "Acme", &domains(), 5, Duration::from_secs(1)).await;
        assert!(urls.is_empty());
    }
}
