//! The resolver run: seeds and discovery, then per-candidate fetch, logo and
//! compare under a shared concurrency cap, then ranking and selection.
//!
//! Each candidate is owned by exactly one in-flight future. The reference
//! fingerprint is shared read-only. A caller [`CancelSignal`] or the global
//! pipeline deadline interrupts every unfinished candidate. One cut off while
//! fetching is recorded as Failed. One cut off during logo work keeps its
//! fetched page and is ranked without a similarity score.

use std::collections::HashSet;
use std::sync::Arc;

use futures::stream::{self, StreamExt};
use serde::Serialize;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::cancel::CancelSignal;
use crate::classify::normalize_url;
use crate::compare::LogoFingerprint;
use crate::config::ResolverConfig;
use crate::discovery::{discover, WebSearcher};
use crate::error::Result;
use crate::extraction::{self, CompanyProfile, StructuredExtractor};
use crate::fetch::PageFetcher;
use crate::logo::extract_logo;
use crate::rank::{rank, select, RankingWeights};
use crate::transport::HttpTransport;
use crate::types::{Candidate, CompanyQuery, DecisionReason, FailureReason, ResolutionOutcome};

/// Outcome of a full run, plus the extracted profile when extraction ran.
#[derive(Debug, Clone, Serialize)]
pub struct Resolution {
    pub outcome: ResolutionOutcome,
    pub profile: Option<CompanyProfile>,
}

pub struct Resolver {
    config: ResolverConfig,
    searcher: Arc<dyn WebSearcher>,
    transport: Arc<dyn HttpTransport>,
    extractor: Option<Arc<dyn StructuredExtractor>>,
}

impl Resolver {
    pub fn new(
        config: ResolverConfig,
        searcher: Arc<dyn WebSearcher>,
        transport: Arc<dyn HttpTransport>,
    ) -> Self {
        Self {
            config,
            searcher,
            transport,
            extractor: None,
        }
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn StructuredExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub(crate) fn transport(&self) -> &dyn HttpTransport {
        self.transport.as_ref()
    }

    /// Resolve the authoritative profile page. Never fails: invalid input and
    /// total failure are reported through the outcome's decision reason.
    pub async fn resolve(&self, query: &CompanyQuery) -> ResolutionOutcome {
        self.resolve_with_cancel(query, CancelSignal::never()).await
    }

    pub async fn resolve_with_cancel(
        &self,
        query: &CompanyQuery,
        cancel: CancelSignal,
    ) -> ResolutionOutcome {
        if let Err(e) = query.validate() {
            warn!(error = %e, "Rejecting query");
            return ResolutionOutcome::terminal(DecisionReason::InvalidInput);
        }
        let name = query.name();
        info!(
            company = name,
            seeds = query.seed_urls().len(),
            logo = query.logo().is_some(),
            "Resolving company profile"
        );

        let reference = self.reference_fingerprint(query).await;
        let candidates = self.gather_candidates(query).await;
        if candidates.is_empty() {
            info!(company = name, "No candidates to evaluate");
            return ResolutionOutcome::terminal(DecisionReason::NoCandidates);
        }

        let processed = self
            .process_all(candidates, reference.clone(), name, cancel)
            .await;

        let weights = RankingWeights::for_run(&self.config, reference.is_some());
        let outcome = select(rank(processed, &weights), self.config.high_confidence_threshold);
        info!(
            company = name,
            reason = %outcome.decision_reason,
            selected = outcome.selected.as_ref().map(|c| c.url.as_str()).unwrap_or("-"),
            eligible = outcome.eligible().count(),
            failed = outcome.failed().count(),
            "Resolution complete"
        );
        outcome
    }

    /// Resolve, then run extraction once on the selected candidate when an
    /// extractor is configured.
    pub async fn run(&self, query: &CompanyQuery) -> Result<Resolution> {
        self.run_with_cancel(query, CancelSignal::never()).await
    }

    pub async fn run_with_cancel(
        &self,
        query: &CompanyQuery,
        cancel: CancelSignal,
    ) -> Result<Resolution> {
        let outcome = self.resolve_with_cancel(query, cancel).await;
        let profile = match (&self.extractor, &outcome.selected) {
            (Some(extractor), Some(selected)) => {
                Some(extraction::dispatch(extractor.as_ref(), selected, query.name()).await?)
            }
            _ => None,
        };
        Ok(Resolution { outcome, profile })
    }

    /// Decode the caller's logo once. An undecodable logo is treated as absent.
    async fn reference_fingerprint(&self, query: &CompanyQuery) -> Option<Arc<LogoFingerprint>> {
        let bytes = query.logo()?.clone();
        match tokio::task::spawn_blocking(move || LogoFingerprint::from_bytes(&bytes)).await {
            Ok(Ok(fingerprint)) => Some(Arc::new(fingerprint)),
            Ok(Err(e)) => {
                warn!(error = %e, "Reference logo unusable, ranking without similarity");
                None
            }
            Err(e) => {
                warn!(error = %e, "Reference logo decode task failed");
                None
            }
        }
    }

    /// Valid seeds, plus discovered profile pages when no seed is already a
    /// confident profile match. Deduplicated by normalized URL, seeds first.
    async fn gather_candidates(&self, query: &CompanyQuery) -> Vec<Candidate> {
        let mut seen = HashSet::new();
        let mut candidates = Vec::new();

        for raw in query.seed_urls() {
            if raw.trim().is_empty() {
                continue;
            }
            match Candidate::from_url(raw) {
                Some(candidate) => {
                    let key = normalize_url(&candidate.url).unwrap_or_else(|| candidate.url.clone());
                    if seen.insert(key) {
                        debug!(url = %candidate.url, class = %candidate.classification, "Seed accepted");
                        candidates.push(candidate);
                    }
                }
                None => warn!(url = %raw, "Dropping invalid seed URL"),
            }
        }

        let floor = self.config.discovery_confidence_floor;
        let has_confident_profile = candidates
            .iter()
            .any(|c| c.classification.is_profile() && c.classification_confidence >= floor);
        if has_confident_profile || query.name().is_empty() {
            return candidates;
        }

        let discovered = discover(
            self.searcher.as_ref(),
            query.name(),
            &self.config.profile_domains,
            self.config.max_search_results,
            self.config.search_timeout(),
        )
        .await;
        for url in discovered {
            let Some(candidate) = Candidate::from_url(&url) else {
                continue;
            };
            let key = normalize_url(&candidate.url).unwrap_or_else(|| candidate.url.clone());
            if seen.insert(key) {
                candidates.push(candidate);
            }
        }
        candidates
    }

    async fn process_all(
        &self,
        candidates: Vec<Candidate>,
        reference: Option<Arc<LogoFingerprint>>,
        name: &str,
        cancel: CancelSignal,
    ) -> Vec<Candidate> {
        let deadline = Instant::now() + self.config.pipeline_timeout();
        let fetcher = PageFetcher::new(
            self.transport.as_ref(),
            self.config.fetch_timeout(),
            self.config.fetch_retries,
        );
        let fetcher = &fetcher;

        stream::iter(candidates.into_iter().map(|mut candidate| {
            let mut cancel = cancel.clone();
            let reference = reference.clone();
            async move {
                let interrupted = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Some("cancelled"),
                    _ = tokio::time::sleep_until(deadline) => Some("pipeline deadline reached"),
                    _ = fetcher.fetch(&mut candidate) => None,
                };
                if let Some(why) = interrupted {
                    warn!(url = %candidate.url, why, "Candidate fetch interrupted");
                    candidate.mark_failed(FailureReason::Cancelled);
                    return candidate;
                }

                let Some(reference) = reference.filter(|_| candidate.is_fetched()) else {
                    return candidate;
                };
                let interrupted = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => Some("cancelled"),
                    _ = tokio::time::sleep_until(deadline) => Some("pipeline deadline reached"),
                    _ = self.score_logo(&mut candidate, reference, name) => None,
                };
                if let Some(why) = interrupted {
                    warn!(url = %candidate.url, why, "Logo comparison interrupted");
                    candidate.logo_url = None;
                    candidate.logo_image = None;
                    candidate.similarity_score = None;
                }
                candidate
            }
        }))
        .buffer_unordered(self.config.max_concurrency.max(1))
        .collect()
        .await
    }

    /// Locate, download and compare the logo of a fetched candidate.
    async fn score_logo(
        &self,
        candidate: &mut Candidate,
        reference: Arc<LogoFingerprint>,
        name: &str,
    ) {
        extract_logo(
            self.transport.as_ref(),
            candidate,
            name,
            self.config.max_logo_candidates,
            self.config.fetch_timeout(),
        )
        .await;
        let Some(bytes) = candidate.logo_image.clone() else {
            return;
        };

        let compare = tokio::task::spawn_blocking(move || {
            LogoFingerprint::from_bytes(&bytes).map(|logo| reference.similarity(&logo))
        });
        match tokio::time::timeout(self.config.fetch_timeout(), compare).await {
            Ok(Ok(Ok(score))) => {
                info!(url = %candidate.url, score, "Logo compared");
                candidate.similarity_score = Some(score);
            }
            Ok(Ok(Err(e))) => debug!(url = %candidate.url, error = %e, "Candidate logo not decodable"),
            Ok(Err(e)) => warn!(url = %candidate.url, error = %e, "Logo compare task failed"),
            Err(_) => warn!(url = %candidate.url, "Logo compare timed out"),
        }
    }
}
