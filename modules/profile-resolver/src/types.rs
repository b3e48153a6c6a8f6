use std::fmt;
use std::sync::Arc;

use serde::Serialize;

use crate::classify::classify;
use crate::error::{ResolverError, Result};

/// The company being resolved. Immutable once built.
#[derive(Debug, Clone, Default)]
pub struct CompanyQuery {
    name: String,
    seed_urls: Vec<String>,
    logo: Option<Arc<[u8]>>,
}

impl CompanyQuery {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    pub fn with_seed_url(mut self, url: impl Into<String>) -> Self {
        self.seed_urls.push(url.into());
        self
    }

    pub fn with_seed_urls<I, S>(mut self, urls: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.seed_urls.extend(urls.into_iter().map(Into::into));
        self
    }

    pub fn with_logo(mut self, bytes: impl Into<Arc<[u8]>>) -> Self {
        self.logo = Some(bytes.into());
        self
    }

    pub fn name(&self) -> &str {
        self.name.trim()
    }

    pub fn seed_urls(&self) -> &[String] {
        &self.seed_urls
    }

    pub fn logo(&self) -> Option<&Arc<[u8]>> {
        self.logo.as_ref()
    }

    /// A query needs at least a name or one seed URL to be worth running.
    pub fn validate(&self) -> Result<()> {
        let has_seed = self.seed_urls.iter().any(|u| !u.trim().is_empty());
        if self.name().is_empty() && !has_seed {
            return Err(ResolverError::InvalidInput(
                "query has no company name and no seed URLs".to_string(),
            ));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum Classification {
    LinkedInCompany,
    OtherProfile,
    Generic,
    Invalid,
}

impl Classification {
    /// LinkedIn or another known business-profile host.
    pub fn is_profile(self) -> bool {
        matches!(self, Classification::LinkedInCompany | Classification::OtherProfile)
    }
}

impl fmt::Display for Classification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Classification::LinkedInCompany => "linkedin_company",
            Classification::OtherProfile => "other_profile",
            Classification::Generic => "generic",
            Classification::Invalid => "invalid",
        };
        f.write_str(s)
    }
}

/// Why a candidate ended up Failed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum FailureReason {
    Timeout,
    Network(String),
    Status(u16),
    Cancelled,
}

impl fmt::Display for FailureReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FailureReason::Timeout => f.write_str("timed out"),
            FailureReason::Network(msg) => write!(f, "network error: {msg}"),
            FailureReason::Status(code) => write!(f, "HTTP status {code}"),
            FailureReason::Cancelled => f.write_str("cancelled"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "state", content = "reason", rename_all = "snake_case")]
pub enum FetchStatus {
    Pending,
    Fetched,
    Failed(FailureReason),
}

/// A URL under evaluation as the company's authoritative profile page.
#[derive(Debug, Clone, Serialize)]
pub struct Candidate {
    pub url: String,
    pub classification: Classification,
    pub classification_confidence: f64,
    pub fetch_status: FetchStatus,
    #[serde(skip)]
    pub raw_content: Option<String>,
    pub logo_url: Option<String>,
    #[serde(skip)]
    pub logo_image: Option<Arc<[u8]>>,
    pub similarity_score: Option<f64>,
    pub attempts: u32,
}

impl Candidate {
    /// Classify `url` and build a Pending candidate. Invalid URLs yield `None`
    /// so they never reach the fetcher.
    pub fn from_url(url: &str) -> Option<Self> {
        let url = url.trim();
        let (classification, confidence) = classify(url);
        if classification == Classification::Invalid {
            return None;
        }
        Some(Self {
            url: url.to_string(),
            classification,
            classification_confidence: confidence,
            fetch_status: FetchStatus::Pending,
            raw_content: None,
            logo_url: None,
            logo_image: None,
            similarity_score: None,
            attempts: 0,
        })
    }

    pub fn is_fetched(&self) -> bool {
        self.fetch_status == FetchStatus::Fetched
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.fetch_status, FetchStatus::Failed(_))
    }

    pub(crate) fn mark_fetched(&mut self, content: String) {
        self.fetch_status = FetchStatus::Fetched;
        self.raw_content = Some(content);
    }

    /// Failed candidates carry no page-derived state.
    pub(crate) fn mark_failed(&mut self, reason: FailureReason) {
        self.fetch_status = FetchStatus::Failed(reason);
        self.raw_content = None;
        self.logo_url = None;
        self.logo_image = None;
        self.similarity_score = None;
    }

    /// Page content of a fetched candidate.
    pub fn content(&self) -> Result<&str> {
        match (&self.fetch_status, self.raw_content.as_deref()) {
            (FetchStatus::Fetched, Some(content)) => Ok(content),
            (FetchStatus::Failed(reason), _) => Err(ResolverError::FetchFailure {
                url: self.url.clone(),
                reason: reason.to_string(),
            }),
            _ => Err(ResolverError::FetchFailure {
                url: self.url.clone(),
                reason: "no content fetched".to_string(),
            }),
        }
    }

    /// Number of non-empty path segments, used as a tie-breaker.
    pub fn path_depth(&self) -> usize {
        url::Url::parse(&self.url)
            .ok()
            .and_then(|u| u.path_segments().map(|s| s.filter(|p| !p.is_empty()).count()))
            .unwrap_or(usize::MAX)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct RankedResult {
    pub candidate: Candidate,
    pub composite_score: f64,
    pub rank: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DecisionReason {
    HighConfidenceMatch,
    BestAvailableNoStrongMatch,
    NoCandidates,
    AllFetchesFailed,
    InvalidInput,
}

impl fmt::Display for DecisionReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DecisionReason::HighConfidenceMatch => "high-confidence match",
            DecisionReason::BestAvailableNoStrongMatch => "best available (low confidence)",
            DecisionReason::NoCandidates => "no candidates",
            DecisionReason::AllFetchesFailed => "all fetches failed",
            DecisionReason::InvalidInput => "invalid input",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ResolutionOutcome {
    pub selected: Option<Candidate>,
    pub all_ranked: Vec<RankedResult>,
    pub decision_reason: DecisionReason,
}

impl ResolutionOutcome {
    pub(crate) fn terminal(reason: DecisionReason) -> Self {
        Self {
            selected: None,
            all_ranked: Vec::new(),
            decision_reason: reason,
        }
    }

    pub fn is_high_confidence(&self) -> bool {
        self.decision_reason == DecisionReason::HighConfidenceMatch
    }

    /// Ranked entries that were fetched and so could be selected.
    pub fn eligible(&self) -> impl Iterator<Item = &RankedResult> {
        self.all_ranked.iter().filter(|r| r.candidate.is_fetched())
    }

    pub fn failed(&self) -> impl Iterator<Item = &RankedResult> {
        self.all_ranked.iter().filter(|r| r.candidate.is_failed())
    }

    /// The selected candidate, or the terminal reason as an error.
    pub fn into_selected(self) -> Result<Candidate> {
        match (self.selected, self.decision_reason) {
            (Some(candidate), _) => Ok(candidate),
            (None, DecisionReason::AllFetchesFailed) => Err(ResolverError::AllCandidatesFailed),
            (None, DecisionReason::InvalidInput) => Err(ResolverError::InvalidInput(
                "query has no company name and no seed URLs".to_string(),
            )),
            (None, _) => Err(ResolverError::NoCandidatesFound),
        }
    }
}
