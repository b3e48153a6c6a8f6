use thiserror::Error;

/// Result type alias for resolver operations.
pub type Result<T> = std::result::Result<T, ResolverError>;

#[derive(Debug, Error)]
pub enum ResolverError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Discovery unavailable: {0}")]
    DiscoveryUnavailable(String),

    #[error("Fetch failed for {url}: {reason}")]
    FetchFailure { url: String, reason: String },

    #[error("Image decode failed: {0}")]
    DecodeFailure(String),

    #[error("No candidates found")]
    NoCandidatesFound,

    #[error("All candidate fetches failed")]
    AllCandidatesFailed,

    #[error("Extraction service error: {0}")]
    Extraction(#[source] anyhow::Error),

    #[error("Configuration error: {0}")]
    Config(String),
}
