pub mod cancel;
pub mod classify;
pub mod compare;
pub mod config;
pub mod discovery;
pub mod error;
pub mod extraction;
pub mod fetch;
pub mod logo;
pub mod pipeline;
pub mod rank;
pub mod server;
#[cfg(any(test, feature = "test-support"))]
pub mod testing;
pub mod transport;
pub mod types;

pub use cancel::{cancel_pair, CancelHandle, CancelSignal};
pub use classify::classify;
pub use config::{load_config, AppConfig, ResolverConfig};
pub use error::{ResolverError, Result};
pub use extraction::{CompanyProfile, ExtractionRequest, OpenAiExtractor, StructuredExtractor};
pub use pipeline::{Resolution, Resolver};
pub use types::{
    Candidate, Classification, CompanyQuery, DecisionReason, FailureReason, FetchStatus,
    RankedResult, ResolutionOutcome,
};
