// Page fetching with a per-attempt timeout and a single retry on transient
// network failures. Concurrency is capped by the caller's stream buffer.

use std::time::Duration;

use tracing::{info, warn};

use crate::transport::{HttpTransport, TransportError, TransportResponse};
use crate::types::{Candidate, FailureReason, FetchStatus};

pub struct PageFetcher<'a> {
    transport: &'a dyn HttpTransport,
    timeout: Duration,
    retries: u32,
}

impl<'a> PageFetcher<'a> {
    pub fn new(transport: &'a dyn HttpTransport, timeout: Duration, retries: u32) -> Self {
        Self {
            transport,
            timeout,
            retries,
        }
    }

    /// Fetch one Pending candidate, leaving it Fetched or Failed.
    pub async fn fetch(&self, candidate: &mut Candidate) {
        if candidate.fetch_status != FetchStatus::Pending {
            return;
        }

        loop {
            candidate.attempts += 1;
            let attempt = candidate.attempts;

            match get_with_timeout(self.transport, &candidate.url, self.timeout).await {
                Ok(resp) if resp.is_success() => {
                    let html = resp.text();
                    info!(url = %candidate.url, attempt, bytes = html.len(), "Fetched candidate");
                    candidate.mark_fetched(html);
                    return;
                }
                Ok(resp) => {
                    warn!(url = %candidate.url, status = resp.status, "Candidate fetch returned non-2xx");
                    candidate.mark_failed(FailureReason::Status(resp.status));
                    return;
                }
                Err(e) if e.is_transient() && attempt <= self.retries => {
                    warn!(url = %candidate.url, attempt, error = %e, "Transient fetch failure, retrying");
                }
                Err(e) => {
                    warn!(url = %candidate.url, attempt, error = %e, "Candidate fetch failed");
                    candidate.mark_failed(failure_reason(&e));
                    return;
                }
            }
        }
    }
}

/// Single GET bounded by `timeout`, independent of any timeout in the transport.
pub(crate) async fn get_with_timeout(
    transport: &dyn HttpTransport,
    url: &str,
    timeout: Duration,
) -> Result<TransportResponse, TransportError> {
    match tokio::time::timeout(timeout, transport.get(url)).await {
        Ok(result) => result,
        Err(_) => Err(TransportError::Timeout),
    }
}

fn failure_reason(err: &TransportError) -> FailureReason {
    match err {
        TransportError::Timeout => FailureReason::Timeout,
        other => FailureReason::Network(other.to_string()),
    }
}
