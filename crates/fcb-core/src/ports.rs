use async_trait::async_trait;

use crate::{domain::JobId, Result};

/// One status-check result for an in-flight conversion job.
///
/// `TransientError` means the status request itself failed (network blip,
/// malformed body). Callers treat it like `InProgress` but it stays
/// distinguishable so retries-due-to-error can be observed and logged.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum PollOutcome {
    Finished { url: Option<String> },
    Failed,
    InProgress,
    TransientError,
}

/// Conversion provider port.
///
/// The three operations are independent and stateless aside from the job id;
/// retry policy lives in the orchestrator, not here.
#[async_trait]
pub trait ConversionPort: Send + Sync {
    /// Submit a file for conversion. Single attempt; any transport failure,
    /// malformed response, or provider rejection is `Error::Submit`.
    async fn submit(&self, file: &[u8], file_name: &str, output_format: &str) -> Result<JobId>;

    /// One status check. Only provider-reported terminal states produce
    /// `Finished`/`Failed`; request failures map to `TransientError`.
    async fn poll_status(&self, job: &JobId) -> Result<PollOutcome>;

    /// Fetch the converted bytes. Tries the direct-content endpoint first and
    /// falls back to the result URL from a status check.
    async fn fetch_result(&self, job: &JobId) -> Result<Vec<u8>>;
}
