/// Core error type for the bot.
///
/// Adapter crates map their specific errors into this type so the orchestrator
/// can turn every failure into a single user-facing status line.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("config error: {0}")]
    Config(String),

    #[error("i/o error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// Provider rejected the submit request, or the request never went out.
    /// Single attempt; never retried.
    #[error("submit failed: {0}")]
    Submit(String),

    /// Both result-download paths (direct content, fallback URL) exhausted.
    #[error("result fetch failed: {0}")]
    Fetch(String),

    /// Provider explicitly reported the job as failed.
    #[error("conversion failed: {0}")]
    ProviderFailed(String),

    /// Poll attempt ceiling reached without a terminal job status.
    #[error("conversion timed out after {attempts} poll attempts")]
    Timeout { attempts: u32 },

    /// Download from or delivery to the messaging platform failed.
    #[error("transport error: {0}")]
    Transport(String),

    #[error("external error: {0}")]
    External(String),
}

pub type Result<T> = std::result::Result<T, Error>;
