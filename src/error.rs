use thiserror::Error;

/// Failures at the acquisition or sink boundary. These abort a run.
#[derive(Debug, Error)]
pub enum ScrapeError {
    #[error("request failed: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("{url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    #[error("browser: {0}")]
    Browser(String),

    #[error("csv: {0}")]
    Csv(#[from] csv::Error),

    #[error("store: {0}")]
    Store(String),

    #[error("config: {0}")]
    Config(#[from] config::ConfigError),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Why a single question produced no record. Never aborts the run.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SkipReason {
    #[error("question not found")]
    NotFound,

    #[error("no answer found")]
    EmptyAnswer,

    #[error("error: {0}")]
    Failed(String),
}

impl From<ScrapeError> for SkipReason {
    fn from(e: ScrapeError) -> Self {
        SkipReason::Failed(e.to_string())
    }
}
