//! Error types for the upstream equivalency client.

#[derive(Debug, thiserror::Error)]
pub enum UpstreamError {
    #[error("Upstream returned HTTP {status} for {url}")]
    Status { status: u16, url: String },
    #[error("Failed to parse response")]
    ParseFailed {
        status: u16,
        url: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("Invalid upstream URL: {0}")]
    InvalidUrl(String),
    #[error(transparent)]
    RequestFailed(#[from] anyhow::Error),
}

impl UpstreamError {
    /// Server errors and transport failures may succeed on a later run.
    pub fn is_transient(&self) -> bool {
        match self {
            UpstreamError::Status { status, .. } => *status >= 500 || *status == 429,
            UpstreamError::RequestFailed(_) => true,
            UpstreamError::ParseFailed { .. } | UpstreamError::InvalidUrl(_) => false,
        }
    }
}

impl From<reqwest_middleware::Error> for UpstreamError {
    fn from(err: reqwest_middleware::Error) -> Self {
        UpstreamError::RequestFailed(anyhow::Error::new(err))
    }
}

impl From<reqwest::Error> for UpstreamError {
    fn from(err: reqwest::Error) -> Self {
        UpstreamError::RequestFailed(anyhow::Error::new(err))
    }
}
