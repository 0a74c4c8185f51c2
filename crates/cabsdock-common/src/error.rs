use thiserror::Error;

#[derive(Debug, Error)]
pub enum CabsError {
    #[error("HTTP {status} from {url}")]
    Transport { url: String, status: u16 },

    #[error("HTTP request error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("Could not extract {what} from {url}")]
    Extraction { what: &'static str, url: String },

    #[error("Job submission for receptor {receptor} was rejected by the CABS-dock server")]
    SubmissionRejected { receptor: String },

    #[error("Status page {url} has no `Status:` marker")]
    ParsePolicy { url: String },

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Security error: {0}")]
    Security(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("URL error: {0}")]
    Url(#[from] url::ParseError),
}

impl CabsError {
    /// Failures worth another attempt on the next polling pass.
    pub fn is_transient(&self) -> bool {
        matches!(self, CabsError::Transport { .. } | CabsError::Http(_))
    }
}

pub type Result<T> = std::result::Result<T, CabsError>;
