use reqwest::StatusCode;

/// Everything that can go wrong while talking to one of the CMU endpoints.
#[derive(Debug, thiserror::Error)]
pub enum CmuApiError {
    /// Missing credentials or an unusable base URL / environment value.
    #[error("configuration error: {0}")]
    Config(String),

    /// Connection failure, timeout or an unreadable body.
    #[error("request failed: {0}")]
    Network(#[from] reqwest::Error),

    #[error("unable to retrieve {url}: {status}")]
    Fetch { url: String, status: StatusCode },

    #[error("{0}")]
    Validation(String),

    /// The directory matched more than one person.
    #[error("not a unique result: {0}")]
    NotUnique(String),

    #[error("response has no `{0}` field")]
    MissingKey(&'static str),

    /// The page no longer has the shape the scraper expects.
    #[error("unexpected page structure: {0}")]
    Parse(String),

    #[error("{0}")]
    Argument(String),
}

pub type Result<T> = std::result::Result<T, CmuApiError>;
