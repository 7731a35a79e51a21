use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("invalid url {url}: {reason}")]
    Url { url: String, reason: String },
    #[error("failed to build the HTTP client")]
    Client(#[source] reqwest::Error),
    #[error("request to {url} failed")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("{url} answered {status}: {body}")]
    Status {
        url: String,
        status: reqwest::StatusCode,
        body: String,
    },
    #[error("unexpected response from {url}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("no saved session, run `student-id login` first")]
    Missing,
    #[error("saved session is unreadable, run `student-id login` again")]
    Corrupt(#[source] serde_json::Error),
    #[error("the OAuth server rejected the saved session")]
    Rejected,
}
