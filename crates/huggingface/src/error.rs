use reqwest::StatusCode;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum HuggingFaceError {
    #[error("http client error: {0}")]
    HttpClient(#[from] reqwest::Error),
    #[error("unexpected http status {status}: {body}")]
    HttpStatusWithBody { status: StatusCode, body: String },
    #[error("failed to read payload {path}: {source}")]
    Payload {
        path: String,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to deserialize response payload: {0}")]
    Deserialize(#[from] serde_json::Error),
    #[error("empty response from {0}")]
    EmptyResponse(String),
}
