use huggingface::HuggingFaceError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum FunctionCallingError {
    #[error("configuration error: {0:#}")]
    Configuration(anyhow::Error),
    #[error("chat completion failed: {0}")]
    ChatCompletion(#[from] async_openai::error::OpenAIError),
    #[error("chat completion returned no choices")]
    EmptyCompletion,
    #[error("inference call failed: {0}")]
    Inference(#[from] HuggingFaceError),
    #[error("function `{function}` requires a string argument `{argument}`")]
    MissingArgument { function: String, argument: String },
    #[error("arguments for function `{function}` are not valid JSON: {source}")]
    MalformedArguments {
        function: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("conversation did not finish within {0} chat completions")]
    TurnLimitExceeded(usize),
}

/// Coarse classification of [`FunctionCallingError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Configuration,
    RemoteCall,
    Argument,
}

impl FunctionCallingError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Configuration(_) => ErrorKind::Configuration,
            Self::ChatCompletion(_)
            | Self::EmptyCompletion
            | Self::Inference(_)
            | Self::TurnLimitExceeded(_) => ErrorKind::RemoteCall,
            Self::MissingArgument { .. } | Self::MalformedArguments { .. } => ErrorKind::Argument,
        }
    }
}
