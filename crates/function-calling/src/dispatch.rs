use crate::error::FunctionCallingError;
use async_trait::async_trait;
use huggingface::{HuggingFaceClient, OBJECT_DETECTION_MODEL};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::{info, warn};

/// The hosted inference dependency used by the built-in functions.
#[async_trait]
pub trait InferenceBackend: Send + Sync {
    /// Sends the payload at `data_path` to `model`, returning the raw body.
    async fn post(&self, data_path: &str, model: &str) -> Result<String, FunctionCallingError>;

    async fn image_to_text(&self, data_path: &str) -> Result<String, FunctionCallingError>;
}

#[async_trait]
impl InferenceBackend for HuggingFaceClient {
    async fn post(&self, data_path: &str, model: &str) -> Result<String, FunctionCallingError> {
        Ok(HuggingFaceClient::post(self, data_path, model).await?)
    }

    async fn image_to_text(&self, data_path: &str) -> Result<String, FunctionCallingError> {
        Ok(HuggingFaceClient::image_to_text(self, data_path).await?)
    }
}

/// A function the model can call by name.
#[async_trait]
pub trait FunctionHandler: Send + Sync {
    async fn call(&self, arguments: Option<&Value>) -> Result<String, FunctionCallingError>;
}

pub struct ObjectDetection {
    backend: Arc<dyn InferenceBackend>,
}

impl ObjectDetection {
    pub const NAME: &'static str = "object_detection";

    pub fn new(backend: Arc<dyn InferenceBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl FunctionHandler for ObjectDetection {
    async fn call(&self, arguments: Option<&Value>) -> Result<String, FunctionCallingError> {
        let data_path = require_str(Self::NAME, arguments, "data_path")?;
        self.backend.post(data_path, OBJECT_DETECTION_MODEL).await
    }
}

pub struct ImageToText {
    backend: Arc<dyn InferenceBackend>,
}

impl ImageToText {
    pub const NAME: &'static str = "image_to_text";

    pub fn new(backend: Arc<dyn InferenceBackend>) -> Self {
        Self { backend }
    }
}

#[async_trait]
impl FunctionHandler for ImageToText {
    async fn call(&self, arguments: Option<&Value>) -> Result<String, FunctionCallingError> {
        let data_path = require_str(Self::NAME, arguments, "data_path")?;
        self.backend.image_to_text(data_path).await
    }
}

fn require_str<'a>(
    function: &str,
    arguments: Option<&'a Value>,
    key: &str,
) -> Result<&'a str, FunctionCallingError> {
    arguments
        .and_then(|args| args.get(key))
        .and_then(Value::as_str)
        .ok_or_else(|| FunctionCallingError::MissingArgument {
            function: function.to_string(),
            argument: key.to_string(),
        })
}

/// Maps function names to handlers. Unknown names resolve to an empty
/// result so the conversation can continue.
#[derive(Clone, Default)]
pub struct FunctionRegistry {
    handlers: HashMap<String, Arc<dyn FunctionHandler>>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with `object_detection` and `image_to_text` backed by `backend`.
    pub fn with_inference_backend(backend: Arc<dyn InferenceBackend>) -> Self {
        let mut registry = Self::new();
        registry.register(
            ObjectDetection::NAME,
            Arc::new(ObjectDetection::new(backend.clone())),
        );
        registry.register(ImageToText::NAME, Arc::new(ImageToText::new(backend)));
        registry
    }

    /// Adds or replaces a handler, returning the previous one.
    pub fn register(
        &mut self,
        name: impl Into<String>,
        handler: Arc<dyn FunctionHandler>,
    ) -> Option<Arc<dyn FunctionHandler>> {
        self.handlers.insert(name.into(), handler)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.handlers.contains_key(name)
    }

    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    pub async fn dispatch(
        &self,
        name: &str,
        arguments: Option<&Value>,
    ) -> Result<String, FunctionCallingError> {
        let Some(handler) = self.handlers.get(name) else {
            warn!(function = %name, "No handler registered for function, returning empty result");
            return Ok(String::new());
        };

        let rendered = arguments.map(serde_json::Value::to_string).unwrap_or_default();
        info!(function = %name, arguments = %rendered, "Dispatching function call");

        handler.call(arguments).await
    }
}

impl fmt::Debug for FunctionRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionRegistry")
            .field("functions", &self.names())
            .finish()
    }
}
