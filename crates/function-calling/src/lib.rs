pub mod chat;
pub mod dispatch;
pub mod error;
pub mod orchestrator;
pub mod schema;

pub use chat::{ChatBackend, OpenAiChat};
pub use dispatch::{FunctionHandler, FunctionRegistry, InferenceBackend};
pub use error::{ErrorKind, FunctionCallingError};
pub use orchestrator::{Conversation, ConversationOutcome, FunctionCallingGpt, DEFAULT_MODEL};
pub use schema::{ChatCompletionReply, ChatRequest, CompletionChoice, FinishReason};
