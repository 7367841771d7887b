use assistant_core::{FunctionCallRequest, FunctionCatalog, Message};
use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: &'a [Message],
    pub functions: &'a FunctionCatalog,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    Stop,
    Length,
    FunctionCall,
    ToolCalls,
    ContentFilter,
    /// The API sent no finish reason.
    Unspecified,
}

impl FinishReason {
    pub fn is_stop(self) -> bool {
        self == Self::Stop
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stop => "stop",
            Self::Length => "length",
            Self::FunctionCall => "function_call",
            Self::ToolCalls => "tool_calls",
            Self::ContentFilter => "content_filter",
            Self::Unspecified => "unspecified",
        }
    }
}

impl From<async_openai::types::FinishReason> for FinishReason {
    fn from(reason: async_openai::types::FinishReason) -> Self {
        use async_openai::types::FinishReason as Api;
        match reason {
            Api::Stop => Self::Stop,
            Api::Length => Self::Length,
            Api::FunctionCall => Self::FunctionCall,
            Api::ToolCalls => Self::ToolCalls,
            Api::ContentFilter => Self::ContentFilter,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CompletionChoice {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub function_call: Option<FunctionCallRequest>,
    pub finish_reason: FinishReason,
}

impl CompletionChoice {
    pub fn text(content: impl Into<String>, finish_reason: FinishReason) -> Self {
        Self {
            content: Some(content.into()),
            function_call: None,
            finish_reason,
        }
    }

    pub fn function_call(call: FunctionCallRequest, finish_reason: FinishReason) -> Self {
        Self {
            content: None,
            function_call: Some(call),
            finish_reason,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Default)]
pub struct ChatCompletionReply {
    pub choices: Vec<CompletionChoice>,
    #[serde(default)]
    pub usage: Option<Value>,
}

impl ChatCompletionReply {
    pub fn single(choice: CompletionChoice) -> Self {
        Self {
            choices: vec![choice],
            usage: None,
        }
    }
}
