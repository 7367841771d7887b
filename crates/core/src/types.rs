use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    System,
    User,
    Assistant,
    Function,
}

/// A function invocation requested by the model. `arguments` is the raw
/// JSON-encoded string exactly as the chat API delivered it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct FunctionCallRequest {
    pub name: String,
    #[serde(default)]
    pub arguments: String,
}

impl FunctionCallRequest {
    pub fn new(name: impl Into<String>, arguments: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            arguments: arguments.into(),
        }
    }

    /// Decodes the raw arguments. An empty string means "no arguments".
    pub fn parse_arguments(&self) -> Result<Option<Value>, serde_json::Error> {
        if self.arguments.trim().is_empty() {
            return Ok(None);
        }
        serde_json::from_str(&self.arguments).map(Some)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    /// Function name, only set on `Role::Function` messages.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub function_call: Option<FunctionCallRequest>,
}

impl Message {
    pub fn system(content: impl Into<String>) -> Self {
        Self {
            role: Role::System,
            content: Some(content.into()),
            name: None,
            function_call: None,
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: Some(content.into()),
            name: None,
            function_call: None,
        }
    }

    pub fn assistant_function_call(content: Option<String>, call: FunctionCallRequest) -> Self {
        Self {
            role: Role::Assistant,
            content,
            name: None,
            function_call: Some(call),
        }
    }

    pub fn function(name: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: Role::Function,
            content: Some(content.into()),
            name: Some(name.into()),
            function_call: None,
        }
    }

    pub fn is_function_call(&self) -> bool {
        self.role == Role::Assistant && self.function_call.is_some()
    }
}
