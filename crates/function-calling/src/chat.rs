// The chat backend speaks the legacy `functions` / `function_call` protocol,
// which async-openai marks as deprecated.
#![allow(deprecated)]

use crate::error::FunctionCallingError;
use crate::schema::{ChatCompletionReply, ChatRequest, CompletionChoice, FinishReason};
use anyhow::Result;
use assistant_core::config::{AppConfig, OpenAiConfig};
use assistant_core::{FunctionCallRequest, FunctionCatalogEntry, Message, Role};
use async_openai::{
    config::OpenAIConfig,
    error::OpenAIError,
    types::{
        ChatCompletionFunctions, ChatCompletionFunctionsArgs,
        ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestFunctionMessage,
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, CreateChatCompletionRequestArgs, FunctionCall,
    },
    Client as OpenAIClient,
};
use async_trait::async_trait;
use tracing::{info, instrument};

/// The chat-completion dependency of the orchestrator.
#[async_trait]
pub trait ChatBackend: Send + Sync {
    async fn complete(
        &self,
        request: ChatRequest<'_>,
    ) -> Result<ChatCompletionReply, FunctionCallingError>;
}

#[derive(Debug, Clone)]
pub struct OpenAiChat {
    client: OpenAIClient<OpenAIConfig>,
}

impl OpenAiChat {
    pub fn from_app_config(config: &AppConfig) -> Result<Self> {
        let openai = config.require_openai_config()?;
        Ok(Self::new(openai))
    }

    pub fn new(config: &OpenAiConfig) -> Self {
        let openai_config = OpenAIConfig::new()
            .with_api_key(config.api_key.clone())
            .with_api_base(config.api_base.trim_end_matches('/').to_string());

        Self {
            client: OpenAIClient::with_config(openai_config),
        }
    }
}

#[async_trait]
impl ChatBackend for OpenAiChat {
    #[instrument(skip(self, request), fields(model = %request.model))]
    async fn complete(
        &self,
        request: ChatRequest<'_>,
    ) -> Result<ChatCompletionReply, FunctionCallingError> {
        let messages = request
            .messages
            .iter()
            .map(to_request_message)
            .collect::<Result<Vec<_>, OpenAIError>>()?;

        let mut builder = CreateChatCompletionRequestArgs::default();
        builder.model(request.model).messages(messages);

        // The API rejects an empty `functions` array.
        if !request.functions.is_empty() {
            let functions = request
                .functions
                .entries()
                .iter()
                .map(to_function)
                .collect::<Result<Vec<_>, OpenAIError>>()?;
            builder.functions(functions);
        }

        let chat_request = builder.build()?;

        info!(
            message_count = request.messages.len(),
            function_count = request.functions.len(),
            "Sending chat completion request"
        );

        let response = self.client.chat().create(chat_request).await?;

        let usage = response
            .usage
            .as_ref()
            .and_then(|usage| serde_json::to_value(usage).ok());

        let choices = response
            .choices
            .into_iter()
            .map(|choice| CompletionChoice {
                content: choice.message.content,
                function_call: choice
                    .message
                    .function_call
                    .map(|call| FunctionCallRequest::new(call.name, call.arguments)),
                finish_reason: choice
                    .finish_reason
                    .map(FinishReason::from)
                    .unwrap_or(FinishReason::Unspecified),
            })
            .collect();

        Ok(ChatCompletionReply { choices, usage })
    }
}

fn to_request_message(message: &Message) -> Result<ChatCompletionRequestMessage, OpenAIError> {
    let content = message.content.clone().unwrap_or_default();

    let converted = match message.role {
        Role::System => ChatCompletionRequestMessage::System(
            ChatCompletionRequestSystemMessageArgs::default()
                .content(content)
                .build()?,
        ),
        Role::User => ChatCompletionRequestMessage::User(
            ChatCompletionRequestUserMessageArgs::default()
                .content(content)
                .build()?,
        ),
        Role::Assistant => {
            let mut builder = ChatCompletionRequestAssistantMessageArgs::default();
            if let Some(text) = &message.content {
                builder.content(text.clone());
            }
            if let Some(call) = &message.function_call {
                builder.function_call(FunctionCall {
                    name: call.name.clone(),
                    arguments: call.arguments.clone(),
                });
            }
            ChatCompletionRequestMessage::Assistant(builder.build()?)
        }
        Role::Function => {
            ChatCompletionRequestMessage::Function(ChatCompletionRequestFunctionMessage {
                content: Some(content),
                name: message.name.clone().unwrap_or_default(),
            })
        }
    };

    Ok(converted)
}

fn to_function(entry: &FunctionCatalogEntry) -> Result<ChatCompletionFunctions, OpenAIError> {
    ChatCompletionFunctionsArgs::default()
        .name(entry.name.clone())
        .description(entry.description.clone())
        .parameters(entry.parameters.clone())
        .build()
}

#[cfg(test)]
mod tests {
    use super::*;
    use assistant_core::FunctionCatalog;
    use axum::extract::State;
    use axum::routing::post;
    use axum::{Json, Router};
    use serde_json::{json, Value};
    use std::sync::{Arc, Mutex};

    type Captured = Arc<Mutex<Vec<Value>>>;

    async fn completions(State(captured): State<Captured>, Json(body): Json<Value>) -> Json<Value> {
        captured.lock().unwrap().push(body);
        Json(json!({
            "id": "chatcmpl-1",
            "object": "chat.completion",
            "created": 1_700_000_000u32,
            "model": "gpt-3.5-turbo-0613",
            "choices": [{
                "index": 0,
                "message": {
                    "role": "assistant",
                    "content": null,
                    "function_call": {
                        "name": "image_to_text",
                        "arguments": "{\"data_path\":\"x.jpg\"}"
                    }
                },
                "finish_reason": "function_call",
                "logprobs": null
            }],
            "usage": { "prompt_tokens": 10, "completion_tokens": 5, "total_tokens": 15 }
        }))
    }

    async fn spawn_server() -> (String, Captured) {
        let captured: Captured = Arc::default();
        let app = Router::new()
            .route("/v1/chat/completions", post(completions))
            .with_state(captured.clone());
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        (format!("http://{addr}/v1"), captured)
    }

    fn catalog() -> FunctionCatalog {
        FunctionCatalog::new(vec![FunctionCatalogEntry {
            name: "image_to_text".into(),
            description: "Describe an image".into(),
            parameters: json!({
                "type": "object",
                "properties": { "data_path": { "type": "string" } },
                "required": ["data_path"]
            }),
        }])
        .unwrap()
    }

    #[tokio::test]
    async fn maps_function_call_response_and_sends_catalog() {
        let (api_base, captured) = spawn_server().await;
        let chat = OpenAiChat::new(&OpenAiConfig {
            api_key: "sk-test".into(),
            api_base,
        });

        let messages = vec![
            Message::system(""),
            Message::user("Describe x.jpg"),
            Message::assistant_function_call(
                None,
                FunctionCallRequest::new("image_to_text", r#"{"data_path":"x.jpg"}"#),
            ),
            Message::function("image_to_text", "zebras"),
        ];
        let catalog = catalog();

        let reply = chat
            .complete(ChatRequest {
                model: "gpt-3.5-turbo-0613",
                messages: &messages,
                functions: &catalog,
            })
            .await
            .unwrap();

        let choice = &reply.choices[0];
        assert_eq!(choice.finish_reason, FinishReason::FunctionCall);
        assert_eq!(choice.content, None);
        assert_eq!(
            choice.function_call,
            Some(FunctionCallRequest::new("image_to_text", r#"{"data_path":"x.jpg"}"#))
        );
        assert_eq!(reply.usage.as_ref().unwrap()["total_tokens"], json!(15));

        let body = captured.lock().unwrap().pop().unwrap();
        assert_eq!(body["model"], json!("gpt-3.5-turbo-0613"));
        assert_eq!(body["functions"][0]["name"], json!("image_to_text"));
        let roles: Vec<_> = body["messages"]
            .as_array()
            .unwrap()
            .iter()
            .map(|m| m["role"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(roles, vec!["system", "user", "assistant", "function"]);
        assert_eq!(body["messages"][2]["function_call"]["name"], json!("image_to_text"));
        assert_eq!(body["messages"][3]["name"], json!("image_to_text"));
        assert_eq!(body["messages"][3]["content"], json!("zebras"));
    }

    #[tokio::test]
    async fn empty_catalog_omits_functions() {
        let (api_base, captured) = spawn_server().await;
        let chat = OpenAiChat::new(&OpenAiConfig {
            api_key: "sk-test".into(),
            api_base,
        });
        let messages = vec![Message::system(""), Message::user("hi")];

        chat.complete(ChatRequest {
            model: "gpt-3.5-turbo",
            messages: &messages,
            functions: &FunctionCatalog::default(),
        })
        .await
        .unwrap();

        let body = captured.lock().unwrap().pop().unwrap();
        assert!(body.get("functions").is_none());
    }
}
