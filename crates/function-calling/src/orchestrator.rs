use crate::chat::{ChatBackend, OpenAiChat};
use crate::dispatch::FunctionRegistry;
use crate::error::FunctionCallingError;
use crate::schema::{ChatRequest, FinishReason};
use assistant_core::config::{mask_secret, AppConfig};
use assistant_core::{FunctionCallRequest, FunctionCatalog, Message};
use huggingface::HuggingFaceClient;
use serde::Serialize;
use std::fmt::{self, Debug};
use std::sync::Arc;
use tracing::{debug, info, instrument};

pub const DEFAULT_MODEL: &str = "gpt-3.5-turbo-0613";

/// Append-only message log for one `answer` call.
///
/// An assistant function-call message is only ever appended together with
/// the function message that answers it.
#[derive(Debug, Clone, Default, Serialize)]
pub struct Conversation {
    messages: Vec<Message>,
}

impl Conversation {
    pub fn new(system_content: &str, user_content: &str) -> Self {
        Self {
            messages: vec![Message::system(system_content), Message::user(user_content)],
        }
    }

    pub fn messages(&self) -> &[Message] {
        &self.messages
    }

    fn record_function_call(
        &mut self,
        content: Option<String>,
        call: FunctionCallRequest,
        result: String,
    ) {
        let name = call.name.clone();
        self.messages.push(Message::assistant_function_call(content, call));
        self.messages.push(Message::function(name, result));
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ConversationOutcome {
    pub answer: String,
    pub messages: Vec<Message>,
    /// Number of chat completions requested.
    pub turns: usize,
    pub function_calls: usize,
}

enum LoopState {
    AwaitingCompletion,
    HasFunctionCall {
        content: Option<String>,
        call: FunctionCallRequest,
        finish_reason: FinishReason,
    },
    Finished(Option<String>),
}

/// Loops a chat model against the registered functions until the model
/// reports `finish_reason == "stop"`.
pub struct FunctionCallingGpt {
    model: String,
    verbose: bool,
    system_content: String,
    max_turns: Option<usize>,
    chat: Arc<dyn ChatBackend>,
    registry: FunctionRegistry,
    catalog: FunctionCatalog,
}

impl FunctionCallingGpt {
    /// Loads configuration from the environment (and `.env`) and wires the
    /// OpenAI and Hugging Face backends.
    pub fn from_env(model: impl Into<String>, verbose: bool) -> Result<Self, FunctionCallingError> {
        let config = AppConfig::load_from_env().map_err(FunctionCallingError::Configuration)?;
        Self::from_app_config(model, verbose, &config)
    }

    pub fn from_app_config(
        model: impl Into<String>,
        verbose: bool,
        config: &AppConfig,
    ) -> Result<Self, FunctionCallingError> {
        let openai = config
            .require_openai_config()
            .map_err(FunctionCallingError::Configuration)?;
        let huggingface = config
            .require_huggingface_config()
            .map_err(FunctionCallingError::Configuration)?;

        if verbose {
            info!(
                openai_api_key = %mask_secret(&openai.api_key),
                huggingface_api_key = %mask_secret(&huggingface.api_key),
                "Loaded API credentials"
            );
        }

        let catalog = FunctionCatalog::load_from_path(&config.functions_path)
            .map_err(FunctionCallingError::Configuration)?;

        let inference = HuggingFaceClient::new(huggingface)
            .map_err(|err| FunctionCallingError::Configuration(err.into()))?;

        Ok(Self::new(
            model,
            verbose,
            Arc::new(OpenAiChat::new(openai)),
            FunctionRegistry::with_inference_backend(Arc::new(inference)),
            catalog,
        ))
    }

    pub fn new(
        model: impl Into<String>,
        verbose: bool,
        chat: Arc<dyn ChatBackend>,
        registry: FunctionRegistry,
        catalog: FunctionCatalog,
    ) -> Self {
        let gpt = Self {
            model: model.into(),
            verbose,
            system_content: String::new(),
            max_turns: None,
            chat,
            registry,
            catalog,
        };

        if gpt.verbose {
            info!(
                model = %gpt.model,
                functions = ?gpt.catalog.entries(),
                registered = ?gpt.registry.names(),
                "Function calling client ready"
            );
        }

        gpt
    }

    pub fn with_system_content(mut self, system_content: impl Into<String>) -> Self {
        self.system_content = system_content.into();
        self
    }

    /// Caps the number of chat completions per call. Unlimited by default.
    pub fn with_max_turns(mut self, max_turns: usize) -> Self {
        self.max_turns = Some(max_turns);
        self
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn system_content(&self) -> &str {
        &self.system_content
    }

    pub fn catalog(&self) -> &FunctionCatalog {
        &self.catalog
    }

    pub async fn answer(&self, user_content: &str) -> Result<String, FunctionCallingError> {
        Ok(self.run(user_content).await?.answer)
    }

    #[instrument(skip(self, user_content), fields(model = %self.model))]
    pub async fn run(&self, user_content: &str) -> Result<ConversationOutcome, FunctionCallingError> {
        let mut conversation = Conversation::new(&self.system_content, user_content);
        let mut state = LoopState::AwaitingCompletion;
        let mut turns = 0;
        let mut function_calls = 0;

        if self.verbose {
            info!(system_content = %self.system_content, "Starting conversation");
        }

        loop {
            state = match state {
                LoopState::AwaitingCompletion => {
                    if self.max_turns.is_some_and(|max| turns >= max) {
                        return Err(FunctionCallingError::TurnLimitExceeded(turns));
                    }
                    turns += 1;

                    self.log_detail(turns, "Chat completion request", &conversation.messages());

                    let reply = self
                        .chat
                        .complete(ChatRequest {
                            model: &self.model,
                            messages: conversation.messages(),
                            functions: &self.catalog,
                        })
                        .await?;

                    self.log_detail(turns, "Chat completion response", &reply);

                    let choice = reply
                        .choices
                        .into_iter()
                        .next()
                        .ok_or(FunctionCallingError::EmptyCompletion)?;

                    info!(
                        turn = turns,
                        finish_reason = choice.finish_reason.as_str(),
                        function = choice
                            .function_call
                            .as_ref()
                            .map(|call| call.name.as_str())
                            .unwrap_or(""),
                        "Received chat completion"
                    );

                    match choice.function_call {
                        Some(call) => LoopState::HasFunctionCall {
                            content: choice.content,
                            call,
                            finish_reason: choice.finish_reason,
                        },
                        None if choice.finish_reason.is_stop() => {
                            LoopState::Finished(choice.content)
                        }
                        None => LoopState::AwaitingCompletion,
                    }
                }
                LoopState::HasFunctionCall {
                    content,
                    call,
                    finish_reason,
                } => {
                    let arguments = call.parse_arguments().map_err(|source| {
                        FunctionCallingError::MalformedArguments {
                            function: call.name.clone(),
                            source,
                        }
                    })?;

                    let result = self.registry.dispatch(&call.name, arguments.as_ref()).await?;
                    function_calls += 1;

                    info!(
                        turn = turns,
                        function = %call.name,
                        output_bytes = result.len(),
                        output_preview = %truncate_for_log(&result, 240),
                        "Function call completed"
                    );
                    self.log_detail(turns, "Function result", &result);

                    // A response can request a function and stop at the same
                    // time; the result is still recorded before exiting.
                    let answer = finish_reason.is_stop().then(|| content.clone());
                    conversation.record_function_call(content, call, result);

                    match answer {
                        Some(content) => LoopState::Finished(content),
                        None => LoopState::AwaitingCompletion,
                    }
                }
                LoopState::Finished(content) => {
                    info!(turns, function_calls, "Conversation finished");

                    return Ok(ConversationOutcome {
                        answer: content.unwrap_or_default(),
                        messages: conversation.messages,
                        turns,
                        function_calls,
                    });
                }
            };
        }
    }

    fn log_detail(&self, turn: usize, what: &str, detail: &dyn Debug) {
        if self.verbose {
            info!(turn, detail = ?detail, "{what}");
        } else {
            debug!(turn, detail = ?detail, "{what}");
        }
    }
}

fn truncate_for_log(text: &str, max_chars: usize) -> String {
    if text.chars().count() <= max_chars {
        return text.to_string();
    }

    text.chars().take(max_chars).collect::<String>() + "…"
}

impl fmt::Debug for FunctionCallingGpt {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FunctionCallingGpt")
            .field("model", &self.model)
            .field("verbose", &self.verbose)
            .field("max_turns", &self.max_turns)
            .field("registry", &self.registry)
            .field("functions", &self.catalog.len())
            .finish_non_exhaustive()
    }
}
