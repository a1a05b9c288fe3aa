//! Model abstraction for the reasoning backend
//!
//! The runner only needs one operation from a backend: given the active
//! agent's instructions, the transcript so far and the tools and handoffs it
//! may use, return either text (final or structured) or a list of tool
//! calls. [`OpenAIProvider`] implements that on top of async-openai;
//! [`MockProvider`] replays a script and is what tests and demos use.

use std::collections::VecDeque;
use std::sync::Mutex;
use std::time::Duration;

use async_openai::{
    config::OpenAIConfig,
    types::{
        ChatCompletionMessageToolCall, ChatCompletionRequestAssistantMessageArgs,
        ChatCompletionRequestMessage, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
        ChatCompletionTool, ChatCompletionToolArgs, ChatCompletionToolType,
        CreateChatCompletionRequestArgs, FunctionCall, FunctionObjectArgs, ResponseFormat,
        ResponseFormatJsonSchema,
    },
    Client,
};
use async_trait::async_trait;
use serde_json::Value;

use crate::error::{AgentsError, Result};
use crate::items::{Message, ModelResponse, Role, ToolCall};
use crate::tool::ToolSpec;
use crate::usage::Usage;

/// Everything the backend sees for one turn.
#[derive(Debug, Clone)]
pub struct ModelRequest {
    /// Name of the active agent
    pub agent: String,
    /// System message first, then the transcript so far
    pub messages: Vec<Message>,
    pub tools: Vec<ToolSpec>,
    /// Handoff targets, advertised to the backend as callable tools
    pub handoffs: Vec<ToolSpec>,
    /// When set, the final answer must be a JSON document matching it
    pub output_schema: Option<Value>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
}

impl ModelRequest {
    /// Tools followed by handoffs, in advertisement order.
    pub fn callable_specs(&self) -> impl Iterator<Item = &ToolSpec> {
        self.tools.iter().chain(self.handoffs.iter())
    }

    /// Content of the most recent user message.
    pub fn last_user_message(&self) -> Option<&str> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User)
            .map(|m| m.content.as_str())
    }
}

/// Trait for model providers
#[async_trait]
pub trait ModelProvider: Send + Sync {
    /// Generate a completion
    async fn complete(&self, request: ModelRequest) -> Result<(ModelResponse, Usage)>;

    /// Get the model name
    fn model_name(&self) -> &str;
}

/// OpenAI model provider using async-openai
pub struct OpenAIProvider {
    client: Client<OpenAIConfig>,
    model: String,
}

impl OpenAIProvider {
    /// Uses `OPENAI_API_KEY` from the environment.
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            client: Client::new(),
            model: model.into(),
        }
    }

    pub fn with_client(client: Client<OpenAIConfig>, model: impl Into<String>) -> Self {
        Self {
            client,
            model: model.into(),
        }
    }

    fn convert_message(msg: &Message) -> Result<ChatCompletionRequestMessage> {
        let converted = match msg.role {
            Role::System => ChatCompletionRequestSystemMessageArgs::default()
                .content(msg.content.clone())
                .build()?
                .into(),
            Role::User => ChatCompletionRequestUserMessageArgs::default()
                .content(msg.content.clone())
                .build()?
                .into(),
            Role::Assistant => {
                let mut builder = ChatCompletionRequestAssistantMessageArgs::default();
                if !msg.content.is_empty() {
                    builder.content(msg.content.clone());
                }
                if let Some(tool_calls) = &msg.tool_calls {
                    let calls: Vec<_> = tool_calls
                        .iter()
                        .map(|tc| ChatCompletionMessageToolCall {
                            id: tc.id.clone(),
                            r#type: ChatCompletionToolType::Function,
                            function: FunctionCall {
                                name: tc.name.clone(),
                                arguments: tc.arguments.to_string(),
                            },
                        })
                        .collect();
                    builder.tool_calls(calls);
                }
                builder.build()?.into()
            }
            Role::Tool => ChatCompletionRequestToolMessageArgs::default()
                .content(msg.content.clone())
                .tool_call_id(msg.tool_call_id.clone().unwrap_or_default())
                .build()?
                .into(),
        };
        Ok(converted)
    }

    fn convert_tool(spec: &ToolSpec) -> Result<ChatCompletionTool> {
        Ok(ChatCompletionToolArgs::default()
            .r#type(ChatCompletionToolType::Function)
            .function(
                FunctionObjectArgs::default()
                    .name(spec.name.clone())
                    .description(spec.description.clone())
                    .parameters(spec.parameters.clone())
                    .build()?,
            )
            .build()?)
    }

    fn response_format(agent: &str, schema: &Value) -> ResponseFormat {
        let name: String = agent
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
            .take(48)
            .collect();
        ResponseFormat::JsonSchema {
            json_schema: ResponseFormatJsonSchema {
                description: None,
                name: format!("{}_output", name),
                schema: Some(schema.clone()),
                strict: Some(false),
            },
        }
    }
}

#[async_trait]
impl ModelProvider for OpenAIProvider {
    async fn complete(&self, request: ModelRequest) -> Result<(ModelResponse, Usage)> {
        let messages = request
            .messages
            .iter()
            .map(Self::convert_message)
            .collect::<Result<Vec<_>>>()?;
        let tools = request
            .callable_specs()
            .map(Self::convert_tool)
            .collect::<Result<Vec<_>>>()?;

        let mut args = CreateChatCompletionRequestArgs::default();
        args.model(&self.model).messages(messages);
        if !tools.is_empty() {
            args.tools(tools);
        }
        if let Some(temp) = request.temperature {
            args.temperature(temp);
        }
        if let Some(max) = request.max_tokens {
            args.max_completion_tokens(max);
        }
        if let Some(schema) = &request.output_schema {
            args.response_format(Self::response_format(&request.agent, schema));
        }

        let response = self.client.chat().create(args.build()?).await?;

        let choice = response
            .choices
            .first()
            .ok_or_else(|| AgentsError::ModelBehavior {
                message: "No choices in response".to_string(),
            })?;

        // Unparseable arguments stay as a raw string so schema validation reports them
        let tool_calls = choice
            .message
            .tool_calls
            .iter()
            .flatten()
            .map(|tc| {
                let arguments = serde_json::from_str(&tc.function.arguments)
                    .unwrap_or_else(|_| Value::String(tc.function.arguments.clone()));
                ToolCall::new(tc.id.clone(), tc.function.name.clone(), arguments)
            })
            .collect();

        let model_response = ModelResponse {
            id: response.id.clone(),
            content: choice.message.content.clone(),
            tool_calls,
            finish_reason: choice.finish_reason.as_ref().map(|r| format!("{:?}", r)),
            created_at: chrono::Utc::now(),
        };

        let usage = response
            .usage
            .map(|u| Usage::new(u.prompt_tokens as usize, u.completion_tokens as usize))
            .unwrap_or_default();

        Ok((model_response, usage))
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

enum Scripted {
    Respond(ModelResponse),
    Fail(String),
}

/// Scripted model provider for tests and offline demos.
///
/// Responses are replayed in order; once the script runs out every call
/// answers `"Default response"`. Every request is recorded and can be
/// inspected with [`MockProvider::requests`].
pub struct MockProvider {
    model: String,
    script: Mutex<VecDeque<Scripted>>,
    requests: Mutex<Vec<ModelRequest>>,
    delay: Option<Duration>,
}

impl MockProvider {
    pub fn new(model: impl Into<String>) -> Self {
        Self {
            model: model.into(),
            script: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
            delay: None,
        }
    }

    fn push(self, step: Scripted) -> Self {
        self.script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push_back(step);
        self
    }

    pub fn with_response(self, response: ModelResponse) -> Self {
        self.push(Scripted::Respond(response))
    }

    pub fn with_message(self, content: impl Into<String>) -> Self {
        self.with_response(ModelResponse::new_message(content))
    }

    /// A final answer carrying a structured payload.
    pub fn with_structured(self, payload: Value) -> Self {
        self.with_message(payload.to_string())
    }

    pub fn with_tool_call(self, tool_name: impl Into<String>, args: Value) -> Self {
        let call = ToolCall::new(
            format!("call_{}", uuid::Uuid::new_v4().simple()),
            tool_name,
            args,
        );
        self.with_tool_calls(vec![call])
    }

    /// Several calls requested in a single turn.
    pub fn with_tool_calls(self, calls: Vec<ToolCall>) -> Self {
        self.with_response(ModelResponse::new_tool_calls(calls))
    }

    /// The next call fails as if the backend were unreachable.
    pub fn with_failure(self, message: impl Into<String>) -> Self {
        self.push(Scripted::Fail(message.into()))
    }

    /// Every call sleeps this long before answering.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    /// Requests received so far, oldest first.
    pub fn requests(&self) -> Vec<ModelRequest> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap_or_else(|e| e.into_inner()).len()
    }
}

#[async_trait]
impl ModelProvider for MockProvider {
    async fn complete(&self, request: ModelRequest) -> Result<(ModelResponse, Usage)> {
        self.requests
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(request);
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        let next = self
            .script
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .pop_front();
        match next {
            Some(Scripted::Respond(response)) => Ok((response, Usage::new(10, 5))),
            Some(Scripted::Fail(message)) => Err(AgentsError::BackendFailure { message }),
            None => Ok((
                ModelResponse::new_message("Default response"),
                Usage::new(10, 5),
            )),
        }
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn request() -> ModelRequest {
        ModelRequest {
            agent: "Triage Agent".into(),
            messages: vec![Message::system("route"), Message::user("What is 3 times 4?")],
            tools: vec![ToolSpec {
                name: "multiply".into(),
                description: "Multiplies".into(),
                parameters: json!({"type": "object"}),
            }],
            handoffs: vec![ToolSpec {
                name: "transfer_to_math_tutor".into(),
                description: "Math".into(),
                parameters: json!({"type": "object"}),
            }],
            output_schema: None,
            temperature: None,
            max_tokens: None,
        }
    }

    #[test]
    fn test_request_helpers() {
        let req = request();
        let names: Vec<_> = req.callable_specs().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["multiply", "transfer_to_math_tutor"]);
        assert_eq!(req.last_user_message(), Some("What is 3 times 4?"));
    }

    #[test]
    fn test_message_conversion() {
        for msg in [
            Message::system("You are helpful"),
            Message::user("Hello"),
            Message::assistant("Hi there"),
            Message::assistant_with_tool_calls(
                "",
                vec![ToolCall::new("call_1", "multiply", json!({"x": 3, "y": 4}))],
            ),
            Message::tool("12", "call_1"),
        ] {
            assert!(OpenAIProvider::convert_message(&msg).is_ok());
        }
    }

    #[test]
    fn test_tool_conversion() {
        let converted = OpenAIProvider::convert_tool(&request().tools[0]).unwrap();
        assert_eq!(converted.function.name, "multiply");
        assert_eq!(converted.function.description.as_deref(), Some("Multiplies"));
    }

    #[test]
    fn test_response_format_name_is_sanitized() {
        match OpenAIProvider::response_format("Guardrail check", &json!({"type": "object"})) {
            ResponseFormat::JsonSchema { json_schema } => {
                assert_eq!(json_schema.name, "Guardrail_check_output");
            }
            _ => panic!("expected json schema format"),
        }
    }

    #[tokio::test]
    async fn test_mock_provider_replays_script() {
        let provider = MockProvider::new("mock-model")
            .with_tool_call("multiply", json!({"x": 3, "y": 4}))
            .with_message("The answer is 12")
            .with_failure("backend down");

        let (first, usage) = provider.complete(request()).await.unwrap();
        assert_eq!(first.tool_calls[0].name, "multiply");
        assert_eq!(usage.total_tokens, 15);

        let (second, _) = provider.complete(request()).await.unwrap();
        assert_eq!(second.content.as_deref(), Some("The answer is 12"));

        let err = provider.complete(request()).await.unwrap_err();
        assert!(matches!(err, AgentsError::BackendFailure { .. }));

        let (fallback, _) = provider.complete(request()).await.unwrap();
        assert_eq!(fallback.content.as_deref(), Some("Default response"));

        assert_eq!(provider.request_count(), 4);
        assert_eq!(provider.requests()[0].agent, "Triage Agent");
    }
}
