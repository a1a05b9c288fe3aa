//! Tool system for agents
//!
//! Tools are how agents act. Every tool advertises a [`ToolSpec`] to the
//! reasoning backend and, when called, turns JSON arguments into a textual
//! observation. [`FunctionTool`] binds a Rust function; agents themselves
//! become tools through [`Agent::as_tool`](crate::agent::Agent::as_tool).

use std::fmt::Debug;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_trait::async_trait;
use futures::future::BoxFuture;
use futures::FutureExt;
use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::context::RunContext;
use crate::error::{AgentsError, Result};
use crate::schema::validate_arguments;

/// Prefix of every observation produced from a failed tool.
pub const TOOL_ERROR_MARKER: &str = "Error:";

/// What a tool advertises to the reasoning backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// JSON schema of the arguments object.
    pub parameters: Value,
}

/// Result from a tool execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// The observation fed back to the calling agent
    pub output: String,
    /// Set when the tool failed and `output` carries the error marker
    pub error: Option<String>,
}

impl ToolResult {
    pub fn success(output: impl Into<String>) -> Self {
        Self {
            output: output.into(),
            error: None,
        }
    }

    /// An absorbed failure: the message is kept verbatim in `error` and the
    /// observation starts with [`TOOL_ERROR_MARKER`].
    pub fn error(message: impl Into<String>) -> Self {
        let message = message.into();
        Self {
            output: format!("{} {}", TOOL_ERROR_MARKER, message),
            error: Some(message),
        }
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Trait for all tools that can be used by agents
#[async_trait]
pub trait Tool: Send + Sync + Debug {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// JSON schema for the tool's arguments object
    fn parameters_schema(&self) -> Value;

    fn describe(&self) -> ToolSpec {
        ToolSpec {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema(),
        }
    }

    /// Execute the tool. Arguments have already been validated against
    /// [`Tool::parameters_schema`] when called through the runner.
    async fn execute(&self, ctx: &RunContext, arguments: Value) -> Result<ToolResult>;

    /// The agent this tool runs, for tools created by
    /// [`Agent::as_tool`](crate::agent::Agent::as_tool).
    fn wrapped_agent(&self) -> Option<&Arc<crate::agent::Agent>> {
        None
    }
}

/// What a [`FunctionTool`] does when its function fails or panics.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ToolErrorPolicy {
    /// Convert the failure into an `"Error: ..."` observation.
    #[default]
    Absorb,
    /// Return [`AgentsError::ToolExecution`], aborting the run.
    Propagate,
}

type ToolFn = dyn Fn(RunContext, Value) -> BoxFuture<'static, Result<Value>> + Send + Sync;

/// A function-based tool
#[derive(Clone)]
pub struct FunctionTool {
    name: String,
    description: String,
    parameters_schema: Value,
    policy: ToolErrorPolicy,
    function: Arc<ToolFn>,
}

impl std::fmt::Debug for FunctionTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FunctionTool")
            .field("name", &self.name)
            .field("description", &self.description)
            .field("parameters_schema", &self.parameters_schema)
            .field("policy", &self.policy)
            .finish()
    }
}

impl FunctionTool {
    /// Create a tool from a synchronous JSON function
    pub fn new<F>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters_schema: Value,
        function: F,
    ) -> Self
    where
        F: Fn(Value) -> Result<Value> + Send + Sync + 'static,
    {
        let function = Arc::new(function);
        Self::from_fn(name, description, parameters_schema, move |_ctx, args| {
            let function = function.clone();
            async move { function(args) }
        })
    }

    /// Create a tool from an async JSON function, e.g. one doing network I/O
    pub fn new_async<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters_schema: Value,
        function: F,
    ) -> Self
    where
        F: Fn(Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        Self::from_fn(name, description, parameters_schema, move |_ctx, args| {
            function(args)
        })
    }

    /// Create a tool whose function also sees the run context
    pub fn with_context<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters_schema: Value,
        function: F,
    ) -> Self
    where
        F: Fn(RunContext, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        Self::from_fn(name, description, parameters_schema, function)
    }

    /// Create a function tool with a simple string-to-string function
    pub fn simple<F>(name: &str, description: &str, function: F) -> Self
    where
        F: Fn(String) -> String + Send + Sync + 'static,
    {
        Self::new(
            name,
            description,
            serde_json::json!({
                "type": "object",
                "properties": {
                    "input": {
                        "type": "string",
                        "description": "Input to the function"
                    }
                },
                "required": ["input"]
            }),
            move |args| {
                let input = args
                    .get("input")
                    .and_then(|v| v.as_str())
                    .unwrap_or_default()
                    .to_string();
                Ok(Value::String(function(input)))
            },
        )
    }

    /// Create a tool from a typed handler. The parameter schema is derived
    /// from `A` with schemars.
    pub fn typed<A, R, F, Fut>(name: &str, description: &str, handler: F) -> Self
    where
        A: DeserializeOwned + JsonSchema + Send + 'static,
        R: Serialize + Send + 'static,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R>> + Send + 'static,
    {
        let schema = schemars::schema_for!(A);
        let parameters = serde_json::to_value(schema.schema)
            .unwrap_or_else(|_| serde_json::json!({"type": "object"}));
        let handler = Arc::new(handler);
        let tool_name = name.to_string();
        Self::from_fn(name, description, parameters, move |_ctx, raw| {
            let handler = handler.clone();
            let tool_name = tool_name.clone();
            async move {
                let args: A =
                    serde_json::from_value(raw).map_err(|e| AgentsError::InvalidToolCall {
                        tool: tool_name,
                        message: e.to_string(),
                    })?;
                let out = handler(args).await?;
                Ok(serde_json::to_value(out)?)
            }
        })
    }

    fn from_fn<F, Fut>(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters_schema: Value,
        function: F,
    ) -> Self
    where
        F: Fn(RunContext, Value) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<Value>> + Send + 'static,
    {
        Self {
            name: name.into(),
            description: description.into(),
            parameters_schema,
            policy: ToolErrorPolicy::default(),
            function: Arc::new(move |ctx, args| function(ctx, args).boxed()),
        }
    }

    pub fn with_error_policy(mut self, policy: ToolErrorPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn error_policy(&self) -> ToolErrorPolicy {
        self.policy
    }

    /// Validate `arguments` against the declared schema, then execute.
    ///
    /// Use this when calling a tool outside the runner, which validates
    /// through its own tool stack.
    pub async fn invoke(&self, ctx: &RunContext, arguments: Value) -> Result<ToolResult> {
        validate_arguments(&self.parameters_schema, &arguments).map_err(|message| {
            AgentsError::InvalidToolCall {
                tool: self.name.clone(),
                message,
            }
        })?;
        self.execute(ctx, arguments).await
    }

    fn failure(&self, message: String) -> Result<ToolResult> {
        match self.policy {
            ToolErrorPolicy::Absorb => Ok(ToolResult::error(message)),
            ToolErrorPolicy::Propagate => Err(AgentsError::ToolExecution {
                tool: self.name.clone(),
                message,
            }),
        }
    }
}

#[async_trait]
impl Tool for FunctionTool {
    fn name(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn parameters_schema(&self) -> Value {
        self.parameters_schema.clone()
    }

    async fn execute(&self, ctx: &RunContext, arguments: Value) -> Result<ToolResult> {
        let call = (self.function)(ctx.clone(), arguments);
        match AssertUnwindSafe(call).catch_unwind().await {
            Ok(Ok(value)) => Ok(ToolResult::success(value_to_text(value))),
            Ok(Err(err)) if err.is_fatal() || matches!(err, AgentsError::InvalidToolCall { .. }) => {
                Err(err)
            }
            Ok(Err(err)) => self.failure(err.to_string()),
            Err(panic) => self.failure(format!("tool panicked: {}", panic_message(&*panic))),
        }
    }
}

/// Strings pass through unquoted; everything else is rendered as JSON.
pub(crate) fn value_to_text(value: Value) -> String {
    match value {
        Value::String(s) => s,
        other => other.to_string(),
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

/// Macro to create a function tool from a string-to-string function
#[macro_export]
macro_rules! function_tool {
    ($name:expr, $description:expr, $func:expr) => {
        $crate::tool::FunctionTool::simple($name, $description, $func)
    };
}
