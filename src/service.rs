//! Tower-based tool execution primitives and layers.
//!
//! The runner never calls [`Tool::execute`] directly. Each call goes through
//! a small service stack built by [`build_tool_stack`]:
//!
//! ```text
//! CancelLayer -> TimeoutLayer (optional) -> InputSchemaLayer -> BaseToolService
//! ```
//!
//! Errors leave the stack as [`BoxError`]s wrapping an [`AgentsError`];
//! [`into_agents_error`] recovers the typed error at the runner boundary.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use serde_json::Value;
use tokio::time::timeout;
use tower::{util::BoxService, BoxError, Layer, Service, ServiceBuilder};
use tracing::Instrument;

use crate::context::RunContext;
use crate::error::AgentsError;
use crate::schema::validate_arguments;
use crate::tool::{Tool, ToolResult};

type BoxFut<T> = Pin<Box<dyn Future<Output = Result<T, BoxError>> + Send>>;

/// Request passed into the tool service stack.
#[derive(Debug, Clone)]
pub struct ToolRequest {
    pub ctx: RunContext,
    pub agent: String,
    pub tool_call_id: String,
    pub tool_name: String,
    pub arguments: Value,
}

/// Response from the tool service stack.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolResponse {
    pub tool_call_id: String,
    pub output: String,
    pub error: Option<String>,
}

impl ToolResponse {
    fn from_result(tool_call_id: String, result: ToolResult) -> Self {
        Self {
            tool_call_id,
            output: result.output,
            error: result.error,
        }
    }

    /// An error observation for `tool_call_id`.
    pub fn error(tool_call_id: impl Into<String>, message: impl Into<String>) -> Self {
        Self::from_result(tool_call_id.into(), ToolResult::error(message))
    }
}

/// Boxed service type the runner drives one call through.
pub type ToolBoxService = BoxService<ToolRequest, ToolResponse, BoxError>;

/// Base tool executor adapting `dyn Tool` to a Tower Service.
#[derive(Clone)]
pub struct BaseToolService {
    tool: Arc<dyn Tool>,
}

impl BaseToolService {
    pub fn new(tool: Arc<dyn Tool>) -> Self {
        Self { tool }
    }
}

impl Service<ToolRequest> for BaseToolService {
    type Response = ToolResponse;
    type Error = BoxError;
    type Future = BoxFut<ToolResponse>;

    fn poll_ready(&mut self, _cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        Poll::Ready(Ok(()))
    }

    fn call(&mut self, req: ToolRequest) -> Self::Future {
        let tool = self.tool.clone();
        let span = tracing::info_span!(
            "tool",
            tool = %req.tool_name,
            agent = %req.agent,
            tool_call_id = %req.tool_call_id,
            depth = req.ctx.depth(),
        );
        Box::pin(
            async move {
                let result = tool.execute(&req.ctx, req.arguments).await?;
                if let Some(err) = &result.error {
                    tracing::warn!(error = %err, "tool returned an error observation");
                }
                Ok(ToolResponse::from_result(req.tool_call_id, result))
            }
            .instrument(span),
        )
    }
}

/// Input schema validation layer. Arguments that do not satisfy the schema
/// fail with [`AgentsError::InvalidToolCall`] before the tool runs.
#[derive(Clone, Debug)]
pub struct InputSchemaLayer {
    schema: Value,
}

impl InputSchemaLayer {
    pub fn new(schema: Value) -> Self {
        Self { schema }
    }
}

#[derive(Clone, Debug)]
pub struct InputSchemaService<S> {
    inner: S,
    schema: Value,
}

impl<S> Layer<S> for InputSchemaLayer {
    type Service = InputSchemaService<S>;
    fn layer(&self, inner: S) -> Self::Service {
        InputSchemaService {
            inner,
            schema: self.schema.clone(),
        }
    }
}

impl<S> Service<ToolRequest> for InputSchemaService<S>
where
    S: Service<ToolRequest, Response = ToolResponse, Error = BoxError> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = ToolResponse;
    type Error = BoxError;
    type Future = BoxFut<ToolResponse>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: ToolRequest) -> Self::Future {
        if let Err(message) = validate_arguments(&self.schema, &req.arguments) {
            let err = AgentsError::InvalidToolCall {
                tool: req.tool_name,
                message,
            };
            return Box::pin(async move { Err::<ToolResponse, BoxError>(err.into()) });
        }
        let mut inner = self.inner.clone();
        Box::pin(async move { inner.call(req).await })
    }
}

/// Timeout layer: a tool that overruns becomes an error observation.
#[derive(Clone, Copy, Debug)]
pub struct TimeoutLayer {
    duration: Duration,
}

impl TimeoutLayer {
    pub fn secs(secs: u64) -> Self {
        Self::from_duration(Duration::from_secs(secs))
    }
    pub fn from_duration(duration: Duration) -> Self {
        Self { duration }
    }
}

#[derive(Clone, Debug)]
pub struct TimeoutService<S> {
    inner: S,
    duration: Duration,
}

impl<S> Layer<S> for TimeoutLayer {
    type Service = TimeoutService<S>;
    fn layer(&self, inner: S) -> Self::Service {
        TimeoutService {
            inner,
            duration: self.duration,
        }
    }
}

impl<S> Service<ToolRequest> for TimeoutService<S>
where
    S: Service<ToolRequest, Response = ToolResponse, Error = BoxError> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = ToolResponse;
    type Error = BoxError;
    type Future = BoxFut<ToolResponse>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: ToolRequest) -> Self::Future {
        let mut inner = self.inner.clone();
        let d = self.duration;
        let tool_call_id = req.tool_call_id.clone();
        let tool_name = req.tool_name.clone();
        Box::pin(async move {
            match timeout(d, inner.call(req)).await {
                Ok(res) => res,
                Err(_elapsed) => {
                    tracing::warn!(tool = %tool_name, timeout_ms = d.as_millis() as u64, "tool timed out");
                    Ok(ToolResponse::error(
                        tool_call_id,
                        format!("tool '{}' timed out after {:?}", tool_name, d),
                    ))
                }
            }
        })
    }
}

/// Cancellation layer: races the call against the run's cancellation token.
#[derive(Clone, Copy, Debug, Default)]
pub struct CancelLayer;

#[derive(Clone, Debug)]
pub struct CancelService<S> {
    inner: S,
}

impl<S> Layer<S> for CancelLayer {
    type Service = CancelService<S>;
    fn layer(&self, inner: S) -> Self::Service {
        CancelService { inner }
    }
}

impl<S> Service<ToolRequest> for CancelService<S>
where
    S: Service<ToolRequest, Response = ToolResponse, Error = BoxError> + Clone + Send + 'static,
    S::Future: Send + 'static,
{
    type Response = ToolResponse;
    type Error = BoxError;
    type Future = BoxFut<ToolResponse>;

    fn poll_ready(&mut self, cx: &mut Context<'_>) -> Poll<Result<(), Self::Error>> {
        self.inner.poll_ready(cx)
    }

    fn call(&mut self, req: ToolRequest) -> Self::Future {
        let mut inner = self.inner.clone();
        let token = req.ctx.cancellation_token().clone();
        Box::pin(async move {
            tokio::select! {
                biased;
                _ = token.cancelled() => Err(AgentsError::Cancelled.into()),
                res = inner.call(req) => res,
            }
        })
    }
}

/// Build the service stack for one tool.
pub fn build_tool_stack(tool: Arc<dyn Tool>, tool_timeout: Option<Duration>) -> ToolBoxService {
    let schema = tool.parameters_schema();
    let base = BaseToolService::new(tool);
    let svc = ServiceBuilder::new()
        .layer(CancelLayer)
        .option_layer(tool_timeout.map(TimeoutLayer::from_duration))
        .layer(InputSchemaLayer::new(schema))
        .service(base);
    BoxService::new(svc)
}

/// Recover the typed error from a tool-stack error.
pub fn into_agents_error(err: BoxError, tool: &str) -> AgentsError {
    match err.downcast::<AgentsError>() {
        Ok(err) => *err,
        Err(other) => AgentsError::ToolExecution {
            tool: tool.to_string(),
            message: other.to_string(),
        },
    }
}
