//! Tool contract and registry.
//!
//! A tool is a named, host-supplied executable unit invoked with a loose
//! JSON argument bag. The [`Tool`] trait is object safe so heterogeneous
//! tools live together in one [`ToolRegistry`]; the engine resolves them by
//! name and invokes them only after the policy chain approves.

mod registry;

pub use registry::ToolRegistry;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde_json::Value;

use crate::chain::LedgerError;
use crate::engine::ToolContext;
use crate::tx::TxError;

/// Errors that can occur during tool execution.
#[derive(Debug, thiserror::Error)]
#[non_exhaustive]
pub enum ToolError {
    /// The argument bag did not have the shape the tool expects.
    #[error("invalid arguments: {0}")]
    InvalidArgs(String),

    /// A remote ledger operation performed by the tool failed.
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    /// A transaction build or broadcast performed by the tool failed.
    #[error(transparent)]
    Tx(#[from] TxError),

    /// JSON de/serialization failure.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Any other error raised by the tool body.
    #[error("{0}")]
    Execution(Box<dyn std::error::Error + Send + Sync>),
}

impl ToolError {
    /// Create an [`ToolError::InvalidArgs`] error.
    #[must_use]
    pub fn invalid_args(msg: impl Into<String>) -> Self {
        Self::InvalidArgs(msg.into())
    }

    /// Wrap an arbitrary error raised by the tool body.
    #[must_use]
    pub fn execution(err: impl Into<Box<dyn std::error::Error + Send + Sync>>) -> Self {
        Self::Execution(err.into())
    }
}

/// Declarative description of a tool, suitable for presenting to an agent.
///
/// `parameters` is a JSON-schema-shaped object describing the argument bag.
#[derive(Debug, Clone, Serialize)]
pub struct ToolDefinition {
    /// Unique tool name.
    pub name: String,
    /// Human/agent-readable description of what the tool does.
    pub description: String,
    /// JSON schema of the accepted arguments.
    pub parameters: Value,
}

impl ToolDefinition {
    /// Create a definition.
    #[must_use]
    pub fn new(name: impl Into<String>, description: impl Into<String>, parameters: Value) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters,
        }
    }
}

/// A named executable unit invoked by the engine.
#[async_trait]
pub trait Tool: Send + Sync {
    /// The unique name this tool is registered under.
    fn name(&self) -> &str;

    /// One-line description of the tool.
    fn description(&self) -> String;

    /// Full definition including the argument schema.
    fn definition(&self) -> ToolDefinition;

    /// Execute the tool with a loose JSON argument bag.
    async fn call(&self, ctx: &ToolContext, args: Value) -> Result<Value, ToolError>;
}

/// Shared handle to a registered tool.
pub type BoxedTool = Arc<dyn Tool>;
