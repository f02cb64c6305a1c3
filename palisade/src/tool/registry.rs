//! In-memory name → tool mapping, safe for concurrent use.

use std::collections::HashMap;
use std::sync::RwLock;

use tracing::debug;

use super::BoxedTool;
use crate::error::{Error, Result};

/// Concurrent registry of tools keyed by their unique name.
#[derive(Default)]
pub struct ToolRegistry {
    tools: RwLock<HashMap<String, BoxedTool>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

impl ToolRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a tool under its own name.
    ///
    /// Duplicate registration is rejected with [`Error::DuplicateTool`].
    pub fn register(&self, tool: BoxedTool) -> Result<()> {
        let name = tool.name().to_owned();
        let mut tools = self.tools.write().expect("poisoned lock");
        if tools.contains_key(&name) {
            return Err(Error::DuplicateTool(name));
        }
        debug!(tool = %name, "tool registered");
        tools.insert(name, tool);
        Ok(())
    }

    /// Look up a tool by name.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<BoxedTool> {
        self.tools
            .read()
            .expect("poisoned lock")
            .get(name)
            .cloned()
    }

    /// Names of all registered tools, in no particular order.
    #[must_use]
    pub fn names(&self) -> Vec<String> {
        self.tools
            .read()
            .expect("poisoned lock")
            .keys()
            .cloned()
            .collect()
    }
}
