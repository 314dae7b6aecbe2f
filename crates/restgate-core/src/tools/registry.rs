use std::collections::HashMap;
use tracing::debug;

use super::ToolDefinition;

/// Tools registered against one MCP endpoint, keyed by name
///
/// Registration never rejects duplicates: a later definition with the same
/// name replaces the earlier one.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    tools: HashMap<String, ToolDefinition>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_definitions(definitions: impl IntoIterator<Item = ToolDefinition>) -> Self {
        let mut registry = Self::new();
        for definition in definitions {
            registry.register(definition);
        }
        registry
    }

    /// Register a tool, returning the definition it replaced
    pub fn register(&mut self, definition: ToolDefinition) -> Option<ToolDefinition> {
        let previous = self.tools.insert(definition.name.clone(), definition);
        if let Some(prev) = &previous {
            debug!(tool = %prev.name, "Tool definition replaced");
        }
        previous
    }

    pub fn get(&self, name: &str) -> Option<&ToolDefinition> {
        self.tools.get(name)
    }

    /// All tools, ordered by name
    pub fn list(&self) -> Vec<&ToolDefinition> {
        let mut tools: Vec<_> = self.tools.values().collect();
        tools.sort_by(|a, b| a.name.cmp(&b.name));
        tools
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}
