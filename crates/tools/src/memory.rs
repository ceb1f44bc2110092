//! Memory tools let the model save and recall durable facts.
//!
//! Registered only when a memory store is configured. Recall is an
//! exact-key lookup; embedding generation is not part of the tool surface.

use async_trait::async_trait;
use cclaw_memory::MemoryStore;
use serde_json::Value;
use std::path::Path;
use std::sync::Arc;

use crate::{Tool, ToolRegistry, ToolResult};

pub struct MemoryStoreTool {
    store: Arc<MemoryStore>,
}

pub struct MemoryRecallTool {
    store: Arc<MemoryStore>,
}

/// Register both memory tools against a shared store.
pub fn register_memory_tools(registry: &mut ToolRegistry, store: Arc<MemoryStore>) {
    registry.register(Box::new(MemoryStoreTool {
        store: store.clone(),
    }));
    registry.register(Box::new(MemoryRecallTool { store }));
}

#[async_trait]
impl Tool for MemoryStoreTool {
    fn name(&self) -> &str {
        "memory_store"
    }

    fn description(&self) -> &str {
        "Save a fact to persistent memory under a key."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "key": {"type": "string", "description": "Unique key for this memory"},
                "value": {"type": "string", "description": "The fact to remember"}
            },
            "required": ["key", "value"]
        })
    }

    async fn execute(&self, input: &Value, _workspace: &Path) -> ToolResult {
        let (Some(key), Some(value)) = (input["key"].as_str(), input["value"].as_str()) else {
            return ToolResult::error("Error: missing 'key' or 'value'");
        };

        if self.store.store(key, value, None).await {
            ToolResult::ok(format!("Stored '{key}'"))
        } else {
            ToolResult::error(format!("Error: failed to store '{key}'"))
        }
    }
}

#[async_trait]
impl Tool for MemoryRecallTool {
    fn name(&self) -> &str {
        "memory_recall"
    }

    fn description(&self) -> &str {
        "Recall a fact from persistent memory by key."
    }

    fn input_schema(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "key": {"type": "string", "description": "Key to look up"}
            },
            "required": ["key"]
        })
    }

    async fn execute(&self, input: &Value, _workspace: &Path) -> ToolResult {
        let Some(key) = input["key"].as_str() else {
            return ToolResult::error("Error: missing 'key'");
        };

        match self.store.get(key).await {
            Some(value) => ToolResult::ok(value),
            None => ToolResult::ok(format!("No memory stored for '{key}'")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::default_registry;

    async fn registry_with_memory() -> ToolRegistry {
        let store = Arc::new(MemoryStore::open(":memory:").await.unwrap());
        let mut registry = default_registry();
        register_memory_tools(&mut registry, store);
        registry
    }

    #[tokio::test]
    async fn store_then_recall_roundtrip() {
        let registry = registry_with_memory().await;
        let ws = Path::new("/tmp");

        let stored = registry
            .execute("memory_store", r#"{"key":"color","value":"blue"}"#, ws)
            .await;
        assert!(stored.success);

        let recalled = registry
            .execute("memory_recall", r#"{"key":"color"}"#, ws)
            .await;
        assert!(recalled.success);
        assert_eq!(recalled.output, "blue");
    }

    #[tokio::test]
    async fn recall_of_unknown_key_is_not_an_error() {
        let registry = registry_with_memory().await;
        let result = registry
            .execute("memory_recall", r#"{"key":"nothing"}"#, Path::new("/tmp"))
            .await;
        assert!(result.success);
        assert!(result.output.contains("No memory stored"));
    }

    #[tokio::test]
    async fn memory_tools_appear_in_definitions() {
        let registry = registry_with_memory().await;
        let defs: Value = serde_json::from_str(&registry.definitions_json()).unwrap();
        let names: Vec<&str> = defs
            .as_array()
            .unwrap()
            .iter()
            .map(|d| d["name"].as_str().unwrap())
            .collect();
        assert!(names.contains(&"memory_store"));
        assert!(names.contains(&"memory_recall"));
    }
}
