//! Evidence Tool Trait
//!
//! Defines the core-layer abstraction for evidence lookups:
//!
//! - `EvidenceTool` - Identity, schema, and the read-only lookup operation
//! - `EvidenceRegistry` - O(1) lookup registry with ordered iteration
//!
//! Evidence tools are pure lookups against logs, migration history,
//! documentation, past resolutions, health status, or ticket content. They
//! take a single string argument (an event id, merchant id, service name, or
//! free-text query) and return a string payload. Underlying store failures
//! are converted to sentinel strings at the provider boundary, so a `lookup`
//! error here means the provider itself misbehaved, not that evidence was
//! missing.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;

use crate::error::{CoreError, CoreResult};

/// A read-only evidence lookup.
#[async_trait]
pub trait EvidenceTool: Send + Sync {
    /// Unique name of this tool (e.g., "fetch_granular_logs").
    fn name(&self) -> &str;

    /// Human-readable description, surfaced to the reasoning model.
    fn description(&self) -> &str;

    /// JSON schema describing the single string argument.
    ///
    /// Should conform to JSON Schema draft-07. Example:
    /// ```json
    /// {
    ///   "type": "object",
    ///   "properties": {
    ///     "event_id": { "type": "string", "description": "Event to look up" }
    ///   },
    ///   "required": ["event_id"]
    /// }
    /// ```
    fn parameters_schema(&self) -> Value;

    /// Name of the single string argument in `parameters_schema`.
    fn argument_name(&self) -> &str;

    /// Perform the lookup.
    ///
    /// Returns either a JSON-shaped evidence document or a human-readable
    /// "not found"/"unavailable" sentinel string.
    async fn lookup(&self, argument: &str) -> CoreResult<String>;
}

/// Registry of `EvidenceTool` implementations.
///
/// Provides O(1) lookup by name and deterministic, insertion-ordered
/// iteration. Registration rejects duplicate names: the evidence layer has
/// historically grown conflicting implementations of the same tool name, and
/// silently shadowing one with another is how those conflicts go unnoticed.
pub struct EvidenceRegistry {
    tools: HashMap<String, Arc<dyn EvidenceTool>>,
    /// Insertion order for deterministic iteration.
    order: Vec<String>,
}

impl EvidenceRegistry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            order: Vec::new(),
        }
    }

    /// Register a tool. Fails fast on a duplicate name.
    pub fn register(&mut self, tool: Arc<dyn EvidenceTool>) -> CoreResult<()> {
        let name = tool.name().to_string();
        if self.tools.contains_key(&name) {
            return Err(CoreError::validation(format!(
                "Duplicate tool registration: {}",
                name
            )));
        }
        self.order.push(name.clone());
        self.tools.insert(name, tool);
        Ok(())
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn EvidenceTool>> {
        self.tools.get(name).cloned()
    }

    /// Check if a tool is registered.
    pub fn contains(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Get all tool names in registration order.
    pub fn names(&self) -> Vec<String> {
        self.order.clone()
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Whether the registry is empty.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for EvidenceRegistry {
    fn default() -> Self {
        Self::new()
    }
}
