//! Tool trait: The abstraction over agent capabilities.
//!
//! Tools take one string (the model's `Action Input`) and return one string
//! (the `Observation`). The model picks them by name, so the registry is a
//! name-indexed catalog fixed at agent construction time.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};

use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::ToolError;

/// Catalog entry rendered into the ReAct prompt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
    /// Opaque parameter schema, shown to the model verbatim
    pub parameters: String,
}

/// The core Tool trait.
///
/// Executors are expected to be fast and local; they run synchronously
/// inside the ACT step of the loop.
pub trait Tool: Send + Sync {
    /// The unique name of this tool (e.g., "calculator").
    fn name(&self) -> &str;

    /// A description of what this tool does (sent to the LLM).
    fn description(&self) -> &str;

    /// Parameter schema describing the expected input.
    fn parameters_schema(&self) -> &str;

    /// Execute the tool with the raw action input.
    fn execute(&self, input: &str) -> Result<String, ToolError>;

    fn to_descriptor(&self) -> ToolDescriptor {
        ToolDescriptor {
            name: self.name().to_string(),
            description: self.description().to_string(),
            parameters: self.parameters_schema().to_string(),
        }
    }
}

/// A registry of available tools, listed in registration order.
pub struct ToolRegistry {
    tools: Vec<Box<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: Vec::new(),
            index: HashMap::new(),
        }
    }

    /// Register a tool. Replaces any existing tool with the same name,
    /// keeping its original position.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        match self.index.get(&name) {
            Some(&pos) => self.tools[pos] = tool,
            None => {
                self.index.insert(name, self.tools.len());
                self.tools.push(tool);
            }
        }
    }

    /// Get a tool by exact name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.index.get(name).map(|&pos| self.tools[pos].as_ref())
    }

    /// Catalog entries for the prompt.
    pub fn descriptors(&self) -> Vec<ToolDescriptor> {
        self.tools.iter().map(|t| t.to_descriptor()).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Look up and run a tool, isolating the caller from executor panics.
    pub fn invoke(&self, name: &str, input: &str) -> Result<String, ToolError> {
        let tool = self.get(name).ok_or_else(|| ToolError::NotFound(name.to_string()))?;
        match catch_unwind(AssertUnwindSafe(|| tool.execute(input))) {
            Ok(result) => result,
            Err(payload) => {
                let reason = panic_message(payload.as_ref());
                warn!(tool = %name, %reason, "Tool executor panicked");
                Err(ToolError::Panicked {
                    tool_name: name.to_string(),
                    reason,
                })
            }
        }
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct EchoTool;

    impl Tool for EchoTool {
        fn name(&self) -> &str {
            "echo"
        }
        fn description(&self) -> &str {
            "Echoes back the input"
        }
        fn parameters_schema(&self) -> &str {
            r#"{"text": "string"}"#
        }
        fn execute(&self, input: &str) -> Result<String, ToolError> {
            Ok(input.to_string())
        }
    }

    struct Exploding;

    impl Tool for Exploding {
        fn name(&self) -> &str {
            "explode"
        }
        fn description(&self) -> &str {
            "Always panics"
        }
        fn parameters_schema(&self) -> &str {
            "{}"
        }
        fn execute(&self, _input: &str) -> Result<String, ToolError> {
            panic!("boom")
        }
    }

    struct Failing;

    impl Tool for Failing {
        fn name(&self) -> &str {
            "fail"
        }
        fn description(&self) -> &str {
            "Always errors"
        }
        fn parameters_schema(&self) -> &str {
            "{}"
        }
        fn execute(&self, _input: &str) -> Result<String, ToolError> {
            Err(ToolError::ExecutionFailed {
                tool_name: "fail".into(),
                reason: "disk on fire".into(),
            })
        }
    }

    #[test]
    fn registry_register_and_lookup() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        assert!(registry.get("echo").is_some());
        assert!(registry.get("Echo").is_none());
        assert!(registry.get("nonexistent").is_none());
    }

    #[test]
    fn descriptors_keep_registration_order() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(Failing));
        registry.register(Box::new(EchoTool));
        registry.register(Box::new(Exploding));
        registry.register(Box::new(EchoTool));
        assert_eq!(registry.names(), vec!["fail", "echo", "explode"]);
        assert_eq!(registry.len(), 3);
        assert_eq!(registry.descriptors()[1].parameters, r#"{"text": "string"}"#);
    }

    #[test]
    fn invoke_missing_tool() {
        let registry = ToolRegistry::new();
        let err = registry.invoke("nonexistent", "x").unwrap_err();
        assert!(matches!(err, ToolError::NotFound(_)));
    }

    #[test]
    fn invoke_passes_input_through() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(EchoTool));
        assert_eq!(registry.invoke("echo", "hello world").unwrap(), "hello world");
    }

    #[test]
    fn executor_errors_and_panics_are_contained() {
        let mut registry = ToolRegistry::new();
        registry.register(Box::new(Failing));
        registry.register(Box::new(Exploding));

        let err = registry.invoke("fail", "").unwrap_err();
        assert!(err.to_string().contains("disk on fire"));

        let err = registry.invoke("explode", "").unwrap_err();
        assert!(matches!(err, ToolError::Panicked { .. }));
        assert!(err.to_string().contains("boom"));
    }
}
