//! Agent definitions.
//!
//! An agent is immutable once built: id, display name, tool catalog and
//! system prompt. Per-request state (the transcript) never lives here, so a
//! definition is shared across requests behind an `Arc`.

use std::collections::HashMap;
use std::sync::Arc;

use relayline_core::tool::ToolRegistry;

pub const GENERAL_ASSISTANT: &str = "general-assistant";

const REACT_SYSTEM_PROMPT: &str = "\
You are a helpful assistant that solves problems step by step using the ReAct method.

Work in cycles of:
1. Thought: reason about what to do next
2. Action: pick one of the available tools
3. Observation: read the tool's result (provided to you)

Reply in exactly this format:
Thought: your reasoning
Action: the tool name
Action Input: the input for the tool

When you know the answer, reply with:
Thought: I now know the final answer
Final Answer: the answer to the original question";

pub struct AgentDefinition {
    pub id: String,
    pub name: String,
    pub description: String,
    pub tools: Arc<ToolRegistry>,
    pub system_prompt: String,
}

impl AgentDefinition {
    pub fn new(id: impl Into<String>, name: impl Into<String>, tools: Arc<ToolRegistry>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            description: String::new(),
            tools,
            system_prompt: REACT_SYSTEM_PROMPT.to_string(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = prompt.into();
        self
    }

    /// The built-in general assistant with search, calculator, clock and
    /// weather tools.
    pub fn general_assistant() -> Self {
        Self::new(
            GENERAL_ASSISTANT,
            "General Assistant",
            Arc::new(relayline_tools::default_registry()),
        )
        .with_description("Answers general questions, using tools when they help")
    }
}

impl std::fmt::Debug for AgentDefinition {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AgentDefinition")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("tools", &self.tools.names())
            .finish()
    }
}

/// Agents addressable by id.
#[derive(Debug, Default)]
pub struct AgentCatalog {
    agents: HashMap<String, Arc<AgentDefinition>>,
}

impl AgentCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Catalog holding the built-in agents.
    pub fn builtin() -> Self {
        let mut catalog = Self::new();
        catalog.register(AgentDefinition::general_assistant());
        catalog
    }

    pub fn register(&mut self, agent: AgentDefinition) {
        self.agents.insert(agent.id.clone(), Arc::new(agent));
    }

    pub fn get(&self, id: &str) -> Option<Arc<AgentDefinition>> {
        self.agents.get(id).cloned()
    }

    pub fn ids(&self) -> Vec<&str> {
        let mut ids: Vec<&str> = self.agents.keys().map(String::as_str).collect();
        ids.sort_unstable();
        ids
    }
}
