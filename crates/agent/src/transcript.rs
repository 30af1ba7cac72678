//! Transcript: the per-request record of ReAct reasoning steps.
//!
//! Steps are append-only. Only the current (last) step is mutated, as it
//! acquires an action, its input, and later the observation. A transcript is
//! created empty for each reasoning-mode request and discarded afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One Thought/Action/Observation cycle.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReasoningStep {
    /// 1-based, strictly increasing by one
    pub index: usize,
    pub timestamp: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub thought: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action_input: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub observation: Option<String>,
    pub is_final: bool,
}

impl ReasoningStep {
    pub fn set_action(&mut self, action: impl Into<String>, input: impl Into<String>) {
        self.action = Some(action.into());
        self.action_input = Some(input.into());
    }

    pub fn observe(&mut self, observation: impl Into<String>) {
        self.observation = Some(observation.into());
    }

    pub fn mark_final(&mut self) {
        self.is_final = true;
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Transcript {
    steps: Vec<ReasoningStep>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a new step and return it for in-place updates.
    pub fn begin(&mut self, thought: Option<String>) -> &mut ReasoningStep {
        let index = self.steps.len() + 1;
        self.steps.push(ReasoningStep {
            index,
            timestamp: Utc::now(),
            thought,
            action: None,
            action_input: None,
            observation: None,
            is_final: false,
        });
        let last = self.steps.len() - 1;
        &mut self.steps[last]
    }

    pub fn current_mut(&mut self) -> Option<&mut ReasoningStep> {
        self.steps.last_mut()
    }

    pub fn steps(&self) -> &[ReasoningStep] {
        &self.steps
    }

    pub fn len(&self) -> usize {
        self.steps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.steps.is_empty()
    }

    /// Render as `Thought:` / `Action:` / `Action Input:` / `Observation:`
    /// lines, one blank line between steps.
    pub fn render(&self) -> String {
        let mut out = String::new();
        for step in &self.steps {
            if let Some(thought) = &step.thought {
                out.push_str(&format!("Thought: {thought}\n"));
            }
            if let Some(action) = &step.action {
                out.push_str(&format!("Action: {action}\n"));
                out.push_str(&format!(
                    "Action Input: {}\n",
                    step.action_input.as_deref().unwrap_or_default()
                ));
            }
            if let Some(observation) = &step.observation {
                out.push_str(&format!("Observation: {observation}\n"));
            }
            out.push('\n');
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn indices_start_at_one_and_increase() {
        let mut transcript = Transcript::new();
        transcript.begin(Some("first".into()));
        transcript.begin(None);
        transcript.begin(Some("third".into()));

        let indices: Vec<usize> = transcript.steps().iter().map(|s| s.index).collect();
        assert_eq!(indices, vec![1, 2, 3]);
    }

    #[test]
    fn current_step_is_mutated_in_place() {
        let mut transcript = Transcript::new();
        transcript.begin(Some("need math".into())).set_action("calculator", "2+2");
        transcript.current_mut().unwrap().observe("4");

        let step = &transcript.steps()[0];
        assert_eq!(step.action.as_deref(), Some("calculator"));
        assert_eq!(step.action_input.as_deref(), Some("2+2"));
        assert_eq!(step.observation.as_deref(), Some("4"));
        assert!(!step.is_final);
        assert_eq!(transcript.len(), 1);
    }

    #[test]
    fn render_lists_present_fields_only() {
        let mut transcript = Transcript::new();
        transcript.begin(Some("need math".into())).set_action("calculator", "2+2");
        transcript.current_mut().unwrap().observe("4");
        transcript.begin(None).observe("Tool not found: x");

        let text = transcript.render();
        assert!(text.starts_with("Thought: need math\nAction: calculator\nAction Input: 2+2\nObservation: 4\n"));
        assert!(text.contains("\nObservation: Tool not found: x\n"));
        assert_eq!(text.matches("Thought:").count(), 1);
    }

    #[test]
    fn empty_transcript_renders_nothing_but_is_empty() {
        let transcript = Transcript::new();
        assert!(transcript.is_empty());
        assert!(transcript.render().is_empty());
    }
}
