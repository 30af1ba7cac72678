//! Per-iteration prompt and fallback answer rendering.

use relayline_core::tool::ToolRegistry;

use crate::transcript::Transcript;

const CONTINUE_INSTRUCTION: &str = "Based on the question and the reasoning so far, continue with the next Thought and Action, or conclude with \"Final Answer:\" followed by the answer.";

const BEST_EFFORT_NOTE: &str = "Note: this is a best-effort answer; the reasoning loop stopped before reaching a final answer because of its iteration limit.";

/// Tool catalog, transcript so far, the original question, then the
/// instruction to continue or conclude.
pub fn render(tools: &ToolRegistry, transcript: &Transcript, question: &str) -> String {
    let mut prompt = String::from("Available tools:\n");
    for tool in tools.descriptors() {
        prompt.push_str(&format!(
            "- {}: {}\n  Parameters: {}\n",
            tool.name, tool.description, tool.parameters
        ));
    }
    prompt.push('\n');

    if !transcript.is_empty() {
        prompt.push_str("Reasoning so far:\n");
        prompt.push_str(&transcript.render());
    }

    prompt.push_str(&format!("Question: {question}\n\n"));
    prompt.push_str(CONTINUE_INSTRUCTION);
    prompt
}

/// Answer assembled from the transcript when the loop ends without one.
pub fn fallback_answer(question: &str, transcript: &Transcript) -> String {
    let mut answer = String::from("Here is my best answer based on the analysis so far.\n\n");
    answer.push_str(&format!("Question: {question}\n\nAnalysis:\n"));

    for step in transcript.steps() {
        if let Some(thought) = &step.thought {
            answer.push_str(&format!("Thought: {thought}\n"));
        }
        if let Some(action) = &step.action {
            answer.push_str(&format!("Action: {action}\n"));
            answer.push_str(&format!(
                "Action Input: {}\n",
                step.action_input.as_deref().unwrap_or_default()
            ));
        }
        if let Some(observation) = &step.observation {
            answer.push_str(&format!("Observation: {observation}\n"));
        }
        answer.push('\n');
    }

    answer.push_str(BEST_EFFORT_NOTE);
    answer
}
