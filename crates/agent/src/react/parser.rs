//! Marker parsing for raw model turns.
//!
//! Matching is exact-substring and case-sensitive:
//! - `Final Answer:` anywhere ends the loop; the answer is the text between
//!   the first occurrence and the next one (or end of text), trimmed. An
//!   empty answer does not count.
//! - `Thought: `, `Action: ` and `Action Input: ` take the text after the
//!   marker up to the next newline (or end of text), trimmed.

pub const FINAL_ANSWER: &str = "Final Answer:";
pub const THOUGHT: &str = "Thought: ";
pub const ACTION: &str = "Action: ";
pub const ACTION_INPUT: &str = "Action Input: ";

/// What one model turn asked for.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedTurn {
    pub thought: Option<String>,
    pub action: Option<String>,
    pub action_input: Option<String>,
    pub final_answer: Option<String>,
}

impl ParsedTurn {
    /// The requested tool call, if the action name is non-empty.
    pub fn tool_call(&self) -> Option<(&str, &str)> {
        let action = self.action.as_deref().filter(|a| !a.is_empty())?;
        Some((action, self.action_input.as_deref().unwrap_or_default()))
    }
}

pub fn parse_turn(text: &str) -> ParsedTurn {
    ParsedTurn {
        thought: line_value(text, THOUGHT),
        action: line_value(text, ACTION),
        action_input: line_value(text, ACTION_INPUT),
        final_answer: final_answer(text),
    }
}

pub fn final_answer(text: &str) -> Option<String> {
    let at = text.find(FINAL_ANSWER)?;
    let rest = &text[at + FINAL_ANSWER.len()..];
    let end = rest.find(FINAL_ANSWER).unwrap_or(rest.len());
    let answer = rest[..end].trim();
    (!answer.is_empty()).then(|| answer.to_string())
}

fn line_value(text: &str, marker: &str) -> Option<String> {
    let at = text.find(marker)?;
    Some(rest_of_line(&text[at + marker.len()..]))
}

fn rest_of_line(s: &str) -> String {
    let end = s.find('\n').unwrap_or(s.len());
    s[..end].trim().to_string()
}
