//! Incremental decoder for OpenAI-style server-sent event bodies.
//!
//! Bytes arrive in arbitrary pieces. The decoder splits them into lines,
//! collects the payload of every `data:` line into a JSON buffer, and only
//! parses once the buffer holds a complete object, so a single JSON object
//! may span several wire lines.

use relayline_core::ProviderError;
use serde::Deserialize;

/// End-of-stream sentinel sent as `data: [DONE]`.
pub const DONE_SENTINEL: &str = "[DONE]";

/// A decoded wire event.
#[derive(Debug, Clone, PartialEq)]
pub enum SseEvent {
    /// A non-empty content delta
    Delta(String),
    /// `choices[0].finish_reason` was populated
    Finish {
        reason: String,
        total_tokens: Option<u32>,
    },
    /// The literal `[DONE]` sentinel
    Done,
}

#[derive(Debug, Default)]
pub struct SseDecoder {
    line: Vec<u8>,
    json: String,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Feed raw body bytes, returning every event completed by them.
    pub fn feed(&mut self, bytes: &[u8]) -> Result<Vec<SseEvent>, ProviderError> {
        let mut events = Vec::new();
        for &byte in bytes {
            if byte == b'\n' {
                let line = std::mem::take(&mut self.line);
                self.process_line(&line, &mut events)?;
            } else {
                self.line.push(byte);
            }
        }
        Ok(events)
    }

    /// Flush a trailing unterminated line at end of body.
    ///
    /// A JSON fragment still buffered at this point can never complete.
    pub fn finish(&mut self) -> Result<Vec<SseEvent>, ProviderError> {
        let mut events = Vec::new();
        if !self.line.is_empty() {
            let line = std::mem::take(&mut self.line);
            self.process_line(&line, &mut events)?;
        }
        if !self.json.trim().is_empty() {
            return Err(ProviderError::Parse(format!(
                "stream ended inside a JSON fragment: {}",
                preview(&self.json)
            )));
        }
        Ok(events)
    }

    fn process_line(&mut self, raw: &[u8], events: &mut Vec<SseEvent>) -> Result<(), ProviderError> {
        let line = String::from_utf8_lossy(raw);
        let line = line.trim_end_matches('\r');

        // Blank separators, comments, and non-data fields carry nothing for us.
        if line.is_empty() || line.starts_with(':') {
            return Ok(());
        }
        let Some(data) = line.strip_prefix("data:") else {
            return Ok(());
        };
        let data = data.strip_prefix(' ').unwrap_or(data);

        if self.json.is_empty() && data.trim() == DONE_SENTINEL {
            events.push(SseEvent::Done);
            return Ok(());
        }

        self.json.push_str(data);
        match serde_json::from_str::<StreamResponse>(&self.json) {
            Ok(resp) => {
                self.json.clear();
                events.extend(resp.into_events());
                Ok(())
            }
            Err(e) if e.is_eof() => Ok(()),
            Err(e) => Err(ProviderError::Parse(format!(
                "{e} in fragment {}",
                preview(&self.json)
            ))),
        }
    }
}

fn preview(s: &str) -> String {
    const MAX: usize = 120;
    if s.chars().count() <= MAX {
        s.to_string()
    } else {
        let head: String = s.chars().take(MAX).collect();
        format!("{head}...")
    }
}

// --- Streaming SSE types ---

/// A single SSE `data: {...}` object from a streaming response.
#[derive(Debug, Deserialize)]
struct StreamResponse {
    #[serde(default)]
    choices: Vec<StreamChoice>,
    #[serde(default)]
    usage: Option<StreamUsage>,
}

#[derive(Debug, Deserialize)]
struct StreamChoice {
    #[serde(default)]
    delta: Option<StreamDelta>,
    #[serde(default)]
    finish_reason: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamDelta {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct StreamUsage {
    total_tokens: u32,
}

impl StreamResponse {
    fn into_events(self) -> Vec<SseEvent> {
        let total_tokens = self.usage.map(|u| u.total_tokens);
        let Some(choice) = self.choices.into_iter().next() else {
            return Vec::new();
        };

        let mut events = Vec::with_capacity(2);
        if let Some(content) = choice.delta.and_then(|d| d.content).filter(|c| !c.is_empty()) {
            events.push(SseEvent::Delta(content));
        }
        if let Some(reason) = choice.finish_reason.filter(|r| !r.is_empty()) {
            events.push(SseEvent::Finish { reason, total_tokens });
        }
        events
    }
}
