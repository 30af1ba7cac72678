//! ReAct engine: Thought → Action → Observation until a final answer.
//!
//! Each iteration renders the prompt from the agent's tool catalog and the
//! transcript so far, makes one non-streaming provider call, forwards the raw
//! turn to the caller, and parses it:
//!
//! - `Final Answer:` present: the loop finishes with that answer.
//! - a non-empty `Action:`: the tool runs and its output (or failure message)
//!   becomes the step's observation.
//! - neither: the raw turn itself is the answer.
//!
//! Hitting the iteration bound, or a provider failure, ends the loop with a
//! fallback answer synthesized from the transcript. Raw failures never reach
//! the caller.

pub mod parser;
pub mod prompt;

use std::sync::Arc;

use relayline_core::message::Message;
use relayline_core::provider::{Provider, ProviderRequest, SamplingDefaults};
use relayline_core::request::ChatRequest;
use tracing::{debug, info, warn};

use crate::catalog::AgentDefinition;
use crate::emitter::{Cancelled, EventEmitter};
use crate::transcript::Transcript;

pub const DEFAULT_MAX_ITERATIONS: u32 = 5;

/// How the loop ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactOutcome {
    /// The model produced an answer.
    Finished,
    /// The iteration bound was reached first.
    Exhausted,
    /// A provider call failed.
    Errored,
}

/// The result of a ReAct run.
#[derive(Debug)]
pub struct ReactRun {
    pub outcome: ReactOutcome,
    /// Final answer text (synthesized for `Exhausted`/`Errored`)
    pub answer: String,
    pub transcript: Transcript,
    /// Number of provider calls made.
    pub iterations: u32,
    pub tool_calls_made: usize,
}

pub struct ReactEngine {
    provider: Arc<dyn Provider>,
    agent: Arc<AgentDefinition>,
    defaults: SamplingDefaults,
    max_iterations: u32,
}

impl ReactEngine {
    pub fn new(provider: Arc<dyn Provider>, agent: Arc<AgentDefinition>, defaults: SamplingDefaults) -> Self {
        Self {
            provider,
            agent,
            defaults,
            max_iterations: DEFAULT_MAX_ITERATIONS,
        }
    }

    /// Set max iterations.
    pub fn with_max_iterations(mut self, max: u32) -> Self {
        self.max_iterations = max;
        self
    }

    /// Run the loop for one request. Raw turns are forwarded through
    /// `emitter`; the final answer is returned, not emitted.
    pub async fn run(&self, request: &ChatRequest, emitter: &EventEmitter) -> Result<ReactRun, Cancelled> {
        let question = request.message.as_str();
        let mut transcript = Transcript::new();
        let mut tool_calls_made = 0usize;

        info!(
            agent = %self.agent.id,
            stream_id = %emitter.stream_id(),
            max_iter = self.max_iterations,
            "ReAct loop starting"
        );

        for iteration in 1..=self.max_iterations {
            if emitter.is_cancelled() {
                debug!(iteration, "ReAct: caller went away before iteration");
                return Err(Cancelled);
            }
            debug!(iteration, "ReAct iteration");

            let upstream = self.build_request(request, &transcript);
            let response = tokio::select! {
                biased;
                _ = emitter.cancelled() => {
                    debug!(iteration, "ReAct: caller went away during model call");
                    return Err(Cancelled);
                }
                response = self.provider.complete(upstream) => response,
            };

            let text = match response {
                Ok(response) => response.content,
                Err(e) => {
                    warn!(iteration, error = %e, "ReAct: model call failed, synthesizing answer");
                    return Ok(self.fallback(ReactOutcome::Errored, question, transcript, iteration, tool_calls_made));
                }
            };

            emitter.chunk(text.clone()).await?;

            let turn = parser::parse_turn(&text);
            let step = transcript.begin(turn.thought.clone());

            if let Some(answer) = turn.final_answer.as_deref() {
                step.mark_final();
                info!(iterations = iteration, tool_calls = tool_calls_made, "ReAct loop completed");
                return Ok(ReactRun {
                    outcome: ReactOutcome::Finished,
                    answer: answer.to_string(),
                    transcript,
                    iterations: iteration,
                    tool_calls_made,
                });
            }

            let Some((action, input)) = turn.tool_call() else {
                step.mark_final();
                debug!(iteration, "ReAct: no action or final answer, using raw turn");
                return Ok(ReactRun {
                    outcome: ReactOutcome::Finished,
                    answer: text.trim().to_string(),
                    transcript,
                    iterations: iteration,
                    tool_calls_made,
                });
            };

            step.set_action(action, input);
            if emitter.is_cancelled() {
                return Err(Cancelled);
            }
            tool_calls_made += 1;
            let observation = self.act(action, input);
            step.observe(observation);
        }

        warn!("ReAct: max iterations reached ({})", self.max_iterations);
        Ok(self.fallback(
            ReactOutcome::Exhausted,
            question,
            transcript,
            self.max_iterations,
            tool_calls_made,
        ))
    }

    fn build_request(&self, request: &ChatRequest, transcript: &Transcript) -> ProviderRequest {
        let mut system = self.agent.system_prompt.clone();
        if let Some(extra) = request.system_prompt.as_deref().filter(|s| !s.trim().is_empty()) {
            system.push_str("\n\n");
            system.push_str(extra);
        }

        let mut messages = Vec::with_capacity(request.messages.len() + 2);
        messages.push(Message::system(system));
        // History and any knowledge context attached by augmentation.
        messages.extend(request.messages.iter().cloned());
        messages.push(Message::user(prompt::render(
            &self.agent.tools,
            transcript,
            &request.message,
        )));

        let mut upstream = ProviderRequest::from_chat(request, &self.defaults).streaming(false);
        upstream.messages = messages;
        upstream
    }

    /// Run one tool. Unknown names, failures and panics all become
    /// observation text.
    fn act(&self, action: &str, input: &str) -> String {
        let start = std::time::Instant::now();
        let result = self.agent.tools.invoke(action, input);
        let duration_ms = start.elapsed().as_millis() as u64;

        match result {
            Ok(output) => {
                debug!(tool = %action, duration_ms, "Tool executed");
                output
            }
            Err(e) => {
                warn!(tool = %action, duration_ms, error = %e, "Tool failed");
                e.to_string()
            }
        }
    }

    fn fallback(
        &self,
        outcome: ReactOutcome,
        question: &str,
        transcript: Transcript,
        iterations: u32,
        tool_calls_made: usize,
    ) -> ReactRun {
        ReactRun {
            outcome,
            answer: prompt::fallback_answer(question, &transcript),
            transcript,
            iterations,
            tool_calls_made,
        }
    }
}
