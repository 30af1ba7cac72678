//! End-to-end tests for the Relayline pipeline.
//!
//! These drive a request from `ChatRequest` to framed `StreamEvent`s through
//! the real HTTP connector and knowledge client, against a local mock
//! upstream.

use std::sync::Arc;
use std::time::Duration;

use relayline_agent::StreamMultiplexer;
use relayline_config::AppConfig;
use relayline_core::event::{ANSWER_START, StreamEvent, THINKING_END, THINKING_START};
use relayline_core::{ChatRequest, KnowledgeConfig, estimate_tokens};
use relayline_providers::{HttpKnowledgeSearch, OpenAiCompatProvider};
use serde_json::json;
use wiremock::matchers::{body_partial_json, body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ──────────────────────────────────────────────────────────────

fn config_for(server: &MockServer) -> AppConfig {
    let mut config = AppConfig::default();
    config.chat.base_url = server.uri();
    config.chat.api_key = Some("sk-test".into());
    config.knowledge.base_url = server.uri();
    config
}

fn multiplexer(config: &AppConfig) -> StreamMultiplexer {
    let provider = OpenAiCompatProvider::from_config(config).unwrap();
    StreamMultiplexer::new(Arc::new(provider), config)
}

fn completion(content: &str) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(json!({
        "model": "Qwen/Qwen3-8B",
        "choices": [{"message": {"role": "assistant", "content": content}, "finish_reason": "stop"}],
    }))
}

fn sse(body: &str) -> ResponseTemplate {
    ResponseTemplate::new(200)
        .insert_header("content-type", "text/event-stream")
        .set_body_string(body.to_string())
}

async fn collect(mux: &StreamMultiplexer, request: ChatRequest) -> Vec<StreamEvent> {
    let mut rx = mux.start(request).unwrap();
    let mut events = Vec::new();
    while let Some(event) = rx.recv().await {
        events.push(event);
    }
    events
}

fn contents(events: &[StreamEvent]) -> Vec<&str> {
    events.iter().map(|e| e.content.as_str()).collect()
}

fn assert_single_terminal_last(events: &[StreamEvent]) {
    assert_eq!(events.iter().filter(|e| e.finished).count(), 1);
    assert!(events.last().unwrap().finished);
}

// ── Passthrough ──────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_passthrough_streams_provider_content() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"stream": true})))
        .respond_with(sse(
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\n\
             data: {\"choices\":[{\"finish_reason\":\"stop\"}]}\n\n\
             data: [DONE]\n\n",
        ))
        .mount(&server)
        .await;

    let config = config_for(&server);
    let request = ChatRequest::new("hello").with_system_prompt("You are a patient, thorough assistant.");
    let events = collect(&multiplexer(&config), request).await;

    assert_eq!(contents(&events), vec!["Hi", ""]);
    assert!(!events[0].finished);
    assert_eq!(events[1].finish_reason.as_deref(), Some("stop"));
    assert_eq!(events[1].model, "Qwen/Qwen3-8B");
    // Usage is estimated from the user turn and answer, as in ReAct mode
    assert_eq!(events[1].token_usage, Some(estimate_tokens("hello", "Hi")));
    assert_single_terminal_last(&events);
}

#[tokio::test]
async fn e2e_passthrough_upstream_error_ends_with_error_terminal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
        .mount(&server)
        .await;

    let config = config_for(&server);
    let events = collect(&multiplexer(&config), ChatRequest::new("hello")).await;

    assert_eq!(events.len(), 1);
    assert_eq!(events[0].finish_reason.as_deref(), Some("error"));
    assert_single_terminal_last(&events);
}

#[tokio::test]
async fn e2e_passthrough_truncated_body_ends_with_error_terminal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(sse("data: {\"choices\":[{\"delta\":{\"content\":\"Hal\"}}]}\n\n"))
        .mount(&server)
        .await;

    let config = config_for(&server);
    let events = collect(&multiplexer(&config), ChatRequest::new("hello")).await;

    assert_eq!(contents(&events), vec!["Hal", ""]);
    assert_eq!(events[1].finish_reason.as_deref(), Some("error"));
}

// ── ReAct ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_react_calculator_round_trip() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("Observation: 4"))
        .respond_with(completion("Thought: I now know the final answer\nFinal Answer: 4"))
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_partial_json(json!({"stream": false})))
        .respond_with(completion("Thought: I should add\nAction: calculator\nAction Input: 2+2"))
        .mount(&server)
        .await;

    let config = config_for(&server);
    let events = collect(&multiplexer(&config), ChatRequest::new("2+2").with_react()).await;
    let contents = contents(&events);

    assert_eq!(contents[0], THINKING_START);
    assert!(contents[1].contains("Action: calculator"));
    assert!(contents[2].contains("Final Answer: 4"));
    assert_eq!(&contents[3..6], &[THINKING_END, ANSWER_START, "4"]);
    assert_single_terminal_last(&events);

    let terminal = events.last().unwrap();
    assert_eq!(terminal.finish_reason.as_deref(), Some("stop"));
    assert_eq!(terminal.token_usage, Some(estimate_tokens("2+2", "4")));
}

#[tokio::test]
async fn e2e_react_unknown_tool_then_exhaustion() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(completion("Thought: try it\nAction: lookup_weather_v2\nAction Input: Paris"))
        .expect(5)
        .mount(&server)
        .await;

    let config = config_for(&server);
    let question = "What's the weather in Paris?";
    let events = collect(&multiplexer(&config), ChatRequest::new(question).with_react()).await;
    let contents = contents(&events);

    // Five raw turns between the thinking markers
    let end = contents.iter().position(|c| *c == THINKING_END).unwrap();
    assert_eq!(end, 6);

    let answer: String = contents[end + 2..].concat();
    assert!(answer.contains(question));
    assert!(answer.contains("Tool not found: lookup_weather_v2"));
    assert_single_terminal_last(&events);
}

// ── Knowledge ────────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_knowledge_context_reaches_the_model() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/knowledge/bases/kb-1/search"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "success": true,
            "message": "ok",
            "data": {
                "results": [{"title": "Account Guide", "content": "Use the reset link.", "citation": "guide-p3", "similarityScore": 0.91}],
                "totalCount": 1,
                "searchTime": 12
            }
        })))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .and(body_string_contains("[1] Account Guide"))
        .respond_with(sse(
            "data: {\"choices\":[{\"delta\":{\"content\":\"Use the reset link [1].\"}}]}\n\n\
             data: [DONE]\n\n",
        ))
        .expect(1)
        .mount(&server)
        .await;

    let config = config_for(&server);
    let search = HttpKnowledgeSearch::new(&config.knowledge.base_url, config.knowledge.timeout()).unwrap();
    let mux = multiplexer(&config).with_knowledge(Arc::new(search), &config);

    let request = ChatRequest::new("How do I reset my password?").with_knowledge(KnowledgeConfig::for_base("kb-1"));
    let events = collect(&mux, request).await;

    assert_eq!(
        contents(&events),
        vec![
            "Use the reset link [1].",
            "\n\nReferences:\n[1] Account Guide (guide-p3)",
            ""
        ]
    );
    assert_single_terminal_last(&events);
}

#[tokio::test]
async fn e2e_knowledge_timeout_is_not_fatal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/knowledge/bases/kb-1/search"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(5)))
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .and(path("/v1/chat/completions"))
        .respond_with(sse(
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hello\"}}]}\n\n\
             data: {\"choices\":[{\"finish_reason\":\"stop\"}]}\n\n",
        ))
        .mount(&server)
        .await;

    let mut config = config_for(&server);
    config.knowledge.timeout_ms = 200;
    let search = HttpKnowledgeSearch::new(&config.knowledge.base_url, Duration::from_secs(30)).unwrap();
    let mux = multiplexer(&config).with_knowledge(Arc::new(search), &config);

    let request = ChatRequest::new("hello").with_knowledge(KnowledgeConfig::for_base("kb-1"));
    let events = collect(&mux, request).await;

    assert_eq!(contents(&events), vec!["Hello", ""]);
    assert_eq!(events[1].finish_reason.as_deref(), Some("stop"));
}

// ── Validation ───────────────────────────────────────────────────────────

#[tokio::test]
async fn e2e_empty_message_is_rejected_before_any_call() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .respond_with(completion("unused"))
        .expect(0)
        .mount(&server)
        .await;

    let config = config_for(&server);
    assert!(multiplexer(&config).start(ChatRequest::new("   ")).is_err());
}

#[tokio::test]
async fn e2e_request_json_uses_wire_names() {
    let request: ChatRequest = serde_json::from_value(json!({
        "message": "2+2",
        "useReAct": true,
        "modelType": "Qwen/Qwen3-8B",
    }))
    .unwrap();
    assert!(request.use_react);

    let event = StreamEvent::terminal("s-1", "Qwen/Qwen3-8B", "stop", 1);
    let wire = serde_json::to_value(&event).unwrap();
    assert_eq!(wire["streamId"], "s-1");
    assert_eq!(wire["finishReason"], "stop");
    assert_eq!(wire["tokenUsage"], 1);
}
