//! Search tool: Simulated web search.
//!
//! Returns plausible results without network access so the ReAct loop can
//! be exercised end-to-end. Topic keywords pick curated results; anything
//! else gets generic ones.

use relayline_core::error::ToolError;
use relayline_core::tool::Tool;
use tracing::debug;

use crate::input::argument;

pub struct SearchTool;

const MAX_RESULTS: usize = 3;

impl Tool for SearchTool {
    fn name(&self) -> &str {
        "search"
    }

    fn description(&self) -> &str {
        "Search the internet for information"
    }

    fn parameters_schema(&self) -> &str {
        r#"{"query": "search keywords"}"#
    }

    fn execute(&self, input: &str) -> Result<String, ToolError> {
        let query = argument(input, "query");
        if query.is_empty() {
            return Err(ToolError::InvalidArguments("Missing query".into()));
        }

        debug!(query = %query, "Running simulated search");
        let lines: Vec<String> = results_for(&query)
            .into_iter()
            .enumerate()
            .map(|(i, (title, snippet))| format!("{}. {title}: {snippet}", i + 1))
            .collect();
        Ok(format!("Results for \"{query}\":\n{}", lines.join("\n")))
    }
}

fn results_for(query: &str) -> Vec<(String, String)> {
    let q = query.to_lowercase();
    let curated: &[(&str, &[(&str, &str)])] = &[
        (
            "rust",
            &[
                ("The Rust Programming Language", "Rust is a systems language focused on safety, speed, and concurrency."),
                ("Rust by Example", "Runnable examples that illustrate Rust concepts and the standard library."),
                ("crates.io", "The Rust community's package registry."),
            ],
        ),
        (
            "weather",
            &[
                ("National Weather Service", "Current conditions and forecasts."),
                ("OpenWeatherMap", "Weather data and forecasts for any location."),
            ],
        ),
    ];

    for (keyword, hits) in curated {
        if q.contains(keyword) {
            return hits
                .iter()
                .take(MAX_RESULTS)
                .map(|(t, s)| (t.to_string(), s.to_string()))
                .collect();
        }
    }

    (1..=MAX_RESULTS)
        .map(|i| {
            (
                format!("Result {i} for {query}"),
                format!("Recent coverage and background on {query}."),
            )
        })
        .collect()
}
