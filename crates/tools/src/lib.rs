//! Built-in tool implementations for Relayline.
//!
//! Every tool takes the model's raw `Action Input` string and returns the
//! observation text. Inputs may be bare text or a JSON object matching the
//! tool's schema; see [`input::argument`].

pub mod calculator;
pub mod clock;
pub mod input;
pub mod search;
pub mod weather;

use relayline_core::tool::ToolRegistry;

pub use calculator::CalculatorTool;
pub use clock::CurrentTimeTool;
pub use search::SearchTool;
pub use weather::WeatherTool;

/// The general assistant's tool set, in catalog order.
pub fn default_registry() -> ToolRegistry {
    let mut registry = ToolRegistry::new();
    registry.register(Box::new(SearchTool));
    registry.register(Box::new(CalculatorTool));
    registry.register(Box::new(CurrentTimeTool));
    registry.register(Box::new(WeatherTool));
    registry
}
