//! Weather tool: Simulated conditions for a location.
//!
//! Results are derived from a hash of the location name, so the same place
//! always reports the same weather. No network access.

use relayline_core::error::ToolError;
use relayline_core::tool::Tool;
use tracing::debug;

use crate::input::argument;

pub struct WeatherTool;

impl Tool for WeatherTool {
    fn name(&self) -> &str {
        "get_weather"
    }

    fn description(&self) -> &str {
        "Get the current weather for a location"
    }

    fn parameters_schema(&self) -> &str {
        r#"{"location": "city or place name"}"#
    }

    fn execute(&self, input: &str) -> Result<String, ToolError> {
        let location = argument(input, "location");
        if location.is_empty() {
            return Err(ToolError::InvalidArguments("Missing location".into()));
        }
        debug!(location = %location, "Reporting simulated weather");
        Ok(report(&location))
    }
}

const CONDITIONS: [&str; 6] = [
    "clear skies",
    "partly cloudy",
    "overcast",
    "light rain",
    "thunderstorms",
    "fog",
];

fn report(location: &str) -> String {
    let hash = location
        .to_lowercase()
        .bytes()
        .fold(0u32, |acc, b| acc.wrapping_mul(31).wrapping_add(u32::from(b)));

    let temperature = i64::from(hash % 36) - 5; // -5 to 30°C
    let conditions = CONDITIONS[(hash as usize / 7) % CONDITIONS.len()];
    let humidity = 30 + hash % 60;

    format!("Weather in {location}: {conditions}, {temperature}°C, humidity {humidity}%")
}
