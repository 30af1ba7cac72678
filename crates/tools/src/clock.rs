//! Current-time tool.

use chrono::{DateTime, Local, TimeZone};
use relayline_core::error::ToolError;
use relayline_core::tool::Tool;

pub struct CurrentTimeTool;

impl Tool for CurrentTimeTool {
    fn name(&self) -> &str {
        "get_current_time"
    }

    fn description(&self) -> &str {
        "Get the current local date and time"
    }

    fn parameters_schema(&self) -> &str {
        "{}"
    }

    fn execute(&self, _input: &str) -> Result<String, ToolError> {
        Ok(describe(&Local::now()))
    }
}

fn describe<Tz: TimeZone>(now: &DateTime<Tz>) -> String
where
    Tz::Offset: std::fmt::Display,
{
    format!("The current time is {}", now.format("%Y-%m-%d %H:%M:%S (%:z)"))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::FixedOffset;

    #[test]
    fn formats_date_time_and_offset() {
        let tz = FixedOffset::east_opt(8 * 3600).unwrap();
        let at = tz.with_ymd_and_hms(2024, 3, 9, 7, 5, 0).unwrap();
        assert_eq!(describe(&at), "The current time is 2024-03-09 07:05:00 (+08:00)");
    }

    #[test]
    fn ignores_input() {
        let out = CurrentTimeTool.execute("whatever").unwrap();
        assert!(out.starts_with("The current time is "));
    }
}
