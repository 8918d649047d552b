//! Utility functions for dartrs CLI

use anyhow::Result;
use console::style;
use serde_json::Value;
use std::time::Duration;

/// Format duration in human-readable format
pub fn format_duration(duration: Duration) -> String {
    let total_secs = duration.as_secs();
    let minutes = total_secs / 60;
    let seconds = total_secs % 60;
    let millis = duration.subsec_millis();

    if minutes > 0 {
        format!("{}m {}s", minutes, seconds)
    } else if seconds > 0 {
        format!("{}.{:03}s", seconds, millis)
    } else {
        format!("{}ms", duration.as_millis())
    }
}

/// Print formatted output (JSON or human-readable)
pub fn print_output(data: &Value, json_output: bool) -> Result<()> {
    if json_output {
        println!("{}", serde_json::to_string_pretty(data)?);
    } else if let Value::Object(map) = data {
        for (key, value) in map {
            println!("{}: {}", style(key).bold(), format_value(value));
        }
    } else {
        println!("{}", format_value(data));
    }
    Ok(())
}

fn format_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Array(items) => items.iter().map(format_value).collect::<Vec<_>>().join(" "),
        _ => value.to_string(),
    }
}

/// Print a dimmed statistics line to stderr
pub fn print_stats(message: &str) {
    eprintln!("{}", style(message).dim());
}
