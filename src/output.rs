// ABOUTME: Text formatting helpers shared by the command renderers
// ABOUTME: Column padding, value truncation and JSON report emission

use std::io::{self, Write};

use serde::Serialize;

/// Width of the column-name field in schema listings
pub const NAME_WIDTH: usize = 25;

/// Characters of a user id shown in row listings
pub const ID_PREVIEW: usize = 30;

/// First `max` characters of `value` followed by `...`
pub fn preview(value: Option<&str>, max: usize) -> String {
    match value {
        Some(v) => format!("{}...", v.chars().take(max).collect::<String>()),
        None => "-".to_string(),
    }
}

/// Display an optional value, `-` when NULL
pub fn or_dash(value: Option<&str>) -> &str {
    value.unwrap_or("-")
}

/// Cut text to `max` characters without splitting a code point
pub fn clip(text: &str, max: usize) -> String {
    text.chars().take(max).collect()
}

pub fn write_json<T: Serialize>(out: &mut dyn Write, report: &T) -> io::Result<()> {
    serde_json::to_writer_pretty(&mut *out, report)?;
    writeln!(out)
}
