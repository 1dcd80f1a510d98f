//! Display utilities for the Bolt Card CLI

use colored::Colorize;

/// Format a success message
pub fn success(message: &str) -> String {
    format!("✅ {}", message.green().bold())
}

/// Format a warning message
pub fn warning(message: &str) -> String {
    format!("⚠️  {}", message.yellow().bold())
}

/// Titled list of values with the keys aligned in one column
pub fn key_value_box(title: &str, items: Vec<(&str, String)>) -> String {
    let width = items.iter().map(|(key, _)| key.len()).max().unwrap_or(0);
    items
        .into_iter()
        .fold(title.bold().underline().to_string(), |mut out, (key, value)| {
            out.push_str(&format!("\n  {:<width$}  {}", key.bold(), value.cyan()));
            out
        })
}

/// Format a sensitive data warning
pub fn sensitive_data_warning() -> String {
    warning("KEEP THESE KEYS SECRET - ANYONE HOLDING K0 CAN WIPE THE CARD")
}
