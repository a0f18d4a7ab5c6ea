// Output formatting for CLI

use anyhow::Result;
use std::io::Write;

use super::config::OutputFormat;

/// Format and output data
pub struct OutputFormatter {
    format: OutputFormat,
    quiet: bool,
}

impl OutputFormatter {
    pub fn new(format: OutputFormat, quiet: bool) -> Self {
        Self { format, quiet }
    }

    /// Output metadata
    pub fn output_metadata(&self, metadata: &serde_json::Value, writer: &mut impl Write) -> Result<()> {
        match self.format {
            OutputFormat::Pretty => {
                writeln!(writer, "{}", serde_json::to_string_pretty(metadata)?)?;
            }
            OutputFormat::Json => {
                writeln!(writer, "{}", serde_json::to_string(metadata)?)?;
            }
            OutputFormat::KeyValue => {
                let mut items = Vec::new();
                flatten("", metadata, &mut items);
                for (key, value) in items {
                    writeln!(writer, "{}: {}", key, value)?;
                }
            }
        }
        Ok(())
    }

    /// Print success message
    pub fn print_success(&self, message: &str) {
        if !self.quiet {
            println!("✓ {}", message);
        }
    }

    /// Print error message
    pub fn print_error(&self, message: &str) {
        eprintln!("✗ {}", message);
    }

    /// Print info message
    pub fn print_info(&self, message: &str) {
        if !self.quiet {
            println!("  {}", message);
        }
    }
}

/// Dotted `key: value` lines, objects and arrays expanded in order.
fn flatten(prefix: &str, value: &serde_json::Value, out: &mut Vec<(String, String)>) {
    let join = |key: &str| {
        if prefix.is_empty() {
            key.to_string()
        } else {
            format!("{}.{}", prefix, key)
        }
    };

    match value {
        serde_json::Value::Object(obj) => {
            for (key, value) in obj {
                flatten(&join(key), value, out);
            }
        }
        serde_json::Value::Array(arr) if !arr.is_empty() => {
            for (i, value) in arr.iter().enumerate() {
                flatten(&join(&i.to_string()), value, out);
            }
        }
        serde_json::Value::Array(_) => out.push((prefix.to_string(), "[]".to_string())),
        serde_json::Value::String(s) => out.push((prefix.to_string(), s.clone())),
        serde_json::Value::Null => out.push((prefix.to_string(), "(null)".to_string())),
        other => out.push((prefix.to_string(), other.to_string())),
    }
}
