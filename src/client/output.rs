//! Writing pulled secrets to the project's output file.

use std::collections::BTreeMap;
use std::path::Path;

use crate::project::{OutputFormat, ProjectConfig};

use super::batch::{BatchReport, BatchSummary};

/// Render `entries` (already filtered, in order) in `format`.
pub fn render(format: OutputFormat, prefix: Option<&str>, entries: &[(&str, &str)]) -> String {
    let prefix = prefix.unwrap_or("");
    match format {
        OutputFormat::Dotenv => entries
            .iter()
            .map(|(key, value)| format!("{}{}={}\n", prefix, key, dotenv_value(value)))
            .collect(),
        OutputFormat::Json => {
            let map: BTreeMap<String, &str> = entries
                .iter()
                .map(|(key, value)| (format!("{}{}", prefix, key), *value))
                .collect();
            // A map of strings always serializes.
            let mut out = serde_json::to_string_pretty(&map).unwrap_or_default();
            out.push('\n');
            out
        }
    }
}

/// Quote a dotenv value when it would not survive unquoted.
fn dotenv_value(value: &str) -> String {
    let needs_quotes = value.is_empty()
        || value
            .chars()
            .any(|c| c.is_whitespace() || matches!(c, '"' | '\'' | '#' | '\\' | '$' | '`'));
    if !needs_quotes {
        return value.to_string();
    }

    let mut quoted = String::with_capacity(value.len() + 2);
    quoted.push('"');
    for c in value.chars() {
        match c {
            '"' => quoted.push_str("\\\""),
            '\\' => quoted.push_str("\\\\"),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '$' => quoted.push_str("\\$"),
            '`' => quoted.push_str("\\`"),
            _ => quoted.push(c),
        }
    }
    quoted.push('"');
    quoted
}

/// Apply the project's allow-list and prefix, then write owner-only.
/// Returns the number of secrets written.
pub fn write_secrets<'a>(
    config: &ProjectConfig,
    secrets: impl IntoIterator<Item = (&'a str, &'a str)>,
    path: &Path,
) -> std::io::Result<usize> {
    let entries: Vec<(&str, &str)> = secrets
        .into_iter()
        .filter(|(key, _)| config.wants(key))
        .collect();

    let contents = render(config.output.format, config.prefix.as_deref(), &entries);
    crate::util::write_private_file(path, contents.as_bytes())?;
    Ok(entries.len())
}

/// Write the opened secrets of a pull to `path`.
///
/// When every item failed to open, the existing file is left untouched and
/// `None` is returned.
pub fn write_report(
    config: &ProjectConfig,
    report: &BatchReport<String>,
    path: &Path,
) -> std::io::Result<Option<usize>> {
    if report.summary() == BatchSummary::Failed {
        return Ok(None);
    }
    let secrets = report.succeeded().map(|(key, value)| (key, value.as_str()));
    write_secrets(config, secrets, path).map(Some)
}
