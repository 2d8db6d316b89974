//! Terminal output: status lines, tables and structured formats.

use std::fmt::Write as _;
use std::io::Write as _;

use colored::Colorize;
use serde::Serialize;
use serde_json::Value;
use tabled::{settings::Style, Table, Tabled};

use crate::config::OutputFormat;
use crate::CliResult;

/// Prints a success line.
pub fn success(message: &str) {
    println!("{} {message}", "✓".green().bold());
}

/// Prints an error line to stderr.
pub fn error(message: &str) {
    eprintln!("{} {message}", "✗".red().bold());
}

/// Prints a warning line to stderr.
pub fn warning(message: &str) {
    eprintln!("{} {message}", "⚠".yellow().bold());
}

/// Prints an informational line.
pub fn info(message: &str) {
    println!("{} {message}", "ℹ".blue().bold());
}

/// Prints rows as a table, a JSON array or a YAML sequence.
pub fn output<T: Tabled + Serialize>(rows: &[T], format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Table if rows.is_empty() => info("No results found."),
        OutputFormat::Table => println!("{}", Table::new(rows).with(Style::rounded())),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(rows)?),
        OutputFormat::Yaml => print!("{}", to_yaml(&serde_json::to_value(rows)?)),
        OutputFormat::Quiet => {}
    }
    Ok(())
}

/// Prints one value; tables fall back to YAML.
pub fn output_single<T: Serialize>(item: &T, format: OutputFormat) -> CliResult<()> {
    match format {
        OutputFormat::Table | OutputFormat::Yaml => {
            print!("{}", to_yaml(&serde_json::to_value(item)?));
        }
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(item)?),
        OutputFormat::Quiet => {}
    }
    Ok(())
}

/// Renders a JSON value as block-style YAML.
fn to_yaml(value: &Value) -> String {
    let mut out = String::new();
    write_yaml(value, 0, &mut out);
    out
}

fn write_yaml(value: &Value, indent: usize, out: &mut String) {
    let pad = "  ".repeat(indent);
    match value {
        Value::Array(items) if items.is_empty() => {
            let _ = writeln!(out, "{pad}[]");
        }
        Value::Object(map) if map.is_empty() => {
            let _ = writeln!(out, "{pad}{{}}");
        }
        Value::Array(items) => {
            for item in items {
                if is_scalar(item) {
                    let _ = writeln!(out, "{pad}- {}", scalar(item));
                } else {
                    let _ = writeln!(out, "{pad}-");
                    write_yaml(item, indent + 1, out);
                }
            }
        }
        Value::Object(map) => {
            for (key, val) in map {
                if is_scalar(val) {
                    let _ = writeln!(out, "{pad}{key}: {}", scalar(val));
                } else {
                    let _ = writeln!(out, "{pad}{key}:");
                    write_yaml(val, indent + 1, out);
                }
            }
        }
        other => {
            let _ = writeln!(out, "{pad}{}", scalar(other));
        }
    }
}

fn is_scalar(value: &Value) -> bool {
    match value {
        Value::Array(items) => items.is_empty(),
        Value::Object(map) => map.is_empty(),
        _ => true,
    }
}

fn scalar(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::String(s) => s.clone(),
        Value::Array(_) => "[]".to_string(),
        Value::Object(_) => "{}".to_string(),
        other => other.to_string(),
    }
}

/// Asks a yes/no question; anything but `y`/`yes` means no.
pub fn confirm(message: &str) -> CliResult<bool> {
    print!("{message} [y/N]: ");
    std::io::stdout().flush()?;

    let mut input = String::new();
    std::io::stdin().read_line(&mut input)?;
    let answer = input.trim();
    Ok(answer.eq_ignore_ascii_case("y") || answer.eq_ignore_ascii_case("yes"))
}

/// Reads a secret without echoing it.
pub fn prompt_password(prompt: &str) -> CliResult<String> {
    Ok(rpassword::prompt_password(prompt)?)
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn yaml_nests_objects_and_sequences() {
        let value = json!({
            "result": { "added": 3, "errors": [] },
            "groups": [{ "path": "/group1" }, { "path": "/Team 2016/2017" }],
            "status": "COMPLETED"
        });

        assert_eq!(
            to_yaml(&value),
            "groups:\n  -\n    path: /group1\n  -\n    path: /Team 2016/2017\n\
             result:\n  added: 3\n  errors: []\nstatus: COMPLETED\n"
        );
    }

    #[test]
    fn yaml_scalars_and_empty_collections() {
        assert_eq!(to_yaml(&json!(["a", null, 1])), "- a\n- null\n- 1\n");
        assert_eq!(to_yaml(&json!([])), "[]\n");
        assert_eq!(to_yaml(&json!({})), "{}\n");
    }
}
