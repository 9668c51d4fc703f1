//! Output formatting: every subcommand prints either pretty JSON (the
//! default, for piping into other tools) or a short human summary.

use serde::Serialize;

/// How a command's result should be rendered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum OutputFormat {
    /// Pretty-printed JSON.
    Json,
    /// A short, human-oriented summary line.
    Human,
}

impl Default for OutputFormat {
    fn default() -> Self {
        OutputFormat::Json
    }
}

/// Print `value` according to `format`. JSON failures fall back to Debug
/// formatting rather than panicking the CLI.
pub fn emit<T: Serialize + std::fmt::Debug>(value: &T, format: OutputFormat) {
    match format {
        OutputFormat::Json => match serde_json::to_string_pretty(value) {
            Ok(text) => println!("{text}"),
            Err(err) => {
                tracing::warn!(error = %err, "failed to serialize output as JSON");
                println!("{value:?}");
            }
        },
        OutputFormat::Human => println!("{value:?}"),
    }
}
