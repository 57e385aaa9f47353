pub mod analytics;
pub mod config;
pub mod ingest;
pub mod recommend;
pub mod train;

use std::fs;
use std::path::Path;

use anyhow::Context;
use orderlens_core::errors::ApplicationError;
use serde::Serialize;
use serde_json::Value;

/// Exit code when a command's input file cannot be read.
pub const EXIT_INPUT: u8 = 7;

#[derive(Debug, Clone)]
pub struct CommandResult {
    pub exit_code: u8,
    pub output: String,
}

#[derive(Debug, Serialize)]
struct CommandOutcome {
    command: String,
    status: String,
    error_class: Option<String>,
    message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    data: Option<Value>,
}

impl CommandResult {
    /// Success carrying a structured report under `data`.
    pub fn success_with(command: &str, message: impl Into<String>, data: impl Serialize) -> Self {
        let data = match serde_json::to_value(data) {
            Ok(data) => data,
            Err(error) => {
                return Self::failure(command, "serialization", error.to_string(), 1);
            }
        };
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "ok".to_string(),
            error_class: None,
            message: message.into(),
            data: Some(data),
        };
        Self { exit_code: 0, output: serialize_payload(payload) }
    }

    pub fn failure(
        command: &str,
        error_class: &str,
        message: impl Into<String>,
        exit_code: u8,
    ) -> Self {
        let payload = CommandOutcome {
            command: command.to_string(),
            status: "error".to_string(),
            error_class: Some(error_class.to_string()),
            message: message.into(),
            data: None,
        };
        Self { exit_code, output: serialize_payload(payload) }
    }

    /// Maps a core failure to its error class and exit code.
    pub fn from_error(command: &str, error: ApplicationError) -> Self {
        let exit_code = match &error {
            ApplicationError::Configuration(_) => 2,
            ApplicationError::Ingest(_) => 3,
            ApplicationError::Analytics(_) => 4,
            ApplicationError::Classifier(_) => 5,
            ApplicationError::Store(_) => 6,
        };
        let error_class = error.error_class();
        let interface = error.clone().into_interface(command);
        tracing::warn!(
            event_name = "cli.command_failed",
            command,
            error_class,
            error = %error,
            "command failed"
        );
        Self::failure(command, error_class, format!("{} ({error})", interface.user_message()), exit_code)
    }
}

/// Reads a whole input file, naming the path on failure.
pub fn read_input(path: &Path) -> anyhow::Result<Vec<u8>> {
    fs::read(path).with_context(|| format!("reading input file {}", path.display()))
}

pub(crate) fn input_failure(command: &str, error: anyhow::Error) -> CommandResult {
    CommandResult::failure(command, "input_io", format!("{error:#}"), EXIT_INPUT)
}

fn serialize_payload(payload: CommandOutcome) -> String {
    serde_json::to_string(&payload).unwrap_or_else(|error| {
        format!(
            "{{\"command\":\"unknown\",\"status\":\"error\",\"error_class\":\"serialization\",\"message\":\"{}\"}}",
            error.to_string().replace('\\', "\\\\").replace('"', "\\\"")
        )
    })
}
