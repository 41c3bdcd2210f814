//! Small formatting and validation helpers shared by the service layers.

use chrono::{DateTime, Utc};
use thiserror::Error;

/// Longest prompt, in characters, the service accepts.
pub const MAX_INPUT_CHARS: usize = 1000;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Rejected user input.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum InputError {
    #[error("Input too long.")]
    TooLong { chars: usize, max: usize },
}

/// Formats `timestamp` as `YYYY-MM-DD HH:MM:SS` for logs and display.
pub fn format_timestamp(timestamp: DateTime<Utc>) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

/// Mints an id of the form `YYYYMMDDHHMMSS-<16 hex chars>`.
///
/// The prefix is the current UTC time; the suffix is 8 random bytes.
pub fn generate_unique_id() -> String {
    let suffix: [u8; 8] = rand::random();
    format!(
        "{}-{}",
        Utc::now().format("%Y%m%d%H%M%S"),
        hex::encode(suffix)
    )
}

/// Checks a prompt before it reaches the cache or the upstream API.
///
/// Length is measured in characters, not bytes.
pub fn validate_input(input: &str) -> Result<&str, InputError> {
    let chars = input.chars().count();
    if chars > MAX_INPUT_CHARS {
        return Err(InputError::TooLong {
            chars,
            max: MAX_INPUT_CHARS,
        });
    }
    Ok(input)
}
