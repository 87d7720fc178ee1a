//! Duration parsing and formatting for captions, seek arguments and thumbnails

use crate::{Result, VcError};
use thiserror::Error;

/// Why a `/seek` argument was rejected
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SeekParseError {
    #[error("empty seek position")]
    Empty,

    #[error("invalid seek position: {0}")]
    Invalid(String),
}

/// Convert a `H:MM:SS` / `MM:SS` / `SS` duration string into seconds
pub fn convert_to_seconds(duration: &str) -> Result<u64> {
    let invalid = || VcError::Search(format!("invalid duration: {}", duration));

    let mut total = 0u64;
    let mut multiplier = 1u64;

    for (i, part) in duration.trim().split(':').rev().enumerate() {
        if i > 0 {
            multiplier = multiplier.checked_mul(60).ok_or_else(invalid)?;
        }
        let value: u64 = part.trim().parse().map_err(|_| invalid())?;
        total = value
            .checked_mul(multiplier)
            .and_then(|v| total.checked_add(v))
            .ok_or_else(invalid)?;
    }

    Ok(total)
}

/// Human readable duration, e.g. `1h 3m 5s`. Zero components are omitted.
pub fn format_duration(seconds: u64) -> String {
    let days = seconds / 86_400;
    let hours = (seconds % 86_400) / 3_600;
    let minutes = (seconds % 3_600) / 60;
    let secs = seconds % 60;

    let mut parts = Vec::with_capacity(4);
    if days > 0 {
        parts.push(format!("{}d", days));
    }
    if hours > 0 {
        parts.push(format!("{}h", hours));
    }
    if minutes > 0 {
        parts.push(format!("{}m", minutes));
    }
    if secs > 0 || parts.is_empty() {
        parts.push(format!("{}s", secs));
    }

    parts.join(" ")
}

/// Clock style duration: `MM:SS` below an hour, `H:MM:SS` otherwise
pub fn seconds_to_hhmmss(seconds: u64) -> String {
    if seconds < 3_600 {
        format!("{:02}:{:02}", seconds / 60, seconds % 60)
    } else {
        format!(
            "{}:{:02}:{:02}",
            seconds / 3_600,
            (seconds % 3_600) / 60,
            seconds % 60
        )
    }
}

/// Parse a seek target given as plain seconds (`90`) or `minutes:seconds` (`1:30`)
pub fn parse_seek_position(arg: &str) -> std::result::Result<u64, SeekParseError> {
    let arg = arg.trim();
    if arg.is_empty() {
        return Err(SeekParseError::Empty);
    }

    let invalid = || SeekParseError::Invalid(arg.to_string());

    match arg.split_once(':') {
        Some((minutes, seconds)) => {
            let minutes: u64 = minutes.parse().map_err(|_| invalid())?;
            let seconds: u64 = seconds.parse().map_err(|_| invalid())?;
            minutes
                .checked_mul(60)
                .and_then(|m| m.checked_add(seconds))
                .ok_or_else(invalid)
        }
        None => arg.parse().map_err(|_| invalid()),
    }
}
