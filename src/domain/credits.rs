use std::fmt;

/// Lesson credits are whole lessons. One credit pays for one class.
pub type Credits = i64;

/// Format a delta with an explicit sign.
/// Example: 10 -> "+10", -1 -> "-1", 0 -> "0"
pub fn format_delta(delta: Credits) -> String {
    if delta > 0 {
        format!("+{}", delta)
    } else {
        delta.to_string()
    }
}

/// Parse a signed delta as typed on the command line.
/// Accepts an optional leading `+` or `-`. Zero is rejected.
pub fn parse_delta(input: &str) -> Result<Credits, ParseDeltaError> {
    let delta: Credits = input
        .trim()
        .parse()
        .map_err(|_| ParseDeltaError::InvalidFormat)?;

    if delta == 0 {
        return Err(ParseDeltaError::Zero);
    }
    Ok(delta)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ParseDeltaError {
    InvalidFormat,
    Zero,
}

impl fmt::Display for ParseDeltaError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ParseDeltaError::InvalidFormat => write!(f, "invalid credit amount"),
            ParseDeltaError::Zero => write!(f, "credit amount must be non-zero"),
        }
    }
}

impl std::error::Error for ParseDeltaError {}
