use std::fmt;

/// Normalise a required text field: trims surrounding whitespace and rejects
/// an empty result.
pub fn required_text(field: &'static str, value: &str) -> Result<String, FieldError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(FieldError::Empty(field));
    }
    Ok(trimmed.to_string())
}

/// Normalise an optional text field. Blank input is stored as absent.
pub fn optional_text(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldError {
    Empty(&'static str),
}

impl fmt::Display for FieldError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldError::Empty(field) => write!(f, "{} must not be empty", field),
        }
    }
}

impl std::error::Error for FieldError {}
