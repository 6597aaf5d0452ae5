use thiserror::Error;

use crate::domain::{CoachId, Credits, FieldError, StudentId};

#[derive(Error, Debug)]
pub enum AppError {
    #[error("Invalid input: {0}")]
    Validation(String),

    #[error("Student not found: #{0}")]
    StudentNotFound(StudentId),

    #[error("Coach not found: #{0}")]
    CoachNotFound(CoachId),

    #[error(
        "Insufficient balance for student {student}: balance {balance}, required {required}. Please top up first"
    )]
    InsufficientBalance {
        student: String,
        balance: Credits,
        required: Credits,
    },

    #[error("Storage error: {0:#}")]
    Storage(#[from] anyhow::Error),
}

impl AppError {
    /// True for the "referenced id does not exist" family.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            AppError::StudentNotFound(_) | AppError::CoachNotFound(_)
        )
    }
}

impl From<FieldError> for AppError {
    fn from(err: FieldError) -> Self {
        AppError::Validation(err.to_string())
    }
}
