use serde::{Deserialize, Serialize};

use super::Credits;

pub type StudentId = i64;

/// A registered student and their cached lesson balance.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub name: String,
    pub phone: Option<String>,
    /// Running sum of this student's ledger deltas, maintained by the ledger service
    pub balance: Credits,
}
