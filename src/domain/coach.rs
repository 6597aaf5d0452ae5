use serde::{Deserialize, Serialize};

pub type CoachId = i64;

/// A coach who can be assigned to classes. Immutable after registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Coach {
    pub id: CoachId,
    pub name: String,
    /// Free text, e.g. "doubles tactics"
    pub specialty: Option<String>,
}
