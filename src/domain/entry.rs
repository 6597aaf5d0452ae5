use chrono::{NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};

use super::{CoachId, Credits, StudentId};

pub type EntryId = i64;

/// Storage format of entry timestamps. Lexicographic order matches time order.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Note recorded on lesson package purchases.
pub const TOP_UP_NOTE: &str = "Lesson package purchase";

/// One balance-changing event. Entries are append-only: never updated or deleted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEntry {
    /// Monotonically increasing in creation order
    pub id: EntryId,
    /// Wall-clock time of the mutation, second precision
    pub timestamp: NaiveDateTime,
    pub student_id: StudentId,
    /// Present for class consumption, absent for top-ups
    pub coach_id: Option<CoachId>,
    /// Signed change applied to the student's balance
    pub delta: Credits,
    pub note: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    /// Credits purchased
    TopUp,
    /// Credits consumed by a lesson with a coach
    Class,
    /// Credits removed without a coach attached
    Adjustment,
}

impl EntryKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntryKind::TopUp => "topup",
            EntryKind::Class => "class",
            EntryKind::Adjustment => "adjustment",
        }
    }
}

impl std::fmt::Display for EntryKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl LedgerEntry {
    pub fn kind(&self) -> EntryKind {
        if self.delta > 0 {
            EntryKind::TopUp
        } else if self.coach_id.is_some() {
            EntryKind::Class
        } else {
            EntryKind::Adjustment
        }
    }
}

/// A ledger entry joined with the names it references, for history views.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryEntry {
    #[serde(flatten)]
    pub entry: LedgerEntry,
    pub student_name: String,
    /// Absent when the entry has no coach
    pub coach_name: Option<String>,
}

/// Drop sub-second precision so stored and in-memory timestamps compare equal.
pub fn truncate_to_seconds(timestamp: NaiveDateTime) -> NaiveDateTime {
    timestamp.with_nanosecond(0).unwrap_or(timestamp)
}

pub fn format_timestamp(timestamp: &NaiveDateTime) -> String {
    timestamp.format(TIMESTAMP_FORMAT).to_string()
}

pub fn parse_timestamp(input: &str) -> Result<NaiveDateTime, chrono::ParseError> {
    NaiveDateTime::parse_from_str(input, TIMESTAMP_FORMAT)
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn entry(delta: Credits, coach_id: Option<CoachId>) -> LedgerEntry {
        LedgerEntry {
            id: 1,
            timestamp: NaiveDate::from_ymd_opt(2024, 3, 1)
                .unwrap()
                .and_hms_opt(9, 30, 0)
                .unwrap(),
            student_id: 1,
            coach_id,
            delta,
            note: String::new(),
        }
    }

    #[test]
    fn test_entry_kind() {
        assert_eq!(entry(10, None).kind(), EntryKind::TopUp);
        assert_eq!(entry(-1, Some(2)).kind(), EntryKind::Class);
        assert_eq!(entry(-1, None).kind(), EntryKind::Adjustment);
    }

    #[test]
    fn test_timestamp_format() {
        let e = entry(1, None);
        let s = format_timestamp(&e.timestamp);
        assert_eq!(s, "2024-03-01 09:30:00");
        assert_eq!(parse_timestamp(&s).unwrap(), e.timestamp);
    }

    #[test]
    fn test_truncate_to_seconds() {
        let ts = NaiveDate::from_ymd_opt(2024, 3, 1)
            .unwrap()
            .and_hms_milli_opt(9, 30, 15, 750)
            .unwrap();
        let truncated = truncate_to_seconds(ts);
        assert_eq!(format_timestamp(&truncated), "2024-03-01 09:30:15");
        assert_eq!(truncated.nanosecond(), 0);
    }

    #[test]
    fn test_parse_timestamp_rejects_rfc3339() {
        assert!(parse_timestamp("2024-03-01T09:30:00Z").is_err());
    }
}
