use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use super::{Credits, LedgerEntry, Student, StudentId};

/// Compute a student's balance from the ledger.
/// Balance = sum of the deltas of every entry recorded for the student
pub fn compute_balance(student_id: StudentId, entries: &[LedgerEntry]) -> Credits {
    entries
        .iter()
        .filter(|entry| entry.student_id == student_id)
        .map(|entry| entry.delta)
        .sum()
}

/// A student whose cached balance disagrees with the sum of their entries.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BalanceMismatch {
    pub student_id: StudentId,
    pub student_name: String,
    pub cached: Credits,
    pub ledger: Credits,
}

/// Raw counts gathered by storage for an integrity check.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IntegrityStats {
    pub student_count: i64,
    pub coach_count: i64,
    pub entry_count: i64,
    pub orphaned_entries: i64,
    pub unknown_coach_refs: i64,
    pub zero_deltas: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IntegrityReport {
    pub student_count: i64,
    pub coach_count: i64,
    pub entry_count: i64,
    pub total_balance: Credits,
    pub mismatches: Vec<BalanceMismatch>,
    /// Problems that break the ledger invariant
    pub issues: Vec<String>,
    /// Allowed but worth a look, e.g. negative balances
    pub warnings: Vec<String>,
}

impl IntegrityReport {
    pub fn is_healthy(&self) -> bool {
        self.issues.is_empty()
    }
}

/// Compare every student's cached balance with its ledger sum and fold the
/// storage counts into a report.
pub fn build_integrity_report(
    students: &[Student],
    ledger_sums: &HashMap<StudentId, Credits>,
    stats: &IntegrityStats,
) -> IntegrityReport {
    let mut issues = Vec::new();
    let mut warnings = Vec::new();
    let mut mismatches = Vec::new();

    for student in students {
        let ledger = ledger_sums.get(&student.id).copied().unwrap_or(0);
        if ledger != student.balance {
            issues.push(format!(
                "Student '{}' (#{}) has cached balance {} but ledger sum {}",
                student.name, student.id, student.balance, ledger
            ));
            mismatches.push(BalanceMismatch {
                student_id: student.id,
                student_name: student.name.clone(),
                cached: student.balance,
                ledger,
            });
        }
        if student.balance < 0 {
            warnings.push(format!(
                "Student '{}' (#{}) has a negative balance: {}",
                student.name, student.id, student.balance
            ));
        }
    }

    if stats.orphaned_entries > 0 {
        issues.push(format!(
            "{} entries reference a missing student",
            stats.orphaned_entries
        ));
    }
    if stats.unknown_coach_refs > 0 {
        issues.push(format!(
            "{} entries reference a missing coach",
            stats.unknown_coach_refs
        ));
    }
    if stats.zero_deltas > 0 {
        issues.push(format!("{} entries have a zero delta", stats.zero_deltas));
    }

    IntegrityReport {
        student_count: stats.student_count,
        coach_count: stats.coach_count,
        entry_count: stats.entry_count,
        total_balance: students.iter().map(|s| s.balance).sum(),
        mismatches,
        issues,
        warnings,
    }
}

#[cfg(test)]
mod tests {
    use chrono::NaiveDate;

    use super::*;

    fn make_entry(id: i64, student_id: StudentId, delta: Credits) -> LedgerEntry {
        LedgerEntry {
            id,
            timestamp: NaiveDate::from_ymd_opt(2024, 1, 1)
                .unwrap()
                .and_hms_opt(10, 0, 0)
                .unwrap(),
            student_id,
            coach_id: None,
            delta,
            note: String::new(),
        }
    }

    fn make_student(id: StudentId, balance: Credits) -> Student {
        Student {
            id,
            name: format!("Student {}", id),
            phone: None,
            balance,
        }
    }

    #[test]
    fn test_compute_balance_empty() {
        assert_eq!(compute_balance(1, &[]), 0);
    }

    #[test]
    fn test_compute_balance_mixed() {
        let entries = vec![
            make_entry(1, 1, 10), // top-up
            make_entry(2, 1, -1), // class
            make_entry(3, 2, 5),  // someone else
            make_entry(4, 1, -1), // class
        ];

        assert_eq!(compute_balance(1, &entries), 8);
        assert_eq!(compute_balance(2, &entries), 5);
        assert_eq!(compute_balance(3, &entries), 0);
    }

    #[test]
    fn test_report_healthy() {
        let students = vec![make_student(1, 6), make_student(2, 0)];
        let sums = HashMap::from([(1, 6)]);
        let stats = IntegrityStats {
            student_count: 2,
            entry_count: 2,
            ..Default::default()
        };

        let report = build_integrity_report(&students, &sums, &stats);

        assert!(report.is_healthy());
        assert!(report.mismatches.is_empty());
        assert!(report.warnings.is_empty());
        assert_eq!(report.total_balance, 6);
    }

    #[test]
    fn test_report_detects_mismatch() {
        let students = vec![make_student(1, 7)];
        let sums = HashMap::from([(1, 6)]);

        let report = build_integrity_report(&students, &sums, &IntegrityStats::default());

        assert!(!report.is_healthy());
        assert_eq!(
            report.mismatches,
            vec![BalanceMismatch {
                student_id: 1,
                student_name: "Student 1".into(),
                cached: 7,
                ledger: 6,
            }]
        );
    }

    #[test]
    fn test_negative_balance_is_a_warning() {
        let students = vec![make_student(1, -1)];
        let sums = HashMap::from([(1, -1)]);

        let report = build_integrity_report(&students, &sums, &IntegrityStats::default());

        assert!(report.is_healthy());
        assert_eq!(report.warnings.len(), 1);
    }

    #[test]
    fn test_dangling_references_are_issues() {
        let stats = IntegrityStats {
            orphaned_entries: 1,
            unknown_coach_refs: 2,
            zero_deltas: 1,
            ..Default::default()
        };

        let report = build_integrity_report(&[], &HashMap::new(), &stats);

        assert_eq!(report.issues.len(), 3);
    }
}
