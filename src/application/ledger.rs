use chrono::{Local, NaiveDateTime};

use crate::domain::{
    Coach, CoachId, Credits, LedgerEntry, Student, StudentId, TOP_UP_NOTE, optional_text,
    required_text, truncate_to_seconds,
};
use crate::storage::{BalanceChange, ChangeOutcome, Repository};

use super::AppError;

/// Result of a balance mutation
#[derive(Debug, Clone)]
pub struct ChangeResult {
    pub entry: LedgerEntry,
    pub new_balance: Credits,
}

/// The only writer of students, coaches, balances and ledger entries.
///
/// Every balance change goes through [`Repository::apply_change`], which
/// updates the cached balance and appends the ledger entry in one
/// transaction.
pub struct LedgerService {
    repo: Repository,
}

impl LedgerService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    // ========================
    // Registration
    // ========================

    /// Register a new student with a zero balance.
    pub async fn register_student(
        &self,
        name: &str,
        phone: Option<String>,
    ) -> Result<Student, AppError> {
        let name = required_text("student name", name)?;
        let phone = optional_text(phone);

        let student = self.repo.insert_student(&name, phone.as_deref()).await?;
        tracing::info!(student_id = student.id, name = %student.name, "registered student");
        Ok(student)
    }

    /// Register a new coach.
    pub async fn register_coach(
        &self,
        name: &str,
        specialty: Option<String>,
    ) -> Result<Coach, AppError> {
        let name = required_text("coach name", name)?;
        let specialty = optional_text(specialty);

        let coach = self.repo.insert_coach(&name, specialty.as_deref()).await?;
        tracing::info!(coach_id = coach.id, name = %coach.name, "registered coach");
        Ok(coach)
    }

    // ========================
    // Balance mutations
    // ========================

    /// Apply a signed delta to a student's balance, stamped with the current time.
    ///
    /// Positive deltas are purchases, negative deltas consumption. The balance is
    /// allowed to go negative here; use [`LedgerService::consume_class`] or
    /// [`LedgerService::apply_guarded_delta`] to refuse that atomically.
    /// Not idempotent: every call appends a new entry.
    pub async fn apply_delta(
        &self,
        student_id: StudentId,
        delta: Credits,
        note: &str,
        coach_id: Option<CoachId>,
    ) -> Result<ChangeResult, AppError> {
        self.apply_delta_at(
            student_id,
            delta,
            note,
            coach_id,
            Local::now().naive_local(),
        )
        .await
    }

    /// Same as [`LedgerService::apply_delta`] with an explicit timestamp.
    /// Sub-second precision is dropped.
    pub async fn apply_delta_at(
        &self,
        student_id: StudentId,
        delta: Credits,
        note: &str,
        coach_id: Option<CoachId>,
        timestamp: NaiveDateTime,
    ) -> Result<ChangeResult, AppError> {
        self.apply(student_id, delta, note, coach_id, timestamp, None).await
    }

    /// Apply a delta, refusing a debit that would take the balance below zero.
    /// The check runs inside the mutating transaction. Credits always apply.
    pub async fn apply_guarded_delta(
        &self,
        student_id: StudentId,
        delta: Credits,
        note: &str,
        coach_id: Option<CoachId>,
    ) -> Result<ChangeResult, AppError> {
        let floor = (delta < 0).then_some(0);
        self.apply(
            student_id,
            delta,
            note,
            coach_id,
            Local::now().naive_local(),
            floor,
        )
        .await
    }

    /// Record a lesson package purchase.
    pub async fn top_up(
        &self,
        student_id: StudentId,
        lessons: Credits,
    ) -> Result<ChangeResult, AppError> {
        if lessons < 1 {
            return Err(AppError::Validation("Lessons purchased must be at least 1".to_string()));
        }
        self.apply_delta(student_id, lessons, TOP_UP_NOTE, None).await
    }

    /// Check a student into one class with a coach, consuming one credit.
    /// Fails with `InsufficientBalance` when the student has no credit left.
    pub async fn consume_class(
        &self,
        student_id: StudentId,
        coach_id: CoachId,
        note: &str,
    ) -> Result<ChangeResult, AppError> {
        self.apply_guarded_delta(student_id, -1, note, Some(coach_id)).await
    }

    async fn apply(
        &self,
        student_id: StudentId,
        delta: Credits,
        note: &str,
        coach_id: Option<CoachId>,
        timestamp: NaiveDateTime,
        floor: Option<Credits>,
    ) -> Result<ChangeResult, AppError> {
        if delta == 0 {
            return Err(AppError::Validation("Delta must be non-zero".to_string()));
        }

        let change = BalanceChange {
            student_id,
            delta,
            note: note.trim(),
            coach_id,
            timestamp: truncate_to_seconds(timestamp),
            floor,
        };

        match self.repo.apply_change(&change).await? {
            ChangeOutcome::Applied { entry, new_balance } => {
                tracing::info!(
                    student_id,
                    entry_id = entry.id,
                    delta,
                    coach_id = ?coach_id,
                    new_balance,
                    "ledger mutation"
                );
                Ok(ChangeResult { entry, new_balance })
            }
            ChangeOutcome::StudentMissing => Err(AppError::StudentNotFound(student_id)),
            ChangeOutcome::CoachMissing(id) => Err(AppError::CoachNotFound(id)),
            ChangeOutcome::OutOfRange { balance } => Err(AppError::Validation(format!(
                "Delta {} would take the balance of student #{} ({}) out of range",
                delta, student_id, balance
            ))),
            ChangeOutcome::BelowFloor {
                student_name,
                balance,
            } => {
                tracing::warn!(student_id, balance, delta, "refused: insufficient balance");
                Err(AppError::InsufficientBalance {
                    student: student_name,
                    balance,
                    required: delta.saturating_neg(),
                })
            }
        }
    }
}
