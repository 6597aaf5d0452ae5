use crate::domain::{
    Coach, CoachId, HistoryEntry, IntegrityReport, LedgerEntry, Student, StudentId,
    build_integrity_report,
};
use crate::storage::Repository;

use super::AppError;

/// Filter for history listings
#[derive(Debug, Clone, Default)]
pub struct HistoryFilter {
    pub student_id: Option<StudentId>,
    pub limit: Option<usize>,
}

/// Read-only projections over the ledger. Nothing here writes.
pub struct QueryService {
    repo: Repository,
}

impl QueryService {
    pub fn new(repo: Repository) -> Self {
        Self { repo }
    }

    /// All students with their balances, in registration order.
    pub async fn list_students(&self) -> Result<Vec<Student>, AppError> {
        tracing::debug!("listing students");
        Ok(self.repo.list_students().await?)
    }

    /// All coaches, in registration order.
    pub async fn list_coaches(&self) -> Result<Vec<Coach>, AppError> {
        tracing::debug!("listing coaches");
        Ok(self.repo.list_coaches().await?)
    }

    pub async fn get_student(&self, id: StudentId) -> Result<Student, AppError> {
        self.repo
            .get_student(id)
            .await?
            .ok_or(AppError::StudentNotFound(id))
    }

    pub async fn get_coach(&self, id: CoachId) -> Result<Coach, AppError> {
        self.repo
            .get_coach(id)
            .await?
            .ok_or(AppError::CoachNotFound(id))
    }

    /// Every ledger entry with student and coach names, most recent first.
    /// Entries sharing a timestamp are ordered by descending id.
    pub async fn list_history(&self) -> Result<Vec<HistoryEntry>, AppError> {
        self.list_history_filtered(HistoryFilter::default()).await
    }

    /// History for a single student, same ordering as [`QueryService::list_history`].
    pub async fn student_history(&self, id: StudentId) -> Result<Vec<HistoryEntry>, AppError> {
        self.list_history_filtered(HistoryFilter {
            student_id: Some(id),
            limit: None,
        })
        .await
    }

    pub async fn list_history_filtered(
        &self,
        filter: HistoryFilter,
    ) -> Result<Vec<HistoryEntry>, AppError> {
        if let Some(id) = filter.student_id {
            // Unknown students are an error, not an empty history
            self.get_student(id).await?;
        }

        tracing::debug!(student_id = ?filter.student_id, limit = ?filter.limit, "listing history");
        Ok(self
            .repo
            .list_history(filter.student_id, filter.limit)
            .await?)
    }

    /// Raw ledger entries in creation order.
    pub async fn list_entries(&self) -> Result<Vec<LedgerEntry>, AppError> {
        Ok(self.repo.list_entries().await?)
    }

    /// Check that every cached balance equals its ledger sum and that no entry
    /// points at a missing student or coach. Reports only; never repairs.
    pub async fn check_integrity(&self) -> Result<IntegrityReport, AppError> {
        let stats = self.repo.get_integrity_stats().await?;
        let students = self.repo.list_students().await?;
        let sums = self.repo.ledger_sums().await?;

        let report = build_integrity_report(&students, &sums, &stats);
        if !report.is_healthy() {
            tracing::warn!(issues = report.issues.len(), "ledger integrity check failed");
        }
        Ok(report)
    }
}
