use std::collections::HashMap;
use std::str::FromStr;

use anyhow::{Context, Result};
use chrono::NaiveDateTime;
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions, SqliteRow};
use sqlx::{Row, SqlitePool};

use crate::domain::{
    Coach, CoachId, Credits, HistoryEntry, IntegrityStats, LedgerEntry, Student, StudentId,
    format_timestamp, parse_timestamp,
};

use super::MIGRATION_001_INITIAL;

const HISTORY_SELECT: &str = r#"
    SELECT logs.id, logs.timestamp, logs.student_id, logs.coach_id, logs.change_amount, logs.note,
           students.name AS student_name, coaches.name AS coach_name
    FROM logs
    -- Inner join: foreign keys rule out orphans and student_name must not be NULL
    JOIN students ON logs.student_id = students.id
    LEFT JOIN coaches ON logs.coach_id = coaches.id
"#;

/// A single balance mutation to be applied atomically with its log row.
#[derive(Debug, Clone)]
pub struct BalanceChange<'a> {
    pub student_id: StudentId,
    pub delta: Credits,
    pub note: &'a str,
    pub coach_id: Option<CoachId>,
    pub timestamp: NaiveDateTime,
    /// When set, the change is refused if the resulting balance would drop below it.
    /// Checked by the UPDATE itself, inside the same transaction as the log insert.
    pub floor: Option<Credits>,
}

/// What happened to a [`BalanceChange`]. Every variant except `Applied` means
/// the transaction was rolled back and nothing was written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeOutcome {
    Applied {
        entry: LedgerEntry,
        new_balance: Credits,
    },
    StudentMissing,
    CoachMissing(CoachId),
    /// `balance + delta` does not fit in a 64-bit integer.
    OutOfRange {
        balance: Credits,
    },
    BelowFloor {
        student_name: String,
        balance: Credits,
    },
}

/// Repository for persisting and querying students, coaches and ledger entries.
#[derive(Clone)]
pub struct Repository {
    pool: SqlitePool,
}

impl Repository {
    /// Create a new repository with the given SQLite connection pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Connect to a SQLite database URL (e.g. `sqlite:lessons.db`).
    /// The file is created only when `create_if_missing` is set.
    pub async fn connect(database_url: &str, create_if_missing: bool) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)
            .context("Invalid database URL")?
            .create_if_missing(create_if_missing)
            .foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .connect_with(options)
            .await
            .context("Failed to connect to database")?;
        Ok(Self::new(pool))
    }

    /// Run database migrations.
    pub async fn migrate(&self) -> Result<()> {
        sqlx::query(MIGRATION_001_INITIAL)
            .execute(&self.pool)
            .await
            .context("Failed to run migration 001")?;

        tracing::debug!("schema migrations applied");
        Ok(())
    }

    /// Initialize a new database (connect + migrate).
    pub async fn init(database_url: &str) -> Result<Self> {
        let repo = Self::connect(database_url, true).await?;
        repo.migrate().await?;
        Ok(repo)
    }

    /// Access the underlying pool, for maintenance and tests.
    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    // ========================
    // Student operations
    // ========================

    /// Insert a student with a zero balance and return it.
    pub async fn insert_student(&self, name: &str, phone: Option<&str>) -> Result<Student> {
        let row = sqlx::query(
            r#"
            INSERT INTO students (name, phone, balance)
            VALUES (?, ?, 0)
            RETURNING id, name, phone, balance
            "#,
        )
        .bind(name)
        .bind(phone)
        .fetch_one(&self.pool)
        .await
        .context("Failed to save student")?;

        Ok(Self::row_to_student(&row))
    }

    /// Get a student by ID.
    pub async fn get_student(&self, id: StudentId) -> Result<Option<Student>> {
        let row = sqlx::query("SELECT id, name, phone, balance FROM students WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch student")?;

        Ok(row.as_ref().map(Self::row_to_student))
    }

    /// List all students in registration order.
    pub async fn list_students(&self) -> Result<Vec<Student>> {
        let rows = sqlx::query("SELECT id, name, phone, balance FROM students ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list students")?;

        Ok(rows.iter().map(Self::row_to_student).collect())
    }

    fn row_to_student(row: &SqliteRow) -> Student {
        Student {
            id: row.get("id"),
            name: row.get("name"),
            phone: row.get("phone"),
            balance: row.get("balance"),
        }
    }

    // ========================
    // Coach operations
    // ========================

    /// Insert a coach and return it.
    pub async fn insert_coach(&self, name: &str, specialty: Option<&str>) -> Result<Coach> {
        let row = sqlx::query(
            r#"
            INSERT INTO coaches (name, specialty)
            VALUES (?, ?)
            RETURNING id, name, specialty
            "#,
        )
        .bind(name)
        .bind(specialty)
        .fetch_one(&self.pool)
        .await
        .context("Failed to save coach")?;

        Ok(Self::row_to_coach(&row))
    }

    /// Get a coach by ID.
    pub async fn get_coach(&self, id: CoachId) -> Result<Option<Coach>> {
        let row = sqlx::query("SELECT id, name, specialty FROM coaches WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .context("Failed to fetch coach")?;

        Ok(row.as_ref().map(Self::row_to_coach))
    }

    /// List all coaches in registration order.
    pub async fn list_coaches(&self) -> Result<Vec<Coach>> {
        let rows = sqlx::query("SELECT id, name, specialty FROM coaches ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .context("Failed to list coaches")?;

        Ok(rows.iter().map(Self::row_to_coach).collect())
    }

    fn row_to_coach(row: &SqliteRow) -> Coach {
        Coach {
            id: row.get("id"),
            name: row.get("name"),
            specialty: row.get("specialty"),
        }
    }

    // ========================
    // Ledger operations
    // ========================

    /// Apply a balance change and append its ledger entry in one transaction.
    ///
    /// The transaction is committed only on `ChangeOutcome::Applied`. Any other
    /// return, including an error from `?`, drops the transaction and SQLite
    /// rolls it back, so the balance and the log never diverge.
    pub async fn apply_change(&self, change: &BalanceChange<'_>) -> Result<ChangeOutcome> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Failed to begin ledger transaction")?;

        if let Some(coach_id) = change.coach_id {
            let coach = sqlx::query("SELECT 1 FROM coaches WHERE id = ?")
                .bind(coach_id)
                .fetch_optional(&mut *tx)
                .await
                .context("Failed to look up coach")?;
            if coach.is_none() {
                return Ok(ChangeOutcome::CoachMissing(coach_id));
            }
        }

        // SQLite turns an overflowing integer sum into a REAL; typeof() refuses it
        let updated = match change.floor {
            Some(floor) => sqlx::query(
                r#"
                UPDATE students
                SET balance = balance + ?
                WHERE id = ? AND typeof(balance + ?) = 'integer' AND balance + ? >= ?
                RETURNING balance
                "#,
            )
            .bind(change.delta)
            .bind(change.student_id)
            .bind(change.delta)
            .bind(change.delta)
            .bind(floor),
            None => sqlx::query(
                r#"
                UPDATE students
                SET balance = balance + ?
                WHERE id = ? AND typeof(balance + ?) = 'integer'
                RETURNING balance
                "#,
            )
            .bind(change.delta)
            .bind(change.student_id)
            .bind(change.delta),
        }
        .fetch_optional(&mut *tx)
        .await
        .context("Failed to update student balance")?;

        let new_balance: Credits = match updated {
            Some(row) => row
                .try_get("balance")
                .context("Updated balance is not an integer")?,
            None => {
                // Unknown student, overflowing sum, or refused by the floor check
                let current = sqlx::query("SELECT name, balance FROM students WHERE id = ?")
                    .bind(change.student_id)
                    .fetch_optional(&mut *tx)
                    .await
                    .context("Failed to fetch student balance")?;
                let Some(row) = current else {
                    return Ok(ChangeOutcome::StudentMissing);
                };
                let balance: Credits = row
                    .try_get("balance")
                    .context("Stored balance is not an integer")?;
                return Ok(match balance.checked_add(change.delta) {
                    None => ChangeOutcome::OutOfRange { balance },
                    Some(_) => ChangeOutcome::BelowFloor {
                        student_name: row.get("name"),
                        balance,
                    },
                });
            }
        };

        let row = sqlx::query(
            r#"
            INSERT INTO logs (timestamp, student_id, coach_id, change_amount, note)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(format_timestamp(&change.timestamp))
        .bind(change.student_id)
        .bind(change.coach_id)
        .bind(change.delta)
        .bind(change.note)
        .fetch_one(&mut *tx)
        .await
        .context("Failed to append ledger entry")?;

        tx.commit()
            .await
            .context("Failed to commit ledger transaction")?;

        Ok(ChangeOutcome::Applied {
            entry: LedgerEntry {
                id: row.get("id"),
                timestamp: change.timestamp,
                student_id: change.student_id,
                coach_id: change.coach_id,
                delta: change.delta,
                note: change.note.to_string(),
            },
            new_balance,
        })
    }

    /// List ledger entries joined with student and coach names, most recent first.
    /// Ties on timestamp are broken by descending entry id.
    pub async fn list_history(
        &self,
        student_id: Option<StudentId>,
        limit: Option<usize>,
    ) -> Result<Vec<HistoryEntry>> {
        let mut query = String::from(HISTORY_SELECT);

        if student_id.is_some() {
            query.push_str(" WHERE logs.student_id = ?");
        }

        query.push_str(" ORDER BY logs.timestamp DESC, logs.id DESC");

        if let Some(lim) = limit {
            query.push_str(&format!(" LIMIT {}", lim));
        }

        let mut sql_query = sqlx::query(&query);
        if let Some(id) = student_id {
            sql_query = sql_query.bind(id);
        }

        let rows = sql_query
            .fetch_all(&self.pool)
            .await
            .context("Failed to list history")?;

        rows.iter().map(Self::row_to_history).collect()
    }

    /// List raw ledger entries in creation order.
    pub async fn list_entries(&self) -> Result<Vec<LedgerEntry>> {
        let rows = sqlx::query(
            r#"
            SELECT id, timestamp, student_id, coach_id, change_amount, note
            FROM logs
            ORDER BY id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to list ledger entries")?;

        rows.iter().map(Self::row_to_entry).collect()
    }

    /// Sum the ledger per student with SQL aggregation.
    /// Students without entries are absent from the map (sum = 0).
    pub async fn ledger_sums(&self) -> Result<HashMap<StudentId, Credits>> {
        let rows = sqlx::query(
            r#"
            SELECT student_id, SUM(change_amount) AS total
            FROM logs
            GROUP BY student_id
            "#,
        )
        .fetch_all(&self.pool)
        .await
        .context("Failed to sum ledger")?;

        Ok(rows
            .iter()
            .map(|row| (row.get("student_id"), row.get("total")))
            .collect())
    }

    /// Get statistics for integrity checking.
    pub async fn get_integrity_stats(&self) -> Result<IntegrityStats> {
        let row = sqlx::query(
            r#"
            SELECT
                (SELECT COUNT(*) FROM students) AS student_count,
                (SELECT COUNT(*) FROM coaches) AS coach_count,
                (SELECT COUNT(*) FROM logs) AS entry_count,
                (SELECT COUNT(*) FROM logs l
                    WHERE NOT EXISTS (SELECT 1 FROM students s WHERE s.id = l.student_id)
                ) AS orphaned_entries,
                (SELECT COUNT(*) FROM logs l
                    WHERE l.coach_id IS NOT NULL
                      AND NOT EXISTS (SELECT 1 FROM coaches c WHERE c.id = l.coach_id)
                ) AS unknown_coach_refs,
                (SELECT COUNT(*) FROM logs WHERE change_amount = 0) AS zero_deltas
            "#,
        )
        .fetch_one(&self.pool)
        .await
        .context("Failed to gather integrity statistics")?;

        Ok(IntegrityStats {
            student_count: row.get("student_count"),
            coach_count: row.get("coach_count"),
            entry_count: row.get("entry_count"),
            orphaned_entries: row.get("orphaned_entries"),
            unknown_coach_refs: row.get("unknown_coach_refs"),
            zero_deltas: row.get("zero_deltas"),
        })
    }

    fn row_to_entry(row: &SqliteRow) -> Result<LedgerEntry> {
        let timestamp_str: String = row.get("timestamp");
        let note: Option<String> = row.get("note");

        Ok(LedgerEntry {
            id: row.get("id"),
            timestamp: parse_timestamp(&timestamp_str)
                .with_context(|| format!("Invalid entry timestamp: {}", timestamp_str))?,
            student_id: row.get("student_id"),
            coach_id: row.get("coach_id"),
            delta: row.get("change_amount"),
            note: note.unwrap_or_default(),
        })
    }

    fn row_to_history(row: &SqliteRow) -> Result<HistoryEntry> {
        Ok(HistoryEntry {
            entry: Self::row_to_entry(row)?,
            student_name: row.get("student_name"),
            coach_name: row.get("coach_name"),
        })
    }
}
