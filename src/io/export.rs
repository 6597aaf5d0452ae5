use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::io::Write;

use crate::application::QueryService;
use crate::domain::{Coach, HistoryEntry, Student, format_timestamp};

/// Database snapshot for a full JSON export
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LedgerSnapshot {
    pub version: String,
    pub exported_at: DateTime<Utc>,
    pub students: Vec<Student>,
    pub coaches: Vec<Coach>,
    /// Most recent first, as shown by the history view
    pub history: Vec<HistoryEntry>,
}

/// Exporter for converting ledger data to CSV or JSON
pub struct Exporter<'a> {
    query: &'a QueryService,
}

impl<'a> Exporter<'a> {
    pub fn new(query: &'a QueryService) -> Self {
        Self { query }
    }

    /// Export students and balances to CSV format
    pub async fn export_students_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let students = self.query.list_students().await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["id", "name", "phone", "balance"])?;

        for student in &students {
            csv_writer.write_record([
                student.id.to_string(),
                student.name.clone(),
                student.phone.clone().unwrap_or_default(),
                student.balance.to_string(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(students.len())
    }

    /// Export coaches to CSV format
    pub async fn export_coaches_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let coaches = self.query.list_coaches().await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record(["id", "name", "specialty"])?;

        for coach in &coaches {
            csv_writer.write_record([
                coach.id.to_string(),
                coach.name.clone(),
                coach.specialty.clone().unwrap_or_default(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(coaches.len())
    }

    /// Export the joined history to CSV format, most recent first
    pub async fn export_history_csv<W: Write>(&self, writer: W) -> Result<usize> {
        let history = self.query.list_history().await?;
        let mut csv_writer = csv::Writer::from_writer(writer);

        csv_writer.write_record([
            "id",
            "timestamp",
            "student",
            "coach",
            "change_amount",
            "kind",
            "note",
        ])?;

        for item in &history {
            csv_writer.write_record([
                item.entry.id.to_string(),
                format_timestamp(&item.entry.timestamp),
                item.student_name.clone(),
                item.coach_name.clone().unwrap_or_default(),
                item.entry.delta.to_string(),
                item.entry.kind().as_str().to_string(),
                item.entry.note.clone(),
            ])?;
        }

        csv_writer.flush()?;
        Ok(history.len())
    }

    /// Export the whole ledger as a JSON snapshot
    pub async fn export_snapshot_json<W: Write>(&self, mut writer: W) -> Result<LedgerSnapshot> {
        let snapshot = LedgerSnapshot {
            version: env!("CARGO_PKG_VERSION").to_string(),
            exported_at: Utc::now(),
            students: self.query.list_students().await?,
            coaches: self.query.list_coaches().await?,
            history: self.query.list_history().await?,
        };

        let json = serde_json::to_string_pretty(&snapshot)?;
        writer.write_all(json.as_bytes())?;
        writer.flush()?;

        Ok(snapshot)
    }
}
