// Allow dead_code because these helpers are used across different test files
// which are compiled separately
#![allow(dead_code)]

use anyhow::Result;
use chrono::{NaiveDate, NaiveDateTime};
use lessonledger::application::Services;
use lessonledger::domain::{Coach, Student};
use lessonledger::storage::Repository;
use tempfile::TempDir;

/// Helper to create test services over a temporary database
pub async fn test_services() -> Result<(Services, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let services = Services::init(db_path.to_str().unwrap()).await?;
    Ok((services, temp_dir))
}

/// Like [`test_services`], but also hands back the repository so tests can
/// reach the database behind the services' back.
pub async fn test_services_with_repo() -> Result<(Services, Repository, TempDir)> {
    let temp_dir = TempDir::new()?;
    let db_path = temp_dir.path().join("test.db");
    let repo = Repository::init(&format!("sqlite:{}", db_path.to_str().unwrap())).await?;
    let services = Services::new(repo.clone());
    Ok((services, repo, temp_dir))
}

/// Helper to build a timestamp from "YYYY-MM-DD HH:MM:SS"
pub fn at(timestamp: &str) -> NaiveDateTime {
    NaiveDateTime::parse_from_str(timestamp, "%Y-%m-%d %H:%M:%S").unwrap()
}

/// Helper to build midnight of a date from "YYYY-MM-DD"
pub fn on(date: &str) -> NaiveDateTime {
    NaiveDate::parse_from_str(date, "%Y-%m-%d")
        .unwrap()
        .and_hms_opt(0, 0, 0)
        .unwrap()
}

/// Test fixture: a small club with two students and two coaches
pub struct Club {
    pub alice: Student,
    pub bob: Student,
    pub chen: Coach,
    pub dana: Coach,
}

impl Club {
    pub async fn create(services: &Services) -> Result<Self> {
        let alice = services
            .ledger
            .register_student("Alice", Some("555".into()))
            .await?;
        let bob = services.ledger.register_student("Bob", None).await?;
        let chen = services
            .ledger
            .register_coach("Coach Chen", Some("Doubles tactics".into()))
            .await?;
        let dana = services.ledger.register_coach("Coach Dana", None).await?;
        Ok(Self {
            alice,
            bob,
            chen,
            dana,
        })
    }
}
